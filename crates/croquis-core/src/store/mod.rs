mod cipher;
mod error;
mod record_store;

pub use cipher::{MaskingCipher, RecordCipher};
pub use error::StoreError;
pub use record_store::{
    load_or_default, load_record, save_record, InMemoryRecordStore, Loaded, RecordStore,
};
