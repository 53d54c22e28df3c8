//! Core abstractions for Croquis: the record model persisted by the practice app
//! and the encrypted storage contracts it is written through.
//! Crypto and filesystem details live in `croquis-storage`.

pub mod records;
pub mod store;
