use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use croquis_core::records::ShuffleMode;

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "croquis",
    about = "Encrypted local records for croquis drawing practice",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Write, read back and delete a probe record.
    Health,
    /// Show which identity source the key is derived from and its fingerprint.
    Identity,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Manage image decks.
    #[command(subcommand)]
    Deck(DeckCommand),
    /// Show or change practice settings.
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Practice history and saved drawings.
    #[command(subcommand)]
    History(HistoryCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum DeckCommand {
    /// List decks, recently opened ones first.
    List,
    /// Create an empty deck.
    Create { name: String },
    /// Show a deck's images and filter.
    Show {
        /// Deck id, id prefix or name.
        deck: String,
        /// Also print the image order for one session.
        #[arg(long)]
        session: bool,
    },
    /// Import image files into a deck.
    Add {
        deck: String,
        #[arg(required = true)]
        images: Vec<PathBuf>,
        #[arg(long, default_value_t = 1)]
        difficulty: u8,
        /// Store a copy of the image bytes inside the deck.
        #[arg(long)]
        embed: bool,
        /// Tag applied to every imported image (repeatable).
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Remove an image from a deck.
    Remove { deck: String, filename: String },
    /// Replace an image's tags.
    Tag {
        deck: String,
        filename: String,
        tags: Vec<String>,
    },
    /// Set which images sessions use and in what order.
    Filter(FilterArgs),
    /// Delete a deck.
    Delete { deck: String },
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct FilterArgs {
    pub deck: String,
    /// Enabled tag (repeatable). No tags means every image is eligible.
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    #[arg(long, value_enum, default_value_t = ShuffleArg::Weighted)]
    pub shuffle: ShuffleArg,
    #[arg(long)]
    pub max_difficulty: Option<u8>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShuffleArg {
    Off,
    Uniform,
    Weighted,
}

impl From<ShuffleArg> for ShuffleMode {
    fn from(arg: ShuffleArg) -> Self {
        match arg {
            ShuffleArg::Off => ShuffleMode::Off,
            ShuffleArg::Uniform => ShuffleMode::Uniform,
            ShuffleArg::Weighted => ShuffleMode::Weighted,
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SettingsCommand {
    /// Print current settings.
    Show,
    /// Change one setting, e.g. `timer_position top-left`.
    Set { key: String, value: String },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum HistoryCommand {
    /// Record a finished drawing.
    Log {
        /// Seconds spent on the drawing.
        #[arg(long)]
        duration: u32,
        #[arg(long)]
        deck: Option<String>,
        /// Reference image that was drawn.
        #[arg(long)]
        image: Option<PathBuf>,
        /// Screenshot of the drawing; saved with the reference as a pair.
        #[arg(long, requires = "image")]
        drawing: Option<PathBuf>,
    },
    /// Daily counts, totals and streaks.
    Stats {
        /// Number of recent days to show.
        #[arg(long, default_value_t = 14)]
        days: u32,
    },
    /// List saved drawing pairs, newest first.
    Pairs,
    /// Set the memo on a saved drawing pair.
    Memo {
        name: String,
        #[arg(required = true)]
        text: Vec<String>,
    },
}
