use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone)]
pub enum Command {
    /// Create a new diary
    New {
        /// Name for new diary
        name: String,

        /// Owner of the diary's entries
        #[arg(long, short = 'u', default_value = "local")]
        user: String,
    },
    /// Manipulate entries
    Entry {
        #[clap(subcommand)]
        entry_command: EntryCommand,
    },
    /// Load an image through the cache and describe it
    Image {
        /// URL of the image, as listed on an entry
        url: String,
    },
}

#[derive(Subcommand, Clone)]
pub enum EntryCommand {
    /// Add an entry
    Add {
        /// Title of the entry
        title: String,

        /// Body text
        #[arg(long, short = 'c', default_value = "")]
        content: String,

        /// When it happened, as "YYYY-MM-DD HH:MM:SS" (defaults to now)
        #[arg(long, short = 'd')]
        date: Option<String>,

        #[arg(long, short = 'e', default_value = "")]
        emotion: String,

        #[arg(long, short = 'w', default_value = "")]
        weather: String,

        #[arg(long, short = 'l')]
        location: Option<String>,

        /// Image files to attach
        #[arg(long = "image", short = 'i')]
        images: Vec<PathBuf>,
    },
    /// List entries month by month
    List {
        /// Show the trash instead
        #[arg(long, short = 't')]
        trash: bool,

        /// Load each entry's first image through the cache
        #[arg(long)]
        images: bool,
    },
    /// Show which days of each month have entries
    Days,
    /// Search entries by title or content
    Search {
        /// Text to look for
        query: String,

        /// Search the trash instead
        #[arg(long, short = 't')]
        trash: bool,
    },
    /// Move an entry to the trash
    Trash {
        /// Id of the entry
        id: String,
    },
    /// Take an entry out of the trash
    Restore {
        /// Id of the entry
        id: String,
    },
    /// Take every entry out of the trash
    RestoreAll,
    /// Permanently delete everything in the trash
    EmptyTrash,
    /// Permanently delete entries past the trash retention period
    Purge,
}
