use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "freedomctl", about = "Plausibly-deniable storage environment control")]
pub struct Cli {
    /// Increase log verbosity; repeatable (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Load settings from a YAML file, layered over the built-in defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage backing pages.
    Pages {
        #[command(subcommand)]
        action: PagesAction,
    },
    /// Manage the MD RAID-0 array.
    Md {
        #[command(subcommand)]
        action: MdAction,
    },
    /// Manage the key vault.
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },
    /// Manage the header vault.
    Headers {
        #[command(subcommand)]
        action: HeadersAction,
    },
    /// Manage the PDE mapping.
    Pde {
        #[command(subcommand)]
        action: PdeAction,
    },
    /// Print an aggregate snapshot of the environment.
    Status,
}

#[derive(Debug, Subcommand)]
pub enum PagesAction {
    /// Allocate backing pages; fills free space when `--limit` is omitted.
    Create {
        #[arg(long, default_value_t = 0)]
        limit: usize,
        /// Page size in bytes for this invocation only; `0` uses the
        /// configured default.
        #[arg(long, default_value_t = 0)]
        page_size: u64,
        /// Plan the allocation without writing any file.
        #[arg(long)]
        simulate: bool,
    },
    /// Detach loop devices and unlink every backing file.
    Remove {
        #[arg(long)]
        yes: bool,
    },
    /// List backing pages and their loop-device attachment.
    List,
    /// Attach a loop device to every backing page missing one.
    Activate,
    /// Detach every attached loop device.
    Deactivate,
}

#[derive(Debug, Subcommand)]
pub enum MdAction {
    /// Create, assemble, or adopt the array from the backing pages.
    Start,
    /// Close any open mapping and stop the array.
    Stop,
    /// Print the array's status.
    Status,
    /// Format and seed the safe-zone filesystem on the array's leading region.
    PopulateSafezone,
}

#[derive(Debug, Subcommand)]
pub enum KeysAction {
    /// Generate random keyfiles; `--count 0` uses the configured default.
    Create {
        #[arg(long, default_value_t = 0)]
        count: usize,
    },
    /// Delete every keyfile.
    Remove {
        #[arg(long)]
        yes: bool,
    },
    /// List keyfiles and their fingerprint.
    List,
}

#[derive(Debug, Subcommand)]
pub enum HeadersAction {
    /// Seal fresh detached headers; `--count 0` uses the configured default.
    Create {
        #[arg(long, default_value_t = 0)]
        count: usize,
    },
    /// Delete every header file.
    Remove {
        #[arg(long)]
        yes: bool,
    },
    /// List header files present in the vault.
    List,
}

#[derive(Debug, Subcommand)]
pub enum PdeAction {
    /// Open a header/key/offset tuple against the array.
    Start {
        #[arg(long)]
        header: String,
        #[arg(long)]
        key: String,
        #[arg(long)]
        keyfile_offset: u64,
        /// Format the resulting mapping ext4, destroying its prior contents.
        #[arg(long)]
        bless: bool,
    },
    /// Close the mapping.
    Stop,
}
