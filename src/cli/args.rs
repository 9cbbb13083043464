//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! - `--root <path>`: Repository directory (overrides config)
//! - `--branch <name>`: Branch holding the password tree
//! - `--config <path>`: Read this config file instead of searching
//! - `--debug`: Enable debug logging
//! - `--json`: Machine-readable output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// gitpass - A git-backed, GPG-recipient-aware password store
#[derive(Parser, Debug)]
#[command(name = "gitpass")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Repository directory
    #[arg(long, global = true, env = "GITPASS_ROOT")]
    pub root: Option<PathBuf>,

    /// Branch holding the password tree
    #[arg(long, global = true)]
    pub branch: Option<String>,

    /// Config file to use instead of the default search path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Identity and message for commands that create a commit.
#[derive(clap::Args, Debug, Clone)]
pub struct CommitArgs {
    /// Name recorded as the commit author
    #[arg(long, short = 'u', env = "GITPASS_USER", default_value = "")]
    pub user: String,

    /// Commit message
    #[arg(long, short = 'm', default_value = "")]
    pub message: String,

    /// Key ID the acting user owns; when given, the change is refused
    /// unless one of them is a recipient of the target
    #[arg(long = "as-key", value_name = "KEYID")]
    pub as_keys: Vec<String>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open the store, creating the repository if it does not exist
    #[command(
        name = "init",
        after_help = "\
EXAMPLES:
    # Create a new store in the configured location
    gitpass init

    # Create one somewhere specific
    gitpass --root /srv/pass init"
    )]
    Init,

    /// List the entries of a directory
    #[command(name = "ls")]
    Ls {
        /// Directory to list (default: root)
        #[arg(default_value = "")]
        path: String,
    },

    /// Write a file's raw contents to stdout
    #[command(name = "show")]
    Show { path: String },

    /// Print whether a path is a file or a directory
    #[command(name = "type")]
    Type { path: String },

    /// Print the key IDs a path is encrypted to
    #[command(name = "recipients")]
    Recipients {
        #[arg(default_value = "")]
        path: String,
    },

    /// Print the files to re-encrypt when a directory's recipients change
    #[command(
        name = "affected",
        long_about = "Print the files to re-encrypt when a directory's recipients change.\n\n\
            These are all files beneath the directory except those under a \
            subdirectory with its own .gpg-id."
    )]
    Affected {
        #[arg(default_value = "")]
        path: String,
    },

    /// Print the key IDs a stored file's ciphertext is actually encrypted to
    #[command(name = "decryptable")]
    Decryptable { path: String },

    /// Print every path beneath a directory, breadth first
    #[command(name = "walk")]
    Walk {
        #[arg(default_value = "")]
        path: String,
    },

    /// Store ciphertext read from stdin
    #[command(
        name = "insert",
        after_help = "\
EXAMPLES:
    gpg -e -r KEYA < secret.txt | gitpass insert web/example.com.gpg -u alice"
    )]
    Insert {
        path: String,

        #[command(flatten)]
        commit: CommitArgs,
    },

    /// Remove a file
    #[command(name = "rm")]
    Rm {
        path: String,

        #[command(flatten)]
        commit: CommitArgs,
    },

    /// Change a directory's recipients, supplying re-encrypted files
    #[command(
        name = "set-recipients",
        long_about = "Change a directory's recipients.\n\n\
            Every file listed by `gitpass affected <dir>` must be supplied \
            re-encrypted to the new recipients with --file, or the commit is \
            refused. Giving no keys removes the directory's own .gpg-id.",
        after_help = "\
EXAMPLES:
    gitpass affected team
    gitpass set-recipients team KEYA KEYB \\
        --file team/db.gpg=/tmp/db.gpg \\
        --file team/mail.gpg=/tmp/mail.gpg"
    )]
    SetRecipients {
        /// Directory whose .gpg-id changes
        path: String,

        /// New key IDs
        keys: Vec<String>,

        /// Re-encrypted contents, as <store-path>=<local-file>
        #[arg(long = "file", value_name = "PATH=FILE")]
        files: Vec<String>,

        #[command(flatten)]
        commit: CommitArgs,
    },
}
