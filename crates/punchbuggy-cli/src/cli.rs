use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "punchbuggy",
    version,
    about = "Two-player Punch Buggy tally with automatic backups",
    after_help = "\
Configuration file lookup order:
  1. --config <path>             (explicit flag)
  2. $PUNCHBUGGY_CONFIG          (environment variable)
  3. ./punchbuggy.yaml           (project)
  4. Platform user config dir + /punchbuggy/config.yaml
  5. Platform system config path (Unix: /etc/punchbuggy/config.yaml)

Without a config file every setting uses its default.

Environment variables:
  PUNCHBUGGY_CONFIG        Path to configuration file (overrides default search)
  PUNCHBUGGY_APP_VERSION   Version stamped into backups when app_version is \"dev\""
)]
pub(crate) struct Cli {
    /// Path to configuration file (overrides PUNCHBUGGY_CONFIG and default search)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Backup engine selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum EngineArg {
    /// Daily files in a user-chosen folder
    Directory,
    /// Three rotating generations in the embedded store
    Auto,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Generate a starter configuration file
    Config {
        /// Destination path (prompts for a location when omitted)
        dest: Option<String>,
    },

    /// Show the current game and the state of both backup engines
    Status,

    /// Choose the backup folder and run an initial backup
    Connect {
        /// Folder to back up into (prompts when omitted; empty input cancels)
        path: Option<String>,
    },

    /// Forget the backup folder and its bookkeeping
    Disconnect,

    /// Back up now
    Backup {
        /// Engine to use (defaults to the preferred available engine)
        #[arg(short, long, value_enum)]
        engine: Option<EngineArg>,

        /// Reason recorded in the snapshot
        #[arg(short, long, default_value = "manual")]
        reason: String,
    },

    /// List retained backups
    List {
        /// Only list backups of this engine
        #[arg(short, long, value_enum)]
        engine: Option<EngineArg>,
    },

    /// Replace the current game with a backup
    Restore {
        /// Backup id as shown by `list` ("current", "previous", "oldest",
        /// "latest" or a daily date)
        id: String,

        /// Engine that holds the backup (defaults to the preferred available engine)
        #[arg(short, long, value_enum)]
        engine: Option<EngineArg>,
    },

    /// Write the current game as a downloadable backup file
    Download,

    /// Export the current game as plain JSON
    Export {
        /// Directory to write into (defaults to the configured export dir)
        #[arg(long)]
        dest: Option<String>,
    },

    /// Import a game from an exported or backup JSON file
    Import {
        /// File to import
        file: String,
    },

    /// Upgrade a game stored in the legacy format
    Migrate,

    /// Turn automatic backups on
    Enable,

    /// Turn automatic backups off
    Disable,

    /// Record a sighting for a player
    Score {
        /// Player key (A or B)
        player: String,

        /// Take a point away instead of adding one
        #[arg(long)]
        correction: bool,
    },

    /// Close the current round and start the next
    NextRound,

    /// Start a fresh game, keeping player names
    Reset,

    /// Delete the stored game and all backup data of both engines
    Clear,

    /// Back up automatically whenever the game changes
    Watch {
        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
}

impl Commands {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Commands::Config { .. } => "config",
            Commands::Status => "status",
            Commands::Connect { .. } => "connect",
            Commands::Disconnect => "disconnect",
            Commands::Backup { .. } => "backup",
            Commands::List { .. } => "list",
            Commands::Restore { .. } => "restore",
            Commands::Download => "download",
            Commands::Export { .. } => "export",
            Commands::Import { .. } => "import",
            Commands::Migrate => "migrate",
            Commands::Enable => "enable",
            Commands::Disable => "disable",
            Commands::Score { .. } => "score",
            Commands::NextRound => "next-round",
            Commands::Reset => "reset",
            Commands::Clear => "clear",
            Commands::Watch { .. } => "watch",
        }
    }
}
