use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum HistoryCommands {
    /// List recorded level changes (default)
    #[command(alias = "ls")]
    List {
        /// Show at most this many of the newest entries
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Only entries newer than a duration ago ("2h", "3days") or a date (YYYY-MM-DD)
        #[arg(short, long)]
        since: Option<String>,
    },

    /// Export history
    Export {
        /// Output file path (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,

        /// Output format: json, csv
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Only entries newer than a duration ago or a date
        #[arg(short, long)]
        since: Option<String>,
    },

    /// Show database statistics
    Stats,

    /// Delete entries older than the retention window
    Prune {
        /// Delete entries older than N days (defaults to history.retention_days)
        #[arg(long)]
        older_than: Option<u32>,

        /// Skip confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Delete all history
    Clear {
        /// Skip confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
}
