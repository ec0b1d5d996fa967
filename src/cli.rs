use clap::Parser;

use crate::types::LogLevel;

#[derive(Parser, Debug)]
#[command(
    name = "photomigrate",
    about = "Transfer photo albums from Trovebox to a gallery service"
)]
pub struct Cli {
    /// Trovebox credentials file (default: ~/.config/trovebox/default)
    #[arg(long)]
    pub config: Option<String>,

    /// Hostname of the Trovebox server (overrides the credentials file)
    #[arg(long)]
    pub host: Option<String>,

    /// Trovebox OAuth consumer key
    #[arg(long, env = "TROVEBOX_CONSUMER_KEY")]
    pub consumer_key: Option<String>,

    /// Trovebox OAuth consumer secret.
    /// Prefer the TROVEBOX_* environment variables over the secret flags,
    /// which are visible in process listings.
    #[arg(long, env = "TROVEBOX_CONSUMER_SECRET", hide_env_values = true)]
    pub consumer_secret: Option<String>,

    /// Trovebox OAuth access token
    #[arg(long, env = "TROVEBOX_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Trovebox OAuth access token secret
    #[arg(long, env = "TROVEBOX_TOKEN_SECRET", hide_env_values = true)]
    pub token_secret: Option<String>,

    /// Base URL of the destination gallery API
    #[arg(long, env = "PHOTOMIGRATE_DEST_URL")]
    pub dest_url: String,

    /// Gallery access token (if not provided, will prompt)
    #[arg(long, env = "PHOTOMIGRATE_DEST_TOKEN", hide_env_values = true)]
    pub dest_token: Option<String>,

    /// Make destination albums public instead of protected
    #[arg(long)]
    pub public_albums: bool,

    /// Create albums, but don't actually transfer any photos
    #[arg(long)]
    pub dry_run: bool,

    /// Directory for transient downloads (default: <temp dir>/photomigrate)
    #[arg(long)]
    pub staging_dir: Option<String>,

    /// Retries per download or upload after the first attempt
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Base delay in seconds for exponential retry backoff
    #[arg(long, default_value_t = 2)]
    pub retry_delay: u64,

    /// Seconds without data before a request is abandoned and retried
    #[arg(long, default_value_t = 120, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Disable progress bar
    #[arg(long)]
    pub no_progress_bar: bool,
}
