use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

use crate::retry::RetryPolicy;
use crate::store::oauth::OAuthCredentials;
use crate::store::Visibility;
use crate::sync::SyncConfig;

const DEFAULT_CREDENTIALS_FILE: &str = "~/.config/trovebox/default";

const CREDENTIALS_HELP: &str = "\
You must create a credentials file in ~/.config/trovebox/default
with the following contents:
    host = your.host.com
    consumerKey = your_consumer_key
    consumerSecret = your_consumer_secret
    token = your_access_token
    tokenSecret = your_access_token_secret

To get your credentials:
 * Log into your Trovebox site
 * Click the arrow on the top-right and select 'Settings'
 * Click the 'Create a new app' button
 * Click the 'View' link beside the newly created app";

/// Where and how to reach the source store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCredentials {
    pub host: String,
    /// `None` reads the library anonymously.
    pub oauth: Option<OAuthCredentials>,
}

/// OAuth values as given, before checking that the set is complete.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct OAuthParts {
    consumer_key: Option<String>,
    consumer_secret: Option<String>,
    token: Option<String>,
    token_secret: Option<String>,
}

impl OAuthParts {
    /// Values present in `overrides` replace ours.
    fn overlay(self, overrides: OAuthParts) -> Self {
        Self {
            consumer_key: overrides.consumer_key.or(self.consumer_key),
            consumer_secret: overrides.consumer_secret.or(self.consumer_secret),
            token: overrides.token.or(self.token),
            token_secret: overrides.token_secret.or(self.token_secret),
        }
    }

    fn into_credentials(self) -> anyhow::Result<Option<OAuthCredentials>> {
        match (
            self.consumer_key,
            self.consumer_secret,
            self.token,
            self.token_secret,
        ) {
            (None, None, None, None) => Ok(None),
            (Some(consumer_key), Some(consumer_secret), Some(token), Some(token_secret)) => {
                Ok(Some(OAuthCredentials {
                    consumer_key,
                    consumer_secret,
                    token,
                    token_secret,
                }))
            }
            (ck, cs, t, ts) => {
                let missing: Vec<&str> = [
                    ("consumerKey", ck.is_none()),
                    ("consumerSecret", cs.is_none()),
                    ("token", t.is_none()),
                    ("tokenSecret", ts.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
                anyhow::bail!(
                    "Incomplete Trovebox OAuth credentials, missing: {}",
                    missing.join(", ")
                )
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Application configuration.
pub struct Config {
    pub source: SourceCredentials,
    pub dest_url: String,
    pub dest_token: Option<String>,
    pub staging_dir: PathBuf,
    pub retry_delay_secs: u64,
    pub max_retries: u32,
    pub timeout_secs: u64,
    pub visibility: Visibility,
    pub dry_run: bool,
    pub no_progress_bar: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("source", &self.source)
            .field("dest_url", &self.dest_url)
            .field("dest_token", &"<redacted>")
            .field("staging_dir", &self.staging_dir)
            .field("visibility", &self.visibility)
            .field("timeout_secs", &self.timeout_secs)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Config {
    pub fn from_cli(cli: crate::cli::Cli) -> anyhow::Result<Self> {
        let flags = OAuthParts {
            consumer_key: non_empty(cli.consumer_key),
            consumer_secret: non_empty(cli.consumer_secret),
            token: non_empty(cli.token),
            token_secret: non_empty(cli.token_secret),
        };
        let (host, oauth) = match cli.host {
            Some(host) => (host, flags),
            None => {
                let path =
                    expand_tilde(cli.config.as_deref().unwrap_or(DEFAULT_CREDENTIALS_FILE));
                let file = read_credentials_file(&path)?;
                (file.host, file.oauth.overlay(flags))
            }
        };
        let source = SourceCredentials {
            host,
            oauth: oauth.into_credentials().with_context(|| {
                format!("Cannot authenticate to Trovebox\n\n{CREDENTIALS_HELP}")
            })?,
        };

        let staging_dir = cli
            .staging_dir
            .map(|d| expand_tilde(&d))
            .unwrap_or_else(|| std::env::temp_dir().join("photomigrate"));

        let visibility = if cli.public_albums {
            Visibility::Public
        } else {
            Visibility::Protected
        };

        Ok(Self {
            source,
            dest_url: cli.dest_url,
            dest_token: non_empty(cli.dest_token),
            staging_dir,
            retry_delay_secs: cli.retry_delay,
            max_retries: cli.max_retries,
            timeout_secs: cli.timeout,
            visibility,
            dry_run: cli.dry_run,
            no_progress_bar: cli.no_progress_bar,
        })
    }

    /// Longest wait for data on an open connection.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The part of the configuration the sync engine needs.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            visibility: self.visibility,
            dry_run: self.dry_run,
            staging_dir: self.staging_dir.clone(),
            retry: RetryPolicy::exponential(self.max_retries, self.retry_delay_secs),
            no_progress_bar: self.no_progress_bar,
        }
    }
}

/// Contents of a Trovebox credentials file.
#[derive(Debug)]
struct CredentialsFile {
    host: String,
    oauth: OAuthParts,
}

fn read_credentials_file(path: &Path) -> anyhow::Result<CredentialsFile> {
    let contents = std::fs::read_to_string(path).with_context(|| {
        format!(
            "Cannot read Trovebox credentials from {}\n\n{}",
            path.display(),
            CREDENTIALS_HELP
        )
    })?;
    parse_credentials(&contents).with_context(|| {
        format!("Invalid credentials file {}\n\n{}", path.display(), CREDENTIALS_HELP)
    })
}

/// Parse the `key = value` Trovebox credentials format.
///
/// Blank lines and `#` comments are skipped, values may be quoted, and
/// unknown keys are ignored.
fn parse_credentials(contents: &str) -> anyhow::Result<CredentialsFile> {
    let mut host = None;
    let mut oauth = OAuthParts::default();

    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .with_context(|| format!("line {}: expected 'key = value'", index + 1))?;
        let value = non_empty(Some(value.trim().trim_matches('"').to_string()));
        match key.trim() {
            "host" => host = value,
            "consumerKey" => oauth.consumer_key = value,
            "consumerSecret" => oauth.consumer_secret = value,
            "token" => oauth.token = value,
            "tokenSecret" => oauth.token_secret = value,
            other => tracing::debug!("Ignoring credentials key '{}'", other),
        }
    }

    let host = host.context("missing 'host' entry")?;
    Ok(CredentialsFile { host, oauth })
}
