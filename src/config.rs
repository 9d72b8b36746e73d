use anyhow::{Context, Result};
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub command_prefix: String,

    // Audio
    pub default_volume: f32,
    pub ffmpeg_path: String,

    // Timeouts
    pub connect_timeout: Duration,
    pub transcode_timeout: Duration,

    // Paths
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        // Create directories if they don't exist
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("No se pudo crear {}", config.data_dir.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Builds the configuration from any key lookup (the process environment in
    /// production). Missing optional keys fall back to [`Config::default`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            discord_token: get("DISCORD_TOKEN").context("DISCORD_TOKEN no está definido")?,
            command_prefix: get("COMMAND_PREFIX").unwrap_or(defaults.command_prefix),

            default_volume: match get("DEFAULT_VOLUME") {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .with_context(|| format!("DEFAULT_VOLUME inválido: {}", raw))?,
                None => defaults.default_volume,
            },
            ffmpeg_path: get("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),

            connect_timeout: match get("CONNECT_TIMEOUT") {
                Some(raw) => humantime::parse_duration(raw.trim())
                    .with_context(|| format!("CONNECT_TIMEOUT inválido: {}", raw))?,
                None => defaults.connect_timeout,
            },
            transcode_timeout: match get("TRANSCODE_TIMEOUT") {
                Some(raw) => humantime::parse_duration(raw.trim())
                    .with_context(|| format!("TRANSCODE_TIMEOUT inválido: {}", raw))?,
                None => defaults.transcode_timeout,
            },

            data_dir: get("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
        })
    }

    /// Validates configuration values for correctness.
    ///
    /// - Prefix must not be empty or contain whitespace
    /// - Volume must be between 0.0 and 1.0
    /// - Timeouts must be non-zero
    pub fn validate(&self) -> Result<()> {
        if self.command_prefix.is_empty() || self.command_prefix.chars().any(char::is_whitespace) {
            anyhow::bail!("Command prefix must be non-empty and without spaces, got: {:?}", self.command_prefix);
        }

        if !(0.0..=1.0).contains(&self.default_volume) {
            anyhow::bail!("Default volume must be between 0.0 and 1.0, got: {}", self.default_volume);
        }

        if self.connect_timeout.is_zero() {
            anyhow::bail!("Connect timeout must be greater than 0");
        }

        if self.transcode_timeout.is_zero() {
            anyhow::bail!("Transcode timeout must be greater than 0");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    /// Never includes the token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Prefix: {}\n  \
            Audio: {}% vol, ffmpeg at {}\n  \
            Timeouts: connect {}, transcode {}\n  \
            Data: {}",
            self.command_prefix,
            (self.default_volume * 100.0).round() as u32,
            self.ffmpeg_path,
            humantime::format_duration(self.connect_timeout),
            humantime::format_duration(self.transcode_timeout),
            self.data_dir.display(),
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            command_prefix: "!".to_string(),

            default_volume: 0.5,
            ffmpeg_path: "ffmpeg".to_string(),

            connect_timeout: Duration::from_secs(10),
            transcode_timeout: Duration::from_secs(10),

            data_dir: "./data".into(),
        }
    }
}
