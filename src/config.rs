use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, str::FromStr};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Límites
    pub max_queue_size: usize,
    pub max_playlist_size: usize,
    pub transition_backlog: usize,

    // Fuentes
    pub elevator_dir: PathBuf,
    pub ytdlp_path: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Builds the configuration from an arbitrary variable lookup.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            // Discord
            discord_token: lookup("DISCORD_TOKEN").context("DISCORD_TOKEN no definido")?,
            application_id: lookup("APPLICATION_ID")
                .context("APPLICATION_ID no definido")?
                .parse()
                .context("APPLICATION_ID inválido")?,
            guild_id: lookup("GUILD_ID").and_then(|s| s.parse().ok()),

            // Límites
            max_queue_size: parse_or(&lookup, "MAX_QUEUE_SIZE", defaults.max_queue_size)?,
            max_playlist_size: parse_or(&lookup, "MAX_PLAYLIST_SIZE", defaults.max_playlist_size)?,
            transition_backlog: parse_or(
                &lookup,
                "TRANSITION_BACKLOG",
                defaults.transition_backlog,
            )?,

            // Fuentes
            elevator_dir: lookup("ELEVATOR_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.elevator_dir),
            ytdlp_path: lookup("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
        })
    }

    /// Validates configuration values for correctness.
    ///
    /// Sizes and the transition backlog must be greater than zero: a zero
    /// backlog would reject every command.
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("Discord token must not be empty");
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("Max playlist size must be greater than 0");
        }

        if self.transition_backlog == 0 {
            anyhow::bail!("Transition backlog must be greater than 0");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Limits: {} queue, {} per playlist, {} pending transitions\n  \
            Sources: yt-dlp at {}, elevator music in {}",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            self.max_queue_size,
            self.max_playlist_size,
            self.transition_backlog,
            self.ytdlp_path,
            self.elevator_dir.display()
        )
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .with_context(|| format!("{key} inválido: {value}")),
        _ => Ok(default),
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
            application_id: 0,
            guild_id: None,

            max_queue_size: 1000,
            max_playlist_size: 100,
            transition_backlog: 100,

            elevator_dir: "/app/elevator".into(),
            ytdlp_path: "yt-dlp".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config =
            Config::from_lookup(lookup(&[("DISCORD_TOKEN", "t"), ("APPLICATION_ID", "1")]))
                .unwrap();

        assert_eq!(config.max_queue_size, 1000);
        assert_eq!(config.max_playlist_size, 100);
        assert_eq!(config.transition_backlog, 100);
        assert_eq!(config.elevator_dir, PathBuf::from("/app/elevator"));
        assert_eq!(config.ytdlp_path, "yt-dlp");
        assert_eq!(config.guild_id, None);
        config.validate().unwrap();
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "t"),
            ("APPLICATION_ID", "1"),
            ("GUILD_ID", "99"),
            ("TRANSITION_BACKLOG", " 8 "),
            ("ELEVATOR_DIR", "/srv/lobby"),
        ]))
        .unwrap();

        assert_eq!(config.guild_id, Some(99));
        assert_eq!(config.transition_backlog, 8);
        assert_eq!(config.elevator_dir, PathBuf::from("/srv/lobby"));
    }

    #[test]
    fn missing_token_is_an_error() {
        assert!(Config::from_lookup(lookup(&[("APPLICATION_ID", "1")])).is_err());
    }

    #[test]
    fn garbage_numbers_are_rejected() {
        let result = Config::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "t"),
            ("APPLICATION_ID", "1"),
            ("MAX_QUEUE_SIZE", "mucho"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn zero_backlog_fails_validation() {
        let config = Config {
            discord_token: "t".to_string(),
            transition_backlog: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn summary_hides_the_token() {
        let config = Config {
            discord_token: "super-secret".to_string(),
            ..Config::default()
        };
        assert!(!config.summary().contains("super-secret"));
    }
}
