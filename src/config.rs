use std::{collections::HashSet, env::VarError, num::ParseIntError, path::PathBuf};

use chrono::Duration;
use fishing::{store::DEFAULT_LIMIT, CooldownWindow, FisheryConfig};
use miette::Diagnostic;
use secrecy::{ExposeSecret, SecretString};
use twitch_irc::{login::StaticLoginCredentials, ClientConfig};

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error("env var {name} is not set")]
    #[diagnostic(code(config::env_var_not_set))]
    EnvVarNotSet {
        source: VarError,
        name: &'static str,
    },

    #[error("env var {name} is not a number: {value:?}")]
    #[diagnostic(code(config::invalid_number))]
    InvalidNumber {
        source: ParseIntError,
        name: &'static str,
        value: String,
    },
}

#[derive(Debug)]
pub struct Config {
    pub species_json: PathBuf,
    pub database_url: String,
    pub username: String,
    pub token: SecretString,
    pub channels: HashSet<String>,
    pub fishery: FisheryConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name))
    }

    /// Builds the configuration from `lookup`, which behaves like [`std::env::var`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&'static str) -> Result<String, VarError>,
    {
        let env_var = |name: &'static str| {
            lookup(name).map_err(|source| Error::EnvVarNotSet { source, name })
        };
        let seconds = |name: &'static str, default: u32| -> Result<Duration, Error> {
            match lookup(name) {
                Ok(value) => value
                    .trim()
                    .parse::<u32>()
                    .map(|seconds| Duration::seconds(seconds.into()))
                    .map_err(|source| Error::InvalidNumber { source, name, value }),
                Err(_) => Ok(Duration::seconds(default.into())),
            }
        };

        let channels = env_var("CHANNELS")?
            .split(',')
            .map(|channel| channel.trim().to_lowercase())
            .filter(|channel| !channel.is_empty())
            .collect();

        Ok(Self {
            species_json: env_var("SPECIES_JSON")?.into(),
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|_| database::DATABASE_URL.to_string()),
            username: env_var("TWITCH_USERNAME")?,
            token: SecretString::new(env_var("TWITCH_TOKEN")?),
            channels,
            fishery: FisheryConfig {
                fishing_cooldown: CooldownWindow::new(
                    seconds("COOLDOWN_FISHING_MIN", 240)?,
                    seconds("COOLDOWN_FISHING_MAX", 300)?,
                ),
                leaderboard_cooldown: CooldownWindow::new(
                    seconds("COOLDOWN_LEADERBOARD_MIN", 30)?,
                    seconds("COOLDOWN_LEADERBOARD_MAX", 30)?,
                ),
                leaderboard_size: DEFAULT_LIMIT,
            },
        })
    }

    pub fn client_config(&self) -> ClientConfig<StaticLoginCredentials> {
        // twitch-irc adds the prefix itself
        let token = self.token.expose_secret();
        let token = token.strip_prefix("oauth:").unwrap_or(token);

        ClientConfig::new_simple(StaticLoginCredentials::new(
            self.username.clone(),
            Some(token.to_string()),
        ))
    }
}
