use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::catalog::Role;
use crate::providers::providers::ProviderKind;
use crate::{die, warn};

pub(crate) const DEFAULT_BACKEND_URL: &str = "http://localhost:11434";
pub(crate) const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

const PROVIDER_ENV_VAR: &str = "AI_PROVIDER";
const BACKEND_URL_ENV_VAR: &str = "BACKEND_URL";
const LEGACY_BACKEND_URL_ENV_VAR: &str = "OLLAMA_URL";

#[derive(Deserialize, Serialize, Default, Debug)]
pub(crate) struct Backend {
    pub provider: Option<ProviderKind>,
    pub url: Option<String>,
    pub discovery_timeout_secs: Option<u64>,
}

#[derive(Deserialize, Serialize, Default, Debug)]
pub(crate) struct Config {
    #[serde(default)]
    pub backend: Backend,
    /// Pins roles to model ids, e.g. `chat = "llama3"`
    #[serde(default)]
    pub roles: BTreeMap<String, String>,
}

/// The effective settings, after the environment has been applied on top of the
/// configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Settings {
    pub provider: ProviderKind,
    pub backend_url: String,
    pub discovery_timeout: Duration,
    pub pinned_roles: HashMap<Role, String>,
}

impl Settings {
    /// Resolves the settings. `env` looks up an environment variable; empty values are
    /// treated as unset.
    pub(crate) fn resolve<F>(config: &Config, env: F) -> Settings
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let provider = match env(PROVIDER_ENV_VAR) {
            Some(value) => match ProviderKind::from_str(value.trim()) {
                Ok(provider) => provider,
                Err(_) => {
                    warn!(
                        "{} is set to the unknown provider \"{}\", using \"{}\"",
                        PROVIDER_ENV_VAR,
                        value,
                        ProviderKind::default()
                    );

                    ProviderKind::default()
                }
            },
            None => config.backend.provider.unwrap_or_default(),
        };

        let backend_url = env(BACKEND_URL_ENV_VAR)
            .or_else(|| env(LEGACY_BACKEND_URL_ENV_VAR))
            .or_else(|| config.backend.url.clone())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        let discovery_timeout = config
            .backend
            .discovery_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_DISCOVERY_TIMEOUT);

        let mut pinned_roles = HashMap::new();

        for (name, model_id) in &config.roles {
            match Role::from_str(name) {
                Ok(role) => {
                    pinned_roles.insert(role, model_id.clone());
                }
                Err(_) => warn!("config pins the unknown role \"{}\", ignoring", name),
            }
        }

        Settings {
            provider,
            backend_url,
            discovery_timeout,
            pinned_roles,
        }
    }

    pub(crate) fn from_env(config: &Config) -> Settings {
        Self::resolve(config, |key| std::env::var(key).ok())
    }
}

fn get_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME");

    if let Some(home) = home {
        let home = PathBuf::from(home);

        const USER_PATHS: [&str; 2] = [".config/switchboard/config.toml", ".switchboard.toml"];

        for &path in USER_PATHS.iter() {
            let fullpath = home.join(path);

            if fullpath.exists() {
                return Some(fullpath);
            }
        }
    }

    let system_config = PathBuf::from("/etc/switchboard.toml");

    if system_config.exists() {
        Some(system_config)
    } else {
        None
    }
}

fn parse_config<S: serde::de::DeserializeOwned>(config: &str) -> Result<S, toml::de::Error> {
    toml::de::from_str(config)
}

fn parse_config_or_die<S: serde::de::DeserializeOwned>(config: &str) -> S {
    match parse_config(config) {
        Ok(s) => s,
        Err(err) => die!("failed to parse config: {}", err),
    }
}

fn extra_fields_helper<'a>(
    path: &mut Vec<&'a str>,
    user_config: &'a toml::Table,
    config: &'a toml::Table,
    extra: &mut Vec<String>,
) {
    for (user_key, user_value) in user_config {
        path.push(user_key);

        match (user_value, config.get(user_key)) {
            (toml::Value::Table(user_value), Some(toml::Value::Table(config_value))) => {
                extra_fields_helper(path, user_value, config_value, extra)
            }
            (_, Some(_)) => {}
            (_, None) => extra.push(path.join(".")),
        }

        path.pop();
    }
}

/// Returns the dotted paths of keys in `raw_config` which `config` does not use.
fn extra_fields(config: &Config, raw_config: &str) -> Result<Vec<String>, toml::de::Error> {
    let user_config: toml::Table = parse_config(raw_config)?;

    let config: toml::Table = {
        let serialized_config = toml::ser::to_string(config).unwrap_or_default();

        parse_config(&serialized_config)?
    };

    let mut path = Vec::new();
    let mut extra = Vec::new();

    extra_fields_helper(&mut path, &user_config, &config, &mut extra);

    Ok(extra)
}

pub(crate) fn read_config(config: Option<PathBuf>) -> Config {
    let config_path = config.or_else(get_config_path);

    let path = match config_path {
        Some(path) => path,
        None => return Config::default(),
    };

    let raw_config = match std::fs::read_to_string(&path) {
        Ok(raw_config) => raw_config,
        Err(err) => die!("failed to read config {}: {}", path.display(), err),
    };

    let config: Config = parse_config_or_die(&raw_config);

    match extra_fields(&config, &raw_config) {
        Ok(extra) => {
            for key in extra {
                warn!("config contains extraneous key \"{}\", ignoring", key);
            }
        }
        Err(err) => die!("failed to parse config: {}", err),
    }

    config
}
