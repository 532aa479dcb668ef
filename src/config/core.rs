use super::ShardwiseConfig;
use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::Serialize;
use std::path::Path;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

impl ShardwiseConfig {
    /// Load the merged configuration
    ///
    /// Priority, lowest first: embedded defaults, user config, repository
    /// config (both skipped when `custom_config` is given), the custom file,
    /// `SHARDWISE_*` environment variables, then `cli_overrides`.
    pub fn load<T: Serialize>(custom_config: Option<&str>, cli_overrides: Option<T>) -> Result<Self> {
        let figment = Self::figment(custom_config, cli_overrides)?;
        let config: ShardwiseConfig = figment
            .extract()
            .context("Failed to parse shardwise configuration")?;
        tracing::trace!("CONFIG LOAD: {:?}", config);
        Ok(config)
    }

    /// Build the provider chain without extracting it
    pub fn figment<T: Serialize>(custom_config: Option<&str>, cli_overrides: Option<T>) -> Result<Figment> {
        tracing::trace!("CONFIG LOAD: Starting");
        let mut figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG));

        if let Some(custom_path) = custom_config {
            figment = merge_file(figment, custom_path)?;
        } else {
            let user = Self::user_config_base_path();
            figment = figment
                .merge(Toml::file(format!("{user}.toml")))
                .merge(Json::file(format!("{user}.json")))
                .merge(Yaml::file(format!("{user}.yaml")))
                .merge(Yaml::file(format!("{user}.yml")))
                .merge(Toml::file("shardwise.toml"))
                .merge(Json::file("shardwise.json"))
                .merge(Yaml::file("shardwise.yaml"))
                .merge(Yaml::file("shardwise.yml"));
        }

        // Environment variables override every file
        figment = figment.merge(Env::prefixed("SHARDWISE_").split("__"));

        if let Some(cli) = cli_overrides {
            tracing::trace!("CONFIG LOAD: Applying CLI overrides");
            figment = figment.merge(Serialized::defaults(cli));
        }
        Ok(figment)
    }

    fn user_config_base_path() -> String {
        match std::env::var("HOME") {
            Ok(home) => format!("{home}/.config/shardwise/config"),
            Err(_) => "~/.config/shardwise/config".to_string(),
        }
    }
}

/// Merge an explicitly requested file, picking the format from its extension
fn merge_file(figment: Figment, path: &str) -> Result<Figment> {
    if !Path::new(path).is_file() {
        bail!("Config file not found: {path}");
    }
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    Ok(match extension.as_deref() {
        Some("json") => figment.merge(Json::file(path)),
        Some("yaml") | Some("yml") => figment.merge(Yaml::file(path)),
        _ => figment.merge(Toml::file(path)),
    })
}
