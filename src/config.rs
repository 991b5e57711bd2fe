use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Shell out to the GitHub CLI.
    Gh,
    /// Call the REST API directly.
    Api,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    pub repo_path: PathBuf,
    pub github_token: Option<String>,
    pub host: String,
    pub branch: String,
    pub backend: Backend,
    pub gh_path: PathBuf,
    pub sync_branch: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("repo_path", &self.repo_path)
            .field("github_token", &self.github_token.as_ref().map(|_| "[REDACTED]"))
            .field("host", &self.host)
            .field("branch", &self.branch)
            .field("backend", &self.backend)
            .field("gh_path", &self.gh_path)
            .field("sync_branch", &self.sync_branch)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo_path: PathBuf::from("."),
            github_token: None,
            host: "github.com".to_string(),
            branch: "main".to_string(),
            backend: Backend::Gh,
            gh_path: PathBuf::from("gh"),
            sync_branch: true,
        }
    }
}

/// Command-line values; unset fields leave lower layers alone.
#[derive(Debug, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<Backend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_branch: Option<bool>,
}

impl Config {
    pub fn load(overrides: Overrides) -> Self {
        let config_file = config_dir().join("forkstrap").join("config.toml");

        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if config_file.exists() {
            figment = figment.merge(Toml::file(&config_file));
        }

        // GH_TOKEN takes precedence over GITHUB_TOKEN, as in gh itself
        figment = figment
            .merge(Env::prefixed("FORKSTRAP_"))
            .merge(
                Env::raw()
                    .only(&["GITHUB_TOKEN"])
                    .map(|_| "github_token".into()),
            )
            .merge(Env::raw().only(&["GH_TOKEN"]).map(|_| "github_token".into()))
            .merge(Serialized::defaults(overrides));

        match figment.extract() {
            Ok(config) => config,
            Err(e) => {
                warn!("warning: config parse error, using defaults: {e}");
                Config::default()
            }
        }
    }

    /// Ambient token, ignoring empty values.
    pub fn token(&self) -> Option<&str> {
        self.github_token.as_deref().filter(|t| !t.is_empty())
    }
}

pub fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
        .unwrap_or_else(|| PathBuf::from("."))
}
