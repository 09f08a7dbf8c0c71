use anyhow::Context;
use serde::Deserialize;
use std::path::PathBuf;

/// Config, read from the TOML file given as the first CLI argument.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// <address>:<port> to serve the blog API
    pub listen_address: String,

    /// <address>:<port> to serve metrics on
    pub metrics_address: String,

    /// By default, output JSON logs. Only if this flag is set to true, output colourful human-friendly logs
    #[serde(default)]
    pub human_logs: bool,

    /// Max HTTP body size the API accepts
    #[serde(default = "max_body_size")]
    pub max_body_size: usize,

    /// Snapshot file holding every user and post.
    #[serde(default = "data_file")]
    pub data_file: PathBuf,

    /// Refuse to start if the snapshot exists but can't be read, instead of starting empty.
    #[serde(default)]
    pub strict_restore: bool,
}

impl Config {
    pub fn from_file(filepath: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(filepath)
            .with_context(|| format!("couldn't read config file {}", filepath))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        toml::from_str(contents).context("couldn't parse config file")
    }
}

fn max_body_size() -> usize {
    65536
}

fn data_file() -> PathBuf {
    PathBuf::from("data.json")
}
