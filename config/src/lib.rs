//! Settings for the profile client.
//!
//! Values are layered, later sources winning: the built-in `default-config.yaml`, an optional
//! `config.yaml` in the user config directory, then the command line.

#[macro_use]
extern crate tracing;

mod app_config;
mod args;
mod sort_key;

pub use app_config::get_config_dir;
pub use args::{
    Args,
    Command,
    StatsArgs,
    TargetArgs,
};
use eyre::{
    bail,
    Context as _,
    Result,
};
use serde::{
    Deserialize,
    Serialize,
};
pub use sort_key::SortKey;
use std::{
    path::Path,
    time::Duration,
};

/// Port that is never appended to a server address.
pub const DEFAULT_PORT: u16 = 80;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub servers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<String>,
    pub request_timeout: String,
    #[serde(default)]
    pub stats: StatsConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsConfig {
    pub count: u32,
    pub order: SortKey,
    #[serde(default)]
    pub strip_dirs: bool,
    pub merge: bool,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            count: 20,
            order: SortKey::default(),
            strip_dirs: false,
            merge: true,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");

impl Default for Config {
    fn default() -> Self {
        serde_yml::from_str(DEFAULT_CONFIG).expect("Failed to parse default config")
    }
}

impl Config {
    pub fn new(args: &Args) -> Result<Self, config::ConfigError> {
        Self::load(args, &get_config_dir())
    }

    /// Like [`Config::new`], reading `config.yaml` from `config_dir`.
    pub fn load(args: &Args, config_dir: &Path) -> Result<Self, config::ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Yaml));

        let config_files = [("config.yaml", config::FileFormat::Yaml)];

        for (file, format) in &config_files {
            let source = config::File::from(config_dir.join(file))
                .format(*format)
                .required(false);
            builder = builder.add_source(source);
        }

        builder = builder.add_source(args.clone());

        let cfg: Self = builder.build()?.try_deserialize()?;
        debug!(config_dir = %config_dir.display(), "loaded configuration");

        Ok(cfg)
    }

    /// Rejects settings that cannot be acted upon. Runs before any request is sent.
    pub fn validate(&self) -> Result<()> {
        if self.dns.is_some() && !self.servers.is_empty() {
            bail!("Can't define both `dns` and `server` options.");
        }
        if matches!(&self.dns, Some(dns) if dns.trim().is_empty()) {
            bail!("`dns` must name a domain");
        }
        self.request_timeout()?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.request_timeout)
            .wrap_err_with(|| format!("Invalid request timeout '{}'", self.request_timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use temp_dir::TempDir;

    fn parse(args: &[&str]) -> Args {
        let mut argv = vec!["tornado-profile-client"];
        argv.extend_from_slice(args);
        Args::parse_from(argv)
    }

    fn config_dir(config_yaml: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.child("config.yaml"), config_yaml).unwrap();
        dir
    }

    #[test]
    fn default_config_parses() {
        let config = Config::default();
        assert_eq!(config.port, 80);
        assert!(config.servers.is_empty());
        assert_eq!(config.dns, None);
        assert_eq!(config.request_timeout().unwrap(), Duration::from_secs(30));
        assert_eq!(config.stats, StatsConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn args_override_defaults() {
        let dir = TempDir::new().unwrap();
        let args = parse(&[
            "stats",
            "--server",
            "10.0.0.1",
            "--port",
            "8888",
            "--num",
            "3",
            "--order",
            "num_calls",
            "--no-merge",
        ]);
        let config = Config::load(&args, dir.path()).unwrap();

        assert_eq!(config.port, 8888);
        assert_eq!(config.servers, vec!["10.0.0.1".to_string()]);
        assert_eq!(
            config.stats,
            StatsConfig {
                count: 3,
                order: SortKey::NumCalls,
                strip_dirs: false,
                merge: false,
            }
        );
    }

    #[test]
    fn config_file_is_layered_under_args() {
        let dir = config_dir("port: 8000\nstats:\n  count: 5\n");

        let config = Config::load(&parse(&["stats", "-n", "7"]), dir.path()).unwrap();

        assert_eq!(config.port, 8000);
        assert_eq!(config.stats.count, 7);
        assert_eq!(config.stats.order, SortKey::CumTime);
    }

    #[test]
    fn cli_dns_replaces_configured_servers() {
        let dir = config_dir("servers: [\"10.0.0.1\"]\n");

        let config = Config::load(&parse(&["status", "-d", "example.com"]), dir.path()).unwrap();

        assert!(config.servers.is_empty());
        assert_eq!(config.dns.as_deref(), Some("example.com"));
        config.validate().unwrap();
    }

    #[test]
    fn cli_servers_replace_configured_dns() {
        let dir = config_dir("dns: example.com\n");

        let config = Config::load(&parse(&["status", "-s", "10.0.0.2"]), dir.path()).unwrap();

        assert_eq!(config.servers, vec!["10.0.0.2".to_string()]);
        assert_eq!(config.dns, None);
        config.validate().unwrap();
    }

    #[test]
    fn dns_and_servers_in_one_file_are_rejected() {
        let dir = config_dir("dns: example.com\nservers: [\"10.0.0.1\"]\n");

        let config = Config::load(&parse(&["status"]), dir.path()).unwrap();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Can't define both"));
    }

    #[test]
    fn dns_and_servers_are_exclusive() {
        let config = Config {
            dns: Some("profile.example.com".to_string()),
            servers: vec!["10.0.0.1".to_string()],
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Can't define both"));
    }

    #[test]
    fn invalid_timeout_is_a_configuration_error() {
        let config = Config {
            request_timeout: "soon".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
