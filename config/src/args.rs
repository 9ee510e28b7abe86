use crate::SortKey;
use clap::{
    Parser,
    Subcommand,
};
use std::path::PathBuf;

/// Profile a fleet of tornado servers through their tornado-profile endpoints.
#[derive(Parser, Debug, Clone)]
#[command(author, version = version(), about, long_about = None)]
pub struct Args {
    /// Enables debug logging.
    #[clap(short, long, global = true, action)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Get status of tornado profiler.
    Status(TargetArgs),
    /// Start tornado profiler.
    Start(TargetArgs),
    /// Stop tornado profiler.
    Stop(TargetArgs),
    /// Clear tornado profiler stats.
    Clear(TargetArgs),
    /// Get tornado profiler stats.
    Stats(StatsArgs),
}

impl Command {
    pub fn target(&self) -> &TargetArgs {
        match self {
            Command::Status(target) | Command::Start(target) | Command::Stop(target) | Command::Clear(target) => target,
            Command::Stats(stats) => &stats.target,
        }
    }
}

/// Selects the servers a command is sent to.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Default port to use to connect to servers [default: 80].
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Tornado server to profile.
    #[arg(short, long = "server", value_name = "SERVER", num_args = 1.., conflicts_with = "dns")]
    pub servers: Vec<String>,

    /// Connect to all servers returned as A records for this domain. Incompatible with --server.
    #[arg(short, long, value_name = "DOMAIN")]
    pub dns: Option<String>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct StatsArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Display this many top functions [default: 20].
    #[arg(short, long)]
    pub num: Option<u32>,

    /// Order entries based on this field [default: cum_time].
    #[arg(short, long, value_enum)]
    pub order: Option<SortKey>,

    /// Show only basename of functions & files.
    #[arg(long, action)]
    pub strip_dirs: bool,

    /// Don't merge profile results from multiple servers.
    #[arg(long, action)]
    pub no_merge: bool,

    /// Additionally export the report as JSON to this file.
    #[arg(long, value_name = "FILE")]
    pub output_file: Option<PathBuf>,
}

mod config_ext {
    use super::*;
    use config::{
        Map,
        Source,
        Value,
        ValueKind,
    };
    use std::collections::HashMap;

    impl Source for Args {
        fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
            Box::new((*self).clone())
        }

        fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
            let mut cache = HashMap::<String, Value>::new();
            let target = self.command.target();
            if let Some(port) = target.port {
                cache.insert("port".to_string(), (port as u64).into());
            }
            // `--server` and `--dns` replace each other's value from lower layers.
            if !target.servers.is_empty() {
                cache.insert("servers".to_string(), target.servers.clone().into());
                cache.insert("dns".to_string(), ValueKind::Nil.into());
            }
            if let Some(dns) = &target.dns {
                cache.insert("dns".to_string(), dns.clone().into());
                cache.insert("servers".to_string(), Vec::<String>::new().into());
            }
            if let Command::Stats(stats) = &self.command {
                if let Some(num) = stats.num {
                    cache.insert("stats.count".to_string(), (num as u64).into());
                }
                if let Some(order) = stats.order {
                    cache.insert("stats.order".to_string(), order.as_str().into());
                }
                if stats.strip_dirs {
                    cache.insert("stats.strip_dirs".to_string(), true.into());
                }
                if stats.no_merge {
                    cache.insert("stats.merge".to_string(), false.into());
                }
            }
            Ok(cache)
        }
    }
}

pub fn version() -> String {
    let author = clap::crate_authors!();
    let config_dir_path = crate::get_config_dir().display().to_string();

    format!(
        "{}

Authors: {author}

Config directory: {config_dir_path}",
        clap::crate_version!()
    )
}
