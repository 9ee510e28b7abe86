use color_eyre::Result;
use eyre::Context as _;
use profile_client_config::{
    Args,
    Command,
    Config,
    StatsArgs,
};
use profile_client_core::{
    aggregate,
    render::render_table,
    resolve_hosts,
    AggregateOptions,
    Invoker,
    Record,
    RemoteResult,
    Request,
};

pub struct App {
    config: Config,
    command: Command,
    invoker: Invoker,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        let config = Config::new(&args).wrap_err("Failed to load configuration")?;
        config.validate()?;
        let invoker = Invoker::new(config.request_timeout()?)?;
        Ok(Self {
            config,
            command: args.command,
            invoker,
        })
    }

    pub async fn run(self) -> Result<()> {
        let hosts = resolve_hosts(&self.config).await?;
        println!("{}", banner(&hosts));
        print!("{}", self.report(&hosts).await?);
        Ok(())
    }

    /// Sends the command to every host and renders the answers.
    pub async fn report(&self, hosts: &[String]) -> Result<String> {
        let request = match &self.command {
            Command::Status(_) => Request::status(),
            Command::Start(_) => Request::start(),
            Command::Stop(_) => Request::stop(),
            Command::Clear(_) => Request::clear(),
            Command::Stats(args) => return self.stats_report(hosts, args).await,
        };

        let records: Vec<Record> = self
            .invoker
            .invoke_all(hosts, &request)
            .await
            .into_iter()
            .map(RemoteResult::into_record)
            .collect();
        Ok(format!("{}\n", render_table(&records, &["host"], &[])))
    }

    async fn stats_report(&self, hosts: &[String], args: &StatsArgs) -> Result<String> {
        let settings = &self.config.stats;
        let results = self.invoker.invoke_all(hosts, &Request::stats(settings)).await;
        let report = aggregate(results, AggregateOptions::from(settings))
            .wrap_err("Servers returned malformed profiler statistics")?;

        let mut output = String::new();
        if let Some(errors) = report.error_table() {
            output.push_str(&format!("{errors}\n\n"));
        }
        if report.is_empty() {
            warn!("no statistics to report");
        } else {
            output.push_str(&format!("{}\n", report.table()));
        }

        if let Some(output_file) = &args.output_file {
            let json_string = serde_json::to_string_pretty(&report.summary())?;
            tokio::fs::write(output_file, json_string)
                .await
                .wrap_err_with(|| format!("Failed to write report to {}", output_file.display()))?;
            info!("Report exported to {}", output_file.display());
        }

        Ok(output)
    }
}

fn banner(hosts: &[String]) -> String {
    let mut banner = String::from("Will profile servers:\n");
    for host in hosts {
        banner.push_str(&format!("- {host}\n"));
    }
    banner
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use serde_json::{
        json,
        Value,
    };
    use std::sync::OnceLock;
    use temp_dir::TempDir;
    use tokio::{
        io::{
            AsyncReadExt,
            AsyncWriteExt,
        },
        net::TcpListener,
    };

    /// Fake tornado-profile server answering every connection with `body`.
    async fn profiler(body: Value) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let body = body.to_string();
        tokio::spawn(async move {
            loop {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 8192];
                let mut read = 0;
                loop {
                    let n = socket.read(&mut buf[read..]).await.unwrap();
                    read += n;
                    if n == 0 || buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });
        format!("http://{addr}")
    }

    /// Server that accepts connections and closes them without answering.
    async fn broken_host() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let (socket, _) = listener.accept().await.unwrap();
                drop(socket);
            }
        });
        format!("http://{addr}")
    }

    /// Points the config directory at an empty folder so a local `config.yaml` can't leak in.
    fn isolate_config_dir() {
        static CONFIG_DIR: OnceLock<TempDir> = OnceLock::new();
        CONFIG_DIR.get_or_init(|| {
            let dir = TempDir::new().unwrap();
            std::env::set_var("TORNADO_PROFILE_CLIENT_CONFIG", dir.path());
            dir
        });
    }

    fn app(args: &[&str]) -> App {
        isolate_config_dir();
        let mut argv = vec!["tornado-profile-client"];
        argv.extend_from_slice(args);
        App::new(Args::parse_from(argv)).unwrap()
    }

    #[test]
    fn config_dir_is_isolated() {
        isolate_config_dir();
        let dir = profile_client_config::get_config_dir();
        assert!(dir.is_dir());
        assert!(!dir.join("config.yaml").exists());
    }

    #[test]
    fn banner_lists_hosts() {
        assert_eq!(
            banner(&["http://a".to_string(), "http://b:8888".to_string()]),
            "Will profile servers:\n- http://a\n- http://b:8888\n"
        );
    }

    #[tokio::test]
    async fn status_renders_document_fields() {
        let host = profiler(json!({"running": true})).await;
        let down = broken_host().await;
        let app = app(&["status", "-s", &host]);

        let output = app.report(&[host.clone(), down.clone()]).await.unwrap();

        assert!(output.contains("running"));
        assert!(output.contains("true"));
        assert!(output.contains("error"));
    }

    #[tokio::test]
    async fn stats_merges_hosts_and_exports_json() {
        let statistics = json!({"statistics": [
            {"path": "f.py", "line": 10, "func_name": "foo", "total_time": 1.0, "cum_time": 2.0, "num_calls": 1},
        ]});
        let first = profiler(statistics.clone()).await;
        let second = profiler(statistics).await;
        let down = broken_host().await;
        let dir = TempDir::new().unwrap();
        let export = dir.child("report.json");
        let app = app(&["stats", "-s", &first, "--output-file", export.to_str().unwrap()]);

        let output = app.report(&[first, down.clone(), second]).await.unwrap();

        assert!(output.contains("f.py:10"));
        let error_position = output.find(&down).unwrap();
        let stats_position = output.find("f.py:10").unwrap();
        assert!(error_position < stats_position);

        let exported: Value = serde_json::from_str(&std::fs::read_to_string(&export).unwrap()).unwrap();
        assert_eq!(exported["merged"], json!(true));
        assert_eq!(exported["errors"][0]["host"], json!(down));
        assert_eq!(exported["statistics"][0]["num_calls"], json!(2));
        assert_eq!(exported["statistics"][0]["cum_time_per_call"], json!("0:00:02.000000"));
    }

    #[tokio::test]
    async fn stats_without_results_prints_only_errors() {
        let down = broken_host().await;
        let app = app(&["stats", "-s", &down]);

        let output = app.report(&[down.clone()]).await.unwrap();

        assert!(output.contains(&down));
        assert!(!output.contains("func_name"));
    }
}
