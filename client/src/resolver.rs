use eyre::{
    Context as _,
    Result,
};
use profile_client_config::{
    Config,
    DEFAULT_PORT,
};
use std::net::IpAddr;

const DEFAULT_SERVER: &str = "localhost";

/// Returns the base URLs of the servers to profile, in the order they were given or resolved.
#[instrument(level = "debug", skip(config))]
pub async fn resolve_hosts(config: &Config) -> Result<Vec<String>> {
    config.validate()?;
    let servers = match &config.dns {
        Some(domain) => lookup_a_records(domain).await?,
        None if config.servers.is_empty() => vec![DEFAULT_SERVER.to_string()],
        None => config.servers.clone(),
    };
    Ok(normalize_hosts(servers, config.port))
}

/// Adds `port` to servers without an explicit one and defaults the scheme to `http://`.
pub fn normalize_hosts(servers: impl IntoIterator<Item = String>, port: u16) -> Vec<String> {
    servers
        .into_iter()
        .map(|server| {
            let (scheme, address) = match server.split_once("://") {
                Some((scheme, address)) => (scheme.to_string(), address.to_string()),
                None => ("http".to_string(), server),
            };
            let address = if port != DEFAULT_PORT && !has_port(&address) {
                let (authority, path) = split_authority(&address);
                format!("{authority}:{port}{path}")
            } else {
                address
            };
            format!("{scheme}://{address}")
        })
        .collect()
}

fn split_authority(address: &str) -> (&str, &str) {
    match address.find('/') {
        Some(index) => address.split_at(index),
        None => (address, ""),
    }
}

fn has_port(address: &str) -> bool {
    let (authority, _) = split_authority(address);
    match authority.strip_prefix('[') {
        Some(bracketed) => bracketed.contains("]:"),
        None => authority.contains(':'),
    }
}

/// IPv4 addresses the system resolver returns for `domain`, duplicates removed.
async fn lookup_a_records(domain: &str) -> Result<Vec<String>> {
    let mut addresses: Vec<String> = Vec::new();
    for addr in tokio::net::lookup_host((domain, 0))
        .await
        .wrap_err_with(|| format!("Failed to resolve '{domain}'"))?
    {
        if let IpAddr::V4(ip) = addr.ip() {
            let ip = ip.to_string();
            if !addresses.contains(&ip) {
                addresses.push(ip);
            }
        }
    }
    if addresses.is_empty() {
        eyre::bail!("'{domain}' has no A records");
    }
    debug!(domain, count = addresses.len(), "resolved servers");
    Ok(addresses)
}
