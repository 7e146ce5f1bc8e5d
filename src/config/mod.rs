use std::{
    fmt::Display,
    net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs},
    path::Path,
    str::FromStr,
    time::Duration,
};

use eyre::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment, Provider,
};
use serde::{Deserialize, Deserializer, Serialize};

/// Prefix of environment variables overriding config values
pub const ENV_PREFIX: &str = "NODESTATE_EXPORTER_";

/// Exporter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Upstream JSON-RPC endpoint queried on every scrape
    pub rpc_address: String,
    /// Listen address of the metrics server. Accepts `:9090`, `9090` or `host:port`
    #[serde(deserialize_with = "string_or_port")]
    pub port: String,
    /// What a failed scrape does to the process
    pub failure_policy: FailurePolicy,
    /// Optional upstream request timeout in seconds. Unset means no timeout
    pub rpc_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_address: "http://127.0.0.1:3032".to_string(),
            port: ":9090".to_string(),
            failure_policy: FailurePolicy::default(),
            rpc_timeout_secs: None,
        }
    }
}

impl Config {
    /// Layers defaults, the toml file at `config_path` (if it exists),
    /// `NODESTATE_EXPORTER_*` environment variables and finally the cli values.
    pub fn new(config_path: &Path, cli_config: impl Provider) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed(ENV_PREFIX))
            .merge(cli_config)
            .extract()?;

        Ok(config)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        parse_listen_address(&self.port)
    }

    pub fn rpc_timeout(&self) -> Option<Duration> {
        self.rpc_timeout_secs.map(Duration::from_secs)
    }
}

/// Behaviour of a scrape whose upstream poll fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log and terminate the process with exit code 1
    #[default]
    Exit,
    /// Log and answer the scrape with 502, keeping the previous gauge values
    Respond,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exit" => Ok(Self::Exit),
            "respond" => Ok(Self::Respond),
            _ => Err(format!("invalid failure policy: {s}, expected exit or respond")),
        }
    }
}

impl Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exit => write!(f, "exit"),
            Self::Respond => write!(f, "respond"),
        }
    }
}

/// Parses a listen address.
///
/// A missing host (`:9090`) or a bare port (`9090`) binds every interface.
pub fn parse_listen_address(address: &str) -> Result<SocketAddr> {
    let address = address.trim();

    if let Some(port) = address.strip_prefix(':') {
        return Ok(any_interface(parse_port(port)?));
    }

    if !address.contains(':') {
        return Ok(any_interface(parse_port(address)?));
    }

    if let Ok(addr) = address.parse::<SocketAddr>() {
        return Ok(addr);
    }

    address
        .to_socket_addrs()
        .map_err(|e| eyre::eyre!("invalid listen address {address}: {e}"))?
        .next()
        .ok_or(eyre::eyre!("listen address {address} did not resolve"))
}

/// Environment values like `NODESTATE_EXPORTER_PORT=9090` arrive as integers
fn string_or_port<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Address(String),
        Number(u16),
    }

    Ok(match Port::deserialize(deserializer)? {
        Port::Address(address) => address,
        Port::Number(port) => port.to_string(),
    })
}

fn parse_port(port: &str) -> Result<u16> {
    port.parse::<u16>()
        .map_err(|_| eyre::eyre!("invalid listen port: {port}"))
}

fn any_interface(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use figment::value::Value;

    use super::*;

    fn no_cli() -> Serialized<HashMap<&'static str, Value>> {
        Serialized::from(HashMap::new(), "default".to_string())
    }

    #[test]
    fn go_style_port_binds_all_interfaces() {
        let addr = parse_listen_address(":9090").unwrap();
        assert_eq!(addr, "0.0.0.0:9090".parse().unwrap());

        let addr = parse_listen_address("9100").unwrap();
        assert_eq!(addr, "0.0.0.0:9100".parse().unwrap());
    }

    #[test]
    fn full_addresses_are_kept() {
        let addr = parse_listen_address("127.0.0.1:9090").unwrap();
        assert_eq!(addr, "127.0.0.1:9090".parse().unwrap());

        let addr = parse_listen_address("[::1]:9090").unwrap();
        assert_eq!(addr, "[::1]:9090".parse().unwrap());
    }

    #[test]
    fn invalid_ports_are_rejected() {
        assert!(parse_listen_address(":http").is_err());
        assert!(parse_listen_address("70000").is_err());
        assert!(parse_listen_address("").is_err());
    }

    #[test]
    fn failure_policy_parses() {
        assert_eq!("exit".parse::<FailurePolicy>().unwrap(), FailurePolicy::Exit);
        assert_eq!(
            "respond".parse::<FailurePolicy>().unwrap(),
            FailurePolicy::Respond
        );
        assert!("retry".parse::<FailurePolicy>().is_err());
        assert_eq!(FailurePolicy::Respond.to_string(), "respond");
    }

    #[test]
    fn defaults_without_file_env_or_cli() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::new(Path::new("missing.toml"), no_cli())
                .map_err(|e| e.to_string())?;
            assert_eq!(config, Config::default());
            assert_eq!(config.rpc_timeout(), None);
            Ok(())
        });
    }

    #[test]
    fn layers_override_in_order() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                rpc_address = "http://node:3032"
                port = ":9100"
                rpc_timeout_secs = 5
                "#,
            )?;
            jail.set_env("NODESTATE_EXPORTER_PORT", ":9200");
            jail.set_env("NODESTATE_EXPORTER_FAILURE_POLICY", "respond");

            let mut cli = HashMap::new();
            cli.insert("port", Value::from(":9300".to_string()));
            let cli = Serialized::from(cli, "default".to_string());

            let config =
                Config::new(Path::new("config.toml"), cli).map_err(|e| e.to_string())?;

            assert_eq!(config.rpc_address, "http://node:3032");
            assert_eq!(config.port, ":9300");
            assert_eq!(config.failure_policy, FailurePolicy::Respond);
            assert_eq!(config.rpc_timeout(), Some(Duration::from_secs(5)));
            Ok(())
        });
    }

    #[test]
    fn numeric_port_from_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("NODESTATE_EXPORTER_PORT", "9100");

            let config = Config::new(Path::new("missing.toml"), no_cli())
                .map_err(|e| e.to_string())?;

            assert_eq!(config.port, "9100");
            assert_eq!(
                config.listen_addr().map_err(|e| e.to_string())?,
                "0.0.0.0:9100".parse::<SocketAddr>().unwrap()
            );
            Ok(())
        });
    }
}
