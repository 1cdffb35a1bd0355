use crate::client::ClientConfig;
use crate::fabric::unix::UnixFabric;
use crate::name::{EndpointName, FlowSpec};
use crate::server::{ServerConfig, TimeoutScope};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line surface of the echo tool
///
/// One binary, two modes: by default a one-shot probe client, with
/// `-l/--listen` an echo server.
#[derive(Parser, Debug)]
#[command(
    name = "flowrr",
    version,
    about = "Request/response echo client and server over named flows"
)]
pub struct Cli {
    /// Run in server mode
    #[arg(short = 'l', long = "listen")]
    pub listen: bool,

    /// DIF to register to or ask for flow allocation
    #[arg(short = 'd', long = "dif", value_name = "NAME")]
    pub dif: Option<String>,

    /// Flow specification (QoS cube name)
    #[arg(
        short = 'f',
        long = "flow-spec",
        value_name = "NAME",
        default_value = FlowSpec::DEFAULT_CUBE
    )]
    pub flow_spec: String,

    /// IPCP APN; pins an intermediate process and overrides --dif
    #[arg(short = 'p', long = "ipcp-apn", value_name = "NAME")]
    pub ipcp_apn: Option<String>,

    /// IPCP API; ignored unless --ipcp-apn is given
    #[arg(short = 'P', long = "ipcp-api", value_name = "NAME")]
    pub ipcp_api: Option<String>,

    /// Client APN
    #[arg(
        short = 'a',
        long = "client-apn",
        value_name = "NAME",
        default_value = "rlite_rr-data"
    )]
    pub client_apn: String,

    /// Client API
    #[arg(
        short = 'A',
        long = "client-api",
        value_name = "NAME",
        default_value = "client"
    )]
    pub client_api: String,

    /// Server APN
    #[arg(
        short = 'z',
        long = "server-apn",
        value_name = "NAME",
        default_value = "rlite_rr-data"
    )]
    pub server_apn: String,

    /// Server API
    #[arg(
        short = 'Z',
        long = "server-api",
        value_name = "NAME",
        default_value = "server"
    )]
    pub server_api: String,

    /// Readability deadline in milliseconds
    #[arg(long = "timeout-ms", value_name = "MS", default_value_t = 3000)]
    pub timeout_ms: u64,

    /// Stop the whole server when one flow times out, instead of
    /// dropping only that flow
    #[arg(long = "strict-timeout")]
    pub strict_timeout: bool,

    /// Root directory of the Unix socket fabric
    #[arg(
        long = "fabric-root",
        value_name = "DIR",
        default_value = UnixFabric::DEFAULT_ROOT
    )]
    pub fabric_root: PathBuf,
}

impl Cli {
    /// Intermediate process name; an API without an APN is ignored
    pub fn ipcp_name(&self) -> EndpointName {
        match &self.ipcp_apn {
            Some(apn) => EndpointName::new(Some(apn.clone()), self.ipcp_api.clone()),
            None => EndpointName::unset(),
        }
    }

    pub fn client_name(&self) -> EndpointName {
        EndpointName::new(Some(self.client_apn.clone()), Some(self.client_api.clone()))
    }

    pub fn server_name(&self) -> EndpointName {
        EndpointName::new(Some(self.server_apn.clone()), Some(self.server_api.clone()))
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            dif: self.dif.clone(),
            ipcp: self.ipcp_name(),
            local: self.client_name(),
            remote: self.server_name(),
            spec: FlowSpec::new(&self.flow_spec),
            read_timeout: Duration::from_millis(self.timeout_ms),
            ..ClientConfig::default()
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            dif: self.dif.clone(),
            ipcp: self.ipcp_name(),
            name: self.server_name(),
            read_timeout: Duration::from_millis(self.timeout_ms),
            timeout_scope: if self.strict_timeout {
                TimeoutScope::Server
            } else {
                TimeoutScope::Connection
            },
            ..ServerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DEFAULT_PROBE;

    #[test]
    fn defaults_match_historical_tool() {
        let cli = Cli::try_parse_from(["flowrr"]).expect("bare invocation should parse");

        assert!(!cli.listen);
        assert_eq!(cli.client_name().to_string(), "rlite_rr-data/client");
        assert_eq!(cli.server_name().to_string(), "rlite_rr-data/server");
        assert_eq!(cli.flow_spec, "unreliable best-effort");
        assert!(!cli.ipcp_name().is_set());

        let config = cli.client_config();
        assert_eq!(config.payload, DEFAULT_PROBE);
        assert_eq!(config.read_timeout, Duration::from_millis(3000));
    }

    #[test]
    fn ipcp_api_without_apn_is_ignored() {
        let cli = Cli::try_parse_from(["flowrr", "-P", "7"]).expect("args should parse");
        assert!(!cli.ipcp_name().is_set());

        let cli = Cli::try_parse_from(["flowrr", "-p", "normal", "-P", "7"])
            .expect("args should parse");
        assert_eq!(cli.ipcp_name().to_string(), "normal/7");
    }

    #[test]
    fn short_flags_select_names_and_mode() {
        let cli = Cli::try_parse_from([
            "flowrr", "-l", "-d", "n.DIF", "-z", "echo-svc", "-Z", "2",
        ])
        .expect("args should parse");

        assert!(cli.listen);
        let config = cli.server_config();
        assert_eq!(config.dif.as_deref(), Some("n.DIF"));
        assert_eq!(config.name.to_string(), "echo-svc/2");
        assert_eq!(config.timeout_scope, TimeoutScope::Connection);
    }

    #[test]
    fn strict_timeout_widens_failure_scope() {
        let cli = Cli::try_parse_from(["flowrr", "-l", "--strict-timeout"])
            .expect("args should parse");
        assert_eq!(cli.server_config().timeout_scope, TimeoutScope::Server);
    }
}
