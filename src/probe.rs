//! Send a single A query to one nameserver and report what came back.
//!
//! The nameserver is either given explicitly or taken from the first entry of
//! the system resolver configuration. There is exactly one attempt, a
//! transport failure is reported and swallowed, while a bad configuration or
//! an unsuccessful response code is returned as [`ProbeError`].

use std::fmt::{Display, Formatter};
use std::net::{AddrParseError, IpAddr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use exitcode::ExitCode;
use resolver::{Client, Config, Query, RCode, Record, RecordClass, RecordData, RecordType};
use tracing::{debug, info, warn};

pub const DEFAULT_HOST: &str = "google.com";
pub const RESOLV_CONF_PATH: &str = "/etc/resolv.conf";

/// Bounds name resolution, bind and connect of the UDP socket.
pub const DIAL_TIMEOUT: Duration = Duration::from_millis(500);
/// Bounds the whole request, starting right before the query is sent.
pub const REQUEST_DEADLINE: Duration = Duration::from_secs(3);

#[derive(Clone, Debug)]
pub struct Options {
    /// Nameserver host, `None` or empty means the resolver configuration is used
    pub nameserver: Option<String>,
    /// Nameserver port, only used together with `nameserver`
    pub port: u16,
    /// Host to look up A records for
    pub host: String,
    /// Local IP address the request is sent from
    pub from_address: Option<String>,
    pub resolv_conf: PathBuf,
    pub deadline: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            nameserver: None,
            port: resolver::DEFAULT_PORT,
            host: DEFAULT_HOST.to_string(),
            from_address: None,
            resolv_conf: PathBuf::from(RESOLV_CONF_PATH),
            deadline: REQUEST_DEADLINE,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.host.parse::<Ipv6Addr>().is_ok() {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Endpoint {
            host: addr.ip().to_string(),
            port: addr.port(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("parse {}: {source}", path.display())]
    ResolvConf {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no nameserver found in {}", path.display())]
    NoNameserver { path: PathBuf },

    #[error("invalid source address {addr:?}: {source}")]
    SourceAddress {
        addr: String,
        source: AddrParseError,
    },

    #[error("Unexpected RCode: {} {}", .0.to_u16(), .0)]
    ResponseCode(RCode),
}

impl ProbeError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            ProbeError::ResolvConf { .. }
            | ProbeError::NoNameserver { .. }
            | ProbeError::SourceAddress { .. } => exitcode::CONFIG,
            ProbeError::ResponseCode(_) => exitcode::PROTOCOL,
        }
    }
}

/// Failures on the wire, reported but not fatal.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("i/o timeout")]
    Timeout,

    #[error(transparent)]
    Exchange(#[from] resolver::Error),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout | TransportError::Exchange(resolver::Error::DialTimeout(_))
        )
    }
}

#[derive(Debug)]
pub enum Outcome {
    Answered {
        rtt: Duration,
        records: Vec<Record>,
    },

    Failed {
        elapsed: Duration,
        err: TransportError,
    },
}

/// Figure out which nameserver to talk to.
pub fn endpoint(options: &Options) -> Result<Endpoint, ProbeError> {
    if let Some(host) = options.nameserver.as_deref().filter(|ns| !ns.is_empty()) {
        let host = host.trim_start_matches('[').trim_end_matches(']');

        return Ok(Endpoint {
            host: host.to_string(),
            port: options.port,
        });
    }

    let config = Config::load(&options.resolv_conf).map_err(|source| ProbeError::ResolvConf {
        path: options.resolv_conf.clone(),
        source,
    })?;

    config
        .first_server()
        .map(Endpoint::from)
        .ok_or_else(|| ProbeError::NoNameserver {
            path: options.resolv_conf.clone(),
        })
}

fn build_client(options: &Options) -> Result<Client, ProbeError> {
    let client = Client::default().with_dial_timeout(DIAL_TIMEOUT);

    match options.from_address.as_deref().filter(|addr| !addr.is_empty()) {
        Some(addr) => {
            let ip = addr
                .parse::<IpAddr>()
                .map_err(|source| ProbeError::SourceAddress {
                    addr: addr.to_string(),
                    source,
                })?;

            Ok(client.with_local_addr(ip))
        }
        None => Ok(client),
    }
}

/// One line per answer, A and AAAA print their address, everything else
/// falls back to the presentation form of the record.
pub fn describe_record(index: usize, record: &Record) -> String {
    let ttl = record.ttl;

    match &record.data {
        RecordData::A(addr) => format!("RR #{index}: TTL: {ttl}s; IPADDR: {addr}"),
        RecordData::AAAA(addr) => format!("RR #{index}: TTL: {ttl}s; IPADDR: {addr}"),
        _ => format!("RR #{index}: UNEXPECTED TYPE: {record}"),
    }
}

pub async fn resolve(options: &Options) -> Result<Outcome, ProbeError> {
    let endpoint = endpoint(options)?;
    info!(message = "Using dns server", %endpoint);

    let client = build_client(options)?;

    let query =
        Query::new(&options.host, RecordType::A, RecordClass::INET).recursion_desired(true);
    debug!(
        message = "Sending query",
        id = query.id(),
        name = %String::from_utf8_lossy(&query.question().name)
    );

    let start = Instant::now();
    let result = tokio::time::timeout(
        options.deadline,
        client.exchange(&query, (endpoint.host.as_str(), endpoint.port)),
    )
    .await;

    let (msg, rtt) = match result {
        Ok(Ok(resp)) => resp,
        Ok(Err(err)) => return Ok(failed(start.elapsed(), err.into())),
        Err(_) => return Ok(failed(start.elapsed(), TransportError::Timeout)),
    };

    let rcode = msg.header.response_code();
    if rcode != RCode::Success {
        return Err(ProbeError::ResponseCode(rcode));
    }

    info!(
        message = "Response received",
        ?rtt,
        authoritative = msg.header.authoritative()
    );
    if msg.header.truncated() {
        // no TCP retry
        warn!(message = "Response truncated", answers = msg.answers.len());
    }
    for (index, record) in msg.answers.iter().enumerate() {
        info!("{}", describe_record(index, record));
    }

    Ok(Outcome::Answered {
        rtt,
        records: msg.answers,
    })
}

fn failed(elapsed: Duration, err: TransportError) -> Outcome {
    warn!("DNS request error after {elapsed:?}: {err}");

    Outcome::Failed { elapsed, err }
}
