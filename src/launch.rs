use std::io::IsTerminal;
use std::path::PathBuf;

use argh::FromArgs;
use exitcode::ExitCode;
use resolvaddr::probe::{self, Options};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
#[argh(
    description = "Send one DNS query over UDP and print the address records",
    help_triggers("-h", "--help")
)]
pub struct RootCommand {
    #[argh(switch, short = 'v', description = "show version")]
    version: bool,

    #[argh(
        option,
        short = 'l',
        default = "\"info\".to_string()",
        description = "log level"
    )]
    log_level: String,

    #[argh(
        option,
        default = "String::new()",
        description = "name server address (use system DNS as default)"
    )]
    ns: String,

    #[argh(
        option,
        short = 'p',
        default = "resolver::DEFAULT_PORT",
        description = "name server UDP port"
    )]
    port: u16,

    #[argh(
        option,
        default = "probe::DEFAULT_HOST.to_string()",
        description = "name of the host to resolve (search for A records)"
    )]
    host: String,

    #[argh(
        option,
        short = 'I',
        long = "from-address",
        default = "String::new()",
        description = "local IP address to send request from"
    )]
    from_address: String,

    #[argh(
        option,
        long = "resolv-conf",
        default = "PathBuf::from(probe::RESOLV_CONF_PATH)",
        description = "resolver configuration used when --ns is not set"
    )]
    resolv_conf: PathBuf,
}

impl RootCommand {
    #![allow(clippy::print_stdout)]
    fn show_version(&self) {
        println!("resolvaddr {}", env!("CARGO_PKG_VERSION"));
    }

    fn options(&self) -> Options {
        Options {
            nameserver: Some(self.ns.clone()),
            port: self.port,
            host: self.host.clone(),
            from_address: Some(self.from_address.clone()),
            resolv_conf: self.resolv_conf.clone(),
            ..Default::default()
        }
    }

    pub fn run(&self) -> Result<(), ExitCode> {
        if self.version {
            self.show_version();
            return Ok(());
        }

        let log_level = std::env::var("RESOLVADDR_LOG").unwrap_or(self.log_level.clone());
        let color = std::io::stderr().is_terminal();
        init_tracing(&log_level, color);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()
            .map_err(|err| {
                error!(message = "Build tokio runtime failed", %err);
                exitcode::OSERR
            })?;

        let options = self.options();
        runtime.block_on(async move {
            probe::resolve(&options).await.map(|_outcome| ()).map_err(|err| {
                error!(message = "Resolve failed", %err);
                err.exit_code()
            })
        })
    }
}

fn init_tracing(levels: &str, color: bool) {
    let filter = EnvFilter::try_new(levels).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(color)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
