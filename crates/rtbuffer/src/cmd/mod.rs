use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use rtbuffer_server::{BufferClient, Endpoint};

use crate::exit::{server_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod events;
pub mod header;
pub mod serve;
pub mod version;
pub mod wait;

/// Default buffer address: the classic buffer port on loopback.
pub const DEFAULT_ADDR: &str = "127.0.0.1:1972";

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a buffer server.
    Serve(ServeArgs),
    /// Print the header of a running buffer.
    Header(ConnectArgs),
    /// Block until a buffer holds enough samples/events.
    Wait(WaitArgs),
    /// List events of a running buffer.
    Events(EventsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Header(args) => header::run(args, format),
        Command::Wait(args) => wait::run(args, format),
        Command::Events(args) => events::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on: host:port, unix:/path or /path.
    #[arg(long, env = "RTBUFFER_ADDR", default_value = DEFAULT_ADDR)]
    pub listen: String,
    /// JSON server configuration file.
    #[arg(long, env = "RTBUFFER_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Buffer address: host:port, unix:/path or /path.
    #[arg(long, env = "RTBUFFER_ADDR", default_value = DEFAULT_ADDR)]
    pub addr: String,
}

#[derive(Args, Debug)]
pub struct WaitArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Minimum number of samples.
    #[arg(long, default_value_t = 0)]
    pub samples: u64,
    /// Minimum number of events.
    #[arg(long, default_value_t = 0)]
    pub events: u64,
    /// Give up after this long (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct EventsArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// First event index.
    #[arg(long)]
    pub begin: Option<u64>,
    /// One past the last event index.
    #[arg(long)]
    pub end: Option<u64>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_endpoint(addr: &str) -> CliResult<Endpoint> {
    addr.parse::<Endpoint>()
        .map_err(|err| CliError::new(USAGE, format!("invalid address {addr:?}: {err}")))
}

pub(crate) fn connect(args: &ConnectArgs) -> CliResult<(Endpoint, BufferClient)> {
    let endpoint = parse_endpoint(&args.addr)?;
    let client = BufferClient::connect_endpoint(&endpoint)
        .map_err(|err| server_error(&format!("connect to {endpoint} failed"), err))?;
    Ok((endpoint, client))
}

/// Parse `150ms`, `2s` or a bare number of seconds. Zero is allowed.
pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
