use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use lenframe_frame::{FrameConfig, FramedChannel};
use lenframe_transport::{NetStream, TcpConnector};

use crate::exit::{framing_error, transport_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod send;
pub mod session;
pub mod version;

pub const DEFAULT_ADDR: &str = "127.0.0.1:2347";

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one message and print the reply.
    Send(SendArgs),
    /// Exchange one message per input line over a single connection.
    Session(SessionArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Session(args) => session::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Peer address (host:port).
    #[arg(env = "LENFRAME_ADDR", default_value = DEFAULT_ADDR)]
    pub addr: String,
    /// Per-operation read/write timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Connection establishment timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub connection: ConnectArgs,
    /// Message text.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read the message from a file. Without --data or --file, stdin is used.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Send without waiting for a reply.
    #[arg(long)]
    pub no_reply: bool,
}

#[derive(Args, Debug)]
pub struct SessionArgs {
    #[command(flatten)]
    pub connection: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Connect and wrap the stream with the requested timeouts.
pub(crate) fn open_channel(args: &ConnectArgs) -> CliResult<FramedChannel<NetStream>> {
    let connect_timeout = parse_duration(&args.connect_timeout)?;
    let io_timeout = parse_duration(&args.timeout)?;

    let stream = TcpConnector::new()
        .with_connect_timeout(Some(connect_timeout))
        .connect(&args.addr)
        .map_err(|err| transport_error("connect failed", err))?;

    let config = FrameConfig {
        read_timeout: Some(io_timeout),
        write_timeout: Some(io_timeout),
        ..FrameConfig::default()
    };
    FramedChannel::with_config_net(stream, config)
        .map_err(|err| framing_error("connect failed", err))
}

/// Label for output: the resolved peer address, or what the user typed.
pub(crate) fn peer_label(channel: &FramedChannel<NetStream>, addr: &str) -> String {
    channel
        .get_ref()
        .peer_addr()
        .map(|peer| peer.to_string())
        .unwrap_or_else(|_| addr.to_string())
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
