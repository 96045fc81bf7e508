use std::io::{self, BufRead, Read, Write};

use lenframe_frame::{FramedChannel, FramingError};
use tracing::{debug, info};

use crate::cmd::{open_channel, peer_label, SessionArgs};
use crate::exit::{framing_error, io_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SessionArgs, format: OutputFormat) -> CliResult<i32> {
    let mut channel = open_channel(&args.connection)?;
    let peer = peer_label(&channel, &args.connection.addr);
    info!(peer = %peer, "session started");

    let exchanges = exchange_lines(
        &mut channel,
        io::stdin().lock(),
        &mut io::stderr(),
        |reply| print_message(reply, &peer, format),
    )?;

    info!(peer = %peer, exchanges, "session ended");
    channel
        .close()
        .map_err(|err| framing_error("close failed", err))?;
    Ok(SUCCESS)
}

/// Send each input line as raw bytes (without its line ending) and hand every reply to
/// `on_reply`. Stops at end of input. Returns the number of completed exchanges.
///
/// A line over the size limit is reported on `prompt` and skipped; any other
/// failure ends the session.
fn exchange_lines<S, R, P, F>(
    channel: &mut FramedChannel<S>,
    mut input: R,
    prompt: &mut P,
    mut on_reply: F,
) -> CliResult<usize>
where
    S: Read + Write,
    R: BufRead,
    P: Write,
    F: FnMut(&[u8]),
{
    let mut line = Vec::new();
    let mut exchanges = 0;

    loop {
        let _ = write!(prompt, "> ");
        let _ = prompt.flush();

        line.clear();
        let read = input
            .read_until(b'\n', &mut line)
            .map_err(|err| io_error("failed reading input", err))?;
        if read == 0 {
            debug!("end of input");
            return Ok(exchanges);
        }

        match channel.request(strip_line_ending(&line)) {
            Ok(reply) => {
                on_reply(&reply);
                exchanges += 1;
            }
            Err(err @ FramingError::MessageTooLarge { .. }) => {
                let _ = writeln!(prompt, "skipped: {err}");
            }
            Err(err) => return Err(framing_error("exchange failed", err)),
        }
    }
}

/// Drop a trailing `\n`, then a trailing `\r`. Other bytes pass through untouched.
fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
