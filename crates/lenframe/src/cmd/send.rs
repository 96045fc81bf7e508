use std::fs;
use std::io::{self, Read};

use lenframe_frame::encode_prefix;
use tracing::debug;

use crate::cmd::{open_channel, peer_label, SendArgs};
use crate::exit::{framing_error, io_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let message = resolve_payload(&args, io::stdin().lock())?;
    // Reject oversize input before opening a connection.
    encode_prefix(message.len()).map_err(|err| framing_error("message rejected", err))?;

    let mut channel = open_channel(&args.connection)?;
    let peer = peer_label(&channel, &args.connection.addr);

    if args.no_reply {
        channel
            .send(&message)
            .map_err(|err| framing_error("send failed", err))?;
        debug!(peer = %peer, size = message.len(), "sent without waiting for reply");
    } else {
        let reply = channel
            .request(&message)
            .map_err(|err| framing_error("exchange failed", err))?;
        print_message(&reply, &peer, format);
    }

    channel
        .close()
        .map_err(|err| framing_error("close failed", err))?;
    Ok(SUCCESS)
}

fn resolve_payload<R: Read>(args: &SendArgs, mut stdin: R) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    let mut buf = Vec::new();
    stdin
        .read_to_end(&mut buf)
        .map_err(|err| io_error("failed reading stdin", err))?;
    Ok(buf)
}
