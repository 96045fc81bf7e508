use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ReplyOutput<'a> {
    peer: &'a str,
    size: usize,
    message: String,
    binary: bool,
    timestamp: String,
}

/// Print one received message to stdout in the selected format.
pub fn print_message(message: &[u8], peer: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", render_json(message, peer));
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PEER", "SIZE", "MESSAGE"])
                .add_row(vec![
                    peer.to_string(),
                    message.len().to_string(),
                    message_preview(message),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "peer={} size={} message={}",
                peer,
                message.len(),
                message_preview(message)
            );
        }
        OutputFormat::Raw => {
            print_raw(message);
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn render_json(message: &[u8], peer: &str) -> String {
    let out = ReplyOutput {
        peer,
        size: message.len(),
        message: message_preview(message),
        binary: std::str::from_utf8(message).is_err(),
        timestamp: now_unix_seconds(),
    };
    serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
}

/// UTF-8 replies render as text; anything else is byte-escaped (`\xff`, `\n`, ...).
fn message_preview(message: &[u8]) -> String {
    match std::str::from_utf8(message) {
        Ok(text) => text.to_string(),
        Err(_) => message.escape_ascii().to_string(),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_output_carries_size_and_text() {
        let rendered = render_json(b"hi", "127.0.0.1:2347");
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(value["peer"], "127.0.0.1:2347");
        assert_eq!(value["size"], 2);
        assert_eq!(value["message"], "hi");
        assert_eq!(value["binary"], false);
    }

    #[test]
    fn binary_messages_keep_their_bytes() {
        assert_eq!(message_preview(&[0xff, b'o', b'k', 0x00]), "\\xffok\\x00");
        assert_eq!(message_preview(b""), "");
    }

    #[test]
    fn json_output_flags_binary_replies() {
        let rendered = render_json(&[0x68, 0x69, 0xc3], "peer");
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(value["binary"], true);
        assert_eq!(value["size"], 3);
        assert_eq!(value["message"], "hi\\xc3");
    }
}
