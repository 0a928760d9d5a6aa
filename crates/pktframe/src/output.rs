use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use pktframe_codec::{ChecksumMode, DecoderStats};
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
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Encoding for framed bytes written by `encode`.
#[derive(Clone, Debug, Copy, Default, ValueEnum)]
pub enum WireOutput {
    #[default]
    Hex,
    Raw,
}

#[derive(Serialize)]
struct PayloadOutput<'a> {
    index: u64,
    size: usize,
    mode: &'a str,
    verified: bool,
    payload: String,
    hex: String,
    timestamp: String,
}

#[derive(Serialize)]
struct StatsOutput {
    frames: u64,
    payload_bytes: u64,
    discarded_bytes: u64,
    narrow_resyncs: u64,
    overflow_resets: u64,
}

pub fn print_payload(index: u64, payload: &[u8], mode: ChecksumMode, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PayloadOutput {
                index,
                size: payload.len(),
                mode: mode_name(mode),
                verified: mode.covers_payload(),
                payload: payload_preview(payload),
                hex: hex::encode(payload),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "SIZE", "MODE", "PAYLOAD"])
                .add_row(vec![
                    index.to_string(),
                    payload.len().to_string(),
                    mode_name(mode).to_string(),
                    payload_preview(payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "#{} size={} mode={} payload={}",
                index,
                payload.len(),
                mode_name(mode),
                payload_preview(payload)
            );
        }
        OutputFormat::Raw => {
            print_raw(payload);
        }
    }
}

/// Decoder counters as a single JSON line, for machine consumers.
pub fn stats_json(stats: &DecoderStats) -> String {
    let out = StatsOutput {
        frames: stats.frames,
        payload_bytes: stats.payload_bytes,
        discarded_bytes: stats.discarded_bytes,
        narrow_resyncs: stats.narrow_resyncs,
        overflow_resets: stats.overflow_resets,
    };
    serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
}

pub fn print_wire(frame: &[u8], output: WireOutput) {
    match output {
        WireOutput::Hex => println!("{}", hex::encode_upper(frame)),
        WireOutput::Raw => print_raw(frame),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn mode_name(mode: ChecksumMode) -> &'static str {
    match mode {
        ChecksumMode::Payload => "payload-crc",
        ChecksumMode::Light => "light",
    }
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
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
    fn preview_text_and_binary() {
        assert_eq!(payload_preview(b"hello"), "hello");
        assert_eq!(payload_preview(&[0xFF, 0xFE]), "<binary 2 bytes>");
    }

    #[test]
    fn stats_serialize_as_json() {
        let stats = DecoderStats {
            frames: 2,
            discarded_bytes: 7,
            ..DecoderStats::default()
        };
        let value: serde_json::Value = serde_json::from_str(&stats_json(&stats)).unwrap();
        assert_eq!(value["frames"], 2);
        assert_eq!(value["discarded_bytes"], 7);
        assert_eq!(value["overflow_resets"], 0);
    }
}
