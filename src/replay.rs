//! Replay of captured Omicron traffic
//!
//! A capture is a text file with one datagram per line, written as hex.
//! Whitespace inside a line is ignored and `#` starts a comment, so
//! sniffer hex columns can be pasted directly.

use anyhow::{Context, Result};
use tokio::fs;
use tracing::info;

use crate::dispatch::{DispatchStats, Dispatcher};

/// Parse capture text into datagrams
pub fn parse_capture(text: &str) -> Result<Vec<Vec<u8>>> {
    let mut packets = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let content = line.split('#').next().unwrap_or_default();
        let digits: String = content.chars().filter(|c| !c.is_whitespace()).collect();
        if digits.is_empty() {
            continue;
        }

        let packet = hex::decode(&digits)
            .with_context(|| format!("Invalid hex on line {}", index + 1))?;
        packets.push(packet);
    }

    Ok(packets)
}

/// Render datagrams as capture text
pub fn format_capture(packets: &[Vec<u8>]) -> String {
    packets
        .iter()
        .map(|p| format!("{}\n", hex::encode_upper(p)))
        .collect()
}

pub async fn load_capture(path: &str) -> Result<Vec<Vec<u8>>> {
    let text = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read capture file: {}", path))?;
    parse_capture(&text).with_context(|| format!("Invalid capture file: {}", path))
}

/// Feed every datagram through the dispatcher, returning the stats delta
pub fn replay(dispatcher: &mut Dispatcher, packets: &[Vec<u8>]) -> DispatchStats {
    let before = dispatcher.stats();
    for packet in packets {
        dispatcher.handle_packet(packet);
    }
    let after = dispatcher.stats();

    let delta = DispatchStats {
        packets: after.packets - before.packets,
        dispatched: after.dispatched - before.dispatched,
        ignored: after.ignored - before.ignored,
    };
    info!(
        "⏯️  Replayed {} packets ({} dispatched, {} ignored)",
        delta.packets, delta.dispatched, delta.ignored
    );
    delta
}
