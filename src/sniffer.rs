//! Omicron packet sniffer for debugging trackers
//!
//! Binds the data port and prints every datagram as hex plus its decoded
//! summary, without dispatching anything.

use anyhow::Result;
use colored::*;
use std::net::SocketAddr;
use std::time::Instant;

use crate::listener::UdpListener;
use crate::protocol::{format_hex, RawEvent, ServiceType, HEADER_LEN};

/// Hex shown per packet; skeleton payloads would flood the terminal
const MAX_HEX_BYTES: usize = HEADER_LEN;

/// CLI sniffer on `host:port`, until Ctrl+C
pub async fn run_cli_sniffer(host: &str, port: u16) -> Result<()> {
    let mut listener = UdpListener::bind(host, port).await?;

    println!("{}", "=== Omicron Sniffer ===".bold().cyan());
    println!("Listening on {}", listener.local_addr()?);
    println!("Press Ctrl+C to exit\n");
    println!(
        "{}",
        "Format: [timestamp] FROM (bytes) | HEX => DECODED".dimmed()
    );
    println!("{}\n", "─".repeat(80).dimmed());

    let start_time = Instant::now();
    let mut packets = 0u64;

    loop {
        tokio::select! {
            received = listener.recv() => {
                let (len, from) = received?;
                packets += 1;
                let elapsed_ms = start_time.elapsed().as_millis() as u64;
                println!("{}", format_packet(elapsed_ms, from, listener.datagram(len)));
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    println!("\n{}", format!("Sniffer stopped after {} packets", packets).yellow());
    Ok(())
}

/// One output line for a datagram
pub fn format_packet(elapsed_ms: u64, from: SocketAddr, data: &[u8]) -> String {
    let event = RawEvent::decode(data);

    let shown = &data[..data.len().min(MAX_HEX_BYTES)];
    let mut hex = format_hex(shown);
    if data.len() > shown.len() {
        hex.push_str(" …");
    }

    // Color code by service
    let hex_colored = match event.service_type {
        Some(ServiceType::Pointer) => hex.bright_green(),
        Some(ServiceType::Wand) => hex.bright_yellow(),
        Some(ServiceType::Mocap) => hex.bright_cyan(),
        Some(ServiceType::Keyboard) => hex.bright_magenta(),
        Some(_) => hex.normal(),
        None => hex.bright_black(),
    };

    format!(
        "[{:08}] {} ({:>4}) | {} => {}",
        elapsed_ms,
        from,
        data.len(),
        hex_colored,
        event.to_string().bright_blue()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{EventType, ExtraData};

    fn from() -> SocketAddr {
        "10.0.0.2:5000".parse().unwrap()
    }

    #[test]
    fn test_format_packet_summary() {
        colored::control::set_override(false);
        let packet = RawEvent::new(ServiceType::Pointer, EventType::Down)
            .with_source(3)
            .encode();

        let line = format_packet(12, from(), &packet);
        assert!(line.starts_with("[00000012] 10.0.0.2:5000 (  64) | 00000000 03000000"));
        assert!(line.ends_with("=> Pointer/Down src=3 flags=0x00000000 pos=(0.000, 0.000, 0.000)"));
    }

    #[test]
    fn test_long_payload_is_cut() {
        colored::control::set_override(false);
        let packet = RawEvent::new(ServiceType::Mocap, EventType::Update)
            .with_extra(ExtraData::Vectors3(vec![[0.0; 3]; 29]))
            .encode();

        let line = format_packet(0, from(), &packet);
        assert!(line.contains(" … =>"));
        assert!(line.contains("extra=Vector3Array"));
    }

    #[test]
    fn test_truncated_packet() {
        colored::control::set_override(false);
        let line = format_packet(0, from(), &[1, 0, 0, 0]);
        assert!(line.ends_with("=> truncated event (1 fields)"));
    }
}
