//! UDP receiver for Omicron event datagrams

use anyhow::{Context, Result};
use std::io;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::info;

/// Largest datagram accepted; skeleton payloads stay well below it
const MAX_DATAGRAM: usize = 65_536;

pub struct UdpListener {
    socket: UdpSocket,
    buf: Vec<u8>,
}

impl UdpListener {
    pub async fn bind(host: &str, port: u16) -> Result<Self> {
        let socket = UdpSocket::bind((host, port))
            .await
            .with_context(|| format!("Failed to bind UDP {}:{}", host, port))?;

        info!("👂 Listening for Omicron events on {}", socket.local_addr()?);

        Ok(Self {
            socket,
            buf: vec![0; MAX_DATAGRAM],
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Wait for the next datagram; its bytes are then available from `datagram`
    ///
    /// Cancel-safe, so it can sit in a `select!` loop.
    pub async fn recv(&mut self) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(&mut self.buf).await
    }

    /// Bytes of the datagram last returned by `recv`
    pub fn datagram(&self, len: usize) -> &[u8] {
        &self.buf[..len.min(self.buf.len())]
    }
}
