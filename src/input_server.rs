//! TCP control link to an Omicron input server
//!
//! The input server only streams events after it is asked to. The link
//! connects, sends `omicron_data_on,<dataPort>`, then waits for the
//! connection to drop and retries on a fixed interval. On shutdown it sends
//! `data_off` so the server stops streaming.

use crate::config::AppConfig;
use anyhow::{Context, Result};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Asks the input server to stop streaming
pub const DATA_OFF_COMMAND: &str = "data_off\n";

/// Asks the input server to stream events to `data_port`
pub fn handshake_command(data_port: u16) -> String {
    format!("omicron_data_on,{}\n", data_port)
}

/// State of the control connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Handshake sent, connection open
    Connected,
    Disconnected,
    /// Waiting before connection attempt `attempt`
    Reconnecting { attempt: usize },
}

pub struct InputServerLink {
    addr: String,
    data_port: u16,
    retry_interval: Duration,
    status_tx: watch::Sender<ConnectionStatus>,
}

impl InputServerLink {
    pub fn new(addr: impl Into<String>, data_port: u16, retry_interval: Duration) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            addr: addr.into(),
            data_port,
            retry_interval,
            status_tx,
        }
    }

    /// Link for the configured input server, if any
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        config.input_server_addr().map(|addr| {
            Self::new(
                addr,
                config.omicron.data_port,
                Duration::from_secs(config.omicron.reconnect_interval_secs),
            )
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Subscribe to connection status changes
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    fn emit_status(&self, status: ConnectionStatus) {
        self.status_tx.send_replace(status);
    }

    async fn connect(&self) -> Result<TcpStream> {
        info!("📡 Connecting to input server at {}", self.addr);

        let mut stream = TcpStream::connect(&self.addr)
            .await
            .with_context(|| format!("Failed to connect to input server {}", self.addr))?;

        stream
            .write_all(handshake_command(self.data_port).as_bytes())
            .await
            .context("Failed to send data request")?;

        Ok(stream)
    }

    /// Keep the link up until `shutdown` turns true
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut attempt = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.connect().await {
                Ok(mut stream) => {
                    attempt = 0;
                    self.emit_status(ConnectionStatus::Connected);
                    info!("✅ Input server streaming to port {}", self.data_port);

                    if self.hold(&mut stream, &mut shutdown).await {
                        if let Err(e) = stream.write_all(DATA_OFF_COMMAND.as_bytes()).await {
                            warn!("Failed to send data_off: {}", e);
                        }
                        let _ = stream.shutdown().await;
                        break;
                    }
                    warn!("⚠️  Input server connection closed");
                    self.emit_status(ConnectionStatus::Disconnected);
                }
                Err(e) => {
                    warn!("{:#}", e);
                }
            }

            attempt += 1;
            debug!(
                "⏳ Input server reconnect #{} in {:?}",
                attempt, self.retry_interval
            );
            self.emit_status(ConnectionStatus::Reconnecting { attempt });

            tokio::select! {
                _ = sleep(self.retry_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.emit_status(ConnectionStatus::Disconnected);
        info!("Input server link stopped");
    }

    /// Wait for the connection to end; true when shutdown was requested
    async fn hold(&self, stream: &mut TcpStream, shutdown: &mut watch::Receiver<bool>) -> bool {
        let mut buf = [0u8; 512];
        loop {
            tokio::select! {
                read = stream.read(&mut buf) => match read {
                    Ok(0) => return false,
                    Ok(n) => {
                        debug!("Input server: {}", String::from_utf8_lossy(&buf[..n]).trim_end());
                    }
                    Err(e) => {
                        warn!("Input server read error: {}", e);
                        return false;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return true;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    #[test]
    fn test_handshake_command() {
        assert_eq!(handshake_command(9123), "omicron_data_on,9123\n");
    }

    #[test]
    fn test_from_config_requires_server_ip() {
        let mut config = AppConfig::default();
        assert!(InputServerLink::from_config(&config).is_none());

        config.omicron.input_server_ip = Some("192.168.1.20".into());
        let link = InputServerLink::from_config(&config).unwrap();
        assert_eq!(link.addr(), "192.168.1.20:28000");
    }

    #[tokio::test]
    async fn test_handshake_and_data_off() -> Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let link = InputServerLink::new(addr.to_string(), 9123, Duration::from_secs(15));
        let mut status = link.status();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(link.run(shutdown_rx));

        let (stream, _) = listener.accept().await?;
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line).await?;
        assert_eq!(line, "omicron_data_on,9123\n");

        status.wait_for(|s| *s == ConnectionStatus::Connected).await?;

        shutdown_tx.send(true)?;
        line.clear();
        reader.read_line(&mut line).await?;
        assert_eq!(line, DATA_OFF_COMMAND);

        task.await?;
        assert_eq!(*status.borrow(), ConnectionStatus::Disconnected);
        Ok(())
    }

    #[tokio::test]
    async fn test_reconnects_after_close() -> Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let link = InputServerLink::new(addr.to_string(), 7000, Duration::from_millis(50));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(link.run(shutdown_rx));

        for _ in 0..2 {
            let (stream, _) =
                tokio::time::timeout(Duration::from_secs(5), listener.accept()).await??;
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            reader.read_line(&mut line).await?;
            assert_eq!(line, "omicron_data_on,7000\n");
            // Dropping the stream closes the connection
        }

        shutdown_tx.send(true)?;
        tokio::time::timeout(Duration::from_secs(5), task).await??;
        Ok(())
    }

    #[tokio::test]
    async fn test_refused_connection_schedules_retry() -> Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        drop(listener);

        let link = InputServerLink::new(addr.to_string(), 9123, Duration::from_secs(60));
        let mut status = link.status();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(link.run(shutdown_rx));

        tokio::time::timeout(
            Duration::from_secs(5),
            status.wait_for(|s| *s == ConnectionStatus::Reconnecting { attempt: 1 }),
        )
        .await??;

        // Shutdown interrupts the retry wait
        shutdown_tx.send(true)?;
        tokio::time::timeout(Duration::from_secs(5), task).await??;
        Ok(())
    }
}
