//! Clients for the directory and control endpoints.

use anyhow::{anyhow, Context, Result};
use drone_core::protocol::SELECT_VERB;
use drone_core::DeviceInfo;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// HTTP client for the fleet directory.
pub struct DirectoryClient {
    base_url: String,
    client: reqwest::Client,
}

impl DirectoryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Fetch the fleet listing.
    pub async fn list_drones(&self) -> Result<Vec<DeviceInfo>> {
        let url = format!("{}/drones", self.base_url);
        let drones = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("requesting {}", url))?
            .error_for_status()?
            .json()
            .await?;
        Ok(drones)
    }
}

/// Line-oriented client for the control socket.
pub struct ControlClient {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl ControlClient {
    pub async fn connect(url: &str) -> Result<Self> {
        let (socket, _) = connect_async(url)
            .await
            .with_context(|| format!("connecting to {}", url))?;
        Ok(Self { socket })
    }

    /// Send one line and wait for its status line.
    pub async fn request(&mut self, line: &str) -> Result<String> {
        self.socket.send(Message::Text(line.to_string())).await?;
        while let Some(frame) = self.socket.next().await {
            match frame? {
                Message::Text(text) => return Ok(text),
                Message::Close(_) => break,
                _ => {}
            }
        }
        Err(anyhow!("server closed the connection"))
    }

    /// Read frames until the server goes away, answering its heartbeat pings.
    ///
    /// Meant to run while the operator is idle; cancelling it between frames
    /// loses nothing.
    pub async fn keep_alive(&mut self) -> Result<()> {
        while let Some(frame) = self.socket.next().await {
            match frame? {
                Message::Close(_) => break,
                Message::Text(text) => return Err(anyhow!("unexpected message: {}", text)),
                _ => {}
            }
        }
        Err(anyhow!("server closed the connection"))
    }

    pub async fn select(&mut self, device_id: &str) -> Result<String> {
        self.request(&format!("{} {}", SELECT_VERB, device_id)).await
    }

    pub async fn close(mut self) -> Result<()> {
        self.socket.close(None).await?;
        Ok(())
    }
}
