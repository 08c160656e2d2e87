use futures_util::{SinkExt, StreamExt};
use log::{debug, info};
use shared::{ClientEvent, ProtocolError, ServerEvent};
use std::fmt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

#[derive(Debug)]
pub enum ClientError {
    Connection(tungstenite::Error),
    Protocol(ProtocolError),
    InvalidOrigin(String),
    Timeout,
    Closed,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(e) => write!(f, "connection error: {e}"),
            Self::Protocol(e) => write!(f, "protocol error: {e}"),
            Self::InvalidOrigin(origin) => write!(f, "invalid origin header: {origin}"),
            Self::Timeout => write!(f, "timed out waiting for server event"),
            Self::Closed => write!(f, "connection closed by server"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<tungstenite::Error> for ClientError {
    fn from(e: tungstenite::Error) -> Self {
        Self::Connection(e)
    }
}

impl From<ProtocolError> for ClientError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

/// WebSocket connection to a grid server
#[derive(Debug)]
pub struct GridClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl GridClient {
    /// Connects to a server endpoint such as `ws://127.0.0.1:3001/ws`
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (ws, _) = tokio_tungstenite::connect_async(url).await?;
        info!("Connected to {}", url);
        Ok(Self { ws })
    }

    /// Connects while presenting an `Origin` header, as a browser would
    pub async fn connect_with_origin(url: &str, origin: &str) -> Result<Self, ClientError> {
        let mut request = url.into_client_request()?;
        let value = HeaderValue::from_str(origin)
            .map_err(|_| ClientError::InvalidOrigin(origin.to_string()))?;
        request.headers_mut().insert(header::ORIGIN, value);

        let (ws, _) = tokio_tungstenite::connect_async(request).await?;
        info!("Connected to {} as {}", url, origin);
        Ok(Self { ws })
    }

    pub async fn join(
        &mut self,
        username: Option<&str>,
        color: Option<&str>,
    ) -> Result<(), ClientError> {
        self.send(&ClientEvent::Join {
            username: username.map(str::to_string),
            color: color.map(str::to_string),
        })
        .await
    }

    pub async fn capture(&mut self, cell_id: i64) -> Result<(), ClientError> {
        self.send(&ClientEvent::Capture { cell_id }).await
    }

    pub async fn send(&mut self, event: &ClientEvent) -> Result<(), ClientError> {
        self.send_text(event.encode()?).await
    }

    /// Sends a raw text frame, bypassing event encoding
    pub async fn send_text(&mut self, text: String) -> Result<(), ClientError> {
        self.ws.send(Message::Text(text.into())).await?;
        Ok(())
    }

    /// Waits for the next server event, skipping control frames
    pub async fn next_event(&mut self) -> Result<ServerEvent, ClientError> {
        while let Some(frame) = self.ws.next().await {
            match frame? {
                Message::Text(text) => return Ok(ServerEvent::decode(text.as_str())?),
                Message::Close(_) => return Err(ClientError::Closed),
                other => debug!("Skipping non-text frame: {:?}", other),
            }
        }
        Err(ClientError::Closed)
    }

    pub async fn next_event_timeout(
        &mut self,
        timeout: Duration,
    ) -> Result<ServerEvent, ClientError> {
        tokio::time::timeout(timeout, self.next_event())
            .await
            .map_err(|_| ClientError::Timeout)?
    }

    pub async fn close(mut self) -> Result<(), ClientError> {
        self.ws.close(None).await?;
        Ok(())
    }
}
