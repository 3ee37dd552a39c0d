//! Transport abstraction for channel connections

use std::{pin::Pin, time::Duration};

use async_stream::stream;
use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_stream::Stream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::{Error, Result};

/// Reconnect and liveness timing
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Fixed delay between a close and the next connect attempt
    pub delay: Duration,
    /// Interval between liveness probes while offline
    pub status_poll_interval: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            status_poll_interval: Duration::from_secs(3),
        }
    }
}

/// Incoming text frames; the stream ends when the peer closes
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Outgoing half of a connection
#[async_trait]
pub trait FrameSink: Send {
    /// Send one text frame
    async fn send(&mut self, frame: String) -> Result<()>;

    /// Close the connection
    async fn close(&mut self) -> Result<()>;
}

/// One open connection, split into its two halves
pub struct Connection {
    pub sink: Box<dyn FrameSink>,
    pub frames: FrameStream,
}

/// Opens connections to a URL
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Connection>;
}

/// Connector speaking WebSocket text frames
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;

struct WebSocketSink {
    inner: WsSink,
}

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send(&mut self, frame: String) -> Result<()> {
        self.inner.send(WsMessage::Text(frame.into())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close().await?;
        Ok(())
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Connection> {
        let (socket, _response) = tokio_tungstenite::connect_async(url).await?;
        let (sink, mut source) = socket.split();

        let frames: FrameStream = Box::pin(stream! {
            while let Some(message) = source.next().await {
                match message {
                    Ok(WsMessage::Text(text)) => yield Ok(text.as_str().to_owned()),
                    Ok(WsMessage::Close(_)) => break,
                    // Pings are answered by tungstenite; binary frames are not part of the protocol.
                    Ok(_) => continue,
                    Err(e) => {
                        yield Err(Error::from(e));
                        break;
                    }
                }
            }
        });

        Ok(Connection {
            sink: Box::new(WebSocketSink { inner: sink }),
            frames,
        })
    }
}

/// Turn the server's HTTP base URL into the WebSocket URL for `path`
pub fn websocket_url(base_url: &str, path: &str) -> Result<String> {
    let base = base_url.trim_end_matches('/');
    let rest = if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_string()
    } else {
        return Err(Error::InvalidUrl(base_url.to_string()));
    };
    Ok(format!("{}{}", rest, path))
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory connector for tests

    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    /// Server side of a mock connection
    pub struct MockPeer {
        /// Push frames to the client; drop to close the connection
        pub frames: mpsc::UnboundedSender<Result<String>>,
        /// Frames the client sent
        pub sent: Arc<Mutex<Vec<String>>>,
    }

    struct MockSink {
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl FrameSink for MockSink {
        async fn send(&mut self, frame: String) -> Result<()> {
            self.sent.lock().push(frame);
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    /// Hands out connections whose server side the test controls.
    ///
    /// Each connect attempt records its time. While `refuse` is set, attempts
    /// fail.
    #[derive(Clone, Default)]
    pub struct MockConnector {
        pub attempts: Arc<Mutex<Vec<tokio::time::Instant>>>,
        pub urls: Arc<Mutex<Vec<String>>>,
        pub refuse: Arc<Mutex<bool>>,
        peers: Arc<Mutex<VecDeque<(String, MockPeer)>>>,
    }

    impl MockConnector {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn attempt_count(&self) -> usize {
            self.attempts.lock().len()
        }

        /// Take the server side of the oldest connection not yet taken
        pub fn take_peer(&self) -> Option<MockPeer> {
            self.peers.lock().pop_front().map(|(_, peer)| peer)
        }

        /// Take the oldest untaken connection whose URL ends with `path`
        pub fn take_peer_for(&self, path: &str) -> Option<MockPeer> {
            let mut peers = self.peers.lock();
            let index = peers.iter().position(|(url, _)| url.ends_with(path))?;
            peers.remove(index).map(|(_, peer)| peer)
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn connect(&self, url: &str) -> Result<Connection> {
            self.attempts.lock().push(tokio::time::Instant::now());
            self.urls.lock().push(url.to_string());
            if *self.refuse.lock() {
                return Err(Error::Closed);
            }

            let (tx, rx) = mpsc::unbounded_channel();
            let sent = Arc::new(Mutex::new(Vec::new()));
            self.peers.lock().push_back((
                url.to_string(),
                MockPeer {
                    frames: tx,
                    sent: sent.clone(),
                },
            ));

            Ok(Connection {
                sink: Box::new(MockSink { sent }),
                frames: Box::pin(UnboundedReceiverStream::new(rx)),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_url_from_http() {
        assert_eq!(
            websocket_url("http://127.0.0.1:8321", "/ws/chat").unwrap(),
            "ws://127.0.0.1:8321/ws/chat"
        );
        assert_eq!(
            websocket_url("https://studio.example.com/", "/ws/reload").unwrap(),
            "wss://studio.example.com/ws/reload"
        );
    }

    #[test]
    fn test_websocket_url_passthrough() {
        assert_eq!(
            websocket_url("ws://localhost:9000", "/ws/chat").unwrap(),
            "ws://localhost:9000/ws/chat"
        );
    }

    #[test]
    fn test_websocket_url_rejects_other_schemes() {
        assert!(matches!(
            websocket_url("ftp://host", "/ws/chat"),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_default_reconnect_delay() {
        assert_eq!(ReconnectConfig::default().delay, Duration::from_secs(2));
    }
}
