//! Websocket adapter built on tokio-tungstenite.
//!
//! The socket is split: the sink becomes a [`Connection`] owned by the
//! publisher, the source is drained by a reader task that feeds the router.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::domain::{InboundFrame, NotificationError, RouterError, TransportError};
use crate::ports::Connection;
use crate::ws::MessageRouter;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Read half of a connected socket.
pub type WsSource = SplitStream<WsStream>;

/// Write half of the notification websocket.
pub struct WsConnection {
    sink: Mutex<SplitSink<WsStream, Message>>,
    closed: AtomicBool,
}

#[async_trait]
impl Connection for WsConnection {
    async fn send_text(&self, text: String) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed);
        }
        self.sink
            .lock()
            .await
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| match e {
                tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                    TransportError::ConnectionClosed
                }
                other => TransportError::Send(other.to_string()),
            })
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        match self.sink.lock().await.close().await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::Send(e.to_string())),
        }
    }
}

/// Open the socket and wait for the server's `{"uid"}` frame.
pub async fn connect(
    url: &str,
    handshake_timeout: Duration,
) -> Result<(Arc<WsConnection>, String, WsSource), TransportError> {
    let (stream, _) = connect_async(url)
        .await
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
    let (sink, mut source) = stream.split();

    let uid = timeout(handshake_timeout, read_handshake(&mut source))
        .await
        .map_err(|_| TransportError::HandshakeTimeout)??;
    info!(url, uid = %uid, "Notification socket connected");

    let connection = Arc::new(WsConnection {
        sink: Mutex::new(sink),
        closed: AtomicBool::new(false),
    });
    Ok((connection, uid, source))
}

/// First text frame must be the handshake.
pub async fn read_handshake<S>(source: &mut S) -> Result<String, TransportError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(message) = source.next().await {
        match message {
            Ok(Message::Text(text)) => {
                return match InboundFrame::classify(text.as_bytes()) {
                    Ok(InboundFrame::Handshake(handshake)) => Ok(handshake.uid),
                    Ok(InboundFrame::Event(_)) => Err(TransportError::InvalidHandshake(
                        "event frame before handshake".to_string(),
                    )),
                    Err(e) => Err(TransportError::InvalidHandshake(e.to_string())),
                };
            }
            Ok(Message::Close(_)) => return Err(TransportError::ConnectionClosed),
            Ok(_) => continue,
            Err(e) => return Err(TransportError::Receive(e.to_string())),
        }
    }
    Err(TransportError::ConnectionClosed)
}

/// Drain `source` into `router` until the socket fails or closes.
///
/// Re-handshakes update the router uid. The router is closed when the loop ends.
pub fn spawn_reader<S>(mut source: S, router: Arc<MessageRouter>) -> JoinHandle<()>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let frame = match source.next().await {
                Some(Ok(Message::Text(text))) => text.as_bytes().to_vec(),
                Some(Ok(Message::Binary(bytes))) => bytes.to_vec(),
                Some(Ok(Message::Close(close))) => {
                    info!(?close, "Notification socket closed by server");
                    router.report_error(TransportError::ConnectionClosed.into());
                    break;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!(error = %e, "Notification socket read failed");
                    router.report_error(TransportError::Receive(e.to_string()).into());
                    break;
                }
                None => {
                    info!("Notification socket stream ended");
                    router.report_error(TransportError::ConnectionClosed.into());
                    break;
                }
            };

            if let Ok(InboundFrame::Handshake(handshake)) = InboundFrame::classify(&frame) {
                router.set_uid(handshake.uid);
                continue;
            }

            match router.route_message(frame).await {
                Ok(()) => {}
                Err(RouterError::Closed) => {
                    debug!("Router closed, reader stopping");
                    break;
                }
                Err(e) => router.report_error(NotificationError::Router(e)),
            }
        }
        router.close().await;
    })
}
