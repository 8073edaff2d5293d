//! Broker session lifecycle.
//!
//! One [`BrokerSession`] is one logical STOMP session against the broker
//! cluster. Candidate endpoints are tried in their configured order until one
//! accepts the CONNECT handshake; TLS, when enabled, wraps every candidate
//! uniformly. After the handshake the socket is split into a writer task (fed
//! by an mpsc channel, which also carries the periodic heartbeats) and a
//! reader task that queues MESSAGE frames for the cycle to drain.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};
use tokio_rustls::TlsConnector;
use tokio_util::codec::Framed;
use tracing::{debug, error, trace, warn};

use crate::config::{BrokerEndpoint, Config, Credentials};
use crate::error::{CollectError, CollectResult};
use crate::stomp::{Frame, OutboundFrame, StompCodec, command};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on draining the final DISCONNECT frame at teardown.
const FLUSH_TIMEOUT: Duration = Duration::from_millis(250);

/// Heartbeat offer sent in the CONNECT frame, milliseconds in each direction.
const HEARTBEAT_MS: u64 = 10_000;

trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> Transport for T {}

type BrokerStream = Framed<Box<dyn Transport>, StompCodec>;

/// An established session to one broker endpoint.
pub struct BrokerSession {
    outbound_tx: Option<mpsc::Sender<OutboundFrame>>,
    message_rx: mpsc::UnboundedReceiver<Frame>,
    connected: Arc<AtomicBool>,
    writer: Option<JoinHandle<()>>,
    tasks: Vec<JoinHandle<()>>,
}

impl BrokerSession {
    /// Open a session against the first reachable endpoint.
    ///
    /// Fails with a connection error only when every candidate has been
    /// tried.
    pub async fn connect(config: &Config) -> CollectResult<Self> {
        let tls = if config.use_tls {
            Some(build_tls_connector())
        } else {
            None
        };

        for endpoint in &config.endpoints {
            debug!("connecting to {endpoint} (tls: {})", config.use_tls);
            match Self::connect_endpoint(endpoint, tls.clone(), &config.credentials).await {
                Ok(session) => return Ok(session),
                Err(e) => warn!("connection to {endpoint} failed: {e}"),
            }
        }

        let tried = config
            .endpoints
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Err(CollectError::Connection(format!(
            "no broker endpoint reachable (tried {tried})"
        )))
    }

    async fn connect_endpoint(
        endpoint: &BrokerEndpoint,
        tls: Option<TlsConnector>,
        credentials: &Credentials,
    ) -> CollectResult<Self> {
        let tcp = timeout(
            CONNECT_TIMEOUT,
            TcpStream::connect((endpoint.host.as_str(), endpoint.port)),
        )
        .await
        .map_err(|_| CollectError::Connection(format!("connect to {endpoint} timed out")))??;

        let stream: Box<dyn Transport> = match tls {
            Some(connector) => {
                let server_name = ServerName::try_from(endpoint.host.clone())
                    .map_err(|e| CollectError::Connection(format!("invalid TLS host: {e}")))?;
                let tls_stream = timeout(CONNECT_TIMEOUT, connector.connect(server_name, tcp))
                    .await
                    .map_err(|_| {
                        CollectError::Connection(format!("TLS handshake with {endpoint} timed out"))
                    })??;
                Box::new(tls_stream)
            }
            None => Box::new(tcp),
        };

        let mut framed: BrokerStream = Framed::new(stream, StompCodec::new());

        framed
            .send(Frame::connect(&credentials.user, &credentials.password, HEARTBEAT_MS).into())
            .await
            .map_err(|e| CollectError::Connection(e.to_string()))?;

        await_connected(&mut framed).await?;
        debug!("connected to broker at {endpoint}");

        Ok(Self::spawn_io(framed))
    }

    /// Split the framed socket into writer/reader/heartbeat tasks.
    fn spawn_io(framed: BrokerStream) -> Self {
        let (mut sink, mut stream) = framed.split();
        let connected = Arc::new(AtomicBool::new(true));
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundFrame>(32);
        let (message_tx, message_rx) = mpsc::unbounded_channel();

        let writer_connected = connected.clone();
        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(e) = sink.send(frame).await {
                    error!("failed to write frame: {e}");
                    writer_connected.store(false, Ordering::SeqCst);
                    break;
                }
            }
        });

        let reader_connected = connected.clone();
        let reader = tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(frame) => match frame.command.as_str() {
                        command::MESSAGE => {
                            // Receiver gone means the cycle is tearing down.
                            let _ = message_tx.send(frame);
                        }
                        command::ERROR => {
                            error!("broker error frame: {}", frame.body.trim());
                        }
                        other => trace!("ignoring {other} frame"),
                    },
                    Err(e) => {
                        error!("transport error: {e}");
                        break;
                    }
                }
            }
            reader_connected.store(false, Ordering::SeqCst);
        });

        let heartbeat_tx = outbound_tx.clone();
        let heartbeat = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(HEARTBEAT_MS));
            // The first tick fires immediately; the CONNECT frame already
            // proved liveness, so skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if heartbeat_tx.send(OutboundFrame::Heartbeat).await.is_err() {
                    break;
                }
            }
        });

        Self {
            outbound_tx: Some(outbound_tx),
            message_rx,
            connected,
            writer: Some(writer),
            tasks: vec![reader, heartbeat],
        }
    }

    /// Subscribe to a destination. Used once per cycle for the private reply
    /// channel, so a failure here is session-fatal.
    pub async fn subscribe(&self, destination: &str, id: &str, ack: &str) -> CollectResult<()> {
        let Some(tx) = &self.outbound_tx else {
            return Err(CollectError::Connection("session closed".to_string()));
        };
        tx.send(Frame::subscribe(destination, id, ack).into())
            .await
            .map_err(|_| CollectError::Connection("session writer closed".to_string()))
    }

    /// Queue a SEND frame for transmission.
    pub async fn send(
        &self,
        destination: &str,
        body: &str,
        headers: &[(&str, &str)],
    ) -> CollectResult<()> {
        let Some(tx) = &self.outbound_tx else {
            return Err(CollectError::Send("session closed".to_string()));
        };
        let mut frame = Frame::send(destination, body);
        for (name, value) in headers {
            frame = frame.header(name, value);
        }
        tx.send(frame.into())
            .await
            .map_err(|_| CollectError::Send("session writer closed".to_string()))
    }

    /// Drain one queued MESSAGE frame, if any arrived.
    pub fn try_recv_message(&mut self) -> Option<Frame> {
        self.message_rx.try_recv().ok()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Close the session. Safe to call at any time, any number of times.
    pub async fn disconnect(&mut self) {
        if self.connected.swap(false, Ordering::SeqCst)
            && let Some(tx) = self.outbound_tx.take()
        {
            let _ = tx.send(Frame::disconnect().into()).await;
            drop(tx);
            // The heartbeat task holds the last remaining sender clone;
            // stopping it closes the channel, so the writer drains the
            // queued DISCONNECT frame and exits on its own.
            for task in self.tasks.drain(..) {
                task.abort();
            }
            if let Some(writer) = self.writer.take()
                && timeout(FLUSH_TIMEOUT, writer).await.is_err()
            {
                warn!("writer did not drain within {FLUSH_TIMEOUT:?}");
            }
            debug!("disconnected from broker");
        }
        self.outbound_tx = None;
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
    }
}

impl Drop for BrokerSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        if let Some(writer) = &self.writer {
            writer.abort();
        }
    }
}

/// Wait for the broker's answer to CONNECT: CONNECTED wins, ERROR or a dead
/// socket loses.
async fn await_connected(framed: &mut BrokerStream) -> CollectResult<()> {
    let handshake = async {
        while let Some(item) = framed.next().await {
            let frame = item.map_err(|e| CollectError::Connection(e.to_string()))?;
            match frame.command.as_str() {
                command::CONNECTED => return Ok(()),
                command::ERROR => {
                    let detail = frame
                        .get_header("message")
                        .map(str::to_string)
                        .unwrap_or_else(|| frame.body.trim().to_string());
                    return Err(CollectError::Connection(format!(
                        "broker rejected connection: {detail}"
                    )));
                }
                other => trace!("ignoring {other} frame during handshake"),
            }
        }
        Err(CollectError::Connection(
            "connection closed during handshake".to_string(),
        ))
    };

    timeout(CONNECT_TIMEOUT, handshake)
        .await
        .map_err(|_| CollectError::Connection("timed out waiting for CONNECTED".to_string()))?
}

/// TLS connector trusting the standard web PKI roots. Applied uniformly to
/// every candidate endpoint.
fn build_tls_connector() -> TlsConnector {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}
