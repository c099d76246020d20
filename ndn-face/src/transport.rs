//! Transport contract and the stream transports speaking to a local
//! forwarder.
//!
//! A transport is a duplex pipe carrying fully framed NDNLP blocks.
//! The face connects it once, writes blocks synchronously, and receives
//! blocks through a callback; `pause`/`resume` gate the read side while
//! the face has nothing pending.

use bytes::{Bytes, BytesMut};
use log::{debug, warn};
use ndn_face_core::MAX_NDN_PACKET_SIZE;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, UnixStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::error::Error;

/// Default Unix socket of the local forwarder.
pub const DEFAULT_UNIX_SOCKET_PATH: &str = "/run/nfd/nfd.sock";

/// Environment variable overriding the transport selection.
pub const TRANSPORT_ENVIRON: &str = "NDN_CLIENT_TRANSPORT";

/// Observable state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Closed,
    Connecting,
    Running,
    Paused,
    Failed,
}

/// Callback receiving one fully framed block per invocation.
pub type ReceiveCallback = Box<dyn FnMut(Bytes) + Send>;

/// Duplex block pipe to the forwarder.
pub trait Transport: Send {
    /// Opens the connection and installs the receive callback.
    /// Connecting an already connected transport is a no-op.
    fn connect(&mut self, on_receive: ReceiveCallback) -> Result<(), Error>;

    /// Queues one block for transmission.
    fn send(&mut self, block: Bytes) -> Result<(), Error>;

    /// Stops delivering received blocks until resumed.
    fn pause(&mut self);

    /// Resumes delivery of received blocks.
    fn resume(&mut self);

    /// Closes the connection and drops queued blocks.
    fn close(&mut self);

    fn state(&self) -> TransportState;
}

/* ---------------------------------------------------------------- *
 * Transport URIs and selection
 * ---------------------------------------------------------------- */

/// Parsed transport URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportUri {
    Unix(PathBuf),
    Tcp { host: String, port: u16 },
}

impl FromStr for TransportUri {
    type Err = Error;

    fn from_str(uri: &str) -> Result<Self, Error> {
        let (scheme, rest) = uri
            .split_once("://")
            .ok_or_else(|| Error::Config(format!("malformed transport URI '{uri}'")))?;

        match scheme {
            "unix" => {
                if rest.is_empty() {
                    return Err(Error::Config(format!("empty path in transport URI '{uri}'")));
                }
                Ok(TransportUri::Unix(PathBuf::from(rest)))
            }
            "tcp" | "tcp4" | "tcp6" => {
                let (host, port) = rest
                    .rsplit_once(':')
                    .ok_or_else(|| Error::Config(format!("missing port in transport URI '{uri}'")))?;
                if host.is_empty() {
                    return Err(Error::Config(format!("empty host in transport URI '{uri}'")));
                }
                let port = port
                    .parse::<u16>()
                    .map_err(|_| Error::Config(format!("invalid port in transport URI '{uri}'")))?;
                Ok(TransportUri::Tcp {
                    host: host.to_string(),
                    port,
                })
            }
            other => Err(Error::Config(format!(
                "unsupported transport protocol '{other}'"
            ))),
        }
    }
}

/// Resolves the transport URI to use, given the environment override
/// and the client configuration. `None` means the default Unix socket.
pub fn resolve_transport_uri(
    environ: Option<&str>,
    config: &ClientConfig,
) -> Result<Option<TransportUri>, Error> {
    let uri = match environ {
        Some(value) if !value.is_empty() => Some(value.to_string()),
        _ => config.transport.clone(),
    };
    match uri {
        Some(uri) => Ok(Some(uri.parse()?)),
        None => Ok(None),
    }
}

/// Builds a transport for `uri`.
pub fn make_transport(uri: &TransportUri) -> Box<dyn Transport> {
    match uri {
        TransportUri::Unix(path) => Box::new(UnixTransport::new(path.clone())),
        TransportUri::Tcp { host, port } => Box::new(TcpTransport::new(host.clone(), *port)),
    }
}

/// Builds the default transport per the selection precedence:
/// `NDN_CLIENT_TRANSPORT`, then the client config `transport` key, then
/// the default Unix socket.
pub fn make_default_transport(config: &ClientConfig) -> Result<Box<dyn Transport>, Error> {
    let environ = std::env::var(TRANSPORT_ENVIRON).ok();
    match resolve_transport_uri(environ.as_deref(), config)? {
        Some(uri) => Ok(make_transport(&uri)),
        None => Ok(Box::new(UnixTransport::new(DEFAULT_UNIX_SOCKET_PATH))),
    }
}

/* ---------------------------------------------------------------- *
 * Stream transports
 * ---------------------------------------------------------------- */

trait AsyncIo: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncIo for T {}

type IoStream = Box<dyn AsyncIo>;
type ConnectFuture = Pin<Box<dyn Future<Output = std::io::Result<IoStream>> + Send>>;

/// Engine shared by the Unix and TCP transports: a connect task that
/// becomes the read loop, plus a writer task draining the send queue.
struct StreamTransport {
    description: String,
    connector: Box<dyn Fn() -> ConnectFuture + Send>,
    state: Arc<Mutex<TransportState>>,
    out_tx: Option<mpsc::UnboundedSender<Bytes>>,
    pause_tx: Option<watch::Sender<bool>>,
    io_task: Option<JoinHandle<()>>,
}

impl StreamTransport {
    fn new(description: String, connector: Box<dyn Fn() -> ConnectFuture + Send>) -> Self {
        Self {
            description,
            connector,
            state: Arc::new(Mutex::new(TransportState::Closed)),
            out_tx: None,
            pause_tx: None,
            io_task: None,
        }
    }

    fn set_state(&self, state: TransportState) {
        if let Ok(mut guard) = self.state.lock() {
            *guard = state;
        }
    }
}

impl Transport for StreamTransport {
    fn connect(&mut self, mut on_receive: ReceiveCallback) -> Result<(), Error> {
        if self.state() != TransportState::Closed {
            return Ok(());
        }

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Bytes>();
        let (pause_tx, mut pause_rx) = watch::channel(false);
        self.out_tx = Some(out_tx);
        self.pause_tx = Some(pause_tx);
        self.set_state(TransportState::Connecting);

        let state = Arc::clone(&self.state);
        let connect = (self.connector)();
        let description = self.description.clone();

        self.io_task = Some(tokio::spawn(async move {
            let stream = match connect.await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("[{description}] connect failed: {e}");
                    if let Ok(mut guard) = state.lock() {
                        *guard = TransportState::Failed;
                    }
                    return;
                }
            };
            debug!("[{description}] connected");
            if let Ok(mut guard) = state.lock() {
                *guard = TransportState::Running;
            }

            let (mut reader, mut writer) = tokio::io::split(stream);

            let write_state = Arc::clone(&state);
            let write_description = description.clone();
            let writer_task = tokio::spawn(async move {
                while let Some(block) = out_rx.recv().await {
                    if let Err(e) = writer.write_all(&block).await {
                        warn!("[{write_description}] write failed: {e}");
                        if let Ok(mut guard) = write_state.lock() {
                            *guard = TransportState::Failed;
                        }
                        break;
                    }
                }
            });

            loop {
                // hold reads while paused
                while *pause_rx.borrow() {
                    if pause_rx.changed().await.is_err() {
                        writer_task.abort();
                        return;
                    }
                }

                match read_block(&mut reader).await {
                    Ok(Some(block)) => on_receive(block),
                    Ok(None) => {
                        debug!("[{description}] connection closed by peer");
                        if let Ok(mut guard) = state.lock() {
                            *guard = TransportState::Closed;
                        }
                        break;
                    }
                    Err(e) => {
                        warn!("[{description}] read failed: {e}");
                        if let Ok(mut guard) = state.lock() {
                            *guard = TransportState::Failed;
                        }
                        break;
                    }
                }
            }
            writer_task.abort();
        }));

        Ok(())
    }

    fn send(&mut self, block: Bytes) -> Result<(), Error> {
        match self.state() {
            TransportState::Closed | TransportState::Failed => {
                return Err(Error::Transport(format!(
                    "{} is not connected",
                    self.description
                )));
            }
            _ => {}
        }
        let out_tx = self
            .out_tx
            .as_ref()
            .ok_or_else(|| Error::Transport(format!("{} is not connected", self.description)))?;
        out_tx
            .send(block)
            .map_err(|_| Error::Transport(format!("{} send queue closed", self.description)))
    }

    fn pause(&mut self) {
        if self.state() == TransportState::Running {
            self.set_state(TransportState::Paused);
            if let Some(pause_tx) = &self.pause_tx {
                let _ = pause_tx.send(true);
            }
        }
    }

    fn resume(&mut self) {
        if self.state() == TransportState::Paused {
            self.set_state(TransportState::Running);
            if let Some(pause_tx) = &self.pause_tx {
                let _ = pause_tx.send(false);
            }
        }
    }

    fn close(&mut self) {
        if let Some(task) = self.io_task.take() {
            task.abort();
        }
        self.out_tx = None;
        self.pause_tx = None;
        self.set_state(TransportState::Closed);
    }

    fn state(&self) -> TransportState {
        self.state
            .lock()
            .map(|guard| *guard)
            .unwrap_or(TransportState::Failed)
    }
}

impl Drop for StreamTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Reads one TLV block, returning the raw bytes including its header.
/// `None` signals a clean end of stream at a block boundary.
async fn read_block<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Option<Bytes>> {
    let mut header = BytesMut::new();

    let tlv_type = match read_var_number(reader, &mut header).await {
        Ok(value) => value,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof && header.is_empty() => {
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    let _ = tlv_type;

    let length = read_var_number(reader, &mut header).await? as usize;
    if header.len() + length > MAX_NDN_PACKET_SIZE {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("incoming block of {length} octets exceeds the packet size limit"),
        ));
    }

    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload).await?;
    header.extend_from_slice(&payload);
    Ok(Some(header.freeze()))
}

/// Reads one variable-width number, appending the consumed bytes to
/// `raw` so the caller can reassemble the full block.
async fn read_var_number<R: AsyncRead + Unpin>(
    reader: &mut R,
    raw: &mut BytesMut,
) -> std::io::Result<u64> {
    let first = reader.read_u8().await?;
    raw.extend_from_slice(&[first]);
    match first {
        0..=252 => Ok(u64::from(first)),
        253 => {
            let mut buf = [0u8; 2];
            reader.read_exact(&mut buf).await?;
            raw.extend_from_slice(&buf);
            Ok(u64::from(u16::from_be_bytes(buf)))
        }
        254 => {
            let mut buf = [0u8; 4];
            reader.read_exact(&mut buf).await?;
            raw.extend_from_slice(&buf);
            Ok(u64::from(u32::from_be_bytes(buf)))
        }
        255 => {
            let mut buf = [0u8; 8];
            reader.read_exact(&mut buf).await?;
            raw.extend_from_slice(&buf);
            Ok(u64::from_be_bytes(buf))
        }
    }
}

/// Transport over the forwarder's Unix-domain socket.
pub struct UnixTransport {
    inner: StreamTransport,
}

impl UnixTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let description = format!("unix://{}", path.display());
        let connector = Box::new(move || -> ConnectFuture {
            let path = path.clone();
            Box::pin(async move {
                let stream = UnixStream::connect(path).await?;
                Ok(Box::new(stream) as IoStream)
            })
        });
        Self {
            inner: StreamTransport::new(description, connector),
        }
    }
}

impl Transport for UnixTransport {
    fn connect(&mut self, on_receive: ReceiveCallback) -> Result<(), Error> {
        self.inner.connect(on_receive)
    }

    fn send(&mut self, block: Bytes) -> Result<(), Error> {
        self.inner.send(block)
    }

    fn pause(&mut self) {
        self.inner.pause();
    }

    fn resume(&mut self) {
        self.inner.resume();
    }

    fn close(&mut self) {
        self.inner.close();
    }

    fn state(&self) -> TransportState {
        self.inner.state()
    }
}

/// Transport over a TCP connection to the forwarder.
pub struct TcpTransport {
    inner: StreamTransport,
}

impl TcpTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        let description = format!("tcp://{host}:{port}");
        let connect_host = host.clone();
        let connector = Box::new(move || -> ConnectFuture {
            let host = connect_host.clone();
            Box::pin(async move {
                let stream = TcpStream::connect((host.as_str(), port)).await?;
                Ok(Box::new(stream) as IoStream)
            })
        });
        Self {
            inner: StreamTransport::new(description, connector),
        }
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self, on_receive: ReceiveCallback) -> Result<(), Error> {
        self.inner.connect(on_receive)
    }

    fn send(&mut self, block: Bytes) -> Result<(), Error> {
        self.inner.send(block)
    }

    fn pause(&mut self) {
        self.inner.pause();
    }

    fn resume(&mut self) {
        self.inner.resume();
    }

    fn close(&mut self) {
        self.inner.close();
    }

    fn state(&self) -> TransportState {
        self.inner.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_parsing() {
        assert_eq!(
            "unix:///run/nfd/nfd.sock".parse::<TransportUri>().unwrap(),
            TransportUri::Unix(PathBuf::from("/run/nfd/nfd.sock"))
        );
        assert_eq!(
            "tcp://localhost:6363".parse::<TransportUri>().unwrap(),
            TransportUri::Tcp {
                host: "localhost".into(),
                port: 6363
            }
        );
        assert_eq!(
            "tcp4://127.0.0.1:6363".parse::<TransportUri>().unwrap(),
            TransportUri::Tcp {
                host: "127.0.0.1".into(),
                port: 6363
            }
        );

        assert!(matches!(
            "ws://localhost:9696".parse::<TransportUri>(),
            Err(Error::Config(_))
        ));
        assert!(matches!("nfd.sock".parse::<TransportUri>(), Err(Error::Config(_))));
        assert!(matches!("unix://".parse::<TransportUri>(), Err(Error::Config(_))));
        assert!(matches!(
            "tcp://localhost".parse::<TransportUri>(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            "tcp://localhost:notaport".parse::<TransportUri>(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn selection_precedence() {
        let config = ClientConfig {
            transport: Some("tcp://router:6363".to_string()),
        };

        // environment wins over the config file
        let uri = resolve_transport_uri(Some("unix:///tmp/test.sock"), &config)
            .unwrap()
            .unwrap();
        assert_eq!(uri, TransportUri::Unix(PathBuf::from("/tmp/test.sock")));

        // empty environment falls back to the config
        let uri = resolve_transport_uri(Some(""), &config).unwrap().unwrap();
        assert_eq!(
            uri,
            TransportUri::Tcp {
                host: "router".into(),
                port: 6363
            }
        );

        // nothing configured selects the default socket
        assert_eq!(
            resolve_transport_uri(None, &ClientConfig::default()).unwrap(),
            None
        );

        // malformed configuration surfaces as a config error
        let bad = ClientConfig {
            transport: Some("carrier-pigeon".to_string()),
        };
        assert!(matches!(
            resolve_transport_uri(None, &bad),
            Err(Error::Config(_))
        ));
    }
}
