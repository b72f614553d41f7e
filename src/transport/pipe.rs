//! # Byte-Stream Endpoints
//!
//! One named, point-to-point, reliable stream between the two processes.
//!
//! - **Windows**: native named pipes at `\\.\pipe\<name>`
//! - **Unix**: a domain socket at `<tmp>/<name>.sock`
//! - **Memory**: `tokio::io::duplex` streams for tests
//!
//! The listener accepts exactly one peer per cycle. The connector polls
//! until the listener exists, so either process may start first.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

use crate::error::{BridgeError, Result};

/// Any bidirectional byte stream the session can frame
pub trait Duplex: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Duplex for T {}

pub type PipeStream = Box<dyn Duplex>;

/// Produces one connected stream per connection cycle
pub trait PipeEndpoint: Send {
    /// Wait for a peer and return the connected stream
    fn open(&mut self) -> impl Future<Output = Result<PipeStream>> + Send;

    /// Release OS resources held between cycles
    fn reset(&mut self) {}

    /// Human-readable address for logs
    fn describe(&self) -> String;
}

/// Which end of the channel this process owns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Creates the channel and waits for the peer (game side)
    Listener,
    /// Attaches to an existing channel (voice side)
    Connector,
}

/// Retry interval while the connector waits for the listener to appear
const CONNECT_POLL: Duration = Duration::from_millis(250);

/// Platform-native local endpoint
pub struct LocalPipe {
    name: String,
    role: Role,
    #[cfg(unix)]
    listener: Option<tokio::net::UnixListener>,
}

impl LocalPipe {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
            #[cfg(unix)]
            listener: None,
        }
    }

    pub fn listener(name: impl Into<String>) -> Self {
        Self::new(name, Role::Listener)
    }

    pub fn connector(name: impl Into<String>) -> Self {
        Self::new(name, Role::Connector)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Platform path of the channel
    pub fn path(&self) -> PathBuf {
        pipe_path(&self.name)
    }
}

#[cfg(windows)]
fn pipe_path(name: &str) -> PathBuf {
    PathBuf::from(format!(r"\\.\pipe\{name}"))
}

#[cfg(unix)]
fn pipe_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{name}.sock"))
}

#[cfg(unix)]
impl LocalPipe {
    async fn accept(&mut self) -> Result<PipeStream> {
        if self.listener.is_none() {
            let path = self.path();
            if path.exists() {
                // stale socket from a crashed listener
                tokio::fs::remove_file(&path).await.ok();
            }
            self.listener = Some(tokio::net::UnixListener::bind(&path)?);
            info!(path = %path.display(), "Listening on unix socket");
        }
        let listener = self.listener.as_ref().ok_or(BridgeError::NotConnected)?;
        let (stream, _) = listener.accept().await?;
        Ok(Box::new(stream))
    }

    async fn dial(&self) -> Result<PipeStream> {
        let path = self.path();
        loop {
            match tokio::net::UnixStream::connect(&path).await {
                Ok(stream) => return Ok(Box::new(stream)),
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused
                    ) =>
                {
                    tokio::time::sleep(CONNECT_POLL).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn release(&mut self) {
        if self.listener.take().is_some() {
            let path = self.path();
            if let Err(e) = std::fs::remove_file(&path) {
                debug!(error = %e, path = %path.display(), "Socket file already gone");
            }
        }
    }
}

#[cfg(windows)]
impl LocalPipe {
    async fn accept(&mut self) -> Result<PipeStream> {
        use tokio::net::windows::named_pipe::ServerOptions;

        let path = self.path();
        let server = ServerOptions::new()
            .first_pipe_instance(true)
            .create(&path)?;
        info!(pipe = %path.display(), "Named pipe listening");
        server.connect().await?;
        Ok(Box::new(server))
    }

    async fn dial(&self) -> Result<PipeStream> {
        use tokio::net::windows::named_pipe::ClientOptions;

        // ERROR_PIPE_BUSY: the instance exists but is serving another client
        const ERROR_PIPE_BUSY: i32 = 231;

        let path = self.path();
        loop {
            match ClientOptions::new().open(&path) {
                Ok(client) => return Ok(Box::new(client)),
                Err(e)
                    if e.kind() == std::io::ErrorKind::NotFound
                        || e.raw_os_error() == Some(ERROR_PIPE_BUSY) =>
                {
                    tokio::time::sleep(CONNECT_POLL).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn release(&mut self) {}
}

impl PipeEndpoint for LocalPipe {
    #[instrument(skip(self), fields(pipe = %self.name, role = ?self.role))]
    async fn open(&mut self) -> Result<PipeStream> {
        let stream = match self.role {
            Role::Listener => self.accept().await?,
            Role::Connector => self.dial().await?,
        };
        info!("Peer attached");
        Ok(stream)
    }

    fn reset(&mut self) {
        self.release();
    }

    fn describe(&self) -> String {
        self.path().display().to_string()
    }
}

/// Listening half of an in-memory channel pair
pub struct MemoryListener {
    incoming: mpsc::Receiver<DuplexStream>,
}

/// Connecting half of an in-memory channel pair. Each `open` creates a new
/// duplex stream and hands the other end to the listener.
pub struct MemoryConnector {
    outgoing: mpsc::Sender<DuplexStream>,
    buffer: usize,
}

/// In-memory endpoint pair; `buffer` is the duplex capacity in bytes
pub fn memory_pair(buffer: usize) -> (MemoryListener, MemoryConnector) {
    let (outgoing, incoming) = mpsc::channel(1);
    (
        MemoryListener { incoming },
        MemoryConnector { outgoing, buffer },
    )
}

impl PipeEndpoint for MemoryListener {
    async fn open(&mut self) -> Result<PipeStream> {
        let stream = self.incoming.recv().await.ok_or(BridgeError::ChannelClosed)?;
        Ok(Box::new(stream))
    }

    fn describe(&self) -> String {
        String::from("memory:listener")
    }
}

impl PipeEndpoint for MemoryConnector {
    async fn open(&mut self) -> Result<PipeStream> {
        let (local, remote) = tokio::io::duplex(self.buffer);
        self.outgoing
            .send(remote)
            .await
            .map_err(|_| BridgeError::ChannelClosed)?;
        Ok(Box::new(local))
    }

    fn describe(&self) -> String {
        String::from("memory:connector")
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_memory_pair_connects() {
        let (mut listener, mut connector) = memory_pair(64);
        let (accepted, dialed) = tokio::join!(listener.open(), connector.open());
        let mut accepted = accepted.expect("accept");
        let mut dialed = dialed.expect("dial");

        dialed.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        accepted.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[tokio::test]
    async fn test_memory_listener_closed() {
        let (mut listener, connector) = memory_pair(64);
        drop(connector);
        assert!(matches!(
            listener.open().await,
            Err(BridgeError::ChannelClosed)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_unix_path_in_temp_dir() {
        let pipe = LocalPipe::listener("svb-test");
        assert_eq!(pipe.path(), std::env::temp_dir().join("svb-test.sock"));
        assert_eq!(pipe.role(), Role::Listener);
    }
}
