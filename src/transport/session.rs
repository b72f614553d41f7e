//! Connection lifecycle for one byte-stream channel.

use std::fmt;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{ReadHalf, WriteHalf};
use tokio::sync::watch;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::core::codec::FrameCodec;
use crate::core::frame::UpdateMessage;
use crate::error::{BridgeError, Result};

use super::pipe::{PipeEndpoint, PipeStream};

/// Connection state published to both bridge sides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    /// Canceled; the session will not reconnect
    Shutdown,
}

impl LinkState {
    /// Short status line for host notifications
    pub fn status_text(self) -> &'static str {
        match self {
            LinkState::Disconnected => "Voice bridge connection lost, restarting",
            LinkState::Connecting => "Voice bridge waiting for peer",
            LinkState::Connected => "Voice bridge connected",
            LinkState::Shutdown => "Voice bridge stopped",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
            LinkState::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

/// State plus the number of connections established so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatus {
    pub state: LinkState,
    pub epoch: u64,
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self {
            state: LinkState::Disconnected,
            epoch: 0,
        }
    }
}

type Reader = FramedRead<ReadHalf<PipeStream>, FrameCodec>;
type Writer = FramedWrite<WriteHalf<PipeStream>, FrameCodec>;

/// Owns the framed stream of the current connection cycle.
///
/// `connect` and every read or write race against the session's
/// cancellation token; once canceled the session is `Shutdown` for good.
pub struct TransportSession<E: PipeEndpoint> {
    endpoint: E,
    reader: Option<Reader>,
    writer: Option<Writer>,
    cancel: CancellationToken,
    status: watch::Sender<LinkStatus>,
}

impl<E: PipeEndpoint> TransportSession<E> {
    pub fn new(endpoint: E, cancel: CancellationToken) -> Self {
        let (status, _) = watch::channel(LinkStatus::default());
        Self {
            endpoint,
            reader: None,
            writer: None,
            cancel,
            status,
        }
    }

    pub fn status(&self) -> LinkStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LinkStatus> {
        self.status.subscribe()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn describe(&self) -> String {
        self.endpoint.describe()
    }

    pub fn is_connected(&self) -> bool {
        self.reader.is_some()
    }

    fn set_state(&self, state: LinkState) {
        self.status.send_if_modified(|status| {
            if status.state == state {
                return false;
            }
            if state == LinkState::Connected {
                status.epoch += 1;
            }
            status.state = state;
            true
        });
    }

    /// Wait for a peer. Errors leave the session `Disconnected`; cancellation
    /// leaves it `Shutdown`.
    #[instrument(skip(self), fields(endpoint = %self.endpoint.describe()))]
    pub async fn connect(&mut self) -> Result<()> {
        if self.cancel.is_cancelled() {
            self.set_state(LinkState::Shutdown);
            return Err(BridgeError::Canceled);
        }
        self.set_state(LinkState::Connecting);

        let cancel = self.cancel.clone();
        let opened = tokio::select! {
            _ = cancel.cancelled() => Err(BridgeError::Canceled),
            stream = self.endpoint.open() => stream,
        };

        let stream = match opened {
            Ok(stream) => stream,
            Err(BridgeError::Canceled) => {
                self.set_state(LinkState::Shutdown);
                return Err(BridgeError::Canceled);
            }
            Err(e) => {
                self.set_state(LinkState::Disconnected);
                return Err(e);
            }
        };

        let (read, write) = tokio::io::split(stream);
        self.reader = Some(FramedRead::new(read, FrameCodec::new()));
        self.writer = Some(FramedWrite::new(write, FrameCodec::new()));
        self.set_state(LinkState::Connected);
        info!(epoch = self.status().epoch, "Link established");
        Ok(())
    }

    /// Next complete frame. A clean end of stream is `ChannelClosed`.
    pub async fn read_frame(&mut self) -> Result<UpdateMessage> {
        let reader = self.reader.as_mut().ok_or(BridgeError::NotConnected)?;
        tokio::select! {
            _ = self.cancel.cancelled() => Err(BridgeError::Canceled),
            next = reader.next() => match next {
                Some(frame) => frame,
                None => Err(BridgeError::ChannelClosed),
            },
        }
    }

    /// Write one already-encoded frame and flush it
    pub async fn write_frame(&mut self, frame: Bytes) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(BridgeError::NotConnected)?;
        tokio::select! {
            _ = self.cancel.cancelled() => Err(BridgeError::Canceled),
            sent = writer.send(frame) => sent,
        }
    }

    /// Tear down the current stream so the next `connect` starts fresh
    pub fn reset(&mut self) {
        self.reader = None;
        self.writer = None;
        self.endpoint.reset();
        if self.status().state != LinkState::Shutdown {
            self.set_state(LinkState::Disconnected);
        }
        debug!("Session reset");
    }

    /// Cancel and release everything; the session never reconnects
    pub fn shutdown(&mut self) {
        self.cancel.cancel();
        self.reset();
        self.set_state(LinkState::Shutdown);
    }
}
