//! Long-running transport tasks with the reconnect policy.
//!
//! The game side runs [`run_writer`], fed by the producer through a
//! [`FrameSender`]. The voice side runs [`run_reader`], which hands every
//! decoded frame to a [`FrameHandler`]. Both loop
//! `connect -> pump -> reset -> backoff` until canceled.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::core::frame::UpdateMessage;
use crate::error::{BridgeError, Result};
use crate::pipeline::producer::FrameSink;
use crate::utils::metrics::Metrics;

use super::backoff::Backoff;
use super::pipe::PipeEndpoint;
use super::session::{LinkState, LinkStatus, TransportSession};

/// Producer-facing handle onto the writer task's queue
#[derive(Debug, Clone)]
pub struct FrameSender {
    frames: mpsc::Sender<Bytes>,
    status: watch::Receiver<LinkStatus>,
}

/// Queue of `capacity` frames between the producer and [`run_writer`]
pub fn frame_channel(
    capacity: usize,
    status: watch::Receiver<LinkStatus>,
) -> (FrameSender, mpsc::Receiver<Bytes>) {
    let (frames, rx) = mpsc::channel(capacity.max(1));
    (FrameSender { frames, status }, rx)
}

impl FrameSink for FrameSender {
    fn is_ready(&self) -> bool {
        self.status.borrow().state == LinkState::Connected
    }

    fn epoch(&self) -> u64 {
        self.status.borrow().epoch
    }

    fn try_send(&self, frame: Bytes) -> Result<()> {
        self.frames.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => BridgeError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => BridgeError::ChannelClosed,
        })
    }
}

/// Receives decoded frames on the consumer side
pub trait FrameHandler: Send {
    fn on_frame(&mut self, message: UpdateMessage) -> Result<()>;

    fn on_link_state(&mut self, _status: LinkStatus) {}
}

/// Wait out a reconnect delay unless canceled first
async fn pause(cancel: CancellationToken, backoff: &mut Backoff) -> Result<()> {
    let delay = backoff.next_delay();
    debug!(delay_ms = delay.as_millis() as u64, "Reconnecting after delay");
    tokio::select! {
        _ = cancel.cancelled() => Err(BridgeError::Canceled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

fn log_cycle_end(error: &BridgeError, metrics: &Metrics) {
    if error.is_expected_closure() {
        info!("Peer closed the channel");
    } else {
        if matches!(error, BridgeError::CorruptFrame(_)) {
            metrics.corrupt_frame();
        }
        warn!(error = %error, "Link failed");
    }
}

async fn write_cycle<E: PipeEndpoint>(
    session: &mut TransportSession<E>,
    frames: &mut mpsc::Receiver<Bytes>,
    backoff: &mut Backoff,
    metrics: &Metrics,
) -> Result<()> {
    session.connect().await?;
    metrics.connection_established();
    backoff.reset();

    let cancel = session.cancel_token();
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return Err(BridgeError::Canceled),
            frame = frames.recv() => frame,
        };
        // `None`: the producer dropped its sender
        let Some(frame) = frame else {
            return Ok(());
        };
        session.write_frame(frame).await?;
    }
}

async fn read_cycle<E: PipeEndpoint, H: FrameHandler>(
    session: &mut TransportSession<E>,
    handler: &mut H,
    backoff: &mut Backoff,
    metrics: &Metrics,
) -> Result<()> {
    session.connect().await?;
    metrics.connection_established();
    backoff.reset();
    handler.on_link_state(session.status());

    loop {
        let message = session.read_frame().await?;
        metrics.frame_received(message.encoded_len() as u64);
        if let Err(e) = handler.on_frame(message) {
            warn!(error = %e, "Failed to apply frame");
        }
    }
}

/// Write queued frames until canceled or the producer goes away.
///
/// Frames queued while no peer was attached are discarded before each
/// connection attempt; the producer resends full state on the new epoch.
#[instrument(skip_all, fields(endpoint = %session.describe()))]
pub async fn run_writer<E: PipeEndpoint>(
    mut session: TransportSession<E>,
    mut frames: mpsc::Receiver<Bytes>,
    mut backoff: Backoff,
    metrics: Arc<Metrics>,
) -> Result<()> {
    loop {
        while frames.try_recv().is_ok() {}

        match write_cycle(&mut session, &mut frames, &mut backoff, &metrics).await {
            Ok(()) => {
                info!("Frame queue closed, stopping writer");
                session.shutdown();
                return Ok(());
            }
            Err(BridgeError::Canceled) => {
                session.shutdown();
                return Ok(());
            }
            Err(e) if !e.is_reconnectable() => {
                session.shutdown();
                return Err(e);
            }
            Err(e) => {
                log_cycle_end(&e, &metrics);
                session.reset();
                metrics.reconnect();
                if pause(session.cancel_token(), &mut backoff).await.is_err() {
                    session.shutdown();
                    return Ok(());
                }
            }
        }
    }
}

/// Read frames and dispatch them until canceled.
///
/// Handler errors are logged and the frame is dropped; only transport and
/// decode failures end the connection.
#[instrument(skip_all, fields(endpoint = %session.describe()))]
pub async fn run_reader<E: PipeEndpoint, H: FrameHandler>(
    mut session: TransportSession<E>,
    mut handler: H,
    mut backoff: Backoff,
    metrics: Arc<Metrics>,
) -> Result<()> {
    loop {
        match read_cycle(&mut session, &mut handler, &mut backoff, &metrics).await {
            Ok(()) => {}
            Err(BridgeError::Canceled) => break,
            Err(e) if !e.is_reconnectable() => {
                session.shutdown();
                handler.on_link_state(session.status());
                return Err(e);
            }
            Err(e) => {
                log_cycle_end(&e, &metrics);
                session.reset();
                handler.on_link_state(session.status());
                metrics.reconnect();
                if pause(session.cancel_token(), &mut backoff).await.is_err() {
                    break;
                }
            }
        }
    }

    session.shutdown();
    handler.on_link_state(session.status());
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn test_sender_reflects_link_status() {
        let (status_tx, status_rx) = watch::channel(LinkStatus::default());
        let (sender, mut rx) = frame_channel(1, status_rx);
        assert!(!sender.is_ready());

        status_tx.send_replace(LinkStatus {
            state: LinkState::Connected,
            epoch: 3,
        });
        assert!(sender.is_ready());
        assert_eq!(sender.epoch(), 3);

        sender.try_send(Bytes::from_static(b"a")).unwrap();
        assert!(matches!(
            sender.try_send(Bytes::from_static(b"b")),
            Err(BridgeError::QueueFull)
        ));
        assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(b"a"));

        drop(rx);
        assert!(matches!(
            sender.try_send(Bytes::from_static(b"c")),
            Err(BridgeError::ChannelClosed)
        ));
    }
}
