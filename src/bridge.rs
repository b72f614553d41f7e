//! # Bridge Contexts
//!
//! One context object per side, created by the host's `init` entry point
//! and torn down by `shutdown`. Host callbacks are thin adapters that
//! forward into methods on these objects; there is no global state.
//!
//! Neither host runs an async executor, so `init` builds a small Tokio
//! runtime owned by the context. `start` attaches to an existing runtime
//! instead, which is what tests and embedding applications use.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use spatial_voice_bridge::bridge::VoiceBridge;
//! use spatial_voice_bridge::config::BridgeConfig;
//! use spatial_voice_bridge::pipeline::memory::MemoryVoiceHost;
//!
//! let host = Arc::new(MemoryVoiceHost::new(1));
//! let mut bridge = VoiceBridge::init(BridgeConfig::default(), host)?;
//! bridge.on_roster_changed()?;
//! bridge.shutdown();
//! # Ok::<(), spatial_voice_bridge::error::BridgeError>(())
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::{Handle, Runtime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::BridgeConfig;
use crate::core::frame::UpdateMessage;
use crate::error::Result;
use crate::pipeline::{ClientId, GameWorld, UpdateConsumer, UpdateProducer, VoiceHost};
use crate::transport::{
    frame_channel, run_reader, run_writer, Backoff, FrameHandler, FrameSender, LinkState,
    LinkStatus, LocalPipe, PipeEndpoint, TransportSession,
};
use crate::utils::logging::init_logging;
use crate::utils::metrics::Metrics;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

fn build_runtime(name: &str) -> Result<Runtime> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name(name)
        .enable_all()
        .build()?;
    Ok(runtime)
}

/// Background task plus the runtime it runs on, if this context owns one
struct Worker {
    cancel: CancellationToken,
    task: Option<JoinHandle<Result<()>>>,
    runtime: Option<Runtime>,
}

impl Worker {
    fn stop(&mut self) {
        self.cancel.cancel();
        let Some(runtime) = self.runtime.take() else {
            // borrowed runtime: the task winds down on its own
            self.task.take();
            return;
        };
        if let Some(task) = self.task.take() {
            let joined = runtime.block_on(async { tokio::time::timeout(SHUTDOWN_GRACE, task).await });
            match joined {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => warn!(error = %e, "Transport task ended with error"),
                Ok(Err(e)) => error!(error = %e, "Transport task panicked"),
                Err(_) => warn!("Transport task did not stop in time"),
            }
        }
        runtime.shutdown_timeout(SHUTDOWN_GRACE);
    }
}

/// Tracks link transitions so each one is reported once
struct LinkWatch {
    status: watch::Receiver<LinkStatus>,
    last: LinkState,
}

impl LinkWatch {
    fn new(status: watch::Receiver<LinkStatus>) -> Self {
        Self {
            status,
            last: LinkState::Disconnected,
        }
    }

    /// New state since the last poll, ignoring the transient `Connecting`
    fn poll(&mut self) -> Option<LinkState> {
        if !self.status.has_changed().unwrap_or(false) {
            return None;
        }
        let state = self.status.borrow_and_update().state;
        if state == self.last || state == LinkState::Connecting {
            return None;
        }
        self.last = state;
        Some(state)
    }
}

/// Game-side context: one producer tick per game frame, frames written by a
/// background task acting as the channel listener.
pub struct GameBridge {
    producer: UpdateProducer,
    sender: FrameSender,
    link: LinkWatch,
    metrics: Arc<Metrics>,
    worker: Worker,
}

impl GameBridge {
    /// Host entry point: validate config, set up logging, own a runtime and
    /// listen on the configured pipe
    pub fn init(config: BridgeConfig) -> Result<Self> {
        config.validate_strict()?;
        init_logging(&config.logging);
        let runtime = build_runtime("svb-game")?;
        let endpoint = LocalPipe::listener(config.transport.pipe_name.clone());
        let mut bridge = Self::start(config, endpoint, runtime.handle())?;
        bridge.worker.runtime = Some(runtime);
        info!("Game bridge initialised");
        Ok(bridge)
    }

    /// Spawn the writer on `handle` using `endpoint`
    pub fn start<E>(config: BridgeConfig, endpoint: E, handle: &Handle) -> Result<Self>
    where
        E: PipeEndpoint + 'static,
    {
        config.validate_strict()?;
        let metrics = Arc::new(Metrics::new());
        let cancel = CancellationToken::new();
        let session = TransportSession::new(endpoint, cancel.clone());
        let status = session.subscribe();
        let (sender, frames) = frame_channel(config.transport.write_queue, status.clone());
        let backoff = Backoff::from_config(&config.transport);
        let task = handle.spawn(run_writer(session, frames, backoff, metrics.clone()));

        Ok(Self {
            producer: UpdateProducer::new(config.pipeline, metrics.clone()),
            sender,
            link: LinkWatch::new(status),
            metrics,
            worker: Worker {
                cancel,
                task: Some(task),
                runtime: None,
            },
        })
    }

    /// Per-tick host callback. Never fails: errors are logged and the tick
    /// becomes a no-op.
    pub fn on_tick<W: GameWorld + ?Sized>(&mut self, world: &W) -> Option<UpdateMessage> {
        if let Some(state) = self.link.poll() {
            info!(%state, "Voice link state changed");
            world.notify(state.status_text());
        }
        match self.producer.tick(world, &self.sender) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Tick failed");
                self.metrics.tick_dropped();
                None
            }
        }
    }

    pub fn status(&self) -> LinkStatus {
        *self.link.status.borrow()
    }

    pub fn producer(&self) -> &UpdateProducer {
        &self.producer
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Host exit point. Idempotent.
    pub fn shutdown(&mut self) {
        if self.worker.cancel.is_cancelled() {
            return;
        }
        self.worker.stop();
        self.metrics.log_metrics();
        info!("Game bridge shut down");
    }
}

impl Drop for GameBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Frame handler that applies frames under the consumer lock
pub struct SharedConsumer<V: VoiceHost> {
    consumer: Arc<Mutex<UpdateConsumer>>,
    host: Arc<V>,
}

impl<V: VoiceHost> FrameHandler for SharedConsumer<V> {
    fn on_frame(&mut self, message: UpdateMessage) -> Result<()> {
        self.consumer.lock()?.apply(&message, self.host.as_ref())
    }

    fn on_link_state(&mut self, status: LinkStatus) {
        info!(state = %status.state, epoch = status.epoch, "Game link state changed");
        self.host.notify(status.state.status_text());
        if status.state != LinkState::Connected {
            match self.consumer.lock() {
                Ok(mut consumer) => consumer.on_disconnected(self.host.as_ref()),
                Err(_) => error!("Consumer lock poisoned"),
            }
        }
    }
}

/// Voice-side context: frames read by a background task acting as the
/// channel connector, plus the voice host's callbacks.
pub struct VoiceBridge<V: VoiceHost + 'static> {
    host: Arc<V>,
    consumer: Arc<Mutex<UpdateConsumer>>,
    status: watch::Receiver<LinkStatus>,
    metrics: Arc<Metrics>,
    worker: Worker,
}

impl<V: VoiceHost + 'static> VoiceBridge<V> {
    /// Host entry point: validate config, set up logging, own a runtime and
    /// connect to the configured pipe
    pub fn init(config: BridgeConfig, host: Arc<V>) -> Result<Self> {
        config.validate_strict()?;
        init_logging(&config.logging);
        let runtime = build_runtime("svb-voice")?;
        let endpoint = LocalPipe::connector(config.transport.pipe_name.clone());
        let mut bridge = Self::start(config, endpoint, host, runtime.handle())?;
        bridge.worker.runtime = Some(runtime);
        info!("Voice bridge initialised");
        Ok(bridge)
    }

    /// Spawn the reader on `handle` using `endpoint`
    pub fn start<E>(config: BridgeConfig, endpoint: E, host: Arc<V>, handle: &Handle) -> Result<Self>
    where
        E: PipeEndpoint + 'static,
    {
        config.validate_strict()?;
        let metrics = Arc::new(Metrics::new());
        let consumer = Arc::new(Mutex::new(UpdateConsumer::new(metrics.clone())));
        let cancel = CancellationToken::new();
        let session = TransportSession::new(endpoint, cancel.clone());
        let status = session.subscribe();
        let handler = SharedConsumer {
            consumer: consumer.clone(),
            host: host.clone(),
        };
        let backoff = Backoff::from_config(&config.transport);
        let task = handle.spawn(run_reader(session, handler, backoff, metrics.clone()));

        Ok(Self {
            host,
            consumer,
            status,
            metrics,
            worker: Worker {
                cancel,
                task: Some(task),
                runtime: None,
            },
        })
    }

    /// A client entered the local channel
    pub fn on_client_joined(&self, client: ClientId) -> Result<()> {
        let mut consumer = self.consumer.lock()?;
        consumer.on_roster_changed(self.host.as_ref());
        consumer.on_client_joined(client, self.host.as_ref())
    }

    /// Channel membership changed (client left, local client moved)
    pub fn on_roster_changed(&self) -> Result<()> {
        self.consumer.lock()?.on_roster_changed(self.host.as_ref());
        Ok(())
    }

    /// A peer text command arrived from `client`
    pub fn on_plugin_command(&self, client: ClientId, text: &str) -> Result<()> {
        self.consumer
            .lock()?
            .on_plugin_command(client, text, self.host.as_ref())
    }

    pub fn status(&self) -> LinkStatus {
        *self.status.borrow()
    }

    /// Shared handle on the consumer, e.g. for inspection in tests
    pub fn consumer(&self) -> Arc<Mutex<UpdateConsumer>> {
        self.consumer.clone()
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Host exit point. Idempotent.
    pub fn shutdown(&mut self) {
        if self.worker.cancel.is_cancelled() {
            return;
        }
        self.worker.stop();
        self.metrics.log_metrics();
        info!("Voice bridge shut down");
    }
}

impl<V: VoiceHost + 'static> Drop for VoiceBridge<V> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
