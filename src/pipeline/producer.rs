//! Game-side per-tick producer.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::config::PipelineConfig;
use crate::core::frame::{
    AccountId, AddedParticipant, FrameHeader, ParticipantFlags, ParticipantState, UpdateMessage,
};
use crate::core::math::{canonical_forward, canonical_up, Pose, Vec3};
use crate::error::{BridgeError, Result};
use crate::graph::{ConnectivityGraph, EntityId, IdentityId, TransmitterId};
use crate::registry::{LiveEntry, Participant, ParticipantRegistry};
use crate::utils::metrics::{Metrics, Timer};

use super::host::GameWorld;
use super::throttle::RelayScheduler;

/// Where finished frames go.
///
/// `epoch` changes every time a new peer connection is established; the
/// producer re-sends its full state when it sees a new epoch.
pub trait FrameSink {
    fn is_ready(&self) -> bool;

    fn epoch(&self) -> u64;

    /// Hand a frame over without blocking. `QueueFull` and `NotConnected`
    /// mean the tick is skipped and retried with the next one.
    fn try_send(&self, frame: Bytes) -> Result<()>;
}

/// Builds one [`UpdateMessage`] per game tick.
///
/// Deltas that could not be delivered are kept until a frame actually goes
/// out, so a busy or reconnecting transport never loses joins or leaves.
pub struct UpdateProducer {
    config: PipelineConfig,
    registry: ParticipantRegistry<EntityId>,
    identities: HashMap<AccountId, IdentityId>,
    scheduler: RelayScheduler,
    observer: Option<IdentityId>,
    relay_sets: HashMap<AccountId, HashSet<TransmitterId>>,
    audiences: HashMap<AccountId, HashSet<AccountId>>,
    pending_added: BTreeSet<AccountId>,
    pending_removed: BTreeSet<AccountId>,
    synced_epoch: Option<u64>,
    metrics: Arc<Metrics>,
}

impl UpdateProducer {
    pub fn new(config: PipelineConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            scheduler: RelayScheduler::new(config.relay_updates_per_tick),
            config,
            registry: ParticipantRegistry::new(),
            identities: HashMap::new(),
            observer: None,
            relay_sets: HashMap::new(),
            audiences: HashMap::new(),
            pending_added: BTreeSet::new(),
            pending_removed: BTreeSet::new(),
            synced_epoch: None,
            metrics,
        }
    }

    pub fn registry(&self) -> &ParticipantRegistry<EntityId> {
        &self.registry
    }

    /// Whether `speaker`'s cached relay set reaches `listener`'s transmitter,
    /// i.e. `listener` receives `speaker` over the radio network
    pub fn can_hear(&self, listener: AccountId, speaker: AccountId) -> bool {
        self.audiences
            .get(&speaker)
            .is_some_and(|set| set.contains(&listener))
    }

    /// Cached relay set of a participant's transmitter as seen by the local
    /// listener, if one has been computed
    pub fn relay_set(&self, id: AccountId) -> Option<&HashSet<TransmitterId>> {
        self.relay_sets.get(&id)
    }

    /// Run one tick. Returns the message that was handed to `sink`, or `None`
    /// when the transport could not take a frame this tick.
    pub fn tick<W, S>(&mut self, world: &W, sink: &S) -> Result<Option<UpdateMessage>>
    where
        W: GameWorld + ?Sized,
        S: FrameSink + ?Sized,
    {
        let _timer = Timer::start("producer_tick");

        self.sync_registry(world);
        if self.config.radio_gating {
            self.refresh_relay_sets(world);
            self.recompute_links(world);
        }

        if !sink.is_ready() {
            trace!("Transport not ready, skipping frame");
            self.metrics.tick_dropped();
            return Ok(None);
        }

        let epoch = sink.epoch();
        if self.synced_epoch != Some(epoch) {
            debug!(epoch, participants = self.registry.len(), "New peer, resending full state");
            self.pending_added = self.registry.ids().into_iter().collect();
            self.pending_removed.clear();
        }

        let message = self.build_message(world);
        let frame = message.encode()?;
        let len = frame.len();

        match sink.try_send(frame) {
            Ok(()) => {
                self.metrics.frame_sent(len as u64);
                self.synced_epoch = Some(epoch);
                self.pending_added.clear();
                self.pending_removed.clear();
                Ok(Some(message))
            }
            Err(BridgeError::QueueFull | BridgeError::NotConnected) => {
                trace!("Frame not accepted, retrying next tick");
                self.metrics.tick_dropped();
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn sync_registry<W: GameWorld + ?Sized>(&mut self, world: &W) {
        let players = world.players();
        self.identities = players.iter().map(|p| (p.id, p.identity)).collect();

        let live = players.into_iter().map(|p| LiveEntry {
            id: p.id,
            handle: p.character,
            name: p.name,
            position: p.character.and_then(|c| world.entity_position(c)),
            flags: p
                .character
                .map(|c| world.entity_flags(c))
                .unwrap_or_default(),
        });
        let delta = self.registry.sync(live);

        for participant in delta.added {
            self.pending_removed.remove(&participant.id);
            self.pending_added.insert(participant.id);
        }
        for participant in delta.removed {
            self.relay_sets.remove(&participant.id);
            self.audiences.remove(&participant.id);
            // never announced to the peer, nothing to retract
            if !self.pending_added.remove(&participant.id) {
                self.pending_removed.insert(participant.id);
            }
        }
    }

    /// Relay sets are flooded from each speaker's transmitter with the local
    /// listener's identity deciding which relays may be used.
    fn refresh_relay_sets<W: GameWorld + ?Sized>(&mut self, world: &W) {
        let observer = world
            .local_player()
            .and_then(|local| self.identities.get(&local).copied());
        if observer != self.observer {
            debug!(?observer, "Listener identity changed, dropping relay sets");
            self.relay_sets.clear();
            self.observer = observer;
        }

        let ids = self.registry.ids();
        let batch = self.scheduler.next_batch(&ids);
        let graph = ConnectivityGraph::new(world);

        for id in &batch {
            let origin = self
                .registry
                .get(*id)
                .and_then(|p| p.handle)
                .and_then(|entity| world.transmitter_of(entity));
            let set = match (origin, observer) {
                (Some(tx), Some(observer)) => graph.relayed_transmitters(tx, observer),
                _ => HashSet::new(),
            };
            trace!(id, reached = set.len(), "Relay set recomputed");
            self.relay_sets.insert(*id, set);
        }
        self.metrics.relay_recomputed(batch.len() as u64);
    }

    fn recompute_links<W: GameWorld + ?Sized>(&mut self, world: &W) {
        let transmitters: Vec<(AccountId, TransmitterId)> = self
            .registry
            .iter()
            .filter_map(|p| {
                let tx = p.handle.and_then(|entity| world.transmitter_of(entity))?;
                Some((p.id, tx))
            })
            .collect();

        self.audiences.clear();
        for (speaker, relay_set) in &self.relay_sets {
            let hearers = transmitters
                .iter()
                .filter(|(other, tx)| other != speaker && relay_set.contains(tx))
                .map(|(other, _)| *other)
                .collect();
            self.audiences.insert(*speaker, hearers);
        }
    }

    fn build_message<W: GameWorld + ?Sized>(&self, world: &W) -> UpdateMessage {
        let local = world.local_player();
        let pose = world.listener_pose().unwrap_or_default();

        // without a local player there is no listener to place anyone around
        let mut header = FrameHeader::new(local.unwrap_or_default());
        header.in_session = world.in_session() && local.is_some();
        header.listener_relative = self.config.listener_relative;
        if self.config.listener_relative {
            header.forward = canonical_forward();
            header.up = canonical_up();
        } else {
            header.forward = pose.forward;
            header.up = pose.up;
        }

        let mut message = UpdateMessage::new(header);
        for participant in self.registry.iter() {
            if Some(participant.id) == local {
                continue;
            }
            let position = self.wire_position(&pose, participant);
            let flags = self.wire_flags(local, participant);
            if self.pending_added.contains(&participant.id) {
                message.added.push(AddedParticipant {
                    id: participant.id,
                    name: participant.name.clone(),
                    position,
                    flags,
                });
            } else {
                message.existing.push(ParticipantState {
                    id: participant.id,
                    position,
                    flags,
                });
            }
        }
        message.removed.extend(self.pending_removed.iter().copied());
        message
    }

    fn wire_position(&self, pose: &Pose, participant: &Participant<EntityId>) -> Vec3 {
        if self.config.listener_relative {
            pose.to_listener_frame(&participant.position)
        } else {
            participant.position
        }
    }

    fn wire_flags(
        &self,
        local: Option<AccountId>,
        participant: &Participant<EntityId>,
    ) -> ParticipantFlags {
        let mut flags = participant.flags;
        let connected = !self.config.radio_gating
            || local.is_some_and(|local| self.can_hear(local, participant.id));
        flags.set(ParticipantFlags::HAS_CONNECTION, connected);
        flags
    }
}
