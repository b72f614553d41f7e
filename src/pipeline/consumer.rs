//! Voice-side frame application.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::frame::{AccountId, ParticipantFlags, UpdateMessage};
use crate::error::Result;
use crate::pairing::{self, PairingTable};
use crate::registry::{Participant, ParticipantRegistry};
use crate::utils::metrics::Metrics;

use super::host::{ClientId, CommandTarget, VoiceHost};

/// Applies decoded frames to the voice host.
///
/// Participants arrive by account id; they become audible in 3D once the
/// matching voice client has announced that id (see [`crate::pairing`]).
pub struct UpdateConsumer {
    registry: ParticipantRegistry<ClientId>,
    pairing: PairingTable<ClientId>,
    local_id: Option<AccountId>,
    metrics: Arc<Metrics>,
}

impl UpdateConsumer {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            registry: ParticipantRegistry::new(),
            pairing: PairingTable::new(),
            local_id: None,
            metrics,
        }
    }

    pub fn registry(&self) -> &ParticipantRegistry<ClientId> {
        &self.registry
    }

    pub fn pairing(&self) -> &PairingTable<ClientId> {
        &self.pairing
    }

    /// Account id of the game player on this machine, learned from frames
    pub fn local_id(&self) -> Option<AccountId> {
        self.local_id
    }

    /// Decode a complete frame and apply it
    pub fn on_bytes_ready<V: VoiceHost + ?Sized>(&mut self, bytes: &[u8], host: &V) -> Result<()> {
        let message = UpdateMessage::decode(bytes)?;
        self.apply(&message, host)
    }

    pub fn apply<V: VoiceHost + ?Sized>(&mut self, message: &UpdateMessage, host: &V) -> Result<()> {
        let header = &message.header;
        // sender 0: the game side has no local player yet
        if header.sender_id != 0 && self.local_id != Some(header.sender_id) {
            self.set_local_id(header.sender_id, host);
        }

        for id in &message.removed {
            match self.registry.remove(*id) {
                Some(_) => {
                    debug!(id, "Participant removed");
                    if let Some(client) = self.pairing.client_of(*id) {
                        host.set_client_position(client, None);
                        host.set_client_audible(client, true);
                    }
                }
                None => {
                    debug!(id, "Removal for untracked participant");
                    self.metrics.unmatched_record();
                }
            }
        }

        for added in &message.added {
            if self
                .registry
                .track_remote(added.id, &added.name, added.position, added.flags)
            {
                debug!(id = added.id, name = %added.name, "Participant added");
            }
            if let Some(client) = self.pairing.client_of(added.id) {
                self.registry.attach_handle(added.id, client);
            }
        }

        for state in &message.existing {
            match self.registry.get_mut(state.id) {
                Some(participant) => {
                    participant.position = state.position;
                    participant.flags = state.flags;
                }
                None => {
                    debug!(id = state.id, "Update for untracked participant");
                    self.metrics.unmatched_record();
                }
            }
        }

        if header.in_session {
            host.set_listener_orientation(header.forward, header.up);
            for participant in self.registry.iter() {
                push_to_host(participant, host);
            }
        } else {
            self.clear_positions(host);
        }
        Ok(())
    }

    /// A peer command arrived. Identity announcements pair the sender;
    /// anything else is ignored.
    pub fn on_plugin_command<V: VoiceHost + ?Sized>(
        &mut self,
        client: ClientId,
        text: &str,
        host: &V,
    ) -> Result<()> {
        if !text.starts_with(crate::config::IDENTITY_MARKER) {
            return Ok(());
        }
        let id = self.pairing.accept(client, text)?;
        // a re-pairing may have released the client from another entry
        for participant in self.registry.iter_mut() {
            if participant.handle == Some(client) && participant.id != id {
                participant.handle = None;
            }
        }
        if self.registry.attach_handle(id, client) {
            if let Some(participant) = self.registry.get(id) {
                push_to_host(participant, host);
            }
        }
        Ok(())
    }

    /// A client entered the local channel: tell it who we are
    pub fn on_client_joined<V: VoiceHost + ?Sized>(&self, client: ClientId, host: &V) -> Result<()> {
        if Some(client) == host.local_client() {
            return self.announce(CommandTarget::Channel, host);
        }
        self.announce(CommandTarget::Client(client), host)
    }

    /// Channel membership changed: drop pairings of clients that left
    pub fn on_roster_changed<V: VoiceHost + ?Sized>(&mut self, host: &V) {
        let present = host.channel_clients();
        self.pairing.retain_clients(&present);
        for participant in self.registry.iter_mut() {
            if let Some(client) = participant.handle {
                if !present.contains(&client) {
                    debug!(id = participant.id, client, "Client left channel");
                    participant.handle = None;
                }
            }
        }
    }

    /// Link to the game process lost: forget what it told us
    pub fn on_disconnected<V: VoiceHost + ?Sized>(&mut self, host: &V) {
        self.clear_positions(host);
        self.registry.clear();
    }

    fn set_local_id<V: VoiceHost + ?Sized>(&mut self, id: AccountId, host: &V) {
        info!(id, "Local player identity changed");
        self.local_id = Some(id);
        if let Some(local) = host.local_client() {
            self.pairing.pair(local, id);
        }
        if let Err(e) = self.announce(CommandTarget::Channel, host) {
            warn!(error = %e, "Failed to announce local identity");
        }
    }

    fn announce<V: VoiceHost + ?Sized>(&self, target: CommandTarget, host: &V) -> Result<()> {
        match self.local_id {
            Some(id) => host.send_command(target, &pairing::announcement(id)),
            None => Ok(()),
        }
    }

    fn clear_positions<V: VoiceHost + ?Sized>(&mut self, host: &V) {
        for participant in self.registry.iter_mut() {
            participant.position.fill(0.0);
            if let Some(client) = participant.handle {
                host.set_client_position(client, None);
                host.set_client_audible(client, true);
            }
        }
    }
}

fn push_to_host<V: VoiceHost + ?Sized>(participant: &Participant<ClientId>, host: &V) {
    if let Some(client) = participant.handle {
        host.set_client_position(client, Some(participant.position));
        host.set_client_audible(
            client,
            participant.flags.contains(ParticipantFlags::HAS_CONNECTION),
        );
    }
}
