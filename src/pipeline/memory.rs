//! In-memory hosts for tests and benchmarks.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::core::frame::{AccountId, ParticipantFlags};
use crate::core::math::{Pose, Vec3};
use crate::error::Result;
use crate::graph::memory::MemoryRadioWorld;
use crate::graph::{
    EntityId, EntityStatus, FactionId, FactionRelation, IdentityId, RadioWorld, ReceiverId,
    TransmitterId,
};

use super::host::{ClientId, CommandTarget, GameWorld, PlayerInfo, VoiceHost};

/// Game session backed by a [`MemoryRadioWorld`]. Player characters are
/// antennas, so moving a character moves its radio.
#[derive(Debug, Clone)]
pub struct MemoryGameWorld {
    pub radio: MemoryRadioWorld,
    pub local: Option<AccountId>,
    pub players: Vec<PlayerInfo>,
    pub flags: HashMap<EntityId, ParticipantFlags>,
    pub listener: Option<Pose>,
    pub in_session: bool,
}

impl Default for MemoryGameWorld {
    fn default() -> Self {
        Self {
            radio: MemoryRadioWorld::new(),
            local: None,
            players: Vec::new(),
            flags: HashMap::new(),
            listener: None,
            in_session: true,
        }
    }
}

impl MemoryGameWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a player whose character carries a radio of the given range.
    /// The in-game identity mirrors the account id.
    pub fn spawn(&mut self, id: AccountId, name: &str, position: Vec3, range: f32) -> EntityId {
        let identity = IdentityId(id);
        let character = self.radio.add_antenna(Some(identity), position, range);
        self.players.retain(|p| p.id != id);
        self.players.push(PlayerInfo {
            id,
            identity,
            name: name.to_string(),
            character: Some(character),
        });
        character
    }

    /// Remove a player from the session entirely
    pub fn leave(&mut self, id: AccountId) {
        if let Some(character) = self.character_of(id) {
            self.radio.set_status(character, EntityStatus::Removed);
        }
        self.players.retain(|p| p.id != id);
    }

    /// Kill the character but keep the player in the session
    pub fn despawn(&mut self, id: AccountId) {
        if let Some(player) = self.players.iter_mut().find(|p| p.id == id) {
            if let Some(character) = player.character.take() {
                self.radio.set_status(character, EntityStatus::Removed);
            }
        }
    }

    pub fn character_of(&self, id: AccountId) -> Option<EntityId> {
        self.players
            .iter()
            .find(|p| p.id == id)
            .and_then(|p| p.character)
    }

    pub fn move_player(&mut self, id: AccountId, position: Vec3) {
        if let Some(character) = self.character_of(id) {
            self.radio.set_position(character, position);
        }
    }
}

impl RadioWorld for MemoryGameWorld {
    fn transmitter_of(&self, entity: EntityId) -> Option<TransmitterId> {
        self.radio.transmitter_of(entity)
    }

    fn receiver_of(&self, entity: EntityId) -> Option<ReceiverId> {
        self.radio.receiver_of(entity)
    }

    fn receivers_in_range(&self, tx: TransmitterId) -> Vec<ReceiverId> {
        self.radio.receivers_in_range(tx)
    }

    fn transmitters_in_range(&self, rx: ReceiverId) -> Vec<TransmitterId> {
        self.radio.transmitters_in_range(rx)
    }

    fn home_transmitter(&self, rx: ReceiverId) -> Option<TransmitterId> {
        self.radio.home_transmitter(rx)
    }

    fn home_receiver(&self, tx: TransmitterId) -> Option<ReceiverId> {
        self.radio.home_receiver(tx)
    }

    fn transmitter_entity(&self, tx: TransmitterId) -> EntityId {
        self.radio.transmitter_entity(tx)
    }

    fn receiver_entity(&self, rx: ReceiverId) -> EntityId {
        self.radio.receiver_entity(rx)
    }

    fn entity_status(&self, entity: EntityId) -> EntityStatus {
        self.radio.entity_status(entity)
    }

    fn owner_of(&self, entity: EntityId) -> Option<IdentityId> {
        self.radio.owner_of(entity)
    }

    fn faction_of(&self, identity: IdentityId) -> Option<FactionId> {
        self.radio.faction_of(identity)
    }

    fn faction_relation(&self, a: FactionId, b: FactionId) -> FactionRelation {
        self.radio.faction_relation(a, b)
    }
}

impl GameWorld for MemoryGameWorld {
    fn local_player(&self) -> Option<AccountId> {
        self.local
    }

    fn players(&self) -> Vec<PlayerInfo> {
        self.players.clone()
    }

    fn entity_position(&self, entity: EntityId) -> Option<Vec3> {
        self.radio.position_of(entity)
    }

    fn listener_pose(&self) -> Option<Pose> {
        self.listener.or_else(|| {
            let position = self.entity_position(self.character_of(self.local?)?)?;
            Some(Pose {
                position,
                ..Pose::default()
            })
        })
    }

    fn entity_flags(&self, entity: EntityId) -> ParticipantFlags {
        self.flags.get(&entity).copied().unwrap_or_default()
    }

    fn in_session(&self) -> bool {
        self.in_session
    }
}

/// What a [`MemoryVoiceHost`] has been told to do
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoiceState {
    pub positions: HashMap<ClientId, Vec3>,
    pub audible: HashMap<ClientId, bool>,
    pub orientation: Option<(Vec3, Vec3)>,
    pub commands: Vec<(CommandTarget, String)>,
    pub notifications: Vec<String>,
}

/// Voice client fake: a fixed channel roster and a record of every call
#[derive(Debug, Default)]
pub struct MemoryVoiceHost {
    pub local: Option<ClientId>,
    roster: Mutex<Vec<(ClientId, String)>>,
    state: Mutex<VoiceState>,
}

impl MemoryVoiceHost {
    pub fn new(local: ClientId) -> Self {
        Self {
            local: Some(local),
            roster: Mutex::new(vec![(local, String::from("me"))]),
            state: Mutex::new(VoiceState::default()),
        }
    }

    pub fn join(&self, client: ClientId, name: &str) -> Result<()> {
        let mut roster = self.roster.lock()?;
        roster.retain(|(c, _)| *c != client);
        roster.push((client, name.to_string()));
        Ok(())
    }

    pub fn part(&self, client: ClientId) -> Result<()> {
        self.roster.lock()?.retain(|(c, _)| *c != client);
        Ok(())
    }

    /// Copy of everything recorded so far
    pub fn state(&self) -> Result<VoiceState> {
        Ok(self.state.lock()?.clone())
    }

    fn with_state(&self, f: impl FnOnce(&mut VoiceState)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }
}

impl VoiceHost for MemoryVoiceHost {
    fn local_client(&self) -> Option<ClientId> {
        self.local
    }

    fn channel_clients(&self) -> Vec<ClientId> {
        self.roster
            .lock()
            .map(|roster| roster.iter().map(|(c, _)| *c).collect())
            .unwrap_or_default()
    }

    fn client_name(&self, client: ClientId) -> Option<String> {
        let roster = self.roster.lock().ok()?;
        roster
            .iter()
            .find(|(c, _)| *c == client)
            .map(|(_, name)| name.clone())
    }

    fn set_client_position(&self, client: ClientId, position: Option<Vec3>) {
        self.with_state(|state| match position {
            Some(p) => {
                state.positions.insert(client, p);
            }
            None => {
                state.positions.remove(&client);
            }
        });
    }

    fn set_listener_orientation(&self, forward: Vec3, up: Vec3) {
        self.with_state(|state| state.orientation = Some((forward, up)));
    }

    fn set_client_audible(&self, client: ClientId, audible: bool) {
        self.with_state(|state| {
            state.audible.insert(client, audible);
        });
    }

    fn send_command(&self, target: CommandTarget, text: &str) -> Result<()> {
        let mut state = self.state.lock()?;
        state.commands.push((target, text.to_string()));
        Ok(())
    }

    fn notify(&self, message: &str) {
        self.with_state(|state| state.notifications.push(message.to_string()));
    }
}
