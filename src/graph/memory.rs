//! In-memory [`RadioWorld`] with range-based antennas.
//!
//! Each antenna is an entity carrying one transmitter and one receiver that
//! share the entity's numeric id. A receiver hears a transmitter when it lies
//! within the transmitter's range, so ranges may be asymmetric.

use std::collections::{BTreeMap, HashMap};

use crate::core::math::Vec3;

use super::{
    EntityId, EntityStatus, FactionId, FactionRelation, IdentityId, RadioWorld, ReceiverId,
    TransmitterId,
};

#[derive(Debug, Clone)]
struct Antenna {
    owner: Option<IdentityId>,
    position: Vec3,
    range: f32,
    status: EntityStatus,
}

#[derive(Debug, Default, Clone)]
pub struct MemoryRadioWorld {
    next_id: u64,
    antennas: BTreeMap<EntityId, Antenna>,
    factions: HashMap<IdentityId, FactionId>,
    relations: HashMap<(FactionId, FactionId), FactionRelation>,
}

impl MemoryRadioWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a live antenna entity and return its id
    pub fn add_antenna(&mut self, owner: Option<IdentityId>, position: Vec3, range: f32) -> EntityId {
        self.next_id += 1;
        let id = EntityId(self.next_id);
        self.antennas.insert(
            id,
            Antenna {
                owner,
                position,
                range,
                status: EntityStatus::Live,
            },
        );
        id
    }

    pub fn position_of(&self, entity: EntityId) -> Option<Vec3> {
        self.antennas.get(&entity).map(|a| a.position)
    }

    pub fn set_position(&mut self, entity: EntityId, position: Vec3) {
        if let Some(antenna) = self.antennas.get_mut(&entity) {
            antenna.position = position;
        }
    }

    pub fn set_range(&mut self, entity: EntityId, range: f32) {
        if let Some(antenna) = self.antennas.get_mut(&entity) {
            antenna.range = range;
        }
    }

    pub fn set_owner(&mut self, entity: EntityId, owner: Option<IdentityId>) {
        if let Some(antenna) = self.antennas.get_mut(&entity) {
            antenna.owner = owner;
        }
    }

    pub fn set_status(&mut self, entity: EntityId, status: EntityStatus) {
        if let Some(antenna) = self.antennas.get_mut(&entity) {
            antenna.status = status;
        }
    }

    pub fn set_faction(&mut self, identity: IdentityId, faction: FactionId) {
        self.factions.insert(identity, faction);
    }

    pub fn leave_faction(&mut self, identity: IdentityId) {
        self.factions.remove(&identity);
    }

    /// Relations are symmetric; unset pairs default to `Enemies`
    pub fn set_faction_relation(&mut self, a: FactionId, b: FactionId, relation: FactionRelation) {
        self.relations.insert(ordered(a, b), relation);
    }

    fn in_range(&self, tx: EntityId, rx: EntityId) -> bool {
        match (self.antennas.get(&tx), self.antennas.get(&rx)) {
            (Some(t), Some(r)) => (t.position - r.position).norm() <= t.range,
            _ => false,
        }
    }
}

fn ordered(a: FactionId, b: FactionId) -> (FactionId, FactionId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl RadioWorld for MemoryRadioWorld {
    fn transmitter_of(&self, entity: EntityId) -> Option<TransmitterId> {
        self.antennas
            .contains_key(&entity)
            .then_some(TransmitterId(entity.0))
    }

    fn receiver_of(&self, entity: EntityId) -> Option<ReceiverId> {
        self.antennas
            .contains_key(&entity)
            .then_some(ReceiverId(entity.0))
    }

    fn receivers_in_range(&self, tx: TransmitterId) -> Vec<ReceiverId> {
        let source = EntityId(tx.0);
        self.antennas
            .keys()
            .filter(|rx| self.in_range(source, **rx))
            .map(|rx| ReceiverId(rx.0))
            .collect()
    }

    fn transmitters_in_range(&self, rx: ReceiverId) -> Vec<TransmitterId> {
        let target = EntityId(rx.0);
        self.antennas
            .keys()
            .filter(|tx| self.in_range(**tx, target))
            .map(|tx| TransmitterId(tx.0))
            .collect()
    }

    fn home_transmitter(&self, rx: ReceiverId) -> Option<TransmitterId> {
        self.transmitter_of(EntityId(rx.0))
    }

    fn home_receiver(&self, tx: TransmitterId) -> Option<ReceiverId> {
        self.receiver_of(EntityId(tx.0))
    }

    fn transmitter_entity(&self, tx: TransmitterId) -> EntityId {
        EntityId(tx.0)
    }

    fn receiver_entity(&self, rx: ReceiverId) -> EntityId {
        EntityId(rx.0)
    }

    fn entity_status(&self, entity: EntityId) -> EntityStatus {
        self.antennas
            .get(&entity)
            .map_or(EntityStatus::Removed, |a| a.status)
    }

    fn owner_of(&self, entity: EntityId) -> Option<IdentityId> {
        self.antennas.get(&entity).and_then(|a| a.owner)
    }

    fn faction_of(&self, identity: IdentityId) -> Option<FactionId> {
        self.factions.get(&identity).copied()
    }

    fn faction_relation(&self, a: FactionId, b: FactionId) -> FactionRelation {
        self.relations
            .get(&ordered(a, b))
            .copied()
            .unwrap_or(FactionRelation::Enemies)
    }
}
