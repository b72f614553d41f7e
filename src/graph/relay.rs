//! Relay reachability over a [`RadioWorld`].

use std::collections::HashSet;

use tracing::trace;

use super::{
    EntityId, EntityStatus, FactionRelation, IdentityId, RadioWorld, ReceiverId, Relation,
    TransmitterId,
};

/// Read-only view answering connectivity questions against a radio world.
///
/// Each query floods the relay graph from scratch. The result set doubles as
/// the visited set, so mutual relays (A hears B, B hears A) terminate.
pub struct ConnectivityGraph<'w, W: RadioWorld + ?Sized> {
    world: &'w W,
}

impl<'w, W: RadioWorld + ?Sized> ConnectivityGraph<'w, W> {
    pub fn new(world: &'w W) -> Self {
        Self { world }
    }

    /// Standing of `owner` towards `observer`.
    ///
    /// Identities without a faction only relate to themselves.
    pub fn relation(&self, owner: IdentityId, observer: IdentityId) -> Relation {
        if owner == observer {
            return Relation::Owner;
        }
        match (self.world.faction_of(owner), self.world.faction_of(observer)) {
            (Some(a), Some(b)) if a == b => Relation::FactionShare,
            (Some(a), Some(b)) => match self.world.faction_relation(a, b) {
                FactionRelation::Allied => Relation::Allied,
                FactionRelation::Neutral => Relation::Neutral,
                FactionRelation::Enemies => Relation::Enemies,
            },
            _ => Relation::Enemies,
        }
    }

    /// An entity is usable when it has no ownership module, or its owner is
    /// friendly towards the observer.
    pub fn is_usable_by(&self, entity: EntityId, observer: IdentityId) -> bool {
        match self.world.owner_of(entity) {
            None => true,
            Some(owner) => self.relation(owner, observer).is_friendly(),
        }
    }

    fn is_live(&self, entity: EntityId) -> bool {
        self.world.entity_status(entity) == EntityStatus::Live
    }

    fn admits(&self, entity: EntityId, observer: IdentityId) -> bool {
        self.is_live(entity) && self.is_usable_by(entity, observer)
    }

    /// Every transmitter whose signal reaches, directly or through relays,
    /// the receivers reachable from `origin`. Always contains `origin`.
    ///
    /// The origin is only expanded when its own entity is live and usable by
    /// `observer`; a hostile origin yields exactly `{origin}`.
    pub fn relayed_transmitters(
        &self,
        origin: TransmitterId,
        observer: IdentityId,
    ) -> HashSet<TransmitterId> {
        let mut result = HashSet::from([origin]);
        if !self.admits(self.world.transmitter_entity(origin), observer) {
            return result;
        }

        let mut stack = vec![origin];
        while let Some(tx) = stack.pop() {
            for rx in self.world.receivers_in_range(tx) {
                let entity = self.world.receiver_entity(rx);
                if !self.is_live(entity) {
                    continue;
                }
                let Some(home) = self.world.home_transmitter(rx) else {
                    continue;
                };
                if result.contains(&home) {
                    continue;
                }
                if !self.is_usable_by(entity, observer) {
                    trace!(?rx, ?observer, "Relay node not usable by observer");
                    continue;
                }
                result.insert(home);
                stack.push(home);
            }
        }

        result
    }

    /// Mirror of [`relayed_transmitters`](Self::relayed_transmitters):
    /// every receiver that can be reached by walking backwards from `origin`
    /// through the transmitters it hears. Always contains `origin`.
    pub fn relayed_receivers(&self, origin: ReceiverId, observer: IdentityId) -> HashSet<ReceiverId> {
        let mut result = HashSet::from([origin]);
        if !self.admits(self.world.receiver_entity(origin), observer) {
            return result;
        }

        let mut stack = vec![origin];
        while let Some(rx) = stack.pop() {
            for tx in self.world.transmitters_in_range(rx) {
                let entity = self.world.transmitter_entity(tx);
                if !self.is_live(entity) {
                    continue;
                }
                let Some(home) = self.world.home_receiver(tx) else {
                    continue;
                };
                if result.contains(&home) {
                    continue;
                }
                if !self.is_usable_by(entity, observer) {
                    trace!(?tx, ?observer, "Relay node not usable by observer");
                    continue;
                }
                result.insert(home);
                stack.push(home);
            }
        }

        result
    }

    /// Whether `sender`'s signal reaches `receiver` as seen by `receiver_identity`.
    pub fn check_connection(
        &self,
        sender: TransmitterId,
        receiver: ReceiverId,
        receiver_identity: IdentityId,
    ) -> bool {
        if self.world.transmitter_entity(sender) == self.world.receiver_entity(receiver) {
            return true;
        }
        let Some(home) = self.world.home_transmitter(receiver) else {
            return false;
        };
        self.relayed_transmitters(sender, receiver_identity)
            .contains(&home)
    }
}
