//! # Antenna Connectivity
//!
//! Decides whether a simulated radio link exists between two participants.
//!
//! Every radio-equipped entity carries a transmitter (with a range) and a
//! receiver. A receiver hears the transmitters whose range covers it and is
//! bound to at most one *home* transmitter on the same entity. Links are
//! relayed: if A's signal reaches B's receiver, B's home transmitter
//! re-broadcasts it, and so on until nothing new is reached.
//!
//! Relay nodes only count when their owning entity is usable by the
//! observing identity (see [`Relation::is_friendly`]). Ownership and faction
//! standing change between ticks, so nothing here is cached.
//!
//! The host game exposes its radio components through [`RadioWorld`];
//! [`memory::MemoryRadioWorld`] is a self-contained implementation used by
//! tests and benchmarks.

pub mod memory;
pub mod relay;

pub use relay::ConnectivityGraph;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);
    };
}

id_type!(
    /// Game entity (character, ship, station) that can own radio components
    EntityId
);
id_type!(
    /// Radio transmitter component
    TransmitterId
);
id_type!(
    /// Radio receiver component
    ReceiverId
);
id_type!(
    /// In-game identity used for ownership, distinct from the account id
    IdentityId
);
id_type!(FactionId);

/// Lifecycle of an entity as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityStatus {
    Live,
    PendingRemoval,
    Removed,
}

/// Standing between two factions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactionRelation {
    Allied,
    Neutral,
    Enemies,
}

/// Standing of an entity owner towards an observing identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Owner and observer are the same identity
    Owner,
    /// Both belong to the same faction
    FactionShare,
    Allied,
    Neutral,
    Enemies,
}

impl Relation {
    /// Enemies are the only unfriendly standing
    pub fn is_friendly(self) -> bool {
        !matches!(self, Relation::Enemies)
    }
}

/// Radio and ownership queries the host game answers.
///
/// Implementations must be cheap to call repeatedly; the relay flood asks
/// the same questions for every candidate node on every evaluation.
pub trait RadioWorld {
    /// Transmitter component mounted on an entity, if any
    fn transmitter_of(&self, entity: EntityId) -> Option<TransmitterId>;

    /// Receiver component mounted on an entity, if any
    fn receiver_of(&self, entity: EntityId) -> Option<ReceiverId>;

    /// Receivers inside the transmitter's broadcast range
    fn receivers_in_range(&self, tx: TransmitterId) -> Vec<ReceiverId>;

    /// Transmitters whose broadcast range covers the receiver
    fn transmitters_in_range(&self, rx: ReceiverId) -> Vec<TransmitterId>;

    /// Transmitter paired with a receiver on the same entity
    fn home_transmitter(&self, rx: ReceiverId) -> Option<TransmitterId>;

    /// Receiver paired with a transmitter on the same entity
    fn home_receiver(&self, tx: TransmitterId) -> Option<ReceiverId>;

    fn transmitter_entity(&self, tx: TransmitterId) -> EntityId;

    fn receiver_entity(&self, rx: ReceiverId) -> EntityId;

    fn entity_status(&self, entity: EntityId) -> EntityStatus;

    /// `None` when the entity has no ownership module at all
    fn owner_of(&self, entity: EntityId) -> Option<IdentityId>;

    fn faction_of(&self, identity: IdentityId) -> Option<FactionId>;

    fn faction_relation(&self, a: FactionId, b: FactionId) -> FactionRelation;
}
