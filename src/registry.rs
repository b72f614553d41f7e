//! # Participant Registry
//!
//! Authoritative list of participants known on one side of the bridge,
//! keyed by stable [`AccountId`]. Live handles (game entities, voice client
//! ids) come and go while the identity persists, so handles are never used
//! as keys.
//!
//! Entries come from two places:
//! - [`ParticipantRegistry::sync`] against the host's live list (`Origin::Live`)
//! - [`ParticipantRegistry::track_remote`] for participants known only by
//!   identity, e.g. announced by the peer before any local representation
//!   exists (`Origin::Remote`)
//!
//! `sync` only evicts live-sourced entries; remote entries leave through
//! [`ParticipantRegistry::remove`].

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::core::frame::{AccountId, ParticipantFlags};
use crate::core::math::Vec3;

/// How an entry entered the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Live,
    Remote,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Participant<H> {
    pub id: AccountId,
    /// Absent while the underlying entity is unavailable (respawn, not yet paired)
    pub handle: Option<H>,
    pub name: String,
    /// Last known position; kept when the handle goes away
    pub position: Vec3,
    pub flags: ParticipantFlags,
    origin: Origin,
}

impl<H> Participant<H> {
    pub fn new(id: AccountId, name: impl Into<String>) -> Self {
        Self {
            id,
            handle: None,
            name: name.into(),
            position: Vec3::zeros(),
            flags: ParticipantFlags::empty(),
            origin: Origin::Remote,
        }
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }
}

/// One entry of the host's live list
#[derive(Debug, Clone)]
pub struct LiveEntry<H> {
    pub id: AccountId,
    pub handle: Option<H>,
    pub name: String,
    /// `None` keeps the last known position
    pub position: Option<Vec3>,
    pub flags: ParticipantFlags,
}

/// Result of one [`ParticipantRegistry::sync`]
#[derive(Debug, Clone)]
pub struct SyncDelta<H> {
    pub added: Vec<Participant<H>>,
    /// Evicted entries with their handle detached and last position retained
    pub removed: Vec<Participant<H>>,
}

impl<H> Default for SyncDelta<H> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
        }
    }
}

impl<H> SyncDelta<H> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ParticipantRegistry<H> {
    entries: BTreeMap<AccountId, Participant<H>>,
}

impl<H> Default for ParticipantRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> ParticipantRegistry<H> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: AccountId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn get(&self, id: AccountId) -> Option<&Participant<H>> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: AccountId) -> Option<&mut Participant<H>> {
        self.entries.get_mut(&id)
    }

    /// Participants in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &Participant<H>> {
        self.entries.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Participant<H>> {
        self.entries.values_mut()
    }

    /// Ids in ascending order; the order is stable between ticks
    pub fn ids(&self) -> Vec<AccountId> {
        self.entries.keys().copied().collect()
    }

    /// Evict an entry regardless of origin. `None` when it was not tracked,
    /// which makes repeated removal a no-op.
    pub fn remove(&mut self, id: AccountId) -> Option<Participant<H>> {
        let mut removed = self.entries.remove(&id)?;
        removed.handle = None;
        Some(removed)
    }

    /// Track a participant known only by identity. Returns `true` when a new
    /// entry was created; an existing entry has its name, position and flags
    /// refreshed and keeps its handle and origin.
    pub fn track_remote(
        &mut self,
        id: AccountId,
        name: &str,
        position: Vec3,
        flags: ParticipantFlags,
    ) -> bool {
        match self.entries.get_mut(&id) {
            Some(existing) => {
                existing.name.clear();
                existing.name.push_str(name);
                existing.position = position;
                existing.flags = flags;
                false
            }
            None => {
                let mut participant = Participant::new(id, name);
                participant.position = position;
                participant.flags = flags;
                self.entries.insert(id, participant);
                true
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<H: Clone + PartialEq> ParticipantRegistry<H> {
    /// Diff against the host's live list.
    ///
    /// 1. live-sourced entries missing from the list are evicted
    /// 2. unknown ids become new live entries
    /// 3. known ids get their handle and derived attributes refreshed
    pub fn sync<I>(&mut self, live: I) -> SyncDelta<H>
    where
        I: IntoIterator<Item = LiveEntry<H>>,
    {
        let live: Vec<LiveEntry<H>> = live.into_iter().collect();
        let present: HashSet<AccountId> = live.iter().map(|e| e.id).collect();
        let mut delta = SyncDelta::default();

        let gone: Vec<AccountId> = self
            .entries
            .values()
            .filter(|p| p.origin == Origin::Live && !present.contains(&p.id))
            .map(|p| p.id)
            .collect();
        for id in gone {
            if let Some(removed) = self.remove(id) {
                debug!(id, "Participant left");
                delta.removed.push(removed);
            }
        }

        for entry in live {
            match self.entries.get_mut(&entry.id) {
                Some(existing) => {
                    if existing.origin == Origin::Remote {
                        debug!(id = entry.id, "Remote participant is now live");
                    }
                    existing.origin = Origin::Live;
                    existing.handle = entry.handle;
                    if existing.name != entry.name {
                        existing.name = entry.name;
                    }
                    if let Some(position) = entry.position {
                        existing.position = position;
                    }
                    existing.flags = entry.flags;
                }
                None => {
                    debug!(id = entry.id, name = %entry.name, "Participant joined");
                    let participant = Participant {
                        id: entry.id,
                        handle: entry.handle,
                        name: entry.name,
                        position: entry.position.unwrap_or_else(Vec3::zeros),
                        flags: entry.flags,
                        origin: Origin::Live,
                    };
                    delta.added.push(participant.clone());
                    self.entries.insert(entry.id, participant);
                }
            }
        }

        delta
    }

    /// Find the entry currently bound to a live handle
    pub fn find_by_handle(&self, handle: &H) -> Option<&Participant<H>> {
        self.entries
            .values()
            .find(|p| p.handle.as_ref() == Some(handle))
    }

    /// Bind a handle to an entry, releasing it from any other entry first.
    /// Returns `false` when the id is not tracked.
    pub fn attach_handle(&mut self, id: AccountId, handle: H) -> bool {
        if !self.entries.contains_key(&id) {
            return false;
        }
        for other in self.entries.values_mut() {
            if other.id != id && other.handle.as_ref() == Some(&handle) {
                other.handle = None;
            }
        }
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.handle = Some(handle);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn live(id: AccountId, handle: Option<u32>) -> LiveEntry<u32> {
        LiveEntry {
            id,
            handle,
            name: format!("player-{id}"),
            position: handle.map(|h| Vec3::new(h as f32, 0.0, 0.0)),
            flags: ParticipantFlags::empty(),
        }
    }

    #[test]
    fn test_sync_add_then_remove() {
        let mut registry = ParticipantRegistry::new();
        let delta = registry.sync([live(1, Some(10)), live(2, Some(20))]);
        assert_eq!(delta.added.len(), 2);
        assert!(delta.removed.is_empty());

        let delta = registry.sync([live(2, Some(20))]);
        assert!(delta.added.is_empty());
        assert_eq!(delta.removed.len(), 1);
        assert_eq!(delta.removed[0].id, 1);
        assert_eq!(delta.removed[0].handle, None);
        assert_eq!(delta.removed[0].position, Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(registry.ids(), vec![2]);
    }

    #[test]
    fn test_handle_recreated_keeps_identity() {
        let mut registry = ParticipantRegistry::new();
        registry.sync([live(1, Some(10))]);

        // respawn: no character for a tick, then a new handle
        let delta = registry.sync([live(1, None)]);
        assert!(delta.is_empty());
        let p = registry.get(1).unwrap();
        assert_eq!(p.handle, None);
        assert_eq!(p.position, Vec3::new(10.0, 0.0, 0.0));

        let delta = registry.sync([live(1, Some(11))]);
        assert!(delta.is_empty());
        assert_eq!(registry.get(1).unwrap().handle, Some(11));
    }

    #[test]
    fn test_remote_entries_survive_sync() {
        let mut registry: ParticipantRegistry<u32> = ParticipantRegistry::new();
        assert!(registry.track_remote(7, "remote", Vec3::zeros(), ParticipantFlags::empty()));
        assert!(!registry.track_remote(7, "renamed", Vec3::zeros(), ParticipantFlags::empty()));
        assert_eq!(registry.get(7).unwrap().name, "renamed");

        let delta = registry.sync(Vec::new());
        assert!(delta.is_empty());
        assert_eq!(registry.get(7).unwrap().origin(), Origin::Remote);

        registry.sync([live(7, Some(70))]);
        assert_eq!(registry.get(7).unwrap().origin(), Origin::Live);
        let delta = registry.sync(Vec::new());
        assert_eq!(delta.removed.len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut registry = ParticipantRegistry::new();
        registry.sync([live(1, Some(10))]);
        assert!(registry.remove(1).is_some());
        assert!(registry.remove(1).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_attach_handle_moves_binding() {
        let mut registry: ParticipantRegistry<u32> = ParticipantRegistry::new();
        registry.track_remote(1, "a", Vec3::zeros(), ParticipantFlags::empty());
        registry.track_remote(2, "b", Vec3::zeros(), ParticipantFlags::empty());

        assert!(registry.attach_handle(1, 5));
        assert!(registry.attach_handle(2, 5));
        assert_eq!(registry.get(1).unwrap().handle, None);
        assert_eq!(registry.find_by_handle(&5).unwrap().id, 2);
        assert!(!registry.attach_handle(3, 5));
    }
}
