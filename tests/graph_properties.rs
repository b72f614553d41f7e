//! Connectivity graph behaviour over in-memory radio worlds

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::HashSet;

use proptest::prelude::*;
use spatial_voice_bridge::core::math::Vec3;
use spatial_voice_bridge::graph::memory::MemoryRadioWorld;
use spatial_voice_bridge::graph::{
    ConnectivityGraph, EntityId, EntityStatus, FactionId, FactionRelation, IdentityId,
    RadioWorld, ReceiverId, TransmitterId,
};

const ALPHA: FactionId = FactionId(1);
const BRAVO: FactionId = FactionId(2);

fn tx(world: &MemoryRadioWorld, entity: EntityId) -> TransmitterId {
    world.transmitter_of(entity).expect("antenna has a transmitter")
}

fn rx(world: &MemoryRadioWorld, entity: EntityId) -> ReceiverId {
    world.receiver_of(entity).expect("antenna has a receiver")
}

/// Two antennas owned by `a` and `b`, each in range of the other
fn mutual_pair(distance: f32) -> (MemoryRadioWorld, EntityId, EntityId) {
    let mut world = MemoryRadioWorld::new();
    let a = world.add_antenna(Some(IdentityId(1)), Vec3::zeros(), distance + 1.0);
    let b = world.add_antenna(Some(IdentityId(2)), Vec3::new(distance, 0.0, 0.0), distance + 1.0);
    world.set_faction(IdentityId(1), ALPHA);
    world.set_faction(IdentityId(2), BRAVO);
    (world, a, b)
}

fn both_directions(world: &MemoryRadioWorld, a: EntityId, b: EntityId) -> (bool, bool) {
    let graph = ConnectivityGraph::new(world);
    (
        graph.check_connection(tx(world, a), rx(world, b), IdentityId(2)),
        graph.check_connection(tx(world, b), rx(world, a), IdentityId(1)),
    )
}

#[test]
fn test_mutual_range_friendly_links_both_ways() {
    for relation in [FactionRelation::Allied, FactionRelation::Neutral] {
        let (mut world, a, b) = mutual_pair(50.0);
        world.set_faction_relation(ALPHA, BRAVO, relation);
        assert_eq!(both_directions(&world, a, b), (true, true));
    }
}

#[test]
fn test_mutual_range_hostile_links_neither_way() {
    let (mut world, a, b) = mutual_pair(50.0);
    world.set_faction_relation(ALPHA, BRAVO, FactionRelation::Enemies);
    assert_eq!(both_directions(&world, a, b), (false, false));

    // no relation recorded at all is also hostile
    let (world, a, b) = mutual_pair(50.0);
    assert_eq!(both_directions(&world, a, b), (false, false));
}

#[test]
fn test_relay_cycle_terminates() {
    let mut world = MemoryRadioWorld::new();
    let me = IdentityId(1);
    let a = world.add_antenna(Some(me), Vec3::zeros(), 10.0);
    let b = world.add_antenna(Some(me), Vec3::new(5.0, 0.0, 0.0), 10.0);

    let graph = ConnectivityGraph::new(&world);
    let reached = graph.relayed_transmitters(tx(&world, a), me);
    assert_eq!(reached, HashSet::from([tx(&world, a), tx(&world, b)]));

    let heard = graph.relayed_receivers(rx(&world, a), me);
    assert_eq!(heard, HashSet::from([rx(&world, a), rx(&world, b)]));
}

#[test]
fn test_isolated_origin_is_singleton() {
    let mut world = MemoryRadioWorld::new();
    let a = world.add_antenna(None, Vec3::zeros(), 1.0);
    world.add_antenna(None, Vec3::new(100.0, 0.0, 0.0), 1.0);

    let graph = ConnectivityGraph::new(&world);
    assert_eq!(
        graph.relayed_transmitters(tx(&world, a), IdentityId(9)),
        HashSet::from([tx(&world, a)])
    );
}

#[test]
fn test_chain_relays_beyond_direct_range() {
    let mut world = MemoryRadioWorld::new();
    let me = IdentityId(1);
    let ids: Vec<EntityId> = (0..5)
        .map(|i| world.add_antenna(Some(me), Vec3::new(i as f32 * 10.0, 0.0, 0.0), 12.0))
        .collect();

    let graph = ConnectivityGraph::new(&world);
    let first = tx(&world, ids[0]);
    let last = ids[4];
    assert_eq!(graph.relayed_transmitters(first, me).len(), 5);
    assert!(graph.check_connection(first, rx(&world, last), me));
}

#[test]
fn test_asymmetric_range() {
    let mut world = MemoryRadioWorld::new();
    let me = IdentityId(1);
    let loud = world.add_antenna(Some(me), Vec3::zeros(), 100.0);
    let quiet = world.add_antenna(Some(me), Vec3::new(50.0, 0.0, 0.0), 10.0);

    let graph = ConnectivityGraph::new(&world);
    assert!(graph.check_connection(tx(&world, loud), rx(&world, quiet), me));
    assert!(!graph.check_connection(tx(&world, quiet), rx(&world, loud), me));
}

#[test]
fn test_same_entity_always_connected() {
    let mut world = MemoryRadioWorld::new();
    let a = world.add_antenna(Some(IdentityId(1)), Vec3::zeros(), 0.0);
    let graph = ConnectivityGraph::new(&world);
    assert!(graph.check_connection(tx(&world, a), rx(&world, a), IdentityId(2)));
}

#[test]
fn test_hostile_relay_gated_by_ownership() {
    let mut world = MemoryRadioWorld::new();
    let me = IdentityId(1);
    let stranger = IdentityId(2);
    world.set_faction(me, ALPHA);
    world.set_faction(stranger, BRAVO);

    let a = world.add_antenna(Some(me), Vec3::zeros(), 12.0);
    let relay = world.add_antenna(Some(stranger), Vec3::new(10.0, 0.0, 0.0), 12.0);
    let c = world.add_antenna(Some(me), Vec3::new(20.0, 0.0, 0.0), 12.0);
    let (tx_a, tx_relay, tx_c) = (tx(&world, a), tx(&world, relay), tx(&world, c));

    let reached = ConnectivityGraph::new(&world).relayed_transmitters(tx_a, me);
    assert!(!reached.contains(&tx_relay));
    assert!(!reached.contains(&tx_c));

    // ownership handed over
    world.set_owner(relay, Some(me));
    let reached = ConnectivityGraph::new(&world).relayed_transmitters(tx_a, me);
    assert!(reached.contains(&tx_relay) && reached.contains(&tx_c));

    // back to the stranger, then the factions make peace
    world.set_owner(relay, Some(stranger));
    world.set_faction_relation(ALPHA, BRAVO, FactionRelation::Allied);
    let reached = ConnectivityGraph::new(&world).relayed_transmitters(tx_a, me);
    assert!(reached.contains(&tx_relay) && reached.contains(&tx_c));

    // the stranger defects to no faction at all
    world.leave_faction(stranger);
    let reached = ConnectivityGraph::new(&world).relayed_transmitters(tx_a, me);
    assert!(!reached.contains(&tx_relay));
}

#[test]
fn test_unowned_relay_is_usable() {
    let mut world = MemoryRadioWorld::new();
    let me = IdentityId(1);
    let a = world.add_antenna(Some(me), Vec3::zeros(), 12.0);
    let relay = world.add_antenna(None, Vec3::new(10.0, 0.0, 0.0), 12.0);
    let c = world.add_antenna(Some(me), Vec3::new(20.0, 0.0, 0.0), 12.0);

    let graph = ConnectivityGraph::new(&world);
    let reached = graph.relayed_transmitters(tx(&world, a), me);
    assert!(reached.contains(&tx(&world, relay)));
    assert!(reached.contains(&tx(&world, c)));
}

#[test]
fn test_removed_origin_not_expanded() {
    let mut world = MemoryRadioWorld::new();
    let me = IdentityId(1);
    let a = world.add_antenna(Some(me), Vec3::zeros(), 12.0);
    world.add_antenna(Some(me), Vec3::new(10.0, 0.0, 0.0), 12.0);
    world.set_status(a, EntityStatus::Removed);

    let graph = ConnectivityGraph::new(&world);
    assert_eq!(graph.relayed_transmitters(tx(&world, a), me).len(), 1);
}

#[test]
fn test_receivers_mirror_transmitters() {
    let mut world = MemoryRadioWorld::new();
    let me = IdentityId(1);
    let loud = world.add_antenna(Some(me), Vec3::zeros(), 100.0);
    let quiet = world.add_antenna(Some(me), Vec3::new(50.0, 0.0, 0.0), 10.0);

    let graph = ConnectivityGraph::new(&world);
    // quiet hears loud, loud does not hear quiet
    assert!(graph
        .relayed_receivers(rx(&world, quiet), me)
        .contains(&rx(&world, loud)));
    assert!(!graph
        .relayed_receivers(rx(&world, loud), me)
        .contains(&rx(&world, quiet)));
}

fn world_strategy() -> impl Strategy<Value = Vec<(f32, f32, f32, u64)>> {
    prop::collection::vec((-50.0f32..50.0, -50.0f32..50.0, 1.0f32..40.0, 1u64..4), 1..12)
}

fn build(antennas: &[(f32, f32, f32, u64)]) -> (MemoryRadioWorld, Vec<EntityId>) {
    let mut world = MemoryRadioWorld::new();
    let ids = antennas
        .iter()
        .map(|(x, y, range, owner)| {
            world.add_antenna(Some(IdentityId(*owner)), Vec3::new(*x, *y, 0.0), *range)
        })
        .collect();
    (world, ids)
}

// Property: every reached transmitter reaches nothing outside the set, and
// the origin is always included
proptest! {
    #[test]
    fn prop_relay_set_is_closed(antennas in world_strategy(), observer in 1u64..4) {
        let (world, ids) = build(&antennas);
        let observer = IdentityId(observer);
        let graph = ConnectivityGraph::new(&world);
        let origin = tx(&world, ids[0]);
        let reached = graph.relayed_transmitters(origin, observer);

        prop_assert!(reached.contains(&origin));
        prop_assert!(reached.len() <= ids.len());
        for node in &reached {
            if *node == origin {
                continue;
            }
            let onward = graph.relayed_transmitters(*node, observer);
            prop_assert!(onward.is_subset(&reached));
        }
    }
}

// Property: with no ownership at all, the transmitter and receiver floods
// agree on who can hear whom
proptest! {
    #[test]
    fn prop_flood_directions_agree(antennas in world_strategy()) {
        let (mut world, ids) = build(&antennas);
        for id in &ids {
            world.set_owner(*id, None);
        }
        let observer = IdentityId(1);
        let graph = ConnectivityGraph::new(&world);
        for a in &ids {
            for b in &ids {
                let forward = graph
                    .relayed_transmitters(tx(&world, *a), observer)
                    .contains(&tx(&world, *b));
                let backward = graph
                    .relayed_receivers(rx(&world, *b), observer)
                    .contains(&rx(&world, *a));
                prop_assert_eq!(forward, backward);
            }
        }
    }
}
