//! Property-based tests using proptest
//!
//! These tests validate frame and relay invariants across a wide range of
//! randomly generated inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use spatial_voice_bridge::core::frame::{
    AddedParticipant, FrameHeader, ParticipantFlags, ParticipantState, UpdateMessage,
};
use spatial_voice_bridge::core::math::Vec3;
use spatial_voice_bridge::error::BridgeError;
use spatial_voice_bridge::pipeline::RelayScheduler;

fn vec3() -> impl Strategy<Value = Vec3> {
    (-1.0e6f32..1.0e6, -1.0e6f32..1.0e6, -1.0e6f32..1.0e6).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

fn flags() -> impl Strategy<Value = ParticipantFlags> {
    any::<u32>().prop_map(ParticipantFlags::from_bits)
}

fn header() -> impl Strategy<Value = FrameHeader> {
    (any::<u64>(), vec3(), vec3(), any::<bool>(), any::<bool>()).prop_map(
        |(sender, forward, up, in_session, listener_relative)| {
            let mut header = FrameHeader::new(sender);
            header.forward = forward;
            header.up = up;
            header.in_session = in_session;
            header.listener_relative = listener_relative;
            header
        },
    )
}

fn message() -> impl Strategy<Value = UpdateMessage> {
    let existing = prop::collection::vec(
        (any::<u64>(), vec3(), flags()).prop_map(|(id, position, flags)| ParticipantState {
            id,
            position,
            flags,
        }),
        0..20,
    );
    let removed = prop::collection::vec(any::<u64>(), 0..20);
    let added = prop::collection::vec(
        (any::<u64>(), "\\PC{0,40}", vec3(), flags()).prop_map(|(id, name, position, flags)| {
            AddedParticipant {
                id,
                name,
                position,
                flags,
            }
        }),
        0..8,
    );
    (header(), existing, removed, added).prop_map(|(header, existing, removed, added)| {
        UpdateMessage {
            header,
            existing,
            removed,
            added,
        }
    })
}

// Property: decode(encode(m)) reproduces m
proptest! {
    #[test]
    fn prop_frame_roundtrip(msg in message()) {
        let bytes = msg.encode().expect("encode");
        prop_assert_eq!(bytes.len(), msg.encoded_len());
        let decoded = UpdateMessage::decode(&bytes).expect("decode");
        prop_assert_eq!(decoded, msg);
    }
}

// Property: a leading length off by one is always rejected
proptest! {
    #[test]
    fn prop_length_off_by_one_rejected(msg in message(), grow in any::<bool>()) {
        let mut bytes = msg.encode().expect("encode").to_vec();
        let declared = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let corrupted = if grow { declared + 1 } else { declared - 1 };
        bytes[4..8].copy_from_slice(&corrupted.to_le_bytes());

        let result = UpdateMessage::decode(&bytes);
        prop_assert!(matches!(result, Err(BridgeError::CorruptFrame(_))));
    }
}

// Property: changing only the magic bits is always rejected
proptest! {
    #[test]
    fn prop_magic_change_rejected(msg in message(), magic in any::<u16>()) {
        prop_assume!(magic != 0x5356);
        let mut bytes = msg.encode().expect("encode").to_vec();
        bytes[2..4].copy_from_slice(&magic.to_le_bytes());

        let result = UpdateMessage::decode(&bytes);
        prop_assert!(matches!(result, Err(BridgeError::CorruptFrame(_))));
    }
}

// Property: decoding arbitrary bytes never panics
proptest! {
    #[test]
    fn prop_decode_arbitrary_bytes(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = UpdateMessage::decode(&data);
    }
}

// Property: a valid header followed by arbitrary counts never panics
proptest! {
    #[test]
    fn prop_decode_arbitrary_counts(
        counts in prop::array::uniform4(any::<i32>()),
        tail in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        let mut bytes = UpdateMessage::new(FrameHeader::new(1)).encode().unwrap().to_vec();
        for (i, count) in counts.iter().enumerate() {
            let at = 44 + i * 4;
            bytes[at..at + 4].copy_from_slice(&count.to_le_bytes());
        }
        let total = (bytes.len() + tail.len()) as u32;
        bytes[4..8].copy_from_slice(&total.to_le_bytes());
        bytes.extend_from_slice(&tail);
        let _ = UpdateMessage::decode(&bytes);
    }
}

// Property: round-robin touches each of K participants between
// floor(N/K) and ceil(N/K)+1 times over N ticks
proptest! {
    #[test]
    fn prop_throttle_bound(k in 1usize..40, n in 0usize..400) {
        let ids: Vec<u64> = (0..k as u64).collect();
        let mut scheduler = RelayScheduler::new(1);
        let mut touched = vec![0usize; k];
        for _ in 0..n {
            for id in scheduler.next_batch(&ids) {
                touched[id as usize] += 1;
            }
        }
        for count in touched {
            prop_assert!(count >= n / k);
            prop_assert!(count <= n.div_ceil(k) + 1);
        }
    }
}
