//! # Update Frames
//!
//! Binary layout of one per-tick [`UpdateMessage`]. A frame is a fixed
//! 60-byte header, two fixed-stride sections and one variable-stride section.
//! Everything is little-endian.
//!
//! ```text
//! [version u32][frame_length u32][sender_id u64][forward 3xf32][up 3xf32]
//! [session_flags u32][existing i32][removed i32][added i32][added_len i32]
//! existing * {id u64, position 3xf32, flags u32}
//! removed  * {id u64}
//! added    * {id u64, name_len i32, name utf16le, position 3xf32, flags u32}
//! ```
//!
//! `version` packs `magic << 16 | minor << 8 | patch`. Only the magic must
//! match; minor and patch drift is tolerated.
//!
//! Decoding never trusts a length it has not cross-checked: the declared
//! `frame_length` must equal the size implied by the section counts, and the
//! added records must consume exactly `added_len` bytes.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::config::{MAX_FRAME_SIZE, MAX_NAME_UNITS, PROTOCOL_MAGIC, PROTOCOL_MINOR, PROTOCOL_PATCH};
use crate::core::math::{canonical_forward, canonical_up, Vec3};
use crate::error::constants::*;
use crate::error::{BridgeError, Result};

/// Stable numeric account identity of a participant
pub type AccountId = u64;

/// Fixed header size in bytes
pub const HEADER_SIZE: usize = 60;

/// Size of one existing-section record
pub const EXISTING_RECORD_SIZE: usize = 8 + 12 + 4;

/// Size of one removed-section record
pub const REMOVED_RECORD_SIZE: usize = 8;

/// Size of an added-section record excluding the name bytes
pub const ADDED_RECORD_FIXED_SIZE: usize = 8 + 4 + 12 + 4;

/// Packed protocol version word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtocolVersion {
    pub magic: u16,
    pub minor: u8,
    pub patch: u8,
}

impl ProtocolVersion {
    /// Version written by this build
    pub const CURRENT: ProtocolVersion = ProtocolVersion {
        magic: PROTOCOL_MAGIC,
        minor: PROTOCOL_MINOR,
        patch: PROTOCOL_PATCH,
    };

    pub fn pack(self) -> u32 {
        (u32::from(self.magic) << 16) | (u32::from(self.minor) << 8) | u32::from(self.patch)
    }

    pub fn unpack(word: u32) -> Self {
        Self {
            magic: (word >> 16) as u16,
            minor: (word >> 8) as u8,
            patch: word as u8,
        }
    }

    /// Frames are accepted when the magic matches
    pub fn is_compatible(self) -> bool {
        self.magic == PROTOCOL_MAGIC
    }
}

/// Per-participant state bits carried in every record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ParticipantFlags(u32);

impl ParticipantFlags {
    /// A radio link exists between the listener and this participant
    pub const HAS_CONNECTION: ParticipantFlags = ParticipantFlags(1 << 0);
    /// The participant is seated in a cockpit
    pub const IN_COCKPIT: ParticipantFlags = ParticipantFlags(1 << 1);
    /// The participant is transmitting over radio rather than speaking locally
    pub const SPEAKING_ON_RADIO: ParticipantFlags = ParticipantFlags(1 << 2);

    pub const fn empty() -> Self {
        ParticipantFlags(0)
    }

    /// Unknown bits are preserved so newer peers can add flags
    pub const fn from_bits(bits: u32) -> Self {
        ParticipantFlags(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: ParticipantFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: ParticipantFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: ParticipantFlags) {
        self.0 &= !other.0;
    }

    pub fn set(&mut self, other: ParticipantFlags, value: bool) {
        if value {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }
}

impl std::ops::BitOr for ParticipantFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        ParticipantFlags(self.0 | rhs.0)
    }
}

const SESSION_IN_SESSION: u32 = 1 << 0;
const SESSION_LISTENER_RELATIVE: u32 = 1 << 1;

/// Frame header, minus the section counts which are derived on encode
#[derive(Debug, Clone, PartialEq)]
pub struct FrameHeader {
    pub version: ProtocolVersion,
    pub sender_id: AccountId,
    pub forward: Vec3,
    pub up: Vec3,
    /// The sender is in a live game session; when false the peer clears positional state
    pub in_session: bool,
    /// Positions are already expressed in the listener's reference frame
    pub listener_relative: bool,
}

impl FrameHeader {
    pub fn new(sender_id: AccountId) -> Self {
        Self {
            version: ProtocolVersion::CURRENT,
            sender_id,
            forward: canonical_forward(),
            up: canonical_up(),
            in_session: true,
            listener_relative: true,
        }
    }

    fn session_flags(&self) -> u32 {
        let mut bits = 0;
        if self.in_session {
            bits |= SESSION_IN_SESSION;
        }
        if self.listener_relative {
            bits |= SESSION_LISTENER_RELATIVE;
        }
        bits
    }
}

/// Existing-section record: a tracked participant's state this tick
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantState {
    pub id: AccountId,
    pub position: Vec3,
    pub flags: ParticipantFlags,
}

/// Added-section record: a participant the peer has not seen yet
#[derive(Debug, Clone, PartialEq)]
pub struct AddedParticipant {
    pub id: AccountId,
    pub name: String,
    pub position: Vec3,
    pub flags: ParticipantFlags,
}

impl AddedParticipant {
    fn name_units(&self) -> Vec<u16> {
        self.name.encode_utf16().take(self.name_len()).collect()
    }

    /// Name length in UTF-16 units after truncation. A surrogate pair that
    /// straddles the limit is dropped whole.
    fn name_len(&self) -> usize {
        let mut len = 0;
        for c in self.name.chars() {
            if len + c.len_utf16() > MAX_NAME_UNITS {
                break;
            }
            len += c.len_utf16();
        }
        len
    }
}

/// Section sizes announced by a frame header.
///
/// Produced by [`FrameLayout::parse`] from the first [`HEADER_SIZE`] bytes,
/// which is everything the read side needs to know how many more bytes belong
/// to the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub version: ProtocolVersion,
    pub frame_length: usize,
    pub existing_count: usize,
    pub removed_count: usize,
    pub added_count: usize,
    pub added_section_len: usize,
}

impl FrameLayout {
    /// Parse and cross-check the fixed header.
    pub fn parse(header: &[u8]) -> Result<Self> {
        if header.len() < HEADER_SIZE {
            return Err(BridgeError::corrupt(ERR_TRUNCATED_HEADER));
        }

        let mut cur = &header[..HEADER_SIZE];
        let version = ProtocolVersion::unpack(cur.get_u32_le());
        if !version.is_compatible() {
            return Err(BridgeError::corrupt(ERR_BAD_MAGIC));
        }
        if version != ProtocolVersion::CURRENT {
            debug!(
                minor = version.minor,
                patch = version.patch,
                "Peer protocol revision differs from ours"
            );
        }

        let frame_length = cur.get_u32_le() as usize;
        if frame_length > MAX_FRAME_SIZE {
            return Err(BridgeError::corrupt(ERR_OVERSIZED_FRAME));
        }

        // sender_id, forward, up, session_flags
        cur.advance(8 + 12 + 12 + 4);

        let existing_count = non_negative(cur.get_i32_le())?;
        let removed_count = non_negative(cur.get_i32_le())?;
        let added_count = non_negative(cur.get_i32_le())?;
        let added_section_len = non_negative(cur.get_i32_le())?;

        if added_count == 0 && added_section_len != 0 {
            return Err(BridgeError::corrupt(ERR_ADDED_WITHOUT_RECORDS));
        }

        let implied = existing_count
            .checked_mul(EXISTING_RECORD_SIZE)
            .and_then(|n| n.checked_add(removed_count.checked_mul(REMOVED_RECORD_SIZE)?))
            .and_then(|n| n.checked_add(added_section_len))
            .and_then(|n| n.checked_add(HEADER_SIZE));
        if implied != Some(frame_length) {
            return Err(BridgeError::corrupt(ERR_LENGTH_MISMATCH));
        }

        if added_count
            .checked_mul(ADDED_RECORD_FIXED_SIZE)
            .map_or(true, |min| min > added_section_len)
        {
            return Err(BridgeError::corrupt(ERR_ADDED_SECTION_OVERRUN));
        }

        Ok(Self {
            version,
            frame_length,
            existing_count,
            removed_count,
            added_count,
            added_section_len,
        })
    }
}

fn non_negative(value: i32) -> Result<usize> {
    usize::try_from(value).map_err(|_| BridgeError::corrupt(ERR_NEGATIVE_COUNT))
}

fn wire_count(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| BridgeError::OversizedFrame(len))
}

/// One complete frame
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateMessage {
    pub header: FrameHeader,
    pub existing: Vec<ParticipantState>,
    pub removed: Vec<AccountId>,
    pub added: Vec<AddedParticipant>,
}

impl UpdateMessage {
    pub fn new(header: FrameHeader) -> Self {
        Self {
            header,
            existing: Vec::new(),
            removed: Vec::new(),
            added: Vec::new(),
        }
    }

    /// Encode into a freshly allocated buffer
    pub fn encode(&self) -> Result<Bytes> {
        let mut dst = BytesMut::new();
        encode_sections(
            &self.header,
            &self.existing,
            &self.removed,
            &self.added,
            &mut dst,
        )?;
        Ok(dst.freeze())
    }

    /// Size of this message on the wire, names truncated as on encode
    pub fn encoded_len(&self) -> usize {
        let added: usize = self
            .added
            .iter()
            .map(|record| {
                ADDED_RECORD_FIXED_SIZE + record.name_len() * 2
            })
            .sum();
        HEADER_SIZE
            + self.existing.len() * EXISTING_RECORD_SIZE
            + self.removed.len() * REMOVED_RECORD_SIZE
            + added
    }

    /// Decode one complete frame. `buf` must hold exactly one frame.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let layout = FrameLayout::parse(buf)?;
        if buf.len() != layout.frame_length {
            return Err(BridgeError::corrupt(ERR_BUFFER_MISMATCH));
        }
        decode_with_layout(&layout, buf)
    }
}

/// Encode a frame from borrowed sections, appending to `dst`.
pub fn encode_sections(
    header: &FrameHeader,
    existing: &[ParticipantState],
    removed: &[AccountId],
    added: &[AddedParticipant],
    dst: &mut BytesMut,
) -> Result<()> {
    let names: Vec<Vec<u16>> = added.iter().map(AddedParticipant::name_units).collect();
    let added_section_len: usize = names
        .iter()
        .map(|units| ADDED_RECORD_FIXED_SIZE + units.len() * 2)
        .sum();
    let frame_length = HEADER_SIZE
        + existing.len() * EXISTING_RECORD_SIZE
        + removed.len() * REMOVED_RECORD_SIZE
        + added_section_len;
    if frame_length > MAX_FRAME_SIZE {
        return Err(BridgeError::OversizedFrame(frame_length));
    }

    dst.reserve(frame_length);
    dst.put_u32_le(header.version.pack());
    dst.put_u32_le(frame_length as u32);
    dst.put_u64_le(header.sender_id);
    put_vec3(dst, &header.forward);
    put_vec3(dst, &header.up);
    dst.put_u32_le(header.session_flags());
    dst.put_i32_le(wire_count(existing.len())?);
    dst.put_i32_le(wire_count(removed.len())?);
    dst.put_i32_le(wire_count(added.len())?);
    dst.put_i32_le(wire_count(added_section_len)?);

    for state in existing {
        dst.put_u64_le(state.id);
        put_vec3(dst, &state.position);
        dst.put_u32_le(state.flags.bits());
    }

    for id in removed {
        dst.put_u64_le(*id);
    }

    for (record, units) in added.iter().zip(&names) {
        dst.put_u64_le(record.id);
        dst.put_i32_le(units.len() as i32);
        for unit in units {
            dst.put_u16_le(*unit);
        }
        put_vec3(dst, &record.position);
        dst.put_u32_le(record.flags.bits());
    }

    Ok(())
}

/// Decode the sections of a frame whose header was already validated.
pub(crate) fn decode_with_layout(layout: &FrameLayout, frame: &[u8]) -> Result<UpdateMessage> {
    let mut cur = frame;

    cur.advance(8); // version, frame_length
    let sender_id = cur.get_u64_le();
    let forward = get_vec3(&mut cur);
    let up = get_vec3(&mut cur);
    let session_flags = cur.get_u32_le();
    cur.advance(16); // counts

    let header = FrameHeader {
        version: layout.version,
        sender_id,
        forward,
        up,
        in_session: session_flags & SESSION_IN_SESSION != 0,
        listener_relative: session_flags & SESSION_LISTENER_RELATIVE != 0,
    };

    let mut existing = Vec::with_capacity(layout.existing_count);
    for _ in 0..layout.existing_count {
        existing.push(ParticipantState {
            id: cur.get_u64_le(),
            position: get_vec3(&mut cur),
            flags: ParticipantFlags::from_bits(cur.get_u32_le()),
        });
    }

    let mut removed = Vec::with_capacity(layout.removed_count);
    for _ in 0..layout.removed_count {
        removed.push(cur.get_u64_le());
    }

    let mut section = &cur[..layout.added_section_len];
    let mut added = Vec::with_capacity(layout.added_count);
    for _ in 0..layout.added_count {
        added.push(get_added(&mut section)?);
    }
    if section.has_remaining() {
        return Err(BridgeError::corrupt(ERR_ADDED_SECTION_UNDERRUN));
    }

    Ok(UpdateMessage {
        header,
        existing,
        removed,
        added,
    })
}

fn get_added(section: &mut &[u8]) -> Result<AddedParticipant> {
    if section.remaining() < 12 {
        return Err(BridgeError::corrupt(ERR_ADDED_SECTION_OVERRUN));
    }
    let id = section.get_u64_le();
    let name_len = section.get_i32_le();
    let units = usize::try_from(name_len)
        .ok()
        .filter(|n| *n <= MAX_NAME_UNITS)
        .ok_or_else(|| BridgeError::corrupt(ERR_BAD_NAME_LENGTH))?;

    if section.remaining() < units * 2 + 16 {
        return Err(BridgeError::corrupt(ERR_ADDED_SECTION_OVERRUN));
    }
    let name_units: Vec<u16> = (0..units).map(|_| section.get_u16_le()).collect();
    let position = get_vec3(section);
    let flags = ParticipantFlags::from_bits(section.get_u32_le());

    Ok(AddedParticipant {
        id,
        name: String::from_utf16_lossy(&name_units),
        position,
        flags,
    })
}

#[inline]
fn put_vec3(dst: &mut BytesMut, v: &Vec3) {
    dst.put_f32_le(v.x);
    dst.put_f32_le(v.y);
    dst.put_f32_le(v.z);
}

#[inline]
fn get_vec3(cur: &mut &[u8]) -> Vec3 {
    let x = cur.get_f32_le();
    let y = cur.get_f32_le();
    let z = cur.get_f32_le();
    Vec3::new(x, y, z)
}
