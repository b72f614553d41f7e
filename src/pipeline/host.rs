//! Capability traits for the two host runtimes.
//!
//! Each host operation the bridge needs is one trait method. Adapters
//! implement these against the real game engine and voice client; tests use
//! in-memory fakes.

use crate::core::frame::{AccountId, ParticipantFlags};
use crate::core::math::{Pose, Vec3};
use crate::error::Result;
use crate::graph::{EntityId, IdentityId, RadioWorld};

/// Voice client handle assigned by the voice platform
pub type ClientId = u16;

/// One player in the current game session
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerInfo {
    pub id: AccountId,
    /// In-game identity used for ownership checks
    pub identity: IdentityId,
    pub name: String,
    /// Live character entity; `None` while dead or respawning
    pub character: Option<EntityId>,
}

/// Game-side queries. Radio and ownership questions come from [`RadioWorld`].
pub trait GameWorld: RadioWorld {
    /// Account id of the player this process belongs to
    fn local_player(&self) -> Option<AccountId>;

    fn players(&self) -> Vec<PlayerInfo>;

    fn entity_position(&self, entity: EntityId) -> Option<Vec3>;

    /// Where the local player hears from (camera or character head)
    fn listener_pose(&self) -> Option<Pose>;

    /// Domain flags for a character (cockpit, radio use); `HAS_CONNECTION` is
    /// filled in by the pipeline
    fn entity_flags(&self, entity: EntityId) -> ParticipantFlags;

    /// `false` in menus and loading screens
    fn in_session(&self) -> bool;

    /// Show a short status line to the player
    fn notify(&self, _message: &str) {}
}

/// Addressee of a peer text command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandTarget {
    Client(ClientId),
    Channel,
}

/// Voice-side plugin operations.
///
/// Called from the frame reader task as well as from host callbacks, hence
/// `Send + Sync` and `&self` receivers.
pub trait VoiceHost: Send + Sync {
    fn local_client(&self) -> Option<ClientId>;

    /// Clients in the local client's current channel, local client included
    fn channel_clients(&self) -> Vec<ClientId>;

    fn client_name(&self, client: ClientId) -> Option<String>;

    /// Place a client in 3D space; `None` returns it to non-positional playback
    fn set_client_position(&self, client: ClientId, position: Option<Vec3>);

    fn set_listener_orientation(&self, forward: Vec3, up: Vec3);

    /// Mute or unmute playback of a client, used for radio gating
    fn set_client_audible(&self, client: ClientId, audible: bool);

    fn send_command(&self, target: CommandTarget, text: &str) -> Result<()>;

    fn notify(&self, _message: &str) {}
}
