//! Out-of-band identity exchange between voice clients.
//!
//! The voice roster and the game player list are enumerated independently,
//! so each voice plugin announces its game account through the voice
//! platform's peer messaging: `SVB_IDENT,SteamId:<id>`.

use std::collections::HashMap;
use std::hash::Hash;

use tracing::debug;

use crate::config::IDENTITY_MARKER;
use crate::core::frame::AccountId;
use crate::error::{BridgeError, Result};

const ID_FIELD: &str = "SteamId:";

/// Build the announcement text for a local account id
pub fn announcement(id: AccountId) -> String {
    format!("{IDENTITY_MARKER},{ID_FIELD}{id}")
}

/// Parse an announcement. Anything other than the exact marker followed by a
/// decimal id is rejected.
pub fn parse_announcement(text: &str) -> Result<AccountId> {
    let rest = text
        .strip_prefix(IDENTITY_MARKER)
        .and_then(|rest| rest.strip_prefix(','))
        .ok_or_else(|| BridgeError::Pairing(format!("Missing identity marker: {text:?}")))?;

    let digits = rest
        .strip_prefix(ID_FIELD)
        .ok_or_else(|| BridgeError::Pairing(format!("Missing id field: {text:?}")))?;

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BridgeError::Pairing(format!("Invalid account id: {digits:?}")));
    }

    digits
        .parse::<AccountId>()
        .map_err(|e| BridgeError::Pairing(format!("Invalid account id {digits:?}: {e}")))
}

/// Two-way map between voice client handles and account ids.
///
/// Each side maps to at most one of the other; re-pairing a client or an
/// account drops its previous partner.
#[derive(Debug, Clone)]
pub struct PairingTable<C> {
    by_client: HashMap<C, AccountId>,
    by_account: HashMap<AccountId, C>,
}

impl<C> Default for PairingTable<C> {
    fn default() -> Self {
        Self {
            by_client: HashMap::new(),
            by_account: HashMap::new(),
        }
    }
}

impl<C: Copy + Eq + Hash + std::fmt::Debug> PairingTable<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pairing. Returns `false` when it was already known.
    pub fn pair(&mut self, client: C, id: AccountId) -> bool {
        if self.by_client.get(&client) == Some(&id) {
            return false;
        }
        if let Some(previous) = self.by_client.remove(&client) {
            self.by_account.remove(&previous);
        }
        if let Some(previous) = self.by_account.remove(&id) {
            self.by_client.remove(&previous);
        }
        debug!(?client, id, "Paired voice client");
        self.by_client.insert(client, id);
        self.by_account.insert(id, client);
        true
    }

    /// Parse an announcement received from `client` and pair it
    pub fn accept(&mut self, client: C, text: &str) -> Result<AccountId> {
        let id = parse_announcement(text)?;
        self.pair(client, id);
        Ok(id)
    }

    pub fn account_of(&self, client: C) -> Option<AccountId> {
        self.by_client.get(&client).copied()
    }

    pub fn client_of(&self, id: AccountId) -> Option<C> {
        self.by_account.get(&id).copied()
    }

    pub fn forget_client(&mut self, client: C) -> Option<AccountId> {
        let id = self.by_client.remove(&client)?;
        self.by_account.remove(&id);
        Some(id)
    }

    /// Drop every client not in `present`
    pub fn retain_clients(&mut self, present: &[C]) {
        let stale: Vec<C> = self
            .by_client
            .keys()
            .filter(|c| !present.contains(c))
            .copied()
            .collect();
        for client in stale {
            self.forget_client(client);
        }
    }

    pub fn len(&self) -> usize {
        self.by_client.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_client.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_client.clear();
        self.by_account.clear();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_announcement_format() {
        assert_eq!(announcement(76561198000000001), "SVB_IDENT,SteamId:76561198000000001");
        assert_eq!(parse_announcement(&announcement(42)).unwrap(), 42);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for text in [
            "",
            "SVB_IDENT",
            "SVB_IDENT,",
            "SVB_IDENT,SteamId:",
            "SVB_IDENT,SteamId:-1",
            "SVB_IDENT,SteamId:+1",
            "SVB_IDENT,SteamId:12x",
            "SVB_IDENT,steamid:1",
            "OTHER,SteamId:1",
            "SVB_IDENT,SteamId:99999999999999999999",
            " SVB_IDENT,SteamId:1",
        ] {
            assert!(
                matches!(parse_announcement(text), Err(BridgeError::Pairing(_))),
                "accepted {text:?}"
            );
        }
    }

    #[test]
    fn test_pair_is_idempotent_and_exclusive() {
        let mut table: PairingTable<u16> = PairingTable::new();
        assert!(table.pair(1, 100));
        assert!(!table.pair(1, 100));

        // client 2 claims account 100
        assert!(table.pair(2, 100));
        assert_eq!(table.account_of(1), None);
        assert_eq!(table.client_of(100), Some(2));

        // client 2 re-announces a new account
        assert!(table.pair(2, 200));
        assert_eq!(table.client_of(100), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_retain_clients() {
        let mut table: PairingTable<u16> = PairingTable::new();
        table.accept(1, "SVB_IDENT,SteamId:10").unwrap();
        table.accept(2, "SVB_IDENT,SteamId:20").unwrap();
        table.retain_clients(&[2]);
        assert_eq!(table.account_of(1), None);
        assert_eq!(table.client_of(20), Some(2));
    }
}
