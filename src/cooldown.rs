//! Per-requester cooldown guard protecting the shared distributor account

use dashmap::DashMap;

/// What a requester last received and when
#[derive(Debug, Clone)]
pub struct CooldownEntry {
    pub last_address: String,
    pub last_success_unix: i64,
}

/// Rejects repeat requests for the same target address inside the cooldown
/// window. State is keyed by requester identity, lives in memory only and is
/// reset on restart. Mutation happens exclusively through
/// [`CooldownGuard::record_success`] so rejected or failed requests leave no
/// trace.
pub struct CooldownGuard {
    window_secs: i64,
    entries: DashMap<u64, CooldownEntry>,
}

impl CooldownGuard {
    pub fn new(window_secs: i64) -> Self {
        Self {
            window_secs,
            entries: DashMap::new(),
        }
    }

    /// Returns false iff the requester already received a distribution to the
    /// SAME address less than the window ago. A different address is always
    /// admitted. Never mutates state.
    pub fn admit(&self, requester_id: u64, address: &str, now_unix: i64) -> bool {
        match self.entries.get(&requester_id) {
            Some(entry) => {
                entry.last_address != address
                    || now_unix - entry.last_success_unix >= self.window_secs
            }
            None => true,
        }
    }

    /// Record a successful distribution. Called only after at least one batch
    /// produced a transaction hash.
    pub fn record_success(&self, requester_id: u64, address: &str, now_unix: i64) {
        self.entries.insert(
            requester_id,
            CooldownEntry {
                last_address: address.to_string(),
                last_success_unix: now_unix,
            },
        );
    }

    /// Seconds the requester still has to wait for this address, if any
    pub fn remaining_secs(&self, requester_id: u64, address: &str, now_unix: i64) -> Option<i64> {
        self.entries.get(&requester_id).and_then(|entry| {
            if entry.last_address != address {
                return None;
            }
            let remaining = self.window_secs - (now_unix - entry.last_success_unix);
            (remaining > 0).then_some(remaining)
        })
    }
}
