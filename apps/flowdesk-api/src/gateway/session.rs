//! Per-connection gateway session state.

use std::sync::atomic::{AtomicU64, Ordering};

use flowdesk_common::id::{prefix, prefixed_ulid};

use crate::models::user::Principal;

/// State for a single WebSocket connection.
pub struct GatewaySession {
    /// Unique connection identifier (`conn_` prefixed ULID).
    pub connection_id: String,
    /// Identity from the credential presented at the handshake.
    pub user: Principal,
    /// Monotonically increasing sequence number for dispatch events.
    seq: AtomicU64,
}

impl GatewaySession {
    pub fn new(user: Principal) -> Self {
        Self {
            connection_id: prefixed_ulid(prefix::CONNECTION),
            user,
            seq: AtomicU64::new(0),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    /// Get the next sequence number for a dispatch event.
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed) + 1
    }
}
