//! Engine Seed Derivation
//!
//! The external game engine is seeded deterministically from the session
//! identity and its membership, so a started table always produces the same
//! deal for the same four players.

use sha2::{Digest, Sha256};

/// Derive a 64-bit engine seed from session parameters.
///
/// Inputs:
/// - Session ID (unique per table)
/// - User IDs (sorted for determinism)
///
/// IMPORTANT: Caller must ensure user_ids is sorted!
pub fn derive_table_seed(session_id: &[u8; 16], user_ids: &[[u8; 16]]) -> u64 {
    let mut hasher = Sha256::new();

    // Domain separator
    hasher.update(b"BRIDGE_LOBBY_SEED_V1");

    hasher.update(session_id);

    for uid in user_ids {
        hasher.update(uid);
    }

    let hash = hasher.finalize();

    // Take first 8 bytes as seed
    u64::from_le_bytes(hash[0..8].try_into().unwrap())
}
