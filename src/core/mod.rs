//! Core primitives: opaque identifiers and engine seed derivation.

pub mod id;
pub mod seed;

// Re-export core types
pub use id::{SessionId, UserId};
pub use seed::derive_table_seed;
