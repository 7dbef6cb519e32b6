//! Matchmaking Core
//!
//! Session state machine, seat assignment, and the concurrency-safe registry.
//!
//! ## Module Structure
//!
//! - `error`: typed error kinds shared by every operation
//! - `seat`: the four fixed rotation slots and pure seat assignment
//! - `session`: one session's membership, readiness, and lifecycle
//! - `registry`: the process-wide store and all entry points

pub mod error;
pub mod registry;
pub mod seat;
pub mod session;

// Re-export key types
pub use error::LobbyError;
pub use registry::{LobbyConfig, SessionRegistry};
pub use seat::Seat;
pub use session::{LobbyPhase, Member, SessionSnapshot, Session, MAX_MEMBERS};
