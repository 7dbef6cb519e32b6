//! # Bridge Lobby
//!
//! In-memory matchmaking core for four-player bridge tables: session
//! creation, join/leave, readiness aggregation, seat assignment, host
//! authority, and long-poll change notification.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      BRIDGE LOBBY                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/            - Primitives                               │
//! │  ├── id.rs        - Opaque session/user identifiers          │
//! │  └── seed.rs      - Engine seed derivation (SHA-256)         │
//! │                                                              │
//! │  lobby/           - Matchmaking core                         │
//! │  ├── error.rs     - Typed error kinds                        │
//! │  ├── seat.rs      - N/E/S/W rotation, seat assignment        │
//! │  ├── session.rs   - Session state machine                    │
//! │  └── registry.rs  - Concurrency-safe session store           │
//! │                                                              │
//! │  engine.rs        - Hand-off boundary to the game engine     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Model
//!
//! The registry is the single authority for all live sessions. Operations on
//! one session serialize on that session's lock; operations on different
//! sessions run in parallel. Long-poll waiters subscribe to a per-session
//! change counter while the session lock is held and suspend with no lock
//! held, so a racing mutation can never be missed and a destroyed session
//! releases every waiter.
//!
//! Transport (HTTP routing, serialization, CORS, health checks) and the card
//! game itself (bidding, trick play, scoring) live outside this crate.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod engine;
pub mod lobby;

// Re-export commonly used types
pub use core::id::{SessionId, UserId};
pub use engine::GameSeed;
pub use lobby::error::LobbyError;
pub use lobby::registry::{LobbyConfig, SessionRegistry};
pub use lobby::seat::Seat;
pub use lobby::session::{LobbyPhase, SessionSnapshot, MAX_MEMBERS};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Seats at a table.
pub const TABLE_SEATS: usize = 4;
