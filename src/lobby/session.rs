//! Lobby Session State Machine
//!
//! One matchmaking group of up to four users: membership, seats, readiness
//! aggregation, host authority, lifecycle. All mutating methods are called
//! under the session's write lock (see `registry`), which makes each one
//! atomic with respect to every other operation on the same session.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::core::id::{SessionId, UserId};
use crate::core::seed::derive_table_seed;
use crate::engine::GameSeed;

use super::error::LobbyError;
use super::seat::{first_free_seat, Seat};

/// Maximum members per session (one per seat).
pub const MAX_MEMBERS: usize = 4;

/// Session lifecycle phase.
///
/// `Started` is a one-way trigger: it is set the instant a `ready` call makes
/// every member ready and never reverts while members remain, even if later
/// departures break "all ready". `Closed` is entered exactly once, when the
/// last member leaves or the registry destroys the session, so that a caller
/// holding a stale handle observes "session gone" instead of mutating a
/// zombie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyPhase {
    /// Created, waiting for members to ready up.
    Forming,
    /// Every member was ready at some instant; gameplay is delegated.
    Started,
    /// Emptied or destroyed; no further operation is valid.
    Closed,
}

/// A user's membership record within one session.
#[derive(Debug, Clone)]
pub struct Member {
    /// User identifier.
    pub id: UserId,
    /// Has this member declared ready.
    pub ready: bool,
    /// Assigned seat. Assigned eagerly on join, freed on leave.
    pub seat: Seat,
    /// When the member joined.
    pub joined_at: DateTime<Utc>,
    /// Monotonic per-session join counter, for earliest-joined host transfer.
    join_seq: u64,
    /// Last liveness signal.
    pub last_heartbeat: DateTime<Utc>,
}

/// Result of removing a member.
#[derive(Debug, Clone, Copy)]
pub struct LeaveOutcome {
    /// Membership reached zero; the caller must destroy the session.
    pub emptied: bool,
    /// Host authority moved to this member.
    pub new_host: Option<UserId>,
}

/// One member in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    /// User identifier.
    pub id: UserId,
    /// Ready flag.
    pub ready: bool,
    /// Occupied seat.
    pub seat: Seat,
}

/// Immutable read of a session's observable state, for external rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session identifier.
    pub id: SessionId,
    /// Current host.
    pub host: UserId,
    /// Members ordered by seat.
    pub members: Vec<MemberInfo>,
    /// Has the session started.
    pub started: bool,
}

impl SessionSnapshot {
    /// Serialize to JSON for the transport layer.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A matchmaking session.
pub struct Session {
    /// Unique session identifier.
    id: SessionId,
    /// Member with session-management authority.
    host: UserId,
    /// Membership, keyed by user id.
    members: BTreeMap<UserId, Member>,
    /// Creation timestamp; `find_by_user` orders by it, newest first.
    created: DateTime<Utc>,
    /// Lifecycle phase.
    phase: LobbyPhase,
    /// Next join sequence number.
    next_join_seq: u64,
    /// Change counter for long-poll waiters. Bumped by every observable
    /// mutation; heartbeats are excluded.
    changes: watch::Sender<u64>,
}

impl Session {
    /// Create a session with the host as sole member, seated North.
    pub fn new(id: SessionId, host: UserId) -> Self {
        let (changes, _) = watch::channel(0u64);
        let now = Utc::now();

        let mut session = Self {
            id,
            host,
            members: BTreeMap::new(),
            created: now,
            phase: LobbyPhase::Forming,
            next_join_seq: 0,
            changes,
        };
        session.insert_member(host, Seat::North, now);
        session
    }

    fn insert_member(&mut self, user: UserId, seat: Seat, now: DateTime<Utc>) {
        let join_seq = self.next_join_seq;
        self.next_join_seq += 1;
        self.members.insert(
            user,
            Member {
                id: user,
                ready: false,
                seat,
                joined_at: now,
                join_seq,
                last_heartbeat: now,
            },
        );
    }

    /// Wake all long-poll waiters on this session.
    fn notify_waiters(&self) {
        self.changes.send_modify(|v| *v = v.wrapping_add(1));
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current host.
    pub fn host(&self) -> UserId {
        self.host
    }

    /// Creation timestamp.
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Current phase.
    pub fn phase(&self) -> LobbyPhase {
        self.phase
    }

    /// Has the one-way start trigger fired.
    pub fn started(&self) -> bool {
        self.phase == LobbyPhase::Started
    }

    /// Has the session been emptied or destroyed.
    pub fn is_closed(&self) -> bool {
        self.phase == LobbyPhase::Closed
    }

    /// Member count.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Is the user a current member.
    pub fn contains(&self, user: &UserId) -> bool {
        self.members.contains_key(user)
    }

    /// Subscribe to the change counter. Must be called while holding the
    /// session lock so that no mutation can slip between the subscription and
    /// the caller's await (the register-after-signal race).
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Mark the session destroyed and release all waiters.
    ///
    /// Registry-internal; callers destroy sessions through the registry.
    pub(crate) fn close(&mut self) {
        self.phase = LobbyPhase::Closed;
        self.notify_waiters();
    }

    /// Add a user, assigning the first free seat in rotation order.
    pub fn join(&mut self, user: UserId) -> Result<Seat, LobbyError> {
        match self.phase {
            LobbyPhase::Closed => return Err(LobbyError::SessionNotFound),
            LobbyPhase::Started => return Err(LobbyError::SessionStarted),
            LobbyPhase::Forming => {}
        }
        if self.members.len() >= MAX_MEMBERS {
            return Err(LobbyError::SessionFull);
        }
        if self.members.contains_key(&user) {
            return Err(LobbyError::AlreadyJoined);
        }

        let occupied: Vec<Seat> = self.members.values().map(|m| m.seat).collect();
        let seat = first_free_seat(&occupied)?;
        self.insert_member(user, seat, Utc::now());

        debug!(
            session = %self.id.short(),
            user = %user.short(),
            seat = ?seat,
            "user joined"
        );
        self.notify_waiters();
        Ok(seat)
    }

    /// Remove a user, freeing their seat.
    ///
    /// Emptying the session closes it; the registry must then drop it. A
    /// departing host hands authority to the earliest-joined remaining member
    /// in the same step.
    pub fn leave(&mut self, user: &UserId) -> Result<LeaveOutcome, LobbyError> {
        if self.members.remove(user).is_none() {
            return Err(LobbyError::UserNotFound);
        }

        if self.members.is_empty() {
            debug!(session = %self.id.short(), "last member left, closing");
            self.close();
            return Ok(LeaveOutcome {
                emptied: true,
                new_host: None,
            });
        }

        let mut new_host = None;
        if self.host == *user {
            if let Some(next) = self.members.values().min_by_key(|m| m.join_seq) {
                self.host = next.id;
                new_host = Some(next.id);
                debug!(
                    session = %self.id.short(),
                    host = %next.id.short(),
                    "host left, authority transferred"
                );
            }
        }

        self.notify_waiters();
        Ok(LeaveOutcome {
            emptied: false,
            new_host,
        })
    }

    /// Mark a user ready. Fires the start trigger once every member is ready.
    ///
    /// Readiness is evaluated eagerly here, not lazily on read, so the start
    /// transition happens at a well-defined instant and a repeat call by an
    /// already-ready member is a plain no-op.
    pub fn ready(&mut self, user: &UserId) -> Result<(), LobbyError> {
        let member = self.members.get_mut(user).ok_or(LobbyError::UserNotFound)?;
        if member.ready {
            // Nothing observable changes; waiters stay asleep.
            return Ok(());
        }
        member.ready = true;

        if self.phase == LobbyPhase::Forming && self.members.values().all(|m| m.ready) {
            self.phase = LobbyPhase::Started;
            debug!(
                session = %self.id.short(),
                members = self.members.len(),
                "all members ready, session started"
            );
        }

        self.notify_waiters();
        Ok(())
    }

    /// Refresh a user's liveness timestamp. Does not wake waiters.
    pub fn heartbeat(&mut self, user: &UserId) -> Result<(), LobbyError> {
        let member = self.members.get_mut(user).ok_or(LobbyError::UserNotFound)?;
        member.last_heartbeat = Utc::now();
        Ok(())
    }

    /// Exchange the occupants of two seats. A seat with no occupant simply
    /// contributes nothing to the swap. Authorization is a caller concern.
    pub fn force_swap(&mut self, first: Seat, second: Seat) {
        if first == second {
            return;
        }
        for member in self.members.values_mut() {
            if member.seat == first {
                member.seat = second;
            } else if member.seat == second {
                member.seat = first;
            }
        }
        self.notify_waiters();
    }

    /// Immutable snapshot of observable state, members ordered by seat.
    pub fn snapshot(&self) -> SessionSnapshot {
        let mut members: Vec<MemberInfo> = self
            .members
            .values()
            .map(|m| MemberInfo {
                id: m.id,
                ready: m.ready,
                seat: m.seat,
            })
            .collect();
        members.sort_by_key(|m| m.seat);

        SessionSnapshot {
            id: self.id,
            host: self.host,
            members,
            started: self.started(),
        }
    }

    /// Build the engine hand-off once the session has started.
    pub fn engine_seed(&self) -> Result<GameSeed, LobbyError> {
        if !self.started() {
            return Err(LobbyError::GameNotStarted);
        }

        // BTreeMap keys are already sorted, as seed derivation requires.
        let ids: Vec<[u8; 16]> = self.members.keys().map(|u| u.0).collect();
        let seed = derive_table_seed(self.id.as_bytes(), &ids);

        let mut players: Vec<(Seat, UserId)> =
            self.members.values().map(|m| (m.seat, m.id)).collect();
        players.sort_by_key(|(seat, _)| *seat);

        Ok(GameSeed {
            session: self.id,
            seed,
            players,
        })
    }

    /// Members whose last heartbeat is older than `cutoff`.
    pub fn stale_members(&self, cutoff: DateTime<Utc>) -> Vec<UserId> {
        self.members
            .values()
            .filter(|m| m.last_heartbeat < cutoff)
            .map(|m| m.id)
            .collect()
    }
}
