//! Session Registry
//!
//! Process-wide authoritative store of all live sessions. Constructed once at
//! startup and handed to the request-handling layer by reference; every entry
//! point of the lobby core lives here.
//!
//! Locking: an outer `RwLock` guards the id -> session map, each session sits
//! behind its own `RwLock` inside an `Arc`. Mutations on one session never
//! block another; cross-session work (create, destroy, the `find_by_user`
//! scan) holds the outer lock only for the map access itself. Handlers clone
//! the `Arc` out of the map and drop the outer lock before touching the
//! session.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::core::id::{SessionId, UserId};
use crate::engine::GameSeed;

use super::error::LobbyError;
use super::seat::Seat;
use super::session::{Session, SessionSnapshot};

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct LobbyConfig {
    /// Members idle longer than this are removed by [`SessionRegistry::sweep_stale`].
    pub stale_after: Duration,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(60),
        }
    }
}

/// Stores and owns all live sessions.
pub struct SessionRegistry {
    /// Live sessions.
    sessions: RwLock<BTreeMap<SessionId, Arc<RwLock<Session>>>>,
    /// Registry configuration.
    config: LobbyConfig,
}

impl SessionRegistry {
    /// Create an empty registry with default configuration.
    pub fn new() -> Self {
        Self::with_config(LobbyConfig::default())
    }

    /// Create an empty registry.
    pub fn with_config(config: LobbyConfig) -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            config,
        }
    }

    /// Create a session with `host` as sole member. Never fails.
    pub async fn create(&self, host: UserId) -> SessionId {
        let id = SessionId::generate();
        let session = Session::new(id, host);

        let mut sessions = self.sessions.write().await;
        sessions.insert(id, Arc::new(RwLock::new(session)));

        info!(session = %id.short(), host = %host.short(), "session created");
        id
    }

    /// Get a session handle by id.
    pub async fn get(&self, id: &SessionId) -> Result<Arc<RwLock<Session>>, LobbyError> {
        let sessions = self.sessions.read().await;
        sessions.get(id).cloned().ok_or(LobbyError::SessionNotFound)
    }

    /// Destroy a session, releasing all of its waiters.
    pub async fn destroy(&self, id: &SessionId) -> Result<(), LobbyError> {
        let session = {
            let mut sessions = self.sessions.write().await;
            sessions.remove(id).ok_or(LobbyError::SessionNotFound)?
        };
        session.write().await.close();
        info!(session = %id.short(), "session destroyed");
        Ok(())
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Find the session containing `user`.
    ///
    /// A user should be in at most one session; if client misbehavior ever
    /// produces several matches, the most recently created wins, with the id
    /// bytes as a deterministic tie-break on equal timestamps.
    pub async fn find_by_user(&self, user: &UserId) -> Result<SessionId, LobbyError> {
        let handles: Vec<Arc<RwLock<Session>>> = {
            let sessions = self.sessions.read().await;
            sessions.values().cloned().collect()
        };

        let mut best: Option<(chrono::DateTime<Utc>, SessionId)> = None;
        for handle in handles {
            let session = handle.read().await;
            if session.is_closed() || !session.contains(user) {
                continue;
            }
            let candidate = (session.created(), session.id());
            if best.map_or(true, |b| candidate > b) {
                best = Some(candidate);
            }
        }

        best.map(|(_, id)| id).ok_or(LobbyError::SessionNotFound)
    }

    /// Add `user` to a session.
    pub async fn join(&self, id: &SessionId, user: UserId) -> Result<Seat, LobbyError> {
        let handle = self.get(id).await?;
        let mut session = handle.write().await;
        session.join(user)
    }

    /// Remove `user` from a session, destroying it if emptied.
    pub async fn leave(&self, id: &SessionId, user: &UserId) -> Result<(), LobbyError> {
        let handle = self.get(id).await?;
        let emptied = {
            let mut session = handle.write().await;
            if session.is_closed() {
                return Err(LobbyError::SessionNotFound);
            }
            session.leave(user)?.emptied
        };

        if emptied {
            // `leave` already closed the session and released its waiters;
            // only the map entry is left to drop.
            let mut sessions = self.sessions.write().await;
            sessions.remove(id);
            info!(session = %id.short(), "session emptied and destroyed");
        }
        Ok(())
    }

    /// Mark `user` ready.
    pub async fn ready(&self, id: &SessionId, user: &UserId) -> Result<(), LobbyError> {
        let handle = self.get(id).await?;
        let mut session = handle.write().await;
        if session.is_closed() {
            return Err(LobbyError::SessionNotFound);
        }
        session.ready(user)
    }

    /// Refresh `user`'s liveness timestamp.
    pub async fn heartbeat(&self, id: &SessionId, user: &UserId) -> Result<(), LobbyError> {
        let handle = self.get(id).await?;
        let mut session = handle.write().await;
        if session.is_closed() {
            return Err(LobbyError::SessionNotFound);
        }
        session.heartbeat(user)
    }

    /// Exchange the occupants of two seats.
    pub async fn force_swap(
        &self,
        id: &SessionId,
        first: Seat,
        second: Seat,
    ) -> Result<(), LobbyError> {
        let handle = self.get(id).await?;
        let mut session = handle.write().await;
        if session.is_closed() {
            return Err(LobbyError::SessionNotFound);
        }
        session.force_swap(first, second);
        Ok(())
    }

    /// Read a session's observable state.
    pub async fn get_info(&self, id: &SessionId) -> Result<SessionSnapshot, LobbyError> {
        let handle = self.get(id).await?;
        let session = handle.read().await;
        if session.is_closed() {
            return Err(LobbyError::SessionNotFound);
        }
        Ok(session.snapshot())
    }

    /// Build the engine hand-off for a started session.
    pub async fn engine_seed(&self, id: &SessionId) -> Result<GameSeed, LobbyError> {
        let handle = self.get(id).await?;
        let session = handle.read().await;
        if session.is_closed() {
            return Err(LobbyError::SessionNotFound);
        }
        session.engine_seed()
    }

    /// Block until the session's observable state changes, or `timeout`
    /// elapses (long-poll).
    ///
    /// The change subscription is taken while holding the session lock, so a
    /// mutation that completes after this call resolves the session cannot be
    /// missed. The suspension itself holds no lock. On timeout the current
    /// snapshot is returned (the long-poll degrades to a plain read); if the
    /// session is destroyed while waiting, every waiter wakes and gets
    /// `SessionNotFound`. Cancellation is dropping the returned future.
    pub async fn wait_for_change(
        &self,
        id: &SessionId,
        timeout: Duration,
    ) -> Result<SessionSnapshot, LobbyError> {
        let handle = self.get(id).await?;

        let mut changes = {
            let session = handle.read().await;
            if session.is_closed() {
                return Err(LobbyError::SessionNotFound);
            }
            session.subscribe()
        };

        match tokio::time::timeout(timeout, changes.changed()).await {
            // Woken by a mutation.
            Ok(Ok(())) => {}
            // Sender gone: the session was dropped.
            Ok(Err(_)) => return Err(LobbyError::SessionNotFound),
            // Timed out: fall through to a plain read.
            Err(_) => {}
        }

        let session = handle.read().await;
        if session.is_closed() {
            return Err(LobbyError::SessionNotFound);
        }
        Ok(session.snapshot())
    }

    /// Remove members whose heartbeat went stale and drop sessions that end
    /// up empty. Intended to run on an interval from the host process.
    pub async fn sweep_stale(&self) {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.config.stale_after)
                .unwrap_or_else(|_| chrono::Duration::seconds(60));

        let handles: Vec<(SessionId, Arc<RwLock<Session>>)> = {
            let sessions = self.sessions.read().await;
            sessions.iter().map(|(id, s)| (*id, s.clone())).collect()
        };

        let mut emptied = Vec::new();
        for (id, handle) in handles {
            let mut session = handle.write().await;
            if session.is_closed() {
                continue;
            }
            for user in session.stale_members(cutoff) {
                debug!(session = %id.short(), user = %user.short(), "removing stale member");
                if let Ok(outcome) = session.leave(&user) {
                    if outcome.emptied {
                        emptied.push(id);
                        break;
                    }
                }
            }
        }

        if !emptied.is_empty() {
            let mut sessions = self.sessions.write().await;
            for id in &emptied {
                sessions.remove(id);
                info!(session = %id.short(), "stale session destroyed");
            }
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(n: u8) -> UserId {
        UserId::new([n; 16])
    }

    #[tokio::test]
    async fn test_create_and_get_info() {
        let registry = SessionRegistry::new();
        let id = registry.create(uid(1)).await;

        let info = registry.get_info(&id).await.unwrap();
        assert_eq!(info.host, uid(1));
        assert_eq!(info.members.len(), 1);
        assert_eq!(info.members[0].seat, Seat::North);
        assert!(!info.started);
    }

    #[tokio::test]
    async fn test_get_unknown_session() {
        let registry = SessionRegistry::new();
        let missing = SessionId::generate();
        assert!(matches!(
            registry.get_info(&missing).await,
            Err(LobbyError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn test_full_table_flow() {
        let registry = SessionRegistry::new();
        let id = registry.create(uid(1)).await;

        for n in 2..=4 {
            registry.join(&id, uid(n)).await.unwrap();
        }
        let info = registry.get_info(&id).await.unwrap();
        assert_eq!(info.members.len(), 4);
        let seats: Vec<Seat> = info.members.iter().map(|m| m.seat).collect();
        assert_eq!(seats, vec![Seat::North, Seat::East, Seat::South, Seat::West]);

        assert_eq!(
            registry.join(&id, uid(5)).await,
            Err(LobbyError::SessionFull)
        );

        for n in 1..=4 {
            registry.ready(&id, &uid(n)).await.unwrap();
        }
        assert!(registry.get_info(&id).await.unwrap().started);

        // Host departs a started table: still started, earliest-joined host.
        registry.leave(&id, &uid(1)).await.unwrap();
        let info = registry.get_info(&id).await.unwrap();
        assert!(info.started);
        assert_eq!(info.host, uid(2));
        assert_eq!(info.members.len(), 3);
    }

    #[tokio::test]
    async fn test_leave_to_empty_destroys() {
        let registry = SessionRegistry::new();
        let id = registry.create(uid(1)).await;

        registry.leave(&id, &uid(1)).await.unwrap();
        assert_eq!(registry.session_count().await, 0);
        assert!(matches!(
            registry.get_info(&id).await,
            Err(LobbyError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn test_destroy_releases_handle() {
        let registry = SessionRegistry::new();
        let id = registry.create(uid(1)).await;

        registry.destroy(&id).await.unwrap();
        assert!(matches!(
            registry.join(&id, uid(2)).await,
            Err(LobbyError::SessionNotFound)
        ));
        assert!(matches!(
            registry.destroy(&id).await,
            Err(LobbyError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn test_find_by_user_prefers_most_recent() {
        let registry = SessionRegistry::new();
        let first = registry.create(uid(1)).await;
        // Distinct creation timestamps.
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = registry.create(uid(1)).await;

        assert_eq!(registry.find_by_user(&uid(1)).await.unwrap(), second);

        registry.leave(&second, &uid(1)).await.unwrap();
        assert_eq!(registry.find_by_user(&uid(1)).await.unwrap(), first);

        assert!(matches!(
            registry.find_by_user(&uid(9)).await,
            Err(LobbyError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn test_heartbeat_and_swap_entry_points() {
        let registry = SessionRegistry::new();
        let id = registry.create(uid(1)).await;
        registry.join(&id, uid(2)).await.unwrap();

        registry.heartbeat(&id, &uid(1)).await.unwrap();
        assert!(matches!(
            registry.heartbeat(&id, &uid(9)).await,
            Err(LobbyError::UserNotFound)
        ));

        registry.force_swap(&id, Seat::North, Seat::East).await.unwrap();
        let info = registry.get_info(&id).await.unwrap();
        assert_eq!(info.members[0].id, uid(2));
        assert_eq!(info.members[1].id, uid(1));
    }

    #[tokio::test]
    async fn test_engine_seed_entry_point() {
        let registry = SessionRegistry::new();
        let id = registry.create(uid(1)).await;
        registry.join(&id, uid(2)).await.unwrap();

        assert!(matches!(
            registry.engine_seed(&id).await,
            Err(LobbyError::GameNotStarted)
        ));

        registry.ready(&id, &uid(1)).await.unwrap();
        registry.ready(&id, &uid(2)).await.unwrap();

        let seed = registry.engine_seed(&id).await.unwrap();
        assert_eq!(seed.session, id);
        assert_eq!(seed.players.len(), 2);
    }

    #[tokio::test]
    async fn test_waiter_released_by_join() {
        let registry = Arc::new(SessionRegistry::new());
        let id = registry.create(uid(1)).await;

        let waiter_registry = registry.clone();
        let waiter = tokio::spawn(async move {
            waiter_registry
                .wait_for_change(&id, Duration::from_secs(5))
                .await
        });

        // Let the waiter register before mutating.
        tokio::time::sleep(Duration::from_millis(100)).await;
        registry.join(&id, uid(2)).await.unwrap();

        let snapshot = waiter.await.unwrap().unwrap();
        assert!(snapshot.members.iter().any(|m| m.id == uid(2)));
    }

    #[tokio::test]
    async fn test_all_waiters_released_by_one_mutation() {
        let registry = Arc::new(SessionRegistry::new());
        let id = registry.create(uid(1)).await;
        registry.join(&id, uid(2)).await.unwrap();

        let mut waiters = Vec::new();
        for _ in 0..3 {
            let r = registry.clone();
            waiters.push(tokio::spawn(async move {
                r.wait_for_change(&id, Duration::from_secs(5)).await
            }));
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        registry.ready(&id, &uid(1)).await.unwrap();

        for waiter in waiters {
            let snapshot = waiter.await.unwrap().unwrap();
            assert!(snapshot.members.iter().any(|m| m.id == uid(1) && m.ready));
        }
    }

    #[tokio::test]
    async fn test_wait_timeout_returns_snapshot() {
        let registry = SessionRegistry::new();
        let id = registry.create(uid(1)).await;

        let snapshot = registry
            .wait_for_change(&id, Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(snapshot.host, uid(1));
    }

    #[tokio::test]
    async fn test_waiter_released_by_destruction() {
        let registry = Arc::new(SessionRegistry::new());
        let id = registry.create(uid(1)).await;

        let waiter_registry = registry.clone();
        let waiter = tokio::spawn(async move {
            waiter_registry
                .wait_for_change(&id, Duration::from_secs(5))
                .await
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        registry.leave(&id, &uid(1)).await.unwrap();

        assert!(matches!(
            waiter.await.unwrap(),
            Err(LobbyError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn test_heartbeat_does_not_release_waiter() {
        let registry = Arc::new(SessionRegistry::new());
        let id = registry.create(uid(1)).await;

        let waiter_registry = registry.clone();
        let waiter = tokio::spawn(async move {
            waiter_registry
                .wait_for_change(&id, Duration::from_millis(300))
                .await
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        registry.heartbeat(&id, &uid(1)).await.unwrap();

        // The waiter must run into its timeout, not the heartbeat.
        let started = std::time::Instant::now();
        waiter.await.unwrap().unwrap();
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_concurrent_joins_fill_exactly_four() {
        let registry = Arc::new(SessionRegistry::new());
        let id = registry.create(uid(1)).await;

        let mut tasks = Vec::new();
        for n in 2..=8 {
            let r = registry.clone();
            tasks.push(tokio::spawn(async move { r.join(&id, uid(n)).await }));
        }

        let mut admitted = 1; // the host
        for task in tasks {
            if task.await.unwrap().is_ok() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 4);

        let info = registry.get_info(&id).await.unwrap();
        assert_eq!(info.members.len(), 4);
        let mut seats: Vec<Seat> = info.members.iter().map(|m| m.seat).collect();
        seats.dedup();
        assert_eq!(seats.len(), 4);
    }

    #[tokio::test]
    async fn test_sweep_stale_destroys_idle_sessions() {
        let registry = SessionRegistry::with_config(LobbyConfig {
            stale_after: Duration::from_millis(0),
        });
        let id = registry.create(uid(1)).await;
        registry.join(&id, uid(2)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        registry.sweep_stale().await;

        assert_eq!(registry.session_count().await, 0);
        assert!(matches!(
            registry.get_info(&id).await,
            Err(LobbyError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn test_sweep_keeps_fresh_members() {
        let registry = SessionRegistry::with_config(LobbyConfig {
            stale_after: Duration::from_secs(3600),
        });
        let id = registry.create(uid(1)).await;

        registry.sweep_stale().await;
        assert_eq!(registry.session_count().await, 1);
    }
}
