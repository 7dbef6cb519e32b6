//! Bridge Lobby Server
//!
//! Process entry point: initializes logging, constructs the session
//! registry, runs the stale-member sweep on an interval, and drives a demo
//! lobby flow through every entry point.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use bridge_lobby::{Seat, SessionRegistry, UserId, VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("Bridge Lobby Server v{}", VERSION);

    let registry = Arc::new(SessionRegistry::new());

    // Periodic stale-member sweep
    let sweep_registry = registry.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        loop {
            interval.tick().await;
            sweep_registry.sweep_stale().await;
        }
    });

    demo_table(&registry).await?;
    Ok(())
}

/// Demo flow: create a table, seat four players, ready up, hand off to the
/// engine, then wind the table down.
async fn demo_table(registry: &Arc<SessionRegistry>) -> Result<()> {
    info!("=== Starting Demo Table ===");

    let host = UserId::generate();
    let session_id = registry.create(host).await;
    info!("Session: {}", session_id.to_uuid_string());

    // A waiter long-polls while the table fills.
    let waiter_registry = registry.clone();
    let waiter = tokio::spawn(async move {
        waiter_registry
            .wait_for_change(&session_id, Duration::from_secs(5))
            .await
    });

    let guests: Vec<UserId> = (0..3).map(|_| UserId::generate()).collect();
    for guest in &guests {
        let seat = registry.join(&session_id, *guest).await?;
        info!("Player {} seated {:?}", guest.short(), seat);
    }

    let released = waiter.await??;
    info!("Long-poll released with {} members", released.members.len());

    assert_eq!(registry.find_by_user(&host).await?, session_id);

    registry.force_swap(&session_id, Seat::East, Seat::West).await?;

    registry.ready(&session_id, &host).await?;
    for guest in &guests {
        registry.ready(&session_id, guest).await?;
    }

    let info = registry.get_info(&session_id).await?;
    info!("Started: {}", info.started);

    let seed = registry.engine_seed(&session_id).await?;
    info!("Engine seed: {:#018x}", seed.seed);
    for (seat, player) in &seed.players {
        info!("  {:?}: {}", seat, player.short());
    }

    registry.leave(&session_id, &host).await?;
    let info = registry.get_info(&session_id).await?;
    info!(
        "Host left; new host {} of {} members, started={}",
        info.host.short(),
        info.members.len(),
        info.started
    );

    for guest in &guests {
        registry.leave(&session_id, guest).await?;
    }
    info!("Live sessions: {}", registry.session_count().await);

    info!("=== Demo Complete ===");
    Ok(())
}
