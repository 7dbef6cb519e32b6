//! Game Engine Hand-Off
//!
//! The lobby core has no knowledge of bidding, trick play, or scoring. Once a
//! session starts, the request-handling layer builds an engine instance from
//! a [`GameSeed`] and delegates every subsequent card-play request to it.

use serde::{Deserialize, Serialize};

use crate::core::id::{SessionId, UserId};
use crate::lobby::seat::Seat;

/// Everything an external game engine needs to begin play for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSeed {
    /// The session this deal belongs to.
    pub session: SessionId,
    /// Deterministic 64-bit seed derived from session id and membership.
    pub seed: u64,
    /// Members in seat rotation order at the moment of the hand-off.
    pub players: Vec<(Seat, UserId)>,
}

impl GameSeed {
    /// Look up which user occupies a seat, if any.
    pub fn player_at(&self, seat: Seat) -> Option<UserId> {
        self.players
            .iter()
            .find(|(s, _)| *s == seat)
            .map(|(_, id)| *id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_at() {
        let seed = GameSeed {
            session: SessionId::new([1; 16]),
            seed: 42,
            players: vec![
                (Seat::North, UserId::new([2; 16])),
                (Seat::South, UserId::new([3; 16])),
            ],
        };
        assert_eq!(seed.player_at(Seat::North), Some(UserId::new([2; 16])));
        assert_eq!(seed.player_at(Seat::East), None);
    }
}
