//! Table Seats
//!
//! The four fixed rotation slots of a bridge table. Assignment is automatic
//! on join: the first seat in canonical N -> E -> S -> W order that no
//! current member occupies.

use serde::{Deserialize, Serialize};

use super::error::LobbyError;

/// A seat at the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Seat {
    /// Dealer position for the first deal; the host's seat.
    North = 0,
    /// East.
    East = 1,
    /// South.
    South = 2,
    /// West.
    West = 3,
}

impl Seat {
    /// All seats in canonical rotation order.
    pub const ALL: [Seat; 4] = [Seat::North, Seat::East, Seat::South, Seat::West];

    /// Rotation index (0..4).
    #[inline]
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Get seat from rotation index.
    pub fn from_index(index: u8) -> Option<Seat> {
        match index {
            0 => Some(Seat::North),
            1 => Some(Seat::East),
            2 => Some(Seat::South),
            3 => Some(Seat::West),
            _ => None,
        }
    }

    /// The seat across the table (partnership pairing: N-S, E-W).
    pub fn partner(self) -> Seat {
        match self {
            Seat::North => Seat::South,
            Seat::East => Seat::West,
            Seat::South => Seat::North,
            Seat::West => Seat::East,
        }
    }
}

/// Find the first unoccupied seat in canonical rotation order.
///
/// Pure function over the currently occupied seats. `NoSeatAvailable` is an
/// invariant-violation guard: the membership-size check upstream keeps it
/// unreachable.
pub fn first_free_seat(occupied: &[Seat]) -> Result<Seat, LobbyError> {
    Seat::ALL
        .into_iter()
        .find(|seat| !occupied.contains(seat))
        .ok_or(LobbyError::NoSeatAvailable)
}
