use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::species::SpeciesId;

/// Rounds half away from zero to the nearest tenth.
pub fn round_to_tenths(size: f64) -> f64 {
    (size * 10.0).round() / 10.0
}

/// A single successful fishing action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catch {
    pub guild_id: i64,
    pub user_id: i64,
    pub species_id: SpeciesId,
    /// Size in centimeters, always a multiple of `0.1`.
    pub size: f64,
    pub caught_at: DateTime<Utc>,
}

impl Catch {
    pub fn new(
        guild_id: i64,
        user_id: i64,
        species_id: SpeciesId,
        size: f64,
        caught_at: DateTime<Utc>,
    ) -> Self {
        Self {
            guild_id,
            user_id,
            species_id,
            size: round_to_tenths(size),
            caught_at,
        }
    }

    /// The size as an integer count of millimeters, used for exact ordering.
    pub fn size_tenths(&self) -> i64 {
        (self.size * 10.0).round() as i64
    }
}

/// A [`Catch`] as read back from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchRecord {
    /// Insertion order, assigned by the store.
    pub id: i64,
    #[serde(flatten)]
    pub catch: Catch,
}
