#![forbid(unsafe_code)]

//! Catch generation, cooldowns and leaderboards for a chat fishing game.

pub mod catch;
pub mod fishery;
pub mod leaderboard;
pub mod picker;
pub mod random;
pub mod rarity;
pub mod ratelimit;
pub mod size_class;
pub mod species;
pub mod store;

pub use catch::{Catch, CatchRecord};
pub use fishery::{CatchReport, Fishery, FisheryConfig, FishingOutcome, LeaderboardOutcome};
pub use leaderboard::LeaderboardEntry;
pub use picker::CatchPicker;
pub use random::{Clock, ManualClock, RandomSource, ScriptedRandom, SeededRandom, SystemClock};
pub use rarity::RarityTier;
pub use ratelimit::{CooldownWindow, Permit, RateLimiter};
pub use size_class::SizeClass;
pub use species::{Species, SpeciesDescriptor, SpeciesId, SpeciesRegistry};
pub use store::{CatchStore, MemoryStore};
