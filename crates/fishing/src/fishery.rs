//! One fishing action end to end: gate, pick, roll, classify and store.

use std::{fmt::Display, sync::Arc};

use chrono::Duration;
use log::{debug, error, info};
use miette::Diagnostic;

use crate::{
    catch::Catch,
    leaderboard::{self, LeaderboardEntry},
    picker::CatchPicker,
    random::{Clock, RandomSource, SeededRandom, SystemClock},
    rarity::RarityTier,
    ratelimit::{CooldownWindow, Permit, RateLimiter},
    size_class::{size_class_for, SizeClass},
    species::{Species, SpeciesId, SpeciesRegistry},
    store::{self, CatchStore},
};

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error("picked species {0} is not in the catalog")]
    #[diagnostic(code(fishing::fishery::unknown_species))]
    UnknownSpecies(SpeciesId),
}

/// Bucket name of the guild-wide leaderboard cooldown.
pub const LEADERBOARD_BUCKET: &str = "leaderboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FisheryConfig {
    pub fishing_cooldown: CooldownWindow,
    pub leaderboard_cooldown: CooldownWindow,
    pub leaderboard_size: u32,
}

impl Default for FisheryConfig {
    fn default() -> Self {
        Self {
            fishing_cooldown: CooldownWindow::new(Duration::seconds(240), Duration::seconds(300)),
            leaderboard_cooldown: CooldownWindow::fixed(Duration::seconds(30)),
            leaderboard_size: store::DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug)]
pub struct CatchReport {
    /// Id assigned by the store, `None` if storing failed.
    pub record_id: Option<i64>,
    pub catch: Catch,
    pub species: Species,
    pub tier: RarityTier,
    pub size_class: SizeClass,
    /// Set when the catch could not be stored. The roll is still valid.
    pub persist_error: Option<store::Error>,
}

impl CatchReport {
    pub fn color(&self) -> u32 {
        self.tier.color()
    }
}

impl Display for CatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} ({:.1} cm, {}) [{}]",
            self.species.article(),
            self.species.name,
            self.catch.size,
            self.size_class,
            self.tier
        )
    }
}

#[derive(Debug)]
pub enum FishingOutcome {
    Cooldown { remaining: Duration },
    Caught(CatchReport),
}

#[derive(Debug)]
pub enum LeaderboardOutcome {
    Cooldown { remaining: Duration },
    Ranked(Vec<LeaderboardEntry>),
}

pub struct Fishery {
    picker: CatchPicker,
    fishing_limiter: RateLimiter,
    leaderboard_limiter: RateLimiter,
    store: Arc<dyn CatchStore>,
    clock: Arc<dyn Clock>,
    leaderboard_size: u32,
}

impl Fishery {
    pub fn new(
        registry: Arc<SpeciesRegistry>,
        store: Arc<dyn CatchStore>,
        config: FisheryConfig,
    ) -> Self {
        Self::with_sources(
            registry,
            store,
            config,
            Arc::new(SystemClock),
            Arc::new(SeededRandom::new()),
        )
    }

    pub fn with_sources(
        registry: Arc<SpeciesRegistry>,
        store: Arc<dyn CatchStore>,
        config: FisheryConfig,
        clock: Arc<dyn Clock>,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            picker: CatchPicker::with_random(registry, rng.clone()),
            fishing_limiter: RateLimiter::with_sources(
                config.fishing_cooldown,
                clock.clone(),
                rng.clone(),
            ),
            leaderboard_limiter: RateLimiter::with_sources(
                config.leaderboard_cooldown,
                clock.clone(),
                rng,
            ),
            store,
            clock,
            leaderboard_size: config.leaderboard_size,
        }
    }

    pub fn registry(&self) -> &SpeciesRegistry {
        self.picker.registry()
    }

    pub fn picker(&self) -> &CatchPicker {
        &self.picker
    }

    pub fn fishing_limiter(&self) -> &RateLimiter {
        &self.fishing_limiter
    }

    pub fn leaderboard_limiter(&self) -> &RateLimiter {
        &self.leaderboard_limiter
    }

    pub async fn go_fishing(&self, guild_id: i64, user_id: i64) -> Result<FishingOutcome, Error> {
        if let Permit::Denied { remaining } = self.fishing_limiter.try_user(guild_id, user_id) {
            debug!("{guild_id}:{user_id} is on cooldown for {remaining}");
            return Ok(FishingOutcome::Cooldown { remaining });
        }

        let species_id = self.picker.pick_id();
        let size = self.picker.roll_size(species_id);
        let tier = self.picker.species_tier(species_id);

        let species = self
            .registry()
            .get(species_id)
            .cloned()
            .ok_or(Error::UnknownSpecies(species_id))?;
        let size_class = size_class_for(&species, size);
        let catch = Catch::new(guild_id, user_id, species_id, size, self.clock.now());

        info!(
            "{guild_id}:{user_id} caught {} ({:.1} cm, {size_class}, {tier})",
            species.key, catch.size
        );

        let (record_id, persist_error) = match self.store.append(&catch).await {
            Ok(id) => (Some(id), None),
            Err(err) => {
                error!("Could not store catch of {guild_id}:{user_id}: {err}");
                (None, Some(err))
            }
        };

        Ok(FishingOutcome::Caught(CatchReport {
            record_id,
            catch,
            species,
            tier,
            size_class,
            persist_error,
        }))
    }

    pub async fn leaderboard(
        &self,
        guild_id: i64,
        species_key: Option<&str>,
    ) -> Result<LeaderboardOutcome, leaderboard::Error> {
        if let Permit::Denied { remaining } =
            self.leaderboard_limiter.try_guild(guild_id, LEADERBOARD_BUCKET)
        {
            debug!("Leaderboard of {guild_id} is on cooldown for {remaining}");
            return Ok(LeaderboardOutcome::Cooldown { remaining });
        }

        let entries = leaderboard::top_catches(
            self.store.as_ref(),
            self.registry(),
            guild_id,
            species_key,
            self.leaderboard_size,
        )
        .await?;

        Ok(LeaderboardOutcome::Ranked(entries))
    }
}
