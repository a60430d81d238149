//! Per-key cooldowns with a randomized length.
//!
//! Every allowed attempt pushes the key's deadline to `now + cooldown`, where
//! the cooldown is drawn from `[min, max)`. Attempts before the deadline are
//! denied and told how long to wait. There is no burst capacity: a key is
//! either cooling down or it is not.

use std::{
    collections::HashMap,
    fmt::Display,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Duration, Utc};

use crate::random::{Clock, RandomSource, SeededRandom, SystemClock};

/// Bounds for the length of a cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownWindow {
    pub min: Duration,
    pub max: Duration,
}

impl CooldownWindow {
    /// A window with `max` raised to `min` if it was smaller.
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }

    pub fn fixed(cooldown: Duration) -> Self {
        Self::new(cooldown, cooldown)
    }
}

/// Result of [`RateLimiter::try_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permit {
    Allowed,
    Denied { remaining: Duration },
}

impl Permit {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Time left until the key may try again, zero when allowed.
    pub fn remaining(self) -> Duration {
        match self {
            Self::Allowed => Duration::zero(),
            Self::Denied { remaining } => remaining,
        }
    }
}

pub fn user_key(guild_id: impl Display, user_id: impl Display) -> String {
    format!("{guild_id}:{user_id}")
}

pub fn guild_key(guild_id: impl Display, bucket: impl Display) -> String {
    format!("g:{guild_id}|b:{bucket}")
}

pub struct RateLimiter {
    next: Mutex<HashMap<String, DateTime<Utc>>>,
    window: CooldownWindow,
    clock: Arc<dyn Clock>,
    rng: Arc<dyn RandomSource>,
}

impl RateLimiter {
    pub fn new(window: CooldownWindow) -> Self {
        Self::with_sources(window, Arc::new(SystemClock), Arc::new(SeededRandom::new()))
    }

    pub fn with_sources(
        window: CooldownWindow,
        clock: Arc<dyn Clock>,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            next: Mutex::new(HashMap::new()),
            window: CooldownWindow::new(window.min, window.max),
            clock,
            rng,
        }
    }

    pub fn window(&self) -> CooldownWindow {
        self.window
    }

    fn deadlines(&self) -> MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        // every mutation is a single insert or remove, so a poisoned map is still consistent
        self.next.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cooldown(&self) -> Duration {
        let CooldownWindow { min, max } = self.window;
        if min == max {
            return min;
        }

        let span = (max - min).num_nanoseconds().unwrap_or(i64::MAX);
        let jitter = self.rng.below(span as u64);
        min + Duration::nanoseconds(jitter as i64)
    }

    pub fn try_key(&self, key: &str) -> Permit {
        let now = self.clock.now();
        let mut next = self.deadlines();

        if let Some(&until) = next.get(key) {
            if now < until {
                return Permit::Denied {
                    remaining: until - now,
                };
            }
        }

        next.insert(key.to_string(), now + self.cooldown());
        Permit::Allowed
    }

    /// Cooldown for a single user within a guild.
    pub fn try_user(&self, guild_id: impl Display, user_id: impl Display) -> Permit {
        self.try_key(&user_key(guild_id, user_id))
    }

    /// Cooldown shared by everyone in a guild for one kind of action.
    pub fn try_guild(&self, guild_id: impl Display, bucket: impl Display) -> Permit {
        self.try_key(&guild_key(guild_id, bucket))
    }

    pub fn reset_key(&self, key: &str) {
        self.deadlines().remove(key);
    }

    pub fn reset(&self, guild_id: impl Display, user_id: impl Display) {
        self.reset_key(&user_key(guild_id, user_id));
    }

    /// The stored deadline for a key, which may already have passed.
    pub fn peek_key(&self, key: &str) -> Option<DateTime<Utc>> {
        self.deadlines().get(key).copied()
    }

    pub fn peek(&self, guild_id: impl Display, user_id: impl Display) -> Option<DateTime<Utc>> {
        self.peek_key(&user_key(guild_id, user_id))
    }

    /// Drops deadlines that have passed and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut next = self.deadlines();
        let before = next.len();
        next.retain(|_, until| *until > now);
        before - next.len()
    }
}
