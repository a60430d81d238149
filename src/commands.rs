//! Chat commands and the replies they produce.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use chrono::Duration;
use fishing::{
    leaderboard, CatchReport, Fishery, FishingOutcome, LeaderboardEntry, LeaderboardOutcome,
    SpeciesRegistry,
};
use log::{error, info, trace, warn};
use miette::Diagnostic;
use once_cell::sync::Lazy;
use regex::Regex;
use twitch_irc::{
    login::StaticLoginCredentials,
    message::{PrivmsgMessage, ServerMessage},
    SecureTCPTransport, TwitchIRCClient,
};

pub type Client = TwitchIRCClient<SecureTCPTransport, StaticLoginCredentials>;
pub type IrcError = twitch_irc::Error<SecureTCPTransport, StaticLoginCredentials>;

/// Twitch drops messages above 500 characters.
const MAX_REPLY_LEN: usize = 480;

/// Display names kept for the leaderboard before the least recently seen are dropped.
pub const NAME_CACHE_CAPACITY: usize = 10_000;

static COMMAND_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)!(?P<command>fishes|fish|leaderboard)(\s+(?P<args>.*?))?\s*$").unwrap()
});

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error("could not reply to message")]
    #[diagnostic(code(commands::reply))]
    Reply(#[source] IrcError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Fish,
    Leaderboard { species: Option<String> },
    Fishes,
}

impl Command {
    pub fn parse(text: &str) -> Option<Self> {
        let captures = COMMAND_REGEX.captures(text.trim())?;
        let args = captures.name("args").map(|m| m.as_str());

        match captures.name("command")?.as_str().to_lowercase().as_str() {
            "fish" => Some(Self::Fish),
            "fishes" => Some(Self::Fishes),
            "leaderboard" => Some(Self::Leaderboard {
                species: args
                    .and_then(|args| args.split_whitespace().next())
                    .map(str::to_string),
            }),
            _ => None,
        }
    }
}

/// Remaining cooldown as `m:ss`.
pub fn pretty(remaining: Duration) -> String {
    let seconds = remaining.num_seconds().max(0);
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Joins `items` after `head` until the reply would get too long.
fn join_bounded<I>(head: &str, items: I, separator: &str) -> String
where
    I: IntoIterator<Item = String>,
{
    let mut reply = head.to_string();
    for (index, item) in items.into_iter().enumerate() {
        let separator = if index == 0 { "" } else { separator };
        if reply.len() + separator.len() + item.len() > MAX_REPLY_LEN {
            break;
        }
        reply.push_str(separator);
        reply.push_str(&item);
    }
    reply
}

pub fn render_catch(name: &str, report: &CatchReport) -> String {
    let mut reply = format!(
        "{name} caught {} {}! Size: {:.1} cm · {} · Rarity: {}",
        report.species.article(),
        report.species.name,
        report.catch.size,
        report.size_class,
        report.tier
    );
    if report.persist_error.is_some() {
        reply.push_str(" (could not be saved)");
    }
    reply
}

pub fn render_fishes(registry: &SpeciesRegistry) -> String {
    join_bounded(
        "fishes: ",
        registry.iter().map(|species| species.key.clone()),
        ", ",
    )
}

/// Display names by user id, each stamped with when it was last seen.
#[derive(Debug, Default)]
struct NameCache {
    names: HashMap<i64, (String, u64)>,
    seen: u64,
}

/// Relays chat messages to the [`Fishery`] and remembers display names for the leaderboard.
pub struct Bot {
    fishery: Fishery,
    names: Mutex<NameCache>,
    name_capacity: usize,
}

impl Bot {
    pub fn new(fishery: Fishery) -> Self {
        Self::with_name_capacity(fishery, NAME_CACHE_CAPACITY)
    }

    pub fn with_name_capacity(fishery: Fishery, name_capacity: usize) -> Self {
        Self {
            fishery,
            names: Mutex::new(NameCache::default()),
            name_capacity,
        }
    }

    pub fn fishery(&self) -> &Fishery {
        &self.fishery
    }

    fn names(&self) -> MutexGuard<'_, NameCache> {
        self.names.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn remember(&self, user_id: i64, name: &str) {
        let mut cache = self.names();
        cache.seen += 1;
        let seen = cache.seen;
        cache.names.insert(user_id, (name.to_string(), seen));
    }

    fn name_of(&self, user_id: i64) -> String {
        self.names()
            .names
            .get(&user_id)
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| format!("user {user_id}"))
    }

    /// Drops the least recently seen names above capacity and returns how many were dropped.
    pub fn prune_names(&self) -> usize {
        let mut cache = self.names();
        let excess = cache.names.len().saturating_sub(self.name_capacity);
        if excess == 0 {
            return 0;
        }

        let mut stamps: Vec<u64> = cache.names.values().map(|(_, seen)| *seen).collect();
        stamps.sort_unstable();
        // stamps are unique, so this keeps exactly `name_capacity` entries
        let oldest_kept = stamps[excess];
        cache.names.retain(|_, (_, seen)| *seen >= oldest_kept);

        excess
    }

    fn render_leaderboard(&self, title: &str, entries: &[LeaderboardEntry]) -> String {
        join_bounded(
            title,
            entries.iter().map(|entry| {
                format!(
                    "#{} {:.1} cm ({}) {} {}",
                    entry.rank,
                    entry.record.catch.size,
                    entry.size_class,
                    self.name_of(entry.record.catch.user_id),
                    entry.species.name
                )
            }),
            " | ",
        )
    }

    pub async fn respond(&self, guild_id: i64, user_id: i64, name: &str, command: Command) -> String {
        match command {
            Command::Fish => match self.fishery.go_fishing(guild_id, user_id).await {
                Ok(FishingOutcome::Cooldown { remaining }) => {
                    format!("⏳ You're reeling in… try again in {}.", pretty(remaining))
                }
                Ok(FishingOutcome::Caught(report)) => render_catch(name, &report),
                Err(err) => {
                    error!("Could not go fishing in {guild_id}: {err}");
                    "the fish got away, try again later".to_string()
                }
            },
            Command::Leaderboard { species } => {
                match self.fishery.leaderboard(guild_id, species.as_deref()).await {
                    Ok(LeaderboardOutcome::Cooldown { remaining }) => format!(
                        "⏳ Leaderboard refreshing... try again in {}.",
                        pretty(remaining)
                    ),
                    Ok(LeaderboardOutcome::Ranked(entries)) if entries.is_empty() => {
                        "No catches yet - type !fish to make the first!".to_string()
                    }
                    Ok(LeaderboardOutcome::Ranked(entries)) => {
                        let title = match species.as_deref().and_then(|key| {
                            let registry = self.fishery.registry();
                            registry.id_by_key(key).and_then(|id| registry.get(id))
                        }) {
                            Some(species) => format!("🏆 Leaderboard - {}: ", species.name),
                            None => "🏆 Biggest Catches: ".to_string(),
                        };
                        self.render_leaderboard(&title, &entries)
                    }
                    Err(leaderboard::Error::UnknownSpecies(key)) => format!("Unknown fish '{key}'"),
                    Err(err) => {
                        error!("Could not load leaderboard of {guild_id}: {err}");
                        "Error loading leaderboard.".to_string()
                    }
                }
            }
            Command::Fishes => render_fishes(self.fishery.registry()),
        }
    }
}

pub async fn handle_server_message(
    bot: &Bot,
    client: &Client,
    message: ServerMessage,
) -> Result<(), Error> {
    trace!("Received message: {:?}", &message);

    match message {
        ServerMessage::Privmsg(msg) => handle_privmsg(bot, client, &msg).await?,
        ServerMessage::Notice(msg) => {
            warn!(
                "Notice: {} {}",
                msg.channel_login.unwrap_or_else(|| "Server".to_string()),
                msg.message_text
            );
        }
        ServerMessage::Reconnect(_) => {
            info!("Twitch Server requested a reconnect");
        }
        _ => {}
    }

    Ok(())
}

async fn handle_privmsg(bot: &Bot, client: &Client, msg: &PrivmsgMessage) -> Result<(), Error> {
    let Some(command) = Command::parse(&msg.message_text) else {
        return Ok(());
    };

    let (Ok(guild_id), Ok(user_id)) = (msg.channel_id.parse::<i64>(), msg.sender.id.parse::<i64>())
    else {
        warn!(
            "Ignoring {command:?} from {} in {}: ids are not numeric",
            msg.sender.login, msg.channel_login
        );
        return Ok(());
    };

    bot.remember(user_id, &msg.sender.name);
    let reply = bot.respond(guild_id, user_id, &msg.sender.name, command).await;

    client
        .say_in_reply_to(msg, reply)
        .await
        .map_err(Error::Reply)
}
