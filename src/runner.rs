use std::{sync::Arc, time::Duration};

use database::SqliteStore;
use fishing::{species, Fishery, SpeciesRegistry};
use futures_lite::stream::StreamExt;
use log::{debug, error, info};
use miette::Diagnostic;
use signal_hook::consts::signal::{SIGINT, SIGQUIT, SIGTERM};
use signal_hook_tokio::Signals;
use tokio::{select, sync::Notify, task::JoinHandle, time};

use crate::{
    commands::{self, Bot, Client},
    config::Config,
};

/// How often expired cooldowns and excess display names are dropped from memory.
const PURGE_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error("could not register signals")]
    #[diagnostic(code(runner::register_signals))]
    RegisterSignals(#[source] std::io::Error),

    #[error("could not load species catalog")]
    #[diagnostic(code(runner::load_species))]
    LoadSpecies(#[source] species::Error),

    #[error("could not open database")]
    #[diagnostic(code(runner::open_database))]
    OpenDatabase(#[source] database::Error),

    #[error("could not set wanted channels")]
    #[diagnostic(code(runner::set_wanted_channels))]
    SetWantedChannels(#[source] twitch_irc::validate::Error),

    #[error("failed to run twitch task")]
    #[diagnostic(code(runner::twitch_task))]
    TwitchTask(#[source] tokio::task::JoinError),

    #[error("failed to run signals task")]
    #[diagnostic(code(runner::signals_task))]
    SignalsTask(#[source] tokio::task::JoinError),
}

pub async fn run(config: Config) -> Result<(), Error> {
    let (quit, quit_handle, quit_task) = register_signals()?;

    info!("Loading species from {}", config.species_json.display());
    let registry =
        SpeciesRegistry::from_json_file(&config.species_json).map_err(Error::LoadSpecies)?;
    info!("Loaded {} species", registry.len());

    info!("Connecting to database");
    let store = SqliteStore::open(&config.database_url)
        .await
        .map_err(Error::OpenDatabase)?;

    let bot = Arc::new(Bot::new(Fishery::new(
        Arc::new(registry),
        Arc::new(store.clone()),
        config.fishery,
    )));

    let twitch_task = start_twitch_bot(&config, bot, quit)?;

    // keep the tokio executor alive.
    // If you return instead of waiting the background task will exit.
    twitch_task.await.map_err(Error::TwitchTask)?;

    // Terminate the signal stream.
    quit_handle.close();
    quit_task.await.map_err(Error::SignalsTask)?;

    debug!("Closing database");
    store.close().await;

    Ok(())
}

fn register_signals() -> Result<(Arc<Notify>, signal_hook_tokio::Handle, JoinHandle<()>), Error> {
    info!("Registering signals");

    let signals = Signals::new([SIGINT, SIGTERM, SIGQUIT]).map_err(Error::RegisterSignals)?;
    let notify = Arc::new(Notify::new());

    let handle = signals.handle();
    let task = tokio::spawn(handle_signals(signals, notify.clone()));

    Ok((notify, handle, task))
}

fn start_twitch_bot(
    config: &Config,
    bot: Arc<Bot>,
    quit: Arc<Notify>,
) -> Result<JoinHandle<()>, Error> {
    info!("Creating twitch client for {}", config.username);

    let (mut incoming_messages, client) = Client::new(config.client_config());

    let twitch_task = tokio::spawn({
        let client = client.clone();
        let mut purge = time::interval(PURGE_INTERVAL);

        async move {
            loop {
                select! {
                    maybe_message = incoming_messages.recv() => {
                        if let Some(message) = maybe_message {
                            if let Err(err) = commands::handle_server_message(&bot, &client, message).await {
                                error!("Error handling message: {err}");
                            }
                        } else {
                            break;
                        }
                    }
                    _ = purge.tick() => {
                        let fishery = bot.fishery();
                        let purged = fishery.fishing_limiter().purge_expired()
                            + fishery.leaderboard_limiter().purge_expired();
                        let forgotten = bot.prune_names();
                        debug!("Purged {purged} expired cooldowns and {forgotten} display names");
                    }
                    _ = quit.notified() => {
                        debug!("Received quitting twitch task");
                        break;
                    }
                }
            }
        }
    });

    debug!(
        "Setting wanted channels: {}",
        config
            .channels
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    client
        .set_wanted_channels(config.channels.clone())
        .map_err(Error::SetWantedChannels)?;

    Ok(twitch_task)
}

async fn handle_signals(mut signals: Signals, quit_signal: Arc<Notify>) {
    info!("Starting signal handler");
    while let Some(signal) = signals.next().await {
        match signal {
            SIGTERM | SIGINT | SIGQUIT => {
                info!("Received signal {signal}, shutting down");
                quit_signal.notify_one();
                break;
            }
            _ => unreachable!(),
        }
    }
}
