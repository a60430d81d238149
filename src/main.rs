#![forbid(unsafe_code)]

mod commands;
mod config;
mod runner;

use dotenvy::dotenv;
use miette::{Result, WrapErr};

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init_timed();
    dotenv().ok();

    let config = Config::from_env().wrap_err("failed to load configuration")?;

    runner::run(config).await.wrap_err("failed to run bot")
}
