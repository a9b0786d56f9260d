mod chat;
mod config;
mod connection;
mod directory;
mod dispatcher;
mod duration;
mod path_utils;
mod registry;
mod request;
mod routes;
mod server;
mod store;
mod telegram;
mod workflow;

use config::Config;
use dispatcher::Dispatcher;
use registry::Registry;
use server::Server;
use store::JsonFileStore;
use tracing::info;
use workflow::Workflow;

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marriage_bot=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let store = JsonFileStore::new(&config.state_path);
    info!(
        addr = %config.addr,
        state = %store.path().display(),
        "marriage bot starting; commands: брак (reply), браки, развод"
    );

    let mut dispatcher = Dispatcher::new(Workflow::new(Registry::new(store)));
    let secret = config.webhook_secret.clone();

    Server::new(|req, res| routes::route(&mut dispatcher, &secret, req, res)).listen(config.addr)?;

    Ok(())
}
