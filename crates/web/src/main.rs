use std::{env, error::Error, net::SocketAddr};

use database::{DatabaseConnectionInfo, PgDatabase};
use run_tracker::{
    config::{lock_timeout_from_env, StoreKind},
    memory::MemoryDatabase,
};
use web::{start_web_server, WebState, DEFAULT_BIND_ADDRESS};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let address: SocketAddr = env::var("WEB_BIND_ADDRESS")
        .unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_owned())
        .parse()?;

    match StoreKind::from_env()? {
        StoreKind::Postgres => {
            let database_connection_info = DatabaseConnectionInfo::from_env()
                .ok_or("expected database connection info in env.")?;
            let database = PgDatabase::connect(database_connection_info).await?;
            start_web_server(WebState::new(database), address).await?;
        }
        StoreKind::Memory => {
            log::warn!("using the in-memory store, nothing will be persisted");
            let database = MemoryDatabase::with_lock_timeout(lock_timeout_from_env());
            start_web_server(WebState::new(database), address).await?;
        }
    }

    Ok(())
}
