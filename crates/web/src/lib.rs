pub use crate::common::RouteResult;

use std::net::SocketAddr;

use axum::Router;
use run_tracker::{client::Client, database::Database};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod common;
pub mod hateoas;
pub mod middleware;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

#[derive(Clone)]
pub struct WebState<D: Database> {
    pub run_client: Client<D>,
}

impl<D: Database> WebState<D> {
    pub fn new(database: D) -> Self {
        Self {
            run_client: Client::new(database),
        }
    }
}

pub fn router<D: Database + 'static>(state: WebState<D>) -> Router {
    Router::new()
        .nest_service("/api", api::routes(state))
        .layer(TraceLayer::new_for_http())
}

pub async fn start_web_server<D: Database + 'static>(
    state: WebState<D>,
    address: SocketAddr,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(address).await?;
    serve(state, listener).await
}

/// Serves on an already bound listener.
pub async fn serve<D: Database + 'static>(
    state: WebState<D>,
    listener: TcpListener,
) -> std::io::Result<()> {
    log::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state).into_make_service()).await?;

    Ok(())
}
