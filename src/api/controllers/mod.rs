use axum::routing::get;
use axum::Router;
use crate::api::ApiContext;

pub(crate) mod images;
pub(crate) mod auth;
mod categories;
pub(crate) mod statistics;

pub fn router() -> Router<ApiContext> {
    Router::new()
        .route("/api/ping", get(ping))
        .merge(auth::router())
        .merge(images::router())
        .merge(categories::router())
        .merge(statistics::router())
}

async fn ping() -> String {
    "pong".to_string()
}
