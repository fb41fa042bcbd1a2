use axum::{
    Json, Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use api_types::Health;
use ledger::Store;
use token::Maker;

use std::{sync::Arc, time::Duration};

use crate::{ServerError, accounts, transfers, users};

/// Tunables of the HTTP layer.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub access_token_duration: chrono::Duration,
    /// Deadline for one transfer request, retries included.
    pub transfer_timeout: Duration,
    /// How many times an aborted transfer is attempted again.
    pub transfer_max_retries: u32,
    /// Base delay between retries, multiplied by the attempt number.
    pub transfer_retry_backoff: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            access_token_duration: chrono::Duration::minutes(15),
            transfer_timeout: Duration::from_secs(5),
            transfer_max_retries: 3,
            transfer_retry_backoff: Duration::from_millis(10),
        }
    }
}

#[derive(Clone)]
pub struct ServerState {
    pub store: Store,
    pub token_maker: Arc<dyn Maker>,
    pub config: ServerConfig,
}

/// Checks the bearer token and hands its payload to the handlers.
async fn auth(
    auth_header: Option<TypedHeader<Authorization<Bearer>>>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let Some(TypedHeader(Authorization(bearer))) = auth_header else {
        return Err(ServerError::Unauthorized(
            "authorization header is not provided".to_string(),
        ));
    };

    let payload = state.token_maker.verify_token(bearer.token())?;
    request.extensions_mut().insert(payload);
    Ok(next.run(request).await)
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
        message: "bank is running".to_string(),
    })
}

pub fn router(state: ServerState) -> Router {
    let protected = Router::new()
        .route("/accounts", post(accounts::create).get(accounts::list))
        .route("/accounts/{id}", get(accounts::get).delete(accounts::delete))
        .route("/accounts/{id}/entries", get(accounts::entries))
        .route("/transfers", post(transfers::create))
        .route("/transfers/{id}", get(transfers::get))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth));

    Router::new()
        .route("/", get(health))
        .route("/users", post(users::create))
        .route("/users/login", post(users::login))
        .merge(protected)
        .with_state(state)
}

pub async fn run_with_listener(
    state: ServerState,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(state)).await
}
