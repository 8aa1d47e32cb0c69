pub mod announcements;
pub mod auth;
pub mod config;
pub mod err;
pub mod messages;
pub mod models;
pub mod portal;
pub mod resources;
pub mod role;
pub mod roman;
pub mod store;
pub mod token;

use std::str::FromStr;
use std::sync::Arc;

use axum::body::HttpBody;
use axum::extract::{FromRequest, RequestParts};
use axum::handler::Handler;
use axum::http::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{async_trait, BoxError, Extension, Json, Router};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::Instant;
use uuid::Uuid;

use crate::auth::Authorized;
use crate::err::{Error, Listing, Success};
use crate::role::{navigation, AnyRole, NavItem};
use crate::store::Store;
use crate::token::Sessions;

pub type Payload<T> = axum::response::Result<Json<Success<T>>, Error>;

pub fn proceeds<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok(Json(Success::of(value)))
}

pub fn breaks<V>(err: Error) -> Payload<V>
where
    V: Serialize,
{
    Err(err)
}

/// Everything a handler needs, installed once as a request extension.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub sessions: Arc<Sessions>,
}

impl AppState {
    pub fn new(store: Store, sessions: Sessions) -> Self {
        Self {
            store,
            sessions: Arc::new(sessions),
        }
    }
}

/// JSON request body whose parse failures come back as `InvalidPayload`.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, B> FromRequest<B> for JsonBody<T>
where
    T: DeserializeOwned,
    B: HttpBody + Send,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req).await?;
        Ok(Self(value))
    }
}

pub fn parse_id(raw: &str) -> Result<Uuid, Error> {
    Ok(Uuid::from_str(raw)?)
}

async fn nav_menu(auth: Authorized<AnyRole>) -> Payload<Listing<NavItem>> {
    proceeds(Listing::of(navigation(auth.principal.role).to_vec()))
}

async fn log_requests<B>(req: Request<B>, next: Next<B>) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(req).await;
    log::info!(
        "{} {} -> {} in {:?}",
        method,
        path,
        response.status(),
        started.elapsed()
    );
    response
}

pub fn app(state: AppState) -> Router {
    let router = Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/me", get(auth::me))
        .route("/api/navigation", get(nav_menu))
        .route("/api/admin/credentials", post(auth::set_credential));
    let router = resources::admin_routes(router);
    let router = portal::student_routes(router);
    let router = portal::teacher_routes(router);
    let router = portal::parent_routes(router);
    let router = messages::routes(router);

    router
        .fallback(err::handler404.into_service())
        .layer(middleware::from_fn(log_requests))
        .layer(Extension(state))
}
