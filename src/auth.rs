use std::marker::PhantomData;

use axum::extract::{FromRequest, RequestParts};
use axum::headers::{Cookie, HeaderMapExt};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum::{async_trait, Extension, Json};
use chrono::{DateTime, Utc};
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::err::{Error, Success};
use crate::models::{Admin, Credential, Record, Resource};
use crate::role::{AcceptedRoles, AdminOnly, AnyRole, Role};
use crate::store::{Document, Store};
use crate::token::Sessions;
use crate::{proceeds, AppState, JsonBody, Payload};

pub const MIN_PASSWORD_LEN: usize = 8;

/// The authenticated caller, as read from the session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub subject_id: Uuid,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
    /// `sid` of the token, used to tell sessions apart in logs.
    #[serde(skip)]
    pub session_id: String,
}

impl Principal {
    /// The caller's own person record, whatever the role.
    pub async fn own_document(&self, store: &Store) -> Result<Document, Error> {
        store
            .get(self.role.collection(), self.subject_id)
            .await?
            .ok_or_else(|| {
                Error::not_found(format!(
                    "No {} record belongs to this session",
                    self.role
                ))
            })
    }
}

/// Runs the session checks in order: presence, decoding, expiry, role.
/// Touches no storage; the person lookup happens in [`Authorized`].
pub fn ensure_authenticated(
    token: Option<&str>,
    accepted: &[Role],
    sessions: &Sessions,
    now: DateTime<Utc>,
) -> Result<Principal, Error> {
    let token = match token {
        Some(token) if !token.is_empty() => token,
        _ => {
            return Err(Error::MissingCredentials {
                message: "No session token, please log in".to_string(),
            })
        }
    };

    let claims = sessions.decode(token).map_err(|err| {
        log::debug!("rejecting undecodable session token: {}", err);
        Error::InvalidSession {
            message: "Session token is invalid, please log in again".to_string(),
        }
    })?;

    if claims.is_expired(now) {
        return Err(Error::SessionExpired {
            message: "Session has expired, please log in again".to_string(),
        });
    }

    if !accepted.contains(&claims.role) {
        return Err(Error::Forbidden {
            message: format!("Role `{}` may not access this resource", claims.role),
        });
    }

    Ok(Principal {
        subject_id: claims.id,
        role: claims.role,
        expires_at: claims.expires_at(),
        session_id: claims.sid,
    })
}

/// Extractor that only yields when the request carries a live session whose
/// role is in `R::ROLES` and whose subject still has a person record. On
/// failure the handler never runs.
pub struct Authorized<R> {
    pub principal: Principal,
    record: Document,
    roles: PhantomData<R>,
}

impl<R> Authorized<R> {
    /// The caller's person record, resolved when the request was admitted.
    pub fn own_record<T: Resource>(&self) -> Result<Record<T>, Error> {
        if self.record.collection != T::COLLECTION {
            return Err(Error::internal(
                "RoleMismatch",
                format!(
                    "session record lives in {}, not {}",
                    self.record.collection,
                    T::COLLECTION
                ),
            ));
        }
        Record::from_document(self.record.clone())
    }
}

#[async_trait]
impl<B, R> FromRequest<B> for Authorized<R>
where
    B: Send,
    R: AcceptedRoles,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let state = req
            .extensions()
            .get::<AppState>()
            .cloned()
            .ok_or_else(|| Error::internal("ConfigError", "application state is not installed"))?;
        let cookie = req.headers().typed_get::<Cookie>();
        let token = cookie
            .as_ref()
            .and_then(|cookie| cookie.get(&state.sessions.cookie_name));

        let principal = ensure_authenticated(token, R::ROLES, &state.sessions, Utc::now())?;
        let record = principal.own_document(&state.store).await?;
        log::debug!(
            "session {} admitted {} {}",
            principal.session_id,
            principal.role,
            principal.subject_id
        );
        Ok(Self {
            principal,
            record,
            roles: PhantomData,
        })
    }
}

pub fn hash_password(password: &str) -> Result<String, Error> {
    Ok(Pbkdf2
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))?
        .to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, Error> {
    let hash = PasswordHash::new(password_hash).map_err(Error::from)?;
    Ok(Pbkdf2.verify_password(password.as_bytes(), &hash).is_ok())
}

fn bad_login() -> Error {
    Error::AuthenticationFailure {
        message: "Invalid username or password".to_string(),
    }
}

async fn credential_for(
    store: &Store,
    subject_id: Uuid,
    role: Role,
) -> Result<Option<Record<Credential>>, Error> {
    let docs = store
        .find_by_field(Credential::COLLECTION, "subject_id", &subject_id.to_string())
        .await?;
    let credentials = Record::<Credential>::from_documents(docs)?;
    Ok(credentials.into_iter().find(|c| c.data.role == role))
}

/// Stores (or replaces) the login secret of a person record.
pub async fn store_credential(
    store: &Store,
    subject_id: Uuid,
    role: Role,
    password: &str,
) -> Result<(), Error> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(Error::invalid(format!(
            "`password` must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let credential = Credential {
        subject_id,
        role,
        password_hash: hash_password(password)?,
    };
    let body = serde_json::to_value(&credential)?;
    match credential_for(store, subject_id, role).await? {
        Some(existing) => {
            store
                .update(Credential::COLLECTION, existing.id, body)
                .await?;
        }
        None => {
            store.insert(Credential::COLLECTION, body).await?;
        }
    }
    Ok(())
}

pub async fn login(
    Extension(state): Extension<AppState>,
    JsonBody(login): JsonBody<Login>,
) -> Result<(HeaderMap, Json<Success<LoggedIn>>), Error> {
    if login.username.trim().is_empty() {
        return Err(Error::invalid("`username` parameter was empty"));
    }
    if login.password.is_empty() {
        return Err(Error::invalid("`password` parameter was empty"));
    }

    let person = state
        .store
        .find_by_field(login.role.collection(), "username", login.username.trim())
        .await?
        .into_iter()
        .next()
        .ok_or_else(bad_login)?;

    let credential = credential_for(&state.store, person.id, login.role)
        .await?
        .ok_or_else(bad_login)?;
    if !verify_password(&login.password, &credential.data.password_hash)? {
        return Err(bad_login());
    }

    let (token, claims) = state.sessions.issue(person.id, login.role, Utc::now())?;
    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        HeaderValue::from_str(&state.sessions.set_cookie(&token))?,
    );
    log::info!(
        "{} {} logged in, session {}",
        login.role,
        person.id,
        claims.sid
    );

    Ok((
        headers,
        Json(Success::of(LoggedIn {
            subject_id: person.id,
            role: login.role,
            expires_at: claims.expires_at(),
        })),
    ))
}

pub async fn logout(
    Extension(state): Extension<AppState>,
) -> Result<(HeaderMap, Json<Success<LoggedOut>>), Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        HeaderValue::from_str(&state.sessions.clear_cookie())?,
    );
    Ok((headers, Json(Success::of(LoggedOut { logged_out: true }))))
}

pub async fn me(auth: Authorized<AnyRole>) -> Payload<Principal> {
    proceeds(auth.principal)
}

pub async fn set_credential(
    _auth: Authorized<AdminOnly>,
    Extension(state): Extension<AppState>,
    JsonBody(body): JsonBody<SetCredential>,
) -> Payload<CredentialSet> {
    if state
        .store
        .get(body.role.collection(), body.subject_id)
        .await?
        .is_none()
    {
        return Err(Error::not_found(format!(
            "No {} with id `{}`",
            body.role, body.subject_id
        )));
    }
    store_credential(&state.store, body.subject_id, body.role, &body.password).await?;
    proceeds(CredentialSet {
        subject_id: body.subject_id,
        role: body.role,
    })
}

/// Creates the first admin account when none exists yet.
pub async fn bootstrap_admin(
    store: &Store,
    username: &str,
    password: &str,
) -> Result<bool, Error> {
    if store.count(Admin::COLLECTION).await? > 0 {
        return Ok(false);
    }
    let mut admin = Admin {
        username: username.to_string(),
        name: username.to_string(),
    };
    admin.validate()?;
    let doc = store
        .insert(Admin::COLLECTION, serde_json::to_value(&admin)?)
        .await?;
    store_credential(store, doc.id, Role::Admin, password).await?;
    log::info!("created bootstrap admin `{}`", admin.username);
    Ok(true)
}

#[derive(Debug, Clone, Deserialize)]
pub struct Login {
    pub username: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggedIn {
    pub subject_id: Uuid,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggedOut {
    pub logged_out: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetCredential {
    pub subject_id: Uuid,
    pub role: Role,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CredentialSet {
    pub subject_id: Uuid,
    pub role: Role,
}
