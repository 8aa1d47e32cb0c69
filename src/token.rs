use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::role::Role;

/// Claims carried by the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: Uuid,
    pub role: Role,
    /// Expiry, Unix seconds. The token is dead at and after this instant.
    pub exp: i64,
    /// Random per-login id, so two tokens minted in the same second for the
    /// same subject still differ. Logged alongside every mutation.
    pub sid: String,
}

impl Claims {
    pub fn new(id: Uuid, role: Role, expires_at: DateTime<Utc>) -> Self {
        Self {
            id,
            role,
            exp: expires_at.timestamp(),
            sid: session_id(),
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}

fn session_id() -> String {
    let ssid_bytes: [u8; 32] = thread_rng().gen();

    let mut hasher: Sha256 = Digest::new();
    hasher.update(&ssid_bytes);
    hex::encode(hasher.finalize())
}

/// Signing material and cookie settings for session tokens.
pub struct Sessions {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    pub ttl: Duration,
    pub cookie_name: String,
    pub cookie_secure: bool,
}

impl Sessions {
    pub fn new(secret: &[u8], ttl: Duration, cookie_name: impl Into<String>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // expiry is checked by the guard so it can be told apart from a bad token
        validation.validate_exp = false;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
            cookie_name: cookie_name.into(),
            cookie_secure: false,
        }
    }

    pub fn secure_cookies(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    pub fn issue(
        &self,
        id: Uuid,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<(String, Claims), jsonwebtoken::errors::Error> {
        let claims = Claims::new(id, role, now + self.ttl);
        let token = self.sign(&claims)?;
        Ok((token, claims))
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
    }

    pub fn decode(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
    }

    pub fn set_cookie(&self, token: &str) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.cookie_name,
            token,
            self.ttl.num_seconds()
        );
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    pub fn clear_cookie(&self) -> String {
        let mut cookie = format!(
            "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
            self.cookie_name
        );
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}
