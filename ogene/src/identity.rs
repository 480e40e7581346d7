use std::error::Error;
use std::fmt::Display;

use axum::body::Body;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use time::Duration;
use uuid::Uuid;

use crate::api::ApiError;

pub const SESSION_COOKIE: &str = "session";

const SESSION_TTL_DAYS: i64 = 365;

/// Validate that an identity is the correct shape

#[derive(Clone, Debug, PartialEq)]
pub enum InvalidIdentityReason {
    WrongLength,
    MissingHyphen,
    NotLowercaseHex,
    WrongVersion,
    WrongVariant,
}

impl InvalidIdentityReason {
    pub fn reason(&self) -> &str {
        match *self {
            Self::WrongLength => "wrong_length",
            Self::MissingHyphen => "missing_hyphen",
            Self::NotLowercaseHex => "not_lowercase_hex",
            Self::WrongVersion => "wrong_version",
            Self::WrongVariant => "wrong_variant",
        }
    }
}

impl Display for InvalidIdentityReason {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

impl Error for InvalidIdentityReason {
    fn description(&self) -> &str {
        self.reason()
    }
}

/// Check that a raw credential is a canonical UUID-v4 string:
/// lowercase hex, hyphens at 8/13/18/23, version nibble 4, variant 8..b.
/// A well-shaped value may still be one we never issued; we accept that.
pub fn validate_identity(raw: &str) -> Result<(), InvalidIdentityReason> {
    let bytes = raw.as_bytes();

    if bytes.len() != 36 {
        return Err(InvalidIdentityReason::WrongLength);
    }

    for (i, b) in bytes.iter().enumerate() {
        if matches!(i, 8 | 13 | 18 | 23) {
            if *b != b'-' {
                return Err(InvalidIdentityReason::MissingHyphen);
            }
        } else if !matches!(*b, b'0'..=b'9' | b'a'..=b'f') {
            return Err(InvalidIdentityReason::NotLowercaseHex);
        }
    }

    if bytes[14] != b'4' {
        return Err(InvalidIdentityReason::WrongVersion);
    }

    if !matches!(bytes[19], b'8' | b'9' | b'a' | b'b') {
        return Err(InvalidIdentityReason::WrongVariant);
    }

    Ok(())
}

/// Opaque anonymous per-client identity. One per browser, shared across
/// every event that client joins. Collisions between independently
/// generated values are accepted as negligible and never checked.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn generate() -> Identity {
        Identity(Uuid::new_v4().to_string())
    }

    pub fn parse(raw: &str) -> Result<Identity, InvalidIdentityReason> {
        validate_identity(raw)?;
        Ok(Identity(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Middleware attached to every route. First contact gets a fresh identity
/// in a year-long cookie; returning clients must present a well-shaped one
/// or the request is rejected before any handler runs.
pub async fn attach_identity(
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Result<(CookieJar, Response), ApiError> {
    let presented = jar.get(SESSION_COOKIE).map(|c| c.value().to_owned());

    let (jar, identity) = match presented {
        Some(raw) => (jar, Identity::parse(&raw)?),
        None => {
            let identity = Identity::generate();
            let cookie = Cookie::build((SESSION_COOKIE, identity.to_string()))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .max_age(Duration::days(SESSION_TTL_DAYS))
                .build();
            (jar.add(cookie), identity)
        }
    };

    request.extensions_mut().insert(identity);

    Ok((jar, next.run(request).await))
}
