use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use argon2::{
    password_hash::{Error as PasswordHashError, PasswordHash, PasswordVerifier},
    Argon2,
};
use axum::{
    body::Body,
    extract::State,
    http::{
        header::{AUTHORIZATION, COOKIE, SET_COOKIE},
        HeaderMap, Request, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::main_lib::AppState;

/// Cookie carrying the session token for browser clients.
pub const SESSION_COOKIE: &str = "tender_session";

const WEB_SUBJECT: &str = "tenderdesk-web";

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: Vec<u8>,
    /// Argon2 PHC string; without it tokens can be verified but not issued by login.
    pub password_hash: Option<String>,
    pub access_token_ttl: Duration,
}

pub struct AuthManager {
    password_hash: Option<String>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_ttl: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No bearer header and no session cookie.
    MissingCredentials,
    /// Token signature is valid but `exp` has passed.
    Expired,
    /// Token could not be parsed or its signature does not match.
    Malformed,
    InvalidCredentials,
    NotConfigured,
    Internal(String),
}

impl AuthError {
    fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "missing",
            AuthError::Expired => "expired",
            AuthError::Malformed => "malformed",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::NotConfigured => "not_configured",
            AuthError::Internal(_) => "internal",
        }
    }
}

#[derive(Serialize)]
struct AuthErrorBody {
    code: u16,
    reason: &'static str,
    message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

/// Identity extracted from a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedSession {
    pub valid: bool,
    pub subject: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatusResponse {
    pub requires_password: bool,
}

impl AuthManager {
    pub fn new(config: &AuthConfig) -> anyhow::Result<Self> {
        if let Some(hash) = &config.password_hash {
            PasswordHash::new(hash)?;
        }
        let encoding_key = EncodingKey::from_secret(&config.jwt_secret);
        let decoding_key = DecodingKey::from_secret(&config.jwt_secret);
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Ok(Self {
            password_hash: config.password_hash.clone(),
            encoding_key,
            decoding_key,
            validation,
            token_ttl: config.access_token_ttl,
        })
    }

    pub fn supports_login(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn verify_password(&self, candidate: &str) -> Result<(), AuthError> {
        let hash = self
            .password_hash
            .as_deref()
            .ok_or(AuthError::NotConfigured)?;
        let parsed = PasswordHash::new(hash).map_err(|e| {
            AuthError::Internal(format!("Invalid password hash configuration: {e}"))
        })?;
        Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .map_err(|err| match err {
                PasswordHashError::Password => AuthError::InvalidCredentials,
                other => AuthError::Internal(format!("Password verification failed: {other}")),
            })
    }

    pub fn issue_token(&self, subject: &str) -> Result<String, AuthError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| AuthError::Internal("System clock is before UNIX_EPOCH".into()))?;
        let exp = now + self.token_ttl;
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.as_secs() as usize,
            exp: exp.as_secs() as usize,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to sign token: {e}")))
    }

    pub fn verify_token(&self, token: &str) -> Result<VerifiedSession, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |err| match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidToken
                | ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::ImmatureSignature
                | ErrorKind::MissingRequiredClaim(_)
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => AuthError::Malformed,
                other => AuthError::Internal(format!("Failed to validate token: {other:?}")),
            },
        )?;

        Ok(VerifiedSession {
            valid: true,
            expires_at: DateTime::<Utc>::from_timestamp(data.claims.exp as i64, 0),
            subject: data.claims.sub,
        })
    }

    pub fn expires_in(&self) -> Duration {
        self.token_ttl
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let reason = self.reason();
        let (status, message) = match self {
            AuthError::MissingCredentials => {
                (StatusCode::UNAUTHORIZED, "Authentication required".to_string())
            }
            AuthError::Expired => (StatusCode::UNAUTHORIZED, "Session expired".to_string()),
            AuthError::Malformed => (StatusCode::UNAUTHORIZED, "Invalid session token".to_string()),
            AuthError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid password".to_string())
            }
            AuthError::NotConfigured => (
                StatusCode::NOT_FOUND,
                "Authentication is not configured for this server".to_string(),
            ),
            AuthError::Internal(msg) => {
                tracing::error!("Authentication failure: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        let body = Json(AuthErrorBody {
            code: status.as_u16(),
            reason,
            message,
        });
        (status, body).into_response()
    }
}

pub fn decode_secret_key(raw: &str) -> anyhow::Result<Vec<u8>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        anyhow::bail!("JWT secret cannot be empty");
    }
    let decoded = match BASE64.decode(trimmed) {
        Ok(bytes) => bytes,
        Err(_) if trimmed.len() == 32 => trimmed.as_bytes().to_vec(),
        Err(_) => {
            anyhow::bail!("JWT secret must be base64 encoded or a 32-byte ASCII string")
        }
    };

    if decoded.len() != 32 {
        anyhow::bail!("JWT secret must decode to exactly 32 bytes");
    }

    Ok(decoded)
}

/// Reads the session token from `Authorization: Bearer` or, failing that, the session cookie.
pub fn extract_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    if let Some(header) = headers.get(AUTHORIZATION) {
        let value = header.to_str().map_err(|_| AuthError::Malformed)?;
        let mut parts = value.splitn(2, ' ');
        let (Some(scheme), Some(token)) = (parts.next(), parts.next()) else {
            return Err(AuthError::Malformed);
        };
        if !scheme.eq_ignore_ascii_case("Bearer") {
            return Err(AuthError::Malformed);
        }
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::Malformed);
        }
        return Ok(token);
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token.trim())
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingCredentials)
}

fn session_cookie(token: &str, max_age: Duration) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        max_age.as_secs()
    )
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, AuthError> {
    let auth = state.auth.as_ref().ok_or(AuthError::NotConfigured)?.clone();
    auth.verify_password(&payload.password)?;
    let token = auth.issue_token(WEB_SUBJECT)?;
    tracing::info!("Issued session token for {}", WEB_SUBJECT);
    let cookie = session_cookie(&token, auth.expires_in());
    let body = Json(LoginResponse {
        access_token: token,
        token_type: "Bearer".to_string(),
        expires_in: auth.expires_in().as_secs(),
    });
    Ok(([(SET_COOKIE, cookie)], body).into_response())
}

pub async fn logout() -> Response {
    let cookie = session_cookie("", Duration::ZERO);
    ([(SET_COOKIE, cookie)], StatusCode::NO_CONTENT).into_response()
}

pub async fn auth_status(State(state): State<Arc<AppState>>) -> Json<AuthStatusResponse> {
    Json(AuthStatusResponse {
        requires_password: state.auth.as_ref().is_some_and(|a| a.supports_login()),
    })
}

#[utoipa::path(get, path = "/api/v1/auth/verify", responses(
    (status = 200, body = VerifiedSession),
    (status = 401, description = "Missing, expired or malformed credentials"),
))]
pub async fn verify(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<VerifiedSession>, AuthError> {
    let auth = state.auth.as_ref().ok_or(AuthError::NotConfigured)?;
    let token = extract_token(&headers)?;
    let session = auth.verify_token(token).inspect_err(|err| {
        tracing::debug!("Session verification failed: {}", err.reason());
    })?;
    Ok(Json(session))
}

pub async fn require_jwt(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let Some(auth) = state.auth.clone() else {
        return Ok(next.run(request).await);
    };

    let session = auth.verify_token(extract_token(request.headers())?)?;
    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn manager() -> AuthManager {
        AuthManager::new(&AuthConfig {
            jwt_secret: vec![7u8; 32],
            password_hash: None,
            access_token_ttl: Duration::from_secs(3600),
        })
        .unwrap()
    }

    fn headers(name: axum::http::HeaderName, value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(name, HeaderValue::from_str(value).unwrap());
        map
    }

    #[test]
    fn issued_token_verifies() {
        let auth = manager();
        let token = auth.issue_token("estimator@example.com").unwrap();
        let session = auth.verify_token(&token).unwrap();
        assert!(session.valid);
        assert_eq!(session.subject, "estimator@example.com");
        assert!(session.expires_at.unwrap() > Utc::now());
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let auth = manager();
        let past = (Utc::now().timestamp() - 7200) as usize;
        let claims = Claims {
            sub: "estimator".into(),
            iat: past - 60,
            exp: past,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&[7u8; 32]),
        )
        .unwrap();
        assert_eq!(auth.verify_token(&token), Err(AuthError::Expired));
    }

    #[test]
    fn garbage_and_foreign_tokens_are_malformed() {
        let auth = manager();
        assert_eq!(auth.verify_token("not-a-jwt"), Err(AuthError::Malformed));

        let foreign = AuthManager::new(&AuthConfig {
            jwt_secret: vec![9u8; 32],
            password_hash: None,
            access_token_ttl: Duration::from_secs(3600),
        })
        .unwrap()
        .issue_token("intruder")
        .unwrap();
        assert_eq!(auth.verify_token(&foreign), Err(AuthError::Malformed));
    }

    #[test]
    fn login_without_password_hash_is_not_configured() {
        assert_eq!(
            manager().verify_password("anything"),
            Err(AuthError::NotConfigured)
        );
    }

    #[test]
    fn extract_prefers_bearer_header() {
        let mut map = headers(AUTHORIZATION, "Bearer abc.def.ghi");
        map.insert(COOKIE, HeaderValue::from_static("tender_session=cookie-token"));
        assert_eq!(extract_token(&map), Ok("abc.def.ghi"));
    }

    #[test]
    fn extract_falls_back_to_cookie() {
        let map = headers(COOKIE, "theme=dark; tender_session=cookie-token; lang=de");
        assert_eq!(extract_token(&map), Ok("cookie-token"));
    }

    #[test]
    fn extract_classifies_failures() {
        assert_eq!(
            extract_token(&HeaderMap::new()),
            Err(AuthError::MissingCredentials)
        );
        assert_eq!(
            extract_token(&headers(AUTHORIZATION, "Basic dXNlcjpwYXNz")),
            Err(AuthError::Malformed)
        );
        assert_eq!(
            extract_token(&headers(AUTHORIZATION, "Bearer   ")),
            Err(AuthError::Malformed)
        );
        assert_eq!(
            extract_token(&headers(COOKIE, "tender_session=")),
            Err(AuthError::MissingCredentials)
        );
    }

    #[test]
    fn decode_secret_accepts_base64_and_ascii() {
        assert_eq!(decode_secret_key(&BASE64.encode([1u8; 32])).unwrap(), vec![1u8; 32]);
        assert_eq!(
            decode_secret_key("!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!").unwrap(),
            vec![b'!'; 32]
        );
        assert!(decode_secret_key("   ").is_err());
        assert!(decode_secret_key("c2hvcnQ=").is_err());
    }
}
