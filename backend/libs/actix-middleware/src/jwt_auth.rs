use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::StatusCode,
    web, Error, HttpMessage, HttpResponse, ResponseError,
};
use futures::future::{ready, Ready};
use jsonwebtoken::{decode, errors::Error as JwtError, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

/// Why a request was refused a session
///
/// Rendered as a 401 with the JSON body `{"error": "...", "code": 401}`.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("missing session token")]
    MissingToken,

    #[error("invalid Authorization header format")]
    MalformedHeader,

    #[error("invalid session: {0}")]
    Invalid(String),

    #[error("invalid session: missing subject")]
    MissingSubject,

    #[error("user not authenticated")]
    NotAuthenticated,
}

impl ResponseError for SessionError {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::Unauthorized().json(json!({
            "error": self.to_string(),
            "code": StatusCode::UNAUTHORIZED.as_u16(),
        }))
    }
}

/// User ID extracted from the session token
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(pub String);

/// Session token claims issued by the web app's auth layer
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    /// Subject (user id)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Key material used to validate session tokens.
///
/// Sessions are HS256 tokens signed with the shared session secret.
pub struct SessionKeys {
    decoding: DecodingKey,
    validation: Validation,
}

impl SessionKeys {
    pub fn from_secret(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn validate(&self, token: &str) -> Result<SessionClaims, JwtError> {
        decode::<SessionClaims>(token, &self.decoding, &self.validation).map(|data| data.claims)
    }
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Pull the session token from the `Authorization` header, falling back to
/// the `token` query parameter for `EventSource` clients that cannot set headers.
fn extract_token(req: &ServiceRequest) -> Result<String, SessionError> {
    if let Some(header) = req.headers().get("Authorization") {
        let value = header
            .to_str()
            .map_err(|_| SessionError::MalformedHeader)?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or(SessionError::MalformedHeader)?;
        return Ok(token.to_string());
    }

    web::Query::<TokenQuery>::from_query(req.query_string())
        .ok()
        .and_then(|query| query.into_inner().token)
        .filter(|token| !token.is_empty())
        .ok_or(SessionError::MissingToken)
}

/// Session Authentication Middleware
pub struct JwtAuthMiddleware {
    keys: Arc<SessionKeys>,
}

impl JwtAuthMiddleware {
    pub fn new(keys: Arc<SessionKeys>) -> Self {
        Self { keys }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = JwtAuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddlewareService {
            service: Rc::new(service),
            keys: self.keys.clone(),
        }))
    }
}

pub struct JwtAuthMiddlewareService<S> {
    service: Rc<S>,
    keys: Arc<SessionKeys>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let keys = self.keys.clone();

        Box::pin(async move {
            let user_id = match authenticate(&req, &keys) {
                Ok(user_id) => user_id,
                Err(e) => return Ok(req.error_response(e).map_into_right_body()),
            };

            req.extensions_mut().insert(user_id);

            service
                .call(req)
                .await
                .map(ServiceResponse::map_into_left_body)
        })
    }
}

fn authenticate(req: &ServiceRequest, keys: &SessionKeys) -> Result<UserId, SessionError> {
    let token = extract_token(req)?;

    let claims = keys.validate(&token).map_err(|e| {
        tracing::warn!("Session validation failed: {}", e);
        SessionError::Invalid(e.to_string())
    })?;

    if claims.sub.trim().is_empty() {
        return Err(SessionError::MissingSubject);
    }

    Ok(UserId(claims.sub))
}

/// FromRequest implementation for UserId
impl actix_web::FromRequest for UserId {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(
        req: &actix_web::HttpRequest,
        _payload: &mut actix_web::dev::Payload,
    ) -> Self::Future {
        match req.extensions().get::<UserId>() {
            Some(user_id) => ready(Ok(user_id.clone())),
            None => ready(Err(SessionError::NotAuthenticated.into())),
        }
    }
}
