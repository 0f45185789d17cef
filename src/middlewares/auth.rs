use crate::config::AuthConfig;
use crate::error::AppError;
use actix_web::http::Method;
use actix_web::{
    Error,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};

struct PublicPaths {
    exact_paths: Vec<&'static str>,
    prefix_paths: Vec<&'static str>,
}

impl PublicPaths {
    fn new() -> Self {
        Self {
            exact_paths: vec!["/swagger-ui", "/swagger-ui/", "/api-docs/openapi.json"],
            prefix_paths: vec![
                "/swagger-ui/",
                "/api-docs/",
                "/webhook/",
                "/api/v1/events/",
                "/api/v1/registrations/",
            ],
        }
    }

    fn is_public_path(&self, path: &str) -> bool {
        if self.exact_paths.contains(&path) {
            return true;
        }
        self.prefix_paths
            .iter()
            .any(|&prefix| path.starts_with(prefix))
    }
}

/// Which shared secret a protected path expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyKind {
    Cron,
    Admin,
}

impl KeyKind {
    fn for_path(path: &str) -> Self {
        if path.starts_with("/cron/") || path == "/cron" {
            KeyKind::Cron
        } else {
            KeyKind::Admin
        }
    }
}

/// Bearer API-key check. Admin routes take `auth.admin_api_key`, cron
/// triggers take `auth.cron_secret`; an unset key locks the route.
pub struct ApiKeyMiddleware {
    auth: AuthConfig,
}

impl ApiKeyMiddleware {
    pub fn new(auth: AuthConfig) -> Self {
        Self { auth }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiKeyMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = ApiKeyMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiKeyMiddlewareService {
            service,
            auth: self.auth.clone(),
            public_paths: PublicPaths::new(),
        }))
    }
}

pub struct ApiKeyMiddlewareService<S> {
    service: S,
    auth: AuthConfig,
    public_paths: PublicPaths,
}

impl<S> ApiKeyMiddlewareService<S> {
    fn expected_key(&self, kind: KeyKind) -> &str {
        match kind {
            KeyKind::Cron => &self.auth.cron_secret,
            KeyKind::Admin => &self.auth.admin_api_key,
        }
    }
}

impl<S, B> Service<ServiceRequest> for ApiKeyMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // CORS preflight
        if req.method() == Method::OPTIONS {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        let path = req.path();
        if self.public_paths.is_public_path(path) {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        let kind = KeyKind::for_path(path);
        let expected = self.expected_key(kind);

        let token = req
            .headers()
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);

        match token {
            Some(token) if !expected.is_empty() && token == expected => {
                let fut = self.service.call(req);
                Box::pin(fut)
            }
            Some(_) => {
                log::warn!("Rejected {kind:?} key for {path}");
                let error = AppError::AuthError("Invalid API key".to_string());
                Box::pin(async move { Err(error.into()) })
            }
            None => {
                let error = AppError::AuthError("Missing API key".to_string());
                Box::pin(async move { Err(error.into()) })
            }
        }
    }
}
