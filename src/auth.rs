//! Trusted-identity extraction.
//!
//! This service sits behind an authenticating proxy that verifies the user
//! and injects the `x-authenticated-user` header. The header is trusted
//! outright; no token signature is verified here. Deployments must therefore
//! make sure the header cannot be set by the outside world.

use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};

use crate::config::Config;
use crate::error::ApiError;

pub const IDENTITY_HEADER: &str = "x-authenticated-user";

/// The authenticated user, as asserted by upstream infrastructure.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
}

fn identity_from_request(req: &HttpRequest) -> Option<Identity> {
    let header = req
        .headers()
        .get(IDENTITY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    if let Some(user_id) = header {
        return Some(Identity { user_id });
    }

    // Development fallback, mirroring the upstream proxy being absent locally.
    req.app_data::<web::Data<Config>>()
        .and_then(|cfg| cfg.dev_user_id.clone())
        .map(|user_id| Identity { user_id })
}

impl FromRequest for Identity {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(identity_from_request(req).ok_or_else(|| {
            ApiError::Unauthorized("Unauthorized: no authenticated user identity".to_string())
        }))
    }
}
