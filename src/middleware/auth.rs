use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::{Error, FromRequest, HttpRequest};

use crate::services::git_platforms::Credential;

/// The GitHub credential a caller sent along, if any.
///
/// Read from `Authorization: Bearer <token>` (GitHub's older `token <token>`
/// scheme is accepted too). Anything else counts as anonymous.
pub struct CallerCredential(pub Credential);

impl FromRequest for CallerCredential {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(CallerCredential(extract_credential(req))))
    }
}

pub fn extract_credential(req: &HttpRequest) -> Credential {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|value| {
            let (scheme, token) = value.trim().split_once(' ')?;
            if scheme.eq_ignore_ascii_case("bearer") || scheme.eq_ignore_ascii_case("token") {
                Some(token)
            } else {
                None
            }
        });

    Credential::from_token(token)
}
