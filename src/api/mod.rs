//! HTTP gateway exposing the contract in the ledger's invoke/query style.

use rocket::{
    request::{FromRequest, Outcome},
    Request, Route,
};

use crate::contract::Caller;

mod invoke;
mod query;

/// Header carrying the caller's identity.
pub const CALLER_HEADER: &str = "X-Caller-Id";

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(invoke::routes());
    routes.extend(query::routes());
    routes
}

/// Take the caller from [`CALLER_HEADER`], falling back to anonymous.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for Caller {
    type Error = std::convert::Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let caller = match req.headers().get_one(CALLER_HEADER).map(str::trim) {
            Some(id) if !id.is_empty() => Caller::new(id),
            _ => Caller::anonymous(),
        };
        Outcome::Success(caller)
    }
}
