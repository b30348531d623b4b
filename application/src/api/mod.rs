//! REST API definitions.

pub mod agreement;
mod mutation;
mod query;

use std::{convert::Infallible, net::IpAddr};

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use axum_client_ip::InsecureClientIp;
use serde::Serialize;
use service::domain::agreement::TransitionError;

use crate::{define_error, AsError, Error};

pub use self::agreement::Agreement;

/// Builds the [`Router`] of all the REST API routes.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(query::health))
        .route("/api/agreements/:id", get(query::agreement))
        .route("/api/agreements/:id/initiate", post(mutation::initiate))
        .route(
            "/api/agreements/:id/sign/landlord",
            post(mutation::sign_as_landlord),
        )
        .route(
            "/api/agreements/:id/sign/tenant",
            post(mutation::sign_as_tenant),
        )
        .route("/api/agreements/:id/cancel", post(mutation::cancel))
        .route("/api/agreements/:id/regenerate", post(mutation::regenerate))
        .route("/api/agreements/:id/verify", get(query::verify))
        .route("/api/agreements/:id/audit", get(query::audit_trail))
        .route(
            "/api/agreements/lease/:lease_id",
            get(query::lease_agreement).post(mutation::create),
        )
}

/// Successful response of the REST API.
#[derive(Clone, Debug)]
pub struct Data<T>(pub T);

impl<T: Serialize> IntoResponse for Data<T> {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct Envelope<T> {
            success: bool,
            data: T,
        }

        axum::Json(Envelope {
            success: true,
            data: self.0,
        })
        .into_response()
    }
}

/// JSON request body, rejected as a [`Error`].
#[derive(Clone, Copy, Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct Json<T>(pub T);

/// Path parameters of a request, rejected as a [`Error`].
#[derive(Clone, Copy, Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(Error))]
pub struct Path<T>(pub T);

/// IP address of the client performing a request, if known.
#[derive(Clone, Copy, Debug)]
pub struct ClientIp(pub Option<IpAddr>);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        _: &S,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(
            InsecureClientIp::from(&parts.headers, &parts.extensions)
                .ok()
                .map(|ip| ip.0),
        ))
    }
}

define_error! {
    enum NotFoundError {
        #[code = "NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "Agreement not found"]
        Agreement,

        #[code = "NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "Lease not found"]
        Lease,

        #[code = "NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "No agreement found for this lease"]
        LeaseAgreement,
    }
}

define_error! {
    enum AccessError {
        #[code = "ACCESS_DENIED"]
        #[status = FORBIDDEN]
        #[message = "You do not have access to this agreement"]
        NotParty,

        #[code = "ACCESS_DENIED"]
        #[status = FORBIDDEN]
        #[message = "Landlord must sign first"]
        LandlordMustSignFirst,
    }
}

define_error! {
    enum StateError {
        #[code = "INVALID_STATE"]
        #[status = BAD_REQUEST]
        #[message = "Agreement is already finalized"]
        Finalized,

        #[code = "INVALID_STATE"]
        #[status = BAD_REQUEST]
        #[message = "Agreement is not in a valid state for this action"]
        Unexpected,

        #[code = "INVALID_STATE"]
        #[status = BAD_REQUEST]
        #[message = "Agreement was modified concurrently, retry the request"]
        ConcurrentModification,
    }
}

impl AsError for TransitionError {
    fn try_as_error(&self) -> Option<Error> {
        Some(match self {
            Self::Finalized(_) => StateError::Finalized.into(),
            Self::LandlordMustSignFirst => {
                AccessError::LandlordMustSignFirst.into()
            }
            Self::Unexpected(_) => StateError::Unexpected.into(),
        })
    }
}
