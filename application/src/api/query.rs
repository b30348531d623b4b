//! REST API handlers reading [`Agreement`]s.

use axum::Extension;
use serde_json::{json, Value};
use service::{
    command::expire_agreement,
    domain::{agreement, lease},
    query::{self, Query as _},
};

use crate::{
    api::{
        agreement::{AuditEntry, Verification, View},
        AccessError, Data, NotFoundError, Path,
    },
    AsError, Error, Service, Session,
};

#[cfg(doc)]
use super::Agreement;

/// Reports the liveness of the server.
#[expect(
    clippy::unused_async,
    reason = "`async` is required to match signature"
)]
pub(super) async fn health() -> Data<Value> {
    Data(json!({ "status": "ok" }))
}

/// Returns the [`View`] of the [`Agreement`] with the provided ID.
#[tracing::instrument(skip(service))]
pub(super) async fn agreement(
    Extension(service): Extension<Service>,
    session: Session,
    Path(id): Path<agreement::Id>,
) -> Result<Data<View>, Error> {
    service
        .execute(query::agreement::ById {
            agreement_id: id,
            viewer_id: session.user_id,
        })
        .await
        .map(|v| Data(v.into()))
        .map_err(AsError::into_error)
}

/// Returns the [`View`] of the [`Agreement`] of the lease with the provided
/// ID.
#[tracing::instrument(skip(service))]
pub(super) async fn lease_agreement(
    Extension(service): Extension<Service>,
    session: Session,
    Path(lease_id): Path<lease::Id>,
) -> Result<Data<View>, Error> {
    service
        .execute(query::agreement::ByLease {
            lease_id,
            viewer_id: session.user_id,
        })
        .await
        .map(|v| Data(v.into()))
        .map_err(AsError::into_error)
}

/// Publicly verifies the integrity of the [`Agreement`] with the provided
/// ID.
#[tracing::instrument(skip(service))]
pub(super) async fn verify(
    Extension(service): Extension<Service>,
    Path(id): Path<agreement::Id>,
) -> Result<Data<Verification>, Error> {
    service
        .execute(query::agreement::Verify { agreement_id: id })
        .await
        .map(|v| Data(v.into()))
        .map_err(AsError::into_error)
}

/// Returns the audit trail of the [`Agreement`] with the provided ID, oldest
/// entry first.
#[tracing::instrument(skip(service))]
pub(super) async fn audit_trail(
    Extension(service): Extension<Service>,
    session: Session,
    Path(id): Path<agreement::Id>,
) -> Result<Data<Vec<AuditEntry>>, Error> {
    service
        .execute(query::agreement::AuditTrail {
            agreement_id: id,
            viewer_id: session.user_id,
        })
        .await
        .map(|entries| Data(entries.into_iter().map(Into::into).collect()))
        .map_err(AsError::into_error)
}

impl AsError for query::agreement::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        Some(match self {
            Self::AgreementNotExists(_) => NotFoundError::Agreement.into(),
            Self::Db(e) => return e.try_as_error(),
            Self::Expire(e) => return e.try_as_error(),
            Self::LeaseAgreementNotExists(_) => {
                NotFoundError::LeaseAgreement.into()
            }
            Self::LeaseNotExists(_) => return None,
            Self::NotParty(_) => AccessError::NotParty.into(),
        })
    }
}

impl AsError for expire_agreement::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::AgreementNotExists(_) => {
                Some(NotFoundError::Agreement.into())
            }
            Self::Db(e) => e.try_as_error(),
        }
    }
}
