//! REST API handlers changing [`Agreement`]s.

use std::net::IpAddr;

use axum::{body::Bytes, Extension};
use service::{
    command::{self, Command as _},
    domain::{
        agreement::{self, Role},
        lease,
    },
};

use crate::{
    api::{
        agreement::{CancelRequest, InitiateRequest, SignRequest},
        AccessError, Agreement, ClientIp, Data, Json, NotFoundError, Path,
        StateError,
    },
    define_error, AsError, Error, Service, Session,
};

/// Creates a new draft [`Agreement`] of the lease with the provided ID.
#[tracing::instrument(skip(service))]
pub(super) async fn create(
    Extension(service): Extension<Service>,
    session: Session,
    Path(lease_id): Path<lease::Id>,
) -> Result<(http::StatusCode, Data<Agreement>), Error> {
    service
        .execute(command::CreateAgreement {
            lease_id,
            initiator_id: session.user_id,
        })
        .await
        .map(|a| (http::StatusCode::CREATED, Data(a.into())))
        .map_err(AsError::into_error)
}

/// Starts signing of the [`Agreement`] with the provided ID.
///
/// The request body is optional.
#[tracing::instrument(skip(service, body))]
pub(super) async fn initiate(
    Extension(service): Extension<Service>,
    session: Session,
    Path(id): Path<agreement::Id>,
    body: Bytes,
) -> Result<Data<Agreement>, Error> {
    let InitiateRequest { expires_in_days } = if body.is_empty() {
        InitiateRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| Error::validation(e.to_string()))?
    };

    service
        .execute(command::InitiateAgreement {
            agreement_id: id,
            initiator_id: session.user_id,
            expires_in_days,
        })
        .await
        .map(|a| Data(a.into()))
        .map_err(AsError::into_error)
}

/// Signs the [`Agreement`] with the provided ID as its landlord.
#[tracing::instrument(skip(service, body))]
pub(super) async fn sign_as_landlord(
    Extension(service): Extension<Service>,
    session: Session,
    ClientIp(ip): ClientIp,
    Path(id): Path<agreement::Id>,
    body: Bytes,
) -> Result<Data<Agreement>, Error> {
    let req = SignRequest::from_body(&body);
    sign(&service, session, Role::Landlord, ip, id, req).await
}

/// Signs the [`Agreement`] with the provided ID as its tenant.
#[tracing::instrument(skip(service, body))]
pub(super) async fn sign_as_tenant(
    Extension(service): Extension<Service>,
    session: Session,
    ClientIp(ip): ClientIp,
    Path(id): Path<agreement::Id>,
    body: Bytes,
) -> Result<Data<Agreement>, Error> {
    let req = SignRequest::from_body(&body);
    sign(&service, session, Role::Tenant, ip, id, req).await
}

/// Signs the [`Agreement`] with the provided ID in the provided [`Role`].
///
/// The [`SignRequest`] is validated by the signing workflow itself, after the
/// access and state checks.
async fn sign(
    service: &Service,
    session: Session,
    role: Role,
    ip_address: Option<IpAddr>,
    agreement_id: agreement::Id,
    req: SignRequest,
) -> Result<Data<Agreement>, Error> {
    let SignRequest {
        signature,
        confirmed,
    } = req;

    service
        .execute(command::SignAgreement {
            agreement_id,
            signer_id: session.user_id,
            role,
            signature,
            confirmed,
            ip_address,
        })
        .await
        .map(|a| Data(a.into()))
        .map_err(AsError::into_error)
}

/// Cancels the [`Agreement`] with the provided ID.
#[tracing::instrument(skip(service))]
pub(super) async fn cancel(
    Extension(service): Extension<Service>,
    session: Session,
    Path(id): Path<agreement::Id>,
    Json(req): Json<CancelRequest>,
) -> Result<Data<Agreement>, Error> {
    service
        .execute(command::CancelAgreement {
            agreement_id: id,
            initiator_id: session.user_id,
            reason: req.reason,
        })
        .await
        .map(|a| Data(a.into()))
        .map_err(AsError::into_error)
}

/// Re-renders the document of the draft [`Agreement`] with the provided ID.
#[tracing::instrument(skip(service))]
pub(super) async fn regenerate(
    Extension(service): Extension<Service>,
    session: Session,
    Path(id): Path<agreement::Id>,
) -> Result<Data<Agreement>, Error> {
    service
        .execute(command::RegenerateAgreement {
            agreement_id: id,
            initiator_id: session.user_id,
        })
        .await
        .map(|a| Data(a.into()))
        .map_err(AsError::into_error)
}

define_error! {
    enum LandlordError {
        #[code = "ACCESS_DENIED"]
        #[status = FORBIDDEN]
        #[message = "Only the landlord can create the agreement"]
        Create,

        #[code = "ACCESS_DENIED"]
        #[status = FORBIDDEN]
        #[message = "Only the landlord can initiate the agreement"]
        Initiate,

        #[code = "ACCESS_DENIED"]
        #[status = FORBIDDEN]
        #[message = "Only the landlord can cancel the agreement"]
        Cancel,

        #[code = "ACCESS_DENIED"]
        #[status = FORBIDDEN]
        #[message = "Only the landlord can regenerate the agreement"]
        Regenerate,
    }
}

impl AsError for command::create_agreement::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "INVALID_STATE"]
                #[status = BAD_REQUEST]
                #[message = "Agreement already exists for this lease"]
                AgreementExists,
            }
        }

        Some(match self {
            Self::AgreementExists(_) => Error::AgreementExists.into(),
            Self::Db(e) => return e.try_as_error(),
            Self::LeaseNotExists(_) => NotFoundError::Lease.into(),
            Self::NotLandlord(_) => LandlordError::Create.into(),
            Self::PartyNotExists(_) => return None,
        })
    }
}

impl AsError for command::initiate_agreement::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "VALIDATION_ERROR"]
                #[status = BAD_REQUEST]
                #[message = "Invalid number of days to sign"]
                InvalidExpiresInDays,
            }
        }

        Some(match self {
            Self::AgreementNotExists(_) => NotFoundError::Agreement.into(),
            Self::ConcurrentModification(_) => {
                StateError::ConcurrentModification.into()
            }
            Self::Db(e) => return e.try_as_error(),
            Self::InvalidExpiresInDays(_) => {
                Error::InvalidExpiresInDays.into()
            }
            Self::LeaseNotExists(_) => return None,
            Self::NotLandlord(_) => LandlordError::Initiate.into(),
            Self::NotParty(_) => AccessError::NotParty.into(),
            Self::Transition(e) => return e.try_as_error(),
        })
    }
}

impl AsError for command::sign_agreement::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "VALIDATION_ERROR"]
                #[status = BAD_REQUEST]
                #[message = "Confirmation is required"]
                ConfirmationRequired,

                #[code = "VALIDATION_ERROR"]
                #[status = BAD_REQUEST]
                #[message = "Signature is required"]
                SignatureRequired,

                #[code = "ACCESS_DENIED"]
                #[status = FORBIDDEN]
                #[message = "Only the landlord can sign as landlord"]
                NotLandlord,

                #[code = "ACCESS_DENIED"]
                #[status = FORBIDDEN]
                #[message = "Only the tenant can sign as tenant"]
                NotTenant,
            }
        }

        Some(match self {
            Self::AgreementNotExists(_) => NotFoundError::Agreement.into(),
            Self::ConcurrentModification(_) => {
                StateError::ConcurrentModification.into()
            }
            Self::ConfirmationRequired => Error::ConfirmationRequired.into(),
            Self::Db(e) => return e.try_as_error(),
            Self::LeaseNotExists(_) => return None,
            Self::NotParty(_) => AccessError::NotParty.into(),
            Self::SignatureRequired => Error::SignatureRequired.into(),
            Self::Transition(e) => return e.try_as_error(),
            Self::WrongRole(Role::Landlord) => Error::NotLandlord.into(),
            Self::WrongRole(Role::Tenant) => Error::NotTenant.into(),
        })
    }
}

impl AsError for command::cancel_agreement::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "VALIDATION_ERROR"]
                #[status = BAD_REQUEST]
                #[message = "Cancellation reason is required"]
                ReasonRequired,
            }
        }

        Some(match self {
            Self::AgreementNotExists(_) => NotFoundError::Agreement.into(),
            Self::ConcurrentModification(_) => {
                StateError::ConcurrentModification.into()
            }
            Self::Db(e) => return e.try_as_error(),
            Self::LeaseNotExists(_) => return None,
            Self::NotLandlord(_) => LandlordError::Cancel.into(),
            Self::NotParty(_) => AccessError::NotParty.into(),
            Self::ReasonRequired => Error::ReasonRequired.into(),
            Self::Transition(e) => return e.try_as_error(),
        })
    }
}

impl AsError for command::regenerate_agreement::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        Some(match self {
            Self::AgreementNotExists(_) => NotFoundError::Agreement.into(),
            Self::ConcurrentModification(_) => {
                StateError::ConcurrentModification.into()
            }
            Self::Db(e) => return e.try_as_error(),
            Self::LeaseNotExists(_) | Self::PartyNotExists(_) => return None,
            Self::NotLandlord(_) => LandlordError::Regenerate.into(),
            Self::NotParty(_) => AccessError::NotParty.into(),
            Self::Transition(e) => return e.try_as_error(),
        })
    }
}
