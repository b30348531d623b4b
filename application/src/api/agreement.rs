//! [`Agreement`]-related REST API definitions.

use common::datetime::serde::rfc3339;
use derive_more::Debug;
use serde::{Deserialize, Serialize};
use service::{
    domain::{self, agreement, audit, lease, user},
    read,
};

/// Rental agreement.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Agreement {
    /// ID of this [`Agreement`].
    pub id: agreement::Id,

    /// ID of the lease this [`Agreement`] belongs to.
    pub lease_id: lease::Id,

    /// Status of this [`Agreement`].
    pub status: String,

    /// Hash of the current document.
    pub document_hash: String,

    /// Version of the current document.
    pub current_version: i32,

    /// Indicator whether the landlord signed this [`Agreement`].
    pub landlord_signed: bool,

    /// [`DateTime`] when the landlord signed.
    ///
    /// [`DateTime`]: common::DateTime
    #[serde(serialize_with = "rfc3339::option::serialize")]
    pub landlord_signed_at: Option<agreement::SigningDateTime>,

    /// Indicator whether the tenant signed this [`Agreement`].
    pub tenant_signed: bool,

    /// [`DateTime`] when the tenant signed.
    ///
    /// [`DateTime`]: common::DateTime
    #[serde(serialize_with = "rfc3339::option::serialize")]
    pub tenant_signed_at: Option<agreement::SigningDateTime>,

    /// Location of the rendered PDF, if any.
    pub pdf_url: Option<String>,

    /// When the current document was rendered.
    #[serde(serialize_with = "rfc3339::serialize")]
    pub generated_at: agreement::GenerationDateTime,

    /// Signing deadline, once initiated.
    #[serde(serialize_with = "rfc3339::option::serialize")]
    pub expires_at: Option<agreement::ExpirationDateTime>,

    /// When both parties have signed.
    #[serde(serialize_with = "rfc3339::option::serialize")]
    pub completed_at: Option<agreement::CompletionDateTime>,

    /// When the landlord cancelled.
    #[serde(serialize_with = "rfc3339::option::serialize")]
    pub cancelled_at: Option<agreement::CancellationDateTime>,

    /// Reason of the cancellation, if cancelled.
    pub cancel_reason: Option<String>,
}

impl From<domain::Agreement> for Agreement {
    fn from(agreement: domain::Agreement) -> Self {
        let domain::Agreement {
            id,
            lease_id,
            status,
            document_hash,
            current_version,
            landlord_signature,
            tenant_signature,
            pdf_url,
            generated_at,
            expires_at,
            completed_at,
            cancellation,
        } = agreement;

        Self {
            id,
            lease_id,
            status: status.to_string(),
            document_hash: document_hash.to_string(),
            current_version: current_version.into(),
            landlord_signed: landlord_signature.is_some(),
            landlord_signed_at: landlord_signature.map(|e| e.signed_at),
            tenant_signed: tenant_signature.is_some(),
            tenant_signed_at: tenant_signature.map(|e| e.signed_at),
            pdf_url: pdf_url.map(|url| url.to_string()),
            generated_at,
            expires_at,
            completed_at,
            cancelled_at: cancellation.as_ref().map(|c| c.at),
            cancel_reason: cancellation.map(|c| c.reason.to_string()),
        }
    }
}

/// [`Agreement`] as seen by the authenticated party.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    /// Viewed [`Agreement`].
    #[serde(flatten)]
    pub agreement: Agreement,

    /// Role of the authenticated party (`LANDLORD` or `TENANT`).
    pub role: String,

    /// Indicator whether the authenticated party may sign right now.
    pub can_sign: bool,
}

impl From<read::agreement::View> for View {
    fn from(view: read::agreement::View) -> Self {
        let read::agreement::View {
            agreement,
            lease: _,
            role,
            can_sign,
        } = view;
        Self {
            agreement: agreement.into(),
            role: role.to_string(),
            can_sign,
        }
    }
}

/// Public integrity summary of an [`Agreement`].
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    /// ID of the verified [`Agreement`].
    pub agreement_id: agreement::Id,

    /// Effective status of the [`Agreement`].
    pub status: String,

    /// Version of the current document.
    pub version: i32,

    /// Truncated hash of the current document.
    pub document_hash: String,

    /// Indicator whether the landlord signed.
    pub landlord_signed: bool,

    /// When the landlord signed.
    #[serde(serialize_with = "rfc3339::option::serialize")]
    pub landlord_signed_at: Option<agreement::SigningDateTime>,

    /// Truncated hash of the landlord signature.
    pub landlord_sign_hash: Option<String>,

    /// Indicator whether the tenant signed.
    pub tenant_signed: bool,

    /// When the tenant signed.
    #[serde(serialize_with = "rfc3339::option::serialize")]
    pub tenant_signed_at: Option<agreement::SigningDateTime>,

    /// Truncated hash of the tenant signature.
    pub tenant_sign_hash: Option<String>,

    /// When both parties have signed.
    #[serde(serialize_with = "rfc3339::option::serialize")]
    pub completed_at: Option<agreement::CompletionDateTime>,

    /// Indicator whether the stored state of the [`Agreement`] is
    /// consistent.
    pub is_valid: bool,
}

impl From<read::agreement::Verification> for Verification {
    fn from(v: read::agreement::Verification) -> Self {
        let (landlord_signed_at, landlord_sign_hash) = v
            .landlord
            .map(|s| (s.signed_at, s.hash))
            .unzip();
        let (tenant_signed_at, tenant_sign_hash) =
            v.tenant.map(|s| (s.signed_at, s.hash)).unzip();

        Self {
            agreement_id: v.agreement_id,
            status: v.status.to_string(),
            version: v.version.into(),
            document_hash: v.document_hash,
            landlord_signed: landlord_signed_at.is_some(),
            landlord_signed_at,
            landlord_sign_hash,
            tenant_signed: tenant_signed_at.is_some(),
            tenant_signed_at,
            tenant_sign_hash,
            completed_at: v.completed_at,
            is_valid: v.is_valid,
        }
    }
}

/// Entry of an [`Agreement`] audit trail.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// ID of this [`AuditEntry`].
    pub id: audit::Id,

    /// ID of the [`Agreement`] this [`AuditEntry`] is about.
    pub agreement_id: agreement::Id,

    /// ID of the user who performed the action, or `null` for system
    /// actions.
    pub actor_id: Option<user::Id>,

    /// Recorded action.
    pub action: String,

    /// Details of the action.
    pub metadata: audit::Metadata,

    /// When the action was recorded.
    #[serde(serialize_with = "rfc3339::serialize")]
    pub created_at: audit::RecordDateTime,
}

impl From<audit::Entry> for AuditEntry {
    fn from(entry: audit::Entry) -> Self {
        let audit::Entry {
            id,
            agreement_id,
            actor_id,
            action,
            metadata,
            recorded_at,
        } = entry;
        Self {
            id,
            agreement_id,
            actor_id,
            action: action.to_string(),
            metadata,
            created_at: recorded_at,
        }
    }
}

/// Body of an initiation request.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    /// Number of days given to sign.
    pub expires_in_days: Option<i64>,
}

/// Body of a signing request.
///
/// Parsed leniently: a field of unexpected type is treated as absent, so that
/// the signing workflow decides on its validity after the access checks.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignRequest {
    /// Signature payload (typed name or drawn signature data URL).
    #[debug(skip)]
    #[serde(deserialize_with = "lenient::string")]
    pub signature: String,

    /// Explicit consent to sign electronically.
    #[serde(deserialize_with = "lenient::flag")]
    pub confirmed: bool,
}

impl SignRequest {
    /// Parses a [`SignRequest`] from the provided raw request `body`.
    ///
    /// A `body` which is not a JSON object results in an empty
    /// [`SignRequest`].
    #[must_use]
    pub fn from_body(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_else(|e| {
            tracing::debug!("unparseable signing request body: {e}");
            Self::default()
        })
    }
}

/// Body of a cancellation request.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct CancelRequest {
    /// Reason of the cancellation.
    pub reason: String,
}

/// Lenient deserializers of request fields.
mod lenient {
    use serde::{Deserialize as _, Deserializer};
    use serde_json::Value;

    /// Deserializes a [`String`], treating any non-string value as a blank
    /// one.
    pub(super) fn string<'de, D>(d: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => s,
            Value::Null
            | Value::Bool(_)
            | Value::Number(_)
            | Value::Array(_)
            | Value::Object(_) => String::new(),
        })
    }

    /// Deserializes a flag, which is raised by a JSON `true` only.
    pub(super) fn flag<'de, D>(d: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(matches!(Value::deserialize(d)?, Value::Bool(true)))
    }
}
