//! [`Agreement`] read models definitions.

use common::DateTime;

use crate::domain::{
    agreement::{self, Role, Status},
    Agreement, Lease,
};

/// [`Agreement`] as seen by one of its parties.
#[derive(Clone, Debug)]
pub struct View {
    /// Viewed [`Agreement`] with its passive expiration already applied.
    pub agreement: Agreement,

    /// [`Lease`] the [`Agreement`] belongs to.
    pub lease: Lease,

    /// [`Role`] of the viewer.
    pub role: Role,

    /// Indicator whether the viewer may sign the [`Agreement`] right now.
    pub can_sign: bool,
}

impl View {
    /// Creates a new [`View`] of the provided [`Agreement`] by the party
    /// playing the provided [`Role`].
    #[must_use]
    pub fn new(
        agreement: Agreement,
        lease: Lease,
        role: Role,
        now: DateTime,
    ) -> Self {
        Self {
            can_sign: agreement.can_sign(role, now),
            agreement,
            lease,
            role,
        }
    }
}

/// Public integrity summary of an [`Agreement`].
///
/// Discloses truncated hashes only.
#[derive(Clone, Debug)]
pub struct Verification {
    /// ID of the verified [`Agreement`].
    pub agreement_id: agreement::Id,

    /// Effective [`Status`] of the [`Agreement`].
    pub status: Status,

    /// Current [`agreement::Version`] of the [`Agreement`] document.
    pub version: agreement::Version,

    /// Truncated [`agreement::DocumentHash`].
    pub document_hash: String,

    /// Landlord [`SignatureSummary`], if signed.
    pub landlord: Option<SignatureSummary>,

    /// Tenant [`SignatureSummary`], if signed.
    pub tenant: Option<SignatureSummary>,

    /// [`DateTime`] when the [`Agreement`] was completed.
    pub completed_at: Option<agreement::CompletionDateTime>,

    /// Indicator whether the stored state of the [`Agreement`] is
    /// consistent.
    pub is_valid: bool,
}

impl Verification {
    /// Summarizes the provided [`Agreement`] at the provided moment.
    #[must_use]
    pub fn new(agreement: &Agreement, now: DateTime) -> Self {
        let summary = |role| {
            agreement.evidence(role).map(|e| SignatureSummary {
                signed_at: e.signed_at,
                hash: e.hash.truncated(),
            })
        };
        Self {
            agreement_id: agreement.id,
            status: agreement.status_at(now),
            version: agreement.current_version,
            document_hash: agreement.document_hash.truncated(),
            landlord: summary(Role::Landlord),
            tenant: summary(Role::Tenant),
            completed_at: agreement.completed_at,
            is_valid: agreement.is_consistent(),
        }
    }
}

/// Public summary of a party signature.
#[derive(Clone, Debug)]
pub struct SignatureSummary {
    /// [`DateTime`] when the party signed.
    pub signed_at: agreement::SigningDateTime,

    /// Truncated [`agreement::SignHash`].
    pub hash: String,
}
