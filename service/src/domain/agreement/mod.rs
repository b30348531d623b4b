//! [`Agreement`] definitions.

mod document;

use std::net::IpAddr;

use common::{define_kind, unit, DateTime, DateTimeOf};
use derive_more::{AsRef, Debug, Display, Error, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use uuid::Uuid;

#[cfg(doc)]
use crate::domain::{Lease, User};
use crate::domain::lease;

pub use self::document::Document;

/// Digital rental agreement of a [`Lease`], signed by the landlord first and
/// by the tenant afterwards.
#[derive(Clone, Debug)]
pub struct Agreement {
    /// ID of this [`Agreement`].
    pub id: Id,

    /// ID of the [`Lease`] this [`Agreement`] belongs to.
    pub lease_id: lease::Id,

    /// Stored [`Status`] of this [`Agreement`].
    ///
    /// Use [`Agreement::status_at()`] to account for the passive expiration.
    pub status: Status,

    /// [`DocumentHash`] of the current [`Document`] version.
    pub document_hash: DocumentHash,

    /// Current [`Version`] of the [`Document`].
    pub current_version: Version,

    /// [`Evidence`] of the landlord signature, if signed.
    pub landlord_signature: Option<Evidence>,

    /// [`Evidence`] of the tenant signature, if signed.
    pub tenant_signature: Option<Evidence>,

    /// Location of the rendered [`Document`], if uploaded.
    pub pdf_url: Option<PdfUrl>,

    /// [`DateTime`] when the current [`Document`] version was generated.
    pub generated_at: GenerationDateTime,

    /// [`DateTime`] after which this [`Agreement`] can no longer be signed.
    ///
    /// Set once the signing is initiated.
    pub expires_at: Option<ExpirationDateTime>,

    /// [`DateTime`] when both parties signed this [`Agreement`].
    pub completed_at: Option<CompletionDateTime>,

    /// [`Cancellation`] of this [`Agreement`], if cancelled.
    pub cancellation: Option<Cancellation>,
}

impl Agreement {
    /// Creates a new [`Status::Draft`] [`Agreement`] of the provided
    /// [`Document`].
    #[must_use]
    pub fn new(lease_id: lease::Id, document: &Document, now: DateTime) -> Self {
        Self {
            id: Id::new(),
            lease_id,
            status: Status::Draft,
            document_hash: document.hash(),
            current_version: document.version(),
            landlord_signature: None,
            tenant_signature: None,
            pdf_url: None,
            generated_at: now.coerce(),
            expires_at: None,
            completed_at: None,
            cancellation: None,
        }
    }

    /// Returns the effective [`Status`] of this [`Agreement`] at the provided
    /// moment.
    ///
    /// A pending [`Agreement`] whose [`ExpirationDateTime`] has passed is
    /// [`Status::Expired`], even if it is not stored as such yet.
    #[must_use]
    pub fn status_at(&self, now: DateTime) -> Status {
        use Status as S;

        let overdue = self.expires_at.is_some_and(|at| now > at.coerce());
        match self.status {
            S::PendingLandlord | S::PendingTenant if overdue => S::Expired,
            S::Draft
            | S::PendingLandlord
            | S::PendingTenant
            | S::Completed
            | S::Expired
            | S::Cancelled => self.status,
        }
    }

    /// Returns the stored [`Revision`] of this [`Agreement`].
    ///
    /// Taken before a transition, it guards the conditional update against
    /// concurrent modifications, including ones keeping the [`Status`].
    #[must_use]
    pub const fn revision(&self) -> Revision {
        Revision {
            status: self.status,
            version: self.current_version,
        }
    }

    /// Returns [`Evidence`] of the signature made in the provided [`Role`].
    #[must_use]
    pub fn evidence(&self, role: Role) -> Option<&Evidence> {
        match role {
            Role::Landlord => self.landlord_signature.as_ref(),
            Role::Tenant => self.tenant_signature.as_ref(),
        }
    }

    /// Indicates whether this [`Agreement`] has been signed in the provided
    /// [`Role`].
    #[must_use]
    pub fn is_signed_by(&self, role: Role) -> bool {
        self.evidence(role).is_some()
    }

    /// Indicates whether this [`Agreement`] awaits a signature in the
    /// provided [`Role`] at the provided moment.
    #[must_use]
    pub fn can_sign(&self, role: Role, now: DateTime) -> bool {
        self.check_signable(role, now).is_ok()
    }

    /// Checks whether this [`Agreement`] can be signed in the provided
    /// [`Role`] at the provided moment.
    ///
    /// # Errors
    ///
    /// - [`TransitionError::Finalized`] if this [`Agreement`] is completed,
    ///   expired or cancelled.
    /// - [`TransitionError::LandlordMustSignFirst`] if the tenant attempts to
    ///   sign before the landlord.
    /// - [`TransitionError::Unexpected`] if this [`Agreement`] doesn't await
    ///   the signature in the provided [`Role`].
    pub fn check_signable(
        &self,
        role: Role,
        now: DateTime,
    ) -> Result<(), TransitionError> {
        use TransitionError as E;

        let status = self.status_at(now);
        if status.is_final() {
            return Err(E::Finalized(status));
        }

        let awaited = match role {
            Role::Landlord => Status::PendingLandlord,
            Role::Tenant => {
                if !self.is_signed_by(Role::Landlord) {
                    return Err(E::LandlordMustSignFirst);
                }
                Status::PendingTenant
            }
        };
        if status != awaited {
            return Err(E::Unexpected(status));
        }

        Ok(())
    }

    /// Indicates whether the stored [`Status`] of this [`Agreement`] agrees
    /// with its recorded signatures and lifecycle timestamps.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let (landlord, tenant) = (
            self.is_signed_by(Role::Landlord),
            self.is_signed_by(Role::Tenant),
        );
        let completed = landlord && tenant && self.completed_at.is_some();
        let pending = self.expires_at.is_some() && !tenant;
        let cancelled = self.cancellation.is_some();

        (landlord || !tenant)
            && (self.status == Status::Completed) == completed
            && (self.status == Status::Cancelled) == cancelled
            && match self.status {
                Status::Draft => !landlord && self.expires_at.is_none(),
                Status::PendingLandlord => pending && !landlord,
                Status::PendingTenant => pending && landlord,
                Status::Completed | Status::Expired | Status::Cancelled => true,
            }
    }

    /// Starts the signing of this [`Status::Draft`] [`Agreement`], giving the
    /// parties the provided number of days to sign it.
    ///
    /// # Errors
    ///
    /// If this [`Agreement`] is not a [`Status::Draft`].
    pub fn initiate(
        &mut self,
        expires_in_days: u16,
        now: DateTime,
    ) -> Result<(), TransitionError> {
        self.ensure_draft(now)?;

        self.status = Status::PendingLandlord;
        self.expires_at = Some(now.add_days(expires_in_days).coerce());
        Ok(())
    }

    /// Records the signature made in the provided [`Role`].
    ///
    /// The landlord signature moves this [`Agreement`] to
    /// [`Status::PendingTenant`], the tenant signature completes it.
    ///
    /// # Errors
    ///
    /// See [`Agreement::check_signable()`].
    pub fn sign(
        &mut self,
        role: Role,
        hash: SignHash,
        now: DateTime,
    ) -> Result<(), TransitionError> {
        self.check_signable(role, now)?;

        let evidence = Evidence {
            signed_at: now.coerce(),
            hash,
        };
        match role {
            Role::Landlord => {
                self.landlord_signature = Some(evidence);
                self.status = Status::PendingTenant;
            }
            Role::Tenant => {
                self.tenant_signature = Some(evidence);
                self.status = Status::Completed;
                self.completed_at = Some(now.coerce());
            }
        }
        Ok(())
    }

    /// Cancels this [`Agreement`] for the provided [`CancelReason`].
    ///
    /// # Errors
    ///
    /// If this [`Agreement`] is already completed, expired or cancelled.
    pub fn cancel(
        &mut self,
        reason: CancelReason,
        now: DateTime,
    ) -> Result<(), TransitionError> {
        let status = self.status_at(now);
        if status.is_final() {
            return Err(TransitionError::Finalized(status));
        }

        self.status = Status::Cancelled;
        self.cancellation = Some(Cancellation {
            at: now.coerce(),
            reason,
        });
        Ok(())
    }

    /// Persists the passive expiration of this [`Agreement`].
    ///
    /// Returns `true` if the stored [`Status`] has been changed to
    /// [`Status::Expired`].
    pub fn expire(&mut self, now: DateTime) -> bool {
        if self.status != Status::Expired
            && self.status_at(now) == Status::Expired
        {
            self.status = Status::Expired;
            return true;
        }
        false
    }

    /// Replaces the [`Document`] of this [`Status::Draft`] [`Agreement`] with
    /// the provided one.
    ///
    /// # Errors
    ///
    /// If this [`Agreement`] is not a [`Status::Draft`].
    pub fn regenerate(
        &mut self,
        document: &Document,
        now: DateTime,
    ) -> Result<(), TransitionError> {
        self.ensure_draft(now)?;

        self.document_hash = document.hash();
        self.current_version = document.version();
        self.generated_at = now.coerce();
        Ok(())
    }

    /// Ensures this [`Agreement`] is a [`Status::Draft`] at the provided
    /// moment.
    fn ensure_draft(&self, now: DateTime) -> Result<(), TransitionError> {
        match self.status_at(now) {
            Status::Draft => Ok(()),
            s @ (Status::Completed | Status::Expired | Status::Cancelled) => {
                Err(TransitionError::Finalized(s))
            }
            s @ (Status::PendingLandlord | Status::PendingTenant) => {
                Err(TransitionError::Unexpected(s))
            }
        }
    }
}

/// Error of an [`Agreement`] [`Status`] transition.
#[derive(Clone, Copy, Debug, Display, Eq, Error, PartialEq)]
pub enum TransitionError {
    /// [`Agreement`] is completed, expired or cancelled.
    #[display("`Agreement` is already {_0}")]
    Finalized(#[error(not(source))] Status),

    /// Tenant attempts to sign before the landlord.
    #[display("Landlord must sign first")]
    LandlordMustSignFirst,

    /// [`Agreement`] is in a [`Status`] not allowing the transition.
    #[display("`Agreement` is {_0}")]
    Unexpected(#[error(not(source))] Status),
}

/// ID of an [`Agreement`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

define_kind! {
    #[doc = "Status of an [`Agreement`]."]
    enum Status {
        #[doc = "Document is generated, signing is not started yet."]
        Draft = 1,

        #[doc = "Awaiting the landlord signature."]
        PendingLandlord = 2,

        #[doc = "Landlord signed, awaiting the tenant signature."]
        PendingTenant = 3,

        #[doc = "Both parties signed."]
        Completed = 4,

        #[doc = "Signing period passed before completion."]
        Expired = 5,

        #[doc = "Cancelled by the landlord."]
        Cancelled = 6,
    }
}

impl Status {
    /// Indicates whether this [`Status`] is terminal, so no further
    /// transitions are possible.
    #[must_use]
    pub const fn is_final(self) -> bool {
        match self {
            Self::Completed | Self::Expired | Self::Cancelled => true,
            Self::Draft | Self::PendingLandlord | Self::PendingTenant => false,
        }
    }
}

define_kind! {
    #[doc = "Role of a party in an [`Agreement`]."]
    enum Role {
        #[doc = "Owner of the leased property."]
        Landlord = 1,

        #[doc = "Renter of the leased property."]
        Tenant = 2,
    }
}

impl Role {
    /// Returns the opposite party [`Role`].
    #[must_use]
    pub const fn counterpart(self) -> Self {
        match self {
            Self::Landlord => Self::Tenant,
            Self::Tenant => Self::Landlord,
        }
    }
}

/// Version of an [`Agreement`] [`Document`].
#[derive(
    Clone, Copy, Debug, Display, Eq, From, Into, Ord, PartialEq, PartialOrd,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Version(i32);

impl Version {
    /// Version of a freshly created [`Agreement`].
    pub const FIRST: Self = Self(1);

    /// Returns the [`Version`] following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Stored state of an [`Agreement`] a conditional update expects to find.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Revision {
    /// Expected stored [`Status`].
    pub status: Status,

    /// Expected stored [`Version`].
    pub version: Version,
}

/// Number of hex characters of a hash disclosed publicly.
const DISCLOSED_HASH_LEN: usize = 16;

/// Returns the publicly disclosable prefix of the provided hex `hash`.
fn truncate(hash: &str) -> String {
    let end = hash.len().min(DISCLOSED_HASH_LEN);
    format!("{}...", &hash[..end])
}

/// SHA-256 hash of a [`Document`], hex-encoded.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct DocumentHash(String);

impl DocumentHash {
    /// Returns the publicly disclosable prefix of this [`DocumentHash`].
    #[must_use]
    pub fn truncated(&self) -> String {
        truncate(&self.0)
    }
}

/// Signature payload submitted by a party.
///
/// Never stored, only its [`SignHash`] is.
#[derive(AsRef, Clone, Debug)]
#[as_ref(str)]
pub struct Signature(#[debug(skip)] String);

impl Signature {
    /// Maximum length of a [`Signature`] payload (data URLs of drawn
    /// signatures included).
    const MAX_LEN: usize = 1024 * 1024;

    /// Creates a new [`Signature`] if the given `payload` is not blank.
    #[must_use]
    pub fn new(payload: impl AsRef<str>) -> Option<Self> {
        let payload = payload.as_ref().trim();
        (!payload.is_empty() && payload.len() <= Self::MAX_LEN)
            .then(|| Self(payload.to_owned()))
    }
}

/// SHA-256 hash of a [`Signature`], the signer IP address and the signing
/// moment, hex-encoded.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct SignHash(String);

impl SignHash {
    /// Calculates a new [`SignHash`].
    #[must_use]
    pub fn new(
        signature: &Signature,
        ip: Option<IpAddr>,
        signed_at: SigningDateTime,
    ) -> Self {
        // WARNING: Changing the layout of the hashed payload makes every
        //          stored `SignHash` unverifiable.
        let ip = ip.map_or_else(|| "unknown".to_owned(), |ip| ip.to_string());
        let mut hasher = Sha256::new();
        hasher.update(signature.as_ref().as_bytes());
        hasher.update(b"|");
        hasher.update(ip.as_bytes());
        hasher.update(b"|");
        hasher.update(signed_at.to_rfc3339().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Returns the publicly disclosable prefix of this [`SignHash`].
    #[must_use]
    pub fn truncated(&self) -> String {
        truncate(&self.0)
    }
}

/// Evidence of a party signing an [`Agreement`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Evidence {
    /// [`DateTime`] when the party signed.
    pub signed_at: SigningDateTime,

    /// [`SignHash`] of the submitted [`Signature`].
    pub hash: SignHash,
}

/// Cancellation of an [`Agreement`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Cancellation {
    /// [`DateTime`] when the [`Agreement`] was cancelled.
    pub at: CancellationDateTime,

    /// Reason of the cancellation.
    pub reason: CancelReason,
}

/// Reason of an [`Agreement`] cancellation.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct CancelReason(String);

impl CancelReason {
    /// Maximum length of a [`CancelReason`].
    const MAX_LEN: usize = 1000;

    /// Creates a new [`CancelReason`] if the given `reason` is not blank.
    #[must_use]
    pub fn new(reason: impl AsRef<str>) -> Option<Self> {
        let reason = reason.as_ref().trim();
        (!reason.is_empty() && reason.len() <= Self::MAX_LEN)
            .then(|| Self(reason.to_owned()))
    }
}

/// Location of a rendered [`Document`] in an external storage.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct PdfUrl(String);

/// Marker type indicating a [`Document`] generation.
#[derive(Clone, Copy, Debug)]
pub struct Generation;

/// Marker type indicating an [`Agreement`] signing.
#[derive(Clone, Copy, Debug)]
pub struct Signing;

/// Marker type indicating an [`Agreement`] completion.
#[derive(Clone, Copy, Debug)]
pub struct Completion;

/// Marker type indicating an [`Agreement`] cancellation.
#[derive(Clone, Copy, Debug)]
pub struct Cancelling;

/// [`DateTime`] when an [`Agreement`] [`Document`] was generated.
pub type GenerationDateTime = DateTimeOf<(Agreement, Generation)>;

/// [`DateTime`] after which an [`Agreement`] can no longer be signed.
pub type ExpirationDateTime = DateTimeOf<(Agreement, unit::Expiration)>;

/// [`DateTime`] when an [`Agreement`] was signed by a party.
pub type SigningDateTime = DateTimeOf<(Agreement, Signing)>;

/// [`DateTime`] when an [`Agreement`] was completed.
pub type CompletionDateTime = DateTimeOf<(Agreement, Completion)>;

/// [`DateTime`] when an [`Agreement`] was cancelled.
pub type CancellationDateTime = DateTimeOf<(Agreement, Cancelling)>;

#[cfg(test)]
mod spec {
    use common::DateTime;

    use crate::domain::lease;

    use super::{
        Agreement, CancelReason, DocumentHash, Role, SignHash, Signature,
        Status, TransitionError, Version,
    };

    fn at(rfc3339: &str) -> DateTime {
        DateTime::from_rfc3339(rfc3339).unwrap()
    }

    fn draft(now: DateTime) -> Agreement {
        Agreement {
            id: super::Id::new(),
            lease_id: lease::Id::new(),
            status: Status::Draft,
            document_hash: DocumentHash("ab".repeat(32)),
            current_version: Version::FIRST,
            landlord_signature: None,
            tenant_signature: None,
            pdf_url: None,
            generated_at: now.coerce(),
            expires_at: None,
            completed_at: None,
            cancellation: None,
        }
    }

    fn hash(payload: &str, now: DateTime) -> SignHash {
        SignHash::new(&Signature::new(payload).unwrap(), None, now.coerce())
    }

    #[test]
    fn walks_through_happy_path() {
        let now = at("2025-03-01T09:00:00Z");
        let mut agreement = draft(now);

        agreement.initiate(5, now).unwrap();
        assert_eq!(agreement.status, Status::PendingLandlord);
        assert_eq!(
            agreement.expires_at.unwrap().coerce(),
            at("2025-03-06T09:00:00Z"),
        );

        let signed = at("2025-03-02T10:00:00Z");
        agreement
            .sign(Role::Landlord, hash("abc", signed), signed)
            .unwrap();
        assert_eq!(agreement.status, Status::PendingTenant);
        assert!(agreement.is_signed_by(Role::Landlord));
        assert!(!agreement.is_signed_by(Role::Tenant));
        assert_eq!(
            agreement.landlord_signature.as_ref().unwrap().signed_at.coerce(),
            signed,
        );

        let completed = at("2025-03-03T11:00:00Z");
        agreement
            .sign(Role::Tenant, hash("xyz", completed), completed)
            .unwrap();
        assert_eq!(agreement.status, Status::Completed);
        assert!(agreement.is_signed_by(Role::Landlord));
        assert!(agreement.is_signed_by(Role::Tenant));
        assert_eq!(agreement.completed_at.unwrap().coerce(), completed);
    }

    #[test]
    fn tenant_cannot_sign_before_landlord() {
        let now = at("2025-03-01T09:00:00Z");
        let mut agreement = draft(now);

        assert_eq!(
            agreement.check_signable(Role::Tenant, now),
            Err(TransitionError::LandlordMustSignFirst),
        );

        agreement.initiate(7, now).unwrap();
        assert_eq!(
            agreement.sign(Role::Tenant, hash("xyz", now), now),
            Err(TransitionError::LandlordMustSignFirst),
        );
        assert!(agreement.tenant_signature.is_none());
        assert_eq!(agreement.status, Status::PendingLandlord);
    }

    #[test]
    fn landlord_cannot_sign_twice_or_before_initiation() {
        let now = at("2025-03-01T09:00:00Z");
        let mut agreement = draft(now);

        assert_eq!(
            agreement.check_signable(Role::Landlord, now),
            Err(TransitionError::Unexpected(Status::Draft)),
        );

        agreement.initiate(7, now).unwrap();
        agreement.sign(Role::Landlord, hash("abc", now), now).unwrap();
        assert_eq!(
            agreement.sign(Role::Landlord, hash("abc", now), now),
            Err(TransitionError::Unexpected(Status::PendingTenant)),
        );
    }

    #[test]
    fn expires_passively() {
        let now = at("2025-03-01T09:00:00Z");
        let mut agreement = draft(now);
        agreement.initiate(1, now).unwrap();

        let later = at("2025-03-02T09:00:01Z");
        assert_eq!(agreement.status_at(now), Status::PendingLandlord);
        assert_eq!(agreement.status_at(later), Status::Expired);
        assert_eq!(agreement.status, Status::PendingLandlord);
        assert!(!agreement.can_sign(Role::Landlord, later));
        assert_eq!(
            agreement.sign(Role::Landlord, hash("abc", later), later),
            Err(TransitionError::Finalized(Status::Expired)),
        );

        assert!(!agreement.expire(now));
        assert!(agreement.expire(later));
        assert_eq!(agreement.status, Status::Expired);
        assert!(!agreement.expire(later));
    }

    #[test]
    fn completed_agreement_never_expires() {
        let now = at("2025-03-01T09:00:00Z");
        let mut agreement = draft(now);
        agreement.initiate(1, now).unwrap();
        agreement.sign(Role::Landlord, hash("abc", now), now).unwrap();
        agreement.sign(Role::Tenant, hash("xyz", now), now).unwrap();

        let much_later = at("2026-01-01T00:00:00Z");
        assert_eq!(agreement.status_at(much_later), Status::Completed);
        assert!(!agreement.expire(much_later));
    }

    #[test]
    fn cancels_only_unfinished() {
        let now = at("2025-03-01T09:00:00Z");
        let reason = || CancelReason::new("Tenant withdrew").unwrap();

        let mut agreement = draft(now);
        agreement.cancel(reason(), now).unwrap();
        assert_eq!(agreement.status, Status::Cancelled);
        assert_eq!(
            AsRef::<str>::as_ref(&agreement.cancellation.as_ref().unwrap().reason),
            "Tenant withdrew",
        );
        assert_eq!(
            agreement.cancel(reason(), now),
            Err(TransitionError::Finalized(Status::Cancelled)),
        );
        assert_eq!(
            agreement.check_signable(Role::Landlord, now),
            Err(TransitionError::Finalized(Status::Cancelled)),
        );

        let mut completed = draft(now);
        completed.initiate(7, now).unwrap();
        completed.sign(Role::Landlord, hash("abc", now), now).unwrap();
        completed.sign(Role::Tenant, hash("xyz", now), now).unwrap();
        assert_eq!(
            completed.cancel(reason(), now),
            Err(TransitionError::Finalized(Status::Completed)),
        );
    }

    #[test]
    fn detects_inconsistent_state() {
        let now = at("2025-03-01T09:00:00Z");
        let mut agreement = draft(now);
        assert!(agreement.is_consistent());

        agreement.initiate(7, now).unwrap();
        agreement.sign(Role::Landlord, hash("abc", now), now).unwrap();
        assert!(agreement.is_consistent());

        let mut tampered = agreement.clone();
        tampered.status = Status::Completed;
        assert!(!tampered.is_consistent());

        let mut tampered = agreement.clone();
        tampered.landlord_signature = None;
        assert!(!tampered.is_consistent());

        agreement.sign(Role::Tenant, hash("xyz", now), now).unwrap();
        assert!(agreement.is_consistent());
    }

    #[test]
    fn sign_hash_depends_on_every_input() {
        let now = at("2025-03-01T09:00:00Z");
        let signature = Signature::new("abc").unwrap();
        let ip = Some("10.0.0.1".parse().unwrap());

        let base = SignHash::new(&signature, ip, now.coerce());
        assert_eq!(base, SignHash::new(&signature, ip, now.coerce()));
        assert_eq!(base.as_ref().len(), 64);

        assert_ne!(base, SignHash::new(&signature, None, now.coerce()));
        assert_ne!(
            base,
            SignHash::new(&Signature::new("abd").unwrap(), ip, now.coerce()),
        );
        assert_ne!(
            base,
            SignHash::new(&signature, ip, at("2025-03-01T09:00:01Z").coerce()),
        );
    }

    #[test]
    fn truncates_disclosed_hashes() {
        let hash = DocumentHash("0123456789abcdef0123456789abcdef".into());

        assert_eq!(hash.truncated(), "0123456789abcdef...");
        assert_eq!(DocumentHash("abc".into()).truncated(), "abc...");
    }

    #[test]
    fn rejects_blank_inputs() {
        assert!(Signature::new("   ").is_none());
        assert!(Signature::new("").is_none());
        assert!(Signature::new(" abc ").is_some());

        assert!(CancelReason::new("\n").is_none());
        assert!(CancelReason::new("x".repeat(1001)).is_none());
    }

    #[test]
    fn role_counterparts() {
        assert_eq!(Role::Landlord.counterpart(), Role::Tenant);
        assert_eq!(Role::Tenant.counterpart(), Role::Landlord);
        assert_eq!(Status::PendingLandlord.to_string(), "PENDING_LANDLORD");
    }
}
