//! Audit log of [`Agreement`]s.

use common::{define_kind, DateTime, DateTimeOf};
use derive_more::{Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[cfg(doc)]
use crate::domain::{Agreement, User};
use crate::domain::{agreement, user};

/// Immutable record of an action performed upon an [`Agreement`].
#[derive(Clone, Debug)]
pub struct Entry {
    /// ID of this [`Entry`].
    pub id: Id,

    /// ID of the [`Agreement`] the action was performed upon.
    pub agreement_id: agreement::Id,

    /// ID of the [`User`] who performed the action.
    ///
    /// [`None`] for actions performed by the system itself.
    pub actor_id: Option<user::Id>,

    /// Performed [`Action`].
    pub action: Action,

    /// Arbitrary details of the action.
    pub metadata: Metadata,

    /// [`DateTime`] when the action was recorded.
    pub recorded_at: RecordDateTime,
}

impl Entry {
    /// Creates a new [`Entry`] recorded at the provided moment.
    #[must_use]
    pub fn new(
        agreement_id: agreement::Id,
        actor_id: Option<user::Id>,
        action: Action,
        metadata: Metadata,
        now: DateTime,
    ) -> Self {
        Self {
            id: Id::new(),
            agreement_id,
            actor_id,
            action,
            metadata,
            recorded_at: now.coerce(),
        }
    }
}

/// ID of an audit [`Entry`].
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
    #[doc = "Action recorded in an audit [`Entry`]."]
    enum Action {
        #[doc = "[`Agreement`] was created."]
        Created = 1,

        #[doc = "Signing of an [`Agreement`] was initiated."]
        Initiated = 2,

        #[doc = "Landlord signed an [`Agreement`]."]
        LandlordSigned = 3,

        #[doc = "Tenant signed an [`Agreement`]."]
        TenantSigned = 4,

        #[doc = "[`Agreement`] was cancelled."]
        Cancelled = 5,

        #[doc = "[`Agreement`] expired unsigned."]
        Expired = 6,

        #[doc = "[`Agreement`] document was regenerated."]
        Regenerated = 7,
    }
}

impl From<agreement::Role> for Action {
    fn from(role: agreement::Role) -> Self {
        match role {
            agreement::Role::Landlord => Self::LandlordSigned,
            agreement::Role::Tenant => Self::TenantSigned,
        }
    }
}

/// Details of an audit [`Entry`], being a JSON object.
#[derive(Clone, Debug, Default, Deserialize, Eq, Into, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    /// Adds the provided `key` with its `value` to this [`Metadata`].
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        drop(self.0.insert(key.to_owned(), value.into()));
        self
    }

    /// Returns the value stored under the provided `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

impl From<Metadata> for Value {
    fn from(metadata: Metadata) -> Self {
        Self::Object(metadata.0)
    }
}

impl TryFrom<Value> for Metadata {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            v @ (Value::Null
            | Value::Bool(_)
            | Value::Number(_)
            | Value::String(_)
            | Value::Array(_)) => Err(v),
        }
    }
}

/// Marker type indicating an audit [`Entry`] recording.
#[derive(Clone, Copy, Debug)]
pub struct Recording;

/// [`DateTime`] when an audit [`Entry`] was recorded.
pub type RecordDateTime = DateTimeOf<(Entry, Recording)>;

#[cfg(test)]
mod spec {
    use serde_json::{json, Value};

    use crate::domain::agreement::Role;

    use super::{Action, Metadata};

    #[test]
    fn builds_metadata_object() {
        let metadata = Metadata::default()
            .with("expiresInDays", 7)
            .with("ipAddress", "10.0.0.1");

        assert_eq!(metadata.get("expiresInDays"), Some(&json!(7)));
        assert_eq!(
            Value::from(metadata),
            json!({"expiresInDays": 7, "ipAddress": "10.0.0.1"}),
        );
    }

    #[test]
    fn rejects_non_object_metadata() {
        assert!(Metadata::try_from(json!([1, 2])).is_err());
        assert!(Metadata::try_from(json!({})).is_ok());
    }

    #[test]
    fn maps_signer_role_to_action() {
        assert_eq!(Action::from(Role::Landlord), Action::LandlordSigned);
        assert_eq!(Action::from(Role::Tenant).to_string(), "TENANT_SIGNED");
    }
}
