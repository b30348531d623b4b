//! [`Lease`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf, Money};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(doc)]
use crate::domain::{Agreement, User};
use crate::domain::{agreement::Role, user};

/// Lease of a property between a landlord and a tenant.
///
/// Leases are created by the booking subsystem once a booking is confirmed.
/// Every [`Lease`] owns at most one [`Agreement`].
#[derive(Clone, Debug)]
pub struct Lease {
    /// ID of this [`Lease`].
    pub id: Id,

    /// ID of the leased property.
    pub property_id: PropertyId,

    /// Human-readable address of the leased property.
    pub property_address: PropertyAddress,

    /// ID of the [`User`] owning the property.
    pub landlord_id: user::Id,

    /// ID of the [`User`] renting the property.
    pub tenant_id: user::Id,

    /// First day of the rental period.
    pub start_date: time::Date,

    /// Last day of the rental period.
    pub end_date: time::Date,

    /// Rent to be paid every month.
    pub monthly_rent: Money,

    /// [`DateTime`] when this [`Lease`] was created.
    pub created_at: CreationDateTime,
}

impl Lease {
    /// Returns the [`Role`] the [`User`] with the provided ID plays in this
    /// [`Lease`].
    ///
    /// [`None`] is returned if the [`User`] is not a party of this [`Lease`].
    #[must_use]
    pub fn role_of(&self, user_id: user::Id) -> Option<Role> {
        if self.landlord_id == user_id {
            Some(Role::Landlord)
        } else if self.tenant_id == user_id {
            Some(Role::Tenant)
        } else {
            None
        }
    }

    /// Returns ID of the [`User`] playing the provided [`Role`] in this
    /// [`Lease`].
    #[must_use]
    pub fn party(&self, role: Role) -> user::Id {
        match role {
            Role::Landlord => self.landlord_id,
            Role::Tenant => self.tenant_id,
        }
    }
}

/// ID of a [`Lease`].
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

/// ID of a property listing.
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
pub struct PropertyId(Uuid);

impl PropertyId {
    /// Creates a new random [`PropertyId`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Address of a leased property.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct PropertyAddress(String);

impl PropertyAddress {
    /// Creates a new [`PropertyAddress`] if the given `address` is valid.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Option<Self> {
        let address = address.into();
        let valid = address.trim() == address
            && !address.is_empty()
            && address.len() <= 1024;
        valid.then_some(Self(address))
    }
}

/// [`DateTime`] when a [`Lease`] was created.
pub type CreationDateTime = DateTimeOf<(Lease, unit::Creation)>;

#[cfg(test)]
mod spec {
    use common::{money::Currency, Money};
    use time::macros::date;

    use crate::domain::{agreement::Role, user};

    use super::{CreationDateTime, Id, Lease, PropertyAddress, PropertyId};

    fn lease(landlord_id: user::Id, tenant_id: user::Id) -> Lease {
        Lease {
            id: Id::new(),
            property_id: PropertyId::new(),
            property_address: PropertyAddress::new("12 Jalan Ampang").unwrap(),
            landlord_id,
            tenant_id,
            start_date: date!(2025 - 01 - 01),
            end_date: date!(2025 - 12 - 31),
            monthly_rent: Money {
                amount: 2_500.into(),
                currency: Currency::Myr,
            },
            created_at: CreationDateTime::now(),
        }
    }

    #[test]
    fn resolves_party_roles() {
        let (landlord, tenant) = (user::Id::new(), user::Id::new());
        let lease = lease(landlord, tenant);

        assert_eq!(lease.role_of(landlord), Some(Role::Landlord));
        assert_eq!(lease.role_of(tenant), Some(Role::Tenant));
        assert_eq!(lease.role_of(user::Id::new()), None);

        assert_eq!(lease.party(Role::Landlord), landlord);
        assert_eq!(lease.party(Role::Tenant), tenant);
    }

    #[test]
    fn landlord_wins_when_user_is_both_parties() {
        let user = user::Id::new();

        assert_eq!(lease(user, user).role_of(user), Some(Role::Landlord));
    }
}
