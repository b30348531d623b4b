//! Fixtures shared by tests of [`Command`]s, [`Query`]s and [`Task`]s.

use std::time::Duration;

use common::{money::Currency, operations::Insert, DateTime, Money};
use time::macros::date;

#[cfg(doc)]
use crate::{Command, Query, Task};
use crate::{
    domain::{
        agreement::{self, Document},
        lease, user, Agreement, Lease, User,
    },
    infra::{mailer, Database as _, Memory},
    task, AgreementConfig, Config, Service,
};

/// Secret signing [`user::Session`] tokens in tests.
pub(crate) const JWT_SECRET: &[u8] = b"rentverse-test-secret";

/// Creates a new [`Service`] on top of the provided [`Memory`] database.
///
/// Background tasks are not running.
pub(crate) fn service(db: Memory) -> Service<Memory> {
    let config = Config {
        jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(JWT_SECRET),
        agreement: AgreementConfig::default(),
        expire_agreements: task::expire_agreements::Config {
            interval: Duration::from_secs(300),
        },
    };
    let (service, _) = Service::new(config, db, mailer::Log);
    service
}

/// Parties of a stored [`Lease`] along with its rendered [`Document`].
#[derive(Debug)]
pub(crate) struct Fixture {
    /// Stored [`Lease`].
    pub(crate) lease: Lease,

    /// Landlord of the [`Lease`].
    pub(crate) landlord: User,

    /// Tenant of the [`Lease`].
    pub(crate) tenant: User,

    /// [`Document`] of the first [`agreement::Version`].
    pub(crate) document: Document,
}

/// Creates a new [`User`] with the provided name.
pub(crate) fn user(name: &str) -> User {
    User {
        id: user::Id::new(),
        name: user::Name::new(name).unwrap(),
        email: user::Email::new(format!(
            "{}@rentverse.test",
            name.to_lowercase().replace(' ', "."),
        )),
        created_at: user::CreationDateTime::now(),
        deleted_at: None,
    }
}

/// Stores a new [`Lease`] with its parties in the provided [`Memory`]
/// database.
pub(crate) async fn lease(db: &Memory) -> Fixture {
    let (landlord, tenant) = (user("Aminah Yusof"), user("Daniel Lee"));
    let lease = Lease {
        id: lease::Id::new(),
        property_id: lease::PropertyId::new(),
        property_address: lease::PropertyAddress::new("7 Jalan Bukit")
            .unwrap(),
        landlord_id: landlord.id,
        tenant_id: tenant.id,
        start_date: date!(2025 - 04 - 01),
        end_date: date!(2026 - 03 - 31),
        monthly_rent: Money {
            amount: 1_800.into(),
            currency: Currency::Myr,
        },
        created_at: lease::CreationDateTime::now(),
    };
    db.put_user(landlord.clone()).await;
    db.put_user(tenant.clone()).await;
    db.put_lease(lease.clone()).await;

    let document =
        Document::render(&lease, &landlord, &tenant, agreement::Version::FIRST);
    Fixture {
        lease,
        landlord,
        tenant,
        document,
    }
}

/// Stores a new [`agreement::Status::Draft`] [`Agreement`] of the provided
/// [`Fixture`].
pub(crate) async fn draft(db: &Memory, fixture: &Fixture) -> Agreement {
    let agreement =
        Agreement::new(fixture.lease.id, &fixture.document, DateTime::now());
    assert!(db.execute(Insert(agreement.clone())).await.unwrap());
    agreement
}

/// Stores a new [`agreement::Status::PendingLandlord`] [`Agreement`] of the
/// provided [`Fixture`], expiring in a week.
pub(crate) async fn initiated(db: &Memory, fixture: &Fixture) -> Agreement {
    let now = DateTime::now();
    let mut agreement = Agreement::new(fixture.lease.id, &fixture.document, now);
    agreement.initiate(7, now).unwrap();
    assert!(db.execute(Insert(agreement.clone())).await.unwrap());
    agreement
}
