//! [`Query`] collection related to a single [`Agreement`].

use common::{
    operations::{By, Select},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    command::{expire_agreement, Command, ExpireAgreement},
    domain::{agreement, audit, lease, user, Agreement, Lease},
    infra::{database, Database},
    read::agreement::{Verification, View},
    Service,
};

use super::Query;

/// Queries an [`Agreement`] by its [`agreement::Id`] on behalf of one of its
/// parties.
#[derive(Clone, Copy, Debug)]
pub struct ById {
    /// ID of the [`Agreement`] to query.
    pub agreement_id: agreement::Id,

    /// ID of the [`User`] querying the [`Agreement`].
    ///
    /// [`User`]: crate::domain::User
    pub viewer_id: user::Id,
}

/// Queries an [`Agreement`] by its [`lease::Id`] on behalf of one of its
/// parties.
#[derive(Clone, Copy, Debug)]
pub struct ByLease {
    /// ID of the [`Lease`] to query the [`Agreement`] of.
    pub lease_id: lease::Id,

    /// ID of the [`User`] querying the [`Agreement`].
    ///
    /// [`User`]: crate::domain::User
    pub viewer_id: user::Id,
}

/// Queries the public [`Verification`] of an [`Agreement`].
#[derive(Clone, Copy, Debug)]
pub struct Verify {
    /// ID of the [`Agreement`] to verify.
    pub agreement_id: agreement::Id,
}

/// Queries [`audit::Entry`]s of an [`Agreement`] on behalf of one of its
/// parties, in the recording order.
#[derive(Clone, Copy, Debug)]
pub struct AuditTrail {
    /// ID of the [`Agreement`] to query the trail of.
    pub agreement_id: agreement::Id,

    /// ID of the [`User`] querying the trail.
    ///
    /// [`User`]: crate::domain::User
    pub viewer_id: user::Id,
}

impl<Db> Service<Db>
where
    Db: Database<
        Select<By<Option<Lease>, lease::Id>>,
        Ok = Option<Lease>,
        Err = Traced<database::Error>,
    >,
    Self: Command<
        ExpireAgreement,
        Ok = Agreement,
        Err = Traced<expire_agreement::ExecutionError>,
    >,
{
    /// Builds a [`View`] of the provided [`Agreement`] for the [`User`] with
    /// the provided ID, persisting its passive expiration first.
    ///
    /// [`User`]: crate::domain::User
    async fn view(
        &self,
        agreement: Agreement,
        viewer_id: user::Id,
    ) -> Result<View, Traced<ExecutionError>> {
        use ExecutionError as E;

        let lease = self
            .database()
            .execute(Select(By::<Option<Lease>, _>::new(agreement.lease_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::LeaseNotExists(agreement.lease_id))
            .map_err(tracerr::wrap!())?;
        let role = lease
            .role_of(viewer_id)
            .ok_or(E::NotParty(viewer_id))
            .map_err(tracerr::wrap!())?;

        let now = DateTime::now();
        let agreement = if agreement.status_at(now) == agreement.status {
            agreement
        } else {
            self.execute(ExpireAgreement { agreement })
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
        };

        Ok(View::new(agreement, lease, role, now))
    }
}

impl<Db> Query<ById> for Service<Db>
where
    Db: Database<
            Select<By<Option<Agreement>, agreement::Id>>,
            Ok = Option<Agreement>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Lease>, lease::Id>>,
            Ok = Option<Lease>,
            Err = Traced<database::Error>,
        >,
    Self: Command<
        ExpireAgreement,
        Ok = Agreement,
        Err = Traced<expire_agreement::ExecutionError>,
    >,
{
    type Ok = View;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, query: ById) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ById {
            agreement_id,
            viewer_id,
        } = query;

        let agreement = self
            .database()
            .execute(Select(By::<Option<Agreement>, _>::new(agreement_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::AgreementNotExists(agreement_id))
            .map_err(tracerr::wrap!())?;

        self.view(agreement, viewer_id).await
    }
}

impl<Db> Query<ByLease> for Service<Db>
where
    Db: Database<
            Select<By<Option<Agreement>, lease::Id>>,
            Ok = Option<Agreement>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Lease>, lease::Id>>,
            Ok = Option<Lease>,
            Err = Traced<database::Error>,
        >,
    Self: Command<
        ExpireAgreement,
        Ok = Agreement,
        Err = Traced<expire_agreement::ExecutionError>,
    >,
{
    type Ok = View;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, query: ByLease) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ByLease {
            lease_id,
            viewer_id,
        } = query;

        let agreement = self
            .database()
            .execute(Select(By::<Option<Agreement>, _>::new(lease_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::LeaseAgreementNotExists(lease_id))
            .map_err(tracerr::wrap!())?;

        self.view(agreement, viewer_id).await
    }
}

impl<Db> Query<Verify> for Service<Db>
where
    Db: Database<
        Select<By<Option<Agreement>, agreement::Id>>,
        Ok = Option<Agreement>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Verification;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, query: Verify) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let Verify { agreement_id } = query;

        let agreement = self
            .database()
            .execute(Select(By::<Option<Agreement>, _>::new(agreement_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::AgreementNotExists(agreement_id))
            .map_err(tracerr::wrap!())?;

        Ok(Verification::new(&agreement, DateTime::now()))
    }
}

impl<Db> Query<AuditTrail> for Service<Db>
where
    Db: Database<
            Select<By<Option<Agreement>, agreement::Id>>,
            Ok = Option<Agreement>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Lease>, lease::Id>>,
            Ok = Option<Lease>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<audit::Entry>, agreement::Id>>,
            Ok = Vec<audit::Entry>,
            Err = Traced<database::Error>,
        >,
{
    type Ok = Vec<audit::Entry>;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, query: AuditTrail) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let AuditTrail {
            agreement_id,
            viewer_id,
        } = query;

        let agreement = self
            .database()
            .execute(Select(By::<Option<Agreement>, _>::new(agreement_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::AgreementNotExists(agreement_id))
            .map_err(tracerr::wrap!())?;
        let lease = self
            .database()
            .execute(Select(By::<Option<Lease>, _>::new(agreement.lease_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::LeaseNotExists(agreement.lease_id))
            .map_err(tracerr::wrap!())?;
        if lease.role_of(viewer_id).is_none() {
            return Err(tracerr::new!(E::NotParty(viewer_id)));
        }

        self.database()
            .execute(Select(By::<Vec<audit::Entry>, _>::new(agreement_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
    }
}

/// Error of an [`Agreement`] [`Query`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Agreement`] with the provided ID does not exist.
    #[display("`Agreement(id: {_0})` does not exist")]
    AgreementNotExists(#[error(not(source))] agreement::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Persisting the passive expiration failed.
    #[display("Failed to expire `Agreement`: {_0}")]
    #[from]
    Expire(expire_agreement::ExecutionError),

    /// [`Lease`] has no [`Agreement`].
    #[display("`Lease(id: {_0})` has no `Agreement`")]
    LeaseAgreementNotExists(#[error(not(source))] lease::Id),

    /// [`Lease`] of the [`Agreement`] does not exist.
    #[display("`Lease(id: {_0})` does not exist")]
    LeaseNotExists(#[error(not(source))] lease::Id),

    /// Querying [`User`] is not a party of the [`Agreement`].
    ///
    /// [`User`]: crate::domain::User
    #[display("`User(id: {_0})` is not a party of the `Agreement`")]
    NotParty(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use common::{
        operations::{By, Insert, Select},
        DateTime,
    };

    use crate::{
        command::{CreateAgreement, InitiateAgreement, SignAgreement},
        domain::{
            agreement::{Role, Status},
            audit, user, Agreement,
        },
        infra::{Database as _, Memory},
        test_fixtures, Command as _, Query as _,
    };

    use super::{AuditTrail, ByLease, ById, ExecutionError, Verify};

    #[tokio::test]
    async fn lets_parties_view_with_sign_flag() {
        let db = Memory::default();
        let service = test_fixtures::service(db.clone());
        let fixture = test_fixtures::lease(&db).await;
        let agreement = test_fixtures::initiated(&db, &fixture).await;

        let landlord = service
            .execute(ById {
                agreement_id: agreement.id,
                viewer_id: fixture.landlord.id,
            })
            .await
            .unwrap();
        assert_eq!(landlord.role, Role::Landlord);
        assert!(landlord.can_sign);

        let tenant = service
            .execute(ByLease {
                lease_id: fixture.lease.id,
                viewer_id: fixture.tenant.id,
            })
            .await
            .unwrap();
        assert_eq!(tenant.role, Role::Tenant);
        assert!(!tenant.can_sign);
        assert_eq!(tenant.agreement.id, agreement.id);

        let err = service
            .execute(ById {
                agreement_id: agreement.id,
                viewer_id: user::Id::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::NotParty(_)));
    }

    #[tokio::test]
    async fn persists_passive_expiration_on_view() {
        let db = Memory::default();
        let service = test_fixtures::service(db.clone());
        let fixture = test_fixtures::lease(&db).await;

        let past = DateTime::from_rfc3339("2020-01-01T00:00:00Z").unwrap();
        let mut overdue =
            Agreement::new(fixture.lease.id, &fixture.document, past);
        overdue.initiate(1, past).unwrap();
        assert!(db.execute(Insert(overdue.clone())).await.unwrap());

        let view = service
            .execute(ById {
                agreement_id: overdue.id,
                viewer_id: fixture.tenant.id,
            })
            .await
            .unwrap();
        assert_eq!(view.agreement.status, Status::Expired);
        assert!(!view.can_sign);

        let stored = db
            .execute(Select(By::<Option<Agreement>, _>::new(overdue.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, Status::Expired);
    }

    #[tokio::test]
    async fn verifies_publicly() {
        let db = Memory::default();
        let service = test_fixtures::service(db.clone());
        let fixture = test_fixtures::lease(&db).await;
        let agreement = test_fixtures::initiated(&db, &fixture).await;
        let signed = service
            .execute(SignAgreement {
                agreement_id: agreement.id,
                signer_id: fixture.landlord.id,
                role: Role::Landlord,
                signature: "abc".into(),
                confirmed: true,
                ip_address: None,
            })
            .await
            .unwrap();

        let verification = service
            .execute(Verify {
                agreement_id: agreement.id,
            })
            .await
            .unwrap();

        assert_eq!(verification.status, Status::PendingTenant);
        assert!(verification.is_valid);
        let full = signed.landlord_signature.unwrap().hash.to_string();
        let disclosed = verification.landlord.unwrap().hash;
        assert_ne!(disclosed, full);
        assert!(disclosed.ends_with("..."));
        assert!(full.starts_with(disclosed.trim_end_matches("...")));

        let err = service
            .execute(Verify {
                agreement_id: crate::domain::agreement::Id::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::AgreementNotExists(_)));
    }

    #[tokio::test]
    async fn lists_audit_trail_in_order_for_parties_only() {
        let db = Memory::default();
        let service = test_fixtures::service(db.clone());
        let fixture = test_fixtures::lease(&db).await;
        let agreement = service
            .execute(CreateAgreement {
                lease_id: fixture.lease.id,
                initiator_id: fixture.landlord.id,
            })
            .await
            .unwrap();
        _ = service
            .execute(InitiateAgreement {
                agreement_id: agreement.id,
                initiator_id: fixture.landlord.id,
                expires_in_days: Some(5),
            })
            .await
            .unwrap();

        let trail = service
            .execute(AuditTrail {
                agreement_id: agreement.id,
                viewer_id: fixture.tenant.id,
            })
            .await
            .unwrap();
        let actions = trail.iter().map(|e| e.action).collect::<Vec<_>>();
        assert_eq!(actions, [audit::Action::Created, audit::Action::Initiated]);

        let err = service
            .execute(AuditTrail {
                agreement_id: agreement.id,
                viewer_id: user::Id::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::NotParty(_)));
    }
}
