//! [`Command`] for regenerating an [`Agreement`] [`Document`].

use std::collections::HashMap;

use common::{
    operations::{By, Commit, Expected, Insert, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        agreement::{self, Document, Role, TransitionError},
        audit, lease, user, Agreement, Lease, User,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for re-rendering the [`Document`] of a
/// [`agreement::Status::Draft`] [`Agreement`] from the current [`Lease`]
/// terms, bumping its [`agreement::Version`].
#[derive(Clone, Copy, Debug)]
pub struct RegenerateAgreement {
    /// ID of the [`Agreement`] to regenerate.
    pub agreement_id: agreement::Id,

    /// ID of the [`User`] regenerating the [`Agreement`].
    pub initiator_id: user::Id,
}

impl<Db> Command<RegenerateAgreement> for Service<Db>
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
            Select<By<HashMap<user::Id, User>, [user::Id; 2]>>,
            Ok = HashMap<user::Id, User>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Update<Expected<Agreement, agreement::Revision>>,
            Ok = bool,
            Err = Traced<database::Error>,
        > + Database<Insert<audit::Entry>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Agreement;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: RegenerateAgreement,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RegenerateAgreement {
            agreement_id,
            initiator_id,
        } = cmd;

        let mut agreement = self
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

        match lease.role_of(initiator_id) {
            Some(Role::Landlord) => {}
            Some(Role::Tenant) => {
                return Err(tracerr::new!(E::NotLandlord(initiator_id)));
            }
            None => return Err(tracerr::new!(E::NotParty(initiator_id))),
        }

        let parties = self
            .database()
            .execute(Select(By::<HashMap<_, User>, _>::new([
                lease.landlord_id,
                lease.tenant_id,
            ])))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let party = |id: user::Id| {
            parties
                .get(&id)
                .ok_or(E::PartyNotExists(id))
                .map_err(tracerr::wrap!())
        };
        let (landlord, tenant) =
            (party(lease.landlord_id)?, party(lease.tenant_id)?);

        let now = DateTime::now();
        let revision = agreement.revision();
        let document = Document::render(
            &lease,
            landlord,
            tenant,
            agreement.current_version.next(),
        );
        agreement
            .regenerate(&document, now)
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let updated = tx
            .execute(Update(Expected::new(agreement.clone(), revision)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if !updated {
            return Err(tracerr::new!(E::ConcurrentModification(agreement_id)));
        }
        tx.execute(Insert(audit::Entry::new(
            agreement_id,
            Some(initiator_id),
            audit::Action::Regenerated,
            audit::Metadata::default()
                .with("version", i32::from(agreement.current_version))
                .with("documentHash", agreement.document_hash.to_string()),
            now,
        )))
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))
        .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(agreement)
    }
}

/// Error of [`RegenerateAgreement`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Agreement`] with the provided ID does not exist.
    #[display("`Agreement(id: {_0})` does not exist")]
    AgreementNotExists(#[error(not(source))] agreement::Id),

    /// [`Agreement`] was modified by another operation in the meantime.
    #[display("`Agreement(id: {_0})` was modified concurrently")]
    ConcurrentModification(#[error(not(source))] agreement::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Lease`] of the [`Agreement`] does not exist.
    #[display("`Lease(id: {_0})` does not exist")]
    LeaseNotExists(#[error(not(source))] lease::Id),

    /// [`User`] is the tenant, not the landlord.
    #[display("`User(id: {_0})` is not the landlord")]
    NotLandlord(#[error(not(source))] user::Id),

    /// [`User`] is not a party of the [`Agreement`].
    #[display("`User(id: {_0})` is not a party of the `Agreement`")]
    NotParty(#[error(not(source))] user::Id),

    /// Party of the [`Lease`] does not exist.
    #[display("`User(id: {_0})` does not exist")]
    PartyNotExists(#[error(not(source))] user::Id),

    /// [`Agreement`] cannot be regenerated in its current state.
    #[display("Cannot regenerate `Agreement`: {_0}")]
    #[from]
    Transition(TransitionError),
}

#[cfg(test)]
mod spec {
    use common::{
        money::Currency,
        operations::{By, Expected, Select, Update},
        DateTime, Money,
    };

    use crate::{
        domain::{
            agreement::{Status, TransitionError, Version},
            audit, Agreement,
        },
        infra::{Database as _, Memory},
        test_fixtures, Command as _,
    };

    use super::{ExecutionError, RegenerateAgreement};

    #[tokio::test]
    async fn rerenders_draft_with_new_terms() {
        let db = Memory::default();
        let service = test_fixtures::service(db.clone());
        let mut fixture = test_fixtures::lease(&db).await;
        let agreement = test_fixtures::draft(&db, &fixture).await;

        fixture.lease.monthly_rent = Money {
            amount: 2_000.into(),
            currency: Currency::Myr,
        };
        db.put_lease(fixture.lease.clone()).await;

        let regenerated = service
            .execute(RegenerateAgreement {
                agreement_id: agreement.id,
                initiator_id: fixture.landlord.id,
            })
            .await
            .unwrap();

        assert_eq!(regenerated.status, Status::Draft);
        assert_eq!(regenerated.current_version, Version::FIRST.next());
        assert_ne!(regenerated.document_hash, agreement.document_hash);
    }

    #[tokio::test]
    async fn keeps_initiated_document() {
        let db = Memory::default();
        let service = test_fixtures::service(db.clone());
        let fixture = test_fixtures::lease(&db).await;
        let agreement = test_fixtures::initiated(&db, &fixture).await;

        let err = service
            .execute(RegenerateAgreement {
                agreement_id: agreement.id,
                initiator_id: fixture.landlord.id,
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::Transition(TransitionError::Unexpected(
                Status::PendingLandlord
            )),
        ));
    }

    #[tokio::test]
    async fn stale_draft_cannot_overwrite_regenerated_document() {
        let db = Memory::default();
        let service = test_fixtures::service(db.clone());
        let fixture = test_fixtures::lease(&db).await;
        let stale = test_fixtures::draft(&db, &fixture).await;

        let regenerated = service
            .execute(RegenerateAgreement {
                agreement_id: stale.id,
                initiator_id: fixture.landlord.id,
            })
            .await
            .unwrap();

        let revision = stale.revision();
        let mut outdated = stale.clone();
        outdated.initiate(7, DateTime::now()).unwrap();
        let updated = db
            .execute(Update(Expected::new(outdated, revision)))
            .await
            .unwrap();
        assert!(!updated);

        let stored = db
            .execute(Select(By::<Option<Agreement>, _>::new(stale.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, Status::Draft);
        assert_eq!(stored.current_version, Version::FIRST.next());
        assert_eq!(stored.document_hash, regenerated.document_hash);
    }

    #[tokio::test]
    async fn concurrent_regenerations_bump_version_once() {
        let db = Memory::default();
        let service = test_fixtures::service(db.clone());
        let fixture = test_fixtures::lease(&db).await;
        let agreement = test_fixtures::draft(&db, &fixture).await;
        let cmd = RegenerateAgreement {
            agreement_id: agreement.id,
            initiator_id: fixture.landlord.id,
        };
        db.hold_reads(2).await;

        let (first, second) =
            tokio::join!(service.execute(cmd), service.execute(cmd));

        let failed = match (first, second) {
            (Ok(_), Err(e)) | (Err(e), Ok(_)) => e,
            (Ok(_), Ok(_)) => panic!("both regenerations succeeded"),
            (Err(e1), Err(e2)) => {
                panic!("both regenerations failed: {e1}, {e2}")
            }
        };
        assert!(matches!(
            failed.as_ref(),
            ExecutionError::ConcurrentModification(_),
        ));

        let stored = db
            .execute(Select(By::<Option<Agreement>, _>::new(agreement.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.current_version, Version::FIRST.next());
        let trail = db
            .execute(Select(By::<Vec<audit::Entry>, _>::new(agreement.id)))
            .await
            .unwrap();
        assert_eq!(
            trail.iter().map(|e| e.action).collect::<Vec<_>>(),
            [audit::Action::Regenerated],
        );
    }
}
