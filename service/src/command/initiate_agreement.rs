//! [`Command`] for initiating an [`Agreement`] signing.

use std::collections::HashMap;

use common::{
    operations::{By, Commit, Expected, Insert, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        agreement::{self, Role, TransitionError},
        audit,
        notification::Topic,
        lease, user, Agreement, Lease, User,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for initiating an [`Agreement`] signing.
#[derive(Clone, Copy, Debug)]
pub struct InitiateAgreement {
    /// ID of the [`Agreement`] to initiate.
    pub agreement_id: agreement::Id,

    /// ID of the [`User`] initiating the [`Agreement`].
    pub initiator_id: user::Id,

    /// Number of days the parties have to sign the [`Agreement`].
    ///
    /// [`AgreementConfig::default_expires_in_days`] is used if [`None`].
    ///
    /// [`AgreementConfig::default_expires_in_days`]: crate::AgreementConfig::default_expires_in_days
    pub expires_in_days: Option<i64>,
}

impl<Db> Command<InitiateAgreement> for Service<Db>
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
        cmd: InitiateAgreement,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let InitiateAgreement {
            agreement_id,
            initiator_id,
            expires_in_days,
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

        let conf = self.config().agreement;
        let days = match expires_in_days {
            None => conf.default_expires_in_days,
            Some(days) => u16::try_from(days)
                .ok()
                .filter(|d| (1..=conf.max_expires_in_days).contains(d))
                .ok_or(E::InvalidExpiresInDays(days))
                .map_err(tracerr::wrap!())?,
        };

        let now = DateTime::now();
        let revision = agreement.revision();
        agreement
            .initiate(days, now)
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
        let expires_at = agreement
            .expires_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_default();
        tx.execute(Insert(audit::Entry::new(
            agreement_id,
            Some(initiator_id),
            audit::Action::Initiated,
            audit::Metadata::default()
                .with("expiresInDays", days)
                .with("expiresAt", expires_at),
            now,
        )))
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))
        .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        self.notify_parties(
            &lease,
            &agreement,
            [
                (
                    Role::Landlord,
                    Topic::SigningReminder {
                        role: Role::Landlord,
                    },
                ),
                (Role::Tenant, Topic::AgreementInitiated),
            ],
        )
        .await;

        Ok(agreement)
    }
}

/// Error of [`InitiateAgreement`] [`Command`] execution.
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

    /// Requested number of days to sign is out of the allowed range.
    #[display("Invalid number of days to sign: {_0}")]
    InvalidExpiresInDays(#[error(not(source))] i64),

    /// [`Lease`] of the [`Agreement`] does not exist.
    #[display("`Lease(id: {_0})` does not exist")]
    LeaseNotExists(#[error(not(source))] lease::Id),

    /// [`User`] is the tenant, not the landlord.
    #[display("`User(id: {_0})` is not the landlord")]
    NotLandlord(#[error(not(source))] user::Id),

    /// [`User`] is not a party of the [`Agreement`].
    #[display("`User(id: {_0})` is not a party of the `Agreement`")]
    NotParty(#[error(not(source))] user::Id),

    /// [`Agreement`] cannot be initiated in its current state.
    #[display("Cannot initiate `Agreement`: {_0}")]
    #[from]
    Transition(TransitionError),
}

#[cfg(test)]
mod spec {
    use common::{
        operations::{By, Select},
        DateTime,
    };

    use crate::{
        domain::{
            agreement::{Status, TransitionError},
            audit, user, Agreement,
        },
        infra::{Database as _, Memory},
        test_fixtures, Command as _, Service,
    };

    use super::{ExecutionError, InitiateAgreement};

    async fn draft() -> (Memory, Service<Memory>, test_fixtures::Fixture, Agreement) {
        let db = Memory::default();
        let service = test_fixtures::service(db.clone());
        let fixture = test_fixtures::lease(&db).await;
        let agreement = test_fixtures::draft(&db, &fixture).await;
        (db, service, fixture, agreement)
    }

    #[tokio::test]
    async fn starts_signing_with_default_expiry() {
        let (db, service, fixture, agreement) = draft().await;
        let before = DateTime::now();

        let initiated = service
            .execute(InitiateAgreement {
                agreement_id: agreement.id,
                initiator_id: fixture.landlord.id,
                expires_in_days: None,
            })
            .await
            .unwrap();

        assert_eq!(initiated.status, Status::PendingLandlord);
        let expires_at: DateTime = initiated.expires_at.unwrap().coerce();
        assert!(expires_at >= before.add_days(7));
        assert!(expires_at <= DateTime::now().add_days(7));

        let trail = db
            .execute(Select(By::<Vec<audit::Entry>, _>::new(agreement.id)))
            .await
            .unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, audit::Action::Initiated);
        assert_eq!(
            trail[0].metadata.get("expiresInDays"),
            Some(&serde_json::json!(7)),
        );
    }

    #[tokio::test]
    async fn rejects_out_of_range_days() {
        let (_, service, fixture, agreement) = draft().await;

        for days in [0, -1, 91, i64::MAX] {
            let err = service
                .execute(InitiateAgreement {
                    agreement_id: agreement.id,
                    initiator_id: fixture.landlord.id,
                    expires_in_days: Some(days),
                })
                .await
                .unwrap_err();
            assert!(matches!(
                err.as_ref(),
                ExecutionError::InvalidExpiresInDays(d) if *d == days,
            ));
        }

        assert!(service
            .execute(InitiateAgreement {
                agreement_id: agreement.id,
                initiator_id: fixture.landlord.id,
                expires_in_days: Some(90),
            })
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn only_landlord_initiates_once() {
        let (_, service, fixture, agreement) = draft().await;
        let cmd = |initiator_id| InitiateAgreement {
            agreement_id: agreement.id,
            initiator_id,
            expires_in_days: Some(3),
        };

        let err = service.execute(cmd(fixture.tenant.id)).await.unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::NotLandlord(_)));

        let err = service.execute(cmd(user::Id::new())).await.unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::NotParty(_)));

        assert!(service.execute(cmd(fixture.landlord.id)).await.is_ok());
        let err = service.execute(cmd(fixture.landlord.id)).await.unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::Transition(TransitionError::Unexpected(
                Status::PendingLandlord
            )),
        ));
    }
}
