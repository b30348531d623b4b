//! [`Command`] for cancelling an [`Agreement`].

use std::collections::HashMap;

use common::{
    operations::{By, Commit, Expected, Insert, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        agreement::{self, CancelReason, Role, TransitionError},
        audit,
        notification::Topic,
        lease, user, Agreement, Lease, User,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for cancelling an [`Agreement`].
#[derive(Clone, Debug)]
pub struct CancelAgreement {
    /// ID of the [`Agreement`] to cancel.
    pub agreement_id: agreement::Id,

    /// ID of the [`User`] cancelling the [`Agreement`].
    pub initiator_id: user::Id,

    /// Reason of the cancellation.
    pub reason: String,
}

impl<Db> Command<CancelAgreement> for Service<Db>
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
        cmd: CancelAgreement,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CancelAgreement {
            agreement_id,
            initiator_id,
            reason,
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

        let reason = CancelReason::new(reason)
            .ok_or(E::ReasonRequired)
            .map_err(tracerr::wrap!())?;

        let now = DateTime::now();
        let revision = agreement.revision();
        agreement
            .cancel(reason.clone(), now)
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
            audit::Action::Cancelled,
            audit::Metadata::default().with("reason", reason.to_string()),
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
            [(Role::Tenant, Topic::AgreementCancelled { reason })],
        )
        .await;

        Ok(agreement)
    }
}

/// Error of [`CancelAgreement`] [`Command`] execution.
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

    /// Provided [`CancelReason`] is blank.
    #[display("Cancellation reason is blank")]
    ReasonRequired,

    /// [`Agreement`] cannot be cancelled in its current state.
    #[display("Cannot cancel `Agreement`: {_0}")]
    #[from]
    Transition(TransitionError),
}

#[cfg(test)]
mod spec {
    use common::operations::{By, Select};

    use crate::{
        command::{sign_agreement, SignAgreement},
        domain::{
            agreement::{Role, Status, TransitionError},
            audit,
        },
        infra::{Database as _, Memory},
        test_fixtures, Command as _,
    };

    use super::{CancelAgreement, ExecutionError};

    #[tokio::test]
    async fn cancels_pending_agreement() {
        let db = Memory::default();
        let service = test_fixtures::service(db.clone());
        let fixture = test_fixtures::lease(&db).await;
        let agreement = test_fixtures::initiated(&db, &fixture).await;

        let cancelled = service
            .execute(CancelAgreement {
                agreement_id: agreement.id,
                initiator_id: fixture.landlord.id,
                reason: "  Property sold  ".into(),
            })
            .await
            .unwrap();

        assert_eq!(cancelled.status, Status::Cancelled);
        let cancellation = cancelled.cancellation.unwrap();
        assert_eq!(AsRef::<str>::as_ref(&cancellation.reason), "Property sold");

        let trail = db
            .execute(Select(By::<Vec<audit::Entry>, _>::new(agreement.id)))
            .await
            .unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, audit::Action::Cancelled);
        assert_eq!(
            trail[0].metadata.get("reason"),
            Some(&serde_json::json!("Property sold")),
        );

        let err = service
            .execute(SignAgreement {
                agreement_id: agreement.id,
                signer_id: fixture.landlord.id,
                role: Role::Landlord,
                signature: "abc".into(),
                confirmed: true,
                ip_address: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            sign_agreement::ExecutionError::Transition(
                TransitionError::Finalized(Status::Cancelled)
            ),
        ));
    }

    #[tokio::test]
    async fn checks_landlord_reason_then_state() {
        let db = Memory::default();
        let service = test_fixtures::service(db.clone());
        let fixture = test_fixtures::lease(&db).await;
        let agreement = test_fixtures::draft(&db, &fixture).await;
        let cmd = |initiator_id, reason: &str| CancelAgreement {
            agreement_id: agreement.id,
            initiator_id,
            reason: reason.into(),
        };

        let err = service
            .execute(cmd(fixture.tenant.id, ""))
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::NotLandlord(_)));

        let err = service
            .execute(cmd(fixture.landlord.id, " \t"))
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::ReasonRequired));

        assert!(service
            .execute(cmd(fixture.landlord.id, "Changed plans"))
            .await
            .is_ok());
        let err = service
            .execute(cmd(fixture.landlord.id, "Again"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::Transition(TransitionError::Finalized(
                Status::Cancelled
            )),
        ));
    }
}
