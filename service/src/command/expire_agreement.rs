//! [`Command`] for persisting the expiration of an [`Agreement`].

use common::{
    operations::{By, Commit, Expected, Insert, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{agreement, audit, Agreement},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for persisting the passive expiration of an [`Agreement`].
///
/// Returns the provided [`Agreement`] untouched if it's not overdue, or the
/// stored one if it has been changed concurrently.
#[derive(Clone, Debug)]
pub struct ExpireAgreement {
    /// [`Agreement`] to expire.
    pub agreement: Agreement,
}

impl<Db> Command<ExpireAgreement> for Service<Db>
where
    Db: Database<
            Select<By<Option<Agreement>, agreement::Id>>,
            Ok = Option<Agreement>,
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
        cmd: ExpireAgreement,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ExpireAgreement { mut agreement } = cmd;

        let now = DateTime::now();
        let revision = agreement.revision();
        if !agreement.expire(now) {
            return Ok(agreement);
        }

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
            drop(tx);
            return self
                .database()
                .execute(Select(By::<Option<Agreement>, _>::new(agreement.id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .ok_or(E::AgreementNotExists(agreement.id))
                .map_err(tracerr::wrap!());
        }
        let expires_at = agreement
            .expires_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_default();
        tx.execute(Insert(audit::Entry::new(
            agreement.id,
            None,
            audit::Action::Expired,
            audit::Metadata::default().with("expiresAt", expires_at),
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

/// Error of [`ExpireAgreement`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Agreement`] with the provided ID does not exist anymore.
    #[display("`Agreement(id: {_0})` does not exist")]
    AgreementNotExists(#[error(not(source))] agreement::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),
}

#[cfg(test)]
mod spec {
    use common::{
        operations::{By, Insert, Select},
        DateTime,
    };

    use crate::{
        domain::{agreement::Status, audit, Agreement},
        infra::{Database as _, Memory},
        test_fixtures, Command as _,
    };

    use super::ExpireAgreement;

    #[tokio::test]
    async fn leaves_fresh_agreement_untouched() {
        let db = Memory::default();
        let service = test_fixtures::service(db.clone());
        let fixture = test_fixtures::lease(&db).await;
        let agreement = test_fixtures::initiated(&db, &fixture).await;

        let result = service
            .execute(ExpireAgreement {
                agreement: agreement.clone(),
            })
            .await
            .unwrap();

        assert_eq!(result.status, Status::PendingLandlord);
        let trail = db
            .execute(Select(By::<Vec<audit::Entry>, _>::new(agreement.id)))
            .await
            .unwrap();
        assert!(trail.is_empty());
    }

    #[tokio::test]
    async fn returns_stored_agreement_when_raced() {
        let db = Memory::default();
        let service = test_fixtures::service(db.clone());
        let fixture = test_fixtures::lease(&db).await;

        let past = DateTime::from_rfc3339("2020-01-01T00:00:00Z").unwrap();
        let mut overdue = Agreement::new(fixture.lease.id, &fixture.document, past);
        overdue.initiate(1, past).unwrap();
        assert!(db.execute(Insert(overdue.clone())).await.unwrap());

        let expired = service
            .execute(ExpireAgreement {
                agreement: overdue.clone(),
            })
            .await
            .unwrap();
        assert_eq!(expired.status, Status::Expired);

        // Stale snapshot is still pending, but the stored one is expired.
        let again = service
            .execute(ExpireAgreement { agreement: overdue })
            .await
            .unwrap();
        assert_eq!(again.status, Status::Expired);

        let trail = db
            .execute(Select(By::<Vec<audit::Entry>, _>::new(expired.id)))
            .await
            .unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, audit::Action::Expired);
        assert_eq!(trail[0].actor_id, None);
    }
}
