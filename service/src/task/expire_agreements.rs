//! [`ExpireAgreements`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::operations::{By, Perform, Select, Start};
use tokio::time::interval;
use tracerr::Traced;
use tracing as log;

use crate::{
    command::{self, Command},
    domain::{agreement, Agreement},
    infra::{database, Database},
    Service,
};

use super::Task;

/// Configuration for [`ExpireAgreements`] [`Task`].
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Interval between sweeps of overdue [`Agreement`]s.
    pub interval: time::Duration,
}

/// [`Task`] persisting the expiration of overdue pending [`Agreement`]s.
#[derive(Clone, Copy, Debug)]
pub struct ExpireAgreements<S> {
    /// [`Service`] instance.
    service: S,
}

impl<Db> Task<Start<By<ExpireAgreements<Self>, Config>>> for Service<Db>
where
    ExpireAgreements<Service<Db>>: Task<Perform<()>, Ok = usize, Err: Error>
        + Send
        + Sync
        + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<ExpireAgreements<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = ExpireAgreements {
            service: self.clone(),
        };

        let mut interval = interval(config.interval);
        loop {
            let _ = interval.tick().await;
            match task.execute(Perform(())).await {
                Ok(0) => {}
                Ok(n) => log::info!("{n} overdue `Agreement`s expired"),
                Err(e) => log::error!("`task::ExpireAgreements` failed: {e}"),
            }
        }
    }
}

impl<Db> Task<Perform<()>> for ExpireAgreements<Service<Db>>
where
    Db: Database<
        Select<By<Vec<Agreement>, agreement::ExpirationDateTime>>,
        Ok = Vec<Agreement>,
        Err = Traced<database::Error>,
    >,
    Service<Db>: Command<
        command::ExpireAgreement,
        Ok = Agreement,
        Err = Traced<command::expire_agreement::ExecutionError>,
    >,
{
    type Ok = usize;
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let overdue = self
            .service
            .database()
            .execute(Select(By::new(agreement::ExpirationDateTime::now())))
            .await
            .map_err(tracerr::map_from_and_wrap!())?;

        let mut expired = 0;
        for agreement in overdue {
            let id = agreement.id;
            match self
                .service
                .execute(command::ExpireAgreement { agreement })
                .await
            {
                Ok(a) => {
                    if a.status == agreement::Status::Expired {
                        expired += 1;
                    }
                }
                Err(e) => {
                    log::warn!("failed to expire `Agreement(id: {id})`: {e}");
                }
            }
        }
        Ok(expired)
    }
}

/// Error of [`ExpireAgreements`] execution.
pub type ExecutionError = Traced<database::Error>;

#[cfg(test)]
mod spec {
    use common::{
        operations::{By, Insert, Perform, Select},
        DateTime,
    };

    use crate::{
        domain::{agreement, audit, Agreement},
        infra::{Database as _, Memory},
        test_fixtures,
    };

    use super::{ExpireAgreements, Task as _};

    #[tokio::test]
    async fn expires_only_overdue_pending() {
        let db = Memory::default();
        let service = test_fixtures::service(db.clone());
        let fixture = test_fixtures::lease(&db).await;

        let past = DateTime::from_rfc3339("2020-01-01T00:00:00Z").unwrap();
        let mut overdue =
            Agreement::new(fixture.lease.id, &fixture.document, past);
        overdue.initiate(1, past).unwrap();
        assert!(db.execute(Insert(overdue.clone())).await.unwrap());

        let other = test_fixtures::lease(&db).await;
        let mut fresh =
            Agreement::new(other.lease.id, &other.document, DateTime::now());
        fresh.initiate(7, DateTime::now()).unwrap();
        assert!(db.execute(Insert(fresh.clone())).await.unwrap());

        let task = ExpireAgreements { service };
        assert_eq!(task.execute(Perform(())).await.unwrap(), 1);
        assert_eq!(task.execute(Perform(())).await.unwrap(), 0);

        let stored = db
            .execute(Select(By::<Option<Agreement>, _>::new(overdue.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, agreement::Status::Expired);
        let stored = db
            .execute(Select(By::<Option<Agreement>, _>::new(fresh.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, agreement::Status::PendingLandlord);

        let trail = db
            .execute(Select(By::<Vec<audit::Entry>, _>::new(overdue.id)))
            .await
            .unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, audit::Action::Expired);
        assert_eq!(trail[0].actor_id, None);
    }
}
