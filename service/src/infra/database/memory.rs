//! In-memory [`Database`] implementation.

use std::{collections::HashMap, sync::Arc};

use common::operations::{By, Commit, Expected, Insert, Select, Transact, Update};
#[cfg(test)]
use tokio::sync::Barrier;
use tokio::sync::Mutex;
use tracerr::Traced;

use crate::{
    domain::{agreement, audit, lease, user, Agreement, Lease, User},
    infra::{database, Database},
};

/// Maximum number of overdue [`Agreement`]s returned at once.
const EXPIRATION_BATCH: usize = 100;

/// In-memory [`Database`] keeping everything in a shared state.
///
/// Transactions are not isolated: every operation is applied immediately,
/// while each single operation is atomic.
#[derive(Clone, Debug, Default)]
pub struct Memory(Arc<Mutex<State>>);

/// State of the [`Memory`] database.
#[derive(Debug, Default)]
struct State {
    /// Stored [`Agreement`]s.
    agreements: HashMap<agreement::Id, Agreement>,

    /// Stored [`Lease`]s.
    leases: HashMap<lease::Id, Lease>,

    /// Stored [`User`]s.
    users: HashMap<user::Id, User>,

    /// Stored [`audit::Entry`]s in the insertion order.
    audit: Vec<audit::Entry>,

    /// [`Barrier`] the next [`Agreement`] reads by ID wait on, along with the
    /// number of reads still to hold.
    #[cfg(test)]
    read_barrier: Option<(Arc<Barrier>, usize)>,
}

impl Memory {
    /// Stores the provided [`Lease`], replacing the existing one.
    pub async fn put_lease(&self, lease: Lease) {
        drop(self.0.lock().await.leases.insert(lease.id, lease));
    }

    /// Stores the provided [`User`], replacing the existing one.
    pub async fn put_user(&self, user: User) {
        drop(self.0.lock().await.users.insert(user.id, user));
    }

    /// Makes the next `readers` [`Agreement`] reads by ID return only once
    /// all of them have read, so concurrent operations act on the same
    /// snapshot.
    #[cfg(test)]
    pub(crate) async fn hold_reads(&self, readers: usize) {
        self.0.lock().await.read_barrier =
            Some((Arc::new(Barrier::new(readers)), readers));
    }
}

/// Waits on the [`Barrier`] set by [`Memory::hold_reads()`], if any.
#[cfg(test)]
async fn hold_read(mut state: tokio::sync::MutexGuard<'_, State>) {
    let Some((barrier, left)) = state.read_barrier.as_mut() else {
        return;
    };
    let barrier = Arc::clone(barrier);
    *left -= 1;
    if *left == 0 {
        state.read_barrier = None;
    }
    drop(state);
    _ = barrier.wait().await;
}

/// Shortcut for a result of a [`Memory`] operation.
type Result<T> = std::result::Result<T, Traced<database::Error>>;

impl Database<Transact> for Memory {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok> {
        Ok(self.clone())
    }
}

impl Database<Commit> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok> {
        Ok(())
    }
}

impl Database<Select<By<Option<Agreement>, agreement::Id>>> for Memory {
    type Ok = Option<Agreement>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Agreement>, agreement::Id>>,
    ) -> Result<Self::Ok> {
        let state = self.0.lock().await;
        let agreement = state.agreements.get(&by.into_inner()).cloned();
        #[cfg(test)]
        hold_read(state).await;

        Ok(agreement)
    }
}

impl Database<Select<By<Option<Agreement>, lease::Id>>> for Memory {
    type Ok = Option<Agreement>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Agreement>, lease::Id>>,
    ) -> Result<Self::Ok> {
        let lease_id = by.into_inner();
        Ok(self
            .0
            .lock()
            .await
            .agreements
            .values()
            .find(|a| a.lease_id == lease_id)
            .cloned())
    }
}

impl Database<Select<By<Vec<Agreement>, agreement::ExpirationDateTime>>>
    for Memory
{
    type Ok = Vec<Agreement>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Agreement>, agreement::ExpirationDateTime>>,
    ) -> Result<Self::Ok> {
        use agreement::Status as S;

        let deadline = by.into_inner();
        Ok(self
            .0
            .lock()
            .await
            .agreements
            .values()
            .filter(|a| {
                matches!(a.status, S::PendingLandlord | S::PendingTenant)
                    && a.expires_at.is_some_and(|at| at < deadline)
            })
            .take(EXPIRATION_BATCH)
            .cloned()
            .collect())
    }
}

impl Database<Insert<Agreement>> for Memory {
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(agreement): Insert<Agreement>,
    ) -> Result<Self::Ok> {
        let mut state = self.0.lock().await;
        if state
            .agreements
            .values()
            .any(|a| a.id == agreement.id || a.lease_id == agreement.lease_id)
        {
            return Ok(false);
        }
        drop(state.agreements.insert(agreement.id, agreement));
        Ok(true)
    }
}

impl Database<Update<Expected<Agreement, agreement::Revision>>> for Memory {
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(expected): Update<Expected<Agreement, agreement::Revision>>,
    ) -> Result<Self::Ok> {
        let Expected { value, state } = expected;
        let mut db = self.0.lock().await;
        match db.agreements.get_mut(&value.id) {
            Some(stored) if stored.revision() == state => {
                *stored = value;
                Ok(true)
            }
            Some(_) | None => Ok(false),
        }
    }
}

impl Database<Select<By<Option<Lease>, lease::Id>>> for Memory {
    type Ok = Option<Lease>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Lease>, lease::Id>>,
    ) -> Result<Self::Ok> {
        Ok(self.0.lock().await.leases.get(&by.into_inner()).cloned())
    }
}

impl Database<Select<By<Option<User>, user::Id>>> for Memory {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok> {
        Ok(self
            .0
            .lock()
            .await
            .users
            .get(&by.into_inner())
            .filter(|u| u.deleted_at.is_none())
            .cloned())
    }
}

impl<IDs> Database<Select<By<HashMap<user::Id, User>, IDs>>> for Memory
where
    IDs: AsRef<[user::Id]>,
{
    type Ok = HashMap<user::Id, User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<user::Id, User>, IDs>>,
    ) -> Result<Self::Ok> {
        let ids = by.into_inner();
        let state = self.0.lock().await;
        Ok(ids
            .as_ref()
            .iter()
            .filter_map(|id| state.users.get(id))
            .filter(|u| u.deleted_at.is_none())
            .map(|u| (u.id, u.clone()))
            .collect())
    }
}

impl Database<Insert<audit::Entry>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, Insert(entry): Insert<audit::Entry>) -> Result<()> {
        self.0.lock().await.audit.push(entry);
        Ok(())
    }
}

impl Database<Select<By<Vec<audit::Entry>, agreement::Id>>> for Memory {
    type Ok = Vec<audit::Entry>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<audit::Entry>, agreement::Id>>,
    ) -> Result<Self::Ok> {
        let agreement_id = by.into_inner();
        Ok(self
            .0
            .lock()
            .await
            .audit
            .iter()
            .filter(|e| e.agreement_id == agreement_id)
            .cloned()
            .collect())
    }
}
