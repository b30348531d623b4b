//! Postgres [`Database`] implementation.

pub mod client;
pub mod connection;
mod impls;
pub mod retry;

use deadpool_postgres::Runtime;
use derive_more::{Deref, Display, Error as StdError, From};
use tokio_postgres::{error::SqlState, NoTls};
use tracerr::Traced;

use crate::infra::database;
#[cfg(doc)]
use crate::infra::Database;

pub use refinery::embed_migrations;

pub use self::{
    client::{NonTx, Tx},
    connection::Connection,
};

pub use deadpool_postgres::Config;

/// Postgres [`Database`] client.
#[derive(Clone, Copy, Debug, Deref)]
pub struct Postgres<T = NonTx>(T);

impl Postgres {
    /// Creates a new [`Postgres`] client with the provided [`Config`],
    /// retrying connection checkouts according to the provided
    /// [`retry::Policy`].
    ///
    /// # Errors
    ///
    /// If failed to create a new [`Postgres`] client.
    pub fn new(
        conf: &Config,
        retry: retry::Policy,
    ) -> Result<Self, Traced<database::Error>> {
        let pool = conf
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)?;
        Ok(Self(NonTx::from_pool(pool, retry)))
    }
}

/// Postgres database [`Error`].
#[derive(Debug, Display, StdError, From)]
pub enum Error {
    /// [`Connection`] error.
    #[display("`Connection` error: {_0}")]
    Connection(connection::Error),

    /// Error of creating a new [`connection::Pool`] client.
    #[display("Failed to create a new `connection::Pool`: {_0}")]
    PoolCreationError(connection::PoolCreationError),

    /// [`connection::Pool`] error.
    #[display("`connection::Pool` error: {_0}")]
    PoolError(connection::PoolError),
}

impl Error {
    /// Checks if the error is transient, so the failed operation may succeed
    /// if retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        use connection::PoolError as E;

        match self {
            Self::Connection(e) | Self::PoolError(E::Backend(e)) => {
                is_transient(e)
            }
            Self::PoolError(e) => matches!(e, E::Timeout(_)),
            Self::PoolCreationError(_) => false,
        }
    }
}

/// Checks if the provided [`connection::Error`] is caused by a lost
/// connection or a server shutdown.
fn is_transient(e: &connection::Error) -> bool {
    e.is_closed()
        || e.code().is_some_and(|c| {
            c.code().starts_with("08") || *c == SqlState::ADMIN_SHUTDOWN
        })
}
