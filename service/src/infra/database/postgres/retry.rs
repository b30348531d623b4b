//! Retrying of transient [`Postgres`] failures.

use std::{future::Future, time::Duration};

use smart_default::SmartDefault;
use tracerr::Traced;
use tracing as log;

use crate::infra::database;
#[cfg(doc)]
use crate::infra::Postgres;

/// Policy of retrying transient [`Postgres`] failures with an exponential
/// backoff.
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Policy {
    /// Maximum number of attempts, including the first one.
    #[default(3)]
    pub attempts: u32,

    /// Delay before the first retry, doubled on every next one.
    #[default(Duration::from_millis(100))]
    pub backoff: Duration,

    /// Upper bound of the delay between retries.
    #[default(Duration::from_secs(5))]
    pub max_backoff: Duration,
}

impl Policy {
    /// Runs the provided `op`eration, retrying it while it fails with a
    /// transient [`database::Error`].
    ///
    /// # Errors
    ///
    /// With the last error if every attempt fails, or with the first
    /// non-transient one.
    pub async fn run<T, F, Fut>(
        &self,
        mut op: F,
    ) -> Result<T, Traced<database::Error>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Traced<database::Error>>>,
    {
        let mut delay = self.backoff.min(self.max_backoff);
        let mut attempt = 1;
        loop {
            match op().await {
                Err(e)
                    if attempt < self.attempts && e.as_ref().is_transient() =>
                {
                    log::warn!(
                        "`Postgres` attempt {attempt}/{} failed, retrying in \
                         {delay:?}: {e}",
                        self.attempts,
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(self.max_backoff);
                    attempt += 1;
                }
                res => return res,
            }
        }
    }
}

#[cfg(test)]
mod spec {
    use std::{
        sync::atomic::{AtomicU32, Ordering},
        time::Duration,
    };

    use crate::infra::database::{self, postgres};

    use super::Policy;

    fn transient() -> tracerr::Traced<database::Error> {
        tracerr::new!(database::Error::from(postgres::Error::PoolError(
            postgres::connection::PoolError::Timeout(
                postgres::connection::TimeoutType::Wait,
            ),
        )))
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = Policy::default();

        let res = policy
            .run(|| async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(transient())
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(res.ok(), Some(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_attempts() {
        let calls = AtomicU32::new(0);
        let policy = Policy {
            attempts: 2,
            backoff: Duration::from_millis(10),
            ..Policy::default()
        };

        let res = policy
            .run(|| async {
                _ = calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(transient())
            })
            .await;

        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn caps_first_delay() {
        let policy = Policy {
            attempts: 2,
            backoff: Duration::from_secs(60),
            max_backoff: Duration::from_secs(1),
        };
        let started = tokio::time::Instant::now();

        let res = policy
            .run(|| async { Err::<(), _>(transient()) })
            .await;

        assert!(res.is_err());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(1), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "{elapsed:?}");
    }
}
