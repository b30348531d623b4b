//! [`Mailer`] transports delivering [`Email`]s.

pub mod http;

use common::operations::Deliver;
use derive_more::{Display, Error as StdError, From};
use tracerr::Traced;
use tracing as log;

use crate::domain::notification::Email;

pub use self::http::Http;

/// Mail transport.
pub use common::Handler as Mailer;

/// [`Mailer`] writing [`Email`]s to the log instead of delivering them.
#[derive(Clone, Copy, Debug, Default)]
pub struct Log;

impl Mailer<Deliver<Email>> for Log {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Deliver(email): Deliver<Email>,
    ) -> Result<Self::Ok, Self::Err> {
        log::info!(
            to = %email.to,
            subject = %email.subject,
            "email delivered to the log:\n{}",
            email.body,
        );
        Ok(())
    }
}

/// [`Mailer`] selected by configuration.
#[derive(Clone, Debug)]
pub enum Transport {
    /// [`Log`] transport.
    Log(Log),

    /// [`Http`] transport.
    Http(Http),
}

impl Default for Transport {
    fn default() -> Self {
        Self::Log(Log)
    }
}

impl Mailer<Deliver<Email>> for Transport {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        deliver: Deliver<Email>,
    ) -> Result<Self::Ok, Self::Err> {
        match self {
            Self::Log(m) => m.execute(deliver).await,
            Self::Http(m) => m.execute(deliver).await,
        }
    }
}

/// [`Mailer`] error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    /// HTTP request to the email API failed.
    #[display("HTTP request failed: {_0}")]
    Request(reqwest::Error),

    /// Email API refused to accept the [`Email`].
    #[display("Email API responded with `{_0}` status")]
    #[from(ignore)]
    Rejected(#[error(not(source))] reqwest::StatusCode),
}

#[cfg(test)]
mod spec {
    use common::operations::Deliver;

    use crate::domain::{notification::Email, user};

    use super::{Mailer as _, Transport};

    #[tokio::test]
    async fn logs_by_default() {
        let email = Email {
            to: user::Email::new("tenant@rentverse.test").unwrap(),
            to_name: user::Name::new("Daniel Lee").unwrap(),
            subject: "Rental agreement is signed".into(),
            body: "Dear Daniel Lee,".into(),
        };

        let transport = Transport::default();

        assert!(matches!(transport, Transport::Log(_)));
        assert!(transport.execute(Deliver(email)).await.is_ok());
    }
}
