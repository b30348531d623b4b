//! [`Http`] [`Mailer`] definitions.

use std::time::Duration;

use common::operations::Deliver;
use secrecy::{ExposeSecret as _, SecretString};
use serde_json::json;
use tracerr::Traced;

use crate::domain::{notification::Email, user};

use super::{Error, Mailer};

/// [`Http`] [`Mailer`] configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// URL of the email API endpoint accepting messages.
    pub url: String,

    /// Bearer key authorizing requests to the email API.
    pub api_key: SecretString,

    /// Address the [`Email`]s are sent from.
    pub from: user::Email,

    /// Timeout of a single request.
    pub timeout: Duration,
}

/// [`Mailer`] posting [`Email`]s to an HTTP email API as JSON.
#[derive(Clone, Debug)]
pub struct Http {
    /// [`Config`] of this [`Http`] transport.
    config: Config,

    /// Underlying HTTP client.
    client: reqwest::Client,
}

impl Http {
    /// Creates a new [`Http`] transport with the provided [`Config`].
    ///
    /// # Errors
    ///
    /// If the HTTP client cannot be initialized.
    pub fn new(config: Config) -> Result<Self, Traced<Error>> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(tracerr::from_and_wrap!(=> Error))?;
        Ok(Self { config, client })
    }
}

impl Mailer<Deliver<Email>> for Http {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Deliver(email): Deliver<Email>,
    ) -> Result<Self::Ok, Self::Err> {
        let Email {
            to,
            to_name,
            subject,
            body,
        } = email;

        let resp = self
            .client
            .post(&self.config.url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&json!({
                "from": AsRef::<str>::as_ref(&self.config.from),
                "to": format!("{to_name} <{to}>"),
                "subject": subject,
                "text": body,
            }))
            .send()
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(tracerr::new!(Error::Rejected(status)));
        }
        Ok(())
    }
}
