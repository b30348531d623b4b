//! Service contains the business logic of the application.
//!
//! List of available Cargo features:
#![doc = document_features::document_features!()]
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod command;
pub mod domain;
pub mod infra;
pub mod query;
pub mod read;
pub mod task;
#[cfg(test)]
mod test_fixtures;

use std::error::Error;

use common::operations::{By, Deliver, Perform, Start};
use derive_more::Debug;
use smart_default::SmartDefault;

#[cfg(doc)]
use infra::Database;
use infra::Mailer;

use self::domain::notification::Email;

pub use self::{
    command::Command, query::Query, task::dispatch_notifications::Notifier,
    task::Task,
};

/// [`Service`] configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// [JWT] decoding key of [`domain::user::Session`] tokens.
    ///
    /// [JWT]: https://datatracker.ietf.org/doc/html/rfc7519
    #[debug(skip)]
    pub jwt_decoding_key: jsonwebtoken::DecodingKey,

    /// [`AgreementConfig`] of the signing workflow.
    pub agreement: AgreementConfig,

    /// [`task::ExpireAgreements`] configuration.
    pub expire_agreements: task::expire_agreements::Config,
}

/// Configuration of the [`domain::Agreement`] signing workflow.
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct AgreementConfig {
    /// Number of days given to sign an [`domain::Agreement`] when not
    /// specified on initiation.
    #[default(7)]
    pub default_expires_in_days: u16,

    /// Maximum number of days which may be given to sign an
    /// [`domain::Agreement`].
    #[default(90)]
    pub max_expires_in_days: u16,
}

/// Domain service.
#[derive(Clone, Debug)]
pub struct Service<Db> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Database`] of this [`Service`].
    database: Db,

    /// [`Notifier`] of this [`Service`].
    notifier: Notifier,
}

impl<Db> Service<Db> {
    /// Creates a new [`Service`] with the provided parameters.
    ///
    /// Returned [`task::Background`] runs [`task::ExpireAgreements`] and
    /// delivers [`domain::Notification`]s via the provided [`Mailer`].
    pub fn new<M>(
        config: Config,
        database: Db,
        mailer: M,
    ) -> (Self, task::Background)
    where
        Self: Task<
                Start<
                    By<
                        task::ExpireAgreements<Self>,
                        task::expire_agreements::Config,
                    >,
                >,
                Ok = (),
                Err: Error,
            > + Clone
            + 'static,
        M: Mailer<Deliver<Email>, Ok = (), Err: Error> + 'static,
    {
        let (notifier, dispatch) = task::DispatchNotifications::new(mailer);
        let this = Service {
            config,
            database,
            notifier,
        };

        let mut bg = task::Background::default();
        bg.spawn(async move { dispatch.execute(Perform(())).await });
        let svc = this.clone();
        bg.spawn(async move {
            svc.execute(Start(By::new(svc.config().expire_agreements)))
                .await
        });

        (this, bg)
    }

    /// Returns [`Config`] of this [`Service`].
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns [`Database`] of this [`Service`].
    #[must_use]
    pub fn database(&self) -> &Db {
        &self.database
    }

    /// Returns [`Notifier`] of this [`Service`].
    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }
}
