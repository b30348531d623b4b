//! [`DispatchNotifications`] [`Task`].

use std::{convert::Infallible, error::Error};

use common::operations::{Deliver, Perform};
use tokio::sync::{mpsc, Mutex};
use tracing as log;

use crate::{
    domain::{
        notification::{Email, Topic},
        Agreement, Lease, Notification, User,
    },
    infra::Mailer,
};

use super::Task;

/// Handle enqueueing [`Notification`]s for the [`DispatchNotifications`]
/// [`Task`].
///
/// Enqueueing never blocks and never fails the caller.
#[derive(Clone, Debug)]
pub struct Notifier(mpsc::UnboundedSender<Notification>);

impl Notifier {
    /// Enqueues a [`Notification`] about the provided [`Agreement`] for the
    /// provided [`User`].
    ///
    /// [`User`]s without an email address are skipped.
    pub fn notify(
        &self,
        recipient: &User,
        agreement: &Agreement,
        lease: &Lease,
        topic: Topic,
    ) {
        let Some(notification) = Notification::new(
            recipient,
            agreement,
            lease.property_address.as_ref(),
            topic,
        ) else {
            log::debug!(
                "`User(id: {})` has no email, skipping notification",
                recipient.id,
            );
            return;
        };

        if self.0.send(notification).is_err() {
            log::warn!("notifications queue is closed, notification dropped");
        }
    }
}

/// [`Task`] delivering enqueued [`Notification`]s via a [`Mailer`].
///
/// Finishes once every [`Notifier`] is dropped.
#[derive(Debug)]
pub struct DispatchNotifications<M> {
    /// [`Mailer`] to deliver [`Email`]s with.
    mailer: M,

    /// Queue of [`Notification`]s to deliver.
    queue: Mutex<mpsc::UnboundedReceiver<Notification>>,
}

impl<M> DispatchNotifications<M> {
    /// Creates a new [`DispatchNotifications`] [`Task`] along with the
    /// [`Notifier`] feeding it.
    #[must_use]
    pub fn new(mailer: M) -> (Notifier, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Notifier(tx),
            Self {
                mailer,
                queue: Mutex::new(rx),
            },
        )
    }
}

impl<M> Task<Perform<()>> for DispatchNotifications<M>
where
    M: Mailer<Deliver<Email>, Ok = (), Err: Error>,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let mut queue = self.queue.lock().await;
        while let Some(notification) = queue.recv().await {
            let email = notification.email();
            let to = email.to.clone();
            if let Err(e) = self.mailer.execute(Deliver(email)).await {
                log::warn!(
                    "failed to deliver notification about `Agreement(id: {})` \
                     to `{to}`: {e}",
                    notification.agreement.id,
                );
            }
        }
        log::debug!("notifications queue is closed, dispatching stopped");
        Ok(())
    }
}

#[cfg(test)]
mod spec {
    use std::{cell::RefCell, convert::Infallible};

    use common::{
        money::Currency,
        operations::{Deliver, Perform},
        DateTime, Money,
    };
    use time::macros::date;

    use crate::{
        domain::{
            agreement::{self, Document, Role},
            lease,
            notification::{Email, Topic},
            user, Agreement, Lease, User,
        },
        infra::Mailer,
    };

    use super::{DispatchNotifications, Task as _};

    /// [`Mailer`] recording subjects of the delivered [`Email`]s.
    #[derive(Debug, Default)]
    struct Recording(RefCell<Vec<(String, String)>>);

    impl Mailer<Deliver<Email>> for Recording {
        type Ok = ();
        type Err = Infallible;

        async fn execute(
            &self,
            Deliver(email): Deliver<Email>,
        ) -> Result<(), Infallible> {
            self.0
                .borrow_mut()
                .push((email.to.to_string(), email.subject));
            Ok(())
        }
    }

    fn user(email: Option<&str>) -> User {
        User {
            id: user::Id::new(),
            name: user::Name::new("Aminah Yusof").unwrap(),
            email: email.map(|e| user::Email::new(e).unwrap()),
            created_at: user::CreationDateTime::now(),
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn delivers_until_notifiers_dropped() {
        let (landlord, tenant) =
            (user(Some("landlord@rentverse.test")), user(None));
        let lease = Lease {
            id: lease::Id::new(),
            property_id: lease::PropertyId::new(),
            property_address: lease::PropertyAddress::new("7 Jalan Bukit")
                .unwrap(),
            landlord_id: landlord.id,
            tenant_id: tenant.id,
            start_date: date!(2025 - 04 - 01),
            end_date: date!(2026 - 03 - 31),
            monthly_rent: Money {
                amount: 1_800.into(),
                currency: Currency::Myr,
            },
            created_at: lease::CreationDateTime::now(),
        };
        let doc = Document::render(
            &lease,
            &landlord,
            &tenant,
            agreement::Version::FIRST,
        );
        let agreement = Agreement::new(lease.id, &doc, DateTime::now());

        let (notifier, task) = DispatchNotifications::new(Recording::default());
        notifier.notify(
            &landlord,
            &agreement,
            &lease,
            Topic::SigningReminder {
                role: Role::Landlord,
            },
        );
        notifier.notify(&tenant, &agreement, &lease, Topic::AgreementInitiated);
        drop(notifier);

        task.execute(Perform(())).await.unwrap();

        assert_eq!(
            task.mailer.0.into_inner(),
            [(
                "landlord@rentverse.test".to_owned(),
                "Rental agreement awaits your signature".to_owned(),
            )],
        );
    }
}
