//! [`Command`] definition.

pub mod authorize_user_session;
pub mod cancel_agreement;
pub mod create_agreement;
pub mod expire_agreement;
pub mod initiate_agreement;
pub mod regenerate_agreement;
pub mod sign_agreement;

use std::collections::HashMap;

use common::operations::{By, Select};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        agreement::Role, notification::Topic, user, Agreement, Lease, User,
    },
    infra::{database, Database},
    Service,
};

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    authorize_user_session::AuthorizeUserSession,
    cancel_agreement::CancelAgreement, create_agreement::CreateAgreement,
    expire_agreement::ExpireAgreement, initiate_agreement::InitiateAgreement,
    regenerate_agreement::RegenerateAgreement, sign_agreement::SignAgreement,
};

impl<Db> Service<Db>
where
    Db: Database<
        Select<By<HashMap<user::Id, User>, [user::Id; 2]>>,
        Ok = HashMap<user::Id, User>,
        Err = Traced<database::Error>,
    >,
{
    /// Notifies the parties of the provided [`Lease`] about the provided
    /// [`Agreement`].
    ///
    /// Failures are logged only, so they never affect the outcome of a
    /// [`Command`].
    async fn notify_parties(
        &self,
        lease: &Lease,
        agreement: &Agreement,
        notifications: impl IntoIterator<Item = (Role, Topic)>,
    ) {
        let parties = match self
            .database()
            .execute(Select(By::new([lease.landlord_id, lease.tenant_id])))
            .await
        {
            Ok(parties) => parties,
            Err(e) => {
                log::warn!(
                    "failed to resolve parties of `Lease(id: {})` to notify: \
                     {e}",
                    lease.id,
                );
                return;
            }
        };

        for (role, topic) in notifications {
            if let Some(recipient) = parties.get(&lease.party(role)) {
                self.notifier().notify(recipient, agreement, lease, topic);
            }
        }
    }
}
