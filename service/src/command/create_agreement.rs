//! [`Command`] for creating a new [`Agreement`] of a [`Lease`].

use std::collections::HashMap;

use common::{
    operations::{By, Commit, Insert, Select, Transact, Transacted},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        agreement::{self, Document, Role},
        audit, lease,
        notification::Topic,
        user, Agreement, Lease, User,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for creating a new [`Agreement`] of a [`Lease`].
#[derive(Clone, Copy, Debug)]
pub struct CreateAgreement {
    /// ID of the [`Lease`] to create the [`Agreement`] for.
    pub lease_id: lease::Id,

    /// ID of the [`User`] creating the [`Agreement`].
    pub initiator_id: user::Id,
}

impl<Db> Command<CreateAgreement> for Service<Db>
where
    Db: Database<
            Select<By<Option<Lease>, lease::Id>>,
            Ok = Option<Lease>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Agreement>, lease::Id>>,
            Ok = Option<Agreement>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<HashMap<user::Id, User>, [user::Id; 2]>>,
            Ok = HashMap<user::Id, User>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<Insert<Agreement>, Ok = bool, Err = Traced<database::Error>>
        + Database<Insert<audit::Entry>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Agreement;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateAgreement,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateAgreement {
            lease_id,
            initiator_id,
        } = cmd;

        let lease = self
            .database()
            .execute(Select(By::<Option<Lease>, _>::new(lease_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::LeaseNotExists(lease_id))
            .map_err(tracerr::wrap!())?;

        if lease.role_of(initiator_id) != Some(Role::Landlord) {
            return Err(tracerr::new!(E::NotLandlord(initiator_id)));
        }

        let existing = self
            .database()
            .execute(Select(By::<Option<Agreement>, _>::new(lease_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if existing.is_some() {
            return Err(tracerr::new!(E::AgreementExists(lease_id)));
        }

        let parties = self
            .database()
            .execute(Select(By::<HashMap<_, User>, _>::new([
                lease.landlord_id,
                lease.tenant_id,
            ])))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let party = |id: user::Id| {
            parties
                .get(&id)
                .ok_or(E::PartyNotExists(id))
                .map_err(tracerr::wrap!())
        };
        let (landlord, tenant) =
            (party(lease.landlord_id)?, party(lease.tenant_id)?);

        let now = DateTime::now();
        let document =
            Document::render(&lease, landlord, tenant, agreement::Version::FIRST);
        let agreement = Agreement::new(lease.id, &document, now);

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let inserted = tx
            .execute(Insert(agreement.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if !inserted {
            return Err(tracerr::new!(E::AgreementExists(lease_id)));
        }
        tx.execute(Insert(audit::Entry::new(
            agreement.id,
            Some(initiator_id),
            audit::Action::Created,
            audit::Metadata::default()
                .with("version", i32::from(agreement.current_version))
                .with("documentHash", agreement.document_hash.to_string()),
            now,
        )))
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))
        .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        self.notifier().notify(
            tenant,
            &agreement,
            &lease,
            Topic::BookingConfirmation,
        );

        Ok(agreement)
    }
}

/// Error of [`CreateAgreement`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Lease`] already has an [`Agreement`].
    #[display("`Lease(id: {_0})` already has an `Agreement`")]
    AgreementExists(#[error(not(source))] lease::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Lease`] with the provided ID does not exist.
    #[display("`Lease(id: {_0})` does not exist")]
    LeaseNotExists(#[error(not(source))] lease::Id),

    /// [`User`] is not the landlord of the [`Lease`].
    #[display("`User(id: {_0})` is not the landlord")]
    NotLandlord(#[error(not(source))] user::Id),

    /// Party of the [`Lease`] does not exist.
    #[display("`User(id: {_0})` does not exist")]
    PartyNotExists(#[error(not(source))] user::Id),
}
