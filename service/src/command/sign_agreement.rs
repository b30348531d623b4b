//! [`Command`] for signing an [`Agreement`].

use std::{collections::HashMap, net::IpAddr};

use common::{
    operations::{By, Commit, Expected, Insert, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Debug, Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        agreement::{self, Role, SignHash, Signature, TransitionError},
        audit,
        notification::Topic,
        lease, user, Agreement, Lease, User,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for signing an [`Agreement`] in the provided [`Role`].
#[derive(Clone, Debug)]
pub struct SignAgreement {
    /// ID of the [`Agreement`] to sign.
    pub agreement_id: agreement::Id,

    /// ID of the [`User`] signing the [`Agreement`].
    pub signer_id: user::Id,

    /// [`Role`] the [`User`] signs the [`Agreement`] in.
    pub role: Role,

    /// Raw [`Signature`] payload.
    #[debug(skip)]
    pub signature: String,

    /// Indicator whether the [`User`] explicitly confirmed the signing.
    pub confirmed: bool,

    /// IP address the [`User`] signs from, if known.
    pub ip_address: Option<IpAddr>,
}

impl<Db> Command<SignAgreement> for Service<Db>
where
    Db: Database<
            Select<By<Option<Agreement>, agreement::Id>>,
            Ok = Option<Agreement>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Lease>, lease::Id>>,
            Ok = Option<Lease>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<HashMap<user::Id, User>, [user::Id; 2]>>,
            Ok = HashMap<user::Id, User>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Update<Expected<Agreement, agreement::Revision>>,
            Ok = bool,
            Err = Traced<database::Error>,
        > + Database<Insert<audit::Entry>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Agreement;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: SignAgreement) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let SignAgreement {
            agreement_id,
            signer_id,
            role,
            signature,
            confirmed,
            ip_address,
        } = cmd;

        let mut agreement = self
            .database()
            .execute(Select(By::<Option<Agreement>, _>::new(agreement_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::AgreementNotExists(agreement_id))
            .map_err(tracerr::wrap!())?;
        let lease = self
            .database()
            .execute(Select(By::<Option<Lease>, _>::new(agreement.lease_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::LeaseNotExists(agreement.lease_id))
            .map_err(tracerr::wrap!())?;

        let actual = lease
            .role_of(signer_id)
            .ok_or(E::NotParty(signer_id))
            .map_err(tracerr::wrap!())?;
        if actual != role {
            return Err(tracerr::new!(E::WrongRole(role)));
        }

        let now = DateTime::now();
        agreement
            .check_signable(role, now)
            .map_err(tracerr::from_and_wrap!(=> E))?;
        let signature = Signature::new(signature)
            .ok_or(E::SignatureRequired)
            .map_err(tracerr::wrap!())?;
        if !confirmed {
            return Err(tracerr::new!(E::ConfirmationRequired));
        }

        let hash = SignHash::new(&signature, ip_address, now.coerce());
        let truncated_hash = hash.truncated();
        let revision = agreement.revision();
        agreement
            .sign(role, hash, now)
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let updated = tx
            .execute(Update(Expected::new(agreement.clone(), revision)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if !updated {
            return Err(tracerr::new!(E::ConcurrentModification(agreement_id)));
        }
        tx.execute(Insert(audit::Entry::new(
            agreement_id,
            Some(signer_id),
            audit::Action::from(role),
            audit::Metadata::default()
                .with("ipAddress", ip_address.map(|ip| ip.to_string()))
                .with("signHash", truncated_hash)
                .with("version", i32::from(agreement.current_version)),
            now,
        )))
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))
        .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        match role {
            Role::Landlord => {
                self.notify_parties(
                    &lease,
                    &agreement,
                    [(Role::Tenant, Topic::SigningReminder { role: Role::Tenant })],
                )
                .await;
            }
            Role::Tenant => {
                self.notify_parties(
                    &lease,
                    &agreement,
                    [
                        (Role::Landlord, Topic::AgreementCompleted),
                        (Role::Tenant, Topic::AgreementCompleted),
                    ],
                )
                .await;
            }
        }

        Ok(agreement)
    }
}

/// Error of [`SignAgreement`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Agreement`] with the provided ID does not exist.
    #[display("`Agreement(id: {_0})` does not exist")]
    AgreementNotExists(#[error(not(source))] agreement::Id),

    /// [`Agreement`] was modified by another operation in the meantime.
    #[display("`Agreement(id: {_0})` was modified concurrently")]
    ConcurrentModification(#[error(not(source))] agreement::Id),

    /// Signing was not explicitly confirmed.
    #[display("Signing is not confirmed")]
    ConfirmationRequired,

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Lease`] of the [`Agreement`] does not exist.
    #[display("`Lease(id: {_0})` does not exist")]
    LeaseNotExists(#[error(not(source))] lease::Id),

    /// [`User`] is not a party of the [`Agreement`].
    #[display("`User(id: {_0})` is not a party of the `Agreement`")]
    NotParty(#[error(not(source))] user::Id),

    /// Provided [`Signature`] is blank.
    #[display("`Signature` is blank")]
    SignatureRequired,

    /// [`Agreement`] cannot be signed in its current state.
    #[display("Cannot sign `Agreement`: {_0}")]
    #[from]
    Transition(TransitionError),

    /// [`User`] doesn't play the [`Role`] they attempt to sign in.
    #[display("`User` doesn't act as {_0}")]
    WrongRole(#[error(not(source))] Role),
}

#[cfg(test)]
mod spec {
    use common::operations::{By, Select};

    use crate::{
        domain::{
            agreement::{Role, Status, TransitionError},
            audit, Agreement,
        },
        infra::{Database as _, Memory},
        test_fixtures::{self, Fixture},
        Command as _, Service,
    };

    use super::{ExecutionError, SignAgreement};

    async fn initiated() -> (Memory, Service<Memory>, Fixture, Agreement) {
        let db = Memory::default();
        let service = test_fixtures::service(db.clone());
        let fixture = test_fixtures::lease(&db).await;
        let agreement = test_fixtures::initiated(&db, &fixture).await;
        (db, service, fixture, agreement)
    }

    fn sign(agreement: &Agreement, fixture: &Fixture, role: Role) -> SignAgreement {
        SignAgreement {
            agreement_id: agreement.id,
            signer_id: match role {
                Role::Landlord => fixture.landlord.id,
                Role::Tenant => fixture.tenant.id,
            },
            role,
            signature: "data:image/png;base64,iVBORw0KGgo=".into(),
            confirmed: true,
            ip_address: Some("203.0.113.7".parse().unwrap()),
        }
    }

    #[tokio::test]
    async fn completes_after_both_parties_sign() {
        let (db, service, fixture, agreement) = initiated().await;

        let signed = service
            .execute(sign(&agreement, &fixture, Role::Landlord))
            .await
            .unwrap();
        assert_eq!(signed.status, Status::PendingTenant);
        assert!(signed.is_signed_by(Role::Landlord));

        let completed = service
            .execute(sign(&agreement, &fixture, Role::Tenant))
            .await
            .unwrap();
        assert_eq!(completed.status, Status::Completed);
        assert!(completed.completed_at.is_some());

        let trail = db
            .execute(Select(By::<Vec<audit::Entry>, _>::new(agreement.id)))
            .await
            .unwrap();
        let actions = trail.iter().map(|e| e.action).collect::<Vec<_>>();
        assert_eq!(
            actions,
            [audit::Action::LandlordSigned, audit::Action::TenantSigned],
        );
        assert_eq!(
            trail[0].metadata.get("ipAddress"),
            Some(&serde_json::json!("203.0.113.7")),
        );
        let hash = trail[0].metadata.get("signHash").unwrap().as_str().unwrap();
        assert_eq!(hash.len(), 19);
        assert!(hash.ends_with("..."));
    }

    #[tokio::test]
    async fn tenant_waits_for_landlord() {
        let (_, service, fixture, agreement) = initiated().await;

        let err = service
            .execute(sign(&agreement, &fixture, Role::Tenant))
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::Transition(TransitionError::LandlordMustSignFirst),
        ));
    }

    #[tokio::test]
    async fn checks_role_state_signature_then_confirmation() {
        let (_, service, fixture, agreement) = initiated().await;

        let mut cmd = sign(&agreement, &fixture, Role::Landlord);
        cmd.signer_id = fixture.tenant.id;
        let err = service.execute(cmd).await.unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::WrongRole(Role::Landlord),
        ));

        let mut cmd = sign(&agreement, &fixture, Role::Landlord);
        cmd.signature = "  ".into();
        cmd.confirmed = false;
        let err = service.execute(cmd).await.unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::SignatureRequired));

        let mut cmd = sign(&agreement, &fixture, Role::Landlord);
        cmd.confirmed = false;
        let err = service.execute(cmd).await.unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::ConfirmationRequired));

        let mut cmd = sign(&agreement, &fixture, Role::Tenant);
        cmd.signature = String::new();
        cmd.confirmed = false;
        let err = service.execute(cmd).await.unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::Transition(TransitionError::LandlordMustSignFirst),
        ));
    }

    #[tokio::test]
    async fn rejects_draft() {
        let db = Memory::default();
        let service = test_fixtures::service(db.clone());
        let fixture = test_fixtures::lease(&db).await;
        let agreement = test_fixtures::draft(&db, &fixture).await;

        let err = service
            .execute(sign(&agreement, &fixture, Role::Landlord))
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::Transition(TransitionError::Unexpected(Status::Draft)),
        ));
    }

    #[tokio::test]
    async fn only_one_of_concurrent_signers_succeeds() {
        let (db, service, fixture, agreement) = initiated().await;
        db.hold_reads(2).await;

        let (first, second) = tokio::join!(
            service.execute(sign(&agreement, &fixture, Role::Landlord)),
            service.execute(sign(&agreement, &fixture, Role::Landlord)),
        );

        let failed = match (first, second) {
            (Ok(_), Err(e)) | (Err(e), Ok(_)) => e,
            (Ok(_), Ok(_)) => panic!("both signers succeeded"),
            (Err(e1), Err(e2)) => panic!("both signers failed: {e1}, {e2}"),
        };
        assert!(matches!(
            failed.as_ref(),
            ExecutionError::ConcurrentModification(id) if *id == agreement.id,
        ));

        let trail = db
            .execute(Select(By::<Vec<audit::Entry>, _>::new(agreement.id)))
            .await
            .unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, audit::Action::LandlordSigned);
    }
}
