//! [`Command`] for authorizing a [`User`] by a [`Session`] token.

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use jsonwebtoken::{Algorithm, Validation};
use tracerr::Traced;

use crate::{
    domain::{
        user::{self, session, Session},
        User,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for authorizing a [`User`] by a [`Session`] token issued by
/// the authentication subsystem.
#[derive(Clone, Debug, From)]
pub struct AuthorizeUserSession {
    /// [`Session`] token to authorize.
    pub token: session::Token,
}

impl<Db> Command<AuthorizeUserSession> for Service<Db>
where
    Db: Database<
        Select<By<Option<User>, user::Id>>,
        Ok = Option<User>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Session;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: AuthorizeUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let AuthorizeUserSession { token } = cmd;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        let session = jsonwebtoken::decode::<Session>(
            token.as_ref(),
            &self.config().jwt_decoding_key,
            &validation,
        )
        .map_err(tracerr::from_and_wrap!(=> E))?
        .claims;

        let user = self
            .database()
            .execute(Select(By::new(session.user_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if !user.is_some_and(|u| u.deleted_at.is_none()) {
            return Err(tracerr::new!(E::UserNotExists(session.user_id)));
        }

        Ok(session)
    }
}

/// Error of [`AuthorizeUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`jsonwebtoken`] decoding error.
    #[display("Failed to decode a JSON Web Token: {_0}")]
    #[from]
    JsonWebTokenDecodeError(jsonwebtoken::errors::Error),

    /// [`User`] the [`Session`] belongs to does not exist or is deleted.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use common::DateTime;
    use jsonwebtoken::{EncodingKey, Header};

    use crate::{
        domain::user::{self, session, Session},
        infra::Memory,
        test_fixtures, Command as _,
    };

    use super::{AuthorizeUserSession, ExecutionError};

    fn token(user_id: user::Id, expires_at: DateTime) -> session::Token {
        let session = Session {
            user_id,
            expires_at: expires_at.coerce(),
        };
        let jwt = jsonwebtoken::encode(
            &Header::default(),
            &session,
            &EncodingKey::from_secret(test_fixtures::JWT_SECRET),
        )
        .unwrap();
        jwt.parse().unwrap()
    }

    #[tokio::test]
    async fn authorizes_existing_user() {
        let db = Memory::default();
        let service = test_fixtures::service(db.clone());
        let fixture = test_fixtures::lease(&db).await;

        let session = service
            .execute(AuthorizeUserSession {
                token: token(fixture.tenant.id, DateTime::now().add_days(1)),
            })
            .await
            .unwrap();

        assert_eq!(session.user_id, fixture.tenant.id);
    }

    #[tokio::test]
    async fn rejects_unknown_user_and_expired_token() {
        let db = Memory::default();
        let service = test_fixtures::service(db.clone());
        let fixture = test_fixtures::lease(&db).await;

        let err = service
            .execute(AuthorizeUserSession {
                token: token(user::Id::new(), DateTime::now().add_days(1)),
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::UserNotExists(_)));

        let expired = DateTime::from_rfc3339("2020-01-01T00:00:00Z").unwrap();
        let err = service
            .execute(AuthorizeUserSession {
                token: token(fixture.landlord.id, expired),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::JsonWebTokenDecodeError(_),
        ));

        let err = service
            .execute(AuthorizeUserSession {
                token: "not.a.jwt".parse().unwrap(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::JsonWebTokenDecodeError(_),
        ));
    }
}
