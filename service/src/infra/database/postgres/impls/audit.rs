//! [`audit::Entry`]-related [`Database`] implementations.

use common::operations::{By, Insert, Select};
use serde_json::Value;
use tracerr::Traced;

use crate::{
    domain::{agreement, audit},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C> Database<Insert<audit::Entry>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(entry): Insert<audit::Entry>,
    ) -> Result<Self::Ok, Self::Err> {
        let audit::Entry {
            id,
            agreement_id,
            actor_id,
            action,
            metadata,
            recorded_at,
        } = entry;
        let metadata = Value::from(metadata);

        const SQL: &str = "\
            INSERT INTO agreement_audit_log (\
                id, agreement_id, actor_id, \
                action, metadata, recorded_at\
            ) \
            VALUES (\
                $1::UUID, $2::UUID, $3::UUID, \
                $4::INT2, $5::JSONB, $6::TIMESTAMPTZ\
            )";
        self.exec(
            SQL,
            &[
                &id,
                &agreement_id,
                &actor_id,
                &action,
                &metadata,
                &recorded_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Select<By<Vec<audit::Entry>, agreement::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<audit::Entry>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<audit::Entry>, agreement::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let agreement_id = by.into_inner();

        const SQL: &str = "\
            SELECT id, agreement_id, actor_id, \
                   action, metadata, recorded_at \
            FROM agreement_audit_log \
            WHERE agreement_id = $1::UUID \
            ORDER BY seq ASC";
        Ok(self
            .query(SQL, &[&agreement_id])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| audit::Entry {
                id: row.get("id"),
                agreement_id: row.get("agreement_id"),
                actor_id: row.get("actor_id"),
                action: row.get("action"),
                // Column is constrained to hold JSON objects only.
                metadata: audit::Metadata::try_from(
                    row.get::<_, Value>("metadata"),
                )
                .unwrap_or_default(),
                recorded_at: row.get("recorded_at"),
            })
            .collect())
    }
}
