//! [`Agreement`]-related [`Database`] implementations.

use common::operations::{By, Expected, Insert, Select, Update};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{
        agreement::{self, Cancellation, Evidence},
        lease, Agreement,
    },
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Columns of the `agreements` table, in the order [`from_row()`] expects.
const COLUMNS: &str = "\
    id, lease_id, status, \
    document_hash, current_version, \
    landlord_signed_at, landlord_sign_hash, \
    tenant_signed_at, tenant_sign_hash, \
    pdf_url, generated_at, \
    expires_at, completed_at, \
    cancelled_at, cancel_reason";

/// Maximum number of overdue [`Agreement`]s returned at once.
const EXPIRATION_BATCH: i64 = 100;

/// Reads an [`Agreement`] from the provided [`Row`].
fn from_row(row: &Row) -> Agreement {
    let evidence = |at: &str, hash: &str| {
        row.get::<_, Option<_>>(at)
            .zip(row.get::<_, Option<_>>(hash))
            .map(|(signed_at, hash)| Evidence { signed_at, hash })
    };
    Agreement {
        id: row.get("id"),
        lease_id: row.get("lease_id"),
        status: row.get("status"),
        document_hash: row.get("document_hash"),
        current_version: row.get("current_version"),
        landlord_signature: evidence("landlord_signed_at", "landlord_sign_hash"),
        tenant_signature: evidence("tenant_signed_at", "tenant_sign_hash"),
        pdf_url: row.get("pdf_url"),
        generated_at: row.get("generated_at"),
        expires_at: row.get("expires_at"),
        completed_at: row.get("completed_at"),
        cancellation: row
            .get::<_, Option<_>>("cancelled_at")
            .zip(row.get::<_, Option<_>>("cancel_reason"))
            .map(|(at, reason)| Cancellation { at, reason }),
    }
}

impl<C> Database<Select<By<Option<Agreement>, agreement::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Agreement>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Agreement>, agreement::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        let sql = format!("SELECT {COLUMNS} FROM agreements WHERE id = $1::UUID");
        Ok(self
            .query_opt(sql.as_str(), &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Select<By<Option<Agreement>, lease::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Agreement>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Agreement>, lease::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let lease_id = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} FROM agreements WHERE lease_id = $1::UUID",
        );
        Ok(self
            .query_opt(sql.as_str(), &[&lease_id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Select<By<Vec<Agreement>, agreement::ExpirationDateTime>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Agreement>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Agreement>, agreement::ExpirationDateTime>>,
    ) -> Result<Self::Ok, Self::Err> {
        let deadline = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM agreements \
             WHERE status IN ($2::INT2, $3::INT2) \
               AND expires_at < $1::TIMESTAMPTZ \
             ORDER BY expires_at ASC \
             LIMIT $4::INT8",
        );
        Ok(self
            .query(
                sql.as_str(),
                &[
                    &deadline,
                    &agreement::Status::PendingLandlord,
                    &agreement::Status::PendingTenant,
                    &EXPIRATION_BATCH,
                ],
            )
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(from_row)
            .collect())
    }
}

impl<C> Database<Insert<Agreement>> for Postgres<C>
where
    C: Connection,
{
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(agreement): Insert<Agreement>,
    ) -> Result<Self::Ok, Self::Err> {
        let Agreement {
            id,
            lease_id,
            status,
            document_hash,
            current_version,
            landlord_signature,
            tenant_signature,
            pdf_url,
            generated_at,
            expires_at,
            completed_at,
            cancellation,
        } = agreement;
        let (landlord_signed_at, landlord_sign_hash) =
            landlord_signature.map(|e| (e.signed_at, e.hash)).unzip();
        let (tenant_signed_at, tenant_sign_hash) =
            tenant_signature.map(|e| (e.signed_at, e.hash)).unzip();
        let (cancelled_at, cancel_reason) =
            cancellation.map(|c| (c.at, c.reason)).unzip();

        // Exactly one `Agreement` per `Lease` is guaranteed by the unique
        // `lease_id` constraint.
        const SQL: &str = "\
            INSERT INTO agreements (\
                id, lease_id, status, \
                document_hash, current_version, \
                landlord_signed_at, landlord_sign_hash, \
                tenant_signed_at, tenant_sign_hash, \
                pdf_url, generated_at, \
                expires_at, completed_at, \
                cancelled_at, cancel_reason\
            ) \
            VALUES (\
                $1::UUID, $2::UUID, $3::INT2, \
                $4::VARCHAR, $5::INT4, \
                $6::TIMESTAMPTZ, $7::VARCHAR, \
                $8::TIMESTAMPTZ, $9::VARCHAR, \
                $10::VARCHAR, $11::TIMESTAMPTZ, \
                $12::TIMESTAMPTZ, $13::TIMESTAMPTZ, \
                $14::TIMESTAMPTZ, $15::VARCHAR\
            ) \
            ON CONFLICT DO NOTHING";
        self.exec(
            SQL,
            &[
                &id,
                &lease_id,
                &status,
                &document_hash,
                &current_version,
                &landlord_signed_at,
                &landlord_sign_hash,
                &tenant_signed_at,
                &tenant_sign_hash,
                &pdf_url,
                &generated_at,
                &expires_at,
                &completed_at,
                &cancelled_at,
                &cancel_reason,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(|inserted| inserted == 1)
    }
}

impl<C> Database<Update<Expected<Agreement, agreement::Revision>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(expected): Update<Expected<Agreement, agreement::Revision>>,
    ) -> Result<Self::Ok, Self::Err> {
        let Expected {
            value: agreement,
            state: expected,
        } = expected;
        let Agreement {
            id,
            lease_id: _,
            status,
            document_hash,
            current_version,
            landlord_signature,
            tenant_signature,
            pdf_url,
            generated_at,
            expires_at,
            completed_at,
            cancellation,
        } = agreement;
        let (landlord_signed_at, landlord_sign_hash) =
            landlord_signature.map(|e| (e.signed_at, e.hash)).unzip();
        let (tenant_signed_at, tenant_sign_hash) =
            tenant_signature.map(|e| (e.signed_at, e.hash)).unzip();
        let (cancelled_at, cancel_reason) =
            cancellation.map(|c| (c.at, c.reason)).unzip();

        const SQL: &str = "\
            UPDATE agreements \
            SET status = $2::INT2, \
                document_hash = $3::VARCHAR, \
                current_version = $4::INT4, \
                landlord_signed_at = $5::TIMESTAMPTZ, \
                landlord_sign_hash = $6::VARCHAR, \
                tenant_signed_at = $7::TIMESTAMPTZ, \
                tenant_sign_hash = $8::VARCHAR, \
                pdf_url = $9::VARCHAR, \
                generated_at = $10::TIMESTAMPTZ, \
                expires_at = $11::TIMESTAMPTZ, \
                completed_at = $12::TIMESTAMPTZ, \
                cancelled_at = $13::TIMESTAMPTZ, \
                cancel_reason = $14::VARCHAR \
            WHERE id = $1::UUID \
              AND status = $15::INT2 \
              AND current_version = $16::INT4";
        self.exec(
            SQL,
            &[
                &id,
                &status,
                &document_hash,
                &current_version,
                &landlord_signed_at,
                &landlord_sign_hash,
                &tenant_signed_at,
                &tenant_sign_hash,
                &pdf_url,
                &generated_at,
                &expires_at,
                &completed_at,
                &cancelled_at,
                &cancel_reason,
                &expected.status,
                &expected.version,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(|updated| updated == 1)
    }
}
