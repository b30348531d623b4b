//! [`Lease`]-related [`Database`] implementations.

use common::{
    operations::{By, Select},
    Money,
};
use tracerr::Traced;

use crate::{
    domain::{lease, Lease},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C> Database<Select<By<Option<Lease>, lease::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Lease>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Lease>, lease::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        const SQL: &str = "\
            SELECT id, property_id, property_address, \
                   landlord_id, tenant_id, \
                   start_date, end_date, \
                   monthly_rent, monthly_rent_currency, \
                   created_at \
            FROM leases \
            WHERE id = $1::UUID";
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| Lease {
                id: row.get("id"),
                property_id: row.get("property_id"),
                property_address: row.get("property_address"),
                landlord_id: row.get("landlord_id"),
                tenant_id: row.get("tenant_id"),
                start_date: row.get("start_date"),
                end_date: row.get("end_date"),
                monthly_rent: Money {
                    amount: row.get("monthly_rent"),
                    currency: row.get("monthly_rent_currency"),
                },
                created_at: row.get("created_at"),
            }))
    }
}
