use chrono::{DateTime, Utc};
use madrasa_media::slot::SlotField;
use madrasa_media::{
    AssetPointer, DueAsset, SlotColumns, SlotRef, SlotState, SlotStore, SlotTarget, StoreError,
    StoreFuture,
};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::slot_sql::{push_row_filter, push_slot_assignments, push_slot_guard};

#[derive(Debug, FromRow)]
struct SlotRow {
    url: Option<String>,
    object_key: Option<String>,
    url_old: Option<String>,
    object_key_old: Option<String>,
    delete_pending_until: Option<DateTime<Utc>>,
}

impl From<SlotRow> for SlotColumns {
    fn from(row: SlotRow) -> Self {
        SlotColumns {
            url: row.url,
            object_key: row.object_key,
            url_old: row.url_old,
            object_key_old: row.object_key_old,
            delete_pending_until: row.delete_pending_until,
        }
    }
}

#[derive(Debug, FromRow)]
struct DueRow {
    table_name: String,
    slot_name: String,
    id: Uuid,
    tenant_id: Option<Uuid>,
    url_old: Option<String>,
    object_key_old: Option<String>,
    delete_pending_until: DateTime<Utc>,
}

/// [`SlotStore`] over the slot columns of the entity tables.
///
/// Writes are single conditional `UPDATE`s guarded on the five columns the
/// caller last read, so a lost race shows up as zero affected rows.
#[derive(Clone)]
pub struct PgSlotStore {
    pool: PgPool,
    slots: &'static [SlotRef],
}

impl PgSlotStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_slots(pool, madrasa_models::slots::ALL)
    }

    pub fn with_slots(pool: PgPool, slots: &'static [SlotRef]) -> Self {
        Self { pool, slots }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn registered(&self, slot: &SlotRef) -> Result<(), StoreError> {
        if self.slots.contains(slot) {
            Ok(())
        } else {
            Err(StoreError::UnknownSlot(slot.to_string()))
        }
    }

    fn lookup(&self, table: &str, slot: &str) -> Option<SlotRef> {
        self.slots
            .iter()
            .copied()
            .find(|s| s.table == table && s.slot == slot)
    }
}

fn push_select_columns(qb: &mut QueryBuilder<'_, Postgres>, slot: &SlotRef) {
    let aliases = ["url", "object_key", "url_old", "object_key_old", "delete_pending_until"];
    for (i, (field, alias)) in SlotField::ALL.iter().zip(aliases).enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(slot.column(*field)).push(" AS ").push(alias);
    }
}

impl SlotStore for PgSlotStore {
    #[instrument(skip(self), fields(db.operation = "SELECT", db.table = %target.slot.table))]
    fn load<'a>(&'a self, target: &'a SlotTarget) -> StoreFuture<'a, Option<SlotState>> {
        Box::pin(async move {
            self.registered(&target.slot)?;

            let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
            push_select_columns(&mut qb, &target.slot);
            qb.push(" FROM ").push(target.slot.table);
            push_row_filter(&mut qb, target)?;

            let row = qb
                .build_query_as::<SlotRow>()
                .fetch_optional(&self.pool)
                .await
                .map_err(StoreError::backend)?;

            match row {
                Some(row) => Ok(Some(SlotState::try_from(SlotColumns::from(row))?)),
                None => Ok(None),
            }
        })
    }

    #[instrument(skip(self, expected, next), fields(db.operation = "UPDATE", db.table = %target.slot.table))]
    fn persist<'a>(
        &'a self,
        target: &'a SlotTarget,
        expected: &'a SlotState,
        next: &'a SlotState,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            self.registered(&target.slot)?;

            let mut qb = QueryBuilder::<Postgres>::new("UPDATE ");
            qb.push(target.slot.table).push(" SET updated_at = NOW()");
            push_slot_assignments(&mut qb, &target.slot, next.to_columns());
            push_row_filter(&mut qb, target)?;
            push_slot_guard(&mut qb, &target.slot, expected.to_columns());

            let result = qb
                .build()
                .execute(&self.pool)
                .await
                .map_err(StoreError::backend)?;

            let written = result.rows_affected() == 1;
            if !written {
                debug!(slot = %target, "Slot changed since it was read");
            }
            Ok(written)
        })
    }

    #[instrument(skip(self, relocated), fields(db.operation = "UPDATE", db.table = %target.slot.table))]
    fn relocate_old<'a>(
        &'a self,
        target: &'a SlotTarget,
        expected_old_key: &'a str,
        relocated: &'a AssetPointer,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            self.registered(&target.slot)?;
            let slot = &target.slot;

            let mut qb = QueryBuilder::<Postgres>::new("UPDATE ");
            qb.push(slot.table)
                .push(" SET ")
                .push(slot.column(SlotField::UrlOld))
                .push(" = ")
                .push_bind(relocated.url.clone())
                .push(", ")
                .push(slot.column(SlotField::ObjectKeyOld))
                .push(" = ")
                .push_bind(relocated.object_key.clone());
            push_row_filter(&mut qb, target)?;
            qb.push(" AND ")
                .push(slot.column(SlotField::ObjectKeyOld))
                .push(" = ")
                .push_bind(expected_old_key.to_string());

            let result = qb
                .build()
                .execute(&self.pool)
                .await
                .map_err(StoreError::backend)?;

            Ok(result.rows_affected() == 1)
        })
    }

    #[instrument(skip(self), fields(db.operation = "SELECT"))]
    fn due<'a>(
        &'a self,
        now: DateTime<Utc>,
        after: Option<&'a DueAsset>,
        limit: usize,
    ) -> StoreFuture<'a, Vec<DueAsset>> {
        Box::pin(async move {
            if self.slots.is_empty() || limit == 0 {
                return Ok(Vec::new());
            }

            let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM (");
            for (i, slot) in self.slots.iter().enumerate() {
                if i > 0 {
                    qb.push(" UNION ALL ");
                }
                qb.push("SELECT ")
                    .push_bind(slot.table)
                    .push("::text AS table_name, ")
                    .push_bind(slot.slot)
                    .push("::text AS slot_name, id, ");
                match slot.tenant_column {
                    Some(column) => qb.push(column),
                    None => qb.push("NULL::uuid"),
                };
                qb.push(" AS tenant_id, ")
                    .push(slot.column(SlotField::UrlOld))
                    .push(" AS url_old, ")
                    .push(slot.column(SlotField::ObjectKeyOld))
                    .push(" AS object_key_old, ")
                    .push(slot.column(SlotField::DeletePendingUntil))
                    .push(" AS delete_pending_until FROM ")
                    .push(slot.table)
                    .push(" WHERE ")
                    .push(slot.column(SlotField::DeletePendingUntil))
                    .push(" <= ")
                    .push_bind(now);
            }
            qb.push(") AS due");
            if let Some(cursor) = after {
                qb.push(" WHERE (delete_pending_until, object_key_old) > (")
                    .push_bind(cursor.delete_pending_until)
                    .push(", ")
                    .push_bind(cursor.asset.object_key.as_str())
                    .push(")");
            }
            qb.push(" ORDER BY delete_pending_until, object_key_old LIMIT ")
                .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));

            let rows = qb
                .build_query_as::<DueRow>()
                .fetch_all(&self.pool)
                .await
                .map_err(StoreError::backend)?;

            let due = rows
                .into_iter()
                .filter_map(|row| {
                    let Some(slot) = self.lookup(&row.table_name, &row.slot_name) else {
                        warn!(table = %row.table_name, slot = %row.slot_name, "Due row for unregistered slot");
                        return None;
                    };
                    let (Some(url), Some(object_key)) = (row.url_old, row.object_key_old) else {
                        warn!(slot = %slot, id = %row.id, "Pending deadline without an old asset");
                        return None;
                    };
                    Some(DueAsset {
                        target: SlotTarget {
                            slot,
                            entity_id: row.id,
                            tenant_id: row.tenant_id,
                        },
                        asset: AssetPointer::new(url, object_key),
                        delete_pending_until: row.delete_pending_until,
                    })
                })
                .collect();

            Ok(due)
        })
    }

    #[instrument(skip(self, due), fields(db.operation = "UPDATE", db.table = %due.target.slot.table))]
    fn clear_old<'a>(&'a self, due: &'a DueAsset, now: DateTime<Utc>) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let target = &due.target;
            self.registered(&target.slot)?;
            let slot = &target.slot;

            let mut qb = QueryBuilder::<Postgres>::new("UPDATE ");
            qb.push(slot.table)
                .push(" SET ")
                .push(slot.column(SlotField::UrlOld))
                .push(" = NULL, ")
                .push(slot.column(SlotField::ObjectKeyOld))
                .push(" = NULL, ")
                .push(slot.column(SlotField::DeletePendingUntil))
                .push(" = NULL");
            push_row_filter(&mut qb, target)?;
            qb.push(" AND ")
                .push(slot.column(SlotField::ObjectKeyOld))
                .push(" = ")
                .push_bind(due.asset.object_key.clone())
                .push(" AND ")
                .push(slot.column(SlotField::DeletePendingUntil))
                .push(" <= ")
                .push_bind(now);

            let result = qb
                .build()
                .execute(&self.pool)
                .await
                .map_err(StoreError::backend)?;

            Ok(result.rows_affected() == 1)
        })
    }
}
