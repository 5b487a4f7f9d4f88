//! Entity updates that carry media slot changes.
//!
//! Slot changes are prepared first (upload, load, transition), then written
//! together with the entity's own fields in one conditional `UPDATE`, and
//! only after that statement succeeds are the storage side effects run.

use std::fmt;

use anyhow::anyhow;
use madrasa_core::AppError;
use madrasa_db::{push_slot_assignments, push_slot_guard};
use madrasa_media::{MediaError, PreparedSlot, SlotChange, SlotRef, SlotTarget};
use madrasa_models::{HasSlots, SlotReceipt};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Postgres, QueryBuilder};
use tracing::{error, instrument, warn};
use uuid::Uuid;

use crate::state::AppState;

/// A plain column value in an entity update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(Option<String>),
    Int(i64),
    Bool(bool),
}

/// The row an update addresses. School-owned rows are also filtered on
/// `school_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRef {
    pub table: &'static str,
    pub id: Uuid,
    pub school_id: Option<Uuid>,
}

impl RowRef {
    pub fn school(id: Uuid) -> Self {
        Self {
            table: "schools",
            id,
            school_id: None,
        }
    }

    pub fn scoped(table: &'static str, school_id: Uuid, id: Uuid) -> Self {
        Self {
            table,
            id,
            school_id: Some(school_id),
        }
    }

    pub fn target(&self, slot: SlotRef) -> SlotTarget {
        match self.school_id {
            Some(school_id) => SlotTarget::scoped(slot, self.id, school_id),
            None => SlotTarget::new(slot, self.id),
        }
    }

    fn push_filter(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE id = ").push_bind(self.id);
        if let Some(school_id) = self.school_id {
            qb.push(" AND school_id = ").push_bind(school_id);
        }
    }

    pub fn select(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT * FROM ");
        qb.push(self.table);
        self.push_filter(&mut qb);
        qb
    }

    pub fn delete(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("DELETE FROM ");
        qb.push(self.table);
        self.push_filter(&mut qb);
        qb.push(" RETURNING *");
        qb
    }
}

impl fmt::Display for RowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.table, self.id)
    }
}

fn build_update(
    row: &RowRef,
    fields: Vec<(&'static str, FieldValue)>,
    prepared: &[PreparedSlot],
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("UPDATE ");
    qb.push(row.table).push(" SET updated_at = NOW()");

    for (column, value) in fields {
        qb.push(", ").push(column).push(" = ");
        match value {
            FieldValue::Text(v) => qb.push_bind(v),
            FieldValue::Int(v) => qb.push_bind(v),
            FieldValue::Bool(v) => qb.push_bind(v),
        };
    }

    let changed = || prepared.iter().filter(|p| !p.is_noop());
    for p in changed() {
        push_slot_assignments(&mut qb, &p.target.slot, p.next().to_columns());
    }
    row.push_filter(&mut qb);
    for p in changed() {
        push_slot_guard(&mut qb, &p.target.slot, p.expected.to_columns());
    }

    qb.push(" RETURNING *");
    qb
}

async fn abandon_all(state: &AppState, prepared: &[PreparedSlot]) {
    for p in prepared {
        state.media.abandon(p).await;
    }
}

/// Writes `fields` and every slot change in `changes` to `row` in one
/// statement, then runs the slot side effects.
///
/// Returns 409 when a touched slot changed after it was read.
#[instrument(skip(state, fields, changes), fields(entity = %row, slots = changes.len(), db.operation = "UPDATE", db.table = row.table))]
pub async fn update_with_media<T>(
    state: &AppState,
    row: RowRef,
    fields: Vec<(&'static str, FieldValue)>,
    changes: Vec<(SlotRef, SlotChange)>,
) -> Result<(T, Vec<SlotReceipt>), AppError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let mut prepared = Vec::with_capacity(changes.len());
    for (slot, change) in changes {
        match state.media.prepare(&row.target(slot), change).await {
            Ok(p) => prepared.push(p),
            Err(e) => {
                abandon_all(state, &prepared).await;
                return Err(e.into_app_error());
            }
        }
    }

    let writes_slots = prepared.iter().any(|p| !p.is_noop());
    let mut qb = build_update(&row, fields, &prepared);
    let result = qb.build_query_as::<T>().fetch_optional(&state.db).await;

    let mut entity = match result {
        Ok(Some(entity)) => entity,
        Ok(None) => {
            abandon_all(state, &prepared).await;
            if writes_slots {
                warn!(entity = %row, "Media slot changed concurrently");
                return Err(MediaError::Conflict(row.to_string()).into_app_error());
            }
            return Err(AppError::not_found(anyhow!("{} not found", row)));
        }
        Err(e) => {
            abandon_all(state, &prepared).await;
            if let sqlx::Error::Database(db_err) = &e
                && db_err.is_unique_violation()
            {
                warn!(entity = %row, "Update violates a unique constraint");
                return Err(AppError::conflict(anyhow!("{} already exists", row.table)));
            }
            error!(error = %e, entity = %row, "Database error updating entity");
            return Err(AppError::from(e));
        }
    };

    let mut receipts = Vec::with_capacity(prepared.len());
    for p in prepared {
        let slot = p.target.slot.slot;
        let receipt = state.media.finish(p).await;
        receipts.push(SlotReceipt::new(slot, &receipt));
    }

    // A trashed old asset was re-pointed after the UPDATE returned.
    if receipts.iter().any(|r| r.moved_old_image_url.is_some()) {
        match row.select().build_query_as::<T>().fetch_optional(&state.db).await {
            Ok(Some(fresh)) => entity = fresh,
            Ok(None) => {}
            Err(e) => warn!(error = %e, entity = %row, "Failed to reload entity after media update"),
        }
    }

    Ok((entity, receipts))
}

/// Empties one slot, keeping the displaced asset for the retention window.
pub async fn clear_slot(
    state: &AppState,
    row: RowRef,
    slot: SlotRef,
) -> Result<SlotReceipt, AppError> {
    let receipt = state
        .media
        .clear(&row.target(slot))
        .await
        .map_err(MediaError::into_app_error)?;
    Ok(SlotReceipt::new(slot.slot, &receipt))
}

/// Best-effort deletion of every asset a deleted row referenced.
pub async fn purge_slots<E: HasSlots>(state: &AppState, row: &RowRef, entity: &E) {
    for (slot, slot_state) in entity.slot_states() {
        let failures = state.media.purge(&slot_state).await;
        for failure in failures {
            warn!(
                entity = %row,
                slot = slot.slot,
                url = %failure.url,
                reason = %failure.reason,
                "Asset of deleted entity left in storage"
            );
        }
    }
}

/// Looks up a slot of `E` by the name used in routes and form fields.
pub fn slot_named<E: HasSlots>(name: &str) -> Result<SlotRef, AppError> {
    E::slot(name).ok_or_else(|| AppError::not_found(anyhow!("Unknown media slot '{}'", name)))
}
