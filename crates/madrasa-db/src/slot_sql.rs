//! SQL fragments for the five columns of a media slot.
//!
//! Table and column names come from the static slot registry and are pushed
//! verbatim; every value is bound.

use madrasa_media::slot::SlotField;
use madrasa_media::{SlotColumns, SlotRef, SlotTarget, StoreError};
use sqlx::{Postgres, QueryBuilder};

/// Appends `, {slot}_url = $n, ...` for all five columns.
pub fn push_slot_assignments(qb: &mut QueryBuilder<'_, Postgres>, slot: &SlotRef, cols: SlotColumns) {
    qb.push(", ")
        .push(slot.column(SlotField::Url))
        .push(" = ")
        .push_bind(cols.url);
    qb.push(", ")
        .push(slot.column(SlotField::ObjectKey))
        .push(" = ")
        .push_bind(cols.object_key);
    qb.push(", ")
        .push(slot.column(SlotField::UrlOld))
        .push(" = ")
        .push_bind(cols.url_old);
    qb.push(", ")
        .push(slot.column(SlotField::ObjectKeyOld))
        .push(" = ")
        .push_bind(cols.object_key_old);
    qb.push(", ")
        .push(slot.column(SlotField::DeletePendingUntil))
        .push(" = ")
        .push_bind(cols.delete_pending_until);
}

/// Appends ` AND {col} IS NOT DISTINCT FROM $n` for all five columns, so the
/// statement only matches while the slot still holds `expected`.
pub fn push_slot_guard(qb: &mut QueryBuilder<'_, Postgres>, slot: &SlotRef, expected: SlotColumns) {
    fn guard(qb: &mut QueryBuilder<'_, Postgres>, column: String) {
        qb.push(" AND ").push(column).push(" IS NOT DISTINCT FROM ");
    }

    guard(qb, slot.column(SlotField::Url));
    qb.push_bind(expected.url);
    guard(qb, slot.column(SlotField::ObjectKey));
    qb.push_bind(expected.object_key);
    guard(qb, slot.column(SlotField::UrlOld));
    qb.push_bind(expected.url_old);
    guard(qb, slot.column(SlotField::ObjectKeyOld));
    qb.push_bind(expected.object_key_old);
    guard(qb, slot.column(SlotField::DeletePendingUntil));
    qb.push_bind(expected.delete_pending_until);
}

/// Appends ` WHERE id = $n` plus the school scope of school-owned tables.
pub fn push_row_filter(
    qb: &mut QueryBuilder<'_, Postgres>,
    target: &SlotTarget,
) -> Result<(), StoreError> {
    qb.push(" WHERE id = ").push_bind(target.entity_id);
    if let Some(column) = target.slot.tenant_column {
        let tenant = target
            .tenant_id
            .ok_or_else(|| StoreError::MissingTenant(target.slot.to_string()))?;
        qb.push(" AND ").push(column).push(" = ").push_bind(tenant);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use madrasa_media::SlotState;
    use uuid::Uuid;

    const IMAGE: SlotRef = SlotRef::scoped("posts", "image", "school_id");

    #[test]
    fn test_assignment_and_guard_sql() {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE posts SET updated_at = NOW()");
        push_slot_assignments(&mut qb, &IMAGE, SlotState::with_current("u", "k").to_columns());
        push_row_filter(&mut qb, &SlotTarget::scoped(IMAGE, Uuid::nil(), Uuid::nil())).unwrap();
        push_slot_guard(&mut qb, &IMAGE, SlotState::empty().to_columns());

        assert_eq!(
            qb.sql(),
            "UPDATE posts SET updated_at = NOW(), image_url = $1, image_object_key = $2, \
             image_url_old = $3, image_object_key_old = $4, image_delete_pending_until = $5 \
             WHERE id = $6 AND school_id = $7 \
             AND image_url IS NOT DISTINCT FROM $8 AND image_object_key IS NOT DISTINCT FROM $9 \
             AND image_url_old IS NOT DISTINCT FROM $10 AND image_object_key_old IS NOT DISTINCT FROM $11 \
             AND image_delete_pending_until IS NOT DISTINCT FROM $12"
        );
    }

    #[test]
    fn test_scoped_slot_requires_tenant() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM posts");
        let result = push_row_filter(&mut qb, &SlotTarget::new(IMAGE, Uuid::nil()));
        assert!(matches!(result, Err(StoreError::MissingTenant(_))));
    }
}
