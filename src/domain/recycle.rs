use chrono::{DateTime, Utc};

use super::{Entity, LedgerError};

/// Soft-delete lifecycle shared by products, invoices and return records.
///
/// States: Active -> Deleted (soft delete with a mandatory reason) -> Purged
/// (removed from the collection, terminal). Deleted -> Active (restore) is the
/// only reverse transition.
pub trait Recyclable {
    const ENTITY: Entity;

    fn entity_id(&self) -> String;
    fn deleted_at(&self) -> Option<DateTime<Utc>>;
    fn mark_deleted(&mut self, reason: String, at: DateTime<Utc>);
    fn mark_restored(&mut self);

    fn is_deleted(&self) -> bool {
        self.deleted_at().is_some()
    }
}

fn find_mut<'a, T: Recyclable>(
    entries: &'a mut [T],
    id: &str,
) -> Result<&'a mut T, LedgerError> {
    entries
        .iter_mut()
        .find(|e| e.entity_id() == id)
        .ok_or_else(|| LedgerError::not_found(T::ENTITY, id))
}

/// Move an entry to the recycle bin. The reason is mandatory: the bin exists
/// for audit, and an unexplained deletion is useless there.
pub fn soft_delete<T: Recyclable>(
    entries: &mut [T],
    id: &str,
    reason: &str,
) -> Result<(), LedgerError> {
    if reason.trim().is_empty() {
        return Err(LedgerError::MissingReason);
    }
    let entry = find_mut(entries, id)?;
    if entry.is_deleted() {
        return Err(LedgerError::AlreadyDeleted {
            entity: T::ENTITY,
            id: id.to_string(),
        });
    }
    entry.mark_deleted(reason.trim().to_string(), Utc::now());
    Ok(())
}

/// Bring a soft-deleted entry back, clearing its lifecycle fields.
pub fn restore<T: Recyclable>(entries: &mut [T], id: &str) -> Result<(), LedgerError> {
    let entry = find_mut(entries, id)?;
    if !entry.is_deleted() {
        return Err(LedgerError::NotDeleted {
            entity: T::ENTITY,
            id: id.to_string(),
        });
    }
    entry.mark_restored();
    Ok(())
}

/// Remove a soft-deleted entry permanently. Active entries must go through
/// the bin first; purging one directly is a lifecycle violation.
pub fn purge<T: Recyclable>(entries: &mut Vec<T>, id: &str) -> Result<T, LedgerError> {
    let pos = entries
        .iter()
        .position(|e| e.entity_id() == id)
        .ok_or_else(|| LedgerError::not_found(T::ENTITY, id))?;
    if !entries[pos].is_deleted() {
        return Err(LedgerError::NotDeleted {
            entity: T::ENTITY,
            id: id.to_string(),
        });
    }
    Ok(entries.remove(pos))
}

/// Purge every Deleted entry in one pass, leaving Active entries untouched.
/// Returns how many were removed.
pub fn empty_bin<T: Recyclable>(entries: &mut Vec<T>) -> usize {
    let before = entries.len();
    entries.retain(|e| !e.is_deleted());
    before - entries.len()
}

pub fn active<T: Recyclable>(entries: &[T]) -> impl Iterator<Item = &T> {
    entries.iter().filter(|e| !e.is_deleted())
}

pub fn deleted<T: Recyclable>(entries: &[T]) -> impl Iterator<Item = &T> {
    entries.iter().filter(|e| e.is_deleted())
}
