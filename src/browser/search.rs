//! Client-side search over the fetched file list.

use crate::api::FileRecord;

/// Filter records by case-insensitive substring match on the name.
///
/// A blank query matches everything. Order is preserved.
pub fn filter_records<'a>(records: &'a [FileRecord], query: &str) -> Vec<&'a FileRecord> {
    let query = query.trim();
    if query.is_empty() {
        return records.iter().collect();
    }

    let needle = query.to_lowercase();
    records
        .iter()
        .filter(|record| record.name.to_lowercase().contains(&needle))
        .collect()
}
