//! Search and filtering over loaded history records.
//!
//! Everything here works on records already read from the store; cloning a
//! record shares its image bytes rather than copying them.

use super::models::HistoryRecord;
use crate::models::AspectRatio;

/// Searches records using case-insensitive substring matching.
///
/// Searches across:
/// - strain name
/// - fruit flavor
/// - primary and secondary colors
/// - notes
/// - additional generation instructions
///
/// # Arguments
///
/// * `query` - The search term to match against
/// * `records` - The records to search through
///
/// # Returns
///
/// The matching records, in their original order.
///
/// # Example
///
/// ```ignore
/// use product_studio::history::search_history;
///
/// let results = search_history("blueberry", &records);
/// ```
pub fn search_history(query: &str, records: &[HistoryRecord]) -> Vec<HistoryRecord> {
    if query.is_empty() {
        return records.to_vec();
    }

    let query_lower = query.to_lowercase();

    records
        .iter()
        .filter(|record| matches_query(record, &query_lower))
        .cloned()
        .collect()
}

fn matches_query(record: &HistoryRecord, query_lower: &str) -> bool {
    let metadata = &record.metadata;

    if metadata.strain_name.to_lowercase().contains(query_lower)
        || metadata.fruit_flavor.to_lowercase().contains(query_lower)
    {
        return true;
    }

    if metadata
        .colors()
        .any(|color| color.to_lowercase().contains(query_lower))
    {
        return true;
    }

    if metadata.notes.to_lowercase().contains(query_lower) {
        return true;
    }

    record
        .settings
        .additional_instructions
        .to_lowercase()
        .contains(query_lower)
}

/// Filters records generated with a named mode switched on.
///
/// # Arguments
///
/// * `mode` - Serialized mode name, e.g. `nyMode`
/// * `records` - The records to filter
pub fn filter_by_mode(mode: &str, records: &[HistoryRecord]) -> Vec<HistoryRecord> {
    records
        .iter()
        .filter(|record| record.settings.mode_enabled(mode))
        .cloned()
        .collect()
}

/// Filters records by output aspect ratio.
pub fn filter_by_aspect_ratio(
    aspect_ratio: AspectRatio,
    records: &[HistoryRecord],
) -> Vec<HistoryRecord> {
    records
        .iter()
        .filter(|record| record.settings.aspect_ratio == aspect_ratio)
        .cloned()
        .collect()
}

/// Filters records created or updated at or after `since_millis`.
pub fn filter_since(since_millis: i64, records: &[HistoryRecord]) -> Vec<HistoryRecord> {
    records
        .iter()
        .filter(|record| record.timestamp >= since_millis)
        .cloned()
        .collect()
}

/// Sorts records by timestamp in descending order (newest first).
///
/// # Returns
///
/// A sorted copy; ties keep their id order.
pub fn sort_by_timestamp_desc(records: &[HistoryRecord]) -> Vec<HistoryRecord> {
    let mut sorted = records.to_vec();
    super::storage::sort_newest_first(&mut sorted);
    sorted
}

/// Sorts records by timestamp in ascending order (oldest first).
pub fn sort_by_timestamp_asc(records: &[HistoryRecord]) -> Vec<HistoryRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    sorted
}

/// Returns the most recent N records.
///
/// # Arguments
///
/// * `count` - Maximum number of records to return
/// * `records` - The records to pick from
pub fn get_recent_entries(count: usize, records: &[HistoryRecord]) -> Vec<HistoryRecord> {
    let sorted = sort_by_timestamp_desc(records);
    sorted.into_iter().take(count).collect()
}
