//! Text formatting for history listings.
//!
//! Used by the command-line front end to render records, details and
//! storage statistics.

use super::models::{HistoryRecord, SourceImage};
use crate::capacity::StorageEstimate;
use chrono::{DateTime, Local, TimeZone, Utc};

/// Formats a list of records, one line each.
pub fn format_history_list(records: &[HistoryRecord]) -> Vec<String> {
    records.iter().map(format_history_entry).collect()
}

/// Formats a single record for list display.
///
/// Format: "STRAIN (FLAVOR) - N variant(s) [RATIO SIZE] (timestamp) ID"
///
/// # Arguments
///
/// * `record` - The record to format
///
/// # Returns
///
/// A one-line summary of the record.
pub fn format_history_entry(record: &HistoryRecord) -> String {
    let variants = record.variants.len();
    format!(
        "{} ({}) - {} variant{} [{} {}] ({}) {}",
        display_or_placeholder(&record.metadata.strain_name),
        display_or_placeholder(&record.metadata.fruit_flavor),
        variants,
        if variants == 1 { "" } else { "s" },
        record.settings.aspect_ratio,
        record.settings.image_size,
        format_timestamp(record.timestamp),
        record.id
    )
}

/// Formats a record with every field for the expanded view.
pub fn format_history_details(record: &HistoryRecord) -> String {
    let mut output = String::new();
    let metadata = &record.metadata;
    let settings = &record.settings;

    output.push_str("═══════════════════════════════════════════════════════════\n");
    output.push_str(&format!("Record ID: {}\n", record.id));
    output.push_str(&format!(
        "Timestamp: {}\n",
        format_timestamp_detailed(record.timestamp)
    ));
    output.push_str("═══════════════════════════════════════════════════════════\n\n");

    output.push_str("PRODUCT\n");
    output.push_str("───────────────────────────────────────────────────────────\n");
    output.push_str(&format!("Strain:  {}\n", metadata.strain_name));
    output.push_str(&format!("Flavor:  {}\n", metadata.fruit_flavor));
    output.push_str(&format!(
        "Colors:  {}\n",
        metadata.colors().collect::<Vec<_>>().join(", ")
    ));
    if !metadata.notes.is_empty() {
        output.push_str(&format!("Notes:   {}\n", metadata.notes));
    }
    for (key, value) in &metadata.extra {
        output.push_str(&format!("  {}: {}\n", key, value));
    }

    output.push_str(&format!("\nSource:  {}\n", describe_source(&record.source_image)));

    output.push_str("\nSETTINGS\n");
    output.push_str("───────────────────────────────────────────────────────────\n");
    output.push_str(&format!(
        "{} at {}, {} variant(s) per batch\n",
        settings.aspect_ratio, settings.image_size, settings.number_of_variants
    ));
    if settings.ny_mode {
        output.push_str("Mode:    nyMode\n");
    }
    for (mode, enabled) in &settings.modes {
        if *enabled {
            output.push_str(&format!("Mode:    {}\n", mode));
        }
    }
    if !settings.additional_instructions.is_empty() {
        output.push_str(&format!(
            "Instructions: {}\n",
            settings.additional_instructions
        ));
    }

    output.push_str("\nVARIANTS\n");
    output.push_str("───────────────────────────────────────────────────────────\n");
    if record.variants.is_empty() {
        output.push_str("  [None]\n");
    }
    for variant in &record.variants {
        let image = match &variant.blob {
            Some(blob) => format!("{} {}", blob.mime_type, format_byte_size(blob.len() as u64)),
            None => "[No image data]".to_string(),
        };
        output.push_str(&format!(
            "  {} {} ({})\n",
            variant.id,
            image,
            format_timestamp(variant.timestamp)
        ));
    }

    output.push_str("\n═══════════════════════════════════════════════════════════\n");

    output
}

fn describe_source(source: &SourceImage) -> String {
    match source {
        SourceImage::Blob(blob) => {
            format!("{} {}", blob.mime_type, format_byte_size(blob.len() as u64))
        }
        SourceImage::Reference(value) if value.is_empty() => "[None]".to_string(),
        SourceImage::Reference(value) => format!("reference {}", value),
    }
}

fn display_or_placeholder(value: &str) -> &str {
    if value.is_empty() {
        "Untitled"
    } else {
        value
    }
}

fn to_datetime(timestamp_millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(timestamp_millis).single()
}

/// Formats an epoch-millisecond timestamp in local time.
///
/// Format: "YYYY-MM-DD HH:MM:SS"
pub fn format_timestamp(timestamp_millis: i64) -> String {
    match to_datetime(timestamp_millis) {
        Some(timestamp) => {
            let local_time: DateTime<Local> = timestamp.with_timezone(&Local);
            local_time.format("%Y-%m-%d %H:%M:%S").to_string()
        }
        None => format!("@{}", timestamp_millis),
    }
}

/// Formats an epoch-millisecond timestamp including the timezone.
pub fn format_timestamp_detailed(timestamp_millis: i64) -> String {
    match to_datetime(timestamp_millis) {
        Some(timestamp) => {
            let local_time: DateTime<Local> = timestamp.with_timezone(&Local);
            local_time.format("%Y-%m-%d %H:%M:%S %Z").to_string()
        }
        None => format!("@{}", timestamp_millis),
    }
}

/// Describes how long before `now_millis` the timestamp lies
/// (e.g. "2 hours ago", "yesterday").
pub fn format_relative_time(timestamp_millis: i64, now_millis: i64) -> String {
    let seconds = (now_millis - timestamp_millis) / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if seconds < 60 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{} minute{} ago", minutes, plural(minutes))
    } else if hours < 24 {
        format!("{} hour{} ago", hours, plural(hours))
    } else if days == 1 {
        "yesterday".to_string()
    } else if days < 7 {
        format!("{} days ago", days)
    } else if days < 30 {
        let weeks = days / 7;
        format!("{} week{} ago", weeks, plural(weeks))
    } else if days < 365 {
        let months = days / 30;
        format!("{} month{} ago", months, plural(months))
    } else {
        let years = days / 365;
        format!("{} year{} ago", years, plural(years))
    }
}

fn plural(count: i64) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// Formats a byte count with a binary unit suffix.
pub fn format_byte_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// Creates a summary line for history statistics.
///
/// # Arguments
///
/// * `records` - Number of stored records
/// * `variants` - Number of stored variants across all records
/// * `estimate` - Storage estimate, if the host supports one
pub fn format_history_stats(
    records: usize,
    variants: usize,
    estimate: Option<&StorageEstimate>,
) -> String {
    let mut line = format!("Records: {} | Variants: {}", records, variants);
    match estimate {
        Some(estimate) => line.push_str(&format!(
            " | Storage: {} of {} ({:.1}%)",
            format_byte_size(estimate.usage),
            format_byte_size(estimate.quota),
            estimate.percent_used
        )),
        None => line.push_str(" | Storage: unknown"),
    }
    line
}
