//! Record ids and timestamps.

use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

pub const BLOCK_ELEMENT_PREFIX: &str = "be";
pub const PRESET_PREFIX: &str = "preset";

/// `<prefix>_<epoch-millis>_<24 hex chars>`
pub fn new_id(prefix: &str) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}", prefix, Utc::now().timestamp_millis(), &random[..24])
}

/// Current time as an ISO-8601 string with millisecond precision, e.g.
/// `2025-01-01T12:00:00.000Z`.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
