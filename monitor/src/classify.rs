//! Log line severity classification

use crate::models::log::Severity;

const ERROR_KEYWORDS: &[&str] = &["error", "failed", "fatal"];
const WARNING_KEYWORDS: &[&str] = &["warning", "warn"];
const SUCCESS_KEYWORDS: &[&str] = &["ok", "success", "completed"];

/// Classify a raw log line into a severity.
///
/// Case-insensitive substring tiers, checked in fixed priority order
/// (error > warning > success); the first matching tier wins, so error
/// keywords dominate any co-occurring lower-tier keywords.
pub fn classify(message: &str) -> Severity {
    let lowered = message.to_lowercase();
    let contains_any = |keywords: &[&str]| keywords.iter().any(|k| lowered.contains(k));

    if contains_any(ERROR_KEYWORDS) {
        Severity::Error
    } else if contains_any(WARNING_KEYWORDS) {
        Severity::Warning
    } else if contains_any(SUCCESS_KEYWORDS) {
        Severity::Success
    } else {
        Severity::Info
    }
}
