//! Page-state format versions.
//!
//! 11: oldest readable format.
//! 12: HTTP bodies carry a `contains_passwords` flag.
//! 13: filesystem-URL body elements.
//! 14: referenced-file list stored up front; version written only once.
//! 15: drops parent, title, alternate title, visited time, target item flag
//!     and visit count.
//! 16: blob elements store UUIDs instead of blob URLs.
//! 17: target frame id (removed again in 19).
//! 18: referrer policy.
//! 19: drops target frame id and the original URL string.
//! 20: visual viewport scroll offset.
//! 21: frame sequence number (removed again in 23).
//! 22: scroll restoration type.
//! 24: `did_save_scroll_or_scale_state` flag.
//! 25: unique frame names limited in length.
//! 26: schema-based serialization.

/// Version tag marking a payload that holds nothing but a URL.
pub const URL_ONLY_VERSION: i32 = -1;
pub const MIN_VERSION: i32 = 11;
pub const CURRENT_VERSION: i32 = 26;

/// Last version written with the hand-rolled pickle layout.
pub const LAST_LEGACY_VERSION: i32 = 25;
pub const SCHEMA_VERSION: i32 = 26;

pub(crate) const CONTAINS_PASSWORDS_VERSION: i32 = 12;
pub(crate) const FILESYSTEM_URL_VERSION: i32 = 13;
pub(crate) const REFERENCED_FILES_VERSION: i32 = 14;
pub(crate) const TRIMMED_FIELDS_VERSION: i32 = 15;
pub(crate) const BLOB_UUID_VERSION: i32 = 16;
pub(crate) const TARGET_FRAME_ID_VERSION: i32 = 17;
pub(crate) const REFERRER_POLICY_VERSION: i32 = 18;
pub(crate) const NO_ORIGINAL_URL_VERSION: i32 = 19;
pub(crate) const VISUAL_VIEWPORT_VERSION: i32 = 20;
pub(crate) const FRAME_SEQUENCE_NUMBER_VERSION: i32 = 21;
pub(crate) const SCROLL_RESTORATION_VERSION: i32 = 22;
pub(crate) const NO_FRAME_SEQUENCE_NUMBER_VERSION: i32 = 23;
pub(crate) const SAVE_SCROLL_FLAG_VERSION: i32 = 24;
pub(crate) const LIMITED_UNIQUE_NAME_VERSION: i32 = 25;

/// Android builds shipped this version with scroll and scale encoded jointly.
pub(crate) const JOINT_SCALE_VERSION: i32 = 11;

/// Returns true when `version` can be decoded.
pub fn is_supported(version: i32) -> bool {
    version == URL_ONLY_VERSION || (MIN_VERSION..=CURRENT_VERSION).contains(&version)
}

#[cfg(test)]
mod tests {
    use super::CURRENT_VERSION;
    use super::MIN_VERSION;
    use super::URL_ONLY_VERSION;
    use super::is_supported;

    #[test]
    fn supported_range_is_inclusive() {
        assert!(is_supported(MIN_VERSION));
        assert!(is_supported(CURRENT_VERSION));
        assert!(is_supported(URL_ONLY_VERSION));
        assert!(!is_supported(MIN_VERSION - 1));
        assert!(!is_supported(CURRENT_VERSION + 1));
        assert!(!is_supported(0));
    }
}
