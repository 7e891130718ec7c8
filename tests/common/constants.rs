//! Shared constants for end-to-end tests

// ============================================================================
// Fake media
// ============================================================================

/// Title every fake download reports
pub const CLIP_TITLE: &str = "Test Clip";

/// Bytes written for every fake download
pub const CLIP_BYTES: &[u8] = b"not really a media file, but close enough";

/// URL the fake extractor resolves successfully
pub const GOOD_URL: &str = "https://media.example.com/watch?v=good";

/// URL the fake extractor fails to resolve
pub const BROKEN_URL: &str = "https://media.example.com/watch?v=unavailable";

/// URL whose media exceeds the size ceiling
pub const HUGE_URL: &str = "https://media.example.com/watch?v=huge";

// ============================================================================
// Server
// ============================================================================

pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
