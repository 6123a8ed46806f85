//! Shared constants for end-to-end tests
//!
//! When test data changes (user credentials, catalog songs, etc.),
//! update only this file.

// ============================================================================
// Test User Credentials
// ============================================================================

pub const TEST_EMAIL: &str = "listener@example.com";
pub const TEST_USERNAME: &str = "listener";
pub const TEST_PASS: &str = "testpass123";

pub const OTHER_EMAIL: &str = "other@example.com";

// ============================================================================
// Test Catalog
// ============================================================================

pub const BUCKET: &str = "catalog";
pub const SOURCE_KEY: &str = "songs.json";
pub const CATALOG_TABLE: &str = "music";

pub const SONG_A_TITLE: &str = "Song A";
pub const ARTIST_X: &str = "Artist X";
pub const ARTIST_Y: &str = "Artist Y";
pub const SONG_A_YEAR: i32 = 1999;
pub const SONG_A_IMAGE_URL: &str = "https://images.example.com/covers/a.jpg";

pub const SONG_B_TITLE: &str = "Song B";
pub const SONG_B_IMAGE_URL: &str = "https://images.example.com/covers/b.jpg";

/// Bytes served for every test image.
pub const TEST_IMAGE_BYTES: &[u8] = b"\xFF\xD8\xFF\xE0test-image";

/// Source document with two songs by Artist X and one by Artist Y.
/// Years are strings, as in the real source data.
pub const SOURCE_DOCUMENT: &str = r#"{
  "songs": [
    {"title": "Song A", "artist": "Artist X", "year": "1999", "web_url": "https://example.com/a", "img_url": "https://images.example.com/covers/a.jpg"},
    {"title": "Song B", "artist": "Artist X", "year": "2005", "web_url": "https://example.com/b", "img_url": "https://images.example.com/covers/b.jpg"},
    {"title": "Song C", "artist": "Artist Y", "year": "1999", "web_url": "https://example.com/c", "img_url": "https://images.example.com/covers/c.jpg"}
  ]
}"#;
