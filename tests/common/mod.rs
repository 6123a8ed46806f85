//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestService, SONG_A_TITLE};
//!
//! #[tokio::test]
//! async fn test_find_song() {
//!     let test_service = TestService::synced().await;
//!     let items = test_service.service.find_catalog(Some(SONG_A_TITLE), None, None);
//!     assert_eq!(items.len(), 1);
//! }
//! ```

mod constants;
mod fixtures;

// Public API - this is what tests import
pub use constants::*;
#[allow(unused_imports)]
pub use fixtures::{test_fetcher, test_settings, TestService};
