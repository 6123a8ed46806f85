//! The music catalog: item model, table layout, synchronization from the
//! source document and predicate routing for lookups.

mod importer;
mod models;
mod query;
mod schema;

pub use importer::{CatalogImporter, ImportStats, ImporterSettings, SyncOutcome, SyncStage};
pub use models::{image_basename, CatalogDocument, CatalogItem, SourceSong};
pub use query::{AccessPath, CatalogQuery, QueryRouter};
pub use schema::{
    catalog_table_schema, ARTIST_YEAR_INDEX, IMAGES_PREFIX, TITLE_ARTIST_YEAR_INDEX,
};
