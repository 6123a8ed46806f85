//! Lookup routing for the catalog table.
//!
//! Each combination of title/artist predicates maps onto exactly one access
//! path. The year predicate is always applied as a filter and never changes
//! the path, so every path returns what a filtered full scan would.

use super::models::CatalogItem;
use super::schema::{ARTIST_YEAR_INDEX, TITLE_ARTIST_YEAR_INDEX};
use crate::composite_key;
use crate::kv_store::{AttributeValue, Filter, KeyValueStore};
use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

/// Sparse predicates of a catalog lookup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogQuery {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub year: Option<i32>,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| v.to_owned())
}

impl CatalogQuery {
    /// Builds a query, treating blank title or artist as absent.
    pub fn new(title: Option<&str>, artist: Option<&str>, year: Option<i32>) -> Self {
        CatalogQuery {
            title: non_blank(title),
            artist: non_blank(artist),
            year,
        }
    }

    fn year_filter(&self) -> Vec<Filter> {
        self.year
            .map(|year| Filter::eq("year", year))
            .into_iter()
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccessPath {
    /// Query the table by its `title` hash key.
    PrimaryKey { title: String },
    /// Query the artist/year index.
    ArtistIndex { artist: String },
    /// Query the title_artist/year index.
    TitleArtistIndex { title_artist: String },
    FullScan,
}

impl AccessPath {
    pub fn for_query(query: &CatalogQuery) -> Self {
        match (&query.title, &query.artist) {
            (Some(title), None) => AccessPath::PrimaryKey {
                title: title.clone(),
            },
            (None, Some(artist)) => AccessPath::ArtistIndex {
                artist: artist.clone(),
            },
            (Some(title), Some(artist)) => AccessPath::TitleArtistIndex {
                title_artist: composite_key::title_artist(title, artist),
            },
            (None, None) => AccessPath::FullScan,
        }
    }

    /// Index name and hash value to query, or None for a full scan.
    fn index_and_hash(&self) -> Option<(Option<&'static str>, AttributeValue)> {
        match self {
            AccessPath::PrimaryKey { title } => Some((None, title.as_str().into())),
            AccessPath::ArtistIndex { artist } => {
                Some((Some(ARTIST_YEAR_INDEX), artist.as_str().into()))
            }
            AccessPath::TitleArtistIndex { title_artist } => {
                Some((Some(TITLE_ARTIST_YEAR_INDEX), title_artist.as_str().into()))
            }
            AccessPath::FullScan => None,
        }
    }
}

pub struct QueryRouter {
    store: Arc<dyn KeyValueStore>,
    table: String,
}

impl QueryRouter {
    pub fn new(store: Arc<dyn KeyValueStore>, table: &str) -> Self {
        QueryRouter {
            store,
            table: table.to_owned(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the catalog items matching every given predicate, in the
    /// order of the chosen access path.
    pub fn find(&self, query: &CatalogQuery) -> Result<Vec<CatalogItem>> {
        let path = AccessPath::for_query(query);
        debug!("Routing {:?} through {:?}", query, path);

        let mut filters = query.year_filter();
        // The composite key alone is ambiguous when a title or artist
        // contains the separator.
        if let (AccessPath::TitleArtistIndex { .. }, Some(title), Some(artist)) =
            (&path, &query.title, &query.artist)
        {
            filters.push(Filter::eq("title", title.as_str()));
            filters.push(Filter::eq("artist", artist.as_str()));
        }
        let items = match path.index_and_hash() {
            Some((index, hash)) => self.store.query(&self.table, index, &hash, &filters)?,
            None => self.store.scan(&self.table, &filters)?,
        };
        items.iter().map(CatalogItem::from_item).collect()
    }
}
