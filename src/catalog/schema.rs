use crate::kv_store::{KeySchema, TableSchema};

pub const ARTIST_YEAR_INDEX: &str = "artist-year-index";
pub const TITLE_ARTIST_YEAR_INDEX: &str = "title_artist-year-index";

/// Blob key prefix under which mirrored cover images are stored.
pub const IMAGES_PREFIX: &str = "images/";

/// Layout of the catalog table: `(title, year)` primary key plus one index
/// per lookup shape, each ranged by year.
pub fn catalog_table_schema(table_name: &str) -> TableSchema {
    TableSchema::new(table_name, KeySchema::hash_range("title", "year"))
        .with_index(ARTIST_YEAR_INDEX, KeySchema::hash_range("artist", "year"))
        .with_index(
            TITLE_ARTIST_YEAR_INDEX,
            KeySchema::hash_range("title_artist", "year"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_schema_is_valid() {
        let schema = catalog_table_schema("music");
        schema.validate().unwrap();
        assert_eq!(schema.key, KeySchema::hash_range("title", "year"));
        assert_eq!(
            schema.index(TITLE_ARTIST_YEAR_INDEX).unwrap().key.hash,
            "title_artist"
        );
        assert_eq!(schema.index(ARTIST_YEAR_INDEX).unwrap().key.hash, "artist");
    }
}
