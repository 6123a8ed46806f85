use crate::composite_key;
use crate::kv_store::{get_number, get_text, AttributeValue, Item};
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// A song as stored in the catalog table.
///
/// `img_url` is the file name of the mirrored cover image, not the remote
/// URL it was fetched from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub title: String,
    pub artist: String,
    pub year: i32,
    pub web_url: String,
    pub img_url: String,
}

impl CatalogItem {
    pub fn title_artist(&self) -> String {
        composite_key::title_artist(&self.title, &self.artist)
    }

    pub fn from_source(song: &SourceSong) -> Self {
        CatalogItem {
            title: song.title.clone(),
            artist: song.artist.clone(),
            year: song.year,
            web_url: song.web_url.clone(),
            img_url: image_basename(&song.img_url).to_owned(),
        }
    }

    /// Attribute map for the catalog table. `title_artist` is always
    /// recomputed here.
    pub fn to_item(&self) -> Item {
        let mut item = Item::new();
        self.write_attributes(&mut item);
        item
    }

    pub(crate) fn write_attributes(&self, item: &mut Item) {
        item.insert("title".to_string(), self.title.as_str().into());
        item.insert("artist".to_string(), self.artist.as_str().into());
        item.insert("year".to_string(), AttributeValue::from(self.year));
        item.insert("web_url".to_string(), self.web_url.as_str().into());
        item.insert("img_url".to_string(), self.img_url.as_str().into());
        item.insert("title_artist".to_string(), self.title_artist().into());
    }

    pub fn from_item(item: &Item) -> Result<Self> {
        let year = get_number(item, "year")?;
        Ok(CatalogItem {
            title: get_text(item, "title")?,
            artist: get_text(item, "artist")?,
            year: i32::try_from(year).with_context(|| format!("Year {} out of range", year))?,
            web_url: get_text(item, "web_url")?,
            img_url: get_text(item, "img_url")?,
        })
    }
}

/// Text after the last `/` of a URL, or the whole string if it has none.
pub fn image_basename(url: &str) -> &str {
    match url.rfind('/') {
        Some(position) => &url[position + 1..],
        None => url,
    }
}

/// A song entry of the source document.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SourceSong {
    pub title: String,
    pub artist: String,
    #[serde(deserialize_with = "deserialize_year")]
    pub year: i32,
    pub web_url: String,
    pub img_url: String,
}

/// The source document. A document without `songs` carries no catalog data;
/// a `songs` that is present but not a list is malformed.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CatalogDocument {
    #[serde(default, deserialize_with = "deserialize_present_songs")]
    pub songs: Option<Vec<SourceSong>>,
}

impl CatalogDocument {
    pub fn parse(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).context("Failed to parse catalog source document")
    }
}

fn deserialize_present_songs<'de, D>(
    deserializer: D,
) -> Result<Option<Vec<SourceSong>>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::deserialize(deserializer).map(Some)
}

fn deserialize_year<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawYear {
        Number(i32),
        Text(String),
    }

    match RawYear::deserialize(deserializer)? {
        RawYear::Number(year) => Ok(year),
        RawYear::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid year {:?}", text))),
    }
}
