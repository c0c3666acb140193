//! 音訊標籤中繼資料（使用 lofty）
//!
//! 讀取標準欄位（標題、演出者、專輯、軌道、光碟等）與自訂欄位（朗讀者、系列）。
//! 沒有明確系列標籤時以專輯名稱作為系列

use crate::config::FieldMapping;
use crate::error::OrganizeError;
use crate::tools::metadata::{Metadata, SourceType};
use crate::tools::metadata_resolver::MetadataProvider;
use lofty::file::TaggedFileExt;
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag};
use log::debug;
use serde_json::json;
use std::path::{Path, PathBuf};

const NARRATOR_KEYS: [&str; 3] = ["NARRATOR", "NARRATEDBY", "READER"];
const SERIES_KEYS: [&str; 3] = ["SERIES", "SERIES_NAME", "MVNM"];
const SERIES_PART_KEYS: [&str; 5] = [
    "SERIES-PART",
    "SERIES_PART",
    "SERIESPART",
    "SERIES_INDEX",
    "MVIN",
];

pub struct AudioMetadataProvider {
    path: PathBuf,
}

impl AudioMetadataProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// 自訂欄位名稱：去掉 MP4 freeform 前綴（`----:com.apple.iTunes:`）後轉大寫
fn normalize_custom_key(key: &str) -> String {
    key.rsplit(':').next().unwrap_or(key).trim().to_uppercase()
}

fn custom_text(tag: &Tag, names: &[&str]) -> Option<String> {
    tag.items().find_map(|item| {
        let ItemKey::Unknown(key) = item.key() else {
            return None;
        };
        let key = normalize_custom_key(key);
        if !names.contains(&key.as_str()) {
            return None;
        }
        item.value()
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    })
}

fn non_empty(value: Option<std::borrow::Cow<'_, str>>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl MetadataProvider for AudioMetadataProvider {
    fn source_type(&self) -> SourceType {
        SourceType::Audio
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn extract(&self) -> Result<Metadata, OrganizeError> {
        let tagged_file = Probe::open(&self.path)
            .map_err(|e| OrganizeError::invalid(&self.path, format!("cannot open audio: {e}")))?
            .read()
            .map_err(|e| {
                OrganizeError::invalid(&self.path, format!("cannot read audio tags: {e}"))
            })?;

        let mut metadata = Metadata::new(SourceType::Audio, &self.path);

        let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
            debug!("音訊檔沒有標籤: {}", self.path.display());
            return Ok(metadata);
        };

        let title = non_empty(tag.title());
        let artist = non_empty(tag.artist());
        let album = non_empty(tag.album());
        let album_artist = tag
            .get_string(&ItemKey::AlbumArtist)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let composer = tag
            .get_string(&ItemKey::Composer)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let explicit_series = custom_text(tag, &SERIES_KEYS);
        let series_part = custom_text(tag, &SERIES_PART_KEYS);

        let raw = &mut metadata.raw_data;
        let mut put = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                raw.insert(key.to_string(), json!(value));
            }
        };

        put("title", title.clone().or_else(|| album.clone()));
        put("artist", artist.clone());
        put("album_artist", album_artist.clone());
        put("album", album.clone());
        put("composer", composer);
        put("comment", non_empty(tag.comment()));
        put("genre", non_empty(tag.genre()));
        put("narrator", custom_text(tag, &NARRATOR_KEYS));
        put("series_index", series_part);

        if let Some(author) = artist.or(album_artist) {
            raw.insert("authors".to_string(), json!([author]));
        }
        if let Some(series) = explicit_series.or(album) {
            raw.insert("series".to_string(), json!([series]));
        }
        if let Some(track) = tag.track() {
            raw.insert("track_number".to_string(), json!(track));
        }
        if let Some(total) = tag.track_total() {
            raw.insert("track_total".to_string(), json!(total));
        }
        if let Some(disc) = tag.disk() {
            raw.insert("disc_number".to_string(), json!(disc));
        }
        if let Some(total) = tag.disk_total() {
            raw.insert("disc_total".to_string(), json!(total));
        }
        if let Some(year) = tag.year() {
            raw.insert("year".to_string(), json!(year));
        }

        metadata.apply_field_mapping(&FieldMapping::default());
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_custom_key() {
        assert_eq!(normalize_custom_key("----:com.apple.iTunes:series"), "SERIES");
        assert_eq!(normalize_custom_key("Narrator"), "NARRATOR");
        assert_eq!(normalize_custom_key("SERIES-PART"), "SERIES-PART");
    }

    #[test]
    fn test_extract_nonexistent_file() {
        let provider = AudioMetadataProvider::new("/nonexistent/file.mp3");
        assert!(provider.extract().is_err());
    }

    #[test]
    fn test_extract_garbage_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("noise.mp3");
        std::fs::write(&path, b"this is not audio").unwrap();

        let result = AudioMetadataProvider::new(&path).extract();
        assert!(matches!(result, Err(OrganizeError::MetadataInvalid { .. })));
    }
}
