//! `metadata.json` 中繼資料來源
//!
//! 書籍目錄中的 JSON 檔，欄位名稱與 RawData 相同

use crate::config::FieldMapping;
use crate::error::OrganizeError;
use crate::tools::metadata::{Metadata, SourceType};
use crate::tools::metadata_resolver::MetadataProvider;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// 書籍目錄中的中繼資料檔名
pub const SIDECAR_FILE_NAME: &str = "metadata.json";

/// 讀取 `metadata.json`；缺少必要欄位不算錯誤，由呼叫端檢查有效性
pub struct JsonMetadataProvider {
    path: PathBuf,
}

impl JsonMetadataProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

}

impl MetadataProvider for JsonMetadataProvider {
    fn source_type(&self) -> SourceType {
        SourceType::Json
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn extract(&self) -> Result<Metadata, OrganizeError> {
        let content =
            fs::read_to_string(&self.path).map_err(|e| OrganizeError::filesystem(&self.path, e))?;

        let value: Value = serde_json::from_str(&content)
            .map_err(|e| OrganizeError::invalid(&self.path, format!("invalid JSON: {e}")))?;

        let Value::Object(object) = value else {
            return Err(OrganizeError::invalid(
                &self.path,
                "metadata file is not a JSON object",
            ));
        };

        let mut metadata = Metadata::new(SourceType::Json, &self.path);
        metadata.raw_data = object.into_iter().collect();
        metadata.apply_field_mapping(&FieldMapping::default());
        Ok(metadata)
    }
}
