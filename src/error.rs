//! 整理流程的錯誤分類
//!
//! 找不到中繼資料（metadata-missing）不算錯誤，以 `Ok(None)` 表示

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrganizeError {
    /// 找到中繼資料來源，但 Title 或 Authors 為空
    #[error("中繼資料無效 ({path}): {reason}")]
    MetadataInvalid { path: PathBuf, reason: String },

    /// 不支援的檔案類型
    #[error("不支援的中繼資料來源: {path}")]
    UnsupportedSource { path: PathBuf },

    /// 權限不足、路徑不存在、跨裝置移動等
    #[error("檔案系統錯誤 ({path}): {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 復原紀錄無法解析
    #[error("復原紀錄損毀 ({path}): {source}")]
    JournalCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// 基礎目錄不存在或無法解析符號連結
    #[error("無法解析基礎目錄 ({path}): {source}")]
    BaseDirUnresolvable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl OrganizeError {
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MetadataInvalid {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// 是否為只影響單一項目的錯誤（其餘項目繼續處理）
    #[must_use]
    pub const fn is_per_unit(&self) -> bool {
        !matches!(
            self,
            Self::JournalCorrupt { .. } | Self::BaseDirUnresolvable { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors_are_not_per_unit() {
        let err = OrganizeError::BaseDirUnresolvable {
            path: PathBuf::from("/missing"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(!err.is_per_unit());

        let err = OrganizeError::invalid("/book", "title is empty");
        assert!(err.is_per_unit());
        assert!(err.to_string().contains("title is empty"));
    }
}
