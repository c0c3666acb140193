//! 標準化中繼資料
//!
//! 不論來源是 JSON、EPUB 或音訊標籤，最後都轉成同一個 [`Metadata`] 結構

use crate::config::FieldMapping;
use crate::error::OrganizeError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

/// 偵測到系列但內容無法使用時的保留值，絕不會出現在路徑中
pub const INVALID_SERIES: &str = "__INVALID_SERIES__";

/// 系列名稱超過此長度視為外洩的內部資料
pub const MAX_SERIES_LENGTH: usize = 200;

/// 原始欄位（未經處理），供欄位對應與系列編號查詢使用
pub type RawData = BTreeMap<String, Value>;

static REGEX_SERIES_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>.*?)\s+#(?P<index>\d+(?:\.\d+)?)\s*$").expect("Invalid regex")
});

static REGEX_LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)").expect("Invalid regex"));

/// 外洩資料常見的結構欄位名稱
const LEAKED_DATA_MARKERS: [&str; 8] = [
    "\"name\"",
    "\"position\"",
    "\"@type\"",
    "\"id\":",
    "belongs-to-collection",
    "group-position",
    "collection-type",
    "</",
];

/// 中繼資料來源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Json,
    Epub,
    Audio,
}

impl SourceType {
    /// 日誌顯示用名稱
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Json => "JSON metadata file",
            Self::Epub => "EPUB embedded metadata",
            Self::Audio => "audio tag metadata",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub title: String,
    pub authors: Vec<String>,
    /// 可能帶有 ` #N` 結尾
    pub series: Vec<String>,
    /// 0 表示未知
    pub track_number: u32,
    pub source_type: SourceType,
    pub source_path: PathBuf,
    pub raw_data: RawData,
}

impl Metadata {
    #[must_use]
    pub fn new(source_type: SourceType, source_path: impl Into<PathBuf>) -> Self {
        Self {
            title: String::new(),
            authors: Vec::new(),
            series: Vec::new(),
            track_number: 0,
            source_type,
            source_path: source_path.into(),
            raw_data: RawData::new(),
        }
    }

    /// Title 非空且至少一位非空作者
    pub fn validate(&self) -> Result<(), OrganizeError> {
        if self.title.trim().is_empty() {
            return Err(OrganizeError::invalid(&self.source_path, "title is empty"));
        }
        if !self.authors.iter().any(|a| !a.trim().is_empty()) {
            return Err(OrganizeError::invalid(&self.source_path, "no authors"));
        }
        Ok(())
    }

    /// 非空作者
    pub fn author_names(&self) -> impl Iterator<Item = &str> {
        self.authors
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
    }

    /// 依字母排序後的第一個可用系列（原始字串，可能帶 ` #N`）
    #[must_use]
    pub fn primary_series(&self) -> Option<&str> {
        let mut candidates: Vec<&str> = self
            .series
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty() && *s != INVALID_SERIES)
            .collect();
        candidates.sort_unstable();
        candidates.into_iter().next()
    }

    /// 去掉 ` #N` 後的系列名稱
    #[must_use]
    pub fn series_name(&self) -> Option<String> {
        self.primary_series()
            .map(|s| split_series_index(s).0)
            .filter(|s| !s.is_empty())
    }

    /// 系列編號：RawData 的 `series_index` 優先於系列文字中的數字；≤ 0 視為沒有編號
    #[must_use]
    pub fn series_index(&self) -> Option<f64> {
        let index = match self.raw_data.get("series_index").and_then(value_to_number) {
            Some(explicit) => explicit,
            None => self
                .primary_series()
                .and_then(|s| split_series_index(s).1)
                .and_then(|i| i.parse::<f64>().ok())?,
        };
        (index > 0.0).then_some(index)
    }

    /// 光碟編號，未知為 0
    #[must_use]
    pub fn disc_number(&self) -> u32 {
        self.raw_data
            .get("disc_number")
            .and_then(value_to_track)
            .unwrap_or(0)
    }

    #[must_use]
    pub fn raw_string(&self, key: &str) -> Option<String> {
        self.raw_data
            .get(key)
            .and_then(|v| value_to_strings(v).into_iter().next())
    }

    /// 依欄位對應重新計算 Title / Series / Authors / TrackNumber；
    /// RawData 中沒有的欄位保留原值
    pub fn apply_field_mapping(&mut self, mapping: &FieldMapping) {
        if let Some(title) = self.raw_string(&mapping.title_field) {
            self.title = title;
        }

        if let Some(value) = self.raw_data.get(&mapping.series_field) {
            let series: Vec<String> = value_to_strings(value)
                .iter()
                .map(|s| sanitize_series_candidate(s))
                .collect();
            if !series.is_empty() {
                self.series = series;
            }
        }

        for field in &mapping.author_fields {
            let authors = self
                .raw_data
                .get(field)
                .map(value_to_strings)
                .unwrap_or_default();
            if !authors.is_empty() {
                self.authors = authors;
                break;
            }
        }

        if let Some(track) = self.raw_data.get(&mapping.track_field).and_then(value_to_track) {
            self.track_number = track;
        }
    }
}

/// 拆出系列名稱與結尾編號：`"Mistborn #2"` → (`"Mistborn"`, `Some("2")`)
#[must_use]
pub fn split_series_index(series: &str) -> (String, Option<String>) {
    let trimmed = series.trim();
    match REGEX_SERIES_SUFFIX.captures(trimmed) {
        Some(caps) => (
            caps["name"].trim().to_string(),
            Some(caps["index"].to_string()),
        ),
        None => (trimmed.to_string(), None),
    }
}

/// 判斷字串是否像外洩的內部結構資料
#[must_use]
pub fn looks_like_leaked_data(candidate: &str) -> bool {
    let trimmed = candidate.trim();
    trimmed.starts_with('{')
        || trimmed.starts_with('[')
        || trimmed.chars().count() > MAX_SERIES_LENGTH
        || LEAKED_DATA_MARKERS.iter().any(|m| trimmed.contains(m))
}

/// 外洩資料以保留值取代，其餘原樣保留（去除前後空白）
#[must_use]
pub fn sanitize_series_candidate(candidate: &str) -> String {
    if looks_like_leaked_data(candidate) {
        INVALID_SERIES.to_string()
    } else {
        candidate.trim().to_string()
    }
}

/// 字串、字串陣列或數字 → 非空字串列表
#[must_use]
pub fn value_to_strings(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                Vec::new()
            } else {
                vec![s.to_string()]
            }
        }
        Value::Number(n) => vec![n.to_string()],
        Value::Array(items) => items.iter().flat_map(value_to_strings).collect(),
        _ => Vec::new(),
    }
}

#[must_use]
pub fn value_to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// 數字或 `"3/12"` 形式的字串 → 軌道編號
#[must_use]
pub fn value_to_track(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => REGEX_LEADING_NUMBER
            .captures(s)
            .and_then(|caps| caps[1].parse::<u32>().ok()),
        _ => None,
    }
}
