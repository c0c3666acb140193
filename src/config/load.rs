use crate::config::types::{
    FileTypeTable, Layout, OrganizerConfig, SeriesFormat, UserSettings,
};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// 編譯時嵌入的檔案類型設定（不需要外部檔案）
const FILE_TYPE_TABLE_JSON: &str = include_str!("../data/file_type_table.json");

/// 從編譯時嵌入的 JSON 載入檔案類型表
pub fn load_embedded_file_type_table() -> Result<FileTypeTable> {
    serde_json::from_str(FILE_TYPE_TABLE_JSON).context("無法解析嵌入的檔案類型設定")
}

/// 讀取設定檔；檔案不存在時回傳預設值
pub fn load_settings(path: &Path) -> Result<UserSettings> {
    if !path.exists() {
        return Ok(UserSettings::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse settings from {}", path.display()))
}

impl OrganizerConfig {
    /// 套用設定檔中有填寫的欄位（命令列參數之後再覆蓋）
    pub fn apply_settings(&mut self, settings: &UserSettings) {
        if let Some(output_dir) = &settings.output_dir {
            self.output_dir = Some(output_dir.clone());
        }
        if let Some(layout) = &settings.layout {
            self.layout = Layout::from_name(layout);
        }
        if let Some(format) = &settings.series_format {
            self.series_format = SeriesFormat::from_name(format);
        }
        if let Some(padding) = settings.series_padding {
            self.series_padding = padding;
        }
        if let Some(replace_space) = &settings.replace_space {
            self.replace_space = Some(replace_space.clone());
        }
        if let Some(flag) = settings.use_embedded_metadata {
            self.use_embedded_metadata = flag;
        }
        if let Some(flag) = settings.flat {
            self.flat = flag;
        }
        if let Some(flag) = settings.remove_empty {
            self.remove_empty = flag;
        }
        if let Some(mapping) = &settings.field_mapping {
            self.field_mapping = mapping.clone();
        }
    }
}
