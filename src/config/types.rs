use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// 預設的系列編號補零寬度
pub const DEFAULT_SERIES_PADDING: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTypeTable {
    #[serde(rename = "AUDIO_FILE")]
    pub audio_file: Vec<String>,
    #[serde(rename = "EBOOK_FILE")]
    pub ebook_file: Vec<String>,
}

impl FileTypeTable {
    fn extension_of(path: &Path) -> Option<String> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext.to_lowercase()))
    }

    #[must_use]
    pub fn is_audio_file(&self, path: &Path) -> bool {
        Self::extension_of(path)
            .is_some_and(|ext| self.audio_file.iter().any(|e| e.eq_ignore_ascii_case(&ext)))
    }

    #[must_use]
    pub fn is_ebook_file(&self, path: &Path) -> bool {
        Self::extension_of(path)
            .is_some_and(|ext| self.ebook_file.iter().any(|e| e.eq_ignore_ascii_case(&ext)))
    }

    /// 目前只有 EPUB 能讀出內嵌中繼資料
    #[must_use]
    pub fn is_epub_file(&self, path: &Path) -> bool {
        Self::extension_of(path).is_some_and(|ext| ext == ".epub")
    }
}

/// 目錄命名規則
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    AuthorOnly,
    AuthorTitle,
    #[default]
    AuthorSeriesTitle,
    SeriesTitle,
    AuthorSeriesTitleNumber,
    SeriesTitleNumber,
}

impl Layout {
    pub const ALL: [Self; 6] = [
        Self::AuthorOnly,
        Self::AuthorTitle,
        Self::AuthorSeriesTitle,
        Self::SeriesTitle,
        Self::AuthorSeriesTitleNumber,
        Self::SeriesTitleNumber,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AuthorOnly => "author-only",
            Self::AuthorTitle => "author-title",
            Self::AuthorSeriesTitle => "author-series-title",
            Self::SeriesTitle => "series-title",
            Self::AuthorSeriesTitleNumber => "author-series-title-number",
            Self::SeriesTitleNumber => "series-title-number",
        }
    }

    /// 依名稱解析，未知名稱退回 `author-title`
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let normalized = name.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|layout| layout.name() == normalized)
            .unwrap_or_else(|| {
                warn!("未知的目錄結構 '{name}'，改用 author-title");
                Self::AuthorTitle
            })
    }

    #[must_use]
    pub const fn uses_series(self) -> bool {
        matches!(
            self,
            Self::AuthorSeriesTitle
                | Self::SeriesTitle
                | Self::AuthorSeriesTitleNumber
                | Self::SeriesTitleNumber
        )
    }

    #[must_use]
    pub const fn uses_number(self) -> bool {
        matches!(self, Self::AuthorSeriesTitleNumber | Self::SeriesTitleNumber)
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 系列編號格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesFormat {
    /// `#N - `，保留給舊的目錄結構；字典序不安全（#10 排在 #2 前面）
    Hash,
    /// `[0N] `，補零後字典序與數值順序一致
    #[default]
    Bracket,
}

impl SeriesFormat {
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "hash" => Self::Hash,
            "bracket" => Self::Bracket,
            other => {
                warn!("未知的系列編號格式 '{other}'，改用 bracket");
                Self::Bracket
            }
        }
    }
}

/// 指定 RawData 中哪些欄位對應到標準欄位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMapping {
    pub title_field: String,
    pub series_field: String,
    pub author_fields: Vec<String>,
    pub track_field: String,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            title_field: "title".to_string(),
            series_field: "series".to_string(),
            author_fields: vec!["authors".to_string()],
            track_field: "track_number".to_string(),
        }
    }
}

impl FieldMapping {
    /// 有聲書常見設定：以專輯作為系列，作者取自演出者或專輯演出者
    #[must_use]
    pub fn audio_album_as_series() -> Self {
        Self {
            series_field: "album".to_string(),
            author_fields: vec!["artist".to_string(), "album_artist".to_string()],
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// 設定檔內容，所有欄位皆可省略
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub output_dir: Option<PathBuf>,
    pub layout: Option<String>,
    pub series_format: Option<String>,
    pub series_padding: Option<usize>,
    pub replace_space: Option<String>,
    pub use_embedded_metadata: Option<bool>,
    pub flat: Option<bool>,
    pub remove_empty: Option<bool>,
    pub field_mapping: Option<FieldMapping>,
}

/// 單次執行的完整設定，執行期間不可變
#[derive(Debug, Clone)]
pub struct OrganizerConfig {
    pub base_dir: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub layout: Layout,
    pub series_format: SeriesFormat,
    pub series_padding: usize,
    pub replace_space: Option<String>,
    pub verbose: bool,
    pub dry_run: bool,
    pub undo: bool,
    pub prompt: bool,
    pub remove_empty: bool,
    pub flat: bool,
    pub use_embedded_metadata: bool,
    pub field_mapping: FieldMapping,
    pub file_type_table: FileTypeTable,
}

impl OrganizerConfig {
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>, file_type_table: FileTypeTable) -> Self {
        Self {
            base_dir: base_dir.into(),
            output_dir: None,
            layout: Layout::default(),
            series_format: SeriesFormat::default(),
            series_padding: DEFAULT_SERIES_PADDING,
            replace_space: None,
            verbose: false,
            dry_run: false,
            undo: false,
            prompt: false,
            remove_empty: false,
            flat: false,
            use_embedded_metadata: false,
            field_mapping: FieldMapping::default(),
            file_type_table,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_from_name() {
        assert_eq!(Layout::from_name("author-only"), Layout::AuthorOnly);
        assert_eq!(
            Layout::from_name(" Author-Series-Title-Number "),
            Layout::AuthorSeriesTitleNumber
        );
        assert_eq!(Layout::from_name("series-title"), Layout::SeriesTitle);
        // 未知名稱退回 author-title
        assert_eq!(Layout::from_name("genre-title"), Layout::AuthorTitle);
    }

    #[test]
    fn test_layout_flags() {
        assert!(Layout::AuthorSeriesTitle.uses_series());
        assert!(!Layout::AuthorSeriesTitle.uses_number());
        assert!(Layout::SeriesTitleNumber.uses_number());
        assert!(!Layout::AuthorTitle.uses_series());
    }

    #[test]
    fn test_series_format_from_name() {
        assert_eq!(SeriesFormat::from_name("HASH"), SeriesFormat::Hash);
        assert_eq!(SeriesFormat::from_name("bracket"), SeriesFormat::Bracket);
        assert_eq!(SeriesFormat::from_name("curly"), SeriesFormat::Bracket);
    }

    #[test]
    fn test_file_type_detection() {
        let table = FileTypeTable {
            audio_file: vec![".mp3".to_string(), ".m4b".to_string()],
            ebook_file: vec![".epub".to_string(), ".pdf".to_string()],
        };
        assert!(table.is_audio_file(Path::new("/a/Track01.MP3")));
        assert!(!table.is_audio_file(Path::new("/a/cover.jpg")));
        assert!(table.is_epub_file(Path::new("/a/book.Epub")));
        assert!(table.is_ebook_file(Path::new("/a/book.pdf")));
        assert!(!table.is_epub_file(Path::new("/a/book.pdf")));
    }
}
