//! 目標路徑計算
//!
//! 純函式：相同的中繼資料與設定永遠得到相同的路徑，不存取檔案系統

use crate::config::{Layout, OrganizerConfig, SeriesFormat};
use crate::tools::metadata::Metadata;
use crate::tools::path_sanitizer::PathSanitizer;
use std::path::{Path, PathBuf};

/// 作者之間的分隔符號
const AUTHOR_SEPARATOR: &str = ",";

#[derive(Debug, Clone)]
pub struct LayoutCalculator {
    layout: Layout,
    series_format: SeriesFormat,
    series_padding: usize,
    sanitizer: PathSanitizer,
}

impl LayoutCalculator {
    #[must_use]
    pub const fn new(
        layout: Layout,
        series_format: SeriesFormat,
        series_padding: usize,
        sanitizer: PathSanitizer,
    ) -> Self {
        Self {
            layout,
            series_format,
            series_padding,
            sanitizer,
        }
    }

    #[must_use]
    pub fn from_config(config: &OrganizerConfig) -> Self {
        Self::new(
            config.layout,
            config.series_format,
            config.series_padding,
            PathSanitizer::new(config.replace_space.clone()),
        )
    }

    /// 計算 `root` 之下的目標目錄
    #[must_use]
    pub fn calculate(&self, metadata: &Metadata, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for component in self.components(metadata) {
            path.push(self.sanitizer.sanitize_component(&component));
        }
        path
    }

    /// 未清理的路徑元件
    #[must_use]
    pub fn components(&self, metadata: &Metadata) -> Vec<String> {
        let author = metadata
            .author_names()
            .collect::<Vec<_>>()
            .join(AUTHOR_SEPARATOR);
        let title = metadata.title.trim().to_string();
        let series = metadata.series_name();

        let Some(series) = series.filter(|_| self.layout.uses_series()) else {
            return match self.layout {
                Layout::AuthorOnly => vec![author],
                _ => vec![author, title],
            };
        };

        // 系列即標題時省略標題
        let leaf = if title == series {
            None
        } else if self.layout.uses_number() {
            let prefix = metadata
                .series_index()
                .map(|index| self.format_index(index))
                .unwrap_or_default();
            Some(format!("{prefix}{title}"))
        } else {
            Some(title)
        };

        let mut components = Vec::with_capacity(3);
        if matches!(
            self.layout,
            Layout::AuthorSeriesTitle | Layout::AuthorSeriesTitleNumber
        ) {
            components.push(author);
        }
        components.push(series);
        components.extend(leaf);
        components
    }

    /// 系列編號前綴：`#N - ` 或 `[0N] `
    #[must_use]
    pub fn format_index(&self, index: f64) -> String {
        match self.series_format {
            SeriesFormat::Hash => format!("#{} - ", format_number(index, 0)),
            SeriesFormat::Bracket => format!("[{}] ", format_number(index, self.series_padding)),
        }
    }
}

/// 整數部分補零，小數部分原樣保留
fn format_number(index: f64, padding: usize) -> String {
    let whole = index.trunc();
    let integer = format!("{:0padding$}", whole as u64);
    if (index - whole).abs() < f64::EPSILON {
        return integer;
    }
    let text = index.to_string();
    match text.split_once('.') {
        Some((_, fraction)) => format!("{integer}.{fraction}"),
        None => integer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::metadata::{INVALID_SERIES, SourceType};
    use crate::tools::path_sanitizer::TargetOs;
    use serde_json::json;

    fn calculator(layout: Layout, format: SeriesFormat) -> LayoutCalculator {
        LayoutCalculator::new(layout, format, 2, PathSanitizer::for_os(TargetOs::Unix, None))
    }

    fn book(title: &str, authors: &[&str], series: &[&str]) -> Metadata {
        let mut metadata = Metadata::new(SourceType::Json, "/in/book/metadata.json");
        metadata.title = title.to_string();
        metadata.authors = authors.iter().map(ToString::to_string).collect();
        metadata.series = series.iter().map(ToString::to_string).collect();
        metadata
    }

    fn mistborn() -> Metadata {
        let mut metadata = book("The Final Empire", &["Brandon Sanderson"], &["Mistborn"]);
        metadata
            .raw_data
            .insert("series_index".to_string(), json!(1.0));
        metadata
    }

    #[test]
    fn test_mistborn_bracket_path() {
        let path = calculator(Layout::AuthorSeriesTitleNumber, SeriesFormat::Bracket)
            .calculate(&mistborn(), Path::new("/base"));
        assert_eq!(
            path,
            PathBuf::from("/base/Brandon Sanderson/Mistborn/[01] The Final Empire")
        );
    }

    #[test]
    fn test_mistborn_hash_path() {
        let path = calculator(Layout::AuthorSeriesTitleNumber, SeriesFormat::Hash)
            .calculate(&mistborn(), Path::new("/base"));
        assert_eq!(
            path,
            PathBuf::from("/base/Brandon Sanderson/Mistborn/#1 - The Final Empire")
        );
    }

    #[test]
    fn test_all_layouts() {
        let metadata = mistborn();
        let root = Path::new("/out");
        let expected = [
            (Layout::AuthorOnly, "/out/Brandon Sanderson"),
            (Layout::AuthorTitle, "/out/Brandon Sanderson/The Final Empire"),
            (
                Layout::AuthorSeriesTitle,
                "/out/Brandon Sanderson/Mistborn/The Final Empire",
            ),
            (Layout::SeriesTitle, "/out/Mistborn/The Final Empire"),
            (
                Layout::AuthorSeriesTitleNumber,
                "/out/Brandon Sanderson/Mistborn/[01] The Final Empire",
            ),
            (Layout::SeriesTitleNumber, "/out/Mistborn/[01] The Final Empire"),
        ];
        for (layout, path) in expected {
            assert_eq!(
                calculator(layout, SeriesFormat::Bracket).calculate(&metadata, root),
                PathBuf::from(path),
                "{layout}"
            );
        }
    }

    #[test]
    fn test_series_layout_without_series_falls_back() {
        let metadata = book("Standalone", &["Author"], &[]);
        for layout in [
            Layout::AuthorSeriesTitle,
            Layout::SeriesTitle,
            Layout::SeriesTitleNumber,
        ] {
            assert_eq!(
                calculator(layout, SeriesFormat::Bracket).calculate(&metadata, Path::new("/o")),
                PathBuf::from("/o/Author/Standalone")
            );
        }
    }

    #[test]
    fn test_sentinel_series_never_in_path() {
        let metadata = book("Book", &["Author"], &[INVALID_SERIES]);
        let path = calculator(Layout::AuthorSeriesTitle, SeriesFormat::Bracket)
            .calculate(&metadata, Path::new("/o"));
        assert_eq!(path, PathBuf::from("/o/Author/Book"));
    }

    #[test]
    fn test_series_index_from_text() {
        let metadata = book("The Well of Ascension", &["B. S."], &["Mistborn #2"]);
        let path = calculator(Layout::SeriesTitleNumber, SeriesFormat::Bracket)
            .calculate(&metadata, Path::new("/o"));
        assert_eq!(path, PathBuf::from("/o/Mistborn/[02] The Well of Ascension"));
    }

    #[test]
    fn test_non_positive_index_has_no_prefix() {
        let mut metadata = book("Prequel", &["Author"], &["Saga"]);
        metadata
            .raw_data
            .insert("series_index".to_string(), json!(0));
        let path = calculator(Layout::SeriesTitleNumber, SeriesFormat::Bracket)
            .calculate(&metadata, Path::new("/o"));
        assert_eq!(path, PathBuf::from("/o/Saga/Prequel"));
    }

    #[test]
    fn test_multiple_series_alphabetical() {
        let metadata = book("Book", &["Author"], &["Zeta", "Alpha #3"]);
        let path = calculator(Layout::SeriesTitleNumber, SeriesFormat::Bracket)
            .calculate(&metadata, Path::new("/o"));
        assert_eq!(path, PathBuf::from("/o/Alpha/[03] Book"));
    }

    #[test]
    fn test_title_omitted_when_equal_to_series() {
        let metadata = book("Dune", &["Frank Herbert"], &["Dune"]);
        let path = calculator(Layout::AuthorSeriesTitle, SeriesFormat::Bracket)
            .calculate(&metadata, Path::new("/o"));
        assert_eq!(path, PathBuf::from("/o/Frank Herbert/Dune"));
    }

    #[test]
    fn test_multiple_authors_joined() {
        let metadata = book("Good Omens", &["Terry Pratchett", " ", "Neil Gaiman"], &[]);
        let path = calculator(Layout::AuthorTitle, SeriesFormat::Bracket)
            .calculate(&metadata, Path::new("/o"));
        assert_eq!(path, PathBuf::from("/o/Terry Pratchett,Neil Gaiman/Good Omens"));
    }

    #[test]
    fn test_components_are_sanitized() {
        let metadata = book("What If?: Serious Answers", &["Randall Munroe."], &[]);
        let path = calculator(Layout::AuthorTitle, SeriesFormat::Bracket)
            .calculate(&metadata, Path::new("/o"));
        assert_eq!(
            path,
            PathBuf::from("/o/Randall Munroe/What If__ Serious Answers")
        );
    }

    #[test]
    fn test_fractional_index() {
        let calc = calculator(Layout::SeriesTitleNumber, SeriesFormat::Bracket);
        assert_eq!(calc.format_index(1.5), "[01.5] ");
        assert_eq!(calc.format_index(12.0), "[12] ");
        let hash = calculator(Layout::SeriesTitleNumber, SeriesFormat::Hash);
        assert_eq!(hash.format_index(2.5), "#2.5 - ");
    }

    #[test]
    fn test_bracket_sort_safety() {
        let calc = calculator(Layout::SeriesTitleNumber, SeriesFormat::Bracket);
        let names: Vec<String> = (1..=99)
            .map(|i| format!("{}Title", calc.format_index(f64::from(i))))
            .collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_fractional_sorts_between_neighbors() {
        let calc = calculator(Layout::SeriesTitleNumber, SeriesFormat::Bracket);
        let mut names = vec![
            format!("{}X", calc.format_index(2.0)),
            format!("{}X", calc.format_index(1.5)),
            format!("{}X", calc.format_index(0.5)),
        ];
        names.sort();
        assert_eq!(names, vec!["[00.5] X", "[01.5] X", "[02] X"]);

        // 同一整數部分時小數排在整數之前（`.` < `]`）
        let mut names = vec![
            format!("{}X", calc.format_index(1.0)),
            format!("{}X", calc.format_index(1.5)),
        ];
        names.sort();
        assert_eq!(names[0], "[01.5] X");
    }

    #[test]
    fn test_hash_sort_is_not_numeric() {
        let calc = calculator(Layout::SeriesTitleNumber, SeriesFormat::Hash);
        let mut names = vec![calc.format_index(2.0), calc.format_index(10.0)];
        names.sort();
        // "#10" 排在 "#2" 之前
        assert_eq!(names[0], "#10 - ");
    }
}
