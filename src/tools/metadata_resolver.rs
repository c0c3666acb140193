//! 中繼資料解析器
//!
//! 依設定決定來源順序，並在擷取後套用欄位對應

use crate::config::{FieldMapping, FileTypeTable, OrganizerConfig};
use crate::error::OrganizeError;
use crate::tools::audio_metadata::AudioMetadataProvider;
use crate::tools::epub_metadata::EpubMetadataProvider;
use crate::tools::file_scanner::list_files;
use crate::tools::json_metadata::{JsonMetadataProvider, SIDECAR_FILE_NAME};
use crate::tools::metadata::{Metadata, SourceType};
use log::{debug, info};
use std::path::{Path, PathBuf};

/// 單一中繼資料來源
pub trait MetadataProvider {
    fn source_type(&self) -> SourceType;
    fn path(&self) -> &Path;
    /// 擷取原始中繼資料；有效性由呼叫端檢查
    fn extract(&self) -> Result<Metadata, OrganizeError>;
}

pub struct MetadataResolver {
    field_mapping: FieldMapping,
    file_type_table: FileTypeTable,
    use_embedded_metadata: bool,
    verbose: bool,
}

impl MetadataResolver {
    #[must_use]
    pub fn new(
        field_mapping: FieldMapping,
        file_type_table: FileTypeTable,
        use_embedded_metadata: bool,
        verbose: bool,
    ) -> Self {
        Self {
            field_mapping,
            file_type_table,
            use_embedded_metadata,
            verbose,
        }
    }

    #[must_use]
    pub fn from_config(config: &OrganizerConfig) -> Self {
        Self::new(
            config.field_mapping.clone(),
            config.file_type_table.clone(),
            config.use_embedded_metadata,
            config.verbose,
        )
    }

    #[must_use]
    pub const fn file_type_table(&self) -> &FileTypeTable {
        &self.file_type_table
    }

    /// 依檔名選擇對應的來源
    #[must_use]
    pub fn provider_for(&self, path: &Path) -> Option<Box<dyn MetadataProvider>> {
        let is_sidecar = path
            .file_name()
            .is_some_and(|name| name.eq_ignore_ascii_case(SIDECAR_FILE_NAME));

        if is_sidecar {
            Some(Box::new(JsonMetadataProvider::new(path)))
        } else if self.file_type_table.is_epub_file(path) {
            Some(Box::new(EpubMetadataProvider::new(path, self.verbose)))
        } else if self.file_type_table.is_audio_file(path) {
            Some(Box::new(AudioMetadataProvider::new(path)))
        } else {
            None
        }
    }

    /// 擷取並套用欄位對應
    pub fn resolve(&self, provider: &dyn MetadataProvider) -> Result<Metadata, OrganizeError> {
        let mut metadata = provider.extract()?;
        metadata.apply_field_mapping(&self.field_mapping);

        if self.verbose {
            info!(
                "讀取 {}: {} - {:?} [{}]",
                provider.source_type().label(),
                metadata.title,
                metadata.authors,
                provider.path().display()
            );
        } else {
            debug!(
                "讀取 {}: {}",
                provider.source_type().label(),
                provider.path().display()
            );
        }

        Ok(metadata)
    }

    pub fn resolve_file(&self, path: &Path) -> Result<Metadata, OrganizeError> {
        let provider = self
            .provider_for(path)
            .ok_or_else(|| OrganizeError::UnsupportedSource {
                path: path.to_path_buf(),
            })?;
        self.resolve(provider.as_ref())
    }

    /// 目錄中可用來源的嘗試順序
    ///
    /// 未啟用內嵌中繼資料時只看 metadata.json，鬆散的音訊檔不會被當成同一本書
    fn directory_candidates(&self, files: &[PathBuf]) -> Vec<Box<dyn MetadataProvider>> {
        let sidecar = files
            .iter()
            .find(|f| {
                f.file_name()
                    .is_some_and(|n| n.eq_ignore_ascii_case(SIDECAR_FILE_NAME))
            })
            .map(|f| Box::new(JsonMetadataProvider::new(f)) as Box<dyn MetadataProvider>);
        if !self.use_embedded_metadata {
            return sidecar.into_iter().collect();
        }

        let epub = files
            .iter()
            .find(|f| self.file_type_table.is_epub_file(f))
            .map(|f| {
                Box::new(EpubMetadataProvider::new(f, self.verbose)) as Box<dyn MetadataProvider>
            });
        let audio = files
            .iter()
            .find(|f| self.file_type_table.is_audio_file(f))
            .map(|f| Box::new(AudioMetadataProvider::new(f)) as Box<dyn MetadataProvider>);

        [epub, audio, sidecar].into_iter().flatten().collect()
    }

    /// 解析目錄的中繼資料
    ///
    /// # Returns
    /// * `Ok(Some(_))` - 找到有效的中繼資料
    /// * `Ok(None)` - 目錄中沒有任何來源（不是錯誤）
    /// * `Err(_)` - 有來源但都無效或無法讀取
    pub fn resolve_directory(&self, directory: &Path) -> Result<Option<Metadata>, OrganizeError> {
        let files = list_files(directory).map_err(|e| OrganizeError::filesystem(directory, e))?;
        let candidates = self.directory_candidates(&files);
        if candidates.is_empty() {
            return Ok(None);
        }

        let mut last_error = None;
        for provider in candidates {
            match self.resolve(provider.as_ref()) {
                Ok(metadata) => match metadata.validate() {
                    Ok(()) => return Ok(Some(metadata)),
                    Err(e) => {
                        debug!("{} 無效: {e}", provider.source_type().label());
                        last_error = Some(e);
                    }
                },
                Err(e) => {
                    debug!("{} 讀取失敗: {e}", provider.source_type().label());
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| OrganizeError::invalid(directory, "no usable metadata source")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load::load_embedded_file_type_table;
    use crate::tools::epub_metadata::tests::write_epub;
    use std::fs;
    use tempfile::TempDir;

    fn resolver(use_embedded: bool) -> MetadataResolver {
        MetadataResolver::new(
            FieldMapping::default(),
            load_embedded_file_type_table().unwrap(),
            use_embedded,
            false,
        )
    }

    fn write_sidecar(dir: &Path, title: &str) {
        fs::write(
            dir.join(SIDECAR_FILE_NAME),
            format!(r#"{{"title": "{title}", "authors": ["Sidecar Author"]}}"#),
        )
        .unwrap();
    }

    fn write_test_epub(dir: &Path, title: &str) {
        write_epub(
            &dir.join("book.epub"),
            &format!("<dc:title>{title}</dc:title><dc:creator>Epub Author</dc:creator>"),
        );
    }

    #[test]
    fn test_sidecar_first_by_default() {
        let temp_dir = TempDir::new().unwrap();
        write_sidecar(temp_dir.path(), "From Sidecar");
        write_test_epub(temp_dir.path(), "From Epub");

        let metadata = resolver(false)
            .resolve_directory(temp_dir.path())
            .unwrap()
            .unwrap();
        assert_eq!(metadata.title, "From Sidecar");
        assert_eq!(metadata.source_type, SourceType::Json);
    }

    #[test]
    fn test_embedded_first_when_enabled() {
        let temp_dir = TempDir::new().unwrap();
        write_sidecar(temp_dir.path(), "From Sidecar");
        write_test_epub(temp_dir.path(), "From Epub");

        let metadata = resolver(true)
            .resolve_directory(temp_dir.path())
            .unwrap()
            .unwrap();
        assert_eq!(metadata.title, "From Epub");
        assert_eq!(metadata.source_type, SourceType::Epub);
    }

    #[test]
    fn test_embedded_falls_back_to_sidecar() {
        let temp_dir = TempDir::new().unwrap();
        write_sidecar(temp_dir.path(), "From Sidecar");
        // 無效的 EPUB 與音訊檔
        fs::write(temp_dir.path().join("broken.epub"), b"nope").unwrap();
        fs::write(temp_dir.path().join("01.mp3"), b"nope").unwrap();

        let metadata = resolver(true)
            .resolve_directory(temp_dir.path())
            .unwrap()
            .unwrap();
        assert_eq!(metadata.source_type, SourceType::Json);
    }

    #[test]
    fn test_embedded_ignored_when_disabled() {
        let temp_dir = TempDir::new().unwrap();
        write_test_epub(temp_dir.path(), "From Epub");
        fs::write(temp_dir.path().join("a.mp3"), b"audio").unwrap();

        let result = resolver(false).resolve_directory(temp_dir.path()).unwrap();
        assert!(result.is_none());

        let metadata = resolver(true)
            .resolve_directory(temp_dir.path())
            .unwrap()
            .unwrap();
        assert_eq!(metadata.title, "From Epub");
    }

    #[test]
    fn test_missing_metadata_is_none() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("cover.jpg"), b"jpg").unwrap();

        let result = resolver(false).resolve_directory(temp_dir.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_invalid_metadata_is_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(SIDECAR_FILE_NAME),
            r#"{"title": "", "authors": []}"#,
        )
        .unwrap();

        let result = resolver(false).resolve_directory(temp_dir.path());
        assert!(matches!(result, Err(OrganizeError::MetadataInvalid { .. })));
    }

    #[test]
    fn test_field_mapping_applied() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(SIDECAR_FILE_NAME),
            r#"{"title": "Track 1", "album": "Real Title", "writer": "Real Author"}"#,
        )
        .unwrap();

        let resolver = MetadataResolver::new(
            FieldMapping {
                title_field: "album".to_string(),
                author_fields: vec!["writer".to_string()],
                ..FieldMapping::default()
            },
            load_embedded_file_type_table().unwrap(),
            false,
            false,
        );
        let metadata = resolver
            .resolve_directory(temp_dir.path())
            .unwrap()
            .unwrap();
        assert_eq!(metadata.title, "Real Title");
        assert_eq!(metadata.authors, vec!["Real Author".to_string()]);
    }

    #[test]
    fn test_resolve_unsupported_file() {
        let result = resolver(false).resolve_file(Path::new("/tmp/cover.jpg"));
        assert!(matches!(result, Err(OrganizeError::UnsupportedSource { .. })));
    }
}
