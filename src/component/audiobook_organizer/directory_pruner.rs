//! 空目錄清理
//!
//! 由下而上刪除空目錄，基礎目錄與輸出目錄本身永遠保留

use crate::tools::path_validator::same_path;
use crate::tools::prompter::Prompter;
use log::{debug, info, warn};
use std::cmp::Reverse;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub struct DirectoryPruner<'a> {
    protected: Vec<PathBuf>,
    prompter: Option<&'a dyn Prompter>,
}

impl<'a> DirectoryPruner<'a> {
    #[must_use]
    pub fn new(protected: Vec<PathBuf>) -> Self {
        Self {
            protected,
            prompter: None,
        }
    }

    /// 每個目錄刪除前都先詢問
    #[must_use]
    pub fn with_prompter(mut self, prompter: &'a dyn Prompter) -> Self {
        self.prompter = Some(prompter);
        self
    }

    fn is_protected(&self, directory: &Path) -> bool {
        self.protected.iter().any(|p| same_path(p, directory))
    }

    fn is_empty_dir(directory: &Path) -> bool {
        fs::read_dir(directory).is_ok_and(|mut entries| entries.next().is_none())
    }

    fn try_remove(&self, directory: &Path) -> bool {
        if self.is_protected(directory) || !Self::is_empty_dir(directory) {
            return false;
        }

        if let Some(prompter) = self.prompter {
            let message = format!("刪除空資料夾 {}？", directory.display());
            match prompter.confirm(&message) {
                Ok(true) => {}
                Ok(false) => return false,
                Err(e) => {
                    warn!("確認失敗，保留資料夾 {}: {e}", directory.display());
                    return false;
                }
            }
        }

        match fs::remove_dir(directory) {
            Ok(()) => {
                info!("已刪除空資料夾: {}", directory.display());
                true
            }
            Err(e) => {
                warn!("無法刪除資料夾 {}: {e}", directory.display());
                false
            }
        }
    }

    /// 清理 `root` 之下所有空目錄（略過隱藏目錄）
    pub fn prune_tree(&self, root: &Path) -> Vec<PathBuf> {
        let mut directories: Vec<(usize, PathBuf)> = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
            })
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_dir())
            .map(|entry| (entry.depth(), entry.into_path()))
            .collect();

        // 最深的先處理，子目錄刪除後父目錄才可能變空
        directories.sort_by_key(|(depth, _)| Reverse(*depth));

        debug!("檢查 {} 個資料夾是否為空", directories.len());
        directories
            .into_iter()
            .map(|(_, directory)| directory)
            .filter(|directory| self.try_remove(directory))
            .collect()
    }

    /// 從 `start` 往上清理，直到遇到非空或受保護的目錄
    pub fn prune_upwards(&self, start: &Path) -> Vec<PathBuf> {
        let mut removed = Vec::new();
        let mut current = Some(start);
        while let Some(directory) = current {
            if !self.try_remove(directory) {
                break;
            }
            removed.push(directory.to_path_buf());
            current = directory.parent();
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::prompter::FixedPrompter;
    use tempfile::TempDir;

    #[test]
    fn test_prune_tree_bottom_up() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        fs::create_dir_all(base.join("a/b/c")).unwrap();
        fs::create_dir_all(base.join("keep")).unwrap();
        fs::write(base.join("keep/file.mp3"), "x").unwrap();
        fs::create_dir_all(base.join(".hidden/empty")).unwrap();

        let pruner = DirectoryPruner::new(vec![base.to_path_buf()]);
        let removed = pruner.prune_tree(base);

        assert_eq!(removed.len(), 3);
        assert!(!base.join("a").exists());
        assert!(base.join("keep").exists());
        assert!(base.join(".hidden/empty").exists());
        assert!(base.exists());
    }

    #[test]
    fn test_emptied_book_next_to_hidden_tree() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        fs::create_dir_all(base.join(".git/objects/pack")).unwrap();
        fs::create_dir_all(base.join("downloads/book1/cd1")).unwrap();
        fs::create_dir_all(base.join("Author/Book")).unwrap();
        fs::write(base.join("Author/Book/book.m4b"), "x").unwrap();

        let pruner = DirectoryPruner::new(vec![base.to_path_buf()]);
        let removed = pruner.prune_tree(base);

        assert_eq!(
            removed,
            vec![
                base.join("downloads/book1/cd1"),
                base.join("downloads/book1"),
                base.join("downloads"),
            ]
        );
        assert!(base.join(".git/objects/pack").exists());
        assert!(base.join("Author/Book/book.m4b").exists());
    }

    #[test]
    fn test_protected_output_dir_kept() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let output = base.join("library");
        fs::create_dir_all(&output).unwrap();

        let pruner = DirectoryPruner::new(vec![base.to_path_buf(), output.clone()]);
        assert!(pruner.prune_tree(base).is_empty());
        assert!(output.exists());
    }

    #[test]
    fn test_prompt_decline_keeps_directory() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        fs::create_dir_all(base.join("empty")).unwrap();

        let decline = FixedPrompter(false);
        let pruner = DirectoryPruner::new(vec![base.to_path_buf()]).with_prompter(&decline);
        assert!(pruner.prune_tree(base).is_empty());
        assert!(base.join("empty").exists());
    }

    #[test]
    fn test_prune_upwards_stops_at_protected() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("out");
        fs::create_dir_all(output.join("Author/Series/Book")).unwrap();

        let pruner = DirectoryPruner::new(vec![output.clone()]);
        let removed = pruner.prune_upwards(&output.join("Author/Series/Book"));

        assert_eq!(removed.len(), 3);
        assert!(output.exists());
        assert!(!output.join("Author").exists());
    }
}
