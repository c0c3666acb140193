//! 復原紀錄
//!
//! 每完成一個單位就把整份紀錄重新寫入（暫存檔 + rename），
//! 程式中途被終止時已完成的移動仍可復原

use crate::error::OrganizeError;
use crate::tools::file_mover::move_file;
use crate::tools::path_validator::ensure_directory_exists;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// 紀錄檔名稱，位於輸出目錄根部
pub const JOURNAL_FILE_NAME: &str = ".abook-org.log";

/// 一個已完成移動的單位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub source_path: PathBuf,
    pub target_path: PathBuf,
    /// 原始檔名
    pub files: Vec<String>,
    /// 移動後改名的檔名，與 `files` 一一對應；沒有改名時為空
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_files: Vec<String>,
}

impl JournalEntry {
    #[must_use]
    pub fn new(source_path: impl Into<PathBuf>, target_path: impl Into<PathBuf>) -> Self {
        Self {
            timestamp: Utc::now(),
            source_path: source_path.into(),
            target_path: target_path.into(),
            files: Vec::new(),
            target_files: Vec::new(),
        }
    }

    /// 記錄一個已移動的檔案
    ///
    /// 第一次出現改名時補齊先前的檔名，之後每個檔案都記錄目前檔名
    pub fn record(&mut self, original: &str, moved_as: &str) {
        let renamed = self.has_renames() || original != moved_as;
        if renamed && !self.has_renames() {
            self.target_files.clone_from(&self.files);
        }
        self.files.push(original.to_string());
        if renamed {
            self.target_files.push(moved_as.to_string());
        }
    }

    fn has_renames(&self) -> bool {
        self.target_files.len() == self.files.len() && !self.files.is_empty()
    }

    /// (原始檔名, 目前檔名)
    pub fn file_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().enumerate().map(|(index, original)| {
            let moved = self
                .target_files
                .get(index)
                .map_or(original.as_str(), String::as_str);
            (original.as_str(), moved)
        })
    }
}

/// 復原結果
#[derive(Debug, Default)]
pub struct UndoReport {
    pub entries: usize,
    pub restored: usize,
    pub failed: usize,
    /// 已搬空、可供清理的目標目錄
    pub target_dirs: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct UndoJournal {
    path: PathBuf,
    entries: Vec<JournalEntry>,
}

impl UndoJournal {
    /// 空的紀錄（尚未寫入磁碟）
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            path: root.join(JOURNAL_FILE_NAME),
            entries: Vec::new(),
        }
    }

    /// 讀取既有紀錄
    ///
    /// # Returns
    /// * `Ok(None)` - 紀錄檔不存在
    /// * `Err(JournalCorrupt)` - 紀錄檔無法解析
    pub fn load(root: &Path) -> Result<Option<Self>, OrganizeError> {
        let path = root.join(JOURNAL_FILE_NAME);
        if !path.exists() {
            return Ok(None);
        }

        let content =
            fs::read_to_string(&path).map_err(|e| OrganizeError::filesystem(&path, e))?;
        let entries: Vec<JournalEntry> = serde_json::from_str(&content)
            .map_err(|source| OrganizeError::JournalCorrupt {
                path: path.clone(),
                source,
            })?;

        Ok(Some(Self { path, entries }))
    }

    /// 讀取既有紀錄以便接續；不存在或損毀時從空白開始
    #[must_use]
    pub fn load_or_new(root: &Path) -> Self {
        match Self::load(root) {
            Ok(Some(journal)) => journal,
            Ok(None) => Self::new(root),
            Err(e) => {
                warn!("{e}，本次執行將建立新的紀錄");
                Self::new(root)
            }
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// 加入一筆紀錄並重寫整份檔案
    pub fn append(&mut self, entry: JournalEntry) -> Result<(), OrganizeError> {
        self.entries.push(entry);
        self.save()
    }

    fn save(&self) -> Result<(), OrganizeError> {
        let content = serde_json::to_string_pretty(&self.entries).map_err(|source| {
            OrganizeError::JournalCorrupt {
                path: self.path.clone(),
                source,
            }
        })?;

        let directory = self.path.parent().unwrap_or(Path::new("."));
        let temp_path = directory.join(format!("{JOURNAL_FILE_NAME}.{}.tmp", Uuid::new_v4()));

        let written = File::create(&temp_path)
            .and_then(|mut file| {
                file.write_all(content.as_bytes())?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&temp_path, &self.path));

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(OrganizeError::filesystem(&self.path, e));
        }
        Ok(())
    }

    /// 由新到舊逐筆還原，單一檔案失敗只記錄不中止；完成後刪除紀錄檔
    pub fn undo(self, dry_run: bool) -> UndoReport {
        let mut report = UndoReport {
            entries: self.entries.len(),
            ..UndoReport::default()
        };

        for entry in self.entries.iter().rev() {
            if dry_run {
                for (original, moved) in entry.file_pairs() {
                    info!(
                        "[dry-run] 還原 {} -> {}",
                        entry.target_path.join(moved).display(),
                        entry.source_path.join(original).display()
                    );
                    report.restored += 1;
                }
                continue;
            }

            if let Err(e) = ensure_directory_exists(&entry.source_path) {
                warn!("無法建立原始目錄 {}: {e}", entry.source_path.display());
                report.failed += entry.files.len();
                continue;
            }

            for (original, moved) in entry.file_pairs() {
                let from = entry.target_path.join(moved);
                let to = entry.source_path.join(original);
                if !from.exists() {
                    warn!("找不到要還原的檔案: {}", from.display());
                    report.failed += 1;
                    continue;
                }
                match move_file(&from, &to) {
                    Ok(_) => {
                        info!("還原: {} -> {}", from.display(), to.display());
                        report.restored += 1;
                    }
                    Err(e) => {
                        warn!("還原失敗 {}: {e:#}", from.display());
                        report.failed += 1;
                    }
                }
            }

            if !report.target_dirs.contains(&entry.target_path) {
                report.target_dirs.push(entry.target_path.clone());
            }
        }

        if !dry_run {
            match fs::remove_file(&self.path) {
                Ok(()) => info!("已刪除復原紀錄: {}", self.path.display()),
                Err(e) => warn!("無法刪除復原紀錄 {}: {e}", self.path.display()),
            }
        }

        report
    }
}
