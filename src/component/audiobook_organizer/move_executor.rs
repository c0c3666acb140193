//! 單位移動
//!
//! 一個單位（有中繼資料的目錄、一組專輯檔案或單一檔案）對應一個目標目錄

use super::layout_calculator::LayoutCalculator;
use super::undo_journal::{JournalEntry, UndoJournal};
use crate::error::OrganizeError;
use crate::tools::file_mover::move_file;
use crate::tools::metadata::Metadata;
use crate::tools::path_validator::{clean_path, same_path};
use crate::tools::prompter::Prompter;
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// 要移到同一個目標目錄的檔案
#[derive(Debug, Clone)]
pub struct MoveUnit {
    pub source_dir: PathBuf,
    pub files: Vec<PathBuf>,
    pub metadata: Metadata,
    /// 有值的檔案在移動時加上 `NN - ` 前綴
    pub track_order: BTreeMap<PathBuf, u32>,
}

impl MoveUnit {
    #[must_use]
    pub fn new(source_dir: impl Into<PathBuf>, files: Vec<PathBuf>, metadata: Metadata) -> Self {
        Self {
            source_dir: source_dir.into(),
            files,
            metadata,
            track_order: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_track_order(mut self, track_order: BTreeMap<PathBuf, u32>) -> Self {
        self.track_order = track_order;
        self
    }

    /// 檔案移動後的名稱
    #[must_use]
    pub fn target_file_name(&self, file: &Path) -> String {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match self.track_order.get(file) {
            Some(track) => track_file_name(&name, *track),
            None => name,
        }
    }
}

/// 加上軌道編號前綴；已有相同前綴時不重複加
#[must_use]
pub fn track_file_name(name: &str, track: u32) -> String {
    let prefix = format!("{track:02} - ");
    if name.starts_with(&prefix) {
        name.to_string()
    } else {
        format!("{prefix}{name}")
    }
}

/// 單位處理結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    /// 已在正確位置
    AlreadyInPlace,
    /// 使用者拒絕
    Declined,
    /// dry-run：只列出預計的移動
    Planned { target: PathBuf, files: usize },
    Moved {
        target: PathBuf,
        moved: usize,
        failed: usize,
    },
}

/// 整次執行的統計
#[derive(Debug, Default)]
pub struct OrganizeSummary {
    pub units_moved: usize,
    pub files_moved: usize,
    /// dry-run 預計的移動（來源, 目標）
    pub planned: Vec<(PathBuf, PathBuf)>,
    pub already_organized: usize,
    pub declined: usize,
    pub file_errors: usize,
    /// 每個失敗單位的錯誤說明
    pub errors: Vec<String>,
    pub skipped_files: usize,
    pub removed_dirs: Vec<PathBuf>,
    pub journal_warnings: usize,
    pub restored_files: usize,
    pub interrupted: bool,
}

impl OrganizeSummary {
    pub fn record(&mut self, source: &Path, outcome: &UnitOutcome) {
        match outcome {
            UnitOutcome::AlreadyInPlace => self.already_organized += 1,
            UnitOutcome::Declined => self.declined += 1,
            UnitOutcome::Planned { target, .. } => {
                self.planned.push((source.to_path_buf(), target.clone()));
            }
            UnitOutcome::Moved { moved, failed, .. } => {
                if *moved > 0 {
                    self.units_moved += 1;
                }
                self.files_moved += moved;
                self.file_errors += failed;
            }
        }
    }

    pub fn record_error(&mut self, source: &Path, error: &OrganizeError) {
        if error.is_per_unit() {
            warn!("處理失敗 {}: {error}", source.display());
        } else {
            error!("處理失敗 {}: {error}", source.display());
        }
        self.errors.push(format!("{}: {error}", source.display()));
    }
}

pub struct MoveExecutor<'a> {
    calculator: LayoutCalculator,
    output_root: PathBuf,
    dry_run: bool,
    prompter: Option<&'a dyn Prompter>,
    journal: Option<UndoJournal>,
}

impl<'a> MoveExecutor<'a> {
    /// `journal` 為 `None` 時不寫入紀錄（dry-run）
    #[must_use]
    pub const fn new(
        calculator: LayoutCalculator,
        output_root: PathBuf,
        dry_run: bool,
        journal: Option<UndoJournal>,
    ) -> Self {
        Self {
            calculator,
            output_root,
            dry_run,
            prompter: None,
            journal,
        }
    }

    #[must_use]
    pub fn with_prompter(mut self, prompter: &'a dyn Prompter) -> Self {
        self.prompter = Some(prompter);
        self
    }

    #[must_use]
    pub fn target_for(&self, unit: &MoveUnit) -> PathBuf {
        self.calculator.calculate(&unit.metadata, &self.output_root)
    }

    pub fn execute(
        &mut self,
        unit: &MoveUnit,
        summary: &mut OrganizeSummary,
    ) -> Result<UnitOutcome, OrganizeError> {
        let outcome = self.execute_unit(unit, summary)?;
        summary.record(&unit.source_dir, &outcome);
        Ok(outcome)
    }

    fn execute_unit(
        &mut self,
        unit: &MoveUnit,
        summary: &mut OrganizeSummary,
    ) -> Result<UnitOutcome, OrganizeError> {
        let target = self.target_for(unit);

        if same_path(&unit.source_dir, &target) {
            debug!("已整理: {}", target.display());
            return Ok(UnitOutcome::AlreadyInPlace);
        }

        if let Some(prompter) = self.prompter {
            let message = format!(
                "移動 {} -> {}？",
                unit.source_dir.display(),
                target.display()
            );
            // dialoguer 的錯誤都來自終端機 I/O
            let confirmed = prompter.confirm(&message).map_err(|e| {
                OrganizeError::filesystem(&unit.source_dir, std::io::Error::other(e.to_string()))
            })?;
            if !confirmed {
                info!("略過: {}", unit.source_dir.display());
                return Ok(UnitOutcome::Declined);
            }
        }

        if self.dry_run {
            info!(
                "[dry-run] {} -> {}",
                unit.source_dir.display(),
                target.display()
            );
            for file in &unit.files {
                info!(
                    "[dry-run]   {} -> {}",
                    file.display(),
                    target.join(unit.target_file_name(file)).display()
                );
            }
            return Ok(UnitOutcome::Planned {
                target,
                files: unit.files.len(),
            });
        }

        fs::create_dir_all(&target).map_err(|e| OrganizeError::filesystem(&target, e))?;

        let mut entry = JournalEntry::new(clean_path(&unit.source_dir), clean_path(&target));
        let mut failed = 0;
        for file in &unit.files {
            let original = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let moved_as = unit.target_file_name(file);
            match move_file(file, &target.join(&moved_as)) {
                Ok(method) => {
                    debug!("{method:?}: {original} -> {moved_as}");
                    entry.record(&original, &moved_as);
                }
                Err(e) => {
                    warn!("移動失敗 {}: {e:#}", file.display());
                    failed += 1;
                }
            }
        }

        let moved = entry.files.len();
        if moved > 0 {
            info!(
                "已移動 {} 個檔案: {} -> {}",
                moved,
                unit.source_dir.display(),
                target.display()
            );
            if let Some(journal) = self.journal.as_mut()
                && let Err(e) = journal.append(entry)
            {
                warn!("無法寫入復原紀錄: {e}");
                summary.journal_warnings += 1;
            }
        }

        Ok(UnitOutcome::Moved {
            target,
            moved,
            failed,
        })
    }
}
