//! 有聲書整理元件
//!
//! 解析路徑後依設定進入復原、dry-run 或實際整理三種模式之一

use super::album_grouper::AlbumGrouper;
use super::directory_pruner::DirectoryPruner;
use super::layout_calculator::LayoutCalculator;
use super::move_executor::{MoveExecutor, MoveUnit, OrganizeSummary};
use super::undo_journal::UndoJournal;
use crate::config::OrganizerConfig;
use crate::error::OrganizeError;
use crate::tools::file_scanner::{list_files, scan_directories};
use crate::tools::metadata_resolver::MetadataResolver;
use crate::tools::path_validator::{resolve_base_dir, resolve_output_dir};
use crate::tools::prompter::{DialoguerPrompter, Prompter};
use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 顯示的預計移動數量上限
const DISPLAY_LIMIT: usize = 10;

/// 本次執行的模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Undo,
    DryRunScan,
    LiveScan,
}

impl RunMode {
    #[must_use]
    pub const fn from_config(config: &OrganizerConfig) -> Self {
        if config.undo {
            Self::Undo
        } else if config.dry_run {
            Self::DryRunScan
        } else {
            Self::LiveScan
        }
    }
}

/// 解析後的絕對路徑
#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub base_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl ResolvedPaths {
    /// 輸出目錄在基礎目錄之內（且不相同）時，掃描要略過的子樹
    #[must_use]
    pub fn nested_output(&self) -> Option<&Path> {
        (self.output_dir != self.base_dir && self.output_dir.starts_with(&self.base_dir))
            .then_some(self.output_dir.as_path())
    }
}

pub struct AudiobookOrganizer {
    config: OrganizerConfig,
    shutdown_signal: Arc<AtomicBool>,
    prompter: Box<dyn Prompter>,
}

impl AudiobookOrganizer {
    #[must_use]
    pub fn new(config: OrganizerConfig, shutdown_signal: Arc<AtomicBool>) -> Self {
        Self {
            config,
            shutdown_signal,
            prompter: Box::new(DialoguerPrompter),
        }
    }

    /// 替換確認方式（測試或非互動介面）
    #[must_use]
    pub fn with_prompter(mut self, prompter: Box<dyn Prompter>) -> Self {
        self.prompter = prompter;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &OrganizerConfig {
        &self.config
    }

    /// 執行整理
    ///
    /// 只有基礎目錄無法解析或復原紀錄損毀時回傳錯誤，單一單位的失敗記錄在摘要中
    pub fn run(&self) -> Result<OrganizeSummary> {
        let paths = self.resolve_paths()?;
        let mode = RunMode::from_config(&self.config);
        info!(
            "開始整理 ({mode:?}): {} -> {}",
            paths.base_dir.display(),
            paths.output_dir.display()
        );

        let summary = match mode {
            RunMode::Undo => self.run_undo(&paths)?,
            RunMode::DryRunScan | RunMode::LiveScan => self.run_scan(&paths),
        };
        Ok(summary)
    }

    pub fn resolve_paths(&self) -> Result<ResolvedPaths, OrganizeError> {
        let base_dir = resolve_base_dir(&self.config.base_dir)?;
        let output_dir = match &self.config.output_dir {
            Some(output) => {
                let create = !self.config.dry_run && !self.config.undo;
                resolve_output_dir(output, create)?
            }
            None => base_dir.clone(),
        };
        Ok(ResolvedPaths {
            base_dir,
            output_dir,
        })
    }

    fn prompter(&self) -> Option<&dyn Prompter> {
        self.config.prompt.then_some(self.prompter.as_ref())
    }

    fn is_interrupted(&self) -> bool {
        self.shutdown_signal.load(Ordering::SeqCst)
    }

    fn run_undo(&self, paths: &ResolvedPaths) -> Result<OrganizeSummary, OrganizeError> {
        let mut summary = OrganizeSummary::default();
        let Some(journal) = UndoJournal::load(&paths.output_dir)? else {
            info!("沒有可復原的紀錄: {}", paths.output_dir.display());
            return Ok(summary);
        };

        let report = journal.undo(self.config.dry_run);
        info!(
            "復原 {} 筆紀錄：成功 {} 個檔案，失敗 {} 個",
            report.entries, report.restored, report.failed
        );
        summary.restored_files = report.restored;
        summary.file_errors = report.failed;

        if !self.config.dry_run && self.config.remove_empty {
            let pruner = self.pruner(paths);
            for directory in &report.target_dirs {
                summary.removed_dirs.extend(pruner.prune_upwards(directory));
            }
        }
        Ok(summary)
    }

    fn pruner(&self, paths: &ResolvedPaths) -> DirectoryPruner<'_> {
        let pruner =
            DirectoryPruner::new(vec![paths.base_dir.clone(), paths.output_dir.clone()]);
        match self.prompter() {
            Some(prompter) => pruner.with_prompter(prompter),
            None => pruner,
        }
    }

    fn create_progress_bar(&self, len: usize) -> ProgressBar {
        if self.config.verbose || self.config.prompt {
            return ProgressBar::hidden();
        }
        let progress_bar = ProgressBar::new(len as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("#>-"),
        );
        progress_bar
    }

    fn run_scan(&self, paths: &ResolvedPaths) -> OrganizeSummary {
        let mut summary = OrganizeSummary::default();
        let directories = scan_directories(&paths.base_dir, paths.nested_output());
        debug!("共 {} 個資料夾", directories.len());

        let resolver = MetadataResolver::from_config(&self.config);
        let journal =
            (!self.config.dry_run).then(|| UndoJournal::load_or_new(&paths.output_dir));
        let mut executor = MoveExecutor::new(
            LayoutCalculator::from_config(&self.config),
            paths.output_dir.clone(),
            self.config.dry_run,
            journal,
        );
        if let Some(prompter) = self.prompter() {
            executor = executor.with_prompter(prompter);
        }

        let progress_bar = self.create_progress_bar(directories.len());
        for directory in &directories {
            if self.is_interrupted() {
                warn!("收到中斷訊號，停止處理");
                summary.interrupted = true;
                break;
            }
            progress_bar.set_message(
                directory
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
            );

            let units = if self.config.flat {
                self.flat_units(&resolver, directory, &mut summary)
            } else {
                self.hierarchical_unit(&resolver, directory, &mut summary)
                    .into_iter()
                    .collect()
            };

            for unit in units {
                if self.is_interrupted() {
                    break;
                }
                if let Err(e) = executor.execute(&unit, &mut summary) {
                    summary.record_error(&unit.source_dir, &e);
                }
            }
            progress_bar.inc(1);
        }
        progress_bar.finish_and_clear();

        if !self.config.dry_run && self.config.remove_empty && !summary.interrupted {
            summary.removed_dirs = self.pruner(paths).prune_tree(&paths.base_dir);
        }

        summary
    }

    /// 階層模式：整個目錄是一個單位
    fn hierarchical_unit(
        &self,
        resolver: &MetadataResolver,
        directory: &Path,
        summary: &mut OrganizeSummary,
    ) -> Option<MoveUnit> {
        let metadata = match resolver.resolve_directory(directory) {
            Ok(Some(metadata)) => metadata,
            Ok(None) => {
                debug!("沒有中繼資料: {}", directory.display());
                return None;
            }
            Err(e) => {
                summary.record_error(directory, &e);
                return None;
            }
        };

        match list_files(directory) {
            Ok(files) => Some(MoveUnit::new(directory, files, metadata)),
            Err(e) => {
                summary.record_error(directory, &OrganizeError::filesystem(directory, e));
                None
            }
        }
    }

    /// 平面模式：音訊檔依專輯分組，EPUB 各自成為一個單位
    fn flat_units(
        &self,
        resolver: &MetadataResolver,
        directory: &Path,
        summary: &mut OrganizeSummary,
    ) -> Vec<MoveUnit> {
        let mut units = Vec::new();

        match AlbumGrouper::new(resolver).group_directory(directory) {
            Ok(grouping) => {
                for (file, error) in &grouping.skipped {
                    debug!("略過 {}: {error}", file.display());
                }
                summary.skipped_files += grouping.skipped.len();
                for group in grouping.groups.into_values() {
                    let unit = MoveUnit::new(directory, group.files, group.metadata);
                    units.push(if grouping.is_album {
                        unit.with_track_order(group.track_order)
                    } else {
                        unit
                    });
                }
            }
            Err(e) => summary.record_error(directory, &e),
        }

        let files = match list_files(directory) {
            Ok(files) => files,
            Err(e) => {
                summary.record_error(directory, &OrganizeError::filesystem(directory, e));
                return units;
            }
        };
        let table = resolver.file_type_table();
        for file in files.into_iter().filter(|f| table.is_ebook_file(f)) {
            if !table.is_epub_file(&file) {
                debug!("無法讀取此電子書格式的中繼資料: {}", file.display());
                continue;
            }
            match resolver
                .resolve_file(&file)
                .and_then(|m| m.validate().map(|()| m))
            {
                Ok(metadata) => units.push(MoveUnit::new(directory, vec![file], metadata)),
                Err(e) => summary.record_error(&file, &e),
            }
        }

        units
    }

    pub fn print_summary(&self, summary: &OrganizeSummary) {
        println!();
        println!("{}", style("=== 整理結果 ===").cyan().bold());

        if self.config.undo {
            println!("  已還原: {} 個檔案", style(summary.restored_files).green());
        } else if self.config.dry_run {
            println!(
                "  預計移動: {} 個單位",
                style(summary.planned.len()).yellow()
            );
            for (source, target) in summary.planned.iter().take(DISPLAY_LIMIT) {
                println!(
                    "  {} {} -> {}",
                    style("→").yellow(),
                    source.display(),
                    target.display()
                );
            }
            if summary.planned.len() > DISPLAY_LIMIT {
                println!(
                    "  {} ...還有 {} 個",
                    style("⋯").dim(),
                    summary.planned.len() - DISPLAY_LIMIT
                );
            }
        } else {
            println!(
                "  已移動: {} 個單位，{} 個檔案",
                style(summary.units_moved).green(),
                style(summary.files_moved).green()
            );
        }

        if summary.already_organized > 0 {
            println!("  已在正確位置: {} 個", style(summary.already_organized).dim());
        }
        if summary.declined > 0 {
            println!("  已跳過（未確認）: {} 個", style(summary.declined).dim());
        }
        if summary.skipped_files > 0 {
            println!("  無效中繼資料: {} 個檔案", style(summary.skipped_files).dim());
        }
        if !summary.removed_dirs.is_empty() {
            println!("  已刪除空資料夾: {} 個", summary.removed_dirs.len());
        }
        if summary.file_errors > 0 {
            println!("  檔案失敗: {} 個", style(summary.file_errors).red());
        }
        if !summary.errors.is_empty() {
            println!("  失敗: {} 個", style(summary.errors.len()).red());
            for error in summary.errors.iter().take(DISPLAY_LIMIT) {
                println!("    {} {error}", style("✗").red());
            }
        }
        if summary.journal_warnings > 0 {
            println!(
                "  {}",
                style(format!("復原紀錄寫入失敗 {} 次", summary.journal_warnings)).yellow()
            );
        }
        if summary.interrupted {
            println!("  {}", style("已中斷").yellow());
        }

        info!(
            "整理完成 - 移動: {}, 已整理: {}, 失敗: {}",
            summary.files_moved,
            summary.already_organized,
            summary.errors.len() + summary.file_errors
        );
    }
}
