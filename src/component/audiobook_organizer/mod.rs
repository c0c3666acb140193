//! 有聲書整理元件
//!
//! 依中繼資料將有聲書與電子書移到「作者 / 系列 / 書名」結構，並保留可復原的紀錄

mod album_grouper;
mod directory_pruner;
mod layout_calculator;
mod main;
mod move_executor;
mod undo_journal;

pub use album_grouper::{
    AlbumGroup, AlbumGrouper, DirectoryGrouping, SIMILARITY_THRESHOLD, group_key, group_tracks,
    has_sequential_tracks, normalize, shared_separator_prefix, similarity,
};
pub use directory_pruner::DirectoryPruner;
pub use layout_calculator::LayoutCalculator;
pub use main::{AudiobookOrganizer, ResolvedPaths, RunMode};
pub use move_executor::{
    MoveExecutor, MoveUnit, OrganizeSummary, UnitOutcome, track_file_name,
};
pub use undo_journal::{JOURNAL_FILE_NAME, JournalEntry, UndoJournal, UndoReport};
