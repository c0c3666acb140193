use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

fn is_hidden_entry(entry: &DirEntry) -> bool {
    entry.depth() > 0 && is_hidden(entry.file_name())
}

/// 列出目錄下（不遞迴）的一般檔案，略過隱藏檔，依檔名排序
pub fn list_files(directory: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() || is_hidden(&entry.file_name()) {
            continue;
        }
        files.push(entry.path());
    }
    files.sort();
    Ok(files)
}

/// 深度優先列出所有目錄（含根目錄），略過隱藏目錄與 `skip` 子樹
pub fn scan_directories(root: &Path, skip: Option<&Path>) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !is_hidden_entry(entry) && skip.is_none_or(|skip| entry.path() != skip)
        })
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .map(DirEntry::into_path)
        .collect()
}
