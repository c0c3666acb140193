//! 檔案移動
//!
//! 先嘗試 rename；跨檔案系統時改為「讀取 → 寫入並 fsync → 驗證 → 刪除來源 →
//! fsync 目標目錄」，複製確認寫入前來源檔案都不會被刪除

use crate::tools::file_hasher::verify_file_hash;
use anyhow::{Context, Result, bail};
use log::{debug, warn};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

/// 實際使用的移動方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveMethod {
    Renamed,
    Copied,
}

#[cfg(unix)]
const CROSS_DEVICE_OS_ERROR: i32 = 18; // EXDEV
#[cfg(windows)]
const CROSS_DEVICE_OS_ERROR: i32 = 17; // ERROR_NOT_SAME_DEVICE
#[cfg(not(any(unix, windows)))]
const CROSS_DEVICE_OS_ERROR: i32 = -1;

#[must_use]
pub fn is_cross_device_error(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::CrossesDevices
        || error.raw_os_error() == Some(CROSS_DEVICE_OS_ERROR)
}

/// 移動單一檔案，不覆蓋已存在的目標
pub fn move_file(source: &Path, target: &Path) -> Result<MoveMethod> {
    move_file_with(source, target, |from, to| fs::rename(from, to))
}

/// 同 [`move_file`]，可替換 rename 實作（測試跨裝置情境用）
pub fn move_file_with<F>(source: &Path, target: &Path, rename: F) -> Result<MoveMethod>
where
    F: Fn(&Path, &Path) -> io::Result<()>,
{
    if target.exists() {
        bail!("目標檔案已存在: {}", target.display());
    }

    match rename(source, target) {
        Ok(()) => {
            debug!("移動檔案: {} -> {}", source.display(), target.display());
            Ok(MoveMethod::Renamed)
        }
        Err(e) if is_cross_device_error(&e) => {
            debug!("跨檔案系統，改用複製: {}", source.display());
            copy_and_delete(source, target)?;
            Ok(MoveMethod::Copied)
        }
        Err(e) => Err(e).with_context(|| {
            format!("移動檔案失敗: {} -> {}", source.display(), target.display())
        }),
    }
}

/// 複製檔案後刪除原檔案
fn copy_and_delete(source: &Path, target: &Path) -> Result<()> {
    copy_and_delete_with(source, target, |file, data| file.write_all(data))
}

/// 寫入或驗證失敗時刪除不完整的目標檔案，來源檔案保留不動
fn copy_and_delete_with<W>(source: &Path, target: &Path, write: W) -> Result<()>
where
    W: FnOnce(&mut File, &[u8]) -> io::Result<()>,
{
    let data = fs::read(source).with_context(|| format!("讀取檔案失敗: {}", source.display()))?;
    let expected = blake3::hash(&data);

    let mut file = File::create_new(target)
        .with_context(|| format!("建立目標檔案失敗: {}", target.display()))?;
    let written = write(&mut file, &data).and_then(|()| file.sync_all());
    drop(file);
    if let Err(e) = written {
        discard_partial_copy(target);
        return Err(e).with_context(|| format!("寫入目標檔案失敗: {}", target.display()));
    }

    if let Ok(metadata) = fs::metadata(source)
        && let Err(e) = fs::set_permissions(target, metadata.permissions())
    {
        warn!("無法保留檔案權限 {}: {e}", target.display());
    }

    match verify_file_hash(target, &expected) {
        Ok(true) => {}
        Ok(false) => {
            discard_partial_copy(target);
            bail!("複製後內容不一致: {}", target.display());
        }
        Err(e) => {
            discard_partial_copy(target);
            return Err(e);
        }
    }

    fs::remove_file(source).with_context(|| format!("刪除原檔案失敗: {}", source.display()))?;

    if let Some(parent) = target.parent() {
        sync_directory(parent);
    }

    Ok(())
}

fn discard_partial_copy(target: &Path) {
    if let Err(e) = fs::remove_file(target) {
        warn!("無法刪除不完整的複製檔 {}: {e}", target.display());
    }
}

/// 將目錄項目寫入磁碟；不支援的平台上忽略
fn sync_directory(directory: &Path) {
    #[cfg(unix)]
    {
        match File::open(directory).and_then(|dir| dir.sync_all()) {
            Ok(()) => {}
            Err(e) => warn!("同步目錄失敗 {}: {e}", directory.display()),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = directory;
    }
}
