//! 檔案內容雜湊，用於確認跨檔案系統複製後的內容

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

const BUFFER_SIZE: usize = 4 * 1024 * 1024; // 4MB buffer

/// 以串流方式計算檔案的 BLAKE3 雜湊，不會把整個有聲書讀進記憶體
pub fn hash_file(path: &Path) -> Result<blake3::Hash> {
    let file = File::open(path).with_context(|| format!("無法開啟檔案: {}", path.display()))?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut reader, &mut hasher)
        .with_context(|| format!("讀取檔案失敗: {}", path.display()))?;
    Ok(hasher.finalize())
}

/// 檔案內容是否與預期的雜湊相同
pub fn verify_file_hash(path: &Path, expected: &blake3::Hash) -> Result<bool> {
    Ok(hash_file(path)? == *expected)
}
