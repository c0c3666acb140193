use crate::error::OrganizeError;
use anyhow::{Result, bail};
use std::path::{Component, Path, PathBuf};

pub fn validate_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("路徑不存在: {}", path.display());
    }
    if !path.is_dir() {
        bail!("路徑不是資料夾: {}", path.display());
    }
    Ok(())
}

pub fn ensure_directory_exists(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// 解析基礎目錄（含符號連結），失敗時整個流程中止
pub fn resolve_base_dir(path: &Path) -> Result<PathBuf, OrganizeError> {
    let resolved = path
        .canonicalize()
        .map_err(|source| OrganizeError::BaseDirUnresolvable {
            path: path.to_path_buf(),
            source,
        })?;

    if !resolved.is_dir() {
        return Err(OrganizeError::BaseDirUnresolvable {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
        });
    }
    Ok(resolved)
}

/// 解析輸出目錄；`create` 為 true 時先建立目錄
pub fn resolve_output_dir(path: &Path, create: bool) -> Result<PathBuf, OrganizeError> {
    if create {
        ensure_directory_exists(path).map_err(|e| OrganizeError::filesystem(path, e))?;
    }

    match path.canonicalize() {
        Ok(resolved) => Ok(resolved),
        Err(_) if !create => Ok(absolute_clean(path)),
        Err(e) => Err(OrganizeError::filesystem(path, e)),
    }
}

fn absolute_clean(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    clean_path(&absolute)
}

/// 純字面正規化：去除 `.`、處理 `..`、移除結尾分隔符號（不存取檔案系統）
#[must_use]
pub fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !cleaned.pop() {
                    cleaned.push(component);
                }
            }
            other => cleaned.push(other),
        }
    }
    cleaned
}

/// 兩條路徑正規化後是否相同
#[must_use]
pub fn same_path(a: &Path, b: &Path) -> bool {
    clean_path(a) == clean_path(b)
}
