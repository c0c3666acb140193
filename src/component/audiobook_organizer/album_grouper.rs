//! 專輯分組
//!
//! 判斷同一目錄中的多個音訊檔是否屬於同一部作品（多軌有聲書），
//! 或是各自獨立的單檔作品

use crate::error::OrganizeError;
use crate::tools::file_scanner::list_files;
use crate::tools::metadata::Metadata;
use crate::tools::metadata_resolver::MetadataResolver;
use log::{debug, info};
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// 標題去除數字後的相似度門檻
pub const SIMILARITY_THRESHOLD: f64 = 0.7;

/// 標題共同前綴的分隔符號
const TITLE_SEPARATORS: [&str; 3] = [" - ", ": ", ", "];

/// 路徑不安全的標點，正規化時直接移除
const UNSAFE_PUNCTUATION: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

static REGEX_ORDINAL_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(track|part|chapter|disc|episode|section|volume)\b")
        .expect("Invalid regex")
});

/// 一組被視為同一部作品的檔案
#[derive(Debug, Clone)]
pub struct AlbumGroup {
    pub metadata: Metadata,
    /// 已依（光碟, 軌道）排序；無軌道編號的檔案排在最後
    pub files: Vec<PathBuf>,
    /// 只包含有軌道編號的檔案
    pub track_order: BTreeMap<PathBuf, u32>,
}

impl AlbumGroup {
    #[must_use]
    pub fn track_number(&self, file: &Path) -> Option<u32> {
        self.track_order.get(file).copied()
    }
}

/// 單一目錄的分組結果
#[derive(Debug, Default)]
pub struct DirectoryGrouping {
    pub groups: BTreeMap<String, AlbumGroup>,
    pub is_album: bool,
    /// 無法讀取或中繼資料無效的檔案
    pub skipped: Vec<(PathBuf, OrganizeError)>,
}

struct Track {
    path: PathBuf,
    metadata: Metadata,
    key: String,
    authors: String,
    series: String,
}

impl Track {
    fn new(path: PathBuf, metadata: Metadata) -> Self {
        let key = group_key(&metadata);
        let authors = normalize_authors(&metadata);
        let series = metadata
            .series_name()
            .map(|s| normalize(&s))
            .unwrap_or_default();
        Self {
            path,
            metadata,
            key,
            authors,
            series,
        }
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeReason {
    SameKey,
    SharedPrefix,
    SimilarTitle,
    SeriesOverride,
}

/// 正規化字串供比對使用
#[must_use]
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();

    let mut mapped = String::with_capacity(lowered.len());
    let mut previous: Option<char> = None;
    for c in lowered.chars() {
        if UNSAFE_PUNCTUATION.contains(&c) {
            continue;
        }
        let word = match c {
            '&' => Some(" and "),
            '+' => Some(" plus "),
            '@' => Some(" at "),
            '#' => Some(" number "),
            '%' => Some(" percent "),
            '$' => Some(" dollar "),
            _ => None,
        };
        if let Some(word) = word {
            mapped.push_str(word);
            previous = None;
            continue;
        }
        // 連續相同的非英數字元只保留一個
        if !c.is_alphanumeric() && previous == Some(c) {
            continue;
        }
        mapped.push(c);
        previous = Some(c);
    }

    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_authors(metadata: &Metadata) -> String {
    metadata
        .author_names()
        .map(normalize)
        .collect::<Vec<_>>()
        .join(",")
}

/// `normalize(authors) | normalize(title) [| normalize(series)]`
#[must_use]
pub fn group_key(metadata: &Metadata) -> String {
    let mut key = format!(
        "{}|{}",
        normalize_authors(metadata),
        normalize(&metadata.title)
    );
    if let Some(series) = metadata.series_name() {
        key.push('|');
        key.push_str(&normalize(&series));
    }
    key
}

/// 逐位置比對字元，除以較短字串的長度
///
/// 不做對齊，插入一個字元就會讓後面全部錯開
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }

    let shorter = a.len().min(b.len());
    let matches = a.iter().zip(b.iter()).filter(|(x, y)| x == y).count();
    matches as f64 / shorter as f64
}

fn strip_digits(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| !c.is_ascii_digit())
        .collect()
}

/// 兩個標題在分隔符號前的共同部分（取最長者）
#[must_use]
pub fn shared_separator_prefix(a: &str, b: &str) -> Option<String> {
    TITLE_SEPARATORS
        .iter()
        .flat_map(|separator| {
            a.match_indices(separator)
                .map(move |(index, _)| (index, *separator))
        })
        .filter(|(index, separator)| b.starts_with(&a[..index + separator.len()]))
        .map(|(index, _)| a[..index].trim().to_string())
        .filter(|prefix| !prefix.is_empty())
        .max_by_key(String::len)
}

fn ordinal_word(title: &str) -> Option<String> {
    REGEX_ORDINAL_WORD
        .captures(title)
        .map(|caps| caps[1].to_lowercase())
}

fn shares_ordinal_word(a: &str, b: &str) -> bool {
    match (ordinal_word(a), ordinal_word(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// 是否存在兩個連續的正整數軌道編號
#[must_use]
pub fn has_sequential_tracks(tracks: &[u32]) -> bool {
    let mut positive: Vec<u32> = tracks.iter().copied().filter(|t| *t > 0).collect();
    positive.sort_unstable();
    positive.dedup();
    positive.windows(2).any(|pair| pair[1] == pair[0] + 1)
}

fn merge_reason(
    representative: &Track,
    candidate: &Track,
    override_series: &HashSet<String>,
) -> Option<MergeReason> {
    if representative.key == candidate.key {
        return Some(MergeReason::SameKey);
    }

    if representative.authors == candidate.authors {
        let a = &representative.metadata.title;
        let b = &candidate.metadata.title;
        if shared_separator_prefix(a, b).is_some() {
            return Some(MergeReason::SharedPrefix);
        }
        if shares_ordinal_word(a, b)
            || similarity(&strip_digits(a), &strip_digits(b)) >= SIMILARITY_THRESHOLD
        {
            return Some(MergeReason::SimilarTitle);
        }
    }

    if !representative.series.is_empty()
        && representative.series == candidate.series
        && override_series.contains(&candidate.series)
    {
        return Some(MergeReason::SeriesOverride);
    }

    None
}

/// 同一系列中有連續軌道編號的系列
fn series_with_sequential_tracks(tracks: &[Track]) -> HashSet<String> {
    let mut by_series: HashMap<&str, Vec<u32>> = HashMap::new();
    for track in tracks.iter().filter(|t| !t.series.is_empty()) {
        by_series
            .entry(track.series.as_str())
            .or_default()
            .push(track.metadata.track_number);
    }
    by_series
        .into_iter()
        .filter(|(_, numbers)| has_sequential_tracks(numbers))
        .map(|(series, _)| series.to_string())
        .collect()
}

/// 排序：有軌道編號者依（光碟, 軌道）遞增，其餘依檔名排在後面
fn sort_tracks(tracks: &mut [Track]) {
    tracks.sort_by(|a, b| {
        let a_known = a.metadata.track_number > 0;
        let b_known = b.metadata.track_number > 0;
        b_known
            .cmp(&a_known)
            .then_with(|| {
                if a_known && b_known {
                    (a.metadata.disc_number(), a.metadata.track_number)
                        .cmp(&(b.metadata.disc_number(), b.metadata.track_number))
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .then_with(|| a.file_name().cmp(&b.file_name()))
    });
}

/// 所有標題共有、以分隔符號結尾的最長前綴
fn common_separator_prefix(titles: &[&str]) -> Option<String> {
    let first = titles.first()?;
    TITLE_SEPARATORS
        .iter()
        .flat_map(|separator| {
            first
                .match_indices(separator)
                .map(move |(index, _)| (index, index + separator.len()))
        })
        .filter(|(_, head)| titles.iter().all(|t| t.starts_with(&first[..*head])))
        .map(|(index, _)| first[..index].trim().to_string())
        .filter(|prefix| !prefix.is_empty())
        .max_by_key(String::len)
}

/// 多個標題不同時的共同標題：先找分隔符號前綴，再找共同的 album 欄位
fn common_title(tracks: &[Track]) -> Option<String> {
    let titles: Vec<&str> = tracks.iter().map(|t| t.metadata.title.as_str()).collect();
    let first = titles.first()?;
    if titles.iter().all(|t| t == first) {
        return None;
    }

    if let Some(prefix) = common_separator_prefix(&titles) {
        return Some(prefix);
    }

    let album = tracks.first()?.metadata.raw_string("album")?;
    tracks
        .iter()
        .all(|t| t.metadata.raw_string("album").as_deref() == Some(album.as_str()))
        .then_some(album)
}

fn build_group(mut tracks: Vec<Track>) -> Option<AlbumGroup> {
    sort_tracks(&mut tracks);
    let title = common_title(&tracks);

    let mut metadata = tracks.first()?.metadata.clone();
    if let Some(title) = title {
        metadata.title = title;
    }

    let track_order = tracks
        .iter()
        .filter(|t| t.metadata.track_number > 0)
        .map(|t| (t.path.clone(), t.metadata.track_number))
        .collect();
    let files = tracks.into_iter().map(|t| t.path).collect();

    Some(AlbumGroup {
        metadata,
        files,
        track_order,
    })
}

/// 將已讀取中繼資料的音訊檔分組
///
/// # Returns
/// 分組結果以及此目錄是否為專輯
#[must_use]
pub fn group_tracks(entries: Vec<(PathBuf, Metadata)>) -> (BTreeMap<String, AlbumGroup>, bool) {
    let mut tracks: Vec<Track> = entries
        .into_iter()
        .map(|(path, metadata)| Track::new(path, metadata))
        .collect();
    tracks.sort_by(|a, b| a.path.cmp(&b.path));

    let override_series = series_with_sequential_tracks(&tracks);
    let all_numbers: Vec<u32> = tracks.iter().map(|t| t.metadata.track_number).collect();
    let total = tracks.len();

    let mut clusters: Vec<Vec<Track>> = Vec::new();
    let mut override_fired = false;
    for track in tracks {
        let reason = clusters.iter().enumerate().find_map(|(index, cluster)| {
            merge_reason(&cluster[0], &track, &override_series).map(|r| (index, r))
        });
        match reason {
            Some((index, reason)) => {
                debug!("合併 {} ({reason:?})", track.path.display());
                override_fired |= reason == MergeReason::SeriesOverride;
                clusters[index].push(track);
            }
            None => clusters.push(vec![track]),
        }
    }

    let is_album = total > 1
        && (clusters.len() == 1 || has_sequential_tracks(&all_numbers) || override_fired);

    let mut groups = BTreeMap::new();
    if is_album {
        for cluster in clusters {
            let key = cluster[0].key.clone();
            if let Some(group) = build_group(cluster) {
                groups.insert(key, group);
            }
        }
    } else {
        for track in clusters.into_iter().flatten() {
            let key = if total > 1 {
                format!("{}|{}", track.key, track.file_name())
            } else {
                track.key.clone()
            };
            if let Some(group) = build_group(vec![track]) {
                groups.insert(key, group);
            }
        }
    }

    (groups, is_album)
}

/// 讀取目錄中所有音訊檔的中繼資料後分組
pub struct AlbumGrouper<'a> {
    resolver: &'a MetadataResolver,
}

impl<'a> AlbumGrouper<'a> {
    #[must_use]
    pub const fn new(resolver: &'a MetadataResolver) -> Self {
        Self { resolver }
    }

    pub fn group_directory(&self, directory: &Path) -> Result<DirectoryGrouping, OrganizeError> {
        let files = list_files(directory).map_err(|e| OrganizeError::filesystem(directory, e))?;

        let mut entries = Vec::new();
        let mut skipped = Vec::new();
        for file in files
            .into_iter()
            .filter(|f| self.resolver.file_type_table().is_audio_file(f))
        {
            match self
                .resolver
                .resolve_file(&file)
                .and_then(|m| m.validate().map(|()| m))
            {
                Ok(metadata) => entries.push((file, metadata)),
                Err(e) => {
                    debug!("略過 {}: {e}", file.display());
                    skipped.push((file, e));
                }
            }
        }

        if entries.is_empty() {
            return Ok(DirectoryGrouping {
                skipped,
                ..DirectoryGrouping::default()
            });
        }

        let (groups, is_album) = group_tracks(entries);
        if is_album {
            info!(
                "偵測到專輯: {} ({} 組)",
                directory.display(),
                groups.len()
            );
        }

        Ok(DirectoryGrouping {
            groups,
            is_album,
            skipped,
        })
    }
}
