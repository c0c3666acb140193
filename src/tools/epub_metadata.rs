//! EPUB 內嵌中繼資料
//!
//! 經由 `META-INF/container.xml` 找到 OPF 套件檔，讀取 Dublin Core 欄位。
//! 系列依序嘗試：
//! 1. EPUB3 `belongs-to-collection` + `group-position`
//! 2. 廠商自訂 `*series` / `*series_index`（例如 calibre）
//! 3. 從書名或簡介擷取 `(Series, Book N)` 或 `Series, Book N`

use crate::config::FieldMapping;
use crate::error::OrganizeError;
use crate::tools::metadata::{
    INVALID_SERIES, Metadata, RawData, SourceType, sanitize_series_candidate,
};
use crate::tools::metadata_resolver::MetadataProvider;
use log::{debug, info};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use regex::Regex;
use serde_json::{Value, json};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use zip::ZipArchive;

const CONTAINER_PATH: &str = "META-INF/container.xml";

static REGEX_PAREN_SERIES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\(\s*([^()]+?)\s*,\s*Book\s+(\d+(?:\.\d+)?)\s*\)").expect("Invalid regex")
});

static REGEX_COMMA_SERIES_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*([^,()]+?)\s*,\s*Book\s+(\d+(?:\.\d+)?)\b").expect("Invalid regex")
});

static REGEX_COMMA_SERIES_DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*([^,.()]+?)\s*,\s*Book\s+(\d+(?:\.\d+)?)\b").expect("Invalid regex")
});

/// OPF 中的 `<meta>` 元素（EPUB2 的 name/content 或 EPUB3 的 property/refines）
#[derive(Debug, Default, Clone)]
struct OpfMeta {
    id: Option<String>,
    name: Option<String>,
    content: Option<String>,
    property: Option<String>,
    refines: Option<String>,
    text: String,
}

#[derive(Debug, Default, Clone)]
struct OpfCreator {
    id: Option<String>,
    role: Option<String>,
    name: String,
}

#[derive(Debug, Default)]
struct OpfMetadata {
    titles: Vec<String>,
    creators: Vec<OpfCreator>,
    description: Option<String>,
    publisher: Option<String>,
    language: Option<String>,
    identifier: Option<String>,
    date: Option<String>,
    subjects: Vec<String>,
    metas: Vec<OpfMeta>,
}

/// 正在讀取文字內容的元素
enum Capture {
    Title,
    Creator(OpfCreator),
    Description,
    Publisher,
    Language,
    Identifier,
    Date,
    Subject,
    Meta(OpfMeta),
}

/// 系列擷取結果與使用的層級（日誌用）
#[derive(Debug, Clone, PartialEq)]
struct SeriesMatch {
    name: String,
    index: Option<f64>,
    tier: &'static str,
}

pub struct EpubMetadataProvider {
    path: PathBuf,
    verbose: bool,
}

impl EpubMetadataProvider {
    pub fn new(path: impl Into<PathBuf>, verbose: bool) -> Self {
        Self {
            path: path.into(),
            verbose,
        }
    }

    fn read_entry(
        &self,
        archive: &mut ZipArchive<File>,
        name: &str,
    ) -> Result<String, OrganizeError> {
        let mut entry = archive.by_name(name).map_err(|e| {
            OrganizeError::invalid(&self.path, format!("missing {name} in EPUB: {e}"))
        })?;
        let mut content = String::new();
        entry
            .read_to_string(&mut content)
            .map_err(|e| OrganizeError::filesystem(&self.path, e))?;
        Ok(content)
    }

    fn log_series(&self, series: &SeriesMatch) {
        if self.verbose {
            info!(
                "EPUB 系列 ({}): {} [{}]",
                series.tier,
                series.name,
                self.path.display()
            );
        } else {
            debug!("EPUB 系列 ({}): {}", series.tier, series.name);
        }
    }
}

impl MetadataProvider for EpubMetadataProvider {
    fn source_type(&self) -> SourceType {
        SourceType::Epub
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn extract(&self) -> Result<Metadata, OrganizeError> {
        let file = File::open(&self.path).map_err(|e| OrganizeError::filesystem(&self.path, e))?;
        let mut archive = ZipArchive::new(file)
            .map_err(|e| OrganizeError::invalid(&self.path, format!("not a valid EPUB: {e}")))?;

        let container = self.read_entry(&mut archive, CONTAINER_PATH)?;
        let opf_path = find_opf_path(&container)
            .ok_or_else(|| OrganizeError::invalid(&self.path, "container.xml has no rootfile"))?;
        let opf = self.read_entry(&mut archive, &opf_path)?;
        let package = parse_opf(&opf)
            .map_err(|reason| OrganizeError::invalid(&self.path, reason))?;

        let mut title = package.titles.first().cloned().unwrap_or_default();
        let series = resolve_series(&package, &mut title);

        let mut metadata = Metadata::new(SourceType::Epub, &self.path);
        let raw = &mut metadata.raw_data;
        raw.insert("title".to_string(), json!(title));
        raw.insert("authors".to_string(), json!(author_names(&package)));
        insert_optional(raw, "description", package.description.as_deref());
        insert_optional(raw, "publisher", package.publisher.as_deref());
        insert_optional(raw, "language", package.language.as_deref());
        insert_optional(raw, "identifier", package.identifier.as_deref());
        insert_optional(raw, "date", package.date.as_deref());
        if !package.subjects.is_empty() {
            raw.insert("subjects".to_string(), json!(package.subjects));
        }

        if let Some(series) = &series {
            self.log_series(series);
            raw.insert("series".to_string(), json!([series.name]));
            if let Some(index) = series.index {
                raw.insert("series_index".to_string(), json!(index));
            }
        }

        metadata.apply_field_mapping(&FieldMapping::default());
        Ok(metadata)
    }
}

fn insert_optional(raw: &mut RawData, key: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        raw.insert(key.to_string(), Value::String(value.trim().to_string()));
    }
}

/// 有標記 `aut` 角色的作者優先，沒有任何角色資訊時使用全部 creator
fn author_names(package: &OpfMetadata) -> Vec<String> {
    let role_of = |creator: &OpfCreator| -> Option<String> {
        creator.role.clone().or_else(|| {
            let id = creator.id.as_ref()?;
            let target = format!("#{id}");
            package
                .metas
                .iter()
                .find(|m| {
                    m.refines.as_deref() == Some(target.as_str())
                        && m.property.as_deref() == Some("role")
                })
                .map(|m| m.text.clone())
        })
    };

    let authors: Vec<String> = package
        .creators
        .iter()
        .filter(|c| role_of(*c).is_some_and(|r| r.eq_ignore_ascii_case("aut")))
        .map(|c| c.name.clone())
        .collect();

    if authors.is_empty() {
        package.creators.iter().map(|c| c.name.clone()).collect()
    } else {
        authors
    }
}

fn resolve_series(package: &OpfMetadata, title: &mut String) -> Option<SeriesMatch> {
    collection_series(package)
        .or_else(|| vendor_series(package))
        .or_else(|| text_series(title, package.description.as_deref()))
        .map(|mut series| {
            series.name = sanitize_series_candidate(&series.name);
            if series.name == INVALID_SERIES {
                series.index = None;
            }
            series
        })
}

/// EPUB3 標準集合
fn collection_series(package: &OpfMetadata) -> Option<SeriesMatch> {
    let collection = package.metas.iter().find(|m| {
        m.property.as_deref() == Some("belongs-to-collection") && !m.text.trim().is_empty()
    })?;

    let index = collection.id.as_ref().and_then(|id| {
        let target = format!("#{id}");
        package
            .metas
            .iter()
            .find(|m| {
                m.refines.as_deref() == Some(target.as_str())
                    && m.property.as_deref() == Some("group-position")
            })
            .and_then(|m| m.text.trim().parse::<f64>().ok())
    });

    Some(SeriesMatch {
        name: collection.text.trim().to_string(),
        index,
        tier: "belongs-to-collection",
    })
}

/// calibre 等工具寫入的 `<meta name="calibre:series" content="..."/>`
fn vendor_series(package: &OpfMetadata) -> Option<SeriesMatch> {
    let name_ends_with = |meta: &OpfMeta, suffix: &str| {
        meta.name
            .as_deref()
            .is_some_and(|n| n.to_lowercase().ends_with(suffix))
    };

    let series = package
        .metas
        .iter()
        .find(|m| name_ends_with(m, "series"))
        .and_then(|m| m.content.clone())
        .filter(|s| !s.trim().is_empty())?;

    let index = package
        .metas
        .iter()
        .find(|m| name_ends_with(m, "series_index"))
        .and_then(|m| m.content.as_deref())
        .and_then(|c| c.trim().parse::<f64>().ok());

    Some(SeriesMatch {
        name: series.trim().to_string(),
        index,
        tier: "vendor meta",
    })
}

/// 從書名或簡介擷取；書名中的括號部分會被移除
fn text_series(title: &mut String, description: Option<&str>) -> Option<SeriesMatch> {
    let to_match = |caps: regex::Captures<'_>| SeriesMatch {
        name: caps[1].trim().to_string(),
        index: caps[2].parse::<f64>().ok(),
        tier: "text pattern",
    };

    if let Some(caps) = REGEX_PAREN_SERIES.captures(title.as_str()) {
        let series = to_match(caps);
        let stripped = REGEX_PAREN_SERIES.replace(title.as_str(), "").trim().to_string();
        if !stripped.is_empty() {
            *title = stripped;
        }
        return Some(series);
    }

    if let Some(caps) = REGEX_COMMA_SERIES_TITLE.captures(title.as_str()) {
        return Some(to_match(caps));
    }

    let description = description?;
    REGEX_PAREN_SERIES
        .captures(description)
        .or_else(|| REGEX_COMMA_SERIES_DESCRIPTION.captures(description))
        .map(to_match)
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

fn meta_from(element: &BytesStart<'_>) -> OpfMeta {
    OpfMeta {
        id: attribute(element, b"id"),
        name: attribute(element, b"name"),
        content: attribute(element, b"content"),
        property: attribute(element, b"property"),
        refines: attribute(element, b"refines"),
        text: String::new(),
    }
}

fn find_opf_path(container: &str) -> Option<String> {
    let mut reader = Reader::from_str(container);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) if e.local_name().as_ref() == b"rootfile" => {
                if let Some(path) = attribute(&e, b"full-path") {
                    return Some(path);
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

fn parse_opf(opf: &str) -> Result<OpfMetadata, String> {
    let mut reader = Reader::from_str(opf);
    reader.config_mut().trim_text(true);

    let mut package = OpfMetadata::default();
    let mut capture: Option<Capture> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                text.clear();
                capture = match e.local_name().as_ref() {
                    b"title" => Some(Capture::Title),
                    b"creator" => Some(Capture::Creator(OpfCreator {
                        id: attribute(&e, b"id"),
                        role: attribute(&e, b"role"),
                        name: String::new(),
                    })),
                    b"description" => Some(Capture::Description),
                    b"publisher" => Some(Capture::Publisher),
                    b"language" => Some(Capture::Language),
                    b"identifier" => Some(Capture::Identifier),
                    b"date" => Some(Capture::Date),
                    b"subject" => Some(Capture::Subject),
                    b"meta" => Some(Capture::Meta(meta_from(&e))),
                    _ => None,
                };
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"meta" => {
                package.metas.push(meta_from(&e));
            }
            Ok(Event::Text(t)) if capture.is_some() => {
                if let Ok(unescaped) = t.unescape() {
                    text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(t)) if capture.is_some() => {
                text.push_str(&String::from_utf8_lossy(&t));
            }
            Ok(Event::End(_)) => {
                if let Some(finished) = capture.take() {
                    let value = text.trim().to_string();
                    store_capture(&mut package, finished, value);
                }
                text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("invalid OPF XML: {e}")),
            _ => {}
        }
    }

    Ok(package)
}

fn store_capture(package: &mut OpfMetadata, capture: Capture, value: String) {
    let set_once = |slot: &mut Option<String>, value: String| {
        if slot.is_none() && !value.is_empty() {
            *slot = Some(value);
        }
    };

    match capture {
        Capture::Title if !value.is_empty() => package.titles.push(value),
        Capture::Creator(mut creator) if !value.is_empty() => {
            creator.name = value;
            package.creators.push(creator);
        }
        Capture::Description => set_once(&mut package.description, value),
        Capture::Publisher => set_once(&mut package.publisher, value),
        Capture::Language => set_once(&mut package.language, value),
        Capture::Identifier => set_once(&mut package.identifier, value),
        Capture::Date => set_once(&mut package.date, value),
        Capture::Subject if !value.is_empty() => package.subjects.push(value),
        Capture::Meta(mut meta) => {
            meta.text = value;
            package.metas.push(meta);
        }
        _ => {}
    }
}
