//! 路徑元件清理
//!
//! 只處理單一路徑元件，不處理整條路徑

/// 替換用字元
const REPLACEMENT: char = '_';

const WINDOWS_RESERVED: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const MACOS_RESERVED: &[char] = &[':', '/'];
const UNIX_RESERVED: &[char] = &['/', '<', '>', ':', '|', '?', '*', '`', '"'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOs {
    Windows,
    MacOs,
    Unix,
}

impl TargetOs {
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Unix
        }
    }

    #[must_use]
    pub const fn reserved_chars(self) -> &'static [char] {
        match self {
            Self::Windows => WINDOWS_RESERVED,
            Self::MacOs => MACOS_RESERVED,
            Self::Unix => UNIX_RESERVED,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PathSanitizer {
    os: TargetOs,
    replace_space: Option<String>,
}

impl PathSanitizer {
    #[must_use]
    pub fn new(replace_space: Option<String>) -> Self {
        Self::for_os(TargetOs::current(), replace_space)
    }

    /// 空白替換字串本身也先經過保留字元替換，避免替換後產生新的路徑層級
    #[must_use]
    pub fn for_os(os: TargetOs, replace_space: Option<String>) -> Self {
        let replace_space = replace_space.map(|replacement| remap_reserved(&replacement, os));
        Self { os, replace_space }
    }

    /// 清理單一路徑元件
    ///
    /// 1. 替換作業系統保留字元
    /// 2. 套用空白替換設定
    /// 3. 去除前後的空白與句點
    #[must_use]
    pub fn sanitize_component(&self, component: &str) -> String {
        let mut cleaned = remap_reserved(component, self.os);

        if let Some(replacement) = &self.replace_space {
            cleaned = cleaned.replace(' ', replacement);
        }

        let trimmed = cleaned.trim_matches(|c: char| c == ' ' || c == '.');
        if trimmed.is_empty() {
            REPLACEMENT.to_string()
        } else {
            trimmed.to_string()
        }
    }
}

fn remap_reserved(text: &str, os: TargetOs) -> String {
    let reserved = os.reserved_chars();
    text.chars()
        .filter(|c| *c != '\0')
        .map(|c| if reserved.contains(&c) { REPLACEMENT } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_reserved() {
        let sanitizer = PathSanitizer::for_os(TargetOs::Windows, None);
        assert_eq!(
            sanitizer.sanitize_component(r#"What? A <Story>: Part "1" / 2 \ 3 | *"#),
            "What_ A _Story__ Part _1_ _ 2 _ 3 _ _"
        );
    }

    #[test]
    fn test_macos_only_colon_and_separator() {
        let sanitizer = PathSanitizer::for_os(TargetOs::MacOs, None);
        assert_eq!(
            sanitizer.sanitize_component("Star Wars: A <New> Hope?"),
            "Star Wars_ A <New> Hope?"
        );
    }

    #[test]
    fn test_unix_reserved() {
        let sanitizer = PathSanitizer::for_os(TargetOs::Unix, None);
        assert_eq!(
            sanitizer.sanitize_component("AC/DC `live` | \"best\""),
            "AC_DC _live_ _ _best_"
        );
    }

    #[test]
    fn test_trim_spaces_and_dots() {
        let sanitizer = PathSanitizer::for_os(TargetOs::Unix, None);
        assert_eq!(sanitizer.sanitize_component("  ...Title... "), "Title");
        assert_eq!(sanitizer.sanitize_component("J.R.R. Tolkien"), "J.R.R. Tolkien");
        assert_eq!(sanitizer.sanitize_component(" . . "), "_");
    }

    #[test]
    fn test_replace_space() {
        let sanitizer = PathSanitizer::for_os(TargetOs::Unix, Some(".".to_string()));
        // 替換後仍會去除前後句點
        assert_eq!(sanitizer.sanitize_component(" The Hobbit "), "The.Hobbit");

        let sanitizer = PathSanitizer::for_os(TargetOs::Unix, Some("_".to_string()));
        assert_eq!(sanitizer.sanitize_component("The Hobbit"), "The_Hobbit");
    }

    #[test]
    fn test_replace_space_with_reserved_char() {
        let sanitizer = PathSanitizer::for_os(TargetOs::Unix, Some("/".to_string()));
        assert_eq!(sanitizer.sanitize_component("The Hobbit"), "The_Hobbit");

        let sanitizer = PathSanitizer::for_os(TargetOs::Windows, Some(":".to_string()));
        assert_eq!(sanitizer.sanitize_component("A B"), "A_B");

        let sanitizer = PathSanitizer::for_os(TargetOs::MacOs, Some("\0".to_string()));
        assert_eq!(sanitizer.sanitize_component("A B"), "AB");
    }

    #[test]
    fn test_never_contains_reserved_or_edges() {
        let inputs = [
            " leading",
            "trailing. ",
            "...",
            "a:b*c?d",
            "\0null\0",
            "  mixed / slashes \\ . ",
            "",
        ];
        let replacements = [None, Some("/"), Some(":"), Some("*"), Some("-")];
        for os in [TargetOs::Windows, TargetOs::MacOs, TargetOs::Unix] {
            for (replacement, input) in replacements
                .iter()
                .flat_map(|r| inputs.iter().map(move |i| (r, i)))
            {
                let sanitizer = PathSanitizer::for_os(os, replacement.map(str::to_string));
                let output = sanitizer.sanitize_component(input);
                assert!(!output.chars().any(|c| os.reserved_chars().contains(&c)));
                assert!(!output.contains('\0'));
                assert!(!output.starts_with(' ') && !output.starts_with('.'));
                assert!(!output.ends_with(' ') && !output.ends_with('.'));
                assert!(!output.is_empty());
            }
        }
    }
}
