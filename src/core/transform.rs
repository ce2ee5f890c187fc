use regex::Regex;

/// Limits applied to extracted fields before a record is stored.
#[derive(Debug, Clone)]
pub struct CleanupSettings {
    pub max_title_length: usize,
    pub max_content_chars: usize,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            max_title_length: 512,
            max_content_chars: 20_000,
        }
    }
}

/// Cleans scraped page text: strips leftover HTML tags, collapses
/// whitespace runs, trims, and caps lengths.
pub struct ContentCleaner {
    tag_re: Regex,
    whitespace_re: Regex,
    settings: CleanupSettings,
}

impl ContentCleaner {
    pub fn new(settings: CleanupSettings) -> Self {
        Self {
            tag_re: Regex::new(r"<[^>]+>").unwrap(),
            whitespace_re: Regex::new(r"[ \t\r\f]+").unwrap(),
            settings,
        }
    }

    pub fn clean_content(&self, raw: &str) -> String {
        let no_tags = self.tag_re.replace_all(raw, " ");
        let collapsed = self.whitespace_re.replace_all(&no_tags, " ");
        // 保留換行，但去掉空白行
        let cleaned = collapsed
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        truncate_chars(&cleaned, self.settings.max_content_chars)
    }

    pub fn clean_title(&self, raw: &str) -> String {
        let collapsed = self.whitespace_re.replace_all(raw, " ");
        truncate_chars(collapsed.trim(), self.settings.max_title_length)
    }
}

pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaner() -> ContentCleaner {
        ContentCleaner::new(CleanupSettings::default())
    }

    #[test]
    fn test_clean_content_strips_tags_and_collapses_whitespace() {
        let raw = "<p>Hello   <b>world</b></p>\n\n\n  second   line  ";
        let cleaned = cleaner().clean_content(raw);
        assert_eq!(cleaned, "Hello world\nsecond line");
    }

    #[test]
    fn test_clean_content_caps_length() {
        let cleaner = ContentCleaner::new(CleanupSettings {
            max_title_length: 10,
            max_content_chars: 5,
        });
        assert_eq!(cleaner.clean_content("abcdefghij"), "abcde");
    }

    #[test]
    fn test_clean_title_trims_and_caps() {
        let cleaner = ContentCleaner::new(CleanupSettings {
            max_title_length: 4,
            max_content_chars: 100,
        });
        assert_eq!(cleaner.clean_title("  A  long   title "), "A lo");
    }

    #[test]
    fn test_truncate_chars_respects_multibyte_boundaries() {
        assert_eq!(truncate_chars("中文字串測試", 3), "中文字");
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
