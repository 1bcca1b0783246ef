//! Post-processing of collected data: emails, keyword hits and file links.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{DorkError, LinkMap, Result};

/// Extensions treated as interesting documents when listing file links.
pub const FILE_EXTENSIONS: &[&str] = &[
    "pdf", "jpeg", "webp", "dat", "sql", "webm", "bin", "docx", "doc", "pptx", "xlsx", "jpg",
    "png", "txt", "bak", "backup", "xls", "csv", "md", "cpp", "py",
];

const EMAIL_PATTERN: &str = r"(?i)[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}";

/// Characters of context kept on each side of a keyword match.
pub const DEFAULT_CONTEXT_CHARS: usize = 40;

/// Reads a file as text, replacing invalid UTF-8. Unreadable files yield `None`.
fn read_text(path: &Path) -> Option<String> {
    match std::fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            warn!("Cannot read {}: {}", path.display(), e);
            None
        }
    }
}

/// Every regular file below `dir`, in walk order.
fn files_under(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

/// Finds email addresses in text and files.
#[derive(Debug, Clone)]
pub struct EmailExtractor {
    pattern: Regex,
}

impl EmailExtractor {
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(EMAIL_PATTERN)
            .map_err(|e| DorkError::Parse(format!("Invalid email pattern: {}", e)))?;
        Ok(Self { pattern })
    }

    /// Distinct addresses in `text`.
    pub fn from_text(&self, text: &str) -> BTreeSet<String> {
        self.pattern
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Distinct addresses in one file. A missing file yields none.
    pub fn from_file(&self, path: &Path) -> BTreeSet<String> {
        read_text(path)
            .map(|text| self.from_text(&text))
            .unwrap_or_default()
    }

    /// Distinct addresses in every file below `dir`.
    pub fn from_dir(&self, dir: &Path) -> BTreeSet<String> {
        if !dir.exists() {
            warn!("Directory {} not found", dir.display());
            return BTreeSet::new();
        }
        files_under(dir)
            .iter()
            .flat_map(|file| self.from_file(file))
            .collect()
    }

    /// Addresses in the link file and everything under the output directory.
    pub fn collect(&self, link_file: &Path, output_dir: &Path) -> BTreeSet<String> {
        let mut emails = self.from_file(link_file);
        emails.extend(self.from_dir(output_dir));
        info!("Found {} distinct email addresses", emails.len());
        emails
    }
}

/// One line matching a keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordHit {
    /// File the line came from.
    pub file: PathBuf,
    /// 1-based line number.
    pub line: usize,
    /// The match with up to the configured context on each side.
    pub context: String,
}

/// Case-insensitive search for any of a set of keywords.
#[derive(Debug, Clone)]
pub struct KeywordSearch {
    pattern: Regex,
    context_chars: usize,
}

impl KeywordSearch {
    /// Builds a search for `keywords`. Blank keywords are ignored; at least
    /// one must remain.
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Result<Self> {
        let alternatives: Vec<String> = keywords
            .iter()
            .map(|k| k.as_ref().trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();
        if alternatives.is_empty() {
            return Err(DorkError::Config("no keywords given".into()));
        }

        let pattern = Regex::new(&format!("(?i){}", alternatives.join("|")))
            .map_err(|e| DorkError::Parse(format!("Invalid keyword pattern: {}", e)))?;
        Ok(Self {
            pattern,
            context_chars: DEFAULT_CONTEXT_CHARS,
        })
    }

    /// Sets how many characters of context surround each match.
    pub fn with_context(mut self, chars: usize) -> Self {
        self.context_chars = chars;
        self
    }

    /// First match on each line of `text`, attributed to `file`.
    pub fn search_text(&self, text: &str, file: &Path) -> Vec<KeywordHit> {
        text.lines()
            .enumerate()
            .filter_map(|(index, line)| {
                let found = self.pattern.find(line)?;
                Some(KeywordHit {
                    file: file.to_path_buf(),
                    line: index + 1,
                    context: context_window(line, found.start(), found.end(), self.context_chars)
                        .to_string(),
                })
            })
            .collect()
    }

    /// Hits in every file below `dir`.
    pub fn search_dir(&self, dir: &Path) -> Vec<KeywordHit> {
        files_under(dir)
            .iter()
            .filter_map(|file| read_text(file).map(|text| self.search_text(&text, file)))
            .flatten()
            .collect()
    }
}

/// Slice of `line` covering `start..end` plus up to `width` characters on
/// each side.
fn context_window(line: &str, start: usize, end: usize, width: usize) -> &str {
    let from = if width == 0 {
        start
    } else {
        line[..start]
            .char_indices()
            .rev()
            .take(width)
            .last()
            .map_or(start, |(i, _)| i)
    };
    let to = line[end..]
        .char_indices()
        .nth(width)
        .map_or(line.len(), |(i, _)| end + i);
    &line[from..to]
}

/// Lowercase extension of the last path segment of `url`, if any.
pub fn url_extension(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Stored links whose path ends in one of `extensions`.
pub fn file_links<S: AsRef<str>>(links: &LinkMap, extensions: &[S]) -> Vec<String> {
    links
        .keys()
        .filter(|url| {
            url_extension(url).is_some_and(|ext| {
                extensions
                    .iter()
                    .any(|wanted| wanted.as_ref().eq_ignore_ascii_case(&ext))
            })
        })
        .cloned()
        .collect()
}

/// Removes the output directory. Returns false when there was nothing to
/// remove.
pub fn clean(output_dir: &Path) -> Result<bool> {
    if !output_dir.exists() {
        return Ok(false);
    }
    std::fs::remove_dir_all(output_dir)?;
    info!("Removed {}", output_dir.display());
    Ok(true)
}

/// Non-blank lines of the dorks file.
pub fn read_dorks(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LinkRecord;

    #[test]
    fn test_emails_from_text() {
        let extractor = EmailExtractor::new().unwrap();
        let emails = extractor.from_text(
            "Contact HR@Acme.com or jane.doe+jobs@mail.acme.co.uk, not user@localhost. HR@Acme.com",
        );
        let emails: Vec<_> = emails.into_iter().collect();
        assert_eq!(emails, vec!["HR@Acme.com", "jane.doe+jobs@mail.acme.co.uk"]);
    }

    #[test]
    fn test_emails_from_dir_and_link_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(out.join("nested")).unwrap();
        std::fs::write(out.join("a.html"), "<a href='mailto:a@acme.com'>").unwrap();
        std::fs::write(out.join("nested/b.txt"), b"b@acme.com \xff\xfe").unwrap();
        let link_file = dir.path().join("links.json");
        std::fs::write(&link_file, r#"{"https://x.com": {"title": "c@acme.com"}}"#).unwrap();

        let extractor = EmailExtractor::new().unwrap();
        let emails = extractor.collect(&link_file, &out);
        assert_eq!(emails.len(), 3);
        assert!(emails.contains("b@acme.com"));
    }

    #[test]
    fn test_emails_missing_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = EmailExtractor::new().unwrap();
        assert!(extractor.from_file(&dir.path().join("none")).is_empty());
        assert!(extractor.from_dir(&dir.path().join("none")).is_empty());
    }

    #[test]
    fn test_keyword_search_requires_keywords() {
        assert!(KeywordSearch::new::<&str>(&[]).is_err());
        assert!(KeywordSearch::new(&["  "]).is_err());
    }

    #[test]
    fn test_keyword_search_text() {
        let search = KeywordSearch::new(&["password", "a.b"]).unwrap().with_context(5);
        let text = "nothing here\nthe PASSWORD is hunter2\naxb is not a.b literal";
        let hits = search.search_text(text, Path::new("dump.sql"));
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].line, 2);
        assert_eq!(hits[0].context, "the PASSWORD is h");
        assert_eq!(hits[1].line, 3);
        assert_eq!(hits[1].context, " not a.b lite");
        assert_eq!(hits[1].file, PathBuf::from("dump.sql"));
    }

    #[test]
    fn test_keyword_search_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.html"), "line\nsecret token\n").unwrap();
        std::fs::write(dir.path().join("b.html"), "no match").unwrap();
        let hits = KeywordSearch::new(&["secret"]).unwrap().search_dir(dir.path());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file, dir.path().join("a.html"));
        assert_eq!(hits[0].line, 2);
    }

    #[test]
    fn test_context_window_multibyte() {
        let line = "ééé key ééé";
        let start = line.find("key").unwrap();
        let window = context_window(line, start, start + 3, 2);
        assert_eq!(window, "é key é");
        assert_eq!(context_window(line, start, start + 3, 0), "key");
        assert_eq!(context_window(line, start, start + 3, 100), line);
    }

    #[test]
    fn test_url_extension() {
        assert_eq!(url_extension("https://a.com/docs/Report.PDF"), Some("pdf".into()));
        assert_eq!(url_extension("https://a.com/x.sql?download=1"), Some("sql".into()));
        assert_eq!(url_extension("https://a.com/dir/"), None);
        assert_eq!(url_extension("https://a.com/.htaccess"), None);
        assert_eq!(url_extension("https://a.com"), None);
        assert_eq!(url_extension("not a url"), None);
    }

    #[test]
    fn test_file_links() {
        let mut links = LinkMap::new();
        for url in [
            "https://acme.com/staff.xlsx",
            "https://acme.com/about",
            "https://acme.com/db.bak",
            "https://acme.com/pdf/index.html",
        ] {
            links.insert(url.to_string(), LinkRecord::new("t"));
        }
        let files = file_links(&links, FILE_EXTENSIONS);
        assert_eq!(
            files,
            vec!["https://acme.com/db.bak", "https://acme.com/staff.xlsx"]
        );
        assert_eq!(file_links(&links, &["XLSX"]).len(), 1);
    }

    #[test]
    fn test_clean() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        assert!(!clean(&out).unwrap());
        std::fs::create_dir_all(out.join("x")).unwrap();
        assert!(clean(&out).unwrap());
        assert!(!out.exists());
    }

    #[test]
    fn test_read_dorks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dorks.txt");
        std::fs::write(&path, "intitle:\"index of\"\n\n  filetype:sql password  \n").unwrap();
        assert_eq!(
            read_dorks(&path).unwrap(),
            vec!["intitle:\"index of\"", "filetype:sql password"]
        );
        assert!(read_dorks(&dir.path().join("missing.txt")).is_err());
    }
}
