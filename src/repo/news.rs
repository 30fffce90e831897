// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: repo :: news
//
//  News items from `news/<YYYY-MM-DD>-<slug>[.<lang>].md`. Translations of
//  one item share the id and differ in the filename's language suffix.
//  Bodies may start with a frontmatter block delimited by `---` lines,
//  carrying the display title. Read state lives in the user's
//  news.read.txt, one id per line.
// ─────────────────────────────────────────────────────────────────────────────

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Serialize;

use crate::error::Result;

use super::messages::match_lang_code;

const DEFAULT_LANG: &str = "zh_CN";

// ─────────────────────────────────────────────────────────────────────────────
//  Filename & frontmatter parsing
// ─────────────────────────────────────────────────────────────────────────────

/// "2024-03-01-hello.zh_CN.md" → ("2024-03-01-hello", "zh_CN")
pub fn parse_news_filename(filename: &str) -> Option<(String, String)> {
    let stem = filename.strip_suffix(".md")?;

    if let Some((id, lang)) = stem.rsplit_once('.') {
        let lang_ok = !lang.is_empty()
            && lang
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if lang_ok && has_date_prefix(id) {
            return Some((id.to_owned(), lang.to_owned()));
        }
    }

    has_date_prefix(stem).then(|| (stem.to_owned(), DEFAULT_LANG.to_owned()))
}

/// "<digits>-<2 digits>-<2 digits>-<anything>"
fn has_date_prefix(s: &str) -> bool {
    let parts: Vec<&str> = s.splitn(4, '-').collect();
    if parts.len() != 4 {
        return false;
    }
    let all_digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
    all_digits(parts[0])
        && parts[1].len() == 2
        && all_digits(parts[1])
        && parts[2].len() == 2
        && all_digits(parts[2])
        && !parts[3].is_empty()
}

/// Split off an optional `---`-delimited frontmatter block; returns
/// (title, body).
fn parse_frontmatter(text: &str) -> (Option<String>, String) {
    let mut lines = text.lines();
    let Some(first) = lines.next() else {
        return (None, text.to_owned());
    };
    if !is_boundary(first) {
        return (None, text.to_owned());
    }

    let mut title = None;
    let mut consumed = first.len() + 1;
    for line in lines {
        consumed += line.len() + 1;
        if is_boundary(line) {
            let body = text.get(consumed..).unwrap_or("").to_owned();
            return (title, body);
        }
        if let Some(value) = line.strip_prefix("title:") {
            title = Some(value.trim().trim_matches(['"', '\'']).to_owned());
        }
    }

    // unterminated frontmatter: treat the whole file as body
    (None, text.to_owned())
}

fn is_boundary(line: &str) -> bool {
    let t = line.trim_end();
    t.len() >= 3 && t.bytes().all(|b| b == b'-')
}

// ─────────────────────────────────────────────────────────────────────────────
//  Items & store
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct NewsItemContent {
    pub lang: String,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct NewsItem {
    pub id: String,
    pub ordinal: usize,
    pub is_read: bool,
    contents: BTreeMap<String, NewsItemContent>,
}

impl NewsItem {
    pub fn content_for_lang(&self, lang: &str) -> Option<&NewsItemContent> {
        let avail: Vec<&str> = self.contents.keys().map(String::as_str).collect();
        let resolved = match_lang_code(lang, &avail)?;
        self.contents.get(resolved)
    }

    pub fn to_porcelain(&self) -> PorcelainNewsItemV1 {
        PorcelainNewsItemV1 {
            ty: "newsitem-v1",
            id: self.id.clone(),
            ord: self.ordinal,
            is_read: self.is_read,
            langs: self
                .contents
                .values()
                .map(|c| PorcelainNewsItemContentV1 {
                    lang: c.lang.clone(),
                    display_title: c.title.clone(),
                    content: c.body.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
pub struct PorcelainNewsItemV1 {
    pub ty: &'static str,
    pub id: String,
    pub ord: usize,
    pub is_read: bool,
    pub langs: Vec<PorcelainNewsItemContentV1>,
}

#[derive(Serialize)]
pub struct PorcelainNewsItemContentV1 {
    pub lang: String,
    pub display_title: String,
    pub content: String,
}

#[derive(Debug, Default)]
pub struct NewsStore {
    items: Vec<NewsItem>,
}

impl NewsStore {
    /// Load all news items, ordered by id, with ordinals assigned and read
    /// state applied.
    pub fn load(news_root: &Path, read_ids: &BTreeSet<String>) -> Result<Self> {
        let mut by_id: BTreeMap<String, BTreeMap<String, NewsItemContent>> = BTreeMap::new();

        let entries = match std::fs::read_dir(news_root) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let Some(fname) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some((id, lang)) = parse_news_filename(fname) else {
                continue;
            };

            let text = std::fs::read_to_string(&path)?;
            let (title, body) = parse_frontmatter(&text);
            by_id.entry(id.clone()).or_default().insert(
                lang.clone(),
                NewsItemContent {
                    lang,
                    title: title.unwrap_or_else(|| id.clone()),
                    body,
                },
            );
        }

        let items = by_id
            .into_iter()
            .enumerate()
            .map(|(i, (id, contents))| NewsItem {
                is_read: read_ids.contains(&id),
                ordinal: i + 1,
                id,
                contents,
            })
            .collect();

        Ok(Self { items })
    }

    pub fn list(&self, only_unread: bool) -> Vec<&NewsItem> {
        self.items
            .iter()
            .filter(|n| !only_unread || !n.is_read)
            .collect()
    }

    /// Look an item up by id, or by its 1-based ordinal.
    pub fn get(&self, selector: &str) -> Option<&NewsItem> {
        if let Ok(ord) = selector.parse::<usize>() {
            return self.items.iter().find(|n| n.ordinal == ord);
        }
        self.items.iter().find(|n| n.id == selector)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn filename_parsing() {
        assert_eq!(
            parse_news_filename("2024-03-01-hello.md").unwrap(),
            ("2024-03-01-hello".to_owned(), DEFAULT_LANG.to_owned())
        );
        assert_eq!(
            parse_news_filename("2024-03-01-hello.en_US.md").unwrap(),
            ("2024-03-01-hello".to_owned(), "en_US".to_owned())
        );
        assert!(parse_news_filename("README.md").is_none());
        assert!(parse_news_filename("2024-3-1-x.md").is_none());
    }

    #[test]
    fn frontmatter_title_extraction() {
        let (title, body) = parse_frontmatter("---\ntitle: \"Big News\"\n---\nThe body.\n");
        assert_eq!(title.as_deref(), Some("Big News"));
        assert_eq!(body, "The body.\n");

        let (title, body) = parse_frontmatter("No frontmatter here.\n");
        assert!(title.is_none());
        assert_eq!(body, "No frontmatter here.\n");
    }

    #[test]
    fn store_orders_and_marks_read() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("2024-03-02-second.md"),
            "---\ntitle: Second\n---\nb\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("2024-03-01-first.md"),
            "---\ntitle: First\n---\na\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("2024-03-01-first.en_US.md"),
            "---\ntitle: First (en)\n---\na en\n",
        )
        .unwrap();

        let mut read = BTreeSet::new();
        read.insert("2024-03-01-first".to_owned());

        let store = NewsStore::load(dir.path(), &read).unwrap();
        let all = store.list(false);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "2024-03-01-first");
        assert_eq!(all[0].ordinal, 1);
        assert!(all[0].is_read);
        assert!(!all[1].is_read);

        let unread = store.list(true);
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].id, "2024-03-02-second");

        // language resolution picks the en translation for en_GB
        let c = all[0].content_for_lang("en_GB").unwrap();
        assert_eq!(c.title, "First (en)");

        // ordinal lookup
        assert_eq!(store.get("2").unwrap().id, "2024-03-02-second");
    }
}
