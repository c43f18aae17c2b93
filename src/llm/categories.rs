//! Connections-style "solution" seed: four categories, four words each
//! (§4.J "Seed").
//!
//! Loaded from `categories.txt` at startup, or scraped from a server
//! response body and persisted back. Scraping's offset arithmetic (8
//! bytes past a `title` marker, 10 past `content`) is lifted as-is from
//! `examples/original_source/LLM.c`'s scraper.

use crate::byteutil::find_subslice;

pub const CATEGORY_COUNT: usize = 4;
pub const WORDS_PER_CATEGORY: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    /// `(category title, four words)`, always `CATEGORY_COUNT` entries.
    pub categories: Vec<(String, Vec<String>)>,
}

impl Solution {
    pub fn load(path: &str) -> Option<Solution> {
        let text = std::fs::read_to_string(path).ok()?;
        Self::parse_persisted(&text)
    }

    pub fn persist(&self, path: &str) -> std::io::Result<()> {
        std::fs::write(path, self.format())
    }

    /// Plain-text serialization: title line, then four word lines, per
    /// category, in order — round-trips through `parse_persisted`.
    pub fn format(&self) -> String {
        let mut out = String::new();
        for (title, words) in &self.categories {
            out.push_str(title);
            out.push('\n');
            for word in words {
                out.push_str(word);
                out.push('\n');
            }
        }
        out
    }

    fn parse_persisted(text: &str) -> Option<Solution> {
        let mut lines = text.lines();
        let mut categories = Vec::with_capacity(CATEGORY_COUNT);
        for _ in 0..CATEGORY_COUNT {
            let title = lines.next()?.to_string();
            let mut words = Vec::with_capacity(WORDS_PER_CATEGORY);
            for _ in 0..WORDS_PER_CATEGORY {
                words.push(lines.next()?.to_string());
            }
            categories.push((title, words));
        }
        Some(Solution { categories })
    }

    /// Scrape from a response body containing `status":"OK"` ... `}]}]}`
    /// (§4.J). `title` tokens start 8 bytes past the `title` marker;
    /// `content` tokens start 10 bytes past the `content` marker. Both
    /// run to the next `"`.
    pub fn scrape(body: &[u8]) -> Option<Solution> {
        let status_pos = find_subslice(body, b"status\":\"OK\"")?;
        let tail_rel = find_subslice(&body[status_pos..], b"}]}]}")?;
        let region = &body[status_pos..status_pos + tail_rel];

        let mut categories = Vec::with_capacity(CATEGORY_COUNT);
        let mut cursor = 0usize;
        for _ in 0..CATEGORY_COUNT {
            let (title, after_title) = extract_token(region, cursor, b"title", 8)?;
            cursor = after_title;
            let mut words = Vec::with_capacity(WORDS_PER_CATEGORY);
            for _ in 0..WORDS_PER_CATEGORY {
                let (word, after_word) = extract_token(region, cursor, b"content", 10)?;
                cursor = after_word;
                words.push(word);
            }
            categories.push((title, words));
        }
        Some(Solution { categories })
    }
}

fn extract_token(haystack: &[u8], from: usize, marker: &[u8], skip: usize) -> Option<(String, usize)> {
    let rel = find_subslice(&haystack[from..], marker)?;
    let val_start = from + rel + skip;
    if val_start > haystack.len() {
        return None;
    }
    let rel_end = find_subslice(&haystack[val_start..], b"\"")?;
    let val_end = val_start + rel_end;
    let token = std::str::from_utf8(&haystack[val_start..val_end]).ok()?.to_string();
    Some((token, val_end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category_json(title: &str, words: &[&str]) -> String {
        let mut s = format!("\"title\":\"{title}\",");
        for w in words {
            s.push_str(&format!("\"content\":\"{w}\","));
        }
        s
    }

    fn fixture() -> Vec<u8> {
        let mut body = String::from("{\"status\":\"OK\",\"data\":[");
        body.push_str(&category_json("Animals", &["cat", "dog", "owl", "fox"]));
        body.push_str(&category_json("Colors", &["red", "blue", "teal", "gold"]));
        body.push_str(&category_json("Tools", &["saw", "drill", "hammer", "vise"]));
        body.push_str(&category_json("Rivers", &["nile", "volga", "amazon", "congo"]));
        body.push_str("}]}]}");
        body.into_bytes()
    }

    #[test]
    fn scrapes_four_categories_of_four_words() {
        let solution = Solution::scrape(&fixture()).unwrap();
        assert_eq!(solution.categories.len(), CATEGORY_COUNT);
        assert_eq!(solution.categories[0].0, "Animals");
        assert_eq!(solution.categories[0].1, vec!["cat", "dog", "owl", "fox"]);
        assert_eq!(solution.categories[3].0, "Rivers");
    }

    #[test]
    fn persisted_round_trips_through_format_and_parse() {
        let solution = Solution::scrape(&fixture()).unwrap();
        let text = solution.format();
        let parsed = Solution::parse_persisted(&text).unwrap();
        assert_eq!(parsed, solution);
    }

    #[test]
    fn scrape_fails_without_status_marker() {
        assert!(Solution::scrape(b"no markers here").is_none());
    }
}
