//! `KEY=VALUE` configuration file
//!
//! The persisted run configuration is a dotenv-style file. Lines are kept
//! verbatim so that writing generated secrets back does not disturb
//! comments, ordering or keys vmflow does not know about.

use crate::error::Result;
use crate::fs::write_atomic_private;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    /// `raw` holds the original text until the value is changed with `set`
    Entry {
        key: String,
        value: String,
        raw: Option<String>,
    },
    Other(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFile {
    lines: Vec<Line>,
}

impl EnvFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(content: &str) -> Self {
        let lines = content
            .lines()
            .map(|raw| match parse_entry(raw) {
                Some((key, value)) => Line::Entry {
                    key,
                    value,
                    raw: Some(raw.to_string()),
                },
                None => Line::Other(raw.to_string()),
            })
            .collect();
        Self { lines }
    }

    /// Load `path`, returning `None` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Some(Self::parse(&content))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Value for `key`; the last occurrence wins like in a shell.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().rev().find_map(|line| match line {
            Line::Entry { key: k, value, .. } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Non-empty value for `key`
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    /// Update every occurrence of `key`, appending it when absent.
    pub fn set(&mut self, key: &str, value: &str) {
        let mut found = false;
        for line in &mut self.lines {
            if let Line::Entry {
                key: k,
                value: v,
                raw,
            } = line
                && k == key
            {
                *v = value.to_string();
                *raw = None;
                found = true;
            }
        }
        if !found {
            self.lines.push(Line::Entry {
                key: key.to_string(),
                value: value.to_string(),
                raw: None,
            });
        }
    }

    pub fn entries(&self) -> BTreeMap<&str, &str> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                Line::Entry { key, value, .. } => Some((key.as_str(), value.as_str())),
                Line::Other(_) => None,
            })
            .collect()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                Line::Entry { raw: Some(raw), .. } | Line::Other(raw) => out.push_str(raw),
                Line::Entry {
                    key,
                    value,
                    raw: None,
                } => {
                    out.push_str(key);
                    out.push('=');
                    out.push_str(&quote_if_needed(value));
                }
            }
            out.push('\n');
        }
        out
    }

    /// Write the file atomically. It may hold secrets, so it is owner-only.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic_private(path, self.render().as_bytes())
    }
}

fn parse_entry(raw: &str) -> Option<(String, String)> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some((key.to_string(), parse_value(value.trim()).to_string()))
}

/// Quoted values end at the matching quote. Unquoted values end before a
/// ` #` comment.
fn parse_value(s: &str) -> &str {
    if let Some(quote) = s.chars().next().filter(|c| *c == '"' || *c == '\'')
        && let Some(end) = s[1..].find(quote)
    {
        return &s[1..1 + end];
    }

    let comment = s
        .char_indices()
        .find(|(i, c)| *c == '#' && s[..*i].ends_with(char::is_whitespace))
        .map(|(i, _)| i);
    match comment {
        Some(i) => s[..i].trim_end(),
        None => s,
    }
}

fn quote_if_needed(value: &str) -> String {
    if value.contains(char::is_whitespace) || value.contains('#') {
        format!("\"{}\"", value)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_comments_and_strips_quotes() {
        let file = EnvFile::parse(
            "# deployment settings\n\
             DOMAIN_NAME=example.org\n\
             \n\
             SSL_EMAIL=\"ops@example.org\"\n\
             export VM_CPU='4'\n\
             not a pair\n",
        );

        assert_eq!(file.get("DOMAIN_NAME"), Some("example.org"));
        assert_eq!(file.get("SSL_EMAIL"), Some("ops@example.org"));
        assert_eq!(file.get("VM_CPU"), Some("4"));
        assert_eq!(file.get("MISSING"), None);
        assert_eq!(file.entries().len(), 3);
    }

    #[test]
    fn test_last_occurrence_wins() {
        let file = EnvFile::parse("A=1\nA=2\nEMPTY=\n");
        assert_eq!(file.get("A"), Some("2"));
        assert_eq!(file.get("EMPTY"), Some(""));
        assert_eq!(file.get_non_empty("EMPTY"), None);
    }

    #[test]
    fn test_set_preserves_other_lines() {
        let mut file = EnvFile::parse("# keep me\nDOMAIN_NAME=example.org\nDB_PASSWORD=\n");
        file.set("DB_PASSWORD", "abc123");
        file.set("APP_SECRET_KEY", "xyz");

        assert_eq!(
            file.render(),
            "# keep me\nDOMAIN_NAME=example.org\nDB_PASSWORD=abc123\nAPP_SECRET_KEY=xyz\n"
        );
    }

    #[test]
    fn test_render_round_trips_values_with_spaces() {
        let mut file = EnvFile::new();
        file.set("LABEL", "two words");
        let reparsed = EnvFile::parse(&file.render());
        assert_eq!(reparsed.get("LABEL"), Some("two words"));
    }

    #[test]
    fn test_inline_comments_are_not_part_of_the_value() {
        let file = EnvFile::parse(
            "SSL_EMAIL=ops@example.org # on-call\n\
             LABEL=\"a # b\" # quoted\n\
             TAG=v1#2\n",
        );

        assert_eq!(file.get("SSL_EMAIL"), Some("ops@example.org"));
        assert_eq!(file.get("LABEL"), Some("a # b"));
        assert_eq!(file.get("TAG"), Some("v1#2"));
    }

    #[test]
    fn test_untouched_entries_are_written_verbatim() {
        let original = "export VM_CPU='4'\n\
                        DOMAIN_NAME = example.org\n\
                        SSL_EMAIL=ops@example.org # on-call\n\
                        DB_PASSWORD=\n";
        let mut file = EnvFile::parse(original);
        file.set("DB_PASSWORD", "abc123");
        file.set("APP_SECRET_KEY", "k");

        assert_eq!(
            file.render(),
            "export VM_CPU='4'\n\
             DOMAIN_NAME = example.org\n\
             SSL_EMAIL=ops@example.org # on-call\n\
             DB_PASSWORD=abc123\n\
             APP_SECRET_KEY=k\n"
        );
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(EnvFile::load(&dir.path().join("vmflow.env")).unwrap().is_none());
    }
}
