//! Per-service `KEY=VALUE` settings files.
//!
//! One assignment per line, and the value runs literally to the end of the
//! line. `export KEY=value` counts as an assignment of `KEY`. Every line is
//! kept as read, terminator included, and only the line being replaced is
//! rewritten.

use crate::error::{Error, Result};
use crate::files::write_atomic;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Assignment {
    key: String,
    value: String,
    exported: bool,
}

impl Assignment {
    fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }
        let (exported, body) = match trimmed.strip_prefix("export") {
            Some(rest) if rest.starts_with([' ', '\t']) => (true, rest.trim_start()),
            _ => (false, trimmed),
        };
        let (key, value) = body.split_once('=')?;
        let key = key.trim();
        validate_key(key).ok()?;
        Some(Self {
            key: key.to_string(),
            value: value.to_string(),
            exported,
        })
    }
}

/// One line of a settings file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Text as read, without the terminator.
    raw: String,
    /// `\n`, `\r\n`, or empty for a last line without one.
    ending: String,
    assignment: Option<Assignment>,
}

impl Line {
    fn parse(raw: &str, ending: &str) -> Self {
        Self {
            raw: raw.to_string(),
            ending: ending.to_string(),
            assignment: Assignment::parse(raw),
        }
    }

    fn assignment(key: &str, value: &str, exported: bool, ending: String) -> Self {
        let prefix = if exported { "export " } else { "" };
        Self {
            raw: format!("{}{}={}", prefix, key, value),
            ending,
            assignment: Some(Assignment {
                key: key.to_string(),
                value: value.to_string(),
                exported,
            }),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn key(&self) -> Option<&str> {
        self.assignment.as_ref().map(|a| a.key.as_str())
    }

    pub fn value(&self) -> Option<&str> {
        self.assignment.as_ref().map(|a| a.value.as_str())
    }
}

/// A settings file: its path and its ordered lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    path: PathBuf,
    lines: Vec<Line>,
}

impl ConfigFile {
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Self {
        let lines = content
            .split_inclusive('\n')
            .map(|piece| {
                if let Some(text) = piece.strip_suffix("\r\n") {
                    Line::parse(text, "\r\n")
                } else if let Some(text) = piece.strip_suffix('\n') {
                    Line::parse(text, "\n")
                } else {
                    Line::parse(piece, "")
                }
            })
            .collect();
        Self {
            path: path.into(),
            lines,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Filesystem(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        Ok(Self::parse(path, &content))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Value of `key`. If the file repeats a key, the last assignment wins,
    /// which is how dotenv readers resolve it.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines
            .iter()
            .rev()
            .find(|line| line.key() == Some(key))
            .and_then(Line::value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(Line::key)
    }

    /// The terminator new lines get: the file's first one, else `\n`.
    fn newline(&self) -> &'static str {
        match self.lines.iter().find(|l| !l.ending.is_empty()) {
            Some(line) if line.ending == "\r\n" => "\r\n",
            _ => "\n",
        }
    }

    /// Returns the file with `key` set to `value`.
    ///
    /// The first assignment of `key` is replaced in place (keeping its
    /// `export` prefix and terminator) and any later duplicates are dropped;
    /// if the key is absent it is appended. All other lines are carried over
    /// byte for byte and in order.
    pub fn with_value(self, key: &str, value: &str) -> Self {
        let newline = self.newline();
        let mut replaced = false;
        let mut lines = Vec::with_capacity(self.lines.len() + 1);
        for line in self.lines {
            if line.key() != Some(key) {
                lines.push(line);
                continue;
            }
            if !replaced {
                let exported = line.assignment.as_ref().is_some_and(|a| a.exported);
                lines.push(Line::assignment(key, value, exported, line.ending));
                replaced = true;
            }
        }
        if !replaced {
            if let Some(last) = lines.last_mut() {
                if last.ending.is_empty() {
                    last.ending = newline.to_string();
                }
            }
            lines.push(Line::assignment(key, value, false, newline.to_string()));
        }
        Self {
            path: self.path,
            lines,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.raw);
            out.push_str(&line.ending);
        }
        out
    }

    /// Write the file back, keeping the permissions of the existing file.
    pub fn save(&self) -> Result<()> {
        write_atomic(&self.path, &self.render(), None)
    }
}

/// Validate a settings key.
///
/// Keys follow POSIX environment variable naming: a letter or underscore
/// followed by letters, digits or underscores.
pub fn validate_key(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(Error::Validation("key cannot be empty".to_string()));
    };
    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(Error::Validation(format!(
            "Invalid key '{}': must start with a letter or underscore",
            name
        )));
    }
    if let Some(bad) = chars.find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
        return Err(Error::Validation(format!(
            "Invalid key '{}': character '{}' is not allowed",
            name, bad
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# PostgreSQL\nPOSTGRES_HOST=127.0.0.1\n\nPOSTGRES_PASSWORD=old\nSECRET_KEY=a=b=c\n";

    #[test]
    fn parse_keeps_comments_and_blank_lines() {
        let file = ConfigFile::parse(".env", SAMPLE);
        assert_eq!(file.render(), SAMPLE);
        assert_eq!(file.get("SECRET_KEY"), Some("a=b=c"));
        assert_eq!(
            file.keys().collect::<Vec<_>>(),
            ["POSTGRES_HOST", "POSTGRES_PASSWORD", "SECRET_KEY"]
        );
    }

    #[test]
    fn value_is_literal_to_end_of_line() {
        let file = ConfigFile::parse(".env", "URL= http://x # not a comment\n");
        assert_eq!(file.get("URL"), Some(" http://x # not a comment"));
    }

    #[test]
    fn with_value_replaces_in_place() {
        let file = ConfigFile::parse(".env", SAMPLE).with_value("POSTGRES_PASSWORD", "new");
        assert_eq!(
            file.render(),
            "# PostgreSQL\nPOSTGRES_HOST=127.0.0.1\n\nPOSTGRES_PASSWORD=new\nSECRET_KEY=a=b=c\n"
        );
    }

    #[test]
    fn with_value_appends_missing_key() {
        let file = ConfigFile::parse(".env", "A=1").with_value("B", "2");
        assert_eq!(file.render(), "A=1\nB=2\n");
    }

    #[test]
    fn with_value_collapses_duplicates() {
        let file = ConfigFile::parse(".env", "K=1\nX=y\nK=2\n").with_value("K", "3");
        assert_eq!(file.render(), "K=3\nX=y\n");
    }

    #[test]
    fn with_value_is_idempotent() {
        let once = ConfigFile::parse(".env", SAMPLE).with_value("POSTGRES_PASSWORD", "s3cr:t");
        let twice = once.clone().with_value("POSTGRES_PASSWORD", "s3cr:t");
        assert_eq!(once.render(), twice.render());
    }

    #[test]
    fn malformed_lines_survive_updates() {
        let file = ConfigFile::parse(".env", "export A=1\nnot an assignment\nB=2\n")
            .with_value("B", "3");
        assert_eq!(file.render(), "export A=1\nnot an assignment\nB=3\n");
    }

    #[test]
    fn untouched_lines_keep_spacing_and_crlf() {
        let file = ConfigFile::parse(
            ".env",
            "  HOST = db\r\nPOSTGRES_PASSWORD=old\r\nexport POSTGRES_PASSWORD=legacy\r\n",
        )
        .with_value("POSTGRES_PASSWORD", "new");
        assert_eq!(file.render(), "  HOST = db\r\nPOSTGRES_PASSWORD=new\r\n");
        assert_eq!(file.get("HOST"), Some(" db"));
    }

    #[test]
    fn exported_assignment_is_replaced_not_shadowed() {
        let file = ConfigFile::parse(".env", "export POSTGRES_PASSWORD=legacy\nA=1\n")
            .with_value("POSTGRES_PASSWORD", "new");
        assert_eq!(file.render(), "export POSTGRES_PASSWORD=new\nA=1\n");
        assert_eq!(file.get("POSTGRES_PASSWORD"), Some("new"));
        assert_eq!(file.keys().filter(|k| *k == "POSTGRES_PASSWORD").count(), 1);
    }

    #[test]
    fn appended_line_follows_file_terminator() {
        let file = ConfigFile::parse(".env", "A=1\r\nB=2").with_value("C", "3");
        assert_eq!(file.render(), "A=1\r\nB=2\r\nC=3\r\n");
    }

    #[test]
    fn missing_final_newline_is_kept_when_untouched() {
        let file = ConfigFile::parse(".env", "A=1\nB=2");
        assert_eq!(file.render(), "A=1\nB=2");
        assert_eq!(file.with_value("B", "3").render(), "A=1\nB=3");
    }

    #[test]
    fn save_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, SAMPLE).unwrap();

        ConfigFile::load(&path)
            .unwrap()
            .with_value("POSTGRES_PASSWORD", "fresh")
            .save()
            .unwrap();

        let reloaded = ConfigFile::load(&path).unwrap();
        assert_eq!(reloaded.get("POSTGRES_PASSWORD"), Some("fresh"));
        assert_eq!(reloaded.get("POSTGRES_HOST"), Some("127.0.0.1"));
    }

    #[test]
    fn validate_key_rules() {
        assert!(validate_key("POSTGRES_PASSWORD").is_ok());
        assert!(validate_key("_private").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("1ABC").is_err());
        assert!(validate_key("A-B").is_err());
    }
}
