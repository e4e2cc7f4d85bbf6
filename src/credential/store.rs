//! The credential store: a libpq passfile (`host:port:database:user:password`).
//!
//! The file is shared with other tools, so every line the orchestrator does
//! not own is carried through untouched and in place. Only lines whose four
//! key fields equal the record's key, literally, are treated as ours;
//! wildcard lines (`*`) belong to someone else.

use super::{CredentialKey, CredentialRecord, Secret};
use crate::error::{Error, Result};
use crate::files::{restrict_to_owner, write_atomic};
use std::fs;
use std::path::{Path, PathBuf};

/// A parsed passfile entry. Fields are unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    host: String,
    port: String,
    database: String,
    user: String,
    password: String,
}

impl Entry {
    fn parse(line: &str) -> Option<Self> {
        let mut fields = Vec::with_capacity(5);
        let mut current = String::new();
        let mut chars = line.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                }
                // The password is the remainder of the line.
                ':' if fields.len() < 4 => fields.push(std::mem::take(&mut current)),
                _ => current.push(c),
            }
        }
        fields.push(current);

        let [host, port, database, user, password]: [String; 5] = fields.try_into().ok()?;
        Some(Self {
            host,
            port,
            database,
            user,
            password,
        })
    }

    fn is_key(&self, key: &CredentialKey) -> bool {
        self.host == key.host
            && self.port == key.port.to_string()
            && self.database == key.database
            && self.user == key.user
    }

    /// libpq matching: `*` in any of the first four fields matches anything.
    fn matches(&self, key: &CredentialKey) -> bool {
        let field = |pattern: &str, value: &str| pattern == "*" || pattern == value;
        field(&self.host, &key.host)
            && field(&self.port, &key.port.to_string())
            && field(&self.database, &key.database)
            && field(&self.user, &key.user)
    }
}

fn escape_field(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == ':' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn format_record(record: &CredentialRecord) -> String {
    [
        escape_field(&record.host),
        record.port.to_string(),
        escape_field(&record.database),
        escape_field(&record.user),
        escape_field(record.secret.expose()),
    ]
    .join(":")
}

/// One line of the store as it was read, plus its parse when it is an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLine {
    raw: String,
    entry: Option<Entry>,
}

impl StoreLine {
    fn parse(raw: &str) -> Self {
        let trimmed = raw.trim_start();
        let entry = if trimmed.is_empty() || trimmed.starts_with('#') {
            None
        } else {
            Entry::parse(raw)
        };
        Self {
            raw: raw.to_string(),
            entry,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// In-memory view of the credential store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialStore {
    lines: Vec<StoreLine>,
}

impl CredentialStore {
    pub fn parse(content: &str) -> Self {
        Self {
            lines: content.lines().map(StoreLine::parse).collect(),
        }
    }

    /// Load the store; a missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Self::parse(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(Error::Filesystem(format!(
                "Cannot read credential store '{}': {}",
                path.display(),
                e
            ))),
        }
    }

    /// Returns the store with `record` as the only entry for its key.
    ///
    /// Every line keyed exactly like `record` is removed, then the record is
    /// appended. Other lines keep their content and relative order.
    pub fn upsert(self, record: &CredentialRecord) -> Self {
        let key = record.key();
        let mut lines: Vec<StoreLine> = self
            .lines
            .into_iter()
            .filter(|line| !line.entry.as_ref().is_some_and(|e| e.is_key(&key)))
            .collect();
        lines.push(StoreLine::parse(&format_record(record)));
        Self { lines }
    }

    /// Number of entries keyed exactly by `key`.
    pub fn count_for(&self, key: &CredentialKey) -> usize {
        self.lines
            .iter()
            .filter(|line| line.entry.as_ref().is_some_and(|e| e.is_key(key)))
            .count()
    }

    /// The secret a libpq client would pick for `key`: first matching line,
    /// wildcards included.
    pub fn lookup(&self, key: &CredentialKey) -> Option<Secret> {
        self.lines
            .iter()
            .filter_map(|line| line.entry.as_ref())
            .find(|e| e.matches(key))
            .map(|e| Secret::new(e.password.clone()))
    }

    pub fn lines(&self) -> &[StoreLine] {
        &self.lines
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.raw);
            out.push('\n');
        }
        out
    }

    /// Write the store with mode 0600.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        write_atomic(path, &self.render(), Some(0o600))?;
        restrict_to_owner(path)
    }
}

/// Copy the store to `<store>.bak.<timestamp>` before it is mutated.
///
/// Returns `None` when there is no store yet. The backup holds secrets too,
/// so it gets mode 0600 as well.
pub fn backup_store(path: &Path) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }

    let stamp = chrono::Local::now().format("%Y%m%d%H%M%S").to_string();
    let base = format!("{}.bak.{}", path.display(), stamp);
    let mut backup = PathBuf::from(&base);
    let mut n = 1;
    while backup.exists() {
        backup = PathBuf::from(format!("{}.{}", base, n));
        n += 1;
    }

    fs::copy(path, &backup).map_err(|e| {
        Error::Filesystem(format!(
            "Cannot back up '{}' to '{}': {}",
            path.display(),
            backup.display(),
            e
        ))
    })?;
    restrict_to_owner(&backup)?;
    tracing::debug!("Backed up credential store to {}", backup.display());
    Ok(Some(backup))
}
