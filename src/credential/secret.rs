use crate::error::{Error, Result};
use std::fmt;
use std::io::BufRead;

/// A secret value that never shows up in `Debug` or `Display` output.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value. Only pass it to the database driver or a file writer.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replace any occurrence of the secret in `message`.
    pub fn redact(&self, message: &str) -> String {
        if self.0.is_empty() {
            message.to_string()
        } else {
            message.replace(&self.0, "***")
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Read one line from `reader` as a secret (for `--password-stdin`).
pub fn read_secret_line(mut reader: impl BufRead) -> Result<Secret> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    let value = line.trim_end_matches(['\n', '\r']);
    if value.is_empty() {
        return Err(Error::Validation(
            "no secret received on standard input".to_string(),
        ));
    }
    Ok(Secret::new(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_and_display_are_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{:?}", secret), "Secret(***)");
        assert_eq!(secret.to_string(), "***");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn redact_masks_occurrences() {
        let secret = Secret::new("pw");
        assert_eq!(secret.redact("bad pw for pw"), "bad *** for ***");
        assert_eq!(Secret::default().redact("untouched"), "untouched");
    }

    #[test]
    fn read_secret_line_strips_newline_only() {
        let secret = read_secret_line(" spaced pass \n".as_bytes()).unwrap();
        assert_eq!(secret.expose(), " spaced pass ");
        assert!(read_secret_line("\n".as_bytes()).is_err());
    }
}
