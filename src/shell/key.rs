//! Private key material for SSH sessions.

use super::error::KeyError;
use std::fmt;
use std::str::FromStr;

/// A validated, normalized private key block.
///
/// The text is kept out of `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    text: String,
}

impl PrivateKey {
    /// Normalizes and validates key text.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] when the normalized text is not a single
    /// `-----BEGIN <kind>PRIVATE KEY-----` ... `-----END <kind>PRIVATE KEY-----`
    /// block with a body.
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        let text = normalize(raw);
        let mut lines = text.lines();
        let header = lines.next().ok_or(KeyError::Empty)?;
        let kind = header
            .strip_prefix("-----BEGIN ")
            .and_then(|rest| rest.strip_suffix("PRIVATE KEY-----"))
            .ok_or(KeyError::MissingHeader)?;
        let expected = format!("-----END {kind}PRIVATE KEY-----");
        let footer = lines.next_back();
        if footer != Some(expected.as_str()) {
            return Err(KeyError::MissingFooter { expected });
        }
        if lines.next().is_none() {
            return Err(KeyError::EmptyBody);
        }
        Ok(Self { text })
    }

    /// Returns the normalized key text, without a trailing newline.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Returns the key text in the form key files expect.
    #[must_use]
    pub fn to_file_contents(&self) -> String {
        format!("{}\n", self.text)
    }
}

/// Drops carriage returns, surrounding whitespace on every line, and blank
/// lines. Applying it twice gives the same result as applying it once.
#[must_use]
pub fn normalize(raw: &str) -> String {
    raw.split('\n')
        .map(|line| line.replace('\r', ""))
        .map(|line| line.trim().to_owned())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

impl FromStr for PrivateKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}
