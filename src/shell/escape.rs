//! Quoting helpers for commands sent to remote shells.

/// Wraps a value in single quotes for a POSIX shell.
///
/// Embedded quotes become `'\''`.
#[must_use]
pub fn shell_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len().saturating_add(2));
    escaped.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            escaped.push_str("'\\''");
        } else {
            escaped.push(ch);
        }
    }
    escaped.push('\'');
    escaped
}

/// Quotes a word only when the shell would otherwise interpret it.
#[must_use]
pub fn shell_word(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | '=' | '@' | ','));
    if plain {
        value.to_owned()
    } else {
        shell_escape(value)
    }
}

/// Joins words into one command line, quoting where needed.
#[must_use]
pub fn command_line<S: AsRef<str>>(words: &[S]) -> String {
    words
        .iter()
        .map(|word| shell_word(word.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}
