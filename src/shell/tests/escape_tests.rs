//! Tests for shell quoting.

use crate::shell::{command_line, shell_escape, shell_word};
use rstest::rstest;

#[rstest]
#[case("plain", "'plain'")]
#[case("", "''")]
#[case("it's", "'it'\\''s'")]
#[case("$HOME; rm -rf /", "'$HOME; rm -rf /'")]
fn escape_single_quotes_everything(#[case] raw: &str, #[case] expected: &str) {
    assert_eq!(shell_escape(raw), expected);
}

#[rstest]
#[case("/tmp/palaver-1", "/tmp/palaver-1")]
#[case("a b", "'a b'")]
#[case("", "''")]
#[case("x*", "'x*'")]
fn words_are_quoted_only_when_needed(#[case] raw: &str, #[case] expected: &str) {
    assert_eq!(shell_word(raw), expected);
}

#[rstest]
fn command_line_joins_quoted_words() {
    assert_eq!(
        command_line(&["docker", "rm", "-f", "talk one"]),
        "docker rm -f 'talk one'"
    );
}
