//! Splits one HOIL source line into its tokens.

use coil::constants::{MAX_LINE_LEN, MAX_TOKENS};

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum TokenizeError {
    LineTooLong(usize),
    TooManyTokens(usize),
}

impl std::fmt::Display for TokenizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TokenizeError::LineTooLong(len) => {
                write!(f, "line is {} characters, exceeds the {} character limit", len, MAX_LINE_LEN)
            }
            TokenizeError::TooManyTokens(count) => {
                write!(f, "line has {} tokens, exceeds the {} token limit", count, MAX_TOKENS)
            }
        }
    }
}

impl std::error::Error for TokenizeError {}

/// Splits `line` on space, comma or tab, truncating at the first `;` (comment).
///
/// An empty or comment-only line yields zero tokens. Trailing `\r` from CRLF line
/// endings is stripped before splitting.
pub fn tokenize(line: &str) -> Result<Vec<&str>, TokenizeError> {
    if line.len() > MAX_LINE_LEN {
        return Err(TokenizeError::LineTooLong(line.len()));
    }

    let line = line.trim_end_matches('\r');
    let line = match line.find(';') {
        Some(index) => &line[..index],
        None => line,
    };

    let tokens: Vec<&str> = line
        .split(|c: char| c == ' ' || c == '\t' || c == ',')
        .filter(|tok| !tok.is_empty())
        .collect();

    if tokens.len() > MAX_TOKENS {
        return Err(TokenizeError::TooManyTokens(tokens.len()));
    }

    Ok(tokens)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn splits_on_space_comma_and_tab() {
        assert_eq!(tokenize("VAL DEFV\tint64 a,0").unwrap(), vec!["VAL", "DEFV", "int64", "a", "0"]);
    }

    #[test]
    fn comment_only_line_is_empty() {
        assert_eq!(tokenize("   ; just a comment").unwrap(), Vec::<&str>::new());
    }

    #[test]
    fn comment_truncates_trailing_tokens() {
        assert_eq!(tokenize("CF RET ; return now").unwrap(), vec!["CF", "RET"]);
    }

    #[test]
    fn blank_line_is_empty() {
        assert_eq!(tokenize("").unwrap(), Vec::<&str>::new());
    }

    #[test]
    fn too_many_tokens_is_an_error() {
        let line = (0..20).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
        assert_eq!(tokenize(&line), Err(TokenizeError::TooManyTokens(20)));
    }

    #[test]
    fn overlong_line_is_an_error() {
        let line = "a".repeat(300);
        assert_eq!(tokenize(&line), Err(TokenizeError::LineTooLong(300)));
    }
}
