use regex::Regex;
use lazy_static::lazy_static;
use crate::utils::{quote, error};
use crate::error::FfireError;

lazy_static! {
    pub static ref TOKEN_REGEX:   Regex = Regex::new(r"(//[^\n]*|/\*[\s\S]*?\*/|`[^`]*`|\n|[ \t\r]+|[A-Za-z_][A-Za-z0-9_]*|\d+|[{}\[\]()*,;=.])").unwrap();
    pub static ref SKIPPED_RX:    Regex = Regex::new(r"^(//[^\n]*|/\*[\s\S]*\*/|[ \t\r]+)$").unwrap();
}

/// Statement separator emitted for every line break.
pub const NEWLINE: &str = "\n";

#[derive(Debug, PartialEq)]
pub struct Token {
    pub text:   String,
    pub line:   usize,
    pub column: usize,
}

/// Splits schema text into tokens. Comments and horizontal whitespace are
/// dropped, line breaks are kept as `"\n"` tokens and an empty token marks
/// the end of input.
pub fn tokenize_schema(text: &str) -> Result<Vec<Token>, FfireError> {
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut column = 1;
    let mut last_end = 0;

    for mat in TOKEN_REGEX.find_iter(text) {
        let start = mat.start();
        let end   = mat.end();
        let part  = mat.as_str();

        if start > last_end {
            let unexpected = &text[last_end..start];
            return Err(error(
                &format!("Syntax error: {}", quote(unexpected)),
                line,
                column,
            ));
        }

        if !SKIPPED_RX.is_match(part) {
            tokens.push(Token {
                text:   part.to_string(),
                line,
                column,
            });
        }

        let newline_count = part.matches('\n').count();
        if newline_count > 0 {
            line += newline_count;
            if let Some(last_line_part) = part.split('\n').last() {
                column = last_line_part.chars().count() + 1;
            }
        } else {
            column += part.chars().count();
        }

        last_end = end;
    }

    if last_end != text.len() {
        let unexpected = &text[last_end..];
        return Err(error(
            &format!("Syntax error: {}", quote(unexpected)),
            line,
            column,
        ));
    }

    // Append EOF token
    tokens.push(Token {
        text:   "".to_string(),
        line,
        column,
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_simple() {
        let input = "type Point struct {";
        let expected = vec![
            Token { text: "type".into(),   line: 1, column: 1 },
            Token { text: "Point".into(),  line: 1, column: 6 },
            Token { text: "struct".into(), line: 1, column: 12 },
            Token { text: "{".into(),      line: 1, column: 19 },
            Token { text: "".into(),       line: 1, column: 20 },
        ];
        let got = tokenize_schema(input).unwrap();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_tokenize_field_with_tag() {
        let input = "\tOwner *string `json:\"owner\"`\n}";
        let expected = vec![
            Token { text: "Owner".into(),           line: 1, column: 2 },
            Token { text: "*".into(),               line: 1, column: 8 },
            Token { text: "string".into(),          line: 1, column: 9 },
            Token { text: "`json:\"owner\"`".into(), line: 1, column: 16 },
            Token { text: "\n".into(),              line: 1, column: 30 },
            Token { text: "}".into(),               line: 2, column: 1 },
            Token { text: "".into(),                line: 2, column: 2 },
        ];
        let got = tokenize_schema(input).unwrap();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_tokenize_arrays_and_comments() {
        let input = "[]int32 // trailing\n/* block\ncomment */ [4]";
        let texts: Vec<String> = tokenize_schema(input)
            .unwrap()
            .into_iter()
            .map(|token| token.text)
            .collect();
        assert_eq!(texts, ["[", "]", "int32", "\n", "[", "4", "]", ""]);
    }

    #[test]
    fn test_tokenize_block_comment_keeps_line_numbers() {
        let tokens = tokenize_schema("/* a\nb */ package").unwrap();
        assert_eq!(tokens[0], Token { text: "package".into(), line: 2, column: 6 });
    }

    #[test]
    fn test_tokenize_unexpected_text() {
        let input = "type X int32 @";
        let err = tokenize_schema(input).unwrap_err();
        assert!(
            matches!(err, FfireError::Parse { line: 1, column: 14, .. }),
            "expected a Parse error but got {:?}",
            err
        );
    }
}
