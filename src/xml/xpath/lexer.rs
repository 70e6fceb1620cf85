//! Tokenizer for XPath 1.0 expressions.
//!
//! Applies the lexical disambiguation rules of XPath 1.0 section 3.7: `*` and
//! the names `and`, `or`, `div`, `mod` are operators only when a preceding
//! token exists that is not itself an operator, `@`, `::`, `(`, `[` or `,`.

use super::XPathError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NameTestToken {
    /// `*`
    Any,
    /// `prefix:*`
    AnyInNamespace(String),
    /// `local` or `prefix:local`
    Name(Option<String>, String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Comma,
    Dot,
    DotDot,
    DoubleColon,
    Pipe,
    Plus,
    Minus,
    Multiply,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Mod,
    Div,
    Literal(String),
    Number(f64),
    NameTest(NameTestToken),
    FunctionName(String),
    NodeType(String),
    AxisName(String),
    Variable(String),
}

impl Token {
    fn is_operator(&self) -> bool {
        matches!(
            self,
            Token::Slash
                | Token::DoubleSlash
                | Token::Pipe
                | Token::Plus
                | Token::Minus
                | Token::Multiply
                | Token::Eq
                | Token::NotEq
                | Token::Lt
                | Token::Le
                | Token::Gt
                | Token::Ge
                | Token::And
                | Token::Or
                | Token::Mod
                | Token::Div
        )
    }
}

/// A token and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

const NODE_TYPES: [&str; 4] = ["node", "text", "comment", "processing-instruction"];

pub(crate) fn tokenize(input: &str) -> Result<Vec<Spanned>, XPathError> {
    let bytes = input.as_bytes();
    let mut tokens: Vec<Spanned> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        let operator_context = tokens.last().is_some_and(|t| {
            !t.token.is_operator()
                && !matches!(
                    t.token,
                    Token::At | Token::DoubleColon | Token::LParen | Token::LBracket | Token::Comma
                )
        });

        let token = match c {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i += 2;
                Token::DoubleSlash
            },
            b'/' => {
                i += 1;
                Token::Slash
            },
            b'[' => {
                i += 1;
                Token::LBracket
            },
            b']' => {
                i += 1;
                Token::RBracket
            },
            b'(' => {
                i += 1;
                Token::LParen
            },
            b')' => {
                i += 1;
                Token::RParen
            },
            b'@' => {
                i += 1;
                Token::At
            },
            b',' => {
                i += 1;
                Token::Comma
            },
            b'|' => {
                i += 1;
                Token::Pipe
            },
            b'+' => {
                i += 1;
                Token::Plus
            },
            b'-' => {
                i += 1;
                Token::Minus
            },
            b'=' => {
                i += 1;
                Token::Eq
            },
            b'!' if bytes.get(i + 1) == Some(&b'=') => {
                i += 2;
                Token::NotEq
            },
            b'<' if bytes.get(i + 1) == Some(&b'=') => {
                i += 2;
                Token::Le
            },
            b'<' => {
                i += 1;
                Token::Lt
            },
            b'>' if bytes.get(i + 1) == Some(&b'=') => {
                i += 2;
                Token::Ge
            },
            b'>' => {
                i += 1;
                Token::Gt
            },
            b':' if bytes.get(i + 1) == Some(&b':') => {
                i += 2;
                Token::DoubleColon
            },
            b'*' => {
                i += 1;
                if operator_context {
                    Token::Multiply
                } else {
                    Token::NameTest(NameTestToken::Any)
                }
            },
            b'.' if bytes.get(i + 1) == Some(&b'.') => {
                i += 2;
                Token::DotDot
            },
            b'.' if bytes.get(i + 1).is_some_and(u8::is_ascii_digit) => {
                let (n, end) = read_number(input, i);
                i = end;
                Token::Number(n)
            },
            b'.' => {
                i += 1;
                Token::Dot
            },
            b'"' | b'\'' => {
                let close = input[i + 1..].find(c as char).ok_or_else(|| {
                    XPathError::syntax(start, "unterminated string literal")
                })?;
                let text = input[i + 1..i + 1 + close].to_string();
                i += close + 2;
                Token::Literal(text)
            },
            b'$' => {
                let (name, end) = read_qname(input, i + 1);
                if name.is_empty() {
                    return Err(XPathError::syntax(start, "expected variable name after '$'"));
                }
                i = end;
                Token::Variable(name.to_string())
            },
            c if c.is_ascii_digit() => {
                let (n, end) = read_number(input, i);
                i = end;
                Token::Number(n)
            },
            _ => {
                let (name, end) = read_ncname(input, i);
                if name.is_empty() {
                    let ch = input[i..].chars().next().unwrap_or('?');
                    return Err(XPathError::syntax(start, format!("unexpected character '{}'", ch)));
                }
                i = end;

                if operator_context {
                    match name {
                        "and" => Token::And,
                        "or" => Token::Or,
                        "mod" => Token::Mod,
                        "div" => Token::Div,
                        other => {
                            return Err(XPathError::syntax(
                                start,
                                format!("expected an operator, found '{}'", other),
                            ));
                        },
                    }
                } else {
                    lex_name(input, name, &mut i)
                }
            },
        };

        tokens.push(Spanned { token, offset: start });
    }

    Ok(tokens)
}

/// Classify a name once its first NCName has been read.
fn lex_name(input: &str, name: &str, i: &mut usize) -> Token {
    let bytes = input.as_bytes();

    // prefix:local or prefix:*
    if bytes.get(*i) == Some(&b':') && bytes.get(*i + 1) != Some(&b':') {
        if bytes.get(*i + 1) == Some(&b'*') {
            *i += 2;
            return Token::NameTest(NameTestToken::AnyInNamespace(name.to_string()));
        }
        let (local, end) = read_ncname(input, *i + 1);
        if !local.is_empty() {
            *i = end;
            let qualified = format!("{}:{}", name, local);
            if next_non_space(bytes, *i) == Some(b'(') {
                return Token::FunctionName(qualified);
            }
            return Token::NameTest(NameTestToken::Name(Some(name.to_string()), local.to_string()));
        }
    }

    match next_non_space(bytes, *i) {
        Some(b'(') if NODE_TYPES.contains(&name) => Token::NodeType(name.to_string()),
        Some(b'(') => Token::FunctionName(name.to_string()),
        Some(b':') if input[*i..].trim_start().starts_with("::") => {
            Token::AxisName(name.to_string())
        },
        _ => Token::NameTest(NameTestToken::Name(None, name.to_string())),
    }
}

fn next_non_space(bytes: &[u8], mut i: usize) -> Option<u8> {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    bytes.get(i).copied()
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '\u{B7}')
}

fn read_ncname(input: &str, start: usize) -> (&str, usize) {
    let mut chars = input[start..].char_indices();
    match chars.next() {
        Some((_, c)) if is_name_start(c) => {},
        _ => return ("", start),
    }
    let mut end = input.len();
    for (offset, c) in chars {
        if !is_name_char(c) {
            end = start + offset;
            break;
        }
    }
    (&input[start..end], end)
}

fn read_qname(input: &str, start: usize) -> (&str, usize) {
    let (_, mut end) = read_ncname(input, start);
    if end > start && input[end..].starts_with(':') && !input[end..].starts_with("::") {
        let (local, local_end) = read_ncname(input, end + 1);
        if !local.is_empty() {
            end = local_end;
        }
    }
    (&input[start..end], end)
}

fn read_number(input: &str, start: usize) -> (f64, usize) {
    let bytes = input.as_bytes();
    let mut end = start;
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => end += 1,
            b'.' if !seen_dot && bytes.get(end + 1) != Some(&b'.') => {
                seen_dot = true;
                end += 1;
            },
            _ => break,
        }
    }
    (input[start..end].parse().unwrap_or(f64::NAN), end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_tokenize_path() {
        assert_eq!(
            kinds("//a:p[@lvl='1']"),
            vec![
                Token::DoubleSlash,
                Token::NameTest(NameTestToken::Name(Some("a".into()), "p".into())),
                Token::LBracket,
                Token::At,
                Token::NameTest(NameTestToken::Name(None, "lvl".into())),
                Token::Eq,
                Token::Literal("1".into()),
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn test_star_disambiguation() {
        assert_eq!(
            kinds("* * 2"),
            vec![
                Token::NameTest(NameTestToken::Any),
                Token::Multiply,
                Token::Number(2.0)
            ]
        );
        assert_eq!(
            kinds("a:*"),
            vec![Token::NameTest(NameTestToken::AnyInNamespace("a".into()))]
        );
    }

    #[test]
    fn test_operator_names_and_axes() {
        assert_eq!(
            kinds("child::div div 2"),
            vec![
                Token::AxisName("child".into()),
                Token::DoubleColon,
                Token::NameTest(NameTestToken::Name(None, "div".into())),
                Token::Div,
                Token::Number(2.0),
            ]
        );
        assert_eq!(
            kinds("text() and count(.)"),
            vec![
                Token::NodeType("text".into()),
                Token::LParen,
                Token::RParen,
                Token::And,
                Token::FunctionName("count".into()),
                Token::LParen,
                Token::Dot,
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_errors_carry_offsets() {
        let err = tokenize("//a:p[@x='1]").unwrap_err();
        assert!(matches!(err, XPathError::Syntax { offset: 9, .. }));
        assert!(tokenize("a # b").is_err());
    }
}
