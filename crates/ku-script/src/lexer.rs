use logos::Logos;
use std::fmt;
use std::ops::Range;

/// Token type for Kulisse command lines.
///
/// Words are lowercased at lex time because command names, aliases and
/// labels are case-insensitive. String literals keep their case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Argument separator `,`.
    Comma,
    /// Command separator `:`.
    Colon,
    /// Left parenthesis `(`.
    LParen,
    /// Right parenthesis `)`.
    RParen,
    /// `+`.
    Plus,
    /// `-`.
    Minus,
    /// `*` when not followed by a label name.
    Star,
    /// `/`.
    Slash,
    /// `=` or `==`.
    Eq,
    /// `!=` or `<>`.
    Ne,
    /// `<`.
    Lt,
    /// `<=`.
    Le,
    /// `>`.
    Gt,
    /// `>=`.
    Ge,
    /// `&&` or `&`.
    And,
    /// Numeric variable by index, `%12`.
    NumVar(u32),
    /// Numeric variable through an alias, `%counter`.
    NumAlias(String),
    /// String variable by index, `$3`.
    StrVar(u32),
    /// String variable through an alias, `$name`.
    StrAlias(String),
    /// Label reference, `*start` (stored without the asterisk).
    Label(String),
    /// Double-quoted string literal.
    Str(String),
    /// Non-negative integer literal. Negation is an expression operator.
    Int(i32),
    /// Colour literal `#RRGGBB`.
    Color(u32),
    /// Bare word: a command name, keyword or alias.
    Word(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Comma => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Eq => write!(f, "=="),
            Token::Ne => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Le => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Ge => write!(f, ">="),
            Token::And => write!(f, "&&"),
            Token::NumVar(n) => write!(f, "%{n}"),
            Token::NumAlias(a) => write!(f, "%{a}"),
            Token::StrVar(n) => write!(f, "${n}"),
            Token::StrAlias(a) => write!(f, "${a}"),
            Token::Label(l) => write!(f, "*{l}"),
            Token::Str(s) => write!(f, "\"{s}\""),
            Token::Int(n) => write!(f, "{n}"),
            Token::Color(c) => write!(f, "#{c:06x}"),
            Token::Word(w) => write!(f, "{w}"),
        }
    }
}

/// Internal logos token; borrows from the source and is converted to an
/// owned [`Token`] right after matching.
#[derive(Logos, Debug)]
#[logos(skip r"[ \t\r]+")]
#[logos(skip r";[^\n]*")]
enum RawToken {
    #[token(",")]
    Comma,

    #[token(":")]
    Colon,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("=")]
    #[token("==")]
    Eq,

    #[token("!=")]
    #[token("<>")]
    Ne,

    #[token("<")]
    Lt,

    #[token("<=")]
    Le,

    #[token(">")]
    Gt,

    #[token(">=")]
    Ge,

    #[token("&&")]
    #[token("&")]
    And,

    #[regex(r"%[0-9]+")]
    NumVar,

    #[regex(r"%[A-Za-z_][A-Za-z0-9_]*")]
    NumAlias,

    #[regex(r"\$[0-9]+")]
    StrVar,

    #[regex(r"\$[A-Za-z_][A-Za-z0-9_]*")]
    StrAlias,

    #[regex(r"\*[A-Za-z_][A-Za-z0-9_]*")]
    Label,

    #[regex(r#""[^"\n]*""#)]
    Str,

    #[regex(r"[0-9]+")]
    Int,

    #[regex(r"#[0-9A-Fa-f]{6}")]
    Color,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Word,
}

/// A lexer error with source location.
#[derive(Debug, Clone)]
pub struct LexError {
    /// Byte range of the offending input, relative to the whole script.
    pub span: Range<usize>,
    /// Human-readable description.
    pub message: String,
}

/// Lex one command line into `(Token, Span)` pairs.
///
/// `offset` is the byte position of `line` inside the whole script, so
/// spans can be rendered against the full source. Lexing continues past
/// errors so `kulisse check` can report every problem on the line.
pub fn lex_line(line: &str, offset: usize) -> (Vec<(Token, Range<usize>)>, Vec<LexError>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut lexer = RawToken::lexer(line);

    while let Some(result) = lexer.next() {
        let local = lexer.span();
        let span = local.start + offset..local.end + offset;
        let slice = lexer.slice();
        let token = match result {
            Ok(RawToken::Comma) => Token::Comma,
            Ok(RawToken::Colon) => Token::Colon,
            Ok(RawToken::LParen) => Token::LParen,
            Ok(RawToken::RParen) => Token::RParen,
            Ok(RawToken::Plus) => Token::Plus,
            Ok(RawToken::Minus) => Token::Minus,
            Ok(RawToken::Star) => Token::Star,
            Ok(RawToken::Slash) => Token::Slash,
            Ok(RawToken::Eq) => Token::Eq,
            Ok(RawToken::Ne) => Token::Ne,
            Ok(RawToken::Lt) => Token::Lt,
            Ok(RawToken::Le) => Token::Le,
            Ok(RawToken::Gt) => Token::Gt,
            Ok(RawToken::Ge) => Token::Ge,
            Ok(RawToken::And) => Token::And,
            Ok(RawToken::NumVar) => match slice[1..].parse::<u32>() {
                Ok(n) => Token::NumVar(n),
                Err(_) => {
                    errors.push(LexError {
                        span,
                        message: format!("variable index out of range: {slice}"),
                    });
                    continue;
                }
            },
            Ok(RawToken::NumAlias) => Token::NumAlias(slice[1..].to_ascii_lowercase()),
            Ok(RawToken::StrVar) => match slice[1..].parse::<u32>() {
                Ok(n) => Token::StrVar(n),
                Err(_) => {
                    errors.push(LexError {
                        span,
                        message: format!("variable index out of range: {slice}"),
                    });
                    continue;
                }
            },
            Ok(RawToken::StrAlias) => Token::StrAlias(slice[1..].to_ascii_lowercase()),
            Ok(RawToken::Label) => Token::Label(slice[1..].to_ascii_lowercase()),
            Ok(RawToken::Str) => Token::Str(unescape(&slice[1..slice.len() - 1])),
            Ok(RawToken::Int) => match slice.parse::<i32>() {
                Ok(n) => Token::Int(n),
                Err(_) => {
                    errors.push(LexError {
                        span,
                        message: format!("invalid integer literal: {slice}"),
                    });
                    continue;
                }
            },
            Ok(RawToken::Color) => match u32::from_str_radix(&slice[1..], 16) {
                Ok(c) => Token::Color(c),
                Err(_) => {
                    errors.push(LexError {
                        span,
                        message: format!("invalid colour literal: {slice}"),
                    });
                    continue;
                }
            },
            Ok(RawToken::Word) => Token::Word(slice.to_ascii_lowercase()),
            Err(()) => {
                errors.push(LexError {
                    span,
                    message: format!("unexpected character: {slice:?}"),
                });
                continue;
            }
        };
        tokens.push((token, span));
    }

    (tokens, errors)
}

/// Process escape sequences in a string literal.
///
/// Supports `\\`, `\n`, `\t`. Unknown sequences are kept as-is.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        let (tokens, errors) = lex_line(source, 0);
        assert!(errors.is_empty(), "errors: {errors:?}");
        tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn lex_command_with_arguments() {
        assert_eq!(
            tokens(r#"mov %0, 5 : mov $1, "Hello""#),
            vec![
                Token::Word("mov".into()),
                Token::NumVar(0),
                Token::Comma,
                Token::Int(5),
                Token::Colon,
                Token::Word("mov".into()),
                Token::StrVar(1),
                Token::Comma,
                Token::Str("Hello".into()),
            ]
        );
    }

    #[test]
    fn words_and_labels_are_lowercased() {
        assert_eq!(
            tokens("GOTO *Start"),
            vec![Token::Word("goto".into()), Token::Label("start".into())]
        );
    }

    #[test]
    fn label_wins_over_star_operator() {
        assert_eq!(
            tokens("%1*3"),
            vec![Token::NumVar(1), Token::Star, Token::Int(3)]
        );
        assert_eq!(tokens("*end"), vec![Token::Label("end".into())]);
    }

    #[test]
    fn comparison_operators() {
        assert_eq!(
            tokens("%0>=3 && %1<>2"),
            vec![
                Token::NumVar(0),
                Token::Ge,
                Token::Int(3),
                Token::And,
                Token::NumVar(1),
                Token::Ne,
                Token::Int(2),
            ]
        );
    }

    #[test]
    fn aliases() {
        assert_eq!(
            tokens("add %score, bonus"),
            vec![
                Token::Word("add".into()),
                Token::NumAlias("score".into()),
                Token::Comma,
                Token::Word("bonus".into()),
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(tokens("click ; wait here"), vec![Token::Word("click".into())]);
    }

    #[test]
    fn numbered_variant_is_one_word() {
        assert_eq!(tokens("w500"), vec![Token::Word("w500".into())]);
    }

    #[test]
    fn colour_literal() {
        assert_eq!(tokens("#ff8000"), vec![Token::Color(0xff8000)]);
    }

    #[test]
    fn spans_are_offset() {
        let (tokens, _) = lex_line("bgm \"a\"", 100);
        assert_eq!(tokens[0].1, 100..103);
        assert_eq!(tokens[1].1, 104..107);
    }

    #[test]
    fn unexpected_character_is_reported() {
        let (tokens, errors) = lex_line("click ?", 0);
        assert_eq!(tokens.len(), 1);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].span, 6..7);
    }

    #[test]
    fn integer_overflow_is_reported() {
        let (_, errors) = lex_line("wait 99999999999", 0);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("invalid integer"));
    }

    #[test]
    fn unescape_sequences() {
        assert_eq!(unescape(r"a\nb"), "a\nb");
        assert_eq!(unescape(r"a\\b"), "a\\b");
        assert_eq!(unescape(r"\x"), "\\x");
        assert_eq!(unescape("trail\\"), "trail\\");
    }
}
