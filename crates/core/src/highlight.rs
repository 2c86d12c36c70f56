//! Syntax classification for rendered code.
//!
//! The highlighter splits Python source into a flat run of classified tokens
//! in a single left-to-right scan. It never builds a tree and never fails:
//! anything it does not recognize is passed through as [`TokenKind::Text`],
//! so concatenating the token texts always reproduces the input.

use serde::Serialize;

/// Reserved words coloured as keywords.
pub const KEYWORDS: [&str; 24] = [
    "def", "class", "return", "import", "from", "if", "else", "elif", "while", "for", "in",
    "try", "except", "print", "True", "False", "None", "and", "or", "not", "as", "with",
    "await", "async",
];

/// Single-character operators and delimiters coloured as punctuation.
pub const PUNCTUATION: &[u8] = b"(){}[]:,.=<>!+-*/%&|^~";

/// Classification of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Whitespace and anything no rule matched.
    Text,
    /// An identifier that is not a keyword, call or constant.
    Foreground,
    Comment,
    String,
    Number,
    Keyword,
    Punctuation,
    /// An identifier immediately followed by `(`.
    Function,
    /// An identifier starting with an upper-case letter.
    Constant,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Text => "text",
            TokenKind::Foreground => "foreground",
            TokenKind::Comment => "comment",
            TokenKind::String => "string",
            TokenKind::Number => "number",
            TokenKind::Keyword => "keyword",
            TokenKind::Punctuation => "punctuation",
            TokenKind::Function => "function",
            TokenKind::Constant => "constant",
        }
    }
}

/// A classified slice of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind, text: &'a str) -> Self {
        Self { kind, text }
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

/// Byte offset just past the closing quote, if the literal closes on this line.
fn closing_quote(source: &str, open: usize, quote: char) -> Option<usize> {
    let rest = &source[open + 1..];
    let (offset, found) = rest
        .char_indices()
        .find(|&(_, c)| c == quote || is_line_terminator(c))?;
    (found == quote).then_some(open + 1 + offset + 1)
}

fn line_end(source: &str, from: usize) -> usize {
    source[from..]
        .find(is_line_terminator)
        .map_or(source.len(), |offset| from + offset)
}

fn classify_word(word: &str, next: Option<u8>) -> TokenKind {
    if KEYWORDS.contains(&word) {
        TokenKind::Keyword
    } else if next == Some(b'(') {
        TokenKind::Function
    } else if word.starts_with(|c: char| c.is_ascii_uppercase()) {
        TokenKind::Constant
    } else {
        TokenKind::Foreground
    }
}

/// Try to match a token starting at `pos`.
///
/// Returns the kind (or `None` when nothing matched) and the offset where
/// scanning resumes. Unmatched word runs are skipped whole so a partial
/// identifier is never recognized inside them.
fn scan_at(source: &str, pos: usize) -> (Option<TokenKind>, usize) {
    let bytes = source.as_bytes();
    let b = bytes[pos];
    match b {
        b'"' | b'\'' => match closing_quote(source, pos, b as char) {
            Some(end) => (Some(TokenKind::String), end),
            None => (None, pos + 1),
        },
        b'#' => (Some(TokenKind::Comment), line_end(source, pos)),
        b if is_word_byte(b) => {
            let end = pos + bytes[pos..].iter().take_while(|&&b| is_word_byte(b)).count();
            let word = &source[pos..end];
            let kind = if word.bytes().all(|b| b.is_ascii_digit()) {
                Some(TokenKind::Number)
            } else if b.is_ascii_digit() {
                None
            } else {
                Some(classify_word(word, bytes.get(end).copied()))
            };
            (kind, end)
        }
        b if PUNCTUATION.contains(&b) => (Some(TokenKind::Punctuation), pos + 1),
        _ => (None, pos + 1),
    }
}

/// Split `source` into classified tokens.
///
/// Adjacent unmatched characters are merged into a single `Text` token.
/// Empty input yields no tokens.
pub fn tokenize(source: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut pending = 0;
    let mut pos = 0;

    while pos < source.len() {
        let (kind, end) = scan_at(source, pos);
        if let Some(kind) = kind {
            if pending < pos {
                tokens.push(Token::new(TokenKind::Text, &source[pending..pos]));
            }
            tokens.push(Token::new(kind, &source[pos..end]));
            pending = end;
        }
        pos = end;
    }

    if pending < source.len() {
        tokens.push(Token::new(TokenKind::Text, &source[pending..]));
    }
    tokens
}

/// Group tokens by source line.
///
/// Produces exactly one entry per `source.split('\n')` segment; the newline
/// characters themselves are dropped. Only `Text` tokens can span lines.
pub fn split_lines<'a>(tokens: &[Token<'a>]) -> Vec<Vec<Token<'a>>> {
    let mut lines = Vec::new();
    let mut current = Vec::new();
    for token in tokens {
        for (i, part) in token.text.split('\n').enumerate() {
            if i > 0 {
                lines.push(std::mem::take(&mut current));
            }
            if !part.is_empty() {
                current.push(Token::new(token.kind, part));
            }
        }
    }
    lines.push(current);
    lines
}
