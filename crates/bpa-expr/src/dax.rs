//! Structural DAX tokenizer.
//!
//! [`tokenize`] returns a lazy iterator over a DAX expression; cloning it
//! restarts nothing and iterating it again from [`tokenize`] always yields
//! the same tokens. The tokenizer never fails: characters it does not
//! understand become [`TokenTag::Unknown`] tokens. Comments and whitespace
//! are skipped, so string literals and comments can no longer produce false
//! matches the way substring checks do.
//!
//! [`TokenList`] collects the tokens once and hands out [`TokenCursor`]s that
//! navigate to the next and previous token.

use std::fmt;
use std::sync::Arc;

/// Token types, named after the host's `TokenType` members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenTag {
    Function,
    ColumnOrMeasure,
    Table,
    TableOrVariable,
    IntegerLiteral,
    RealLiteral,
    StringLiteral,
    Var,
    Return,
    In,
    True,
    False,
    Div,
    Mult,
    Plus,
    Minus,
    Pow,
    Concat,
    And,
    Or,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    OpenParens,
    CloseParens,
    OpenCurly,
    CloseCurly,
    Comma,
    Unknown,
}

impl TokenTag {
    pub const ALL: [TokenTag; 32] = [
        Self::Function,
        Self::ColumnOrMeasure,
        Self::Table,
        Self::TableOrVariable,
        Self::IntegerLiteral,
        Self::RealLiteral,
        Self::StringLiteral,
        Self::Var,
        Self::Return,
        Self::In,
        Self::True,
        Self::False,
        Self::Div,
        Self::Mult,
        Self::Plus,
        Self::Minus,
        Self::Pow,
        Self::Concat,
        Self::And,
        Self::Or,
        Self::Eq,
        Self::Neq,
        Self::Lt,
        Self::Lte,
        Self::Gt,
        Self::Gte,
        Self::OpenParens,
        Self::CloseParens,
        Self::OpenCurly,
        Self::CloseCurly,
        Self::Comma,
        Self::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "FUNCTION",
            Self::ColumnOrMeasure => "COLUMN_OR_MEASURE",
            Self::Table => "TABLE",
            Self::TableOrVariable => "TABLE_OR_VARIABLE",
            Self::IntegerLiteral => "INTEGER_LITERAL",
            Self::RealLiteral => "REAL_LITERAL",
            Self::StringLiteral => "STRING_LITERAL",
            Self::Var => "VAR",
            Self::Return => "RETURN",
            Self::In => "IN",
            Self::True => "TRUE",
            Self::False => "FALSE",
            Self::Div => "DIV",
            Self::Mult => "MULT",
            Self::Plus => "PLUS",
            Self::Minus => "MINUS",
            Self::Pow => "POW",
            Self::Concat => "CONCAT",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Eq => "EQ",
            Self::Neq => "NEQ",
            Self::Lt => "LT",
            Self::Lte => "LTE",
            Self::Gt => "GT",
            Self::Gte => "GTE",
            Self::OpenParens => "OPEN_PARENS",
            Self::CloseParens => "CLOSE_PARENS",
            Self::OpenCurly => "OPEN_CURLY",
            Self::CloseCurly => "CLOSE_CURLY",
            Self::Comma => "COMMA",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for TokenTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaxToken {
    pub tag: TokenTag,
    /// Source text of the token, delimiters included.
    pub text: String,
    /// Character offset in the expression.
    pub offset: usize,
}

/// Lazy token stream over a DAX expression.
#[derive(Debug, Clone)]
pub struct DaxTokens {
    chars: Arc<[char]>,
    pos: usize,
}

pub fn tokenize(expression: &str) -> DaxTokens {
    DaxTokens {
        chars: expression.chars().collect(),
        pos: 0,
    }
}

impl Iterator for DaxTokens {
    type Item = DaxToken;

    fn next(&mut self) -> Option<DaxToken> {
        self.skip_trivia();
        let start = self.pos;
        let ch = self.peek()?;
        self.pos += 1;

        let tag = match ch {
            '(' => TokenTag::OpenParens,
            ')' => TokenTag::CloseParens,
            '{' => TokenTag::OpenCurly,
            '}' => TokenTag::CloseCurly,
            ',' => TokenTag::Comma,
            '/' => TokenTag::Div,
            '*' => TokenTag::Mult,
            '+' => TokenTag::Plus,
            '-' => TokenTag::Minus,
            '^' => TokenTag::Pow,
            '=' => {
                self.eat('=');
                TokenTag::Eq
            }
            '&' => {
                if self.eat('&') {
                    TokenTag::And
                } else {
                    TokenTag::Concat
                }
            }
            '|' if self.eat('|') => TokenTag::Or,
            '<' => {
                if self.eat('=') {
                    TokenTag::Lte
                } else if self.eat('>') {
                    TokenTag::Neq
                } else {
                    TokenTag::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenTag::Gte
                } else {
                    TokenTag::Gt
                }
            }
            '"' => self.delimited('"', TokenTag::StringLiteral),
            '\'' => self.delimited('\'', TokenTag::Table),
            '[' => self.delimited(']', TokenTag::ColumnOrMeasure),
            ch if ch.is_ascii_digit() || (ch == '.' && self.peek().is_some_and(|d| d.is_ascii_digit())) => {
                self.number(ch == '.')
            }
            ch if ch.is_alphabetic() || ch == '_' => self.word(),
            _ => TokenTag::Unknown,
        };

        Some(DaxToken {
            tag,
            text: self.chars[start..self.pos].iter().collect(),
            offset: start,
        })
    }
}

impl DaxTokens {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            while self.peek().is_some_and(char::is_whitespace) {
                self.pos += 1;
            }
            match (self.peek(), self.peek_at(1)) {
                (Some('/'), Some('/')) | (Some('-'), Some('-')) => {
                    while self.peek().is_some_and(|ch| ch != '\n' && ch != '\r') {
                        self.pos += 1;
                    }
                }
                (Some('/'), Some('*')) => {
                    self.pos += 2;
                    while self.peek().is_some() {
                        if self.peek() == Some('*') && self.peek_at(1) == Some('/') {
                            self.pos += 2;
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => return,
            }
        }
    }

    /// A delimited token where a doubled closing delimiter is an escape.
    /// Unterminated tokens run to the end of the input.
    fn delimited(&mut self, close: char, tag: TokenTag) -> TokenTag {
        while let Some(ch) = self.peek() {
            self.pos += 1;
            if ch == close {
                if self.peek() == Some(close) {
                    self.pos += 1;
                    continue;
                }
                break;
            }
        }
        tag
    }

    fn number(&mut self, mut seen_dot: bool) -> TokenTag {
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                self.pos += 1;
            } else if ch == '.' && !seen_dot {
                seen_dot = true;
                self.pos += 1;
            } else {
                break;
            }
        }
        let mut real = seen_dot;
        if matches!(self.peek(), Some('e' | 'E'))
            && (self.peek_at(1).is_some_and(|ch| ch.is_ascii_digit())
                || (matches!(self.peek_at(1), Some('+' | '-'))
                    && self.peek_at(2).is_some_and(|ch| ch.is_ascii_digit())))
        {
            real = true;
            self.pos += 2;
            while self.peek().is_some_and(|ch| ch.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if real {
            TokenTag::RealLiteral
        } else {
            TokenTag::IntegerLiteral
        }
    }

    fn word(&mut self) -> TokenTag {
        let start = self.pos - 1;
        while self
            .peek()
            .is_some_and(|ch| ch.is_alphanumeric() || ch == '_' || ch == '.')
        {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.to_ascii_uppercase().as_str() {
            "VAR" => return TokenTag::Var,
            "RETURN" => return TokenTag::Return,
            "IN" => return TokenTag::In,
            "TRUE" | "FALSE" if !self.followed_by_open_paren() => {
                return if word.eq_ignore_ascii_case("TRUE") {
                    TokenTag::True
                } else {
                    TokenTag::False
                };
            }
            _ => {}
        }
        if self.followed_by_open_paren() {
            TokenTag::Function
        } else {
            TokenTag::TableOrVariable
        }
    }

    fn followed_by_open_paren(&self) -> bool {
        self.chars[self.pos..]
            .iter()
            .find(|ch| !ch.is_whitespace())
            .is_some_and(|ch| *ch == '(')
    }
}

/// Tokens collected once for linked navigation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenList {
    tokens: Arc<[DaxToken]>,
}

impl TokenList {
    pub fn new(expression: &str) -> Self {
        Self {
            tokens: tokenize(expression).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn cursor(&self, index: usize) -> Option<TokenCursor> {
        (index < self.tokens.len()).then(|| TokenCursor {
            tokens: Arc::clone(&self.tokens),
            index,
        })
    }

    pub fn cursors(&self) -> impl Iterator<Item = TokenCursor> + '_ {
        (0..self.tokens.len()).filter_map(|index| self.cursor(index))
    }
}

/// One token with access to its neighbours.
#[derive(Debug, Clone)]
pub struct TokenCursor {
    tokens: Arc<[DaxToken]>,
    index: usize,
}

impl TokenCursor {
    pub fn token(&self) -> &DaxToken {
        &self.tokens[self.index]
    }

    pub fn tag(&self) -> TokenTag {
        self.token().tag
    }

    pub fn text(&self) -> &str {
        &self.token().text
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn next(&self) -> Option<TokenCursor> {
        let index = self.index + 1;
        (index < self.tokens.len()).then(|| TokenCursor {
            tokens: Arc::clone(&self.tokens),
            index,
        })
    }

    pub fn previous(&self) -> Option<TokenCursor> {
        self.index.checked_sub(1).map(|index| TokenCursor {
            tokens: Arc::clone(&self.tokens),
            index,
        })
    }
}

impl PartialEq for TokenCursor {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.tokens, &other.tokens) && self.index == other.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(expression: &str) -> Vec<TokenTag> {
        tokenize(expression).map(|token| token.tag).collect()
    }

    #[test]
    fn classifies_references_and_functions() {
        assert_eq!(
            tags("SUM ( 'Sales'[Amount] ) / [Total]"),
            vec![
                TokenTag::Function,
                TokenTag::OpenParens,
                TokenTag::Table,
                TokenTag::ColumnOrMeasure,
                TokenTag::CloseParens,
                TokenTag::Div,
                TokenTag::ColumnOrMeasure,
            ]
        );
    }

    #[test]
    fn division_inside_strings_and_comments_is_not_a_token() {
        let expression = "\"a/b\" // x / y\n & /* 1/2 */ [M]";
        assert!(!tags(expression).contains(&TokenTag::Div));
    }

    #[test]
    fn literals() {
        assert_eq!(
            tags("1 + 2.5 - 1e3 & \"x\"\"y\""),
            vec![
                TokenTag::IntegerLiteral,
                TokenTag::Plus,
                TokenTag::RealLiteral,
                TokenTag::Minus,
                TokenTag::RealLiteral,
                TokenTag::Concat,
                TokenTag::StringLiteral,
            ]
        );
    }

    #[test]
    fn var_return_blocks() {
        assert_eq!(
            tags("VAR x = 1 RETURN x"),
            vec![
                TokenTag::Var,
                TokenTag::TableOrVariable,
                TokenTag::Eq,
                TokenTag::IntegerLiteral,
                TokenTag::Return,
                TokenTag::TableOrVariable,
            ]
        );
    }

    #[test]
    fn stream_is_restartable() {
        let stream = tokenize("DIVIDE([A], [B])");
        let first: Vec<_> = stream.clone().collect();
        let second: Vec<_> = stream.collect();
        assert_eq!(first, second);
        assert_eq!(first[0].text, "DIVIDE");
    }

    #[test]
    fn cursor_links_neighbours() {
        let list = TokenList::new("[A] / [B]");
        let div = list.cursor(1).expect("division");
        assert_eq!(div.tag(), TokenTag::Div);
        assert_eq!(div.previous().expect("previous").text(), "[A]");
        assert_eq!(div.next().expect("next").text(), "[B]");
        assert!(list.cursor(0).expect("first").previous().is_none());
        assert!(list.cursor(2).expect("last").next().is_none());
    }

    #[test]
    fn tag_names_round_trip() {
        for tag in TokenTag::ALL {
            assert_eq!(TokenTag::parse(tag.as_str()), Some(tag));
        }
    }
}
