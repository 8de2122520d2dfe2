//! The table-walking runtime tokenizer.

use crate::table::{END_OF_TOKEN, LexerTable, NO_MATCH};

/// No rule matches the input at this position. Fatal for the current
/// tokenization; the caller decides whether to [`Lexer::skip`] a character
/// and resynchronize or abort the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no rule matches the input at offset {offset}")]
pub struct LexError {
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenType {
    /// End of the input stream.
    Eof,
    /// A token classified by the named rule's token type.
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    /// Character offset of the first matched character.
    pub offset: usize,
    pub token_type: TokenType,
}

impl Token {
    #[inline]
    #[must_use]
    pub fn is_eof(&self) -> bool { matches!(self.token_type, TokenType::Eof) }
}

/// Maximal-munch tokenizer over a compiled table. The table is never
/// mutated, so any number of lexers may share one.
#[derive(Debug)]
pub struct Lexer<'a> {
    table: &'a LexerTable,
    input: Vec<char>,
    offset: usize,
    done: bool,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(table: &'a LexerTable, input: &str) -> Self {
        Self {
            table,
            input: input.chars().collect(),
            offset: 0,
            done: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn offset(&self) -> usize { self.offset }

    /// Skips one character so the caller can resynchronize after a
    /// [`LexError`].
    pub fn skip(&mut self) {
        if self.offset < self.input.len() {
            self.offset += 1;
        }
    }

    fn scan(&mut self) -> Result<Token, LexError> {
        let start = self.offset;
        let mut state = self.table.initial_offset();
        let mut pos = start;
        let mut best: Option<(usize, usize)> = None;

        while let Some(&c) = self.input.get(pos) {
            let column = self.table.column(c);
            let mut cell = self.table.cell(state, column);
            if cell == NO_MATCH && column != 0 {
                // no transition for the exact symbol, fall back to the
                // wildcard column
                cell = self.table.cell(state, 0);
            }
            if cell == NO_MATCH || cell == END_OF_TOKEN {
                break;
            }

            state = usize::try_from(cell).unwrap_or_else(|_| unreachable!());
            pos += 1;
            if self.table.token_type_at(state).is_some() {
                best = Some((pos, state));
            }
        }

        let Some((end, accept)) = best else {
            return Err(LexError { offset: start });
        };

        self.offset = end;
        let token_type = self
            .table
            .token_type_at(accept)
            .unwrap_or_else(|| unreachable!())
            .to_owned();
        Ok(Token {
            text: self.input[start..end].iter().collect(),
            offset: start,
            token_type: TokenType::Name(token_type),
        })
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.offset >= self.input.len() {
            self.done = true;
            return Some(Ok(Token {
                text: String::new(),
                offset: self.offset,
                token_type: TokenType::Eof,
            }));
        }

        Some(self.scan())
    }
}
