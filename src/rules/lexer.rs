/// Modal tokenizer for rule text
///
/// The lexer tracks which part of the rule it is in (header, option keyword,
/// option value, after the closing parenthesis) because the same character
/// means different things in each: `:` is part of a port range in the header
/// but separates keyword and value in the option list.
use crate::error::{RuleError, Result};
use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while1},
    character::complete::{anychar, char},
    combinator::{map, peek, recognize, value},
    multi::many0_count,
    sequence::{delimited, preceded, terminated},
    IResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// Bare word: header field, option keyword or unquoted option value
    Word(&'a str),
    /// Word made only of ASCII digits, raw text kept
    Number(&'a str),
    /// Contents of a quoted string, escapes left in place
    Str(&'a str),
    /// `->`
    Arrow,
    /// `<>`
    BothArrow,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Colon,
    Semicolon,
    Comma,
    Bang,
    /// Any single character that has no meaning at this position
    Other(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Header,
    OptionKey,
    OptionValue,
    Trailer,
}

/// Streaming lexer over a single rule
pub struct Lexer<'a> {
    input: &'a str,
    rest: &'a str,
    state: State,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            rest: input,
            state: State::Header,
        }
    }

    /// Byte offset of the next unread character
    pub fn offset(&self) -> usize {
        self.input.len() - self.rest.len()
    }

    /// Produce the next token, `None` at end of input.
    ///
    /// Every successful call consumes at least one character.
    pub fn next_token(&mut self) -> Result<Option<Token<'a>>> {
        self.rest = self.rest.trim_start();
        let first = match self.rest.chars().next() {
            Some(c) => c,
            None => return Ok(None),
        };

        let lexed = match self.state {
            State::Header => self.lex_header(first),
            State::OptionKey => {
                Ok(lex_option_key(self.rest).unwrap_or_else(|_| other(self.rest, first)))
            }
            State::OptionValue => self.lex_option_value(first),
            State::Trailer => {
                Ok(lex_trailer(self.rest).unwrap_or_else(|_| other(self.rest, first)))
            }
        };

        let (rest, token) = match lexed {
            Ok(ok) => ok,
            Err(e) => {
                self.rest = "";
                return Err(e);
            }
        };

        self.rest = rest;
        self.state = match (self.state, token) {
            (State::Header, Token::LParen) => State::OptionKey,
            (State::OptionKey, Token::Colon) => State::OptionValue,
            (State::OptionKey, Token::RParen) => State::Trailer,
            (State::OptionValue, Token::Bang) => State::OptionValue,
            (State::OptionValue, Token::RParen) => State::Trailer,
            (State::OptionValue, _) => State::OptionKey,
            (state, _) => state,
        };

        Ok(Some(token))
    }

    fn lex_header(&self, first: char) -> Result<(&'a str, Token<'a>)> {
        // A malformed arrow is rejected here; other tokens in the direction
        // slot are rejected by the parser as a syntax error.
        if first == '-' || first == '<' {
            return direction(self.rest).map_err(|_| {
                RuleError::LexError(format!(
                    "invalid direction marker at offset {}",
                    self.offset()
                ))
            });
        }
        Ok(lex_header_token(self.rest).unwrap_or_else(|_| other(self.rest, first)))
    }

    fn lex_option_value(&self, first: char) -> Result<(&'a str, Token<'a>)> {
        match first {
            '"' => quoted(self.rest)
                .map(|(rest, s)| (rest, Token::Str(s)))
                .map_err(|_| {
                    RuleError::LexError(format!(
                        "unterminated quoted string at offset {}",
                        self.offset()
                    ))
                }),
            ';' => Ok((&self.rest[1..], Token::Semicolon)),
            ')' if ends_rule(&self.rest[1..]) => Ok((&self.rest[1..], Token::RParen)),
            '!' if negates_literal(&self.rest[1..]) => Ok((&self.rest[1..], Token::Bang)),
            _ => {
                let (rest, raw) = unquoted_value(self.rest);
                Ok((rest, word_or_number(raw)))
            }
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}

/// Tokenize a whole rule
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>> {
    Lexer::new(input).collect()
}

fn other(rest: &str, first: char) -> (&str, Token<'_>) {
    (&rest[first.len_utf8()..], Token::Other(first))
}

fn word_or_number(raw: &str) -> Token<'_> {
    if raw.bytes().all(|b| b.is_ascii_digit()) {
        Token::Number(raw)
    } else {
        Token::Word(raw)
    }
}

fn direction(input: &str) -> IResult<&str, Token<'_>> {
    alt((
        value(Token::Arrow, tag("->")),
        value(Token::BothArrow, tag("<>")),
    ))(input)
}

fn is_header_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '[' | ']' | ',' | '(' | ')')
}

fn lex_header_token(input: &str) -> IResult<&str, Token<'_>> {
    alt((
        value(Token::LParen, char('(')),
        value(Token::LBracket, char('[')),
        value(Token::RBracket, char(']')),
        value(Token::Comma, char(',')),
        // `!` stands alone only when it negates a bracketed list
        value(Token::Bang, terminated(char('!'), peek(char('[')))),
        map(take_while1(is_header_char), word_or_number),
    ))(input)
}

fn is_keyword_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn lex_option_key(input: &str) -> IResult<&str, Token<'_>> {
    alt((
        value(Token::RParen, char(')')),
        value(Token::Semicolon, char(';')),
        value(Token::Colon, char(':')),
        map(take_while1(is_keyword_char), Token::Word),
    ))(input)
}

fn lex_trailer(input: &str) -> IResult<&str, Token<'_>> {
    value(Token::Semicolon, char(';'))(input)
}

/// Quoted string; a backslash protects the following character
fn quoted(input: &str) -> IResult<&str, &str> {
    delimited(
        char('"'),
        recognize(many0_count(alt((
            is_not("\\\""),
            recognize(preceded(char('\\'), anychar)),
        )))),
        char('"'),
    )(input)
}

/// True when the remaining text is only the end of the rule
fn ends_rule(rest: &str) -> bool {
    matches!(rest.trim(), "" | ";")
}

/// `!` is a separate token only in front of a quoted literal or an empty value
fn negates_literal(rest: &str) -> bool {
    let rest = rest.trim_start();
    rest.is_empty() || rest.starts_with('"') || rest.starts_with(';') || ends_rule(rest)
}

/// Unquoted value: up to the next unescaped `;` or the `)` closing the rule
fn unquoted_value(input: &str) -> (&str, &str) {
    let mut escaped = false;
    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            ';' => return (&input[i..], input[..i].trim_end()),
            ')' if i > 0 && ends_rule(&input[i + 1..]) => {
                return (&input[i..], input[..i].trim_end())
            }
            _ => {}
        }
    }
    ("", input.trim_end())
}
