//! Character-driven reader from source text to [`Node`] trees.
//!
//! There is no token stream: each sub-parser consumes a prefix of the
//! remaining input and hands back the unconsumed suffix, nom style.
//! Arguments are tried in a fixed priority order (double-quoted string,
//! single-quoted string, number, symbol, nested application).

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, digit1},
    combinator::{opt, recognize},
    error::ErrorKind,
    sequence::{delimited, pair},
};

use crate::ast::{Node, NumberType, Value};
use crate::{Error, MAX_PARSE_DEPTH, SyntaxError, SyntaxErrorKind};

/// Reader options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseConfig {
    /// Treat `;` outside string literals as the start of a line comment.
    /// Off by default: `;` is an ordinary symbol character.
    pub handle_comments: bool,
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_symbol_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | ',')
}

fn whitespace0(input: &str) -> IResult<&str, &str> {
    take_while(char::is_whitespace).parse(input)
}

/// `"..."`, taken verbatim
fn parse_double_quoted(input: &str) -> IResult<&str, Node> {
    let (input, text) =
        delimited(char('"'), take_while(|c: char| c != '"'), char('"')).parse(input)?;
    Ok((input, Node::Literal(Value::String(text.to_owned()))))
}

/// `'...'`, taken verbatim
fn parse_single_quoted(input: &str) -> IResult<&str, Node> {
    let (input, text) =
        delimited(char('\''), take_while(|c: char| c != '\''), char('\'')).parse(input)?;
    Ok((input, Node::Literal(Value::String(text.to_owned()))))
}

/// Optional `-` then digits, ending at a word boundary
fn parse_number(input: &str) -> IResult<&str, Node> {
    let (remaining, number_str) = recognize(pair(opt(char('-')), digit1)).parse(input)?;

    // `123abc` is a symbol, not a number followed by a symbol
    if remaining.chars().next().is_some_and(is_word_char) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Digit,
        )));
    }

    match number_str.parse::<NumberType>() {
        Ok(n) => Ok((remaining, Node::Literal(Value::Number(n)))),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Digit,
        ))),
    }
}

/// Run of characters other than whitespace, parentheses and commas
fn parse_symbol(input: &str) -> IResult<&str, Node> {
    let (input, name) = take_while1(is_symbol_char).parse(input)?;
    Ok((input, Node::Symbol(name.to_owned())))
}

/// One argument of an application, in priority order
fn parse_arg(input: &str, depth: usize) -> IResult<&str, Node> {
    alt((
        parse_double_quoted,
        parse_single_quoted,
        parse_number,
        parse_symbol,
        |input| parse_application(input, depth + 1),
    ))
    .parse(input)
    .map_err(|err| match err {
        // Nothing matched here; stop backtracking and report this position
        nom::Err::Error(_) => nom::Err::Failure(nom::error::Error::new(input, ErrorKind::Alt)),
        other => other,
    })
}

/// `(` element+ `)`
fn parse_application(input: &str, depth: usize) -> IResult<&str, Node> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        )));
    }

    let (mut remaining, _) = char('(').parse(input)?;
    let mut elements = Vec::new();

    loop {
        let (rest, _) = whitespace0(remaining)?;
        match rest.chars().next() {
            None => {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    rest,
                    ErrorKind::Eof,
                )));
            }
            Some(')') if elements.is_empty() => {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    input,
                    ErrorKind::Verify,
                )));
            }
            Some(')') => {
                let (rest, _) = char(')').parse(rest)?;
                return Ok((rest, Node::Application(elements)));
            }
            Some(_) => {
                let (rest, element) = parse_arg(rest, depth)?;
                elements.push(element);
                remaining = rest;
            }
        }
    }
}

/// The token (or single character) at the start of `rest`, for error reports
fn offending_token(rest: &str) -> Option<String> {
    let token: String = rest.chars().take_while(|c| is_symbol_char(*c)).collect();
    if token.is_empty() {
        rest.chars().next().map(String::from)
    } else {
        Some(token)
    }
}

/// Convert a nom error into a SyntaxError positioned within `input`
fn to_syntax_error(input: &str, error: &nom::error::Error<&str>) -> SyntaxError {
    let offset = input.len().saturating_sub(error.input.len());
    let (kind, message) = match error.code {
        ErrorKind::Eof => (
            SyntaxErrorKind::Incomplete,
            "Unexpected end of input: missing closing parenthesis".to_owned(),
        ),
        ErrorKind::Verify => (
            SyntaxErrorKind::EmptyApplication,
            "Empty application '()'".to_owned(),
        ),
        ErrorKind::TooLarge => (
            SyntaxErrorKind::TooDeeplyNested,
            format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
        ),
        ErrorKind::Char if offset == 0 => {
            (SyntaxErrorKind::InvalidSyntax, "Expected '('".to_owned())
        }
        _ => (SyntaxErrorKind::InvalidSyntax, "Unexpected syntax".to_owned()),
    };
    SyntaxError::with_context(kind, message, input, offset, offending_token(error.input))
}

/// Remove `;` line comments that are outside string literals.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut open_quote: Option<char> = None;
    let mut in_comment = false;
    let mut prev: Option<char> = None;

    for c in source.chars() {
        if in_comment {
            if c == '\n' {
                in_comment = false;
                out.push(c);
            }
            prev = Some(c);
            continue;
        }
        match open_quote {
            Some(quote) if c == quote => open_quote = None,
            Some(_) => {}
            // Quotes only open a string at the start of a token
            None if (c == '"' || c == '\'') && prev.is_none_or(|p| !is_symbol_char(p)) => {
                open_quote = Some(c);
            }
            None if c == ';' => {
                in_comment = true;
                prev = Some(c);
                continue;
            }
            None => {}
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

/// Parse a complete program: exactly one parenthesized form, surrounded by
/// optional whitespace.
pub fn parse(source: &str) -> Result<Node, Error> {
    parse_with_config(source, &ParseConfig::default())
}

/// Parse a complete program with explicit reader options.
pub fn parse_with_config(source: &str, config: &ParseConfig) -> Result<Node, Error> {
    let stripped;
    let text = if config.handle_comments {
        stripped = strip_comments(source);
        stripped.trim()
    } else {
        source.trim()
    };

    match parse_application(text, 0) {
        Ok(("", node)) => Ok(node),
        Ok((rest, _)) => {
            let rest = rest.trim_start();
            Err(Error::SyntaxError(SyntaxError::with_context(
                SyntaxErrorKind::TrailingContent,
                "Unexpected content after the top-level form",
                text,
                text.len() - rest.len(),
                offending_token(rest),
            )))
        }
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
            Err(Error::SyntaxError(to_syntax_error(text, &e)))
        }
        Err(nom::Err::Incomplete(_)) => Err(Error::SyntaxError(SyntaxError::from_message(
            SyntaxErrorKind::Incomplete,
            "Incomplete input",
        ))),
    }
}
