//! GraphQL Parser
//!
//! Parses executable GraphQL documents into the [`Document`] AST.
//!
//! Every parser consumes the ignored tokens (whitespace, commas, `#` comments)
//! that follow it, so combinators can be chained without explicit spacing.

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, digit1, one_of, satisfy},
    combinator::{map, map_opt, opt, recognize, value},
    error::ErrorKind,
    multi::{many0, many1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::graphql::ast::*;
use crate::graphql::error::ParseError;

type ParseResult<'a, T> = IResult<&'a str, T>;

/// Deepest bracket nesting accepted; the parser recurses once per level
pub const MAX_DEPTH: usize = 64;

/// Parse query text into a document
pub fn parse(query: &str) -> Result<Document, ParseError> {
    check_depth(query)?;

    match document(query) {
        Ok(("", doc)) => Ok(doc),
        Ok((rest, _)) => Err(unexpected(query, rest)),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(unexpected(query, e.input)),
        Err(nom::Err::Incomplete(_)) => Err(ParseError::new("Unexpected <EOF>", query.len())),
    }
}

/// Reject text nesting `{`, `[` or `(` deeper than [`MAX_DEPTH`] before any
/// recursive descent starts. Strings and comments are skipped.
fn check_depth(query: &str) -> Result<(), ParseError> {
    let mut depth = 0usize;
    let mut chars = query.char_indices();

    while let Some((offset, c)) = chars.next() {
        match c {
            '{' | '[' | '(' => {
                depth += 1;
                if depth > MAX_DEPTH {
                    return Err(ParseError::new("Query is nested too deeply", offset));
                }
            }
            '}' | ']' | ')' => depth = depth.saturating_sub(1),
            '#' => {
                for (_, c) in chars.by_ref() {
                    if c == '\n' || c == '\r' {
                        break;
                    }
                }
            }
            '"' => {
                while let Some((_, c)) = chars.next() {
                    match c {
                        '\\' => {
                            chars.next();
                        }
                        '"' | '\n' | '\r' => break,
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    Ok(())
}

fn unexpected(query: &str, rest: &str) -> ParseError {
    let offset = query.len() - rest.len();
    match rest.chars().next() {
        Some(c) => ParseError::new(format!("Unexpected character {:?}", c), offset),
        None => ParseError::new("Unexpected <EOF>", offset),
    }
}

fn fail(input: &str, kind: ErrorKind) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Error(nom::error::Error::new(input, kind))
}

/// Whitespace, commas, byte order marks and comments
fn ignored(input: &str) -> ParseResult<'_, ()> {
    value(
        (),
        many0(alt((
            take_while1(|c: char| c.is_whitespace() || c == ',' || c == '\u{feff}'),
            recognize(pair(
                char('#'),
                take_while(|c: char| c != '\n' && c != '\r'),
            )),
        ))),
    )(input)
}

/// Punctuator followed by ignored tokens
fn token<'a>(c: char) -> impl FnMut(&'a str) -> ParseResult<'a, char> {
    terminated(char(c), ignored)
}

fn name(input: &str) -> ParseResult<'_, &str> {
    recognize(pair(
        satisfy(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

fn name_token(input: &str) -> ParseResult<'_, &str> {
    terminated(name, ignored)(input)
}

fn document(input: &str) -> ParseResult<'_, Document> {
    let (input, _) = ignored(input)?;
    let (input, definitions) = many1(operation_definition)(input)?;
    Ok((input, Document { definitions }))
}

/// Operation with keyword, or the `{ ... }` query shorthand
fn operation_definition(input: &str) -> ParseResult<'_, OperationDefinition> {
    if input.starts_with('{') {
        let (input, selection_set) = selection_set(input)?;
        return Ok((
            input,
            OperationDefinition {
                kind: OperationKind::Query,
                name: None,
                variables: Vec::new(),
                selection_set,
            },
        ));
    }

    let (input, kind) = map_opt(name_token, OperationKind::from_keyword)(input)?;
    let (input, op_name) = opt(name_token)(input)?;
    let (input, variables) = opt(variable_definitions)(input)?;
    let (input, selection_set) = selection_set(input)?;

    Ok((
        input,
        OperationDefinition {
            kind,
            name: op_name.map(str::to_string),
            variables: variables.unwrap_or_default(),
            selection_set,
        },
    ))
}

fn variable_definitions(input: &str) -> ParseResult<'_, Vec<VariableDefinition>> {
    delimited(token('('), many1(variable_definition), token(')'))(input)
}

fn variable_definition(input: &str) -> ParseResult<'_, VariableDefinition> {
    let (input, var_name) = preceded(char('$'), name_token)(input)?;
    let (input, _) = token(':')(input)?;
    let (input, var_type) = type_ref(input)?;
    let (input, default_value) = opt(preceded(token('='), input_value))(input)?;

    Ok((
        input,
        VariableDefinition {
            name: var_name.to_string(),
            var_type,
            default_value,
        },
    ))
}

fn type_ref(input: &str) -> ParseResult<'_, TypeRef> {
    let (input, base) = alt((
        map(name_token, |n: &str| TypeRef::Named(n.to_string())),
        map(delimited(token('['), type_ref, token(']')), |t| {
            TypeRef::List(Box::new(t))
        }),
    ))(input)?;
    let (input, bang) = opt(token('!'))(input)?;

    let resolved = match bang {
        Some(_) => TypeRef::NonNull(Box::new(base)),
        None => base,
    };
    Ok((input, resolved))
}

fn selection_set(input: &str) -> ParseResult<'_, Vec<Field>> {
    delimited(token('{'), many1(field), token('}'))(input)
}

/// `alias: name(args) { ... }`
fn field(input: &str) -> ParseResult<'_, Field> {
    let (input, first) = name_token(input)?;
    let (input, second) = opt(preceded(token(':'), name_token))(input)?;
    let (alias, field_name) = match second {
        Some(n) => (Some(first.to_string()), n),
        None => (None, first),
    };
    let (input, arguments) = opt(arguments)(input)?;
    let (input, selection_set) = opt(selection_set)(input)?;

    Ok((
        input,
        Field {
            alias,
            name: field_name.to_string(),
            arguments: arguments.unwrap_or_default(),
            selection_set: selection_set.unwrap_or_default(),
        },
    ))
}

fn arguments(input: &str) -> ParseResult<'_, Vec<(String, InputValue)>> {
    delimited(token('('), many1(argument), token(')'))(input)
}

fn argument(input: &str) -> ParseResult<'_, (String, InputValue)> {
    pair(
        map(name_token, str::to_string),
        preceded(token(':'), input_value),
    )(input)
}

fn input_value(input: &str) -> ParseResult<'_, InputValue> {
    terminated(
        alt((
            variable,
            number,
            string_value,
            list_value,
            object_value,
            name_value,
        )),
        ignored,
    )(input)
}

fn variable(input: &str) -> ParseResult<'_, InputValue> {
    map(preceded(char('$'), name), |n: &str| {
        InputValue::Variable(n.to_string())
    })(input)
}

fn number(input: &str) -> ParseResult<'_, InputValue> {
    let (rest, text) = recognize(tuple((
        opt(char('-')),
        digit1,
        opt(pair(char('.'), digit1)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;

    let parsed = if text.contains(|c| matches!(c, '.' | 'e' | 'E')) {
        text.parse::<f64>().ok().map(InputValue::Float)
    } else {
        text.parse::<i64>().ok().map(InputValue::Int)
    };

    match parsed {
        Some(v) => Ok((rest, v)),
        None => Err(fail(input, ErrorKind::Digit)),
    }
}

/// Double-quoted string with JSON-style escapes. Block strings are not supported.
fn string_value(input: &str) -> ParseResult<'_, InputValue> {
    let (mut rest, _) = char('"')(input)?;
    let mut out = String::new();

    loop {
        let mut chars = rest.chars();
        match chars.next() {
            None | Some('\n') | Some('\r') => return Err(fail(rest, ErrorKind::Char)),
            Some('"') => return Ok((chars.as_str(), InputValue::String(out))),
            Some('\\') => {
                let unescaped = match chars.next() {
                    Some('"') => '"',
                    Some('\\') => '\\',
                    Some('/') => '/',
                    Some('b') => '\u{8}',
                    Some('f') => '\u{c}',
                    Some('n') => '\n',
                    Some('r') => '\r',
                    Some('t') => '\t',
                    Some('u') => {
                        let hex: String = chars.by_ref().take(4).collect();
                        let decoded = if hex.chars().count() == 4 {
                            u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32)
                        } else {
                            None
                        };
                        match decoded {
                            Some(c) => c,
                            None => return Err(fail(rest, ErrorKind::Escaped)),
                        }
                    }
                    _ => return Err(fail(rest, ErrorKind::Escaped)),
                };
                out.push(unescaped);
                rest = chars.as_str();
            }
            Some(c) => {
                out.push(c);
                rest = chars.as_str();
            }
        }
    }
}

fn list_value(input: &str) -> ParseResult<'_, InputValue> {
    map(
        delimited(token('['), many0(input_value), char(']')),
        InputValue::List,
    )(input)
}

fn object_value(input: &str) -> ParseResult<'_, InputValue> {
    map(
        delimited(
            token('{'),
            many0(pair(
                map(name_token, str::to_string),
                preceded(token(':'), input_value),
            )),
            char('}'),
        ),
        InputValue::Object,
    )(input)
}

fn name_value(input: &str) -> ParseResult<'_, InputValue> {
    map(name, |n: &str| match n {
        "true" => InputValue::Boolean(true),
        "false" => InputValue::Boolean(false),
        "null" => InputValue::Null,
        other => InputValue::Enum(other.to_string()),
    })(input)
}
