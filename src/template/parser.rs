//! Template tokenizer and parser

use crate::template::functions::Func;
use crate::template::{Command, Operand, Segment, TemplateError};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Field(String),
    Str(String),
    Int(i64),
    Ident(String),
    Pipe,
}

/// Splits a template into literal and `{{ ... }}` segments
pub(crate) fn parse_segments(source: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut rest = source;
    let mut offset = 0;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            segments.push(Segment::Literal(rest[..start].to_string()));
        }
        let body_start = start + 2;
        let end = find_close(&rest[body_start..])
            .ok_or(TemplateError::Unclosed(offset + start))?;
        let expr = &rest[body_start..body_start + end];
        segments.push(Segment::Pipeline(parse_pipeline(expr, offset + start)?));

        let consumed = body_start + end + 2;
        rest = &rest[consumed..];
        offset += consumed;
    }

    if !rest.is_empty() {
        segments.push(Segment::Literal(rest.to_string()));
    }
    Ok(segments)
}

/// Finds the closing `}}`, ignoring braces inside string literals
fn find_close(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' && q == b'"' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => {
                if b == b'"' || b == b'`' {
                    quote = Some(b);
                } else if b == b'}' && bytes.get(i + 1) == Some(&b'}') {
                    return Some(i);
                }
            }
        }
        i += 1;
    }
    None
}

fn tokenize(expr: &str) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut chars = expr.char_indices().peekable();

    while let Some(&(_, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        match c {
            '|' => {
                chars.next();
                tokens.push(Token::Pipe);
            }
            '"' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some((_, ch)) = chars.next() {
                    match ch {
                        '\\' => match chars.next() {
                            Some((_, 'n')) => value.push('\n'),
                            Some((_, 't')) => value.push('\t'),
                            Some((_, other)) => value.push(other),
                            None => break,
                        },
                        '"' => {
                            closed = true;
                            break;
                        }
                        _ => value.push(ch),
                    }
                }
                if !closed {
                    return Err(TemplateError::UnterminatedString(expr.to_string()));
                }
                tokens.push(Token::Str(value));
            }
            '`' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                for (_, ch) in chars.by_ref() {
                    if ch == '`' {
                        closed = true;
                        break;
                    }
                    value.push(ch);
                }
                if !closed {
                    return Err(TemplateError::UnterminatedString(expr.to_string()));
                }
                tokens.push(Token::Str(value));
            }
            _ => {
                let mut word = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_whitespace() || ch == '|' || ch == '"' || ch == '`' {
                        break;
                    }
                    word.push(ch);
                    chars.next();
                }
                tokens.push(classify_word(&word, expr)?);
            }
        }
    }
    Ok(tokens)
}

fn classify_word(word: &str, expr: &str) -> Result<Token, TemplateError> {
    if let Some(name) = word.strip_prefix('.') {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '-');
        if valid {
            return Ok(Token::Field(name.to_string()));
        }
    } else if let Ok(n) = word.parse::<i64>() {
        return Ok(Token::Int(n));
    } else if word.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Ok(Token::Ident(word.to_string()));
    }
    Err(TemplateError::UnexpectedToken {
        token: word.to_string(),
        expr: expr.to_string(),
    })
}

fn parse_pipeline(expr: &str, at: usize) -> Result<Vec<Command>, TemplateError> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err(TemplateError::EmptyExpression(at));
    }

    let mut commands = Vec::new();
    for (index, stage) in tokens.split(|t| *t == Token::Pipe).enumerate() {
        let piped = index > 0;
        commands.push(parse_command(stage, piped, expr)?);
    }
    Ok(commands)
}

fn parse_command(stage: &[Token], piped: bool, expr: &str) -> Result<Command, TemplateError> {
    let unexpected = |token: String| TemplateError::UnexpectedToken {
        token,
        expr: expr.to_string(),
    };

    let (head, rest) = match stage.split_first() {
        Some(split) => split,
        None => return Err(unexpected("|".to_string())),
    };

    match head {
        Token::Ident(name) => {
            let func = Func::from_name(name)
                .ok_or_else(|| TemplateError::UnknownFunction(name.clone()))?;
            let args = rest
                .iter()
                .map(|t| match t {
                    Token::Field(f) => Ok(Operand::Field(f.clone())),
                    Token::Str(s) => Ok(Operand::Str(s.clone())),
                    Token::Int(n) => Ok(Operand::Int(*n)),
                    Token::Ident(i) => Err(unexpected(i.clone())),
                    Token::Pipe => Err(unexpected("|".to_string())),
                })
                .collect::<Result<Vec<_>, _>>()?;

            let got = args.len() + usize::from(piped);
            if got != func.arity() {
                return Err(TemplateError::Arity {
                    name: name.clone(),
                    expected: func.arity(),
                    got,
                });
            }
            Ok(Command::Call { func, args })
        }
        operand if !piped && rest.is_empty() => Ok(Command::Operand(match operand {
            Token::Field(f) => Operand::Field(f.clone()),
            Token::Str(s) => Operand::Str(s.clone()),
            Token::Int(n) => Operand::Int(*n),
            _ => return Err(unexpected(format!("{:?}", operand))),
        })),
        other => Err(unexpected(format!("{:?}", other))),
    }
}
