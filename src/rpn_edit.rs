//! Postfix string programs deriving a destination name from a source filename.
//!
//! `"%s_ntds" + "basename rmext lower"` turns `/cases/DC01.dit` into `dc01_ntds`.

use crate::error::{ImportError, Result};
use regex::Regex;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Word(String),
    Literal(String),
}

fn tokenize(program: &str) -> Result<Vec<Token>> {
    let pattern = Regex::new(r#"'([^']*)'|"([^"]*)"|(\S+)"#)
        .map_err(|e| ImportError::Config(format!("program tokenizer: {}", e)))?;
    Ok(pattern
        .captures_iter(program)
        .filter_map(|caps| {
            if let Some(quoted) = caps.get(1).or_else(|| caps.get(2)) {
                Some(Token::Literal(quoted.as_str().to_string()))
            } else {
                caps.get(3).map(|w| Token::Word(w.as_str().to_string()))
            }
        })
        .collect())
}

fn pop(stack: &mut Vec<String>, word: &str) -> Result<String> {
    stack
        .pop()
        .ok_or_else(|| ImportError::Config(format!("stack underflow at '{}'", word)))
}

fn path_part(value: &str, part: fn(&Path) -> Option<String>) -> String {
    part(Path::new(value)).unwrap_or_default()
}

/// Run `program` with `filename` as the only initial stack item and return the top.
pub fn evaluate(program: &str, filename: &str) -> Result<String> {
    let mut stack = vec![filename.to_string()];
    for token in tokenize(program)? {
        let word = match token {
            Token::Literal(text) => {
                stack.push(text);
                continue;
            }
            Token::Word(word) => word,
        };
        match word.as_str() {
            "upper" => {
                let v = pop(&mut stack, &word)?;
                stack.push(v.to_uppercase());
            }
            "lower" => {
                let v = pop(&mut stack, &word)?;
                stack.push(v.to_lowercase());
            }
            "basename" => {
                let v = pop(&mut stack, &word)?;
                stack.push(path_part(&v, |p| {
                    p.file_name().map(|n| n.to_string_lossy().into_owned())
                }));
            }
            "dirname" => {
                let v = pop(&mut stack, &word)?;
                stack.push(path_part(&v, |p| {
                    p.parent().map(|n| n.to_string_lossy().into_owned())
                }));
            }
            "rmext" => {
                let v = pop(&mut stack, &word)?;
                stack.push(path_part(&v, |p| {
                    Some(p.with_extension("").to_string_lossy().into_owned())
                }));
            }
            "replace" => {
                let replacement = pop(&mut stack, &word)?;
                let pattern = pop(&mut stack, &word)?;
                let subject = pop(&mut stack, &word)?;
                if pattern.is_empty() {
                    stack.push(subject);
                } else {
                    stack.push(subject.replace(&pattern, &replacement));
                }
            }
            "dup" => {
                let v = pop(&mut stack, &word)?;
                stack.push(v.clone());
                stack.push(v);
            }
            "swap" => {
                let top = pop(&mut stack, &word)?;
                let below = pop(&mut stack, &word)?;
                stack.push(top);
                stack.push(below);
            }
            "drop" => {
                pop(&mut stack, &word)?;
            }
            _ => stack.push(word),
        }
    }
    stack
        .pop()
        .ok_or_else(|| ImportError::Config(format!("program '{}' leaves an empty stack", program)))
}

/// `format` with every `%s` replaced by the program's result for `filename`.
pub fn derive_destination(format: &str, program: &str, filename: &str) -> Result<String> {
    Ok(format.replace("%s", &evaluate(program, filename)?))
}
