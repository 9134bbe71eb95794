use indexmap::IndexMap;
use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Token, Tokenizer};

use crate::error::{Error, Result};
use crate::value::Value;

/// Rewrite `?` placeholders into the generator's style. Existing `$n` placeholders are left alone.
pub fn replace_placeholders<T: Iterator<Item = String>>(
    sql: &str,
    placeholder_generator: &mut T,
) -> Result<(String, usize)> {
    let mut placeholder_count = 0usize;
    let dialect = GenericDialect {};
    let tokens = Tokenizer::new(&dialect, sql).tokenize()?;
    let mut buf = String::with_capacity(sql.len() + 16);
    for tok in &tokens {
        match tok {
            Token::Placeholder(p) if p.starts_with('$') => {
                let n = p[1..].parse::<usize>().map_err(|_| {
                    Error::query(format!("Failed to parse placeholder during query tokenization. Value was: {p}"))
                })?;
                buf.push_str(p);
                placeholder_count = std::cmp::max(placeholder_count, n);
            }
            Token::Placeholder(p) if p == "?" => {
                buf.push_str(&next_placeholder(placeholder_generator)?);
                placeholder_count += 1;
            }
            Token::Char('?') => {
                buf.push_str(&next_placeholder(placeholder_generator)?);
                placeholder_count += 1;
            }
            _ => buf.push_str(&tok.to_string()),
        }
    }
    Ok((buf, placeholder_count))
}

/// Rewrite `:name` placeholders into positional ones, collecting the bound values in order.
///
/// A name may appear more than once; each occurrence binds its value again.
pub fn bind_named_placeholders<T: Iterator<Item = String>>(
    sql: &str,
    params: &IndexMap<String, Value>,
    placeholder_generator: &mut T,
) -> Result<(String, Vec<Value>)> {
    let dialect = GenericDialect {};
    let tokens = Tokenizer::new(&dialect, sql).tokenize()?;
    let mut buf = String::with_capacity(sql.len() + 16);
    let mut args = Vec::with_capacity(params.len());
    let mut it = tokens.iter().peekable();
    while let Some(tok) = it.next() {
        let name = match tok {
            Token::Placeholder(p) if p.starts_with(':') && p.len() > 1 => Some(p[1..].to_string()),
            Token::Colon => match it.peek() {
                Some(Token::Word(w)) if w.quote_style.is_none() => {
                    let name = w.value.clone();
                    it.next();
                    Some(name)
                }
                _ => None,
            },
            _ => None,
        };
        match name {
            Some(name) => {
                let value = params
                    .get(&name)
                    .ok_or_else(|| Error::query(format!("No value bound for placeholder :{name}")))?;
                buf.push_str(&next_placeholder(placeholder_generator)?);
                args.push(value.clone());
            }
            None => buf.push_str(&tok.to_string()),
        }
    }
    Ok((buf, args))
}

fn next_placeholder<T: Iterator<Item = String>>(placeholder_generator: &mut T) -> Result<String> {
    placeholder_generator
        .next()
        .ok_or_else(|| Error::query("Ran out of placeholders while building query"))
}
