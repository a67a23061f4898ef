//! Parser and serializer for semicolon-delimited attribute lists.
//!
//! Both the `Autocrypt` and the `Autocrypt-Gossip` header values are
//! `key=value; key=value` lists with a small quoting rule: inside a
//! double-quoted region `;` and `=` are literal text. Quote characters are
//! retained in the output, not stripped.

use std::mem;

/// Attribute parsing errors.
///
/// These are recoverable: a message-level caller treats a header that fails
/// to parse as absent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Empty segment or a value without a key, e.g. `=value`.
    #[error("Attribute name can not be empty")]
    EmptyAttributeName,

    /// End of input reached inside a quoted region.
    #[error("Unexpected end (quotation not closed)")]
    UnclosedQuotation,
}

pub type Result<T> = std::result::Result<T, Error>;

/// A single `key` or `key=value` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key: String,

    /// `None` if the attribute had no `=` at all,
    /// `Some("")` if the value was empty.
    pub value: Option<String>,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Attribute {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    fn formatted(&self) -> String {
        match &self.value {
            Some(value) => format!("{}={}", self.key, value),
            None => self.key.clone(),
        }
    }
}

/// Parses an attribute list, preserving attribute order.
///
/// The first unquoted `=` within an attribute switches from key to value
/// accumulation. Leading whitespace before a key is discarded; whitespace
/// after `=` or inside quotes is preserved. A trailing attribute without a
/// closing `;` is included.
pub fn parse(input: &str) -> Result<Vec<Attribute>> {
    let mut attributes = Vec::new();
    let mut key = String::new();
    let mut value: Option<String> = None;
    let mut in_quote = false;

    for c in input.chars() {
        if !in_quote {
            if c == ';' {
                attributes.push(build(&mut key, &mut value)?);
                continue;
            }
            if c == '=' && value.is_none() {
                value = Some(String::new());
                continue;
            }
        }
        if c == '"' {
            in_quote = !in_quote;
        }
        match value {
            Some(ref mut value) => value.push(c),
            None => {
                if !c.is_whitespace() || !key.is_empty() {
                    key.push(c);
                }
            }
        }
    }

    if in_quote {
        return Err(Error::UnclosedQuotation);
    }
    if !key.is_empty() || value.is_some() {
        attributes.push(build(&mut key, &mut value)?);
    }
    Ok(attributes)
}

fn build(key: &mut String, value: &mut Option<String>) -> Result<Attribute> {
    if key.is_empty() {
        return Err(Error::EmptyAttributeName);
    }
    Ok(Attribute {
        key: mem::take(key),
        value: value.take(),
    })
}

/// Serializes attributes, joining `key=value` pairs with `"; "`.
///
/// No quoting is applied on output; producers only emit base64 key data and
/// fixed tokens, which never need it.
pub fn format(attributes: &[Attribute]) -> String {
    attributes
        .iter()
        .map(Attribute::formatted)
        .collect::<Vec<String>>()
        .join("; ")
}
