//! Label requirements and label selector parsing.
//!
//! A selector is a comma separated list of requirements, all of which must
//! hold for a workflow to match:
//!
//! ```text
//! env=prod, tier!=cache, team in (infra, data), !canary, retries>2
//! ```

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Operator of a single label requirement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Equals,
    NotEquals,
    Exists,
    DoesNotExist,
    In,
    NotIn,
    GreaterThan,
    LessThan,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::NotEquals => "!=",
            Self::Exists => "exists",
            Self::DoesNotExist => "!",
            Self::In => "in",
            Self::NotIn => "notin",
            Self::GreaterThan => "gt",
            Self::LessThan => "lt",
        }
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "=" | "==" => Ok(Self::Equals),
            "!=" => Ok(Self::NotEquals),
            "exists" => Ok(Self::Exists),
            "!" | "doesnotexist" => Ok(Self::DoesNotExist),
            "in" => Ok(Self::In),
            "notin" => Ok(Self::NotIn),
            "gt" | ">" => Ok(Self::GreaterThan),
            "lt" | "<" => Ok(Self::LessThan),
            other => Err(Error::UnsupportedSelector(format!(
                "operator {other:?} is not supported"
            ))),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One selector clause over a workflow's labels.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LabelRequirement {
    pub key: String,
    pub operator: Operator,
    pub values: Vec<String>,
}

impl LabelRequirement {
    pub fn new(key: impl Into<String>, operator: Operator, values: Vec<String>) -> Self {
        Self {
            key: key.into(),
            operator,
            values,
        }
    }

    pub fn equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, Operator::Equals, vec![value.into()])
    }

    pub fn not_equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, Operator::NotEquals, vec![value.into()])
    }

    pub fn exists(key: impl Into<String>) -> Self {
        Self::new(key, Operator::Exists, Vec::new())
    }

    pub fn does_not_exist(key: impl Into<String>) -> Self {
        Self::new(key, Operator::DoesNotExist, Vec::new())
    }

    pub fn in_set<I, V>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self::new(key, Operator::In, values.into_iter().map(Into::into).collect())
    }

    pub fn not_in_set<I, V>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self::new(
            key,
            Operator::NotIn,
            values.into_iter().map(Into::into).collect(),
        )
    }

    pub fn greater_than(key: impl Into<String>, value: i64) -> Self {
        Self::new(key, Operator::GreaterThan, vec![value.to_string()])
    }

    pub fn less_than(key: impl Into<String>, value: i64) -> Self {
        Self::new(key, Operator::LessThan, vec![value.to_string()])
    }
}

impl fmt::Display for LabelRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
            Operator::In | Operator::NotIn => {
                write!(f, "{} {} ({})", self.key, self.operator, self.values.join(","))
            }
            Operator::GreaterThan => write!(f, "{}>{}", self.key, self.values.join(",")),
            Operator::LessThan => write!(f, "{}<{}", self.key, self.values.join(",")),
            Operator::Equals | Operator::NotEquals => {
                write!(f, "{}{}{}", self.key, self.operator, self.values.join(","))
            }
        }
    }
}

/// Parse a label selector string into its requirements.
///
/// An empty (or all-whitespace) selector yields no requirements.
pub fn parse(selector: &str) -> Result<Vec<LabelRequirement>> {
    split_terms(selector)?
        .into_iter()
        .map(parse_term)
        .collect()
}

/// Split on commas that are not inside a value set.
fn split_terms(selector: &str) -> Result<Vec<&str>> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, c) in selector.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    Error::UnsupportedSelector(format!("unbalanced ')' in {selector:?}"))
                })?
            }
            ',' if depth == 0 => {
                terms.push(&selector[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(Error::UnsupportedSelector(format!(
            "unbalanced '(' in {selector:?}"
        )));
    }
    terms.push(&selector[start..]);

    let terms: Vec<&str> = terms.into_iter().map(str::trim).collect();
    if terms.len() == 1 && terms[0].is_empty() {
        return Ok(Vec::new());
    }
    if terms.iter().any(|t| t.is_empty()) {
        return Err(Error::UnsupportedSelector(format!(
            "empty requirement in {selector:?}"
        )));
    }
    Ok(terms)
}

fn parse_term(term: &str) -> Result<LabelRequirement> {
    if let Some(key) = term.strip_prefix('!') {
        return Ok(LabelRequirement::does_not_exist(validate_key(key.trim())?));
    }

    if let Some((head, rest)) = term.split_once('(') {
        let inner = rest.strip_suffix(')').ok_or_else(|| {
            Error::UnsupportedSelector(format!("expected ')' at the end of {term:?}"))
        })?;
        let mut words = head.split_whitespace();
        let (Some(key), Some(op), None) = (words.next(), words.next(), words.next()) else {
            return Err(Error::UnsupportedSelector(format!(
                "expected '<key> in|notin (<values>)', got {term:?}"
            )));
        };
        let operator = match op.parse::<Operator>()? {
            op @ (Operator::In | Operator::NotIn) => op,
            other => {
                return Err(Error::UnsupportedSelector(format!(
                    "operator {other} does not take a value set"
                )));
            }
        };
        let values: Vec<String> = inner
            .split(',')
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        if values.is_empty() {
            return Err(Error::UnsupportedSelector(format!(
                "operator {operator} requires at least one value"
            )));
        }
        return Ok(LabelRequirement::new(validate_key(key)?, operator, values));
    }

    let Some(idx) = term.find(['=', '!', '<', '>']) else {
        return Ok(LabelRequirement::exists(validate_key(term)?));
    };
    let key = validate_key(term[..idx].trim())?;
    let rest = &term[idx..];
    let symbol = ["==", "!=", "=", ">", "<"]
        .into_iter()
        .find(|s| rest.starts_with(s))
        .ok_or_else(|| Error::UnsupportedSelector(format!("unrecognized operator in {term:?}")))?;
    let operator: Operator = symbol.parse()?;
    let value = rest[symbol.len()..].trim();

    match operator {
        Operator::GreaterThan | Operator::LessThan => {
            let n: i64 = value.parse().map_err(|_| {
                Error::UnsupportedSelector(format!(
                    "operator {operator} requires an integer value, got {value:?}"
                ))
            })?;
            Ok(LabelRequirement::new(key, operator, vec![n.to_string()]))
        }
        _ => Ok(LabelRequirement::new(key, operator, vec![value.to_string()])),
    }
}

fn validate_key(key: &str) -> Result<&str> {
    if key.is_empty()
        || key.contains(char::is_whitespace)
        || key.contains(['=', '!', '<', '>', '(', ')', ','])
    {
        return Err(Error::UnsupportedSelector(format!(
            "invalid label key {key:?}"
        )));
    }
    Ok(key)
}
