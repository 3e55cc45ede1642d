//! Label selector translation.
//!
//! Each requirement becomes an existence test against the label index,
//! correlated on the record's `(cluster_name, uid)`. The requirement set is
//! the conjunction of those tests. Not-equals and not-in are plain
//! non-existence tests, so records lacking the label entirely match them.

use crate::error::{ArchiveError, ArchiveResult};
use crate::expr::{Expr, LabelTest};
use wfarchive_core::{LabelRequirement, Operator};

/// Translate a requirement set into a single predicate.
pub fn label_predicate(requirements: &[LabelRequirement]) -> ArchiveResult<Expr> {
    let terms = requirements
        .iter()
        .map(requirement_predicate)
        .collect::<ArchiveResult<Vec<_>>>()?;
    Ok(Expr::all(terms))
}

fn requirement_predicate(req: &LabelRequirement) -> ArchiveResult<Expr> {
    if req.key.is_empty() {
        return Err(ArchiveError::UnsupportedSelector(
            "label key must not be empty".to_string(),
        ));
    }

    let (present, test) = match req.operator {
        Operator::Exists => (true, LabelTest::Any),
        Operator::DoesNotExist => (false, LabelTest::Any),
        Operator::Equals => (true, LabelTest::Equals(single_value(req)?.to_string())),
        Operator::NotEquals => (false, LabelTest::Equals(single_value(req)?.to_string())),
        Operator::In => (true, LabelTest::In(value_set(req)?)),
        Operator::NotIn => (false, LabelTest::In(value_set(req)?)),
        Operator::GreaterThan => (true, LabelTest::GreaterThan(integer_value(req)?)),
        Operator::LessThan => (true, LabelTest::LessThan(integer_value(req)?)),
    };

    Ok(Expr::Label {
        present,
        key: req.key.clone(),
        test,
    })
}

fn single_value(req: &LabelRequirement) -> ArchiveResult<&str> {
    match req.values.as_slice() {
        [value] => Ok(value),
        values => Err(ArchiveError::UnsupportedSelector(format!(
            "operator {} on {:?} requires exactly one value, got {}",
            req.operator,
            req.key,
            values.len()
        ))),
    }
}

fn value_set(req: &LabelRequirement) -> ArchiveResult<Vec<String>> {
    if req.values.is_empty() {
        return Err(ArchiveError::UnsupportedSelector(format!(
            "operator {} on {:?} requires at least one value",
            req.operator, req.key
        )));
    }
    let mut values = req.values.clone();
    values.sort();
    values.dedup();
    Ok(values)
}

fn integer_value(req: &LabelRequirement) -> ArchiveResult<i64> {
    let value = single_value(req)?;
    value.parse().map_err(|_| {
        ArchiveError::UnsupportedSelector(format!(
            "operator {} on {:?} requires an integer value, got {value:?}",
            req.operator, req.key
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_requirements_match_everything() {
        assert_eq!(label_predicate(&[]).unwrap(), Expr::True);
    }

    #[test]
    fn test_requirements_are_conjoined() {
        let expr = label_predicate(&[
            LabelRequirement::equals("a", "1"),
            LabelRequirement::exists("b"),
        ])
        .unwrap();
        assert_eq!(
            expr,
            Expr::And(vec![
                Expr::Label {
                    present: true,
                    key: "a".to_string(),
                    test: LabelTest::Equals("1".to_string()),
                },
                Expr::Label {
                    present: true,
                    key: "b".to_string(),
                    test: LabelTest::Any,
                },
            ])
        );
    }

    #[test]
    fn test_not_equals_is_not_existence_qualified() {
        let expr = label_predicate(&[LabelRequirement::not_equals("a", "1")]).unwrap();
        assert_eq!(
            expr,
            Expr::Label {
                present: false,
                key: "a".to_string(),
                test: LabelTest::Equals("1".to_string()),
            }
        );
    }

    #[test]
    fn test_exists_ignores_values() {
        let req = LabelRequirement::new("a", Operator::Exists, vec!["ignored".to_string()]);
        assert_eq!(
            label_predicate(&[req]).unwrap(),
            Expr::Label {
                present: true,
                key: "a".to_string(),
                test: LabelTest::Any,
            }
        );
    }

    #[test]
    fn test_in_set_is_sorted_and_deduplicated() {
        let expr = label_predicate(&[LabelRequirement::not_in_set("a", ["y", "x", "y"])]).unwrap();
        assert_eq!(
            expr,
            Expr::Label {
                present: false,
                key: "a".to_string(),
                test: LabelTest::In(vec!["x".to_string(), "y".to_string()]),
            }
        );
    }

    #[test]
    fn test_invalid_arity_is_unsupported() {
        let no_value = LabelRequirement::new("a", Operator::Equals, vec![]);
        assert!(matches!(
            label_predicate(&[no_value]),
            Err(ArchiveError::UnsupportedSelector(_))
        ));

        let empty_set = LabelRequirement::new("a", Operator::In, vec![]);
        assert!(label_predicate(&[empty_set]).is_err());

        let not_int = LabelRequirement::new("a", Operator::GreaterThan, vec!["x".to_string()]);
        assert!(label_predicate(&[not_int]).is_err());

        let empty_key = LabelRequirement::exists("");
        assert!(label_predicate(&[empty_key]).is_err());
    }

    #[test]
    fn test_one_bad_requirement_fails_the_set() {
        let reqs = [
            LabelRequirement::equals("a", "1"),
            LabelRequirement::new("b", Operator::NotEquals, vec![]),
        ];
        assert!(label_predicate(&reqs).is_err());
    }
}
