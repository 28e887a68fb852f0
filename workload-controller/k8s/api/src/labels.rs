use crate::LabelSelector;
use std::collections::{BTreeMap, BTreeSet};

pub type Map = BTreeMap<String, String>;

pub type Expressions = Vec<Expression>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expression {
    key: String,
    operator: Operator,
    values: BTreeSet<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

#[derive(Debug, thiserror::Error)]
#[error("unsupported label selector operator: {0}")]
pub struct InvalidOperator(String);

/// Selects the pods that belong to a workload.
///
/// An empty selector matches all labels.
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct Selector {
    match_labels: Option<Map>,
    match_expressions: Option<Expressions>,
}

// === Selector ===

impl Selector {
    pub fn from_expressions(exprs: Expressions) -> Self {
        Self {
            match_labels: None,
            match_expressions: Some(exprs),
        }
    }

    pub fn from_map(map: Map) -> Self {
        Self {
            match_labels: Some(map),
            match_expressions: None,
        }
    }

    pub fn matches(&self, labels: &Map) -> bool {
        for expr in self.match_expressions.iter().flatten() {
            if !expr.matches(labels) {
                return false;
            }
        }

        if let Some(match_labels) = self.match_labels.as_ref() {
            for (k, v) in match_labels.iter() {
                if labels.get(k) != Some(v) {
                    return false;
                }
            }
        }

        true
    }
}

impl TryFrom<LabelSelector> for Selector {
    type Error = InvalidOperator;

    fn try_from(selector: LabelSelector) -> Result<Self, Self::Error> {
        let match_expressions = selector
            .match_expressions
            .map(|exprs| {
                exprs
                    .into_iter()
                    .map(|req| {
                        Ok(Expression {
                            key: req.key,
                            operator: req.operator.parse()?,
                            values: req.values.into_iter().flatten().collect(),
                        })
                    })
                    .collect::<Result<Expressions, InvalidOperator>>()
            })
            .transpose()?;

        Ok(Self {
            match_labels: selector.match_labels,
            match_expressions,
        })
    }
}

impl std::iter::FromIterator<(String, String)> for Selector {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self::from_map(iter.into_iter().collect())
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Selector {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        Self::from_map(
            iter.into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

impl std::iter::FromIterator<Expression> for Selector {
    fn from_iter<T: IntoIterator<Item = Expression>>(iter: T) -> Self {
        Self::from_expressions(iter.into_iter().collect())
    }
}

// === Expression ===

impl Expression {
    pub fn new(key: impl Into<String>, operator: Operator, values: &[&str]) -> Self {
        Self {
            key: key.into(),
            operator,
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    fn matches(&self, labels: &Map) -> bool {
        match self.operator {
            Operator::In => labels
                .get(&self.key)
                .is_some_and(|v| self.values.contains(v)),
            Operator::NotIn => labels
                .get(&self.key)
                .map_or(true, |v| !self.values.contains(v)),
            Operator::Exists => labels.contains_key(&self.key),
            Operator::DoesNotExist => !labels.contains_key(&self.key),
        }
    }
}

// === Operator ===

impl std::str::FromStr for Operator {
    type Err = InvalidOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "In" => Ok(Self::In),
            "NotIn" => Ok(Self::NotIn),
            "Exists" => Ok(Self::Exists),
            "DoesNotExist" => Ok(Self::DoesNotExist),
            s => Err(InvalidOperator(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LabelSelectorRequirement;
    use maplit::btreemap;
    use std::iter::FromIterator;

    fn labels(pairs: &[(&str, &str)]) -> Map {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_matches() {
        for (selector, labels, matches, msg) in &[
            (Selector::default(), Map::default(), true, "empty match"),
            (
                Selector::from_iter(Some(("foo", "bar"))),
                labels(&[("foo", "bar")]),
                true,
                "exact label match",
            ),
            (
                Selector::from_iter(Some(("foo", "bar"))),
                labels(&[("foo", "bar"), ("bah", "baz")]),
                true,
                "sufficient label match",
            ),
            (
                Selector::from_iter(Some(("foo", "bar"))),
                labels(&[("foo", "baz")]),
                false,
                "value mismatch",
            ),
            (
                Selector::from_iter(Some(Expression::new("foo", Operator::In, &["bar"]))),
                labels(&[("foo", "bar"), ("bah", "baz")]),
                true,
                "expression match",
            ),
            (
                Selector::from_iter(Some(Expression::new("foo", Operator::NotIn, &["bar"]))),
                labels(&[("foo", "bar")]),
                false,
                "excluded value",
            ),
            (
                Selector::from_iter(Some(Expression::new("foo", Operator::NotIn, &["bar"]))),
                labels(&[("bah", "baz")]),
                true,
                "absent key satisfies NotIn",
            ),
            (
                Selector::from_iter(Some(Expression::new("foo", Operator::Exists, &[]))),
                labels(&[("foo", "")]),
                true,
                "key exists",
            ),
            (
                Selector::from_iter(Some(Expression::new("foo", Operator::DoesNotExist, &[]))),
                labels(&[("foo", "bar")]),
                false,
                "key must not exist",
            ),
        ] {
            assert_eq!(selector.matches(labels), *matches, "{}", msg);
        }
    }

    #[test]
    fn converts_label_selector() {
        let selector = Selector::try_from(LabelSelector {
            match_labels: Some(btreemap! { "app".to_string() => "web".to_string() }),
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: "tier".to_string(),
                operator: "In".to_string(),
                values: Some(vec!["frontend".to_string(), "edge".to_string()]),
            }]),
        })
        .expect("selector must convert");

        assert!(selector.matches(&labels(&[("app", "web"), ("tier", "edge")])));
        assert!(!selector.matches(&labels(&[("app", "web"), ("tier", "backend")])));
        assert!(!selector.matches(&labels(&[("tier", "edge")])));
    }

    #[test]
    fn rejects_unknown_operator() {
        let err = Selector::try_from(LabelSelector {
            match_labels: None,
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: "tier".to_string(),
                operator: "Near".to_string(),
                values: None,
            }]),
        })
        .expect_err("operator must be rejected");
        assert_eq!(err.to_string(), "unsupported label selector operator: Near");
    }
}
