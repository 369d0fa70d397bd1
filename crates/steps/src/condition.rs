//! Single-comparison condition evaluator.

use serde_json::Value;

use crate::value::{is_empty, to_number, to_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    IsEmpty,
    IsNotEmpty,
}

impl std::str::FromStr for ConditionOperator {
    type Err = String;

    /// Accepts both the camelCase names and their snake_case spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equals" => Ok(Self::Equals),
            "notEquals" | "not_equals" => Ok(Self::NotEquals),
            "contains" => Ok(Self::Contains),
            "greaterThan" | "greater_than" => Ok(Self::GreaterThan),
            "lessThan" | "less_than" => Ok(Self::LessThan),
            "isEmpty" | "is_empty" => Ok(Self::IsEmpty),
            "isNotEmpty" | "is_not_empty" => Ok(Self::IsNotEmpty),
            other => Err(format!("unknown condition operator: {other}")),
        }
    }
}

impl ConditionOperator {
    /// Apply the operator to a submitted value (`None` when the field is absent).
    pub fn apply(&self, value: Option<&Value>, compare: &Value) -> bool {
        match self {
            Self::Equals => to_text(value) == to_text(Some(compare)),
            Self::NotEquals => to_text(value) != to_text(Some(compare)),
            Self::Contains => to_text(value).contains(&to_text(Some(compare))),
            // NaN on either side compares false.
            Self::GreaterThan => to_number(value) > to_number(Some(compare)),
            Self::LessThan => to_number(value) < to_number(Some(compare)),
            Self::IsEmpty => is_empty(value),
            Self::IsNotEmpty => !is_empty(value),
        }
    }
}

/// Evaluate `value <operator> compare`.  Unknown operators never match.
pub fn evaluate(value: Option<&Value>, operator: &str, compare: &Value) -> bool {
    operator
        .parse::<ConditionOperator>()
        .map(|op| op.apply(value, compare))
        .unwrap_or(false)
}
