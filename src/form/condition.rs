use std::fmt;
use std::sync::Arc;

use super::value::{FieldValue, FormState};

type ConditionCallback = dyn Fn(&FormState) -> bool + Send + Sync;

/// Predicate over the whole form state, used to make rules conditional and
/// to hide fields that only make sense after another answer.
#[derive(Clone)]
pub enum Condition {
    /// The field holds `true`.
    IsTrue(&'static str),
    /// The field holds exactly this value.
    Equals(&'static str, FieldValue),
    /// The field (a list, or a single text) includes this text member.
    Contains(&'static str, &'static str),
    /// The field is present and not blank.
    HasValue(&'static str),
    Not(Box<Condition>),
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Custom(Arc<ConditionCallback>),
}

impl Condition {
    pub fn equals(field: &'static str, value: impl Into<FieldValue>) -> Self {
        Condition::Equals(field, value.into())
    }

    pub fn negate(self) -> Self {
        Condition::Not(Box::new(self))
    }

    pub fn custom(callback: impl Fn(&FormState) -> bool + Send + Sync + 'static) -> Self {
        Condition::Custom(Arc::new(callback))
    }

    pub fn evaluate(&self, state: &FormState) -> bool {
        match self {
            Condition::IsTrue(field) => state.is_true(field),
            Condition::Equals(field, expected) => state.get(field) == Some(expected),
            Condition::Contains(field, member) => state
                .get(field)
                .map(|value| value.text_items().contains(member))
                .unwrap_or(false),
            Condition::HasValue(field) => state
                .get(field)
                .map(|value| !value.is_blank())
                .unwrap_or(false),
            Condition::Not(inner) => !inner.evaluate(state),
            Condition::All(conditions) => conditions.iter().all(|c| c.evaluate(state)),
            Condition::Any(conditions) => conditions.iter().any(|c| c.evaluate(state)),
            Condition::Custom(callback) => callback(state),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::IsTrue(field) => write!(f, "IsTrue({})", field),
            Condition::Equals(field, value) => write!(f, "Equals({}, {:?})", field, value),
            Condition::Contains(field, member) => write!(f, "Contains({}, {})", field, member),
            Condition::HasValue(field) => write!(f, "HasValue({})", field),
            Condition::Not(inner) => write!(f, "Not({:?})", inner),
            Condition::All(conditions) => f.debug_tuple("All").field(conditions).finish(),
            Condition::Any(conditions) => f.debug_tuple("Any").field(conditions).finish(),
            Condition::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}
