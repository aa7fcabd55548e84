//! Structural validation: rule registry plus the per-tab evaluator.

pub mod rules;
pub mod validator;

pub use rules::{FieldRule, Predicate, RuleRegistry, ValidationOutcome};
pub use validator::{
    AllTabsValidation, FieldError, TabValidationResult, TabValidator, PENDING_CUSTOM_MESSAGE,
};
