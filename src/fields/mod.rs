//! Reusable field editors shared across the survey.

pub mod option_other;
pub mod records;

pub use option_other::{
    MultiChoice, MultiSelectWithOther, OptionChoice, OptionField, SingleSelectWithOther,
    OTHER_SENTINEL,
};
pub use records::{EditMode, RecordListEditor, SubRecord};
