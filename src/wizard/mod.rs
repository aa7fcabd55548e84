//! The survey wizard: tab navigation gated by validation, per-tab save
//! bookkeeping and the debounced live validation pass.

pub mod controller;
pub mod debounce;
pub mod state;

pub use controller::FormWizard;
pub use debounce::Debouncer;
pub use state::{
    AfterSave, BeginSave, NavigationOutcome, Resolution, SaveOutcome, SaveTicket, SubmitOutcome,
    TabSaveState, TabStatus, ValidationBlock,
};
