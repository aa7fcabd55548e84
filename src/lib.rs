#![doc(test(attr(deny(warnings))))]

//! Catalog Wizard drives the multi-tab survey used to catalogue an
//! organisation's IT systems: schema and rule evaluation, per-tab save
//! bookkeeping, draft persistence and the reusable field editors the survey
//! is built from.

pub mod cli;
pub mod config;
pub mod errors;
pub mod fields;
pub mod form;
pub mod persistence;
pub mod utils;
pub mod validation;
pub mod wizard;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Catalog Wizard tracing initialized.");
    });
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_does_not_panic() {
        super::init();
    }
}
