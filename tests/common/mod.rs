#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use catalog_wizard::{
    config::WizardConfig,
    form::{catalog_rules, catalog_schema},
    persistence::MemoryBackend,
    utils::clock::ManualClock,
    wizard::FormWizard,
};

pub type TestWizard = FormWizard<MemoryBackend, ManualClock>;

pub struct Fixture {
    pub wizard: TestWizard,
    pub backend: MemoryBackend,
    pub clock: ManualClock,
}

pub fn config() -> WizardConfig {
    WizardConfig::default().with_debounce(Duration::from_millis(500))
}

/// Create-mode catalog wizard over an in-memory backend and a manual clock.
pub fn fixture() -> Fixture {
    fixture_with(MemoryBackend::default())
}

pub fn fixture_with(backend: MemoryBackend) -> Fixture {
    let clock = ManualClock::default();
    let wizard = FormWizard::with_clock(
        Arc::new(catalog_schema().expect("catalog schema is valid")),
        Arc::new(catalog_rules()),
        backend.clone(),
        &config(),
        clock.clone(),
    );
    Fixture {
        wizard,
        backend,
        clock,
    }
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

/// Fills the required fields of one catalog tab with valid answers.
pub fn fill_tab(wizard: &mut TestWizard, tab: &str) {
    match tab {
        "1" => {
            wizard.set_field("name", "Payroll").unwrap();
            wizard
                .set_field("description", "Monthly salary processing")
                .unwrap();
            wizard.select_option("owner_organization", "ministry").unwrap();
            wizard.select_option("status", "development").unwrap();
        }
        "2" => wizard
            .set_checked("business_domains", &strings(&["finance", "hr"]))
            .unwrap(),
        "3" => {
            wizard.select_option("architecture_type", "monolith").unwrap();
            wizard.select_option("hosting_model", "on_premise").unwrap();
        }
        "4" => wizard.select_option("data_classification", "internal").unwrap(),
        "6" => wizard
            .set_checked("authentication_methods", &strings(&["sso"]))
            .unwrap(),
        "7" => {
            wizard.set_field("support_team", "Payroll ops").unwrap();
            wizard
                .set_field("contact_email", "payroll@example.org")
                .unwrap();
        }
        _ => {}
    }
}

pub fn fill_all(wizard: &mut TestWizard) {
    for tab in ["1", "2", "3", "4", "5", "6", "7", "8", "9"] {
        fill_tab(wizard, tab);
    }
}

/// Moves forward to `tab`, answering any unsaved-changes prompt with "discard".
pub fn go_to(wizard: &mut TestWizard, tab: &str) {
    use catalog_wizard::wizard::{NavigationOutcome, Resolution};

    let outcome = wizard.request_navigation(tab).unwrap();
    let outcome = match outcome {
        NavigationOutcome::ConfirmationRequired { .. } => wizard
            .resolve_confirmation(Resolution::ContinueWithoutSaving)
            .unwrap(),
        other => other,
    };
    assert!(outcome.is_navigated(), "could not reach tab {tab}: {outcome:?}");
}
