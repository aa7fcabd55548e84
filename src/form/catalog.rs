//! The IT-system survey: nine tabs, their fields, and the structural rules
//! that apply to them.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::condition::Condition;
use super::schema::{FieldKind, FieldSpec, FormSchema, TabSpec};
use crate::errors::WizardError;
use crate::fields::SubRecord;
use crate::validation::{FieldRule, Predicate, RuleRegistry, ValidationOutcome};
use crate::form::FieldValue;

pub const ORGANIZATIONS: &[&str] = &["ministry", "agency", "municipality", "state_enterprise"];
pub const SYSTEM_STATUSES: &[&str] = &["operating", "development", "pilot", "retired"];
pub const BUSINESS_DOMAINS: &[&str] = &["finance", "hr", "procurement", "citizen_services", "health", "education"];
pub const USER_GROUPS: &[&str] = &["internal_staff", "citizens", "businesses", "partner_agencies"];
pub const ARCHITECTURES: &[&str] = &["monolith", "client_server", "microservices", "serverless"];
pub const HOSTING_MODELS: &[&str] = &["on_premise", "government_cloud", "public_cloud", "hybrid"];
pub const LANGUAGES: &[&str] = &["java", "csharp", "python", "php", "javascript", "go"];
pub const DATABASES: &[&str] = &["postgresql", "mysql", "oracle", "sql_server", "mongodb"];
pub const DATA_CLASSIFICATIONS: &[&str] = &["public", "internal", "confidential", "secret"];
pub const PERSONAL_DATA_CATEGORIES: &[&str] = &["identity", "contact", "financial", "health", "biometric"];
pub const BACKUP_FREQUENCIES: &[&str] = &["daily", "weekly", "monthly"];
pub const API_STANDARDS: &[&str] = &["rest", "soap", "graphql", "file_transfer"];
pub const AUTH_METHODS: &[&str] = &["password", "sso", "mfa", "certificate"];
pub const COMPLIANCE_STANDARDS: &[&str] = &["iso_27001", "pdpa", "gdpr", "soc2"];
pub const SLA_LEVELS: &[&str] = &["basic", "standard", "premium"];
pub const FUNDING_SOURCES: &[&str] = &["annual_budget", "special_project", "grant", "partnership"];
pub const INTEGRATION_METHODS: &[&str] = &["api", "file_transfer", "database_link", "message_queue"];
pub const INTEGRATION_FREQUENCIES: &[&str] = &["real_time", "hourly", "daily", "weekly", "on_demand"];

static ACRONYM_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9-]{2,16}$").expect("acronym pattern compiles"));

/// One system-to-system integration link, stored in the `integrations` list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationConnection {
    pub source_system: String,
    pub target_system: String,
    pub data_objects: String,
    pub integration_methods: Vec<String>,
    pub frequency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_handling: Option<String>,
    pub has_api_docs: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SubRecord for IntegrationConnection {
    fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.source_system.trim().is_empty() {
            missing.push("source_system");
        }
        if self.target_system.trim().is_empty() {
            missing.push("target_system");
        }
        if self.data_objects.trim().is_empty() {
            missing.push("data_objects");
        }
        if self.integration_methods.is_empty() {
            missing.push("integration_methods");
        }
        if self.frequency.trim().is_empty() {
            missing.push("frequency");
        }
        missing
    }
}

impl IntegrationConnection {
    /// Sets a sub-field from text input, as the record editor form does.
    pub fn set_field(&mut self, field: &str, raw: &str) -> Result<(), WizardError> {
        let text = raw.trim();
        let optional = || Some(text.to_string()).filter(|t| !t.is_empty());
        match field {
            "source_system" => self.source_system = text.to_string(),
            "target_system" => self.target_system = text.to_string(),
            "data_objects" => self.data_objects = text.to_string(),
            "integration_methods" => {
                self.integration_methods = text
                    .split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            "frequency" => self.frequency = text.to_string(),
            "error_handling" => self.error_handling = optional(),
            "has_api_docs" => {
                self.has_api_docs = matches!(text.to_lowercase().as_str(), "y" | "yes" | "true" | "1")
            }
            "notes" => self.notes = optional(),
            other => return Err(WizardError::UnknownField(other.to_string())),
        }
        Ok(())
    }
}

fn choice(options: &'static [&'static str]) -> FieldKind {
    FieldKind::Choice {
        options,
        allow_other: false,
    }
}

fn choice_or_other(options: &'static [&'static str]) -> FieldKind {
    FieldKind::Choice {
        options,
        allow_other: true,
    }
}

fn multi_or_other(options: &'static [&'static str]) -> FieldKind {
    FieldKind::MultiChoice {
        options,
        allow_other: true,
    }
}

/// Builds the survey layout.
pub fn catalog_schema() -> Result<FormSchema, WizardError> {
    let tabs = vec![
        TabSpec::new(
            "1",
            "General information",
            1,
            &["name", "acronym", "description", "owner_organization", "status", "go_live_date", "website"],
        ),
        TabSpec::new(
            "2",
            "Business context",
            2,
            &["business_domains", "target_users", "user_count", "is_critical", "criticality_notes"],
        ),
        TabSpec::new(
            "3",
            "Architecture",
            3,
            &["architecture_type", "hosting_model", "programming_languages", "database", "has_source_code"],
        ),
        TabSpec::new(
            "4",
            "Data",
            4,
            &["data_classification", "has_personal_data", "personal_data_categories", "data_volume_gb", "backup_policy"],
        ),
        TabSpec::new(
            "5",
            "Integration",
            5,
            &["has_integrations", "integrations", "api_standard"],
        ),
        TabSpec::new(
            "6",
            "Security",
            6,
            &["authentication_methods", "has_security_audit", "last_audit_date", "compliance_standards"],
        ),
        TabSpec::new(
            "7",
            "Operations",
            7,
            &["support_team", "contact_email", "sla_level", "incident_count"],
        ),
        TabSpec::new(
            "8",
            "Costs",
            8,
            &["annual_budget", "funding_source", "contract_end_date"],
        ),
        TabSpec::new(
            "9",
            "Assessment",
            9,
            &["satisfaction_score", "pain_points", "planned_upgrades", "notes"],
        ),
    ];

    let fields = vec![
        FieldSpec::new("name", "System name", FieldKind::Text),
        FieldSpec::new("acronym", "Acronym", FieldKind::Text),
        FieldSpec::new("description", "Description", FieldKind::LongText),
        FieldSpec::new("owner_organization", "Owning organization", choice_or_other(ORGANIZATIONS)),
        FieldSpec::new("status", "Status", choice(SYSTEM_STATUSES)),
        FieldSpec::new("go_live_date", "Go-live date", FieldKind::Date)
            .with_help("Required once the system is operating."),
        FieldSpec::new("website", "Website", FieldKind::Url),
        FieldSpec::new("business_domains", "Business domains", multi_or_other(BUSINESS_DOMAINS)),
        FieldSpec::new("target_users", "Target users", multi_or_other(USER_GROUPS)),
        FieldSpec::new("user_count", "Number of users", FieldKind::Integer),
        FieldSpec::new("is_critical", "Mission critical", FieldKind::Boolean),
        FieldSpec::new("criticality_notes", "Why is it critical?", FieldKind::LongText)
            .visible_when(Condition::IsTrue("is_critical")),
        FieldSpec::new("architecture_type", "Architecture", choice_or_other(ARCHITECTURES)),
        FieldSpec::new("hosting_model", "Hosting", choice_or_other(HOSTING_MODELS)),
        FieldSpec::new("programming_languages", "Programming languages", multi_or_other(LANGUAGES)),
        FieldSpec::new("database", "Database", choice_or_other(DATABASES)),
        FieldSpec::new("has_source_code", "Source code owned", FieldKind::Boolean),
        FieldSpec::new("data_classification", "Data classification", choice(DATA_CLASSIFICATIONS)),
        FieldSpec::new("has_personal_data", "Stores personal data", FieldKind::Boolean),
        FieldSpec::new(
            "personal_data_categories",
            "Personal data categories",
            multi_or_other(PERSONAL_DATA_CATEGORIES),
        )
        .visible_when(Condition::IsTrue("has_personal_data")),
        FieldSpec::new("data_volume_gb", "Data volume (GB)", FieldKind::Decimal),
        FieldSpec::new(
            "backup_policy",
            "Backup policy",
            FieldKind::Group(vec![
                FieldSpec::new("frequency", "Backup frequency", choice(BACKUP_FREQUENCIES)),
                FieldSpec::new("retention_days", "Retention (days)", FieldKind::Integer),
                FieldSpec::new("offsite", "Off-site copy", FieldKind::Boolean),
            ]),
        )
        .with_help("Enter as JSON, e.g. {\"frequency\": \"daily\", \"retention_days\": 30}"),
        FieldSpec::new("has_integrations", "Integrates with other systems", FieldKind::Boolean),
        FieldSpec::new("integrations", "Integration links", FieldKind::Records)
            .visible_when(Condition::IsTrue("has_integrations")),
        FieldSpec::new("api_standard", "API standard", choice_or_other(API_STANDARDS)),
        FieldSpec::new("authentication_methods", "Authentication", multi_or_other(AUTH_METHODS)),
        FieldSpec::new("has_security_audit", "Security audit performed", FieldKind::Boolean),
        FieldSpec::new("last_audit_date", "Last audit date", FieldKind::Date)
            .visible_when(Condition::IsTrue("has_security_audit")),
        FieldSpec::new("compliance_standards", "Compliance standards", multi_or_other(COMPLIANCE_STANDARDS)),
        FieldSpec::new("support_team", "Support team", FieldKind::Text),
        FieldSpec::new("contact_email", "Contact email", FieldKind::Email),
        FieldSpec::new("sla_level", "SLA level", choice(SLA_LEVELS)),
        FieldSpec::new("incident_count", "Incidents in the last year", FieldKind::Integer),
        FieldSpec::new("annual_budget", "Annual budget", FieldKind::Decimal),
        FieldSpec::new("funding_source", "Funding source", choice_or_other(FUNDING_SOURCES)),
        FieldSpec::new("contract_end_date", "Contract end date", FieldKind::Date),
        FieldSpec::new("satisfaction_score", "Satisfaction (1-5)", FieldKind::Integer),
        FieldSpec::new("pain_points", "Pain points", FieldKind::LongText),
        FieldSpec::new("planned_upgrades", "Planned upgrades", FieldKind::LongText),
        FieldSpec::new("notes", "Notes", FieldKind::LongText),
    ];

    FormSchema::new("it-system-catalog", tabs, fields)
}

/// Structural rules for [`catalog_schema`].
pub fn catalog_rules() -> RuleRegistry {
    RuleRegistry::new()
        .with_rule(
            FieldRule::new("name")
                .with(Predicate::Required)
                .with(Predicate::MaxLength(200)),
        )
        .with_rule(FieldRule::new("acronym").with(Predicate::Pattern {
            regex: ACRONYM_PATTERN.clone(),
            message: "Use 2-16 letters, digits or dashes",
        }))
        .required("description")
        .required("owner_organization")
        .with_rule(
            FieldRule::new("status")
                .with(Predicate::Required)
                .with(Predicate::OneOf(SYSTEM_STATUSES)),
        )
        .required_when("go_live_date", Condition::equals("status", "operating"))
        .with_rule(FieldRule::new("website").with(Predicate::Url))
        .with_rule(
            FieldRule::new("business_domains")
                .with(Predicate::Required)
                .with(Predicate::MinItems(1)),
        )
        .with_rule(FieldRule::new("user_count").with(Predicate::IntegerRange {
            min: 0,
            max: 100_000_000,
        }))
        .required_when("criticality_notes", Condition::IsTrue("is_critical"))
        .required("architecture_type")
        .required("hosting_model")
        .with_rule(
            FieldRule::new("data_classification")
                .with(Predicate::Required)
                .with(Predicate::OneOf(DATA_CLASSIFICATIONS)),
        )
        .required_when("personal_data_categories", Condition::IsTrue("has_personal_data"))
        .with_rule(FieldRule::new("data_volume_gb").with(Predicate::NonNegative))
        .with_rule(FieldRule::new("backup_policy").with(Predicate::custom(|value, _| {
            match value {
                Some(FieldValue::Object(policy)) => match policy.get("retention_days") {
                    Some(FieldValue::Integer(days)) if *days < 1 => {
                        ValidationOutcome::invalid("Retention must be at least one day")
                    }
                    _ => ValidationOutcome::Valid,
                },
                _ => ValidationOutcome::Valid,
            }
        })))
        .required_when("integrations", Condition::IsTrue("has_integrations"))
        .with_rule(
            FieldRule::new("authentication_methods")
                .with(Predicate::Required)
                .with(Predicate::MinItems(1)),
        )
        .required_when("last_audit_date", Condition::IsTrue("has_security_audit"))
        .required("support_team")
        .with_rule(
            FieldRule::new("contact_email")
                .with(Predicate::Required)
                .with(Predicate::Email),
        )
        .with_rule(FieldRule::new("incident_count").with(Predicate::IntegerRange {
            min: 0,
            max: 1_000_000,
        }))
        .with_rule(FieldRule::new("annual_budget").with(Predicate::NonNegative))
        .with_rule(FieldRule::new("contract_end_date").with(Predicate::custom(
            |value, state| match (value, state.get("go_live_date")) {
                (Some(FieldValue::Date(end)), Some(FieldValue::Date(start))) if end < start => {
                    ValidationOutcome::invalid("Contract cannot end before the go-live date")
                }
                _ => ValidationOutcome::Valid,
            },
        )))
        .with_rule(FieldRule::new("satisfaction_score").with(Predicate::IntegerRange {
            min: 1,
            max: 5,
        }))
        .with_rule(FieldRule::new("pain_points").with(Predicate::MaxLength(2000)))
        .with_rule(FieldRule::new("notes").with(Predicate::MaxLength(2000)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_schema_is_consistent() {
        let schema = catalog_schema().expect("catalog schema is valid");
        assert_eq!(schema.tabs().len(), 9);
        let rules = catalog_rules();
        for field in schema.fields() {
            assert!(schema.tab_of(field.key).is_some(), "{} has a tab", field.key);
        }
        assert!(rules.has_rules("name"));
    }

    #[test]
    fn integration_connection_reports_missing_fields() {
        let mut link = IntegrationConnection::default();
        assert_eq!(link.missing_required().len(), 5);
        link.set_field("source_system", "ERP").expect("known field");
        link.set_field("integration_methods", "api, message_queue").expect("known field");
        assert_eq!(link.integration_methods, vec!["api", "message_queue"]);
        assert!(!link.missing_required().contains(&"source_system"));
        assert!(link.set_field("colour", "blue").is_err());
    }
}
