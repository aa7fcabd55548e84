pub mod clock;

use std::{env, path::PathBuf, sync::Once};

pub use clock::{Clock, SystemClock};

const DEFAULT_DIR_NAME: &str = "catalog_wizard";
const CONFIG_FILE: &str = "config.json";

static TRACING_INIT: Once = Once::new();

/// Initializes the global tracing subscriber with sensible defaults.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("catalog_wizard=info"));

        // A host application may already own the global subscriber.
        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
}

/// Returns the application-specific data directory.
///
/// `CATALOG_WIZARD_HOME` wins; otherwise the platform data directory is used,
/// falling back to the working directory.
pub fn app_data_dir() -> PathBuf {
    if let Some(custom) = env::var_os("CATALOG_WIZARD_HOME") {
        return PathBuf::from(custom);
    }
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_DIR_NAME)
}

/// Path to the persisted wizard configuration.
pub fn config_file() -> PathBuf {
    app_data_dir().join(CONFIG_FILE)
}
