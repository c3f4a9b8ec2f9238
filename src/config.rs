use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Medifolio";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is not set.
pub fn default_log_filter() -> String {
    format!("info,{}=debug", env!("CARGO_PKG_NAME"))
}

/// Get the application data directory
/// ~/Medifolio/ on all platforms (user-visible by design)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Medifolio")
}

/// Directory holding uploaded document files.
pub fn documents_dir() -> PathBuf {
    app_data_dir().join("documents")
}

/// Path of the SQLite database file.
pub fn database_path() -> PathBuf {
    app_data_dir().join("medifolio.db")
}
