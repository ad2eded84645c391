//! Environment variable constants used throughout the application.
//!
//! Centralized definition of all `CONTENTCI_*` environment variables to ensure
//! consistency and avoid hardcoded strings.

/// Run configuration file path (CLI arg default env)
pub const CONTENTCI_CONFIG: &str = "CONTENTCI_CONFIG";

/// Log filter directive, e.g. `info` or `contentci_core=debug`
pub const CONTENTCI_LOG: &str = "CONTENTCI_LOG";

/// Splunkbase credentials, referenced as `${...}` from the run configuration
pub const SPLUNKBASE_USERNAME: &str = "SPLUNKBASE_USERNAME";
pub const SPLUNKBASE_PASSWORD: &str = "SPLUNKBASE_PASSWORD";
