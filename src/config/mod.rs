//! Runtime configuration and settings loading.

mod runtime;
mod settings;

pub use runtime::{LifecycleConfig, RuntimeConfig, TEST_HARNESS_MARKER};
pub use settings::{BaseSettings, Settings, SettingsCache};
