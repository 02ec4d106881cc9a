//! Configuration module

mod settings;
mod site;

pub use settings::{Scalar, SettingValue, SettingsStore};
pub use site::{normalize_url, SiteConfig, SITE_KEY};
