//! Resource identifiers derived from the display name

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest application name the hosting platform accepts here
pub const MAX_APP_NAME_LEN: usize = 20;

/// Length of the random uniqueness suffix
pub const SUFFIX_LEN: usize = 8;

const PREFIX: &str = "app";

/// Names of the three resources one deployment creates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNames {
    pub app_name: String,
    pub resource_group: String,
    pub plan_name: String,
}

impl ResourceNames {
    /// Names with a fresh random suffix
    pub fn generate(display_name: &str) -> Self {
        Self::with_suffix(display_name, &random_suffix())
    }

    /// Deterministic variant of [`ResourceNames::generate`]
    ///
    /// The base is cut short enough that the suffix always survives the
    /// length limit.
    pub fn with_suffix(display_name: &str, suffix: &str) -> Self {
        let mut base: String = display_name
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            .collect();

        if !base.starts_with(|c: char| c.is_ascii_lowercase()) {
            base.insert_str(0, PREFIX);
        }

        let suffix: String = suffix.chars().take(SUFFIX_LEN).collect();
        base.truncate(MAX_APP_NAME_LEN.saturating_sub(suffix.len()));

        let app_name = format!("{}{}", base, suffix);
        Self {
            resource_group: format!("{}-rg", app_name),
            plan_name: format!("{}-plan", app_name),
            app_name,
        }
    }
}

fn random_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..SUFFIX_LEN].to_string()
}
