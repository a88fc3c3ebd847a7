//! Customization Request model
//!
//! Everything the pipeline needs for one run, validated once at the
//! boundary and immutable afterwards.

use crate::error::{Error, Result};
use crate::palette::ThemeColor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Connection string written to the package when none is supplied
pub const DEFAULT_CONNECTION_STRING: &str = "mongodb://localhost:27017/urlshortener";

/// Upload extensions accepted for logo and favicon
pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Where the generated package is headed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentTarget {
    /// Plain Python package run locally
    Standalone,
    /// Docker Compose package
    Containerized,
    /// Provisioned and pushed to Azure App Service
    ManagedCloud,
}

impl DeploymentTarget {
    /// Value used by the generator form
    pub fn form_value(&self) -> &'static str {
        match self {
            DeploymentTarget::Standalone => "standalone",
            DeploymentTarget::Containerized => "docker",
            DeploymentTarget::ManagedCloud => "azure",
        }
    }
}

impl FromStr for DeploymentTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "standalone" => Ok(DeploymentTarget::Standalone),
            "docker" | "containerized" => Ok(DeploymentTarget::Containerized),
            "azure" | "managed-cloud" | "managed_cloud" => Ok(DeploymentTarget::ManagedCloud),
            other => Err(Error::Validation(format!(
                "Unknown deployment option '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for DeploymentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.form_value())
    }
}

/// Optional UI features of the template
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    CustomAlias,
    PasswordProtection,
    ClickLimit,
}

impl Feature {
    pub const ALL: [Feature; 3] = [
        Feature::CustomAlias,
        Feature::PasswordProtection,
        Feature::ClickLimit,
    ];

    pub fn form_value(&self) -> &'static str {
        match self {
            Feature::CustomAlias => "custom_alias",
            Feature::PasswordProtection => "password_protection",
            Feature::ClickLimit => "max_clicks",
        }
    }
}

impl FromStr for Feature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "custom_alias" => Ok(Feature::CustomAlias),
            "password_protection" => Ok(Feature::PasswordProtection),
            "max_clicks" | "click_limit" => Ok(Feature::ClickLimit),
            other => Err(Error::Validation(format!("Unknown feature '{}'", other))),
        }
    }
}

/// Non-empty product name shown in the generated site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayName(String);

impl DisplayName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::Validation(
                "Please provide a name for your URL shortener.".to_string(),
            ));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory and archive stem: lowercase with spaces as underscores
    ///
    /// Anything other than alphanumerics, `_` and `-` becomes `_`, so the
    /// slug is always a single plain path component.
    pub fn slug(&self) -> String {
        self.0
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect()
    }

    pub fn archive_name(&self) -> String {
        format!("{}_url_shortener.zip", self.slug())
    }
}

impl TryFrom<String> for DisplayName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<DisplayName> for String {
    fn from(name: DisplayName) -> Self {
        name.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An uploaded image, not yet decoded
#[derive(Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Accepts the upload only if its extension is on the image allow-list
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let file_name = file_name.into();
        let allowed = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ALLOWED_IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false);

        if !allowed {
            return Err(Error::Validation(format!(
                "'{}' must be an image (PNG, JPG, JPEG, GIF).",
                file_name
            )));
        }

        Ok(Self { file_name, bytes })
    }
}

impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A validated set of branding and deployment choices
#[derive(Debug, Clone)]
pub struct CustomizationRequest {
    display_name: DisplayName,
    target: DeploymentTarget,
    theme_color: Option<ThemeColor>,
    features: BTreeSet<Feature>,
    connection_string: Option<String>,
    logo: Option<Upload>,
    favicon: Option<Upload>,
}

impl CustomizationRequest {
    pub fn builder(display_name: DisplayName, target: DeploymentTarget) -> CustomizationRequestBuilder {
        CustomizationRequestBuilder {
            request: CustomizationRequest {
                display_name,
                target,
                theme_color: None,
                features: BTreeSet::new(),
                connection_string: None,
                logo: None,
                favicon: None,
            },
        }
    }

    pub fn display_name(&self) -> &DisplayName {
        &self.display_name
    }

    pub fn target(&self) -> DeploymentTarget {
        self.target
    }

    pub fn theme_color(&self) -> Option<ThemeColor> {
        self.theme_color
    }

    pub fn features(&self) -> &BTreeSet<Feature> {
        &self.features
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    /// Supplied connection string, or the local default
    pub fn connection_string(&self) -> &str {
        self.connection_string
            .as_deref()
            .unwrap_or(DEFAULT_CONNECTION_STRING)
    }

    pub fn logo(&self) -> Option<&Upload> {
        self.logo.as_ref()
    }

    pub fn favicon(&self) -> Option<&Upload> {
        self.favicon.as_ref()
    }
}

/// Builder for [`CustomizationRequest`]
pub struct CustomizationRequestBuilder {
    request: CustomizationRequest,
}

impl CustomizationRequestBuilder {
    pub fn theme_color(mut self, color: ThemeColor) -> Self {
        self.request.theme_color = Some(color);
        self
    }

    pub fn feature(mut self, feature: Feature) -> Self {
        self.request.features.insert(feature);
        self
    }

    pub fn features(mut self, features: impl IntoIterator<Item = Feature>) -> Self {
        self.request.features.extend(features);
        self
    }

    /// Blank strings fall back to the default
    pub fn connection_string(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        self.request.connection_string = if value.trim().is_empty() {
            None
        } else {
            Some(value.trim().to_string())
        };
        self
    }

    pub fn logo(mut self, upload: Upload) -> Self {
        self.request.logo = Some(upload);
        self
    }

    pub fn favicon(mut self, upload: Upload) -> Self {
        self.request.favicon = Some(upload);
        self
    }

    pub fn build(self) -> CustomizationRequest {
        self.request
    }
}
