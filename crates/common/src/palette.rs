//! Theme color parsing and palette derivation
//!
//! A theme color is a 6-hex-digit RGB value. Every color the rewrite
//! engine writes is derived from it through [`ThemePalette`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Theme color used when the caller does not pick one
pub const DEFAULT_THEME_COLOR: &str = "#3f51b5";

/// Favicon fill when no theme color was supplied
pub const FALLBACK_FAVICON_COLOR: &str = "#4285f4";

/// A validated `#rrggbb` color, stored lowercase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ThemeColor {
    rgb: [u8; 3],
}

impl ThemeColor {
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self { rgb: [r, g, b] }
    }

    pub fn rgb(&self) -> [u8; 3] {
        self.rgb
    }

    /// `#rrggbb`
    pub fn to_hex(&self) -> String {
        format!("#{}", hex::encode(self.rgb))
    }

    /// `r, g, b` as used inside `rgba(...)` literals
    pub fn rgb_triplet(&self) -> String {
        let [r, g, b] = self.rgb;
        format!("{}, {}, {}", r, g, b)
    }

    /// Shift every channel by `amount`, clamped to 0..=255
    pub fn adjust(&self, amount: i16) -> Self {
        let shift = |c: u8| (c as i16 + amount).clamp(0, 255) as u8;
        let [r, g, b] = self.rgb;
        Self::from_rgb(shift(r), shift(g), shift(b))
    }

    /// `rgba(r, g, b, opacity)`
    pub fn with_opacity(&self, opacity: f64) -> String {
        format!("rgba({}, {})", self.rgb_triplet(), opacity)
    }
}

impl FromStr for ThemeColor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.trim().trim_start_matches('#');
        if digits.len() != 6 {
            return Err(Error::Validation(format!(
                "Theme color must have 6 hex digits, got '{}'",
                s
            )));
        }

        let bytes = hex::decode(digits)
            .map_err(|e| Error::Validation(format!("Invalid theme color '{}': {}", s, e)))?;

        Ok(Self::from_rgb(bytes[0], bytes[1], bytes[2]))
    }
}

impl TryFrom<String> for ThemeColor {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ThemeColor> for String {
    fn from(color: ThemeColor) -> Self {
        color.to_hex()
    }
}

impl fmt::Display for ThemeColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Color derivatives computed once per request and shared by every rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemePalette {
    base: ThemeColor,
    /// The theme color itself
    pub accent: String,
    /// Accent darkened by 50
    pub darker: String,
    /// Accent darkened by 15
    pub hover: String,
    /// Accent at 12% opacity
    pub light_bg: String,
    /// Accent at 18% opacity
    pub lighter_bg: String,
    /// `r, g, b` of the accent
    pub rgb: String,
}

impl ThemePalette {
    pub fn new(base: ThemeColor) -> Self {
        Self {
            base,
            accent: base.to_hex(),
            darker: base.adjust(-50).to_hex(),
            hover: base.adjust(-15).to_hex(),
            light_bg: base.with_opacity(0.12),
            lighter_bg: base.with_opacity(0.18),
            rgb: base.rgb_triplet(),
        }
    }

    pub fn base(&self) -> ThemeColor {
        self.base
    }

    /// Accent shifted by an arbitrary amount, as `#rrggbb`
    pub fn shade(&self, amount: i16) -> String {
        self.base.adjust(amount).to_hex()
    }

    /// `r, g, b` of the accent shifted by `amount`
    pub fn shade_rgb(&self, amount: i16) -> String {
        self.base.adjust(amount).rgb_triplet()
    }

    /// `rgba(<accent rgb>, alpha)` with the alpha written verbatim
    pub fn rgba(&self, alpha: &str) -> String {
        format!("rgba({}, {})", self.rgb, alpha)
    }
}
