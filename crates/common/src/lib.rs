pub mod error;
pub mod layout;
pub mod palette;
pub mod request;

pub use error::{Error, Result};
pub use palette::{ThemeColor, ThemePalette};
pub use request::{CustomizationRequest, DeploymentTarget, DisplayName, Feature, Upload};
