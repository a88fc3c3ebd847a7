//! Site Customizer
//!
//! Turns the generic URL shortener template into a branded package:
//! copy the template into a [`TemplateWorkspace`], rewrite names and
//! colors with the [`RewriteEngine`], comment out unselected features
//! with [`FeatureToggle`], fill the logo and favicon slots, then zip the
//! result with the [`PackageAssembler`].

pub mod assets;
pub mod package;
pub mod rewrite;
pub mod toggle;
pub mod workspace;

pub use assets::{AssetSlots, AssetSource};
pub use forge_common::layout::ENTRY_POINT_FILE;
pub use package::{Package, PackageAssembler};
pub use rewrite::{RewriteEngine, RewriteReport};
pub use toggle::{FeatureToggle, ToggleReport};
pub use workspace::TemplateWorkspace;
