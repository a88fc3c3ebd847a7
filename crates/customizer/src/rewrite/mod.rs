//! Content Rewrite Engine
//!
//! Applies the product name and the theme palette to every text file of a
//! workspace. The rule catalogue is one static table sorted by
//! [`RuleStage`]; within a stage, rules keep their declaration order.

mod brand;
mod markup;
mod rules;
mod script;
mod stylesheet;

pub use brand::{sentence_case, PRODUCT_PHRASE};
pub use rules::{FileClass, Producer, RewriteRule, RuleContext, RuleScope, RuleStage};

use forge_common::ThemePalette;
use regex::Regex;
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Legacy chart colors, double quoted
pub(crate) const LEGACY_DOUBLE_QUOTED: &str =
    r#""(?:#4285f4|#1a73e8|#0f9d58|#f4b400|#db4437|#3366CC|#DC3912)""#;

/// Legacy chart colors, single quoted
pub(crate) const LEGACY_SINGLE_QUOTED: &str =
    r"'(?:#4285f4|#1a73e8|#0f9d58|#f4b400|#db4437|#3366CC|#DC3912)'";

static HEX_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#[0-9a-fA-F]{6}").expect("invalid hex literal pattern"));

static CATALOGUE: LazyLock<Vec<RewriteRule>> = LazyLock::new(|| {
    let mut catalogue = brand::rules();
    catalogue.extend(markup::rules());
    catalogue.extend(stylesheet::rules());
    catalogue.extend(script::rules());
    // Stable: declaration order survives within a stage
    catalogue.sort_by_key(|rule| rule.stage);
    catalogue
});

/// Replace the first `#rrggbb` literal in `text` with `color`
pub(crate) fn swap_hex(text: &str, color: &str) -> String {
    HEX_LITERAL.replacen(text, 1, regex::NoExpand(color)).into_owned()
}

/// Outcome of one tree rewrite
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RewriteReport {
    pub files_scanned: usize,
    pub files_changed: usize,
    /// Files left untouched because reading or writing them failed
    pub failures: Vec<(PathBuf, String)>,
}

pub struct RewriteEngine {
    name: String,
    palette: Option<ThemePalette>,
}

impl RewriteEngine {
    /// Color rules are active only when a palette is given
    pub fn new(name: impl Into<String>, palette: Option<ThemePalette>) -> Self {
        Self {
            name: name.into(),
            palette,
        }
    }

    /// The full catalogue in evaluation order
    pub fn rules() -> &'static [RewriteRule] {
        &CATALOGUE
    }

    /// Rewrite one file's content. Files outside the known text classes
    /// come back borrowed and unchanged.
    pub fn rewrite_content<'c>(&self, path: &Path, content: &'c str) -> Cow<'c, str> {
        let Some(class) = FileClass::of(path) else {
            return Cow::Borrowed(content);
        };

        let path_str = path.to_string_lossy();
        let ctx = RuleContext {
            name: &self.name,
            palette: self.palette.as_ref(),
        };

        let mut current = Cow::Borrowed(content);
        for rule in CATALOGUE.iter() {
            if !rule.applies_to(class, &path_str, &current) {
                continue;
            }
            let updated = match rule.apply(&current, &ctx) {
                Cow::Owned(text) => Some(text),
                Cow::Borrowed(_) => None,
            };
            if let Some(text) = updated {
                debug!("{}: rule {} applied", path_str, rule.name);
                current = Cow::Owned(text);
            }
        }
        current
    }

    /// Rewrite every text file under `root` in place.
    ///
    /// Traversal is sorted by file name. A file is written back only when
    /// its content changed, so undecodable bytes in files no rule touches
    /// survive. Per-file failures are logged and collected, never raised.
    pub fn rewrite_tree(&self, root: &Path) -> RewriteReport {
        let mut report = RewriteReport::default();

        let entries = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file());

        for entry in entries {
            let path = entry.path();
            if FileClass::of(path).is_none() {
                continue;
            }
            report.files_scanned += 1;

            match self.rewrite_file(path) {
                Ok(true) => report.files_changed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!("Error rewriting {}: {}", path.display(), e);
                    report.failures.push((path.to_path_buf(), e.to_string()));
                }
            }
        }

        debug!(
            "Rewrote {} of {} text files under {}",
            report.files_changed,
            report.files_scanned,
            root.display()
        );
        report
    }

    fn rewrite_file(&self, path: &Path) -> std::io::Result<bool> {
        let bytes = fs::read(path)?;
        let original = String::from_utf8_lossy(&bytes);
        let rewritten = self.rewrite_content(path, &original);

        if rewritten == original {
            return Ok(false);
        }
        fs::write(path, rewritten.as_bytes())?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn engine(color: Option<&str>) -> RewriteEngine {
        let palette = color.map(|c| ThemePalette::new(c.parse().unwrap()));
        RewriteEngine::new("Acme Links", palette)
    }

    #[test]
    fn test_catalogue_is_stage_ordered() {
        let stages: Vec<RuleStage> = RewriteEngine::rules().iter().map(|r| r.stage).collect();
        let mut sorted = stages.clone();
        sorted.sort();
        assert_eq!(stages, sorted);
        assert_eq!(stages.first(), Some(&RuleStage::Brand));
        assert_eq!(stages.last(), Some(&RuleStage::Generic));
    }

    #[test]
    fn test_submit_hover_rule_precedes_plain_button_rule() {
        let names: Vec<&str> = RewriteEngine::rules().iter().map(|r| r.name).collect();
        let hover = names.iter().position(|n| *n == "submit-button-hover").unwrap();
        let plain = names.iter().position(|n| *n == "submit-button").unwrap();
        assert!(hover < plain);
    }

    #[test]
    fn test_all_four_casings_replaced() {
        let content = "URL Shortener | URL shortener | url shortener | URL SHORTENER";
        let out = engine(None).rewrite_content(Path::new("templates/index.html"), content);
        assert_eq!(out, "Acme Links | Acme links | acme links | ACME LINKS");
    }

    #[test]
    fn test_name_substitution_is_not_word_bounded() {
        let out = engine(None).rewrite_content(Path::new("README.md"), "MyURL Shortenerish");
        assert_eq!(out, "MyAcme Linksish");
    }

    #[test]
    fn test_no_palette_leaves_colors_alone() {
        let css = "a { color: #4285f4; }";
        let out = engine(None).rewrite_content(Path::new("static/css/index.css"), css);
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn test_unknown_extension_untouched() {
        let out = engine(Some("#112233")).rewrite_content(Path::new("Dockerfile"), "URL Shortener");
        assert_eq!(out, "URL Shortener");
    }

    #[test]
    fn test_stylesheet_legacy_literals() {
        let css = "\
body { background: #e8f0fe; }
a { color: #4285f4; border: 1px solid #4285F4; }
a:hover { color: #1a73e8; }
.deep { color: #1557b0; outline-color: #0d47a1; }
.glow { box-shadow: 0 0 4px rgba(66, 133, 244, 0.3); }
.active { background: #d2e3fc; }
.keep { color: #333333; }
";
        let out = engine(Some("#112233")).rewrite_content(Path::new("static/css/index.css"), css);

        assert!(out.contains("background: rgba(17, 34, 51, 0.12)"));
        assert!(out.contains("a { color: #112233; border: 1px solid #112233; }"));
        assert!(out.contains("a:hover { color: #021324; }"));
        assert!(out.contains(".deep { color: #000415; outline-color: #00000b; }"));
        assert!(out.contains("rgba(17, 34, 51, 0.3)"));
        assert!(out.contains(".active { background: rgba(17, 34, 51, 0.18); }"));
        assert!(out.contains(".keep { color: #333333; }"));
        for legacy in ["#4285f4", "#4285F4", "#1a73e8", "#1557b0", "#0d47a1", "#e8f0fe", "#d2e3fc", "66, 133, 244"] {
            assert!(!out.contains(legacy), "{} survived", legacy);
        }
    }

    #[test]
    fn test_marker_rules_only_with_marker() {
        let palette = Some("#112233");
        let with_marker = "header h1 { margin: 0; color: var(--primary-color); }";
        let out = engine(palette).rewrite_content(Path::new("a.css"), with_marker);
        assert_eq!(out, "header h1 { margin: 0; color: #112233; }");

        let without = "h2 { color: var(--primary-color); }";
        let out = engine(palette).rewrite_content(Path::new("a.css"), without);
        assert_eq!(out, without);
    }

    #[test]
    fn test_submit_hover_gets_hover_shade() {
        let css = r#"button[type="submit"] { background-color: #4285f4; }
button[type="submit"]:hover { cursor: pointer; background-color: #1a73e8; }"#;
        let out = engine(Some("#646464")).rewrite_content(Path::new("index.css"), css);
        assert_eq!(
            out,
            r#"button[type="submit"] { background-color: #646464; }
button[type="submit"]:hover { cursor: pointer; background-color: #555555; }"#
        );
    }

    #[test]
    fn test_stats_markup_specific_rules_win() {
        let html = r##"<style>:root { --primary-color: #4285f4; }</style>
<script>chart.palette(["#4285f4", "#0f9d58"]);</script>"##;
        let out = engine(Some("#112233")).rewrite_content(Path::new("templates/stats_view.html"), html);
        assert!(out.contains("--primary-color: #112233"));
        assert!(out.contains(r##".palette(["#112233", "#000e1f", "#00000b"])"##));
    }

    #[test]
    fn test_markup_inline_background_uses_darker() {
        let html = r#"<div style="background-color: rgb(70, 17, 120)">x</div>"#;
        let out = engine(Some("#646464")).rewrite_content(Path::new("templates/index.html"), html);
        assert_eq!(out, r#"<div style="background-color: #323232">x</div>"#);
    }

    #[test]
    fn test_script_area_fill_is_stable() {
        let js = r#"series.area().fill("rgba(66, 133, 244, 0.3)", 0.4);"#;
        let e = engine(Some("#112233"));
        let once = e.rewrite_content(Path::new("static/js/stats.js"), js).into_owned();
        assert_eq!(once, r#"series.area().fill("rgba(17, 34, 51, 0.12)", 0.6);"#);
        let twice = e.rewrite_content(Path::new("static/js/stats.js"), &once);
        assert_eq!(twice, once);
    }

    #[test]
    fn test_script_legacy_quoted_colors() {
        let js = r##"line.stroke("#4285f4"); bar.fill('#DC3912'); other("#123456");"##;
        let out = engine(Some("#112233")).rewrite_content(Path::new("app.js"), js);
        assert_eq!(out, r##"line.stroke("#112233"); bar.fill('#112233'); other("#123456");"##);
    }

    #[test]
    fn test_swap_hex_replaces_first_only() {
        assert_eq!(swap_hex(r##"fill("#4285f4")"##, "#112233"), r##"fill("#112233")"##);
        assert_eq!(swap_hex("#aaaaaa #bbbbbb", "#000000"), "#000000 #bbbbbb");
    }

    #[test]
    fn test_rewrite_tree_is_deterministic_and_skips_binaries() {
        let run = || {
            let dir = tempdir().unwrap();
            let root = dir.path();
            fs::create_dir_all(root.join("templates")).unwrap();
            fs::create_dir_all(root.join("static/css")).unwrap();
            fs::write(root.join("templates/index.html"), "<h1>URL Shortener</h1>").unwrap();
            fs::write(root.join("static/css/index.css"), "a { color: #4285f4; }").unwrap();
            fs::write(root.join("logo.png"), [0x89, b'P', b'N', b'G', 0xff, 0xfe]).unwrap();

            let report = engine(Some("#112233")).rewrite_tree(root);
            let html = fs::read_to_string(root.join("templates/index.html")).unwrap();
            let css = fs::read_to_string(root.join("static/css/index.css")).unwrap();
            let png = fs::read(root.join("logo.png")).unwrap();
            (report, html, css, png)
        };

        let (report, html, css, png) = run();
        assert_eq!(report.files_scanned, 2);
        assert_eq!(report.files_changed, 2);
        assert!(report.failures.is_empty());
        assert_eq!(html, "<h1>Acme Links</h1>");
        assert_eq!(css, "a { color: #112233; }");
        assert_eq!(png, vec![0x89, b'P', b'N', b'G', 0xff, 0xfe]);

        let (_, html2, css2, _) = run();
        assert_eq!((html, css), (html2, css2));
    }

    #[test]
    fn test_untouched_file_keeps_invalid_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        let bytes = [b'o', b'k', 0xff, b'!'];
        fs::write(&path, bytes).unwrap();

        let report = engine(Some("#112233")).rewrite_tree(dir.path());
        assert_eq!(report.files_changed, 0);
        assert_eq!(fs::read(&path).unwrap(), bytes);
    }
}
