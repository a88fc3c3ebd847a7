//! Feature Toggle Engine
//!
//! Comments out (never deletes) the form blocks of optional features that
//! were not selected, then adjusts the layout of what is left.

use forge_common::Feature;
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

/// Page holding the optional feature inputs, relative to the site root
pub const INDEX_PAGE: &str = "templates/index.html";

/// Stylesheet of [`INDEX_PAGE`]
pub const INDEX_STYLESHEET: &str = "static/css/index.css";

const OPTIONS_CONTAINER: &str = r#"<div class="options-container">"#;
const PASSWORD_DIV: &str = r#"<div id="password-div">"#;
const CLICKS_DIV: &str = r#"<div id="clicks-div">"#;

static ALIAS_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<div class="child">\s*<label for="alias">Custom Alias</label>.*?<p id="non-imp">Leave blank for a random short URL</p>\s*</div>"#,
    )
    .expect("invalid alias block pattern")
});

static PASSWORD_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<div id="password-div">.*?</div>"#).expect("invalid password block pattern")
});

static PASSWORD_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&regex::escape(
        r#"<div id="password-error" class="error-message hidden"></div>"#,
    ))
    .expect("invalid password error pattern")
});

static CLICKS_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<div id="clicks-div">.*?</div>"#).expect("invalid clicks block pattern")
});

/// Top-level `#password { ... }` rule only; compound selectors that merely
/// start with `#password` do not match
static PASSWORD_RULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^#password\s*\{[^}]*\}").expect("invalid password rule pattern")
});

const FULL_WIDTH_RULES: &str = r#"
/* Styles for full-width form elements */
.full-width {
    width: 100% !important;
    max-width: 100% !important;
}

.options-container > div.full-width {
    width: 100% !important;
}

.full-width input {
    width: 100% !important;
    max-width: 100% !important;
}

/* A lone option takes the whole row */
.options-container > div:only-child {
    width: 100% !important;
}

.options-container > div:only-child input {
    width: 100% !important;
}

#advanced-options:not(:has(.options-container)) {
    margin-bottom: 20px;
}

#password-div.full-width #password {
    width: 100% !important;
    max-width: none !important;
}

#clicks-div.full-width #max-clicks {
    width: 100% !important;
    max-width: none !important;
}
"#;

const CANONICAL_PASSWORD_RULE: &str = r#"#password {
    display: block;
    width: 100%;
    padding: 14px 18px;
    border-radius: 16px;
    font-size: 1rem;
    color: #3c4043;
    background: #f5f5f5;
    border: 1px solid rgba(0, 0, 0, 0.06);
    transition: all 0.25s ease;
    box-shadow: 0 1px 3px rgba(0, 0, 0, 0.02);
    margin-top: 20px;
    font-family: 'Inter', -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, Cantarell, 'Open Sans', 'Helvetica Neue', sans-serif;
}"#;

/// What the markup pass did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ToggleReport {
    /// Features whose blocks were found and commented out
    pub disabled: Vec<Feature>,
    /// The one remaining option that received the full-width class
    pub full_width: Option<Feature>,
    /// Whether the shared options container was commented out
    pub container_hidden: bool,
    pub markup_changed: bool,
    pub stylesheet_changed: bool,
}

pub struct FeatureToggle<'a> {
    selected: &'a BTreeSet<Feature>,
}

impl<'a> FeatureToggle<'a> {
    pub fn new(selected: &'a BTreeSet<Feature>) -> Self {
        Self { selected }
    }

    /// Apply the selection to the site rooted at `site_root`.
    ///
    /// Missing or unreadable target files are logged and skipped.
    pub fn apply(&self, site_root: &Path) -> ToggleReport {
        let mut report = ToggleReport::default();

        let page = site_root.join(INDEX_PAGE);
        if !page.exists() {
            warn!("Index page not found at {}", page.display());
            return report;
        }

        match self.apply_to_page(&page, &mut report) {
            Ok(()) => {}
            Err(e) => {
                warn!("Error toggling features in {}: {}", page.display(), e);
                return report;
            }
        }

        let stylesheet = site_root.join(INDEX_STYLESHEET);
        if !stylesheet.exists() {
            warn!("Stylesheet not found at {}", stylesheet.display());
            return report;
        }
        match normalize_file(&stylesheet) {
            Ok(changed) => report.stylesheet_changed = changed,
            Err(e) => warn!("Error adding full-width rules to {}: {}", stylesheet.display(), e),
        }

        report
    }

    fn apply_to_page(&self, page: &Path, report: &mut ToggleReport) -> std::io::Result<()> {
        let bytes = fs::read(page)?;
        let original = String::from_utf8_lossy(&bytes);
        let updated = self.toggle_markup(&original, report);

        if updated != original {
            fs::write(page, updated.as_bytes())?;
            report.markup_changed = true;
            info!("Feature toggles applied: disabled {:?}", report.disabled);
        }
        Ok(())
    }

    /// Pure markup transform behind [`FeatureToggle::apply`]
    pub fn toggle_markup(&self, content: &str, report: &mut ToggleReport) -> String {
        let mut content = content.to_string();

        if !self.selected.contains(&Feature::CustomAlias) {
            if let Some(updated) = comment_out(&ALIAS_BLOCK, &content) {
                content = updated;
                report.disabled.push(Feature::CustomAlias);
            }
        }

        let password_off = !self.selected.contains(&Feature::PasswordProtection);
        let clicks_off = !self.selected.contains(&Feature::ClickLimit);

        if password_off {
            if let Some(updated) = comment_out(&PASSWORD_BLOCK, &content) {
                content = updated;
                report.disabled.push(Feature::PasswordProtection);
            }
            if let Some(updated) = comment_out(&PASSWORD_ERROR, &content) {
                content = updated;
            }
        }

        if clicks_off {
            if let Some(updated) = comment_out(&CLICKS_BLOCK, &content) {
                content = updated;
                report.disabled.push(Feature::ClickLimit);
            }
        }

        match (password_off, clicks_off) {
            (false, true) => {
                content = content.replace(PASSWORD_DIV, r#"<div id="password-div" class="full-width">"#);
                report.full_width = Some(Feature::PasswordProtection);
            }
            (true, false) => {
                content = content.replace(CLICKS_DIV, r#"<div id="clicks-div" class="full-width">"#);
                report.full_width = Some(Feature::ClickLimit);
            }
            (true, true) => match comment_out_container(&content, OPTIONS_CONTAINER) {
                Some(updated) => {
                    content = updated;
                    report.container_hidden = true;
                }
                None if content.contains(OPTIONS_CONTAINER) => {
                    debug!("Options container already commented out")
                }
                None => warn!("No balanced options container found; leaving it in place"),
            },
            (false, false) => {}
        }

        content
    }
}

/// Byte ranges of the `<!-- ... -->` comments in `content`; an unclosed
/// comment runs to the end
fn comment_spans(content: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut pos = 0;
    while let Some(open) = content[pos..].find("<!--") {
        let start = pos + open;
        let body = start + "<!--".len();
        let end = match content[body..].find("-->") {
            Some(close) => body + close + "-->".len(),
            None => content.len(),
        };
        spans.push((start, end));
        pos = end;
    }
    spans
}

fn in_comment(spans: &[(usize, usize)], offset: usize) -> bool {
    spans.iter().any(|&(start, end)| start <= offset && offset < end)
}

/// Wrap every match of `pattern` that is not already commented out
fn comment_out(pattern: &Regex, content: &str) -> Option<String> {
    let spans = comment_spans(content);
    let mut updated = String::with_capacity(content.len() + 16);
    let mut last = 0;
    for found in pattern.find_iter(content) {
        if in_comment(&spans, found.start()) {
            continue;
        }
        updated.push_str(&content[last..found.start()]);
        updated.push_str("<!-- ");
        updated.push_str(found.as_str());
        updated.push_str(" -->");
        last = found.end();
    }
    if last == 0 {
        return None;
    }
    updated.push_str(&content[last..]);
    Some(updated)
}

/// Byte offset just past the `</div>` closing the `<div` at `start`
fn matching_div_end(content: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut pos = start;

    loop {
        let rest = &content[pos..];
        match (rest.find("<div"), rest.find("</div>")) {
            (Some(open), Some(close)) if open < close => {
                depth += 1;
                pos += open + "<div".len();
            }
            (_, Some(close)) => {
                depth = depth.checked_sub(1)?;
                pos += close + "</div>".len();
                if depth == 0 {
                    return Some(pos);
                }
            }
            (_, None) => return None,
        }
    }
}

/// Wrap the whole element opened by `opening` in one comment. Comment
/// delimiters already inside it are folded away, since HTML comments do
/// not nest.
fn comment_out_container(content: &str, opening: &str) -> Option<String> {
    let spans = comment_spans(content);
    let start = content
        .match_indices(opening)
        .map(|(start, _)| start)
        .find(|&start| !in_comment(&spans, start))?;
    let end = matching_div_end(content, start)?;
    let inner = content[start..end].replace("<!--", "").replace("-->", "");

    debug!("Commenting out options container ({} bytes)", end - start);
    Some(format!(
        "{}<!-- {} -->{}",
        &content[..start],
        inner,
        &content[end..]
    ))
}

/// Append the full-width rules when missing and canonicalize the
/// `#password` rule
pub fn normalize_stylesheet(content: &str) -> String {
    let mut content = content.to_string();
    if !content.contains(".full-width") {
        content.push_str(FULL_WIDTH_RULES);
    }
    PASSWORD_RULE
        .replace_all(&content, regex::NoExpand(CANONICAL_PASSWORD_RULE))
        .into_owned()
}

fn normalize_file(path: &Path) -> std::io::Result<bool> {
    let bytes = fs::read(path)?;
    let original = String::from_utf8_lossy(&bytes);
    let updated = normalize_stylesheet(&original);
    if updated == original {
        return Ok(false);
    }
    fs::write(path, updated)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PAGE: &str = r#"<form>
<div class="child">
    <label for="alias">Custom Alias</label>
    <input id="alias" name="alias">
    <p id="non-imp">Leave blank for a random short URL</p>
</div>
<div id="advanced-options">
<div class="options-container">
<div id="password-div"><input id="password" type="password"></div>
<div id="clicks-div"><input id="max-clicks" type="number"></div>
</div>
</div>
<div id="password-error" class="error-message hidden"></div>
</form>"#;

    fn selection(features: &[Feature]) -> BTreeSet<Feature> {
        features.iter().copied().collect()
    }

    fn toggle(features: &[Feature]) -> (String, ToggleReport) {
        let selected = selection(features);
        let mut report = ToggleReport::default();
        let out = FeatureToggle::new(&selected).toggle_markup(PAGE, &mut report);
        (out, report)
    }

    #[test]
    fn test_all_selected_is_noop() {
        let (out, report) = toggle(&Feature::ALL);
        assert_eq!(out, PAGE);
        assert!(report.disabled.is_empty());
        assert_eq!(report.full_width, None);
    }

    #[test]
    fn test_alias_disabled_is_commented_not_deleted() {
        let (out, report) = toggle(&[Feature::PasswordProtection, Feature::ClickLimit]);
        assert!(out.contains(r#"<!-- <div class="child">"#));
        assert!(out.contains("random short URL</p>\n</div> -->"));
        assert!(out.contains(r#"<input id="alias" name="alias">"#));
        assert_eq!(report.disabled, vec![Feature::CustomAlias]);
    }

    #[test]
    fn test_single_remaining_option_gets_full_width() {
        let (out, report) = toggle(&[Feature::CustomAlias, Feature::PasswordProtection]);
        assert!(out.contains(r#"<div id="password-div" class="full-width"><input id="password""#));
        assert!(out.contains(r#"<!-- <div id="clicks-div">"#));
        assert!(!out.contains(r#"<!-- <div class="options-container">"#));
        assert_eq!(report.full_width, Some(Feature::PasswordProtection));
        assert!(!report.container_hidden);

        let (out, report) = toggle(&[Feature::ClickLimit]);
        assert!(out.contains(r#"<div id="clicks-div" class="full-width">"#));
        assert!(out.contains(r#"<!-- <div id="password-error" class="error-message hidden"></div> -->"#));
        assert_eq!(report.full_width, Some(Feature::ClickLimit));
    }

    #[test]
    fn test_both_disabled_hides_container_as_one_comment() {
        let (out, report) = toggle(&[Feature::CustomAlias]);
        assert!(report.container_hidden);
        assert_eq!(report.full_width, None);

        let start = out.find(r#"<!-- <div class="options-container">"#).unwrap();
        let end = start + out[start..].find("-->").unwrap();
        let comment = &out[start + 4..end];
        assert!(!comment.contains("<!--"));
        assert!(comment.contains(r#"<div id="clicks-div">"#));
        // The enclosing advanced-options div stays active and balanced
        assert!(out[end..].starts_with("-->\n</div>"));
        assert!(out.contains(r#"<div class="child">"#));
    }

    #[test]
    fn test_second_pass_changes_nothing() {
        for features in [
            vec![],
            vec![Feature::CustomAlias],
            vec![Feature::ClickLimit],
            vec![Feature::PasswordProtection, Feature::ClickLimit],
        ] {
            let selected = selection(&features);
            let toggle = FeatureToggle::new(&selected);
            let once = toggle.toggle_markup(PAGE, &mut ToggleReport::default());
            let mut report = ToggleReport::default();
            let twice = toggle.toggle_markup(&once, &mut report);

            assert_eq!(twice, once, "features {:?}", features);
            assert!(report.disabled.is_empty());
            assert!(!twice.contains("<!-- <!--"));
        }
    }

    #[test]
    fn test_comment_spans() {
        let html = "a<!-- b -->c<!-- d";
        assert_eq!(comment_spans(html), vec![(1, 11), (12, html.len())]);
        assert!(in_comment(&comment_spans(html), 5));
        assert!(!in_comment(&comment_spans(html), 11));
    }

    #[test]
    fn test_matching_div_end_handles_nesting() {
        let html = "<div a><div b></div><div c></div></div>tail";
        let end = matching_div_end(html, 0).unwrap();
        assert_eq!(&html[end..], "tail");
        assert_eq!(matching_div_end("<div><div></div>", 0), None);
    }

    #[test]
    fn test_normalize_stylesheet() {
        let css = "#password {\n    color: red;\n}\n\n#password-div #password { width: 50%; }\n";
        let out = normalize_stylesheet(css);
        assert!(out.starts_with(CANONICAL_PASSWORD_RULE));
        assert!(out.contains("#password-div #password { width: 50%; }"));
        assert!(out.contains(".full-width {"));
        assert_eq!(normalize_stylesheet(&out), out);
    }

    #[test]
    fn test_apply_missing_files_is_soft() {
        let dir = tempdir().unwrap();
        let selected = selection(&[]);
        let report = FeatureToggle::new(&selected).apply(dir.path());
        assert_eq!(report, ToggleReport::default());
    }

    #[test]
    fn test_apply_writes_page_and_stylesheet() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("templates")).unwrap();
        fs::create_dir_all(dir.path().join("static/css")).unwrap();
        fs::write(dir.path().join(INDEX_PAGE), PAGE).unwrap();
        fs::write(dir.path().join(INDEX_STYLESHEET), "body { margin: 0; }\n").unwrap();

        let selected = selection(&[Feature::CustomAlias]);
        let report = FeatureToggle::new(&selected).apply(dir.path());

        assert!(report.markup_changed);
        assert!(report.stylesheet_changed);
        let css = fs::read_to_string(dir.path().join(INDEX_STYLESHEET)).unwrap();
        assert!(css.contains(".options-container > div:only-child"));
    }
}
