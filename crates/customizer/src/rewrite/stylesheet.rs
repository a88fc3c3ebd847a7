//! Color rules for stylesheets
//!
//! Block rules are keyed on a marker selector being present in the file,
//! so they never touch stylesheets that lack that block. Block rewrites
//! keep every other declaration in the block.

use super::rules::{ColorFn, FileClass, Producer, RewriteRule, RuleScope, RuleStage};

const STATS_STYLES: RuleScope = RuleScope::PathContains(&["stats-view.css", "stats.css"]);

const LEGACY_GRADIENT: &str = "linear-gradient(to right, #4285f4, #4285f4, #34a853, #fbbc04, #ea4335)";

fn specific(name: &'static str, scope: RuleScope, pattern: &str, produce: ColorFn) -> RewriteRule {
    RewriteRule::pattern(
        name,
        RuleStage::Specific,
        Some(FileClass::Stylesheet),
        scope,
        pattern,
        Producer::Color(produce),
    )
}

fn generic_literal(name: &'static str, text: &str, produce: ColorFn) -> RewriteRule {
    RewriteRule::literal(
        name,
        RuleStage::Generic,
        Some(FileClass::Stylesheet),
        RuleScope::Any,
        text,
        Producer::Color(produce),
    )
}

/// `<selector> { ... <property>: <value>` with everything before the
/// property captured in group 1. The property must start a declaration,
/// so `color` never matches inside `background-color`.
fn block_declaration(selector: &str, property: &str, value: &str) -> String {
    format!(
        r"({selector}\s*\{{(?:[^}}]*?[\s;])?){property}:\s*{value}",
        selector = selector,
        property = property,
        value = value
    )
}

pub(crate) fn rules() -> Vec<RewriteRule> {
    vec![
        specific("stats-purple-hex", STATS_STYLES, "#250096", |p, _| p.darker.clone()),
        specific("stats-purple-rgb", STATS_STYLES, r"rgb\(70,\s*17,\s*120\)", |p, _| {
            p.darker.clone()
        }),
        RewriteRule::literal(
            "header-gradient",
            RuleStage::Specific,
            Some(FileClass::Stylesheet),
            RuleScope::Any,
            LEGACY_GRADIENT,
            Producer::Color(|p, _| {
                format!(
                    "linear-gradient(to right, {a}, {a}, {a}, {h}, {d})",
                    a = p.accent,
                    h = p.hover,
                    d = p.shade(-30)
                )
            }),
        ),
        specific(
            "password-focus-border",
            RuleScope::ContentContains("#password:focus"),
            r"border-color:\s*(?:#4285f4|#1a73e8)",
            |p, _| format!("border-color: {}", p.accent),
        ),
        specific(
            "navbar-hover",
            RuleScope::ContentContains(".navbar a {"),
            &block_declaration(r"\.navbar a:hover", "color", "#4285f4"),
            |p, caps| format!("{}color: {}", &caps[1], p.accent),
        ),
        specific(
            "navbar-active",
            RuleScope::ContentContains(".navbar a {"),
            &block_declaration(r"\.navbar a\.active", "color", "#4285f4"),
            |p, caps| format!("{}color: {}", &caps[1], p.accent),
        ),
        // Hover must run before the plain button rule rewrites #1a73e8
        specific(
            "submit-button-hover",
            RuleScope::ContentContains(r#"button[type="submit"]:hover"#),
            &block_declaration(r#"button\[type="submit"\]:hover"#, "background-color", "#1a73e8"),
            |p, caps| format!("{}background-color: {}", &caps[1], p.hover),
        ),
        specific(
            "submit-button",
            RuleScope::ContentContains(r#"button[type="submit"]"#),
            r"background-color:\s*(?:#4285f4|#1a73e8)",
            |p, _| format!("background-color: {}", p.accent),
        ),
        specific(
            "features-heading",
            RuleScope::ContentContains(".features h2"),
            &block_declaration(r"\.features h2", "color", r"var\(--primary-color\)"),
            |p, caps| format!("{}color: {}", &caps[1], p.accent),
        ),
        specific(
            "scrollbar-thumb",
            RuleScope::ContentContains("scrollbar-thumb"),
            r"rgba\(66, 133, 244,",
            |p, _| format!("rgba({},", p.rgb),
        ),
        specific(
            "header-heading",
            RuleScope::ContentContains("header h1"),
            &block_declaration(r"header h1", "color", r"var\(--primary-color\)"),
            |p, caps| format!("{}color: {}", &caps[1], p.accent),
        ),
        // Legacy literal map
        generic_literal("blue", "#4285f4", |p, _| p.accent.clone()),
        generic_literal("blue-upper", "#4285F4", |p, _| p.accent.to_uppercase()),
        generic_literal("blue-hover", "#1a73e8", |p, _| p.hover.clone()),
        generic_literal("blue-deep", "#1557b0", |p, _| p.shade(-30)),
        generic_literal("blue-deepest", "#0d47a1", |p, _| p.shade(-40)),
        RewriteRule::pattern(
            "blue-translucent",
            RuleStage::Generic,
            Some(FileClass::Stylesheet),
            RuleScope::Any,
            r"rgba\(66, 133, 244, (0\.15|0\.3|0\.4|0\.5|0\.7)\)",
            Producer::Color(|p, caps| p.rgba(&caps[1])),
        ),
        generic_literal("blue-hover-translucent", "rgba(26, 115, 232, 0.2)", |p, _| {
            p.rgba("0.2")
        }),
        generic_literal("blue-deepest-translucent", "rgba(13, 71, 161, 0.2)", |p, _| {
            format!("rgba({}, 0.2)", p.shade_rgb(-30))
        }),
        generic_literal("light-background", "#e8f0fe", |p, _| p.light_bg.clone()),
        generic_literal("lighter-background", "#d2e3fc", |p, _| p.lighter_bg.clone()),
    ]
}
