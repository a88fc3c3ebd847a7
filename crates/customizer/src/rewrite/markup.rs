//! Color rules for HTML templates
//!
//! Stats views carry an extended catalogue for the chart library's
//! variables, palettes and dataset colors; every page gets the generic
//! inline-style and legacy-literal rules.

use super::rules::{ColorFn, FileClass, Producer, RewriteRule, RuleScope, RuleStage};
use super::{swap_hex, LEGACY_DOUBLE_QUOTED, LEGACY_SINGLE_QUOTED};

const STATS_VIEW: RuleScope = RuleScope::PathContains(&["stats_view.html", "stats-view.html"]);
const STATS_CHARTS: RuleScope = RuleScope::PathContains(&["stats_view.html", "stats.html"]);

const HEX6: &str = "#[0-9a-fA-F]{6}";

fn specific(name: &'static str, scope: RuleScope, pattern: &str, produce: ColorFn) -> RewriteRule {
    RewriteRule::pattern(
        name,
        RuleStage::Specific,
        Some(FileClass::Markup),
        scope,
        pattern,
        Producer::Color(produce),
    )
}

fn generic(name: &'static str, pattern: &str, produce: ColorFn) -> RewriteRule {
    RewriteRule::pattern(
        name,
        RuleStage::Generic,
        Some(FileClass::Markup),
        RuleScope::Any,
        pattern,
        Producer::Color(produce),
    )
}

fn generic_literal(name: &'static str, text: &str, produce: ColorFn) -> RewriteRule {
    RewriteRule::literal(
        name,
        RuleStage::Generic,
        Some(FileClass::Markup),
        RuleScope::Any,
        text,
        Producer::Color(produce),
    )
}

pub(crate) fn rules() -> Vec<RewriteRule> {
    let chart_color_calls = format!(
        r#"(?:palette\(\["{h}"\]|\.fill\(\["{h}"\]\)|fill\("{h}"\)|stroke\("{h}"\)|color:\s*"{h}"|background:\s*"{h}")"#,
        h = HEX6
    );
    let quoted_color = r#"['"](?:rgba\([^)]+\)|#[0-9a-fA-F]{6})['"]"#;
    let color_array = |key: &str| {
        format!(
            r"{key}:\s*\[\s*{q}(?:\s*,\s*{q})*\s*\]",
            key = key,
            q = quoted_color
        )
    };

    vec![
        // Stats view theme variables and chart calls
        specific("stats-primary-color", STATS_VIEW, r"--primary-color:\s*#[0-9a-fA-F]{6}", |p, _| {
            format!("--primary-color: {}", p.accent)
        }),
        specific("stats-primary-light", STATS_VIEW, r"--primary-light:\s*rgba\([^)]+\)", |p, _| {
            format!("--primary-light: {}", p.rgba("0.2"))
        }),
        specific("stats-primary-dark", STATS_VIEW, r"--primary-dark:\s*#[0-9a-fA-F]{6}", |p, _| {
            format!("--primary-dark: {}", p.hover)
        }),
        specific("stats-secondary-color", STATS_VIEW, r"--secondary-color:\s*#[0-9a-fA-F]{6}", |p, _| {
            format!("--secondary-color: {}", p.shade(-30))
        }),
        specific("stats-secondary-light", STATS_VIEW, r"--secondary-light:\s*rgba\([^)]+\)", |p, _| {
            format!("--secondary-light: rgba({}, 0.2)", p.shade_rgb(-30))
        }),
        specific("stats-line-stroke", STATS_VIEW, r"chart\.line\(\)\s*\.\s*stroke\(.*?\)", |p, _| {
            format!(r#"chart.line().stroke("{}", 2)"#, p.accent)
        }),
        specific("stats-series-stroke", STATS_VIEW, r"series\.stroke\(.*?\)", |p, _| {
            format!(r#"series.stroke("{}", 2)"#, p.accent)
        }),
        specific("stats-color-call", STATS_VIEW, r#"\.color\(".*?"\)"#, |p, _| {
            format!(r#".color("{}")"#, p.accent)
        }),
        specific("stats-chart-background", STATS_VIEW, r#"chart\.background\(\)\.fill\(".*?"\)"#, |p, _| {
            format!(r#"chart.background().fill("{}")"#, p.light_bg)
        }),
        specific(
            "stats-plot-background",
            STATS_VIEW,
            r#"chart\.plot\(\)\.background\(\)\.fill\(".*?"\)"#,
            |p, _| format!(r#"chart.plot().background().fill("{}")"#, p.light_bg),
        ),
        specific("stats-theme", STATS_VIEW, r"anychart\.theme\(anychart\.themes\.\w+\)", |_, _| {
            "anychart.theme(anychart.themes.lightBlue)".to_string()
        }),
        specific("stats-palette", STATS_VIEW, r"\.palette\(\[.*?\]\)", |p, _| {
            format!(
                r#".palette(["{}", "{}", "{}"])"#,
                p.accent,
                p.shade(-20),
                p.shade(-40)
            )
        }),
        // Stats chart datasets
        specific("dataset-background-sq", STATS_CHARTS, r"backgroundColor:\s*'rgba\([^)]+\)'", |p, _| {
            format!("backgroundColor: '{}'", p.rgba("0.2"))
        }),
        specific("dataset-border-sq", STATS_CHARTS, r"borderColor:\s*'rgba\([^)]+\)'", |p, _| {
            format!("borderColor: '{}'", p.rgba("1"))
        }),
        specific("dataset-background-dq", STATS_CHARTS, r#"backgroundColor:\s*"rgba\([^)]+\)""#, |p, _| {
            format!(r#"backgroundColor: "{}""#, p.rgba("0.2"))
        }),
        specific("dataset-border-dq", STATS_CHARTS, r#"borderColor:\s*"rgba\([^)]+\)""#, |p, _| {
            format!(r#"borderColor: "{}""#, p.rgba("1"))
        }),
        specific(
            "dataset-known-blues",
            STATS_CHARTS,
            r"rgba\((?:25,\s*118,\s*210|66,\s*133,\s*244|26,\s*115,\s*232|33,\s*150,\s*243|3,\s*169,\s*244|0,\s*188,\s*212),\s*([0-9.]+)\)",
            |p, caps| p.rgba(&caps[1]),
        ),
        specific(
            "dataset-background-hex",
            STATS_CHARTS,
            r#"backgroundColor:\s*['"]#[0-9a-fA-F]{6}['"]"#,
            |p, _| format!("backgroundColor: '{}'", p.light_bg),
        ),
        specific(
            "dataset-border-hex",
            STATS_CHARTS,
            r#"borderColor:\s*['"]#[0-9a-fA-F]{6}['"]"#,
            |p, _| format!("borderColor: '{}'", p.accent),
        ),
        specific("chart-color-calls", STATS_CHARTS, &chart_color_calls, |p, caps| {
            swap_hex(&caps[0], &p.accent)
        }),
        specific(
            "chart-area-fill",
            STATS_CHARTS,
            r#"\.fill\("rgba\((\d+),\s*(\d+),\s*(\d+),\s*([0-9.]+)\)"\)"#,
            |p, _| format!(r#".fill("{}")"#, p.rgba("0.1")),
        ),
        specific("dataset-background-array", STATS_CHARTS, &color_array("backgroundColor"), |p, _| {
            format!("backgroundColor: ['{}']", p.rgba("0.2"))
        }),
        specific("dataset-border-array", STATS_CHARTS, &color_array("borderColor"), |p, _| {
            format!("borderColor: ['{}']", p.rgba("1"))
        }),
        // Every page
        generic(
            "inline-background",
            r#"style="background-color:\s*(?:rgb\([^)]+\)|#[0-9a-fA-F]{6}|#[0-9a-fA-F]{3})""#,
            |p, _| format!(r#"style="background-color: {}""#, p.darker),
        ),
        generic("background-color-blue", r"background-color:\s*#4285f4", |p, _| {
            format!("background-color: {}", p.accent)
        }),
        generic("color-blue", r"color:\s*#4285f4", |p, _| format!("color: {}", p.accent)),
        generic("purple-rgb", r"rgb\(70,\s*17,\s*120\)", |p, _| p.darker.clone()),
        generic_literal("purple-hex", "#250096", |p, _| p.darker.clone()),
        generic("legacy-double-quoted", LEGACY_DOUBLE_QUOTED, |p, _| {
            format!("\"{}\"", p.accent)
        }),
        generic("legacy-single-quoted", LEGACY_SINGLE_QUOTED, |p, _| {
            format!("'{}'", p.accent)
        }),
        generic_literal(
            "dataset-literal-background",
            "backgroundColor: 'rgba(25, 118, 210, 0.2)'",
            |p, _| format!("backgroundColor: '{}'", p.rgba("0.2")),
        ),
        generic_literal(
            "dataset-literal-border",
            "borderColor: 'rgba(25, 118, 210, 1)'",
            |p, _| format!("borderColor: '{}'", p.rgba("1")),
        ),
    ]
}
