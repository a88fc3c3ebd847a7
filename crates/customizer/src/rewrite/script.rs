//! Color rules for scripts

use super::rules::{FileClass, Producer, RewriteRule, RuleScope, RuleStage};
use super::{LEGACY_DOUBLE_QUOTED, LEGACY_SINGLE_QUOTED};

const STATS_SCRIPTS: RuleScope =
    RuleScope::PathContains(&["stats-view-script.js", "stats-script.js"]);

/// `.area().fill(...)` with at most one level of nested parentheses, so
/// an already rewritten `fill("rgba(...)", 0.6)` matches as a whole
const AREA_FILL: &str = r"\.area\(\)\s*\.\s*fill\((?:[^()]|\([^()]*\))*\)";

pub(crate) fn rules() -> Vec<RewriteRule> {
    let script = |name, stage, scope, pattern: &str, producer| {
        RewriteRule::pattern(name, stage, Some(FileClass::Script), scope, pattern, producer)
    };

    vec![
        script(
            "stats-purple-hex",
            RuleStage::Specific,
            STATS_SCRIPTS,
            "#250096",
            Producer::Color(|p, _| p.darker.clone()),
        ),
        script(
            "stats-purple-rgb",
            RuleStage::Specific,
            STATS_SCRIPTS,
            r"rgb\(70,\s*17,\s*120\)",
            Producer::Color(|p, _| p.darker.clone()),
        ),
        script(
            "legacy-double-quoted",
            RuleStage::Generic,
            RuleScope::Any,
            LEGACY_DOUBLE_QUOTED,
            Producer::Color(|p, _| format!("\"{}\"", p.accent)),
        ),
        script(
            "legacy-single-quoted",
            RuleStage::Generic,
            RuleScope::Any,
            LEGACY_SINGLE_QUOTED,
            Producer::Color(|p, _| format!("'{}'", p.accent)),
        ),
        script(
            "area-fill",
            RuleStage::Generic,
            RuleScope::Any,
            AREA_FILL,
            Producer::Color(|p, _| format!(r#".area().fill("{}", 0.6)"#, p.light_bg)),
        ),
    ]
}
