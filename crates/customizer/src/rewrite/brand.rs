//! Product-name substitution
//!
//! Four literal casings of the template's product phrase are replaced by
//! the matching casing of the new name. Matching is plain substring
//! matching: "URL Shortener" inside a longer word is replaced too.

use super::rules::{Producer, RewriteRule, RuleScope, RuleStage};

/// Product phrase used throughout the template
pub const PRODUCT_PHRASE: &str = "URL Shortener";

/// "Acme LINKS" -> "Acme links"
pub fn sentence_case(name: &str) -> String {
    let lower = name.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn brand(name: &'static str, phrase: &str, produce: fn(&str) -> String) -> RewriteRule {
    RewriteRule::literal(
        name,
        RuleStage::Brand,
        None,
        RuleScope::Any,
        phrase,
        Producer::Brand(produce),
    )
}

pub(crate) fn rules() -> Vec<RewriteRule> {
    vec![
        brand("brand-as-given", "URL Shortener", |name| name.to_string()),
        brand("brand-sentence", "URL shortener", sentence_case),
        brand("brand-lower", "url shortener", |name| name.to_lowercase()),
        brand("brand-upper", "URL SHORTENER", |name| name.to_uppercase()),
    ]
}
