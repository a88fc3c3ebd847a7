//! Typed rewrite rules
//!
//! A rule is a (file class, scope, matcher, producer) tuple. Rules are
//! evaluated stage by stage: [`RuleStage::Brand`] first, then
//! [`RuleStage::Specific`], then [`RuleStage::Generic`], so that a
//! narrowly scoped rewrite is never overwritten by a catalogue-wide one.

use forge_common::ThemePalette;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::path::Path;

/// Text file classes the engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileClass {
    Markup,
    Stylesheet,
    Script,
    /// Other text files that only receive name substitution
    Text,
}

impl FileClass {
    /// Classify by extension; `None` means the file is never rewritten
    pub fn of(path: &Path) -> Option<FileClass> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "html" => Some(FileClass::Markup),
            "css" => Some(FileClass::Stylesheet),
            "js" => Some(FileClass::Script),
            "py" | "md" | "txt" => Some(FileClass::Text),
            _ => None,
        }
    }
}

/// Evaluation stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RuleStage {
    Brand,
    Specific,
    Generic,
}

/// Further restriction beyond the file class
#[derive(Debug, Clone, Copy)]
pub enum RuleScope {
    Any,
    /// Path (as a string) contains one of these substrings
    PathContains(&'static [&'static str]),
    /// Current content contains this marker
    ContentContains(&'static str),
}

impl RuleScope {
    fn admits(&self, path: &str, content: &str) -> bool {
        match self {
            RuleScope::Any => true,
            RuleScope::PathContains(needles) => needles.iter().any(|n| path.contains(n)),
            RuleScope::ContentContains(marker) => content.contains(marker),
        }
    }
}

/// Palette-driven replacement for one match
pub type ColorFn = fn(&ThemePalette, &Captures<'_>) -> String;

/// Builds the replacement text for one match
#[derive(Clone, Copy)]
pub enum Producer {
    /// Computed from the display name; matched text is ignored
    Brand(fn(&str) -> String),
    /// Computed from the palette and the match captures
    Color(ColorFn),
}

/// Inputs shared by every rule during one run
pub struct RuleContext<'a> {
    pub name: &'a str,
    pub palette: Option<&'a ThemePalette>,
}

pub struct RewriteRule {
    pub name: &'static str,
    pub stage: RuleStage,
    /// `None` applies to every text class
    pub class: Option<FileClass>,
    pub scope: RuleScope,
    pub matcher: Regex,
    pub producer: Producer,
}

impl RewriteRule {
    pub fn pattern(
        name: &'static str,
        stage: RuleStage,
        class: Option<FileClass>,
        scope: RuleScope,
        pattern: &str,
        producer: Producer,
    ) -> Self {
        Self {
            name,
            stage,
            class,
            scope,
            matcher: Regex::new(pattern).expect("invalid rewrite pattern"),
            producer,
        }
    }

    /// Matches `text` verbatim
    pub fn literal(
        name: &'static str,
        stage: RuleStage,
        class: Option<FileClass>,
        scope: RuleScope,
        text: &str,
        producer: Producer,
    ) -> Self {
        Self::pattern(name, stage, class, scope, &regex::escape(text), producer)
    }

    pub fn applies_to(&self, class: FileClass, path: &str, content: &str) -> bool {
        self.class.map_or(true, |c| c == class) && self.scope.admits(path, content)
    }

    /// Returns `Cow::Borrowed` when nothing matched or the rule is inactive
    pub fn apply<'c>(&self, content: &'c str, ctx: &RuleContext<'_>) -> Cow<'c, str> {
        match self.producer {
            Producer::Brand(produce) => {
                let replacement = produce(ctx.name);
                self.matcher
                    .replace_all(content, |_: &Captures<'_>| replacement.clone())
            }
            Producer::Color(produce) => match ctx.palette {
                Some(palette) => self
                    .matcher
                    .replace_all(content, |caps: &Captures<'_>| produce(palette, caps)),
                None => Cow::Borrowed(content),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_class_by_extension() {
        assert_eq!(FileClass::of(Path::new("a/index.HTML")), Some(FileClass::Markup));
        assert_eq!(FileClass::of(Path::new("index.css")), Some(FileClass::Stylesheet));
        assert_eq!(FileClass::of(Path::new("x.js")), Some(FileClass::Script));
        assert_eq!(FileClass::of(Path::new("main.py")), Some(FileClass::Text));
        assert_eq!(FileClass::of(Path::new("logo.png")), None);
        assert_eq!(FileClass::of(Path::new("Dockerfile")), None);
    }

    #[test]
    fn test_literal_rule_escapes_pattern() {
        let rule = RewriteRule::literal(
            "test",
            RuleStage::Generic,
            None,
            RuleScope::Any,
            "rgb(70, 17, 120)",
            Producer::Color(|p, _| p.darker.clone()),
        );
        let palette = ThemePalette::new("#646464".parse().unwrap());
        let ctx = RuleContext { name: "x", palette: Some(&palette) };

        assert_eq!(rule.apply("a rgb(70, 17, 120) b", &ctx), "a #323232 b");
        assert_eq!(rule.apply("rgb(70,17,120)", &ctx), "rgb(70,17,120)");
    }

    #[test]
    fn test_color_rule_inactive_without_palette() {
        let rule = RewriteRule::literal(
            "test",
            RuleStage::Generic,
            None,
            RuleScope::Any,
            "#4285f4",
            Producer::Color(|p, _| p.accent.clone()),
        );
        let ctx = RuleContext { name: "x", palette: None };
        assert!(matches!(rule.apply("#4285f4", &ctx), Cow::Borrowed(_)));
    }

    #[test]
    fn test_brand_replacement_is_not_expanded() {
        let rule = RewriteRule::literal(
            "brand",
            RuleStage::Brand,
            None,
            RuleScope::Any,
            "URL Shortener",
            Producer::Brand(|name| name.to_string()),
        );
        let ctx = RuleContext { name: "Links $1", palette: None };
        assert_eq!(rule.apply("<h1>URL Shortener</h1>", &ctx), "<h1>Links $1</h1>");
    }

    #[test]
    fn test_scope_admits() {
        assert!(RuleScope::PathContains(&["stats.css"]).admits("/x/static/css/stats.css", ""));
        assert!(!RuleScope::PathContains(&["stats.css"]).admits("/x/index.css", ""));
        assert!(RuleScope::ContentContains(".navbar a {").admits("", ".navbar a { color: red }"));
    }
}
