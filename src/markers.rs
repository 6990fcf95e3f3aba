//! Textual templating: `{{var}}` rendering and feature-injection markers.
//!
//! Both the activation-protocol generator and install-time feature injection
//! go through these pure functions so they are testable without touching the
//! filesystem.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Render a template by replacing `{{key}}` placeholders with bindings
pub fn render(template: &str, bindings: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in bindings {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}

/// Feature-injection content, keyed by marker name.
///
/// A marker whose name is present here is "enabled" and gets replaced with
/// its content; any other marker is stripped so it never leaks into output.
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    injections: BTreeMap<String, String>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.injections.insert(name.into(), content.into());
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.injections.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.injections.is_empty()
    }
}

/// One marker replacement performed in a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedInjection {
    pub marker: String,
    pub enabled: bool,
}

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Matches <!-- feature:name --> plus the trailing newline when the marker
    // is alone on its line, so stripping leaves no blank line behind
    RE.get_or_init(|| {
        Regex::new(r"(?m)(^[ \t]*<!--\s*feature:([A-Za-z0-9_-]+)\s*-->[ \t]*\n?)|(<!--\s*feature:([A-Za-z0-9_-]+)\s*-->)").unwrap()
    })
}

/// Replace enabled feature markers with their content and strip disabled ones.
///
/// Each marker occurrence is consumed exactly once per pass, so repeated
/// application over already-processed text is a no-op.
pub fn apply_feature_markers(text: &str, features: &FeatureSet) -> (String, Vec<AppliedInjection>) {
    let mut applied = Vec::new();
    let result = marker_regex()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let whole_line = caps.get(1).is_some();
            let name = caps
                .get(2)
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            match features.injections.get(&name) {
                Some(content) => {
                    applied.push(AppliedInjection {
                        marker: name,
                        enabled: true,
                    });
                    let mut block = content.trim_end().to_string();
                    if whole_line {
                        block.push('\n');
                    }
                    block
                }
                None => {
                    applied.push(AppliedInjection {
                        marker: name,
                        enabled: false,
                    });
                    String::new()
                }
            }
        })
        .into_owned();
    (result, applied)
}

/// Check whether a text contains any feature markers at all
pub fn has_feature_markers(text: &str) -> bool {
    marker_regex().is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_replaces_all_occurrences() {
        let out = render("{{name}} says hi, {{name}}!", &[("name", "alpha")]);
        assert_eq!(out, "alpha says hi, alpha!");
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let out = render("{{known}} {{unknown}}", &[("known", "x")]);
        assert_eq!(out, "x {{unknown}}");
    }

    #[test]
    fn test_enabled_marker_replaced() {
        let mut features = FeatureSet::new();
        features.enable("voice", "speak: true");

        let text = "before\n<!-- feature:voice -->\nafter\n";
        let (out, applied) = apply_feature_markers(text, &features);

        assert_eq!(out, "before\nspeak: true\nafter\n");
        assert_eq!(applied.len(), 1);
        assert!(applied[0].enabled);
        assert_eq!(applied[0].marker, "voice");
    }

    #[test]
    fn test_disabled_marker_stripped() {
        let features = FeatureSet::new();
        let text = "before\n<!-- feature:voice -->\nafter\n";
        let (out, applied) = apply_feature_markers(text, &features);

        // The marker line vanishes entirely, never left visible in output
        assert_eq!(out, "before\nafter\n");
        assert_eq!(applied.len(), 1);
        assert!(!applied[0].enabled);
    }

    #[test]
    fn test_marker_application_is_idempotent() {
        let mut features = FeatureSet::new();
        features.enable("voice", "speak: true");

        let text = "a\n<!-- feature:voice -->\nb\n";
        let (once, _) = apply_feature_markers(text, &features);
        let (twice, applied) = apply_feature_markers(&once, &features);

        assert_eq!(once, twice);
        assert!(applied.is_empty());
    }

    #[test]
    fn test_inline_marker_replaced_in_place() {
        let mut features = FeatureSet::new();
        features.enable("voice", "speak aloud");

        let (out, _) = apply_feature_markers("- step: <!-- feature:voice -->\n", &features);
        assert_eq!(out, "- step: speak aloud\n");

        let (out, _) = apply_feature_markers("- step: <!-- feature:off -->\n", &FeatureSet::new());
        assert_eq!(out, "- step: \n");
    }

    #[test]
    fn test_has_feature_markers() {
        assert!(has_feature_markers("x\n<!-- feature:abc -->\n"));
        assert!(!has_feature_markers("plain text"));
        assert!(!has_feature_markers("<!-- not a feature marker -->"));
    }
}
