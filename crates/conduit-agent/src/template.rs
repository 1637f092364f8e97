use std::collections::HashMap;

use regex::Regex;

/// Placeholders `render` substitutes; anything matching `{word}` that is not
/// in this set is left exactly as written rather than stripped or errored,
/// so a tuning author's literal braces in example JSON are never mangled.
const KNOWN_PLACEHOLDERS: &[&str] = &["today", "user_id", "session_id", "agent_name"];

/// Values available to substitute into a tuned prompt template for one
/// render call. Every field is optional; an absent value leaves its
/// placeholder untouched rather than substituting an empty string, so a
/// template author can tell "not supplied" from "deliberately blank".
#[derive(Debug, Clone, Default)]
pub struct TemplateValues {
    pub today: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub agent_name: Option<String>,
}

impl TemplateValues {
    pub fn with_today_now() -> Self {
        Self {
            today: Some(chrono::Local::now().format("%Y-%m-%d").to_string()),
            ..Default::default()
        }
    }

    fn get(&self, key: &str) -> Option<&str> {
        match key {
            "today" => self.today.as_deref(),
            "user_id" => self.user_id.as_deref(),
            "session_id" => self.session_id.as_deref(),
            "agent_name" => self.agent_name.as_deref(),
            _ => None,
        }
    }
}

fn placeholder_regex() -> Regex {
    Regex::new(r"\{(\w+)\}").expect("static placeholder pattern is valid")
}

/// Substitutes every known, supplied placeholder in `template`. Unknown
/// placeholders (`{whatever}`) and known placeholders with no value supplied
/// are left literal. Idempotent whenever `template` contains no known
/// placeholder, since the regex then matches nothing to replace.
pub fn render(template: &str, values: &TemplateValues) -> String {
    let re = placeholder_regex();
    re.replace_all(template, |caps: &regex::Captures| {
        let key = &caps[1];
        if !KNOWN_PLACEHOLDERS.contains(&key) {
            return caps[0].to_string();
        }
        match values.get(key) {
            Some(v) => v.to_string(),
            None => caps[0].to_string(),
        }
    })
    .into_owned()
}

/// Resolves arbitrary `{key: value}` pairs in addition to the fixed known
/// set — used by tuning fields that legitimately define their own
/// placeholders (e.g. a field referencing another field by key).
pub fn render_with_extra(template: &str, values: &TemplateValues, extra: &HashMap<String, String>) -> String {
    let re = placeholder_regex();
    re.replace_all(template, |caps: &regex::Captures| {
        let key = &caps[1];
        if let Some(v) = values.get(key) {
            return v.to_string();
        }
        if let Some(v) = extra.get(key) {
            return v.clone();
        }
        caps[0].to_string()
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_placeholder() {
        let values = TemplateValues {
            today: Some("2026-07-28".to_string()),
            ..Default::default()
        };
        assert_eq!(render("Echo: {today}", &values), "Echo: 2026-07-28");
    }

    #[test]
    fn leaves_unknown_placeholder_literal() {
        let values = TemplateValues::default();
        assert_eq!(render("Value: {custom_field}", &values), "Value: {custom_field}");
    }

    #[test]
    fn leaves_known_placeholder_literal_when_unsupplied() {
        let values = TemplateValues::default();
        assert_eq!(render("{user_id}", &values), "{user_id}");
    }

    #[test]
    fn idempotent_when_no_known_placeholders_present() {
        let values = TemplateValues::with_today_now();
        let text = "plain prompt with no placeholders at all";
        assert_eq!(render(text, &values), text);
        assert_eq!(render(&render(text, &values), &values), text);
    }

    #[test]
    fn extra_map_fills_custom_placeholder() {
        let values = TemplateValues::default();
        let mut extra = HashMap::new();
        extra.insert("tone".to_string(), "formal".to_string());
        assert_eq!(render_with_extra("Be {tone}", &values, &extra), "Be formal");
    }
}
