/// Normalizes a model guardrail / content-filter refusal into a localized,
/// user-facing string instead of letting it surface as an infrastructure
/// failure.
///
/// Detection covers the three shapes the original integration's model
/// clients raised: an HTTP 422, an HTTP 400 whose body names
/// `error.code == "content_filter"`, or an `innererror.code ==
/// "ResponsibleAIPolicyViolation"` nested one level deeper. A plain
/// string-match fallback catches provider error bodies that carry the same
/// meaning under a different shape.
pub fn is_guardrail_failure(err: &anyhow::Error) -> bool {
    let text = err.to_string();
    if text.contains("422") {
        return true;
    }
    if text.contains("content_filter") || text.contains("ResponsibleAIPolicyViolation") {
        return true;
    }
    for cause in err.chain() {
        let s = cause.to_string();
        if s.contains("content_filter") || s.contains("ResponsibleAIPolicyViolation") {
            return true;
        }
    }
    false
}

/// Localized refusal text shown in place of the model's (blocked) response.
/// Absence of a populated `runtime.language` is treated as English per the
/// open question in the design notes — there is no reliable uniform source
/// for it upstream.
pub fn localized_refusal(language: Option<&str>) -> &'static str {
    match language {
        Some(lang) if lang.to_lowercase().starts_with("fr") => {
            "Je ne peux pas répondre à cette demande en raison de nos règles de contenu."
        }
        _ => "I can't help with that request due to our content guidelines.",
    }
}
