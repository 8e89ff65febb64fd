//! Prompt generation from templates.

use std::collections::HashSet;

/// Values substituted into prompt templates.
#[derive(Debug, Clone, Default)]
pub struct PromptContext<'a> {
    pub brand: &'a str,
    pub category: &'a str,
    pub competitors: &'a [String],
}

/// Expand `{brand}`, `{category}` and `{competitors}` in every template.
///
/// Templates referring to an empty value are dropped, as are duplicates
/// after expansion.
pub fn expand_templates(templates: &[String], ctx: &PromptContext<'_>) -> Vec<String> {
    let competitors = join_names(ctx.competitors);
    let mut seen = HashSet::new();

    templates
        .iter()
        .filter(|t| !(t.contains("{category}") && ctx.category.trim().is_empty()))
        .filter(|t| !(t.contains("{competitors}") && competitors.is_empty()))
        .map(|t| {
            t.replace("{brand}", ctx.brand.trim())
                .replace("{category}", ctx.category.trim())
                .replace("{competitors}", &competitors)
                .trim()
                .to_string()
        })
        .filter(|p| !p.is_empty() && seen.insert(p.clone()))
        .collect()
}

/// Explicit prompts when given, otherwise the expanded templates.
pub fn resolve_prompts(
    explicit: &[String],
    templates: &[String],
    ctx: &PromptContext<'_>,
) -> Vec<String> {
    let explicit: Vec<String> = explicit
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    if explicit.is_empty() {
        expand_templates(templates, ctx)
    } else {
        explicit
    }
}

/// "A", "A and B", "A, B and C".
fn join_names(names: &[String]) -> String {
    let names: Vec<&str> = names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .collect();

    match names.as_slice() {
        [] => String::new(),
        [one] => one.to_string(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}
