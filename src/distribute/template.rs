//! Message rendering.
//!
//! Templates are plain text with `{placeholder}` slots. Only the
//! placeholders a template declares get substituted; anything else in the
//! text passes through untouched, so braces in prose never break a
//! message. A draw position the scrape did not produce renders as the
//! unavailable marker instead of failing the whole message.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;

use crate::config::{GroupConfig, MessageTemplate};
use crate::models::{CanonicalResult, Lottery};

/// Marker rendered for draw positions the scrape did not produce.
pub const UNAVAILABLE: &str = "n/d";

/// Built-in fallback used when a group names no template or names one
/// that is unknown, disabled or inapplicable.
static DEFAULT_TEMPLATE: Lazy<MessageTemplate> = Lazy::new(|| MessageTemplate {
    id: "default".to_string(),
    content: "🍀 *{lottery}* {date}\n\
              1º: {first}\n\
              2º: {second}\n\
              3º: {third}\n\
              4º: {fourth}\n\
              5º: {fifth}"
        .to_string(),
    variables: vec![
        "lottery".to_string(),
        "date".to_string(),
        "first".to_string(),
        "second".to_string(),
        "third".to_string(),
        "fourth".to_string(),
        "fifth".to_string(),
    ],
    lottery_types: vec![],
    enabled: true,
});

/// Values available to templates for one result. Dates render in the
/// Brazilian `dd/mm/yyyy` convention the recipients expect.
pub fn variables_for(result: &CanonicalResult) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    vars.insert(
        "lottery".to_string(),
        result.lottery_id.display_name().to_string(),
    );
    vars.insert(
        "date".to_string(),
        result.date.format("%d/%m/%Y").to_string(),
    );
    vars.insert("source".to_string(), result.source_url.clone());

    const ORDINALS: [&str; 5] = ["first", "second", "third", "fourth", "fifth"];
    for (index, name) in ORDINALS.iter().enumerate() {
        let rank = (index + 1) as u8;
        let value = result
            .positions
            .get(&rank)
            .cloned()
            .unwrap_or_else(|| UNAVAILABLE.to_string());
        vars.insert((*name).to_string(), value);

        let prize = result
            .prizes
            .get(&rank)
            .cloned()
            .unwrap_or_else(|| UNAVAILABLE.to_string());
        vars.insert(format!("prize{rank}"), prize);
    }
    vars
}

/// Render `template` against one result.
///
/// One left-to-right pass over the template text: substituted values are
/// emitted verbatim and never rescanned, so a scraped value that itself
/// contains `{date}` cannot trigger a second substitution.
pub fn render(template: &MessageTemplate, result: &CanonicalResult) -> String {
    let vars = variables_for(result);
    let mut out = String::with_capacity(template.content.len());
    let mut rest = template.content.as_str();

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        match tail.find(['{', '}']) {
            // a {name} token; substitute only when the template declares it
            Some(i) if tail[i..].starts_with('}') => {
                let name = &tail[..i];
                if template.variables.iter().any(|v| v == name) {
                    let value = vars.get(name).map(String::as_str).unwrap_or(UNAVAILABLE);
                    out.push_str(value);
                } else {
                    out.push_str(&rest[open..open + i + 2]);
                }
                rest = &tail[i + 1..];
            }
            // stray opening brace in prose, up to the next candidate
            Some(i) => {
                out.push_str(&rest[open..open + i + 1]);
                rest = &tail[i..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Pick the template for a group and lottery: the group's named template
/// when it exists, is enabled and applies to the lottery, the built-in
/// default otherwise.
pub fn resolve<'a>(
    templates: &'a [MessageTemplate],
    group: &GroupConfig,
    lottery: Lottery,
) -> &'a MessageTemplate {
    if let Some(wanted) = group.template_id.as_deref() {
        if let Some(found) = templates
            .iter()
            .find(|t| t.id == wanted && t.enabled && t.applies_to(lottery))
        {
            return found;
        }
    }
    &DEFAULT_TEMPLATE
}
