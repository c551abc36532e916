//! Payload builder - turns template structure plus captured variables
//! into the provider's component parameter list

use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;
use wacast_common::types::TemplateVariable;

/// Payload construction errors
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("Invalid template components: {0}")]
    InvalidComponents(String),

    #[error("Template expects {expected} variables, {got} captured")]
    MissingVariables { expected: usize, got: usize },
}

/// Count `{{n}}` positional placeholders in a template text
fn placeholder_count(text: &str) -> usize {
    let mut count = 0;
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        if let Some(end) = after.find("}}") {
            if !after[..end].is_empty() && after[..end].chars().all(|c| c.is_ascii_digit()) {
                count += 1;
            }
            rest = &after[end + 2..];
        } else {
            break;
        }
    }
    count
}

fn text_parameters<'a, I>(vars: &mut I, needed: usize) -> Option<Vec<Value>>
where
    I: Iterator<Item = &'a TemplateVariable>,
{
    let mut params = Vec::with_capacity(needed);
    for _ in 0..needed {
        let var = vars.next()?;
        params.push(json!({"type": "text", "text": var.value}));
    }
    Some(params)
}

/// Build the outgoing component list
///
/// `components` is the template structure as declared at the provider
/// (header/body/footer/buttons); variables are consumed in capture order,
/// header placeholders first, then body, then URL button suffixes.
pub fn build_components(
    components: &Value,
    variables: &[TemplateVariable],
) -> Result<Vec<Value>, PayloadError> {
    let parts = components
        .as_array()
        .ok_or_else(|| PayloadError::InvalidComponents("expected an array".to_string()))?;

    let total_expected: usize = parts.iter().map(expected_for_part).sum();
    if variables.len() < total_expected {
        return Err(PayloadError::MissingVariables {
            expected: total_expected,
            got: variables.len(),
        });
    }
    if variables.len() > total_expected {
        debug!(
            expected = total_expected,
            got = variables.len(),
            "Extra rendered variables ignored"
        );
    }

    let mut vars = variables.iter();
    let mut out = Vec::new();

    for part in parts {
        let part_type = part
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| PayloadError::InvalidComponents("component without type".to_string()))?;

        match part_type {
            "HEADER" => {
                let format = part.get("format").and_then(|f| f.as_str()).unwrap_or("TEXT");
                if format != "TEXT" {
                    continue;
                }
                let text = part.get("text").and_then(|t| t.as_str()).unwrap_or("");
                let needed = placeholder_count(text);
                if needed > 0 {
                    let params = text_parameters(&mut vars, needed)
                        .expect("variable count checked above");
                    out.push(json!({"type": "header", "parameters": params}));
                }
            }
            "BODY" => {
                let text = part.get("text").and_then(|t| t.as_str()).unwrap_or("");
                let needed = placeholder_count(text);
                if needed > 0 {
                    let params = text_parameters(&mut vars, needed)
                        .expect("variable count checked above");
                    out.push(json!({"type": "body", "parameters": params}));
                }
            }
            "BUTTONS" => {
                let buttons = part
                    .get("buttons")
                    .and_then(|b| b.as_array())
                    .cloned()
                    .unwrap_or_default();

                for (index, button) in buttons.iter().enumerate() {
                    let is_url = button.get("type").and_then(|t| t.as_str()) == Some("URL");
                    if !is_url {
                        continue;
                    }
                    let url = button.get("url").and_then(|u| u.as_str()).unwrap_or("");
                    let needed = placeholder_count(url);
                    if needed > 0 {
                        let params = text_parameters(&mut vars, needed)
                            .expect("variable count checked above");
                        out.push(json!({
                            "type": "button",
                            "sub_type": "url",
                            "index": index.to_string(),
                            "parameters": params,
                        }));
                    }
                }
            }
            // FOOTER carries no parameters
            _ => {}
        }
    }

    Ok(out)
}

/// Placeholders one structural part consumes
fn expected_for_part(part: &Value) -> usize {
    match part.get("type").and_then(|t| t.as_str()) {
        Some("HEADER") => {
            let format = part.get("format").and_then(|f| f.as_str()).unwrap_or("TEXT");
            if format == "TEXT" {
                placeholder_count(part.get("text").and_then(|t| t.as_str()).unwrap_or(""))
            } else {
                0
            }
        }
        Some("BODY") => placeholder_count(part.get("text").and_then(|t| t.as_str()).unwrap_or("")),
        Some("BUTTONS") => part
            .get("buttons")
            .and_then(|b| b.as_array())
            .map(|buttons| {
                buttons
                    .iter()
                    .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("URL"))
                    .map(|b| placeholder_count(b.get("url").and_then(|u| u.as_str()).unwrap_or("")))
                    .sum()
            })
            .unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn var(name: &str, value: &str) -> TemplateVariable {
        TemplateVariable::new(name, value)
    }

    #[test]
    fn test_placeholder_count() {
        assert_eq!(placeholder_count("Hi {{1}}, order {{2}} shipped"), 2);
        assert_eq!(placeholder_count("no placeholders"), 0);
        assert_eq!(placeholder_count("{{not_positional}}"), 0);
        assert_eq!(placeholder_count("dangling {{1"), 0);
    }

    #[test]
    fn test_body_only_template() {
        let components = serde_json::json!([
            {"type": "BODY", "text": "Hi {{1}}, your order {{2}} is ready"}
        ]);
        let built = build_components(
            &components,
            &[var("customer_name", "Ana"), var("order_id", "A-1001")],
        )
        .unwrap();

        assert_eq!(
            built,
            vec![serde_json::json!({
                "type": "body",
                "parameters": [
                    {"type": "text", "text": "Ana"},
                    {"type": "text", "text": "A-1001"},
                ]
            })]
        );
    }

    #[test]
    fn test_header_body_and_button() {
        let components = serde_json::json!([
            {"type": "HEADER", "format": "TEXT", "text": "Order {{1}}"},
            {"type": "BODY", "text": "Hi {{1}}, it shipped"},
            {"type": "FOOTER", "text": "Reply STOP to opt out"},
            {"type": "BUTTONS", "buttons": [
                {"type": "QUICK_REPLY", "text": "Thanks"},
                {"type": "URL", "text": "Track", "url": "https://example.com/track/{{1}}"}
            ]}
        ]);
        let built = build_components(
            &components,
            &[
                var("order_id", "A-1001"),
                var("customer_name", "Ana"),
                var("tracking_code", "ZX9"),
            ],
        )
        .unwrap();

        assert_eq!(built.len(), 3);
        assert_eq!(built[0]["type"], "header");
        assert_eq!(built[0]["parameters"][0]["text"], "A-1001");
        assert_eq!(built[1]["type"], "body");
        assert_eq!(built[1]["parameters"][0]["text"], "Ana");
        assert_eq!(built[2]["type"], "button");
        assert_eq!(built[2]["index"], "1");
        assert_eq!(built[2]["parameters"][0]["text"], "ZX9");
    }

    #[test]
    fn test_missing_variables() {
        let components = serde_json::json!([
            {"type": "BODY", "text": "Hi {{1}}, order {{2}}"}
        ]);
        let err = build_components(&components, &[var("customer_name", "Ana")]).unwrap_err();
        match err {
            PayloadError::MissingVariables { expected, got } => {
                assert_eq!(expected, 2);
                assert_eq!(got, 1);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_non_array_components_rejected() {
        let components = serde_json::json!({"type": "BODY"});
        assert!(build_components(&components, &[]).is_err());
    }

    #[test]
    fn test_template_without_placeholders() {
        let components = serde_json::json!([
            {"type": "BODY", "text": "Static announcement"}
        ]);
        let built = build_components(&components, &[]).unwrap();
        assert!(built.is_empty());
    }
}
