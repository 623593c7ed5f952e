//! `--about`: describe the tap for orchestrators and humans.

use anyhow::Result;
use serde_json::{json, Value};
use streamtap_sdk::definition::TapDefinition;
use streamtap_sdk::types::plugin::PluginInfo;

use crate::AboutFormat;

/// Print the tap description in `format`.
///
/// # Errors
///
/// Returns an error if the description cannot be serialized.
pub fn execute<D: TapDefinition>(definition: &D, format: AboutFormat) -> Result<()> {
    let text = render(&definition.info(), &definition.config_schema(), format)?;
    println!("{text}");
    Ok(())
}

/// Render name, version, capabilities and the settings schema.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render(info: &PluginInfo, settings: &Value, format: AboutFormat) -> Result<String> {
    match format {
        AboutFormat::Json => Ok(serde_json::to_string_pretty(&json!({
            "name": info.name,
            "version": info.version,
            "description": info.description,
            "capabilities": info.capabilities,
            "settings": settings,
        }))?),
        AboutFormat::Markdown => Ok(render_markdown(info, settings)),
    }
}

fn render_markdown(info: &PluginInfo, settings: &Value) -> String {
    let mut lines = vec![format!("# `{}`", info.name), String::new()];
    if !info.description.is_empty() {
        lines.extend([info.description.clone(), String::new()]);
    }
    lines.extend([format!("Version: {}", info.version), String::new()]);

    lines.extend(["## Capabilities".to_string(), String::new()]);
    lines.extend(info.capabilities.iter().map(|c| format!("- `{c}`")));
    lines.extend([String::new(), "## Settings".to_string(), String::new()]);
    lines.extend(settings_table(settings));

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// One row per setting, or a note when the schema declares none.
fn settings_table(settings: &Value) -> Vec<String> {
    let properties = settings.get("properties").and_then(Value::as_object);
    let Some(properties) = properties.filter(|p| !p.is_empty()) else {
        return vec!["This tap has no settings.".to_string()];
    };
    let required: Vec<&str> = settings
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let header = [
        "| Setting | Type | Required | Description |".to_string(),
        "|:--------|:-----|:--------:|:------------|".to_string(),
    ];
    let rows = properties.iter().map(|(name, property)| {
        format!(
            "| {name} | {} | {} | {} |",
            type_label(property),
            if required.contains(&name.as_str()) { "yes" } else { "no" },
            property
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default(),
        )
    });
    header.into_iter().chain(rows).collect()
}

fn type_label(property: &Value) -> String {
    match property.get("type") {
        Some(Value::String(t)) if t == "array" => {
            let items = property
                .get("items")
                .map(type_label)
                .unwrap_or_else(|| "any".to_string());
            format!("array of {items}")
        }
        Some(Value::String(t)) => t.clone(),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" or "),
        _ => "any".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> PluginInfo {
        PluginInfo::new("tap-test", "1.2.3").description("Test tap")
    }

    fn settings() -> Value {
        json!({
            "type": "object",
            "properties": {
                "token": {"type": "string", "description": "API token"},
                "ids": {"type": "array", "items": {"type": "string"}},
                "since": {"type": ["string", "null"]}
            },
            "required": ["token"]
        })
    }

    #[test]
    fn json_lists_capabilities_and_settings() {
        let text = render(&info(), &settings(), AboutFormat::Json).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["name"], "tap-test");
        assert_eq!(value["version"], "1.2.3");
        assert_eq!(value["capabilities"], json!(["sync", "catalog", "state", "discover"]));
        assert_eq!(value["settings"]["required"], json!(["token"]));
    }

    #[test]
    fn markdown_renders_settings_table() {
        let text = render(&info(), &settings(), AboutFormat::Markdown).unwrap();
        assert!(text.starts_with("# `tap-test`\n\nTest tap\n"));
        assert!(text.contains("- `discover`"));
        assert!(text.contains("| token | string | yes | API token |"));
        assert!(text.contains("| ids | array of string | no |  |"));
        assert!(text.contains("| since | string or null | no |  |"));
    }

    #[test]
    fn markdown_without_settings() {
        let text = render(&info(), &json!({"type": "object"}), AboutFormat::Markdown).unwrap();
        assert!(text.ends_with("This tap has no settings.\n"));
    }

    #[test]
    fn markdown_sections_are_separated() {
        let text = render(&info(), &settings(), AboutFormat::Markdown).unwrap();
        assert!(text.contains("Version: 1.2.3\n\n## Capabilities\n\n- `sync`\n"));
        assert!(text.contains("- `discover`\n\n## Settings\n\n| Setting |"));
        assert!(text.ends_with(" |\n"));
    }
}
