//! Copying API values into state without creating spurious diffs
//!
//! Terraform reports a change whenever state differs from configuration, so
//! a value the API returns in a different but equivalent shape (an empty
//! list for an unset attribute, say) must not overwrite what is in state.

use std::collections::HashMap;
use tfplug::error::Result;
use tfplug::plan_modifier::values_equal;
use tfplug::types::{AttributePath, Dynamic, DynamicValue};

fn is_empty(value: &Dynamic) -> bool {
    match value {
        Dynamic::Null | Dynamic::Unknown => true,
        Dynamic::List(items) => items.is_empty(),
        Dynamic::Map(entries) => entries.is_empty(),
        Dynamic::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Replaces the attribute with `api` unless both hold the same value.
/// Null in state equals an empty API value.
pub fn update_if_changed(state: &mut DynamicValue, name: &str, api: Dynamic) -> Result<bool> {
    let path = AttributePath::new(name);
    let current = state.get_or_null(&path);

    if values_equal(&current, &api) || (current.is_null() && is_empty(&api)) {
        return Ok(false);
    }

    state.set_value(&path, api)?;
    Ok(true)
}

pub fn update_map_if_changed(
    state: &mut DynamicValue,
    name: &str,
    api: HashMap<String, String>,
) -> Result<bool> {
    update_if_changed(state, name, Dynamic::string_map(api))
}

pub fn update_list_if_changed<I, S>(state: &mut DynamicValue, name: &str, api: I) -> Result<bool>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    update_if_changed(state, name, Dynamic::string_list(api))
}

/// Optional string from the API; `None` and `""` both mean unset
pub fn update_string_if_changed(
    state: &mut DynamicValue,
    name: &str,
    api: Option<&str>,
) -> Result<bool> {
    let api = match api {
        Some(s) if !s.is_empty() => Dynamic::String(s.to_string()),
        _ => Dynamic::Null,
    };
    update_if_changed(state, name, api)
}

/// Flattens a JSON object to the string map Terraform stores. Non-string
/// values keep their JSON text.
pub fn json_string_map<'a, I>(values: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (&'a String, &'a serde_json::Value)>,
{
    values
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}

/// Sets a string attribute, or null when there is no value
pub fn set_optional_string(
    state: &mut DynamicValue,
    name: &str,
    value: Option<String>,
) -> Result<()> {
    let path = AttributePath::new(name);
    match value {
        Some(value) => state.set_string(&path, value),
        None => state.set_null(&path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(name: &str, value: Dynamic) -> DynamicValue {
        let mut state = DynamicValue::object();
        state.set_value(&AttributePath::new(name), value).unwrap();
        state
    }

    #[test]
    fn null_state_matches_empty_api_collections() {
        let mut state = state_with("tags", Dynamic::Null);
        assert!(!update_list_if_changed(&mut state, "tags", Vec::<String>::new()).unwrap());
        assert!(!update_map_if_changed(&mut state, "policy", HashMap::new()).unwrap());
        assert!(state.get_or_null(&AttributePath::new("tags")).is_null());
    }

    #[test]
    fn equal_values_are_kept() {
        let mut state = state_with("tags", Dynamic::string_list(["a", "b"]));
        assert!(!update_list_if_changed(&mut state, "tags", ["a", "b"]).unwrap());
    }

    #[test]
    fn differing_values_are_replaced() {
        let mut state = state_with("tags", Dynamic::string_list(["a"]));
        assert!(update_list_if_changed(&mut state, "tags", ["a", "c"]).unwrap());
        assert_eq!(
            state.get_list(&AttributePath::new("tags")).unwrap(),
            vec![Dynamic::from("a"), Dynamic::from("c")]
        );

        let mut state = state_with("policy", Dynamic::string_map([("type", "manual")]));
        assert!(update_map_if_changed(
            &mut state,
            "policy",
            HashMap::from([("type".to_string(), "automatic".to_string())])
        )
        .unwrap());
    }

    #[test]
    fn empty_api_list_clears_configured_items() {
        let mut state = state_with("tags", Dynamic::string_list(["a"]));
        assert!(update_list_if_changed(&mut state, "tags", Vec::<String>::new()).unwrap());
        assert_eq!(
            state.get_list(&AttributePath::new("tags")).unwrap(),
            Vec::<Dynamic>::new()
        );
    }

    #[test]
    fn json_values_become_strings() {
        let values = HashMap::from([
            ("type".to_string(), serde_json::json!("manual")),
            ("approvers".to_string(), serde_json::json!(2)),
        ]);
        let flat = json_string_map(&values);
        assert_eq!(flat["type"], "manual");
        assert_eq!(flat["approvers"], "2");
    }

    #[test]
    fn empty_api_string_is_unset() {
        let mut state = state_with("description", Dynamic::Null);
        assert!(!update_string_if_changed(&mut state, "description", Some("")).unwrap());
        assert!(update_string_if_changed(&mut state, "description", Some("d")).unwrap());

        let mut state = state_with("description", Dynamic::from("old"));
        assert!(update_string_if_changed(&mut state, "description", None).unwrap());
        assert!(state.get_or_null(&AttributePath::new("description")).is_null());
    }
}
