use crate::types::{AttributePath, Diagnostic, Dynamic};

#[derive(Debug, Clone)]
pub struct PlanModifyRequest {
    /// Prior state value of the attribute
    pub state: Dynamic,
    /// Planned value after the framework marked computed attributes unknown
    pub plan: Dynamic,
    pub config: Dynamic,
    pub attribute_path: AttributePath,
    /// The whole resource is being created, there is no prior state
    pub creating: bool,
}

#[derive(Debug, Clone)]
pub struct PlanModifyResponse {
    pub plan_value: Dynamic,
    pub requires_replace: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Trait for modifying terraform plan behavior
///
/// Plan modifiers run after the framework has built the planned state and can:
/// - Modify the planned value
/// - Mark an attribute as requiring replacement
/// - Add warnings or errors to the plan
pub trait PlanModifier: Send + Sync {
    fn description(&self) -> String;

    fn modify_plan(&self, request: PlanModifyRequest) -> PlanModifyResponse;
}

/// Requires replacement when a value already in state changes
pub struct RequiresReplace;

impl PlanModifier for RequiresReplace {
    fn description(&self) -> String {
        "changing a stored value forces a new resource".to_string()
    }

    fn modify_plan(&self, request: PlanModifyRequest) -> PlanModifyResponse {
        let requires_replace = !request.creating
            && !matches!(request.state, Dynamic::Null | Dynamic::Unknown)
            && !request.plan.is_unknown()
            && !values_equal(&request.state, &request.plan);

        PlanModifyResponse {
            plan_value: request.plan,
            requires_replace,
            diagnostics: Vec::new(),
        }
    }
}

/// Marks an attribute as requiring replacement when it changes on an existing resource
pub struct RequiresReplaceIfChanged;

impl PlanModifier for RequiresReplaceIfChanged {
    fn description(&self) -> String {
        "changing this value forces a new resource".to_string()
    }

    fn modify_plan(&self, request: PlanModifyRequest) -> PlanModifyResponse {
        let requires_replace = !request.creating
            && !matches!(
                (&request.state, &request.plan),
                (Dynamic::Null, Dynamic::Null) | (Dynamic::Unknown, _) | (_, Dynamic::Unknown)
            )
            && !values_equal(&request.state, &request.plan);

        PlanModifyResponse {
            plan_value: request.plan,
            requires_replace,
            diagnostics: Vec::new(),
        }
    }
}

/// Uses the current state value when the planned value is unknown
///
/// Keeps computed attributes such as server-assigned ids stable across plans
/// instead of showing them as "known after apply" on every update.
pub struct UseStateForUnknown;

impl PlanModifier for UseStateForUnknown {
    fn description(&self) -> String {
        "once set, the value of this attribute in state will not change".to_string()
    }

    fn modify_plan(&self, request: PlanModifyRequest) -> PlanModifyResponse {
        let plan_value = match (&request.plan, &request.state) {
            (Dynamic::Unknown, Dynamic::Null) | (Dynamic::Unknown, Dynamic::Unknown) => {
                request.plan
            }
            (Dynamic::Unknown, state) => state.clone(),
            _ => request.plan,
        };

        PlanModifyResponse {
            plan_value,
            requires_replace: false,
            diagnostics: Vec::new(),
        }
    }
}

/// Compares two values, treating numbers within f64 epsilon as equal
pub fn values_equal(a: &Dynamic, b: &Dynamic) -> bool {
    match (a, b) {
        (Dynamic::Null, Dynamic::Null) => true,
        (Dynamic::Unknown, Dynamic::Unknown) => true,
        (Dynamic::Bool(a), Dynamic::Bool(b)) => a == b,
        (Dynamic::Number(a), Dynamic::Number(b)) => (a - b).abs() < f64::EPSILON,
        (Dynamic::String(a), Dynamic::String(b)) => a == b,
        (Dynamic::List(a), Dynamic::List(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y))
        }
        (Dynamic::Map(a), Dynamic::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|v2| values_equal(v, v2)))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn request(state: Dynamic, plan: Dynamic, creating: bool) -> PlanModifyRequest {
        PlanModifyRequest {
            config: plan.clone(),
            state,
            plan,
            attribute_path: AttributePath::new("name"),
            creating,
        }
    }

    #[test]
    fn requires_replace_if_changed_does_not_trigger_on_same_value() {
        let response = RequiresReplaceIfChanged.modify_plan(request(
            Dynamic::from("pii"),
            Dynamic::from("pii"),
            false,
        ));

        assert!(!response.requires_replace);
        assert!(response.diagnostics.is_empty());
    }

    #[test]
    fn requires_replace_if_changed_triggers_on_different_value() {
        let response = RequiresReplaceIfChanged.modify_plan(request(
            Dynamic::from("pii"),
            Dynamic::from("phi"),
            false,
        ));

        assert!(response.requires_replace);
    }

    #[test]
    fn requires_replace_if_changed_triggers_when_value_added() {
        let response =
            RequiresReplaceIfChanged.modify_plan(request(Dynamic::Null, Dynamic::from("root"), false));

        assert!(response.requires_replace);
    }

    #[test]
    fn requires_replace_if_changed_ignores_create() {
        let response =
            RequiresReplaceIfChanged.modify_plan(request(Dynamic::Null, Dynamic::from("pii"), true));

        assert!(!response.requires_replace);
    }

    #[test]
    fn requires_replace_if_changed_ignores_unknown_values() {
        let response = RequiresReplaceIfChanged.modify_plan(request(
            Dynamic::from("value"),
            Dynamic::Unknown,
            false,
        ));
        assert!(!response.requires_replace);
    }

    #[test]
    fn requires_replace_skips_values_added_later() {
        let added = RequiresReplace.modify_plan(request(Dynamic::Null, Dynamic::from("root"), false));
        assert!(!added.requires_replace);

        let changed = RequiresReplace.modify_plan(request(
            Dynamic::from("pii"),
            Dynamic::from("phi"),
            false,
        ));
        assert!(changed.requires_replace);
    }

    #[test]
    fn values_equal_handles_all_types() {
        assert!(values_equal(&Dynamic::Number(42.0), &Dynamic::Number(42.0)));
        assert!(!values_equal(&Dynamic::Number(42.0), &Dynamic::Number(43.0)));
        assert!(!values_equal(&Dynamic::Bool(true), &Dynamic::Bool(false)));

        let list1 = Dynamic::string_list(["a", "b"]);
        let list2 = Dynamic::string_list(["a", "b"]);
        let list3 = Dynamic::string_list(["b", "a"]);
        assert!(values_equal(&list1, &list2));
        assert!(!values_equal(&list1, &list3));

        let map1 = Dynamic::Map(HashMap::from([("key".to_string(), Dynamic::from("value"))]));
        let map2 = Dynamic::Map(HashMap::from([("key".to_string(), Dynamic::from("other"))]));
        assert!(values_equal(&map1, &map1.clone()));
        assert!(!values_equal(&map1, &map2));
        assert!(!values_equal(&map1, &Dynamic::Null));
    }

    #[test]
    fn use_state_for_unknown_preserves_state_when_unknown() {
        let response = UseStateForUnknown.modify_plan(request(
            Dynamic::from("existing-id"),
            Dynamic::Unknown,
            false,
        ));

        assert_eq!(response.plan_value, Dynamic::from("existing-id"));
        assert!(!response.requires_replace);
    }

    #[test]
    fn use_state_for_unknown_keeps_unknown_on_create() {
        let response =
            UseStateForUnknown.modify_plan(request(Dynamic::Null, Dynamic::Unknown, true));

        assert_eq!(response.plan_value, Dynamic::Unknown);
    }

    #[test]
    fn use_state_for_unknown_uses_plan_when_known() {
        let response = UseStateForUnknown.modify_plan(request(
            Dynamic::from("existing-value"),
            Dynamic::from("new-value"),
            false,
        ));

        assert_eq!(response.plan_value, Dynamic::from("new-value"));
    }
}
