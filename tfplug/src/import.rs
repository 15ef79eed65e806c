//! Import helpers for simplifying resource import implementations

use crate::context::Context;
use crate::resource::{ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource};
use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

/// Sets the import ID to a specific attribute in state
///
/// This is useful for simple resources where the import ID maps directly to
/// a single attribute in the resource state.
///
/// Example: ID "my-project" -> state.id = "my-project"
pub fn import_state_passthrough_id(
    ctx: &Context,
    attr_path: AttributePath,
    request: &ImportResourceStateRequest,
    response: &mut ImportResourceStateResponse,
) {
    import_state_with(
        ctx,
        attr_path,
        Dynamic::String(request.id.clone()),
        request,
        response,
    );
}

/// Like `import_state_passthrough_id` for attributes of number type
pub fn import_state_passthrough_number_id(
    ctx: &Context,
    attr_path: AttributePath,
    request: &ImportResourceStateRequest,
    response: &mut ImportResourceStateResponse,
) {
    match request.id.trim().parse::<f64>() {
        Ok(id) => import_state_with(ctx, attr_path, Dynamic::Number(id), request, response),
        Err(_) => response.diagnostics.push(
            Diagnostic::error(
                "Invalid import ID",
                format!("Expected a numeric ID, got '{}'", request.id),
            )
            .with_attribute(attr_path),
        ),
    }
}

fn import_state_with(
    _ctx: &Context,
    attr_path: AttributePath,
    value: Dynamic,
    request: &ImportResourceStateRequest,
    response: &mut ImportResourceStateResponse,
) {
    let mut state = DynamicValue::object();

    if let Err(e) = state.set_value(&attr_path, value) {
        response.diagnostics.push(
            Diagnostic::error(
                format!("Failed to set import ID: {}", e),
                format!(
                    "Could not set attribute '{}' to value '{}'",
                    attr_path, request.id
                ),
            )
            .with_attribute(attr_path),
        );
        return;
    }

    response.imported_resources.push(ImportedResource {
        type_name: request.type_name.clone(),
        state,
        private: Vec::new(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClientCapabilities;

    fn request(id: &str) -> ImportResourceStateRequest {
        ImportResourceStateRequest {
            type_name: "immuta_bim_group".to_string(),
            id: id.to_string(),
            client_capabilities: ClientCapabilities::default(),
        }
    }

    fn empty_response() -> ImportResourceStateResponse {
        ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        }
    }

    #[test]
    fn passthrough_sets_string_id() {
        let mut response = empty_response();
        import_state_passthrough_id(
            &Context::new(),
            AttributePath::new("id"),
            &request("proj-1"),
            &mut response,
        );

        assert!(response.diagnostics.is_empty());
        let state = &response.imported_resources[0].state;
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "proj-1");
    }

    #[test]
    fn number_passthrough_parses_id() {
        let mut response = empty_response();
        import_state_passthrough_number_id(
            &Context::new(),
            AttributePath::new("id"),
            &request("42"),
            &mut response,
        );

        let state = &response.imported_resources[0].state;
        assert_eq!(state.get_number(&AttributePath::new("id")).unwrap(), 42.0);
    }

    #[test]
    fn number_passthrough_rejects_garbage() {
        let mut response = empty_response();
        import_state_passthrough_number_id(
            &Context::new(),
            AttributePath::new("id"),
            &request("abc"),
            &mut response,
        );

        assert!(response.imported_resources.is_empty());
        assert_eq!(response.diagnostics[0].summary, "Invalid import ID");
    }
}
