//! Import helpers

use crate::resource::{ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource};
use crate::types::{AttributePath, Diagnostic, DynamicValue};

/// Copy the import ID verbatim into `attr_path` of an otherwise empty state.
///
/// Resources whose Terraform ID is the whole identity use this and let the
/// following Read fill in everything else.
pub fn import_state_passthrough_id(
    attr_path: AttributePath,
    request: &ImportResourceStateRequest,
    response: &mut ImportResourceStateResponse,
) {
    tracing::debug!("Importing {} with ID {}", request.type_name, request.id);
    let mut state = DynamicValue::object();

    if let Err(e) = state.set_string(&attr_path, request.id.clone()) {
        response.diagnostics.push(
            Diagnostic::error(
                "Failed to set import ID",
                format!("Could not set '{}' to '{}': {}", attr_path, request.id, e),
            )
            .with_attribute(attr_path),
        );
        return;
    }

    response.imported_resources.push(ImportedResource {
        type_name: request.type_name.clone(),
        state,
    });
}
