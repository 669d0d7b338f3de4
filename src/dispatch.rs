use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use serde_json::Value;
use tracing::{debug, warn};

use crate::catalog::ToolCatalog;
use crate::turns::{ArgumentMap, ToolCallRequest, ToolCallResult, ToolError};

/// Validates and executes one tool-call request against the catalog.
///
/// Every failure mode is converted into an error result rather than
/// propagated: an unknown name, arguments missing a schema-required key, a
/// handler error, and a handler panic all come back as a [`ToolCallResult`]
/// the loop appends to the conversation. One failing tool never aborts the
/// session.
pub fn dispatch(request: &ToolCallRequest, catalog: &ToolCatalog) -> ToolCallResult {
    let Some(spec) = catalog.get(&request.name) else {
        warn!(tool = %request.name, id = %request.id, "model requested unregistered tool");
        return ToolCallResult::error(
            request,
            ToolError::UnknownTool {
                name: request.name.clone(),
            },
        );
    };

    if let Err(message) = check_required_arguments(&spec.input_schema, &request.arguments) {
        warn!(tool = %request.name, id = %request.id, %message, "rejecting tool call");
        return ToolCallResult::error(request, ToolError::InvalidArguments { message });
    }

    debug!(tool = %request.name, id = %request.id, "executing tool handler");
    match catch_unwind(AssertUnwindSafe(|| spec.invoke(&request.arguments))) {
        Ok(Ok(value)) => ToolCallResult::success(request, value),
        Ok(Err(err)) => ToolCallResult::error(
            request,
            ToolError::ExecutionFailed {
                message: err.to_string(),
            },
        ),
        Err(panic) => ToolCallResult::error(
            request,
            ToolError::ExecutionFailed {
                message: panic_message(panic.as_ref()),
            },
        ),
    }
}

fn check_required_arguments(schema: &Value, arguments: &ArgumentMap) -> Result<(), String> {
    let Some(required) = schema.get("required").and_then(Value::as_array) else {
        return Ok(());
    };
    let missing: Vec<&str> = required
        .iter()
        .filter_map(Value::as_str)
        .filter(|key| !arguments.contains_key(*key))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "missing required argument(s): {}",
            missing.join(", ")
        ))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "tool handler panicked".to_string()
    }
}
