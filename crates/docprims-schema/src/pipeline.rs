//! Document validation: wait for load, `willValidate` hooks, structural
//! validation, `didValidate` hooks, then one aggregate result.

use std::collections::HashSet;

use jsonschema::error::ValidationErrorKind;
use serde_json::Value;

use crate::error::{FieldError, Result, ValidationError};
use crate::formats::{expected_types, TypeCheck};
use crate::hooks::HookEvent;
use crate::schema::{CompiledSchema, Schema};

pub(crate) async fn run(schema: &Schema, document: &Value) -> Result<()> {
    let compiled = schema.compiled().await?;
    let hooks = schema.hooks();
    let mut report = ValidationError::new(schema.name());

    if hooks.run(HookEvent::WillValidate, document, &mut report).await {
        report.errors.extend(structural_errors(&compiled, document));
        hooks.run(HookEvent::DidValidate, document, &mut report).await;
    }

    if report.is_clean() {
        Ok(())
    } else {
        tracing::debug!(
            schema = %schema.name(),
            errors = report.errors.len(),
            hook_failures = report.hook_failures.len(),
            "document rejected"
        );
        Err(report.into())
    }
}

fn structural_errors(compiled: &CompiledSchema, document: &Value) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let mut replaced = HashSet::new();

    for error in compiled.validator.iter_errors(document) {
        let data_path = error.instance_path.to_string();

        if let Some(check) = failed_type_check(compiled, &error) {
            if replaced.insert(data_path.clone()) {
                errors.push(FieldError::new(data_path, check.message()));
            }
            continue;
        }

        errors.push(FieldError::new(data_path, error.to_string()));
    }

    errors
}

/// The registered type check behind an engine `type` error, if any.
///
/// Works from the error itself, so types reached through `$ref`, type lists
/// or combinators are covered the same as a plain `"type": "boolean"`.
fn failed_type_check<'a>(
    compiled: &'a CompiledSchema,
    error: &jsonschema::ValidationError<'_>,
) -> Option<&'a TypeCheck> {
    let ValidationErrorKind::Type { kind } = &error.kind else {
        return None;
    };
    expected_types(kind)
        .iter()
        .filter_map(|type_name| compiled.type_checks.get(type_name))
        .find(|check| !check.accepts(&error.instance))
}
