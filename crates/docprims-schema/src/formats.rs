use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use jsonschema::error::TypeKind;
use regex::Regex;
use serde_json::Value;

/// Predicate applied to string values declared with `format: <name>`.
pub type FormatPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Predicate applied to values of fields declared with `type: <name>`.
pub type TypePredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

pub const BOOLEAN_TYPE_MESSAGE: &str = "This value must be a Boolean value";

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").expect("email pattern should compile")
});

/// A type-level check whose failure replaces the engine's message.
#[derive(Clone)]
pub struct TypeCheck {
    pub(crate) predicate: TypePredicate,
    pub(crate) message: String,
}

impl TypeCheck {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn accepts(&self, value: &Value) -> bool {
        (self.predicate)(value)
    }
}

impl fmt::Debug for TypeCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCheck")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// Named format and type validators consulted when a schema is compiled.
///
/// Ships with `email` and `boolean` registered. Registration is append-only;
/// re-registering a name replaces the previous predicate for schemas compiled
/// afterwards.
pub struct ValidatorRegistry {
    formats: RwLock<HashMap<String, FormatPredicate>>,
    types: RwLock<HashMap<String, TypeCheck>>,
}

/// Validators captured at compile time.
#[derive(Clone, Default)]
pub(crate) struct ValidatorSnapshot {
    pub(crate) formats: Vec<(String, FormatPredicate)>,
    pub(crate) types: HashMap<String, TypeCheck>,
}

impl ValidatorRegistry {
    /// Registry with the built-in validators.
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.register_format("email", is_email);
        registry.register_type_check("boolean", Value::is_boolean, BOOLEAN_TYPE_MESSAGE);
        registry
    }

    /// Registry without any validators.
    pub fn empty() -> Self {
        Self {
            formats: RwLock::new(HashMap::new()),
            types: RwLock::new(HashMap::new()),
        }
    }

    pub fn register_format<F>(&self, name: impl Into<String>, predicate: F)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(format = %name, "registering format validator");
        self.formats
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, Arc::new(predicate));
    }

    pub fn register_type_check<F>(
        &self,
        type_name: impl Into<String>,
        predicate: F,
        message: impl Into<String>,
    ) where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        tracing::debug!(type_name = %type_name, "registering type validator");
        self.types
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                type_name,
                TypeCheck {
                    predicate: Arc::new(predicate),
                    message: message.into(),
                },
            );
    }

    pub fn format(&self, name: &str) -> Option<FormatPredicate> {
        self.formats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn type_check(&self, type_name: &str) -> Option<TypeCheck> {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(type_name)
            .cloned()
    }

    /// Registered format names, sorted.
    pub fn format_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .formats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort_unstable();
        names
    }

    /// Registered type-check names, sorted.
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn snapshot(&self) -> ValidatorSnapshot {
        let formats = self
            .formats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, predicate)| (name.clone(), Arc::clone(predicate)))
            .collect();
        let types = self
            .types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        ValidatorSnapshot { formats, types }
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("formats", &self.format_names())
            .field("types", &self.type_names())
            .finish()
    }
}

pub fn is_email(value: &str) -> bool {
    EMAIL.is_match(value)
}

/// Type names an engine `type` error expected.
pub(crate) fn expected_types(kind: &TypeKind) -> Vec<String> {
    match kind {
        TypeKind::Single(expected) => vec![expected.to_string()],
        TypeKind::Multiple(expected) => (*expected)
            .into_iter()
            .map(|expected| expected.to_string())
            .collect(),
    }
}
