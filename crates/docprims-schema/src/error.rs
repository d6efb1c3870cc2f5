use std::fmt;

use serde::Serialize;

/// Errors that can occur while registering, loading or validating against schemas.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The definition does not conform to its JSON Schema meta-schema.
    #[error("invalid definition for schema {name}: {message}")]
    InvalidDefinition { name: String, message: String },

    /// A `$ref` of the schema could not be resolved. Terminal for that schema.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The document failed structural validation or a hook rejected it.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The name is not registered and is not a fetchable URI.
    #[error("no schema registered under {0}")]
    NotFound(String),

    /// A remote schema could not be fetched.
    #[error("failed to fetch schema {uri}: {message}")]
    Fetch { uri: String, message: String },

    /// A schema source could not be read from disk.
    #[error("failed to load schema source: {0}")]
    SourceLoad(String),

    /// A schema or document is not valid JSON.
    #[error("input is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A hook was registered for an event that does not exist.
    #[error("unknown hook event {0:?}")]
    UnknownHookEvent(String),
}

impl SchemaError {
    /// The validation error carried by this error, if any.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            SchemaError::Validation(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SchemaError>;

/// Why a schema could not finish loading.
///
/// Cloned into every `validate_document` call made after the failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("schema {schema} failed to load {reference}: {message}")]
pub struct LoadError {
    pub schema: String,
    pub reference: String,
    pub message: String,
}

/// One problem with one field of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    /// JSON pointer to the offending value (`""` for the document root).
    pub data_path: String,
    pub message: String,
}

impl FieldError {
    pub fn new(data_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            data_path: data_path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.data_path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.data_path, self.message)
        }
    }
}

/// A hook that refused the document without describing a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookFailure {
    pub message: String,
    /// Optional status code supplied by the hook (e.g. 400).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

impl HookFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: u16) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

impl fmt::Display for HookFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} ({code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Aggregate of everything that was wrong with a document.
///
/// A hook failure is recorded in `hook_failures` and does not add an entry to
/// `errors`. A document rejected only by a hook therefore produces a
/// `ValidationError` whose `errors` is empty. Detect rejection by matching on
/// the `Err`, never by checking `errors.is_empty()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error(
    "document rejected by schema {schema} ({} field errors, {} hook failures)",
    .errors.len(),
    .hook_failures.len()
)]
pub struct ValidationError {
    pub schema: String,
    pub errors: Vec<FieldError>,
    pub hook_failures: Vec<HookFailure>,
}

impl ValidationError {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            errors: Vec::new(),
            hook_failures: Vec::new(),
        }
    }

    /// True when neither structural validation nor any hook objected.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.hook_failures.is_empty()
    }
}
