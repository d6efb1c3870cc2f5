use std::fmt;
use std::io;
use std::path::Path;

use docprims_schema::SchemaError;

// Exit codes follow sysexits-style semantics.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const SCHEMA_LOAD_FAILED: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(path: &Path, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{}: {err}", path.display()))
}

pub fn schema_error(context: &str, err: SchemaError) -> CliError {
    let code = match &err {
        SchemaError::InvalidDefinition { .. }
        | SchemaError::Validation(_)
        | SchemaError::InvalidJson(_) => DATA_INVALID,
        SchemaError::Load(_) | SchemaError::Fetch { .. } => SCHEMA_LOAD_FAILED,
        SchemaError::NotFound(_) | SchemaError::UnknownHookEvent(_) => USAGE,
        SchemaError::SourceLoad(_) => FAILURE,
    };
    CliError::new(code, format!("{context}: {err}"))
}
