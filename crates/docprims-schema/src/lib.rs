//! Named JSON Schema validation for documents.
//!
//! Register schema definitions by name, let `$ref`s point at them (or at
//! remote URLs fetched on demand), and validate documents with lifecycle
//! hooks running around the JSON Schema engine.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use docprims_schema::{Schema, SchemaRegistry};
//! use serde_json::json;
//!
//! # async fn demo() -> docprims_schema::Result<()> {
//! let registry = Arc::new(SchemaRegistry::new());
//! registry.register_schema("age", json!({ "type": "integer", "minimum": 0 }));
//!
//! let schema = Schema::new(
//!     "person",
//!     json!({ "type": "object", "properties": { "age": { "$ref": "age" } } }),
//!     registry,
//! )?;
//! schema.validate_document(&json!({ "age": 42 })).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod fetch;
pub mod formats;
pub mod hooks;
mod pipeline;
pub mod registry;
pub mod schema;
mod strict;

pub use config::RegistryConfig;
pub use error::{FieldError, HookFailure, LoadError, Result, SchemaError, ValidationError};
#[cfg(feature = "http")]
pub use fetch::HttpFetcher;
pub use fetch::{MemoryFetcher, SchemaFetcher};
pub use formats::{ValidatorRegistry, BOOLEAN_TYPE_MESSAGE};
pub use hooks::{hook_fn, FnHook, Hook, HookChain, HookEvent, HookResult};
pub use registry::{FetchState, SchemaRegistry};
pub use schema::{Schema, SchemaState};
