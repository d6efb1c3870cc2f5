//! Schema-validated documents for document-modeling toolkits.
//!
//! docprims validates documents against named JSON Schemas, resolves `$ref`s
//! to registered or remote schemas, and runs lifecycle hooks around each
//! validation.
//!
//! # Crate Structure
//!
//! - [`schema`]: Schema and validator registries, hooks, document validation
//!
//! The `http` feature enables fetching remote schemas over HTTP; the `cli`
//! feature builds the `docprims` binary.

/// Re-export schema types.
pub mod schema {
    pub use docprims_schema::*;
}
