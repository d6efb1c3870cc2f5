/// Controls how the schema registry compiles and resolves schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// When true, object schemas reject properties they do not declare.
    pub strict_mode: bool,
    /// When true, `format` keywords are enforced rather than treated as annotations.
    pub validate_formats: bool,
    /// Maximum number of external schemas a single schema may pull in through `$ref`.
    pub max_resolved_schemas: usize,
    /// Maximum number of schemas loaded from a directory.
    pub max_schemas_from_directory: usize,
    /// Maximum bytes allowed per schema file loaded from a directory.
    pub max_schema_file_size: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            strict_mode: false,
            validate_formats: true,
            max_resolved_schemas: 64,
            max_schemas_from_directory: 256,
            max_schema_file_size: 256 * 1024,
        }
    }
}
