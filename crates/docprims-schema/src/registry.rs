use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde_json::Value;
use tokio::sync::OnceCell;

use crate::config::RegistryConfig;
use crate::error::{Result, SchemaError};
use crate::fetch::SchemaFetcher;
use crate::formats::ValidatorRegistry;

const SCHEMA_FILE_SUFFIX: &str = ".schema.json";

/// Base URI the validation engine assigns to schemas without an `$id`.
pub(crate) const DEFAULT_BASE_URI: &str = "json-schema:///";

type FetchSlot = Arc<OnceCell<std::result::Result<Arc<Value>, String>>>;

/// Where a registry entry stands with respect to remote fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    /// Never registered nor requested.
    Unresolved,
    /// A fetch is in flight; resolvers wait for it.
    Fetching,
    /// Registered locally or fetched and cached.
    Resolved,
    /// The most recent fetch failed. The next resolve retries.
    Failed,
}

/// Name- and URI-keyed store of schema definitions.
///
/// Locally registered definitions always win over fetched ones. Remote
/// documents are fetched at most once at a time per URI and cached on success.
pub struct SchemaRegistry {
    definitions: RwLock<HashMap<String, Arc<Value>>>,
    remote: RwLock<HashMap<String, Arc<Value>>>,
    inflight: Mutex<HashMap<String, FetchSlot>>,
    failed: Mutex<HashSet<String>>,
    fetcher: Option<Arc<dyn SchemaFetcher>>,
    validators: Arc<ValidatorRegistry>,
    config: RegistryConfig,
}

impl SchemaRegistry {
    /// Create an empty registry with default config and built-in validators.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry with explicit config.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            definitions: RwLock::new(HashMap::new()),
            remote: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
            failed: Mutex::new(HashSet::new()),
            fetcher: None,
            validators: Arc::new(ValidatorRegistry::new()),
            config,
        }
    }

    /// Use `fetcher` for `http(s)` references that are not registered.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn SchemaFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Share a validator registry with other schema registries.
    pub fn with_validators(mut self, validators: Arc<ValidatorRegistry>) -> Self {
        self.validators = validators;
        self
    }

    /// Register `definition` under `name`, replacing any earlier definition.
    pub fn register_schema(&self, name: impl Into<String>, definition: Value) {
        let name = normalize_reference(&name.into());
        tracing::debug!(schema = %name, "registering schema");
        self.failed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&name);
        self.definitions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, Arc::new(definition));
    }

    /// Register a schema from a JSON string.
    pub fn register_str(&self, name: impl Into<String>, schema_json: &str) -> Result<()> {
        let definition: Value = serde_json::from_str(schema_json)?;
        self.register_schema(name, definition);
        Ok(())
    }

    /// Definition already available for `reference`, without fetching.
    pub fn lookup(&self, reference: &str) -> Option<Arc<Value>> {
        let key = normalize_reference(reference);
        if let Some(definition) = self
            .definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Some(Arc::clone(definition));
        }
        self.remote
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    /// Resolve `reference` to a definition, fetching remote URIs when needed.
    pub async fn resolve_schema(&self, reference: &str) -> Result<Arc<Value>> {
        let key = normalize_reference(reference);
        if let Some(definition) = self.lookup(&key) {
            return Ok(definition);
        }
        if !is_remote(&key) {
            return Err(SchemaError::NotFound(key));
        }
        let Some(fetcher) = self.fetcher.clone() else {
            return Err(SchemaError::Fetch {
                uri: key,
                message: "no schema fetcher configured".to_string(),
            });
        };

        let slot = Arc::clone(
            self.inflight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(key.clone())
                .or_default(),
        );

        let outcome = slot
            .get_or_init(|| async {
                tracing::debug!(uri = %key, "fetching remote schema");
                fetcher
                    .fetch(&key)
                    .await
                    .map(Arc::new)
                    .map_err(|err| err.to_string())
            })
            .await
            .clone();

        self.settle(&key, &slot, &outcome);

        outcome.map_err(|message| {
            tracing::warn!(uri = %key, %message, "remote schema fetch failed");
            SchemaError::Fetch { uri: key, message }
        })
    }

    fn settle(
        &self,
        key: &str,
        slot: &FetchSlot,
        outcome: &std::result::Result<Arc<Value>, String>,
    ) {
        {
            let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            if inflight.get(key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
                inflight.remove(key);
            }
        }
        let mut failed = self.failed.lock().unwrap_or_else(PoisonError::into_inner);
        match outcome {
            Ok(definition) => {
                failed.remove(key);
                self.remote
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::clone(definition));
            }
            Err(_) => {
                failed.insert(key.to_string());
            }
        }
    }

    pub fn fetch_state(&self, reference: &str) -> FetchState {
        let key = normalize_reference(reference);
        if self.lookup(&key).is_some() {
            FetchState::Resolved
        } else if self
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&key)
        {
            FetchState::Fetching
        } else if self
            .failed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&key)
        {
            FetchState::Failed
        } else {
            FetchState::Unresolved
        }
    }

    /// Check if a definition is available for `reference` without fetching.
    pub fn contains(&self, reference: &str) -> bool {
        self.lookup(reference).is_some()
    }

    /// Names of locally registered schemas, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort_unstable();
        names
    }

    /// Register every `<name>.schema.json` file in `path` under `<name>`.
    ///
    /// Returns the registered names, sorted.
    pub fn load_directory(&self, path: &Path) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(path)
            .map_err(|err| SchemaError::SourceLoad(format!("{}: {err}", path.display())))?;

        let mut loaded = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| SchemaError::SourceLoad(err.to_string()))?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            let Some(name) = file_name.strip_suffix(SCHEMA_FILE_SUFFIX) else {
                continue;
            };
            if name.is_empty() {
                return Err(SchemaError::SourceLoad(format!(
                    "schema file without a name: {file_name}"
                )));
            }

            let entry_path = entry.path();
            let path_metadata = std::fs::symlink_metadata(&entry_path)
                .map_err(|err| SchemaError::SourceLoad(err.to_string()))?;
            if path_metadata.file_type().is_symlink() {
                return Err(SchemaError::SourceLoad(format!(
                    "refusing to load schema symlink: {file_name}"
                )));
            }
            if !path_metadata.is_file() {
                continue;
            }

            if loaded.len() >= self.config.max_schemas_from_directory {
                return Err(SchemaError::SourceLoad(format!(
                    "schema count exceeds configured max ({})",
                    self.config.max_schemas_from_directory
                )));
            }

            let content = self.read_schema_file(&entry_path, &path_metadata)?;
            self.register_str(name, &content)?;
            loaded.push(name.to_string());
        }

        loaded.sort_unstable();
        tracing::debug!(dir = %path.display(), count = loaded.len(), "loaded schema directory");
        Ok(loaded)
    }

    fn read_schema_file(&self, path: &Path, path_metadata: &std::fs::Metadata) -> Result<String> {
        let max_bytes = self.config.max_schema_file_size;
        let file = std::fs::File::open(path).map_err(|err| {
            SchemaError::SourceLoad(format!("failed opening schema {}: {err}", path.display()))
        })?;
        let opened_metadata = file
            .metadata()
            .map_err(|err| SchemaError::SourceLoad(err.to_string()))?;

        #[cfg(unix)]
        {
            if !same_file_identity(path_metadata, &opened_metadata) {
                return Err(SchemaError::SourceLoad(format!(
                    "schema file changed during load: {}",
                    path.display()
                )));
            }
        }
        #[cfg(not(unix))]
        let _ = path_metadata;

        if opened_metadata.len() > max_bytes as u64 {
            return Err(SchemaError::SourceLoad(format!(
                "schema file too large ({} bytes): {}",
                opened_metadata.len(),
                path.display()
            )));
        }

        let read_limit = u64::try_from(max_bytes.saturating_add(1)).unwrap_or(u64::MAX);
        let mut content = String::new();
        file.take(read_limit)
            .read_to_string(&mut content)
            .map_err(|err| {
                SchemaError::SourceLoad(format!("failed reading schema {}: {err}", path.display()))
            })?;
        if content.len() > max_bytes {
            return Err(SchemaError::SourceLoad(format!(
                "schema file too large while reading: {}",
                path.display()
            )));
        }
        Ok(content)
    }

    pub fn validators(&self) -> &Arc<ValidatorRegistry> {
        &self.validators
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("names", &self.names())
            .field("has_fetcher", &self.fetcher.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Canonical registry key for a `$ref` target: no fragment, no default base.
pub(crate) fn normalize_reference(reference: &str) -> String {
    let without_fragment = reference.split('#').next().unwrap_or_default();
    without_fragment
        .strip_prefix(DEFAULT_BASE_URI)
        .unwrap_or(without_fragment)
        .to_string()
}

pub(crate) fn is_remote(reference: &str) -> bool {
    reference.starts_with("https://") || reference.starts_with("http://")
}

#[cfg(unix)]
fn same_file_identity(
    path_metadata: &std::fs::Metadata,
    opened_metadata: &std::fs::Metadata,
) -> bool {
    use std::os::unix::fs::MetadataExt;
    path_metadata.dev() == opened_metadata.dev() && path_metadata.ino() == opened_metadata.ino()
}
