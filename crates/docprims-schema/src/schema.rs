use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use jsonschema::{Retrieve, Uri, Validator};
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use crate::error::{LoadError, Result, SchemaError};
use crate::formats::TypeCheck;
use crate::hooks::{Hook, HookChain, HookEvent};
use crate::pipeline;
use crate::registry::{is_remote, normalize_reference, SchemaRegistry};
use crate::strict::{close_object_schemas, subschemas};

/// Meta-schemas the engine ships with; refs under these never reach the registry.
const BUNDLED_META_SCHEMAS: [&str; 5] = [
    "http://json-schema.org/draft-04/",
    "http://json-schema.org/draft-06/",
    "http://json-schema.org/draft-07/",
    "https://json-schema.org/draft/2019-09/",
    "https://json-schema.org/draft/2020-12/",
];

type LoadState = std::result::Result<Arc<CompiledSchema>, LoadError>;

/// Lifecycle of a [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    /// Some `$ref` targets are not available yet.
    Pending,
    /// Compiled and ready to validate. Permanent.
    Loaded,
    /// A `$ref` could not be resolved. Permanent.
    LoadFailed,
}

pub(crate) struct CompiledSchema {
    pub(crate) validator: Validator,
    pub(crate) type_checks: HashMap<String, TypeCheck>,
}

/// One named JSON Schema document plus the hooks run around it.
///
/// The definition is checked against its meta-schema on construction. If all
/// of its `$ref` targets are already registered the schema is loaded
/// immediately; otherwise it loads on the first [`Schema::wait_loaded`] or
/// [`Schema::validate_document`], fetching remote targets through the registry.
pub struct Schema {
    name: String,
    definition: Arc<Value>,
    registry: Arc<SchemaRegistry>,
    hooks: HookChain,
    state: OnceCell<LoadState>,
}

impl Schema {
    pub fn new(
        name: impl Into<String>,
        definition: Value,
        registry: Arc<SchemaRegistry>,
    ) -> Result<Self> {
        let name = name.into();
        check_definition(&name, &definition)?;

        let state = match gather_registered(&registry, &definition) {
            Some(resolved) => {
                let compiled = compile(&name, &definition, resolved, &registry).map(Arc::new);
                tracing::debug!(schema = %name, ok = compiled.is_ok(), "schema compiled on construction");
                OnceCell::new_with(Some(compiled))
            }
            None => {
                tracing::debug!(schema = %name, "schema waiting on external references");
                OnceCell::new()
            }
        };

        Ok(Self {
            name,
            definition: Arc::new(definition),
            registry,
            hooks: HookChain::new(),
            state,
        })
    }

    /// Parse `schema_json` and construct a schema from it.
    pub fn from_json(
        name: impl Into<String>,
        schema_json: &str,
        registry: Arc<SchemaRegistry>,
    ) -> Result<Self> {
        let definition: Value = serde_json::from_str(schema_json)?;
        Self::new(name, definition, registry)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &Value {
        &self.definition
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn hooks(&self) -> &HookChain {
        &self.hooks
    }

    pub fn state(&self) -> SchemaState {
        match self.state.get() {
            None => SchemaState::Pending,
            Some(Ok(_)) => SchemaState::Loaded,
            Some(Err(_)) => SchemaState::LoadFailed,
        }
    }

    pub fn loaded(&self) -> bool {
        self.state() == SchemaState::Loaded
    }

    /// Resolve outstanding references and compile.
    ///
    /// Runs the load at most once however many callers wait; later callers
    /// see the same outcome.
    pub async fn wait_loaded(&self) -> Result<()> {
        self.compiled().await.map(drop)
    }

    /// Append `hook` to the hooks of `event`.
    pub fn hook(&mut self, event: HookEvent, hook: impl Hook + 'static) {
        self.hooks.register(event, Arc::new(hook));
    }

    /// Like [`Schema::hook`], with the event given by name (e.g. `"didValidate"`).
    pub fn hook_named(&mut self, event: &str, hook: impl Hook + 'static) -> Result<()> {
        let event = event.parse::<HookEvent>()?;
        self.hook(event, hook);
        Ok(())
    }

    /// Validate `document`, running hooks around structural validation.
    ///
    /// `Ok(())` means the document is accepted. Rejections come back as
    /// [`SchemaError::Validation`]; a schema that failed to load returns
    /// [`SchemaError::Load`] without validating.
    pub async fn validate_document(&self, document: &Value) -> Result<()> {
        pipeline::run(self, document).await
    }

    /// Parse `document_json` and validate it.
    pub async fn validate_json(&self, document_json: &str) -> Result<()> {
        let document: Value = serde_json::from_str(document_json)?;
        self.validate_document(&document).await
    }

    pub(crate) async fn compiled(&self) -> Result<Arc<CompiledSchema>> {
        let state = self.state.get_or_init(|| self.load()).await;
        match state {
            Ok(compiled) => Ok(Arc::clone(compiled)),
            Err(err) => Err(SchemaError::Load(err.clone())),
        }
    }

    async fn load(&self) -> LoadState {
        let resolved = self.gather_resolved().await?;
        let compiled = compile(&self.name, &self.definition, resolved, &self.registry)?;
        tracing::debug!(schema = %self.name, "schema loaded");
        Ok(Arc::new(compiled))
    }

    async fn gather_resolved(&self) -> std::result::Result<HashMap<String, Arc<Value>>, LoadError> {
        let limit = self.registry.config().max_resolved_schemas;
        let mut resolved = HashMap::new();
        let mut queue: VecDeque<String> = external_refs(&self.definition).into();

        while let Some(reference) = queue.pop_front() {
            if resolved.contains_key(&reference) {
                continue;
            }
            if resolved.len() >= limit {
                return Err(self.load_error(&reference, format!("more than {limit} referenced schemas")));
            }
            let definition = self
                .registry
                .resolve_schema(&reference)
                .await
                .map_err(|err| self.load_error(&reference, err.to_string()))?;
            queue.extend(nested_refs(&reference, &definition));
            resolved.insert(reference, definition);
        }
        Ok(resolved)
    }

    fn load_error(&self, reference: &str, message: String) -> LoadError {
        tracing::warn!(schema = %self.name, %reference, %message, "schema failed to load");
        LoadError {
            schema: self.name.clone(),
            reference: reference.to_string(),
            message,
        }
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

/// Compile against the meta-schema only; every external target is accepted.
fn check_definition(name: &str, definition: &Value) -> Result<()> {
    let mut options = jsonschema::options();
    options.with_retriever(AcceptAnyRetriever);
    options
        .build(definition)
        .map(drop)
        .map_err(|err| SchemaError::InvalidDefinition {
            name: name.to_string(),
            message: err.to_string(),
        })
}

fn compile(
    name: &str,
    definition: &Value,
    resolved: HashMap<String, Arc<Value>>,
    registry: &SchemaRegistry,
) -> std::result::Result<CompiledSchema, LoadError> {
    let config = registry.config();
    let mut effective = definition.clone();
    if config.strict_mode {
        close_object_schemas(&mut effective);
    }

    let mut schemas = HashMap::with_capacity(resolved.len());
    for (reference, target) in resolved {
        let mut target = (*target).clone();
        if config.strict_mode {
            close_object_schemas(&mut target);
        }
        schemas.insert(reference, target);
    }

    let validators = registry.validators().snapshot();
    let mut options = jsonschema::options();
    options.should_validate_formats(config.validate_formats);
    for (format, predicate) in validators.formats {
        options.with_format(format, move |value: &str| predicate(value));
    }
    options.with_retriever(RegistryRetriever { schemas });

    let validator = options.build(&effective).map_err(|err| LoadError {
        schema: name.to_string(),
        reference: name.to_string(),
        message: format!("failed to compile: {err}"),
    })?;

    Ok(CompiledSchema {
        validator,
        type_checks: validators.types,
    })
}

/// Every external target is registered already; `None` if one is missing.
fn gather_registered(
    registry: &SchemaRegistry,
    definition: &Value,
) -> Option<HashMap<String, Arc<Value>>> {
    let limit = registry.config().max_resolved_schemas;
    let mut resolved = HashMap::new();
    let mut queue: VecDeque<String> = external_refs(definition).into();

    while let Some(reference) = queue.pop_front() {
        if resolved.contains_key(&reference) {
            continue;
        }
        if resolved.len() >= limit {
            return None;
        }
        let target = registry.lookup(&reference)?;
        queue.extend(nested_refs(&reference, &target));
        resolved.insert(reference, target);
    }
    Some(resolved)
}

/// External `$ref` targets of a root schema, normalised to registry keys.
fn external_refs(definition: &Value) -> Vec<String> {
    let base = definition
        .get("$id")
        .and_then(Value::as_str)
        .filter(|id| is_remote(id))
        .unwrap_or_default();
    nested_refs(base, definition)
}

/// External `$ref` targets of a schema published under `base`.
fn nested_refs(base: &str, definition: &Value) -> Vec<String> {
    let mut raw = Vec::new();
    collect_refs(definition, &mut raw);

    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|reference| join_reference(base, reference))
        .map(|reference| normalize_reference(&reference))
        .filter(|reference| !reference.is_empty() && reference != base)
        .filter(|reference| !is_bundled(reference))
        .filter(|reference| seen.insert(reference.clone()))
        .collect()
}

fn collect_refs<'a>(node: &'a Value, out: &mut Vec<&'a str>) {
    let Value::Object(map) = node else {
        return;
    };
    if let Some(Value::String(reference)) = map.get("$ref") {
        out.push(reference);
    }
    subschemas(map).for_each(|child| collect_refs(child, out));
}

fn is_bundled(reference: &str) -> bool {
    BUNDLED_META_SCHEMAS
        .iter()
        .any(|prefix| reference.starts_with(prefix))
}

/// Resolve `reference` relative to a remote `base`; other bases leave it as is.
fn join_reference(base: &str, reference: &str) -> String {
    if !is_remote(base) || reference.contains("://") || reference.starts_with('#') {
        return reference.to_string();
    }
    let base = base.split('#').next().unwrap_or_default();
    if reference.starts_with('/') {
        let after_scheme = base.find("://").map_or(0, |index| index + 3);
        let origin_end = base[after_scheme..]
            .find('/')
            .map_or(base.len(), |index| after_scheme + index);
        return format!("{}{reference}", &base[..origin_end]);
    }
    match base.rfind('/') {
        Some(index) => format!("{}{reference}", &base[..=index]),
        None => reference.to_string(),
    }
}

struct RegistryRetriever {
    schemas: HashMap<String, Value>,
}

impl Retrieve for RegistryRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> std::result::Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let key = normalize_reference(uri.as_str());
        self.schemas
            .get(&key)
            .cloned()
            .ok_or_else(|| format!("schema {key} is not registered").into())
    }
}

struct AcceptAnyRetriever;

impl Retrieve for AcceptAnyRetriever {
    fn retrieve(
        &self,
        _uri: &Uri<&str>,
    ) -> std::result::Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        Ok(json!({}))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::config::RegistryConfig;
    use crate::error::{FieldError, HookFailure};
    use crate::fetch::{MemoryFetcher, SchemaFetcher};
    use crate::formats::BOOLEAN_TYPE_MESSAGE;
    use crate::hooks::hook_fn;
    use crate::registry::FetchState;

    const DRAFT4: &str = "http://json-schema.org/draft-04/schema#";
    const REMOTE: &str = "https://schemas.example/validate/rule/test.model";

    fn registry() -> Arc<SchemaRegistry> {
        Arc::new(SchemaRegistry::new())
    }

    fn val_schema() -> Value {
        json!({
            "$schema": DRAFT4,
            "type": "object",
            "required": ["val"],
            "properties": {
                "val": { "type": "number", "minimum": 10 }
            }
        })
    }

    fn validation_error(result: Result<()>) -> crate::error::ValidationError {
        match result {
            Err(SchemaError::Validation(err)) => err,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_json_schema_definitions() {
        let schema = Schema::new(
            "schema",
            json!({ "$schema": DRAFT4, "type": "number", "minimum": 10 }),
            registry(),
        )
        .unwrap();
        assert_eq!(schema.name(), "schema");
        assert!(schema.loaded());
    }

    #[test]
    fn rejects_invalid_definitions() {
        let result = Schema::new(
            "schema",
            json!({ "$schema": DRAFT4, "type": "shalala", "minimum": 10 }),
            registry(),
        );
        assert!(matches!(result, Err(SchemaError::InvalidDefinition { .. })));
    }

    #[test]
    fn from_json_rejects_invalid_json() {
        assert!(matches!(
            Schema::from_json("schema", "{", registry()),
            Err(SchemaError::InvalidJson(_))
        ));
    }

    #[test]
    fn registered_refs_load_without_waiting() {
        let registry = registry();
        registry.register_schema("test", json!({ "$schema": DRAFT4, "type": "number", "minimum": 10 }));

        let schema = Schema::new(
            "marco",
            json!({
                "$schema": DRAFT4,
                "type": "object",
                "properties": { "val": { "$ref": "test" } }
            }),
            registry,
        )
        .unwrap();
        assert!(schema.loaded());
    }

    #[tokio::test]
    async fn registered_refs_are_enforced() {
        let registry = registry();
        registry.register_schema("test", json!({ "$schema": DRAFT4, "type": "number", "minimum": 10 }));
        let schema = Schema::new(
            "marco",
            json!({
                "$schema": DRAFT4,
                "type": "object",
                "properties": { "val": { "$ref": "test" } }
            }),
            registry,
        )
        .unwrap();

        assert!(schema.validate_document(&json!({ "val": 12 })).await.is_ok());
        let err = validation_error(schema.validate_document(&json!({ "val": 3 })).await);
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].data_path, "/val");
    }

    #[tokio::test]
    async fn re_registration_applies_to_later_schemas() {
        let registry = registry();
        let definition = json!({
            "$schema": DRAFT4,
            "type": "object",
            "properties": { "val": { "$ref": "test" } }
        });

        registry.register_schema("test", json!({ "type": "number", "minimum": 10 }));
        let before = Schema::new("before", definition.clone(), Arc::clone(&registry)).unwrap();
        registry.register_schema("test", json!({ "type": "number", "minimum": 100 }));
        let after = Schema::new("after", definition, registry).unwrap();

        let doc = json!({ "val": 50 });
        assert!(before.validate_document(&doc).await.is_ok());
        assert!(after.validate_document(&doc).await.is_err());
    }

    #[tokio::test]
    async fn remote_refs_load_once_after_caching() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.insert(REMOTE, json!({ "$schema": DRAFT4, "type": "number", "minimum": 10 }));
        let registry = Arc::new(SchemaRegistry::new().with_fetcher(fetcher.clone()));

        let schema = Arc::new(
            Schema::new(
                "marco",
                json!({
                    "$schema": DRAFT4,
                    "type": "object",
                    "properties": { "val": { "$ref": REMOTE } }
                }),
                Arc::clone(&registry),
            )
            .unwrap(),
        );
        assert_eq!(schema.state(), SchemaState::Pending);
        assert_eq!(registry.fetch_state(REMOTE), FetchState::Unresolved);

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let schema = Arc::clone(&schema);
                tokio::spawn(async move { schema.wait_loaded().await })
            })
            .collect();
        for waiter in waiters {
            waiter.await.unwrap().unwrap();
        }

        assert!(schema.loaded());
        assert_eq!(registry.fetch_state(REMOTE), FetchState::Resolved);
        assert_eq!(fetcher.requests(), 1);

        assert!(schema.validate_document(&json!({ "val": 11 })).await.is_ok());
        assert!(schema.validate_document(&json!({ "val": 9 })).await.is_err());
    }

    #[tokio::test]
    async fn refs_inside_remote_schemas_resolve_relative_to_them() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.insert(
            "https://schemas.example/rules/person.json",
            json!({
                "type": "object",
                "properties": { "age": { "$ref": "age.json" } }
            }),
        );
        fetcher.insert(
            "https://schemas.example/rules/age.json",
            json!({ "type": "integer", "minimum": 0 }),
        );
        let registry = Arc::new(SchemaRegistry::new().with_fetcher(fetcher.clone()));
        let schema = Schema::new(
            "family",
            json!({
                "type": "object",
                "properties": {
                    "head": { "$ref": "https://schemas.example/rules/person.json" }
                }
            }),
            registry,
        )
        .unwrap();

        assert!(schema.validate_document(&json!({ "head": { "age": 40 } })).await.is_ok());
        let err = validation_error(schema.validate_document(&json!({ "head": { "age": -1 } })).await);
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].data_path, "/head/age");
        assert_eq!(fetcher.requests(), 2);
    }

    #[tokio::test]
    async fn failed_remote_ref_is_terminal() {
        let fetcher = Arc::new(MemoryFetcher::new());
        let registry = Arc::new(SchemaRegistry::new().with_fetcher(fetcher.clone()));
        let schema = Schema::new(
            "marco",
            json!({ "properties": { "val": { "$ref": REMOTE } } }),
            registry,
        )
        .unwrap();

        let first = schema.wait_loaded().await;
        assert!(matches!(&first, Err(SchemaError::Load(err)) if err.reference == REMOTE));
        assert_eq!(schema.state(), SchemaState::LoadFailed);

        fetcher.insert(REMOTE, json!({ "type": "number" }));
        let second = schema.validate_document(&json!({ "val": 1 })).await;
        assert!(matches!(second, Err(SchemaError::Load(_))));
        assert_eq!(fetcher.requests(), 1);
    }

    #[tokio::test]
    async fn unregistered_local_ref_fails_to_load() {
        let schema = Schema::new(
            "marco",
            json!({ "properties": { "val": { "$ref": "nowhere" } } }),
            registry(),
        )
        .unwrap();
        assert!(!schema.loaded());

        let err = schema.wait_loaded().await.unwrap_err();
        assert!(err.to_string().contains("nowhere"));
    }

    #[tokio::test]
    async fn later_registration_unblocks_pending_schema() {
        let registry = registry();
        let schema = Schema::new(
            "marco",
            json!({ "properties": { "val": { "$ref": "late" } } }),
            Arc::clone(&registry),
        )
        .unwrap();
        assert_eq!(schema.state(), SchemaState::Pending);

        registry.register_schema("late", json!({ "type": "string" }));
        schema.wait_loaded().await.unwrap();
        assert!(schema.validate_document(&json!({ "val": 1 })).await.is_err());
    }

    #[tokio::test]
    async fn too_many_references_fail_to_load() {
        let registry = Arc::new(SchemaRegistry::with_config(RegistryConfig {
            max_resolved_schemas: 1,
            ..RegistryConfig::default()
        }));
        registry.register_schema("a", json!({ "type": "string" }));
        registry.register_schema("b", json!({ "type": "string" }));
        let schema = Schema::new(
            "marco",
            json!({ "properties": { "x": { "$ref": "a" }, "y": { "$ref": "b" } } }),
            registry,
        )
        .unwrap();

        assert!(!schema.loaded());
        assert!(matches!(schema.wait_loaded().await, Err(SchemaError::Load(_))));
    }

    #[tokio::test]
    async fn valid_document_passes() {
        let schema = Schema::new("marco", val_schema(), registry()).unwrap();
        assert!(schema.validate_document(&json!({ "val": 11 })).await.is_ok());
    }

    #[tokio::test]
    async fn invalid_document_reports_one_error() {
        let schema = Schema::new("marco", val_schema(), registry()).unwrap();
        let err = validation_error(schema.validate_document(&json!({ "val": 9 })).await);
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].data_path, "/val");
        assert!(err.hook_failures.is_empty());
    }

    #[tokio::test]
    async fn missing_required_field_points_at_root() {
        let schema = Schema::new("marco", val_schema(), registry()).unwrap();
        let err = validation_error(schema.validate_document(&json!({})).await);
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].data_path, "");
    }

    #[tokio::test]
    async fn failing_hook_yields_error_without_entries() {
        let mut schema = Schema::new("marco", val_schema(), registry()).unwrap();
        schema
            .hook_named(
                "didValidate",
                hook_fn(|_| Err(HookFailure::with_code("Invalid reconfibulator flows detected.", 400))),
            )
            .unwrap();

        let err = validation_error(schema.validate_document(&json!({ "val": 11 })).await);
        assert_eq!(err.errors.len(), 0);
        assert_eq!(err.hook_failures.len(), 1);
        assert_eq!(err.hook_failures[0].code, Some(400));
    }

    #[tokio::test]
    async fn did_validate_runs_after_structural_failure() {
        let mut schema = Schema::new("marco", val_schema(), registry()).unwrap();
        schema.hook(
            HookEvent::DidValidate,
            hook_fn(|doc: &Value| {
                if doc["val"].as_f64().is_some_and(|v| v < 10.0) {
                    Ok(vec![FieldError::new("/val", "too small for policy")])
                } else {
                    Ok(Vec::new())
                }
            }),
        );

        let err = validation_error(schema.validate_document(&json!({ "val": 9 })).await);
        assert_eq!(err.errors.len(), 2);
        assert_eq!(err.errors[1].message, "too small for policy");
    }

    #[tokio::test]
    async fn will_validate_failure_skips_structural_validation() {
        let mut schema = Schema::new("marco", val_schema(), registry()).unwrap();
        schema.hook(HookEvent::WillValidate, hook_fn(|_| Err(HookFailure::new("locked"))));
        schema.hook(
            HookEvent::DidValidate,
            hook_fn(|_| Ok(vec![FieldError::new("", "should not run")])),
        );

        let err = validation_error(schema.validate_document(&json!({ "val": 9 })).await);
        assert!(err.errors.is_empty());
        assert_eq!(err.hook_failures, vec![HookFailure::new("locked")]);
    }

    #[test]
    fn unknown_hook_event_is_rejected() {
        let mut schema = Schema::new("marco", val_schema(), registry()).unwrap();
        let result = schema.hook_named("didExplode", hook_fn(|_| Ok(Vec::new())));
        assert!(matches!(result, Err(SchemaError::UnknownHookEvent(_))));
        assert!(schema.hooks().is_empty());
    }

    struct SlowHook;

    #[async_trait]
    impl Hook for SlowHook {
        async fn call(&self, _document: &Value) -> crate::hooks::HookResult {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(vec![FieldError::new("/slow", "slow hook ran")])
        }
    }

    #[tokio::test]
    async fn async_hooks_are_awaited_before_completion() {
        let mut schema = Schema::new("marco", val_schema(), registry()).unwrap();
        schema.hook(HookEvent::DidValidate, SlowHook);
        schema.hook(
            HookEvent::DidValidate,
            hook_fn(|_| Ok(vec![FieldError::new("/fast", "fast hook ran")])),
        );

        let err = validation_error(schema.validate_document(&json!({ "val": 11 })).await);
        let paths: Vec<&str> = err.errors.iter().map(|e| e.data_path.as_str()).collect();
        assert_eq!(paths, vec!["/slow", "/fast"]);
    }

    #[tokio::test]
    async fn email_format_is_enforced() {
        let schema = Schema::new(
            "marco",
            json!({
                "$schema": DRAFT4,
                "type": "object",
                "required": ["email"],
                "properties": { "email": { "type": "string", "format": "email" } }
            }),
            registry(),
        )
        .unwrap();

        assert!(schema
            .validate_document(&json!({ "email": "ada@example.com" }))
            .await
            .is_ok());
        let err = validation_error(schema.validate_document(&json!({ "email": "invalid" })).await);
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].data_path, "/email");
    }

    #[tokio::test]
    async fn custom_formats_are_picked_up_at_compile_time() {
        let registry = registry();
        registry
            .validators()
            .register_format("lowercase", |v: &str| v.chars().all(|c| !c.is_uppercase()));
        let schema = Schema::new(
            "tags",
            json!({ "properties": { "tag": { "type": "string", "format": "lowercase" } } }),
            registry,
        )
        .unwrap();

        assert!(schema.validate_document(&json!({ "tag": "rust" })).await.is_ok());
        let err = validation_error(schema.validate_document(&json!({ "tag": "Rust" })).await);
        assert_eq!(err.errors[0].data_path, "/tag");
    }

    #[tokio::test]
    async fn boolean_fields_report_fixed_message() {
        let schema = Schema::new(
            "flags",
            json!({
                "type": "object",
                "properties": { "active": { "type": "boolean" } }
            }),
            registry(),
        )
        .unwrap();

        assert!(schema.validate_document(&json!({ "active": false })).await.is_ok());
        for bad in [json!("true"), json!(1), json!(null), json!([]), json!({})] {
            let err = validation_error(schema.validate_document(&json!({ "active": bad })).await);
            assert_eq!(
                err.errors,
                vec![FieldError::new("/active", BOOLEAN_TYPE_MESSAGE)]
            );
        }
    }

    #[tokio::test]
    async fn boolean_message_covers_refs_type_lists_and_combinators() {
        let registry = registry();
        registry.register_schema("flag", json!({ "type": "boolean" }));
        let schema = Schema::new(
            "flags",
            json!({
                "type": "object",
                "properties": {
                    "active": { "$ref": "flag" },
                    "listed": { "type": ["boolean"] },
                    "wrapped": { "allOf": [{ "type": "boolean" }, { "$ref": "flag" }] },
                    "pinned": { "type": "boolean", "enum": [true] }
                }
            }),
            registry,
        )
        .unwrap();
        assert!(schema.loaded());

        let doc = json!({ "active": "yes", "listed": 1, "wrapped": "no" });
        let mut err = validation_error(schema.validate_document(&doc).await);
        err.errors.sort_by(|a, b| a.data_path.cmp(&b.data_path));
        assert_eq!(
            err.errors,
            vec![
                FieldError::new("/active", BOOLEAN_TYPE_MESSAGE),
                FieldError::new("/listed", BOOLEAN_TYPE_MESSAGE),
                FieldError::new("/wrapped", BOOLEAN_TYPE_MESSAGE),
            ]
        );

        let err = validation_error(schema.validate_document(&json!({ "pinned": false })).await);
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].data_path, "/pinned");
        assert_ne!(err.errors[0].message, BOOLEAN_TYPE_MESSAGE);
    }

    #[tokio::test]
    async fn refs_under_keyword_named_properties_load() {
        let registry = registry();
        registry.register_schema("test", json!({ "type": "number", "minimum": 10 }));
        let schema = Schema::new(
            "settings",
            json!({
                "type": "object",
                "properties": {
                    "default": { "$ref": "test" },
                    "examples": { "items": { "$ref": "test" } }
                }
            }),
            registry,
        )
        .unwrap();
        assert_eq!(schema.state(), SchemaState::Loaded);

        assert!(schema.validate_document(&json!({ "default": 12, "examples": [10] })).await.is_ok());
        let err = validation_error(schema.validate_document(&json!({ "default": 5 })).await);
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].data_path, "/default");
    }

    #[tokio::test]
    async fn meta_schema_refs_resolve_without_a_fetcher() {
        let schema = Schema::new(
            "wrapper",
            json!({
                "type": "object",
                "properties": {
                    "nested": { "$ref": "http://json-schema.org/draft-04/schema#" }
                }
            }),
            registry(),
        )
        .unwrap();
        assert!(schema.loaded());

        schema.wait_loaded().await.unwrap();
        assert!(schema
            .validate_document(&json!({ "nested": { "type": "string" } }))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn strict_mode_rejects_undeclared_properties() {
        let registry = Arc::new(SchemaRegistry::with_config(RegistryConfig {
            strict_mode: true,
            ..RegistryConfig::default()
        }));
        let schema = Schema::new("marco", val_schema(), registry).unwrap();

        assert!(schema.validate_document(&json!({ "val": 11 })).await.is_ok());
        let err = validation_error(schema.validate_document(&json!({ "val": 11, "extra": 1 })).await);
        assert_eq!(err.errors.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_validations_are_independent() {
        let schema = Arc::new(Schema::new("marco", val_schema(), registry()).unwrap());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let schema = Arc::clone(&schema);
                tokio::spawn(async move { schema.validate_document(&json!({ "val": i })).await })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let result = handle.await.unwrap();
            assert_eq!(result.is_ok(), i >= 10, "val = {i}");
        }
    }

    struct NeverFetcher;

    #[async_trait]
    impl SchemaFetcher for NeverFetcher {
        async fn fetch(&self, _uri: &str) -> Result<Value> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn pending_schema_does_not_validate() {
        let registry = Arc::new(SchemaRegistry::new().with_fetcher(Arc::new(NeverFetcher)));
        let schema = Schema::new(
            "marco",
            json!({ "properties": { "val": { "$ref": REMOTE } } }),
            registry,
        )
        .unwrap();

        let attempt =
            tokio::time::timeout(Duration::from_millis(50), schema.validate_document(&json!({}))).await;
        assert!(attempt.is_err());
        assert_eq!(schema.state(), SchemaState::Pending);
    }

    #[test]
    fn join_reference_follows_remote_base() {
        let base = "https://schemas.example/rules/person.json";
        assert_eq!(join_reference(base, "age.json"), "https://schemas.example/rules/age.json");
        assert_eq!(join_reference(base, "/root.json"), "https://schemas.example/root.json");
        assert_eq!(join_reference(base, "https://other.example/x"), "https://other.example/x");
        assert_eq!(join_reference(base, "#/definitions/a"), "#/definitions/a");
        assert_eq!(join_reference("", "test"), "test");
    }

    #[test]
    fn external_refs_skip_local_and_data_refs() {
        let definition = json!({
            "definitions": { "n": { "type": "number" } },
            "properties": {
                "a": { "$ref": "#/definitions/n" },
                "b": { "$ref": "test#/definitions/x" },
                "c": { "$ref": "test" },
                "d": { "const": { "$ref": "not-a-ref" } },
                "default": { "$ref": "other" },
                "meta": { "$ref": "https://json-schema.org/draft/2020-12/schema" }
            }
        });
        let mut refs = external_refs(&definition);
        refs.sort_unstable();
        assert_eq!(refs, vec!["other".to_string(), "test".to_string()]);
    }
}
