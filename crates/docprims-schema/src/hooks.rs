use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{FieldError, HookFailure, SchemaError, ValidationError};

/// Lifecycle points at which hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// Before structural validation. A failure skips everything after it.
    WillValidate,
    /// After structural validation, whether or not it found errors.
    DidValidate,
}

impl HookEvent {
    pub const ALL: [HookEvent; 2] = [HookEvent::WillValidate, HookEvent::DidValidate];

    pub fn as_str(self) -> &'static str {
        match self {
            HookEvent::WillValidate => "willValidate",
            HookEvent::DidValidate => "didValidate",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookEvent {
    type Err = SchemaError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        HookEvent::ALL
            .into_iter()
            .find(|event| event.as_str() == name)
            .ok_or_else(|| SchemaError::UnknownHookEvent(name.to_string()))
    }
}

/// What a hook reports: extra field errors (possibly none), or a refusal.
pub type HookResult = Result<Vec<FieldError>, HookFailure>;

/// A lifecycle callback run around document validation.
#[async_trait]
pub trait Hook: Send + Sync {
    async fn call(&self, document: &Value) -> HookResult;
}

/// Adapter running a synchronous closure as a [`Hook`].
pub struct FnHook<F>(F);

/// Wrap `f` so it can be registered as a hook.
pub fn hook_fn<F>(f: F) -> FnHook<F>
where
    F: Fn(&Value) -> HookResult + Send + Sync,
{
    FnHook(f)
}

#[async_trait]
impl<F> Hook for FnHook<F>
where
    F: Fn(&Value) -> HookResult + Send + Sync,
{
    async fn call(&self, document: &Value) -> HookResult {
        (self.0)(document)
    }
}

/// Ordered hooks per event. Registration order is invocation order.
#[derive(Clone, Default)]
pub struct HookChain {
    will_validate: Vec<Arc<dyn Hook>>,
    did_validate: Vec<Arc<dyn Hook>>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `hook` to `event`. The same hook may be registered repeatedly.
    pub fn register(&mut self, event: HookEvent, hook: Arc<dyn Hook>) {
        self.hooks_mut(event).push(hook);
    }

    pub fn len(&self, event: HookEvent) -> usize {
        self.hooks(event).len()
    }

    pub fn is_empty(&self) -> bool {
        self.will_validate.is_empty() && self.did_validate.is_empty()
    }

    /// Run the hooks of `event` one after another, recording into `report`.
    ///
    /// Stops at the first refusal and returns `false`; a hook that never
    /// completes stalls the caller.
    pub async fn run(&self, event: HookEvent, document: &Value, report: &mut ValidationError) -> bool {
        for (index, hook) in self.hooks(event).iter().enumerate() {
            match hook.call(document).await {
                Ok(mut errors) => report.errors.append(&mut errors),
                Err(failure) => {
                    tracing::debug!(%event, index, %failure, "hook refused document");
                    report.hook_failures.push(failure);
                    return false;
                }
            }
        }
        true
    }

    fn hooks(&self, event: HookEvent) -> &[Arc<dyn Hook>] {
        match event {
            HookEvent::WillValidate => &self.will_validate,
            HookEvent::DidValidate => &self.did_validate,
        }
    }

    fn hooks_mut(&mut self, event: HookEvent) -> &mut Vec<Arc<dyn Hook>> {
        match event {
            HookEvent::WillValidate => &mut self.will_validate,
            HookEvent::DidValidate => &mut self.did_validate,
        }
    }
}

impl fmt::Debug for HookChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookChain")
            .field("will_validate", &self.will_validate.len())
            .field("did_validate", &self.did_validate.len())
            .finish()
    }
}
