//! Task registry
//!
//! Name-keyed store of task definitions with their handlers and hooks.
//! Registration freezes a definition; re-registering a name is a
//! configuration error rather than a silent replace, since callers may
//! already hold references to the original.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::error::{GateError, Result};
use crate::invocation::InvocationArgs;
use crate::task::context::TaskContext;
use crate::task::definition::TaskDefinition;
use crate::task::handler::{FnTaskHandler, TaskHandler, TaskResult};
use crate::task::hooks::{LifecycleHooks, NoopLifecycleHooks};

/// A definition bound to its handler and hooks
pub struct RegisteredTask {
    pub definition: TaskDefinition,
    pub handler: Arc<dyn TaskHandler>,
    pub hooks: Arc<dyn LifecycleHooks>,
}

impl RegisteredTask {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Run one attempt of the handler under its request context.
    ///
    /// The context is claimed before the handler runs, so a context held by
    /// application code (a direct call that bypassed `apply`) and a context
    /// already spent by an earlier attempt both fail here with a
    /// configuration error. The inner result is the handler's own verdict.
    pub async fn invoke(&self, context: &TaskContext, args: &InvocationArgs) -> Result<TaskResult> {
        context.consume()?;
        Ok(self.handler.run(context, args).await)
    }
}

impl std::fmt::Debug for RegisteredTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTask")
            .field("definition", &self.definition)
            .finish()
    }
}

/// Thread-safe registry of all known tasks
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: DashMap<String, Arc<RegisteredTask>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task with no-op hooks
    pub fn register(
        &self,
        definition: TaskDefinition,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<Arc<RegisteredTask>> {
        self.register_with_hooks(definition, handler, Arc::new(NoopLifecycleHooks))
    }

    /// Register a task with custom lifecycle hooks
    pub fn register_with_hooks(
        &self,
        definition: TaskDefinition,
        handler: Arc<dyn TaskHandler>,
        hooks: Arc<dyn LifecycleHooks>,
    ) -> Result<Arc<RegisteredTask>> {
        let name = definition.name.clone();
        let task = Arc::new(RegisteredTask {
            definition,
            handler,
            hooks,
        });

        match self.tasks.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(GateError::Configuration(format!(
                "task '{name}' is already registered; definitions are immutable once registered"
            ))),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(task.clone());
                info!(task_name = %name, unique = task.definition.unique, "Task registered");
                Ok(task)
            }
        }
    }

    /// Register an async closure over the arguments as the handler
    pub fn register_fn<F, Fut>(
        &self,
        definition: TaskDefinition,
        f: F,
    ) -> Result<Arc<RegisteredTask>>
    where
        F: Fn(InvocationArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        self.register(definition, Arc::new(FnTaskHandler::new(f)))
    }

    /// Look up a task, failing with a configuration error when unknown
    pub fn get(&self, name: &str) -> Result<Arc<RegisteredTask>> {
        self.lookup(name)
            .ok_or_else(|| GateError::Configuration(format!("unknown task '{name}'")))
    }

    /// Look up a task by name
    pub fn lookup(&self, name: &str) -> Option<Arc<RegisteredTask>> {
        self.tasks.get(name).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Names of all registered tasks
    pub fn task_names(&self) -> Vec<String> {
        self.tasks.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn register_and_lookup() {
        let registry = TaskRegistry::new();
        registry
            .register_fn(TaskDefinition::new("send_email"), |_args| async {
                Ok(json!(null))
            })
            .unwrap();

        assert!(registry.contains("send_email"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("send_email").unwrap().name(), "send_email");
    }

    #[test]
    fn duplicate_registration_is_a_configuration_error() {
        let registry = TaskRegistry::new();
        registry
            .register_fn(TaskDefinition::new("send_email"), |_args| async {
                Ok(json!(null))
            })
            .unwrap();

        let err = registry
            .register_fn(TaskDefinition::new("send_email"), |_args| async {
                Ok(json!(null))
            })
            .unwrap_err();
        assert!(matches!(err, GateError::Configuration(_)));
    }

    #[test]
    fn unknown_task_lookup_fails() {
        let registry = TaskRegistry::new();
        assert!(registry.lookup("missing").is_none());
        assert!(matches!(
            registry.get("missing").unwrap_err(),
            GateError::Configuration(_)
        ));
    }

    #[tokio::test]
    async fn direct_invocation_outside_a_worker_fails() {
        let registry = TaskRegistry::new();
        let task = registry
            .register_fn(TaskDefinition::new("send_email"), |_args| async {
                Ok(json!("sent"))
            })
            .unwrap();

        let err = task
            .invoke(&TaskContext::detached(), &InvocationArgs::empty())
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Configuration(_)));
    }

    #[tokio::test]
    async fn spent_context_cannot_replay_the_handler() {
        let registry = TaskRegistry::new();
        let task = registry
            .register_fn(TaskDefinition::new("send_email"), |_args| async {
                Ok(json!("sent"))
            })
            .unwrap();

        let context = TaskContext::for_worker(uuid::Uuid::new_v4(), uuid::Uuid::new_v4(), 0);
        assert!(task
            .invoke(&context, &InvocationArgs::empty())
            .await
            .unwrap()
            .is_ok());

        let err = task
            .invoke(&context, &InvocationArgs::empty())
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Configuration(_)));
    }
}
