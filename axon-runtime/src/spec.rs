//! Function specifications — immutable descriptions of executable units.
//!
//! A [`FuncSpec`] is either a *code* unit wrapping a host callable or an
//! *agent* unit carrying prompts and a default provider. Specs are built
//! through validating builders and always handled as `Arc<FuncSpec>`:
//! registration and invocation compare by pointer identity, exactly like
//! the runtime's registry demands.

use crate::context::RunContext;
use axon_types::{ArgSpec, ArgType, Args, AxonError, Provider};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};

/// Boxed future returned by a host callable.
pub type CodeFuture = Pin<Box<dyn Future<Output = Result<Value, AxonError>> + Send>>;

/// Object-safe surface of a code unit's host callable.
///
/// Implemented for free by any `Fn(RunContext, Args) -> impl Future` — the
/// typed [`Args`] accessors replace the keyword-argument introspection a
/// dynamic host would perform.
pub trait CodeCallable: Send + Sync {
    /// Run the callable with the node's context and validated arguments.
    fn call(&self, ctx: RunContext, args: Args) -> CodeFuture;
}

impl<F, Fut> CodeCallable for F
where
    F: Fn(RunContext, Args) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, AxonError>> + Send + 'static,
{
    fn call(&self, ctx: RunContext, args: Args) -> CodeFuture {
        Box::pin(self(ctx, args))
    }
}

/// Agent-only fields of a specification.
#[derive(Debug, Clone)]
pub struct AgentDetail {
    /// System prompt sent on every model call.
    pub system_prompt: String,
    /// User prompt template; `{name}` placeholders are substituted with
    /// validated inputs when the node starts.
    pub user_prompt_template: String,
    /// Provider used when the invocation does not override it.
    pub default_provider: Provider,
}

pub(crate) enum SpecKind {
    Code { callable: Arc<dyn CodeCallable> },
    Agent(AgentDetail),
}

/// An immutable description of an executable unit.
pub struct FuncSpec {
    name: String,
    description: String,
    args: Vec<ArgSpec>,
    uses: Vec<Arc<FuncSpec>>,
    kind: SpecKind,
}

impl FuncSpec {
    /// Start building a code specification.
    pub fn code(name: impl Into<String>, description: impl Into<String>) -> CodeSpecBuilder {
        CodeSpecBuilder {
            name: name.into(),
            description: description.into(),
            args: Vec::new(),
            uses: Vec::new(),
        }
    }

    /// Start building an agent specification.
    pub fn agent(name: impl Into<String>, description: impl Into<String>) -> AgentSpecBuilder {
        AgentSpecBuilder {
            name: name.into(),
            description: description.into(),
            args: Vec::new(),
            uses: Vec::new(),
            system_prompt: String::new(),
            user_prompt_template: String::new(),
            default_provider: Provider::Anthropic,
        }
    }

    /// Unit name, unique within a runtime.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description, surfaced to model backends for tools.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Declared argument fields, in order.
    pub fn args(&self) -> &[ArgSpec] {
        &self.args
    }

    /// Other specifications this unit may invoke, in declaration order.
    pub fn uses(&self) -> &[Arc<FuncSpec>] {
        &self.uses
    }

    /// Agent-only fields, if this is an agent specification.
    pub fn agent_detail(&self) -> Option<&AgentDetail> {
        match &self.kind {
            SpecKind::Agent(detail) => Some(detail),
            SpecKind::Code { .. } => None,
        }
    }

    /// Whether this is an agent specification.
    pub fn is_agent(&self) -> bool {
        matches!(self.kind, SpecKind::Agent(_))
    }

    pub(crate) fn kind(&self) -> &SpecKind {
        &self.kind
    }
}

impl fmt::Debug for FuncSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            SpecKind::Code { .. } => "code",
            SpecKind::Agent(_) => "agent",
        };
        f.debug_struct("FuncSpec")
            .field("name", &self.name)
            .field("kind", &kind)
            .field("args", &self.args.len())
            .field("uses", &self.uses.len())
            .finish()
    }
}

fn check_common(
    name: &str,
    args: &[ArgSpec],
    uses: &[Arc<FuncSpec>],
) -> Result<(), AxonError> {
    if name.is_empty() {
        return Err(AxonError::InvalidSpec("function name must be non-empty".into()));
    }
    for (i, arg) in args.iter().enumerate() {
        arg.check()?;
        if args[..i].iter().any(|a| a.name == arg.name) {
            return Err(AxonError::InvalidSpec(format!(
                "'{name}': duplicate argument name '{}'",
                arg.name
            )));
        }
    }
    for (i, dep) in uses.iter().enumerate() {
        if uses[..i].iter().any(|d| d.name() == dep.name()) {
            return Err(AxonError::InvalidSpec(format!(
                "'{name}': duplicate name '{}' in uses",
                dep.name()
            )));
        }
    }
    Ok(())
}

/// Builder for code specifications.
pub struct CodeSpecBuilder {
    name: String,
    description: String,
    args: Vec<ArgSpec>,
    uses: Vec<Arc<FuncSpec>>,
}

impl CodeSpecBuilder {
    /// Declare one argument field.
    #[must_use]
    pub fn arg(mut self, arg: ArgSpec) -> Self {
        self.args.push(arg);
        self
    }

    /// Declare a specification this unit may invoke as a child.
    #[must_use]
    pub fn uses(mut self, spec: &Arc<FuncSpec>) -> Self {
        self.uses.push(spec.clone());
        self
    }

    /// Finish with the host callable.
    pub fn build<F, Fut>(self, callable: F) -> Result<Arc<FuncSpec>, AxonError>
    where
        F: Fn(RunContext, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, AxonError>> + Send + 'static,
    {
        check_common(&self.name, &self.args, &self.uses)?;
        Ok(Arc::new(FuncSpec {
            name: self.name,
            description: self.description,
            args: self.args,
            uses: self.uses,
            kind: SpecKind::Code {
                callable: Arc::new(callable),
            },
        }))
    }
}

/// Builder for agent specifications.
pub struct AgentSpecBuilder {
    name: String,
    description: String,
    args: Vec<ArgSpec>,
    uses: Vec<Arc<FuncSpec>>,
    system_prompt: String,
    user_prompt_template: String,
    default_provider: Provider,
}

impl AgentSpecBuilder {
    /// Declare one argument field.
    #[must_use]
    pub fn arg(mut self, arg: ArgSpec) -> Self {
        self.args.push(arg);
        self
    }

    /// Declare a tool the agent may call. Tool names must be unique.
    #[must_use]
    pub fn tool(mut self, spec: &Arc<FuncSpec>) -> Self {
        self.uses.push(spec.clone());
        self
    }

    /// Set the system prompt.
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Set the user prompt template. `{name}` placeholders are substituted
    /// from validated inputs; `{{` and `}}` escape literal braces.
    #[must_use]
    pub fn user_prompt(mut self, template: impl Into<String>) -> Self {
        self.user_prompt_template = template.into();
        self
    }

    /// Set the default provider (Anthropic if never called).
    #[must_use]
    pub fn provider(mut self, provider: Provider) -> Self {
        self.default_provider = provider;
        self
    }

    /// Finish the specification.
    pub fn build(self) -> Result<Arc<FuncSpec>, AxonError> {
        check_common(&self.name, &self.args, &self.uses)?;
        Ok(Arc::new(FuncSpec {
            name: self.name,
            description: self.description,
            args: self.args,
            uses: self.uses,
            kind: SpecKind::Agent(AgentDetail {
                system_prompt: self.system_prompt,
                user_prompt_template: self.user_prompt_template,
                default_provider: self.default_provider,
            }),
        }))
    }
}

/// Name of the reserved abort tool.
pub const ABORT_TOOL: &str = "abort_task";

/// The reserved abort tool: an agent that calls it fails its own task with
/// the given message, surfaced as [`AxonError::AgentAbort`]. Returns the
/// process-wide singleton so every agent declaring it shares one identity.
pub fn abort_tool() -> Arc<FuncSpec> {
    static SPEC: OnceLock<Arc<FuncSpec>> = OnceLock::new();
    SPEC.get_or_init(|| {
        Arc::new(FuncSpec {
            name: ABORT_TOOL.into(),
            description: "Abort the current task, reporting an unrecoverable failure. \
                          Call this instead of fabricating an answer when the task \
                          cannot be completed."
                .into(),
            args: vec![ArgSpec::new(
                "message",
                ArgType::Text,
                "Explanation of why the task is being aborted.",
            )],
            uses: Vec::new(),
            kind: SpecKind::Code {
                callable: Arc::new(|_ctx: RunContext, args: Args| async move {
                    let message = args.text("message")?.to_string();
                    Err::<Value, AxonError>(AxonError::AgentAbort { message })
                }),
            },
        })
    })
    .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop() -> Result<Arc<FuncSpec>, AxonError> {
        FuncSpec::code("noop", "does nothing").build(|_ctx, _args| async move { Ok(json!(null)) })
    }

    #[test]
    fn code_spec_builds() {
        let spec = noop().unwrap();
        assert_eq!(spec.name(), "noop");
        assert!(!spec.is_agent());
    }

    #[test]
    fn duplicate_argument_names_rejected() {
        let result = FuncSpec::code("dup", "dup args")
            .arg(ArgSpec::new("x", ArgType::Integer, "first"))
            .arg(ArgSpec::new("x", ArgType::Text, "second"))
            .build(|_ctx, _args| async move { Ok(json!(null)) });
        assert!(result.unwrap_err().to_string().contains("duplicate argument name 'x'"));
    }

    #[test]
    fn duplicate_tool_names_rejected() {
        let a = noop().unwrap();
        let b = FuncSpec::code("noop", "same name, different instance")
            .build(|_ctx, _args| async move { Ok(json!(null)) })
            .unwrap();
        let result = FuncSpec::agent("a", "agent")
            .user_prompt("go")
            .tool(&a)
            .tool(&b)
            .build();
        assert!(result.unwrap_err().to_string().contains("duplicate name 'noop' in uses"));
    }

    #[test]
    fn enum_invariants_surface_through_builder() {
        let result = FuncSpec::code("bad", "bad enum")
            .arg(ArgSpec::new("n", ArgType::Integer, "n").allowed(["1"]))
            .build(|_ctx, _args| async move { Ok(json!(null)) });
        assert!(result.is_err());
    }

    #[test]
    fn agent_spec_carries_detail() {
        let spec = FuncSpec::agent("a", "an agent")
            .system_prompt("be terse")
            .user_prompt("do {task}")
            .arg(ArgSpec::new("task", ArgType::Text, "what to do"))
            .provider(Provider::Anthropic)
            .build()
            .unwrap();
        let detail = spec.agent_detail().unwrap();
        assert_eq!(detail.system_prompt, "be terse");
        assert_eq!(detail.default_provider, Provider::Anthropic);
    }

    #[test]
    fn abort_tool_is_a_singleton() {
        assert!(Arc::ptr_eq(&abort_tool(), &abort_tool()));
        assert_eq!(abort_tool().name(), ABORT_TOOL);
    }
}
