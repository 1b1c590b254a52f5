//! The provider-agnostic agent loop.
//!
//! Everything a tool-calling agent does apart from talking to its backend
//! lives here: prompt template substitution, transcript recording, spawning
//! tool children, awaiting them in request order, folding their outcomes
//! back to the model, cancellation polls, and the cycle cap. The
//! provider-specific half — tool schema translation, the model call, reply
//! parsing, and the replay conversation — sits behind
//! [`AgentBackend`](axon_types::AgentBackend).

use crate::context::RunContext;
use crate::node::{Node, NodeState};
use crate::spec::FuncSpec;
use crate::{NodeId, Runtime};
use axon_types::{
    AgentBackend, Args, AxonError, BackendConfig, BackendFactory, ClientFactory, Provider,
    ProviderError, ToolCallRequest, ToolDecl, ToolOutcome, Transcript, TranscriptPart,
};
use serde_json::Value;
use std::sync::Arc;

/// Max tool call + response cycles before giving up.
pub const MAX_AGENT_CYCLES: u32 = 64;

#[allow(clippy::too_many_arguments)]
pub(crate) async fn run_agent_node(
    rt: Arc<Runtime>,
    node_id: NodeId,
    spec: Arc<FuncSpec>,
    args: Args,
    ctx: RunContext,
    provider: Provider,
    client_factory: ClientFactory,
    backend_factory: Arc<dyn BackendFactory>,
) {
    rt.post_state(node_id, NodeState::Running);
    let transcript = rt.transcript_of(node_id);
    let result = drive(
        &rt,
        node_id,
        &spec,
        &args,
        &ctx,
        provider,
        client_factory,
        backend_factory,
        &transcript,
    )
    .await;
    match result {
        Ok(text) => rt.post_success(node_id, Value::String(text)),
        Err(error) => rt.post_exception(node_id, error),
    }
}

#[allow(clippy::too_many_arguments)]
async fn drive(
    rt: &Arc<Runtime>,
    node_id: NodeId,
    spec: &Arc<FuncSpec>,
    args: &Args,
    ctx: &RunContext,
    provider: Provider,
    client_factory: ClientFactory,
    backend_factory: Arc<dyn BackendFactory>,
    transcript: &Transcript,
) -> Result<String, AxonError> {
    let detail = spec
        .agent_detail()
        .ok_or_else(|| AxonError::message("agent worker started for a non-agent specification"))?;
    let wrap = |source: ProviderError| AxonError::ModelProvider {
        provider,
        agent: spec.name().to_string(),
        source: Arc::new(source),
    };

    let user_text = render_template(&detail.user_prompt_template, args)?;
    transcript.push(TranscriptPart::UserText {
        text: user_text.clone(),
    });

    let client = (client_factory)();
    let config = BackendConfig {
        agent_name: spec.name().to_string(),
        system_prompt: detail.system_prompt.clone(),
        user_text,
        tools: spec.uses().iter().map(|u| tool_decl(u)).collect(),
    };
    let mut backend = backend_factory.make(client, config).map_err(wrap)?;

    for _ in 0..MAX_AGENT_CYCLES {
        if ctx.cancel_requested() {
            return Err(AxonError::Canceled);
        }

        let turn = backend.step().await.map_err(wrap)?;
        rt.record_usage(node_id, backend.usage());

        // Reasoning markers first, in reply order. Content may be empty;
        // signatures are what keep the chain linked across cycles.
        for block in &turn.reasoning {
            transcript.push(TranscriptPart::Reasoning {
                content: block.content.clone(),
                redacted: block.redacted,
                signature: block.signature.clone(),
            });
        }

        if turn.is_final() {
            transcript.push(TranscriptPart::ModelText {
                text: turn.text.clone(),
            });
            return Ok(turn.text);
        }

        // Spawn phase: sequential, but not blocking on completion — every
        // tool child of this turn runs concurrently.
        let mut spawned: Vec<Result<Node, AxonError>> = Vec::with_capacity(turn.tool_calls.len());
        for call in &turn.tool_calls {
            transcript.push(TranscriptPart::ToolUse {
                tool_use_id: call.tool_use_id.clone(),
                tool_name: call.tool_name.clone(),
                args: call.args.clone(),
            });
            spawned.push(dispatch_tool(ctx, spec, call));
        }

        // Await phase: strictly in request order, whatever the completion
        // order was.
        let mut outcomes: Vec<ToolOutcome> = Vec::with_capacity(spawned.len());
        let mut pending_abort: Option<AxonError> = None;
        let mut child_canceled = false;
        for (call, handle) in turn.tool_calls.iter().zip(spawned) {
            let (output, is_error) = match handle {
                Err(dispatch_error) => (dispatch_error.to_string(), true),
                Ok(child) => match child.result().await {
                    Ok(value) => (stringify_outputs(&value), false),
                    Err(error @ AxonError::AgentAbort { .. }) => {
                        // Finish the batch before surfacing the abort; this
                        // child gets no result part.
                        pending_abort = Some(error);
                        continue;
                    }
                    Err(error) => {
                        if error.is_cancellation() {
                            child_canceled = true;
                        }
                        (error.to_string(), true)
                    }
                },
            };
            transcript.push(TranscriptPart::ToolResult {
                tool_use_id: call.tool_use_id.clone(),
                tool_name: call.tool_name.clone(),
                output: output.clone(),
                is_error,
            });
            outcomes.push(ToolOutcome {
                tool_use_id: call.tool_use_id.clone(),
                tool_name: call.tool_name.clone(),
                output,
                is_error,
            });
        }

        if let Some(abort) = pending_abort {
            return Err(abort);
        }
        if child_canceled || ctx.cancel_requested() {
            return Err(AxonError::Canceled);
        }

        backend.record_results(&outcomes);
    }

    Err(AxonError::ToolLoopExhausted {
        cycles: MAX_AGENT_CYCLES,
    })
}

/// Resolve a model tool request against the agent's declared tools and
/// spawn the child node. Dispatch failures (unknown name, invalid
/// arguments) are reported to the model as tool errors, never raised.
fn dispatch_tool(
    ctx: &RunContext,
    agent: &Arc<FuncSpec>,
    call: &ToolCallRequest,
) -> Result<Node, AxonError> {
    let tool = agent
        .uses()
        .iter()
        .find(|u| u.name() == call.tool_name)
        .ok_or_else(|| AxonError::UnknownTool {
            tool: call.tool_name.clone(),
            available: agent.uses().iter().map(|u| u.name().to_string()).collect(),
        })?;
    ctx.invoke(tool, call.args.clone())
}

fn tool_decl(spec: &Arc<FuncSpec>) -> ToolDecl {
    ToolDecl {
        name: spec.name().to_string(),
        description: spec.description().to_string(),
        args: spec.args().to_vec(),
    }
}

/// Render a node's outputs into tool-result text the way the model sees it.
pub(crate) fn stringify_outputs(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Substitute `{name}` placeholders with validated inputs. `{{` and `}}`
/// are literal braces. Unknown placeholders and unbalanced braces fail.
pub fn render_template(template: &str, args: &Args) -> Result<String, AxonError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut name = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    name.push(inner);
                }
                if !closed {
                    return Err(AxonError::message(format!(
                        "unterminated placeholder '{{{name}' in user prompt template"
                    )));
                }
                match args.get(&name) {
                    Some(value) => out.push_str(&value.to_string()),
                    None => {
                        return Err(AxonError::message(format!(
                            "user prompt template references missing input '{name}'"
                        )));
                    }
                }
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(AxonError::message(
                        "unmatched '}' in user prompt template",
                    ));
                }
            }
            other => out.push(other),
        }
    }
    Ok(out)
}
