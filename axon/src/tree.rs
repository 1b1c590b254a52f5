//! Plain-text rendering of an execution tree snapshot.
//!
//! One line per node: state glyph, spec name, short argument summary, and
//! a short outcome. No terminal control, no color — callers that want a
//! live display re-render on every `watch` update.

use axon_runtime::{NodeState, NodeView};
use std::fmt::Write;

fn state_glyph(state: NodeState) -> &'static str {
    match state {
        NodeState::Waiting => "·",
        NodeState::Running => "▸",
        NodeState::Success => "✔",
        NodeState::Error => "✖",
        NodeState::Canceled => "⏹",
    }
}

fn shorten(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let head: String = text.chars().take(max_len.saturating_sub(1)).collect();
    format!("{head}…")
}

fn format_args(view: &NodeView) -> String {
    if view.inputs.is_empty() {
        return String::new();
    }
    let rendered: Vec<String> = view
        .inputs
        .iter()
        .map(|(name, value)| format!("{name}={}", shorten(&value.to_string(), 20)))
        .collect();
    shorten(&rendered.join(", "), 60)
}

fn header(view: &NodeView) -> String {
    let mut line = format!("{} {}", state_glyph(view.state), view.spec.name());
    let args = format_args(view);
    if !args.is_empty() {
        let _ = write!(line, "({args})");
    }
    match view.state {
        NodeState::Success => {
            if let Some(outputs) = &view.outputs {
                let _ = write!(line, " => {}", shorten(&outputs.to_string(), 50));
            }
        }
        NodeState::Error | NodeState::Canceled => {
            if let Some(error) = &view.error {
                let _ = write!(line, " !! {}", shorten(&error.to_string(), 50));
            }
        }
        _ => {}
    }
    line
}

/// Render a node view and its descendants as an indented tree, one line
/// per node, in invocation order.
pub fn format_tree(view: &NodeView) -> String {
    fn add_node(out: &mut String, view: &NodeView, prefix: &str, is_last: bool, is_root: bool) {
        if is_root {
            out.push_str(&header(view));
        } else {
            let branch = if is_last { "└─ " } else { "├─ " };
            out.push('\n');
            out.push_str(prefix);
            out.push_str(branch);
            out.push_str(&header(view));
        }
        let child_prefix = if is_root {
            String::new()
        } else {
            format!("{prefix}{}", if is_last { "   " } else { "│  " })
        };
        let count = view.children.len();
        for (idx, child) in view.children.iter().enumerate() {
            add_node(out, child, &child_prefix, idx == count - 1, false);
        }
    }

    let mut out = String::new();
    add_node(&mut out, view, "", true, true);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_runtime::{FuncSpec, Runtime};
    use serde_json::json;

    #[tokio::test]
    async fn renders_nested_states_and_outcomes() {
        let inner = FuncSpec::code("double", "doubles")
            .arg(axon_types::ArgSpec::new(
                "x",
                axon_types::ArgType::Integer,
                "value",
            ))
            .build(|_ctx, args| async move { Ok(json!(args.integer("x")? * 2)) })
            .unwrap();
        let inner_clone = inner.clone();
        let outer = FuncSpec::code("outer", "wraps")
            .uses(&inner)
            .build(move |ctx, _args| {
                let spec = inner_clone.clone();
                async move {
                    let child = ctx.invoke(&spec, json!({"x": 21}))?;
                    child.result().await
                }
            })
            .unwrap();

        let rt = Runtime::builder().spec(&outer).build().unwrap();
        let root = rt.get_ctx().invoke(&outer, json!({})).unwrap();
        root.result().await.unwrap();

        let view = rt.get_view(root.id()).unwrap();
        let rendered = format_tree(&view);

        assert!(rendered.contains("✔ outer"));
        assert!(rendered.contains("└─ ✔ double(x=21) => 42"));
    }

    #[test]
    fn shorten_truncates_with_ellipsis() {
        assert_eq!(shorten("short", 10), "short");
        let long = shorten(&"a".repeat(30), 10);
        assert_eq!(long.chars().count(), 10);
        assert!(long.ends_with('…'));
    }
}
