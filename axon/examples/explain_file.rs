//! End-to-end demo: a code unit invokes an agent that reads a file through
//! the `view_file` tool and explains it, while the main task watches the
//! execution tree.
//!
//! ```bash
//! ANTHROPIC_API_KEY=sk-ant-... cargo run --example explain_file -- path/to/file.rs
//! ```

use axon::format_tree;
use axon::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn build_agent() -> Result<Arc<FuncSpec>, AxonError> {
    FuncSpec::agent("explainer", "Explain what is happening inside a source file.")
        .arg(ArgSpec::new("filepath", ArgType::Text, "Absolute file path to analyze."))
        .system_prompt(
            "You are a careful code explainer.\n\
             Rules:\n\
             - Call the tool `view_file` exactly once at the start to fetch the file.\n\
             - Do not invent code; rely only on the tool result.\n\
             - Produce a concise explanation with sections: Overview, Main \
             Components, Execution Flow, Notable Patterns.\n\
             - If the tool errors, call `abort_task` with the error message.",
        )
        .user_prompt(
            "Analyze the code in the file at this absolute path:\n{filepath}\n\n\
             First call `view_file` with `path` set to the filepath above, then \
             write your explanation.",
        )
        .tool(&axon_tools::view_file())
        .tool(&abort_tool())
        .provider(Provider::Anthropic)
        .build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| file!().to_string());
    let path = std::fs::canonicalize(&path)?
        .to_string_lossy()
        .into_owned();
    let api_key = std::env::var("ANTHROPIC_API_KEY")?;

    let explainer = build_agent()?;
    let rt = Runtime::builder()
        .spec(&explainer)
        .backend(AnthropicBackendFactory::shared())
        .client_factory(Provider::Anthropic, move || {
            Arc::new(AnthropicClient::new(api_key.clone())) as ProviderClient
        })
        .build()?;

    let root = rt
        .get_ctx()
        .invoke(&explainer, json!({ "filepath": path }))?;

    // Render the tree on every update until the root completes.
    let mut view = root.watch(0).await?;
    while !view.state.is_terminal() {
        println!("{}\n", format_tree(&view));
        view = root.watch(view.update_seq).await?;
    }
    println!("{}\n", format_tree(&view));

    match root.result().await {
        Ok(output) => println!("=== explanation ===\n{}", output.as_str().unwrap_or_default()),
        Err(err) => eprintln!("task failed: {err}"),
    }
    Ok(())
}
