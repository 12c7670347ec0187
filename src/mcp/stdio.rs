//! Local pipe transport: newline-delimited JSON-RPC over stdin/stdout.
//!
//! One session for the life of the process, used when an AI client launches
//! the gateway as a subprocess. Each envelope gets a minted correlation id.

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::handle_envelope;
use crate::state::{AppState, RequestContext};

pub async fn run(state: AppState) -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let mut stdout = tokio::io::stdout();

    tracing::info!(
        component = "stdio",
        tools = state.registry.tool_count(),
        "stdio transport ready"
    );

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        state.metrics.record_request();
        let ctx = RequestContext::minted();

        let request: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(
                    component = "stdio",
                    request_id = %ctx.request_id,
                    error = %err,
                    "unparsable envelope"
                );
                let response = json!({
                    "jsonrpc": "2.0",
                    "id": Value::Null,
                    "error": { "code": -32700, "message": "Parse error" },
                });
                write_line(&mut stdout, &response).await?;
                continue;
            }
        };

        if let Some(response) = handle_envelope(&state, &ctx, &request).await {
            write_line(&mut stdout, &response).await?;
        }
    }

    tracing::info!(component = "stdio", "stdin closed, shutting down");
    Ok(())
}

async fn write_line(stdout: &mut tokio::io::Stdout, response: &Value) -> anyhow::Result<()> {
    let mut out = serde_json::to_string(response)?;
    out.push('\n');
    stdout.write_all(out.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}
