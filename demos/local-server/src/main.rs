//! Runs the gadget tool server against a simulated backend and serves
//! line-delimited JSON requests on stdin.
//!
//! ```text
//! {"method": "tools/list"}
//! {"method": "tools/call", "name": "ig_deploy", "arguments": {"action": "deploy"}}
//! ```

mod sim;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ig_mcp_server::Server;
use ig_mcp_server::config::ServerConfig;
use ig_mcp_server::telemetry::init_tracing;
use ig_mcp_server::tools::{Arguments, ToolSnapshot};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};

use crate::sim::{SimulatedCluster, SimulatedRuntime};

#[derive(Debug, Deserialize)]
#[serde(tag = "method")]
enum Request {
    #[serde(rename = "tools/list")]
    List,
    #[serde(rename = "tools/call")]
    Call {
        name: String,
        #[serde(default)]
        arguments: Arguments,
    },
}

#[tokio::main]
async fn main() {
    let config = ServerConfig::parse();
    if let Err(err) = init_tracing(config.log_level().ok().flatten()) {
        eprintln!("{err}");
    }

    if let Err(err) = run(config).await {
        error!(error = %format!("{err:#}"), "server failed");
        std::process::exit(1);
    }
}

async fn run(config: ServerConfig) -> Result<()> {
    let server = Arc::new(
        Server::builder(Arc::new(SimulatedRuntime::default()))
            .config(config)
            .cluster(Arc::new(SimulatedCluster::default()))
            .build()
            .context("assemble server")?,
    );
    server.prepare().await.context("prepare tool catalog")?;
    for name in server.list_tools().names() {
        info!(tool = name, "tool available");
    }

    tokio::select! {
        result = serve(Arc::clone(&server)) => result?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("listen for ctrl-c")?;
            info!("interrupt received");
        }
    }
    server.shutdown();
    Ok(())
}

async fn serve(server: Arc<Server>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<Request>(&line) {
            Ok(Request::List) => catalog_json(&server.list_tools()),
            Ok(Request::Call { name, arguments }) => {
                let response = server.call_tool(&name, arguments).await;
                json!({"isError": response.is_error(), "content": response.content()})
            }
            Err(err) => {
                warn!(error = %err, "malformed request");
                json!({"isError": true, "content": format!("malformed request: {err}")})
            }
        };
        let mut encoded = serde_json::to_vec(&reply).context("encode reply")?;
        encoded.push(b'\n');
        stdout.write_all(&encoded).await.context("write stdout")?;
        stdout.flush().await.context("flush stdout")?;
    }
    Ok(())
}

fn catalog_json(catalog: &ToolSnapshot) -> Value {
    let tools: Vec<Value> = catalog
        .names()
        .into_iter()
        .filter_map(|name| catalog.get(name))
        .map(|tool| {
            json!({
                "name": tool.name(),
                "description": tool.description(),
                "inputSchema": tool.input_schema(),
                "annotations": {"readOnlyHint": tool.read_only().as_annotation()},
            })
        })
        .collect();
    json!({ "tools": tools })
}
