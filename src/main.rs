#![deny(warnings)]

// Binary crate for confined-fileio-mcp - uses library crate

use axum::{
    Router,
    extract::{State, ws::WebSocketUpgrade},
    response::Response,
    routing::get,
};
use clap::{Parser, ValueEnum};
use confined_fileio_mcp::config::ServerConfig;
use confined_fileio_mcp::dispatch;
use confined_fileio_mcp::error::{FileIoMcpError, Result, TransportError};
use confined_fileio_mcp::server::McpServer;
use confined_fileio_mcp::transport::StdioTransport;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, ValueEnum)]
enum TransportMode {
    /// STDIN/STDOUT transport (recommended for local agents)
    Stdio,
    /// WebSocket transport
    Websocket,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::Stdio => write!(f, "stdio"),
            TransportMode::Websocket => write!(f, "websocket"),
        }
    }
}

#[derive(Parser)]
#[command(name = "confined-fileio-mcp")]
#[command(about = "MCP server exposing read/write/list confined to one directory")]
#[command(
    long_about = "confined-fileio-mcp exposes read_file, write_file and list_directory tools to an MCP client.\nEvery path is confined to the allowed root directory.\n\nUsage:\n  confined-fileio-mcp serve --root /srv/workspace\n  FILEIO_ALLOWED_ROOT=/srv/workspace confined-fileio-mcp serve --mode websocket --port 8080"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run the MCP server
    Serve {
        /// Directory all file operations are confined to
        #[arg(long, env = "FILEIO_ALLOWED_ROOT")]
        root: String,
        /// Also check the real (symlink-resolved) path against the root
        #[arg(long, env = "FILEIO_RESOLVE_SYMLINKS")]
        resolve_symlinks: bool,
        /// Append resolved paths to filesystem error messages
        #[arg(long, env = "FILEIO_DIAGNOSTICS")]
        diagnostics: bool,
        /// Transport mode
        #[arg(short, long, default_value_t = TransportMode::Stdio)]
        mode: TransportMode,
        /// Port for WebSocket mode (ignored for stdio)
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
        /// Host for WebSocket mode (ignored for stdio)
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            root,
            resolve_symlinks,
            diagnostics,
            mode,
            port,
            host,
        } => {
            let config = ServerConfig::new(&root, resolve_symlinks, diagnostics).inspect_err(|e| {
                tracing::error!(error = %e, "invalid configuration");
            })?;
            tracing::info!(
                root = config.allowed_root.as_str(),
                resolve_symlinks = config.allowed_root.resolves_symlinks(),
                diagnostics,
                mode = %mode,
                "starting confined-fileio-mcp"
            );

            let server = McpServer::new(&config);

            match mode {
                TransportMode::Stdio => run_stdio_server(server).await?,
                TransportMode::Websocket => run_websocket_server(server, &host, port).await?,
            }
        }
    }

    Ok(())
}

async fn run_stdio_server(server: McpServer) -> Result<()> {
    let mut transport = StdioTransport::stdio();

    loop {
        let reply = match transport.read_message().await {
            Ok(body) if body.trim().is_empty() => continue,
            Ok(body) => respond(&server, &body).await,
            Err(FileIoMcpError::Transport(TransportError::InvalidMessage(detail))) => {
                tracing::warn!(%detail, "dropping malformed frame");
                Some(dispatch::parse_error(&detail))
            }
            Err(FileIoMcpError::Transport(TransportError::ConnectionClosed)) => {
                tracing::info!("stdin closed, exiting");
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "error reading message");
                break;
            }
        };

        let Some(reply) = reply else { continue };
        if let Err(e) = transport.write_message(&reply.to_string()).await {
            tracing::error!(error = %e, "error writing response");
            break;
        }
    }

    Ok(())
}

/// Decode one message body and run it. `None` means nothing goes back.
async fn respond(server: &McpServer, body: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(body) {
        Ok(message) => dispatch::handle_message(server, &message).await,
        Err(e) => {
            tracing::warn!(error = %e, "error parsing JSON-RPC message");
            Some(dispatch::parse_error(&e.to_string()))
        }
    }
}

async fn run_websocket_server(server: McpServer, host: &str, port: u16) -> Result<()> {
    let server = Arc::new(server);

    let app = Router::new()
        .route("/ws", get(websocket_handler))
        .with_state(server);

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "WebSocket server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn websocket_handler(ws: WebSocketUpgrade, State(server): State<Arc<McpServer>>) -> Response {
    ws.on_upgrade(move |socket| handle_websocket_connection(socket, server))
}

async fn handle_websocket_connection(socket: axum::extract::ws::WebSocket, server: Arc<McpServer>) {
    use axum::extract::ws::Message;
    use futures_util::{SinkExt, StreamExt};

    let (mut sender, mut receiver) = socket.split();

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Some(reply) = respond(&server, &text).await
                    && let Err(e) = sender.send(Message::Text(reply.to_string().into())).await
                {
                    tracing::error!(error = %e, "error sending WebSocket response");
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }
}
