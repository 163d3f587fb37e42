use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    serve, Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use minijinja::{path_loader, Environment};
use minijinja_autoreload::AutoReloader;
use serde::{Deserialize, Serialize};
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::mpsc;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::chat::{ConversationController, ViewEvent};
use crate::config::Config;
use crate::constants::{BUSY_LABEL, PAGE_CAPTION, PAGE_TITLE};
use crate::conversation::{ConversationState, Role, Turn};
use crate::markdown::render_markdown;

/// Frames the browser sends over `/ws`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum ClientMessage {
    Submit {
        text: String,
        #[serde(default)]
        address: Option<String>,
    },
}

/// A turn as the page shows it: the raw text plus its markdown rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedTurn {
    pub role: Role,
    pub content: String,
    pub html: String,
}

impl From<&Turn> for RenderedTurn {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
            html: render_markdown(&turn.content),
        }
    }
}

fn rendered(turns: &[Turn]) -> Vec<RenderedTurn> {
    turns.iter().map(RenderedTurn::from).collect()
}

/// Frames the server pushes over `/ws`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum ServerMessage {
    Render {
        turns: Vec<RenderedTurn>,
        processing: bool,
    },
    Diagnostic {
        message: String,
    },
}

impl From<ViewEvent> for ServerMessage {
    fn from(event: ViewEvent) -> Self {
        match event {
            ViewEvent::Render(snapshot) => ServerMessage::Render {
                turns: rendered(&snapshot.turns),
                processing: snapshot.processing,
            },
            ViewEvent::Diagnostic(message) => ServerMessage::Diagnostic { message },
        }
    }
}

// Shared application state
#[derive(Clone)]
pub struct AppState {
    templates: Arc<AutoReloader>,
    config: Arc<Config>,
    http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config, templates_dir: impl Into<PathBuf>) -> Self {
        Self {
            templates: Arc::new(create_minijinja_env(templates_dir.into())),
            config: Arc::new(config),
            http: reqwest::Client::new(),
        }
    }

    fn controller(&self) -> (ConversationController, mpsc::UnboundedReceiver<ViewEvent>) {
        self.config.controller(self.http.clone())
    }
}

// Minijinja Environment setup
fn create_minijinja_env(templates_dir: PathBuf) -> AutoReloader {
    AutoReloader::new(move |notifier| {
        let mut env = Environment::new();
        env.set_loader(path_loader(&templates_dir));
        notifier.watch_path(&templates_dir, true);
        Ok(env)
    })
}

async fn index_handler(
    State(state): State<AppState>,
) -> Result<Html<String>, (StatusCode, Html<String>)> {
    // A fresh page shows what a fresh session holds: just the greeting.
    let conversation = ConversationState::new();
    state
        .templates
        .acquire_env()
        .and_then(|env| {
            env.get_template("index.html").and_then(|tmpl| {
                tmpl.render(minijinja::context! {
                    title => PAGE_TITLE,
                    caption => PAGE_CAPTION,
                    busy_label => BUSY_LABEL,
                    turns => rendered(conversation.turns()),
                })
            })
        })
        .map(Html)
        .map_err(|e| {
            error!("Failed to get or render template: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("Internal Server Error: {}", e)),
            )
        })
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("WebSocket connection upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One connection is one chat session: it owns the conversation log and the
/// controller, and handles submissions strictly one after another.
async fn handle_socket(socket: WebSocket, state: AppState) {
    info!("New chat session established");
    let (mut sender, mut receiver) = socket.split();
    let (mut controller, mut events) = state.controller();
    let mut conversation = ConversationState::new();

    // Forward view events while a submission is in flight so the browser
    // sees the busy state before the reply arrives.
    let forwarder = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let frame = ServerMessage::from(event);
            match serde_json::to_string(&frame) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        warn!("WebSocket client disconnected or send error.");
                        break;
                    }
                }
                Err(e) => error!("Failed to serialize view event: {}", e),
            }
        }
    });

    controller.render(&conversation);

    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        };
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Submit { text, address }) => {
                    controller
                        .submit(&mut conversation, &text, address.as_deref())
                        .await;
                }
                Err(e) => warn!("Ignoring malformed client message: {}", e),
            },
            Message::Binary(_) => {
                warn!("Received unexpected binary message from client");
            }
            // Axum answers pings itself
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => {
                info!("Client requested WebSocket close");
                break;
            }
        }
    }

    // Closing the event channel ends the forwarder.
    drop(controller);
    if let Err(e) = forwarder.await {
        error!("View event forwarder failed: {:?}", e);
    }
    info!(turns = conversation.len(), "Chat session closed");
}

pub fn router(state: AppState, static_dir: &Path) -> Router {
    let static_files_service = ServeDir::new(static_dir).not_found_service(tower::service_fn(
        |_: Request| async {
            Ok::<_, std::convert::Infallible>(
                hyper::Response::builder()
                    .status(hyper::StatusCode::NOT_FOUND)
                    .body(Body::from("Not Found"))
                    .unwrap_or_default(),
            )
        },
    ));

    Router::new()
        .route("/", get(index_handler))
        .route("/ws", get(ws_handler))
        .nest_service("/static", static_files_service)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_web_server(port: u16, state: AppState, static_dir: &Path) -> Result<()> {
    let app = router(state, static_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Web server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .await
        .context("Web server failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Snapshot;

    #[test]
    fn test_submit_frame_parses_with_and_without_address() {
        let with: ClientMessage = serde_json::from_str(
            r#"{"message_type":"submit","text":"hi","address":"Seattle, WA"}"#,
        )
        .unwrap();
        assert_eq!(
            with,
            ClientMessage::Submit {
                text: "hi".to_string(),
                address: Some("Seattle, WA".to_string()),
            }
        );

        let without: ClientMessage =
            serde_json::from_str(r#"{"message_type":"submit","text":"hi"}"#).unwrap();
        assert_eq!(
            without,
            ClientMessage::Submit {
                text: "hi".to_string(),
                address: None,
            }
        );
    }

    #[test]
    fn test_view_events_become_tagged_frames() {
        let render = ServerMessage::from(ViewEvent::Render(Snapshot {
            turns: vec![Turn::assistant("hello *there*")],
            processing: true,
        }));
        assert_eq!(
            serde_json::to_value(&render).unwrap(),
            serde_json::json!({
                "message_type": "render",
                "turns": [{
                    "role": "assistant",
                    "content": "hello *there*",
                    "html": "<p>hello <em>there</em></p>\n",
                }],
                "processing": true,
            })
        );

        let diagnostic = ServerMessage::from(ViewEvent::Diagnostic("no luck".to_string()));
        assert_eq!(
            serde_json::to_value(&diagnostic).unwrap(),
            serde_json::json!({"message_type": "diagnostic", "message": "no luck"})
        );
    }
}
