// Conversation orchestration shared by the web UI and the terminal chat.

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::conversation::{ConversationState, Role, Turn};
use crate::llm_interaction::ChatCompletionClient;
use crate::location::{LocationContext, LocationResolver, Resolution};
use crate::prompt::{PromptAssembler, PromptRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Processing,
}

/// What the view needs to redraw the conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub turns: Vec<Turn>,
    pub processing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    Render(Snapshot),
    /// Transient notice (e.g. a failed location lookup); not part of the log.
    Diagnostic(String),
}

/// Everything that happened for one accepted submission.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub location: Option<LocationContext>,
    pub request: PromptRequest,
    pub reply: Turn,
}

pub struct ConversationController {
    resolver: LocationResolver,
    client: ChatCompletionClient,
    assembler: PromptAssembler,
    state: ControllerState,
    events: mpsc::UnboundedSender<ViewEvent>,
}

impl ConversationController {
    pub fn new(
        resolver: LocationResolver,
        client: ChatCompletionClient,
        assembler: PromptAssembler,
    ) -> (Self, mpsc::UnboundedReceiver<ViewEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let controller = Self {
            resolver,
            client,
            assembler,
            state: ControllerState::Idle,
            events,
        };
        (controller, rx)
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Asks the view to draw `conversation` as it is now.
    pub fn render(&self, conversation: &ConversationState) {
        self.emit(ViewEvent::Render(Snapshot {
            turns: conversation.turns().to_vec(),
            processing: self.state == ControllerState::Processing,
        }));
    }

    fn emit(&self, event: ViewEvent) {
        // The view may already be gone (socket closed); the conversation still completes.
        if self.events.send(event).is_err() {
            debug!("View event dropped: no receiver");
        }
    }

    fn transition(&mut self, next: ControllerState, conversation: &ConversationState) {
        debug!(from = ?self.state, to = ?next, "Controller state transition");
        self.state = next;
        self.render(conversation);
    }

    /// Handles one user submission end to end. Blank input is ignored.
    ///
    /// The log always grows by exactly two turns for an accepted submission:
    /// the user's text and the assistant reply (or a warning in its place).
    pub async fn submit(
        &mut self,
        conversation: &mut ConversationState,
        input: &str,
        address: Option<&str>,
    ) -> Option<Exchange> {
        let input = input.trim();
        if input.is_empty() {
            debug!("Ignoring blank submission");
            return None;
        }

        conversation.push(Turn::user(input));
        self.transition(ControllerState::Processing, conversation);

        let location = match address.filter(|a| !a.trim().is_empty()) {
            Some(address) => match self.resolver.resolve(address).await {
                Resolution::Found(context) => Some(context),
                Resolution::NotFound { diagnostic } => {
                    if let Some(message) = diagnostic {
                        self.emit(ViewEvent::Diagnostic(message));
                    }
                    None
                }
            },
            None => None,
        };

        let request = self.assembler.assemble(conversation.turns(), location.as_ref());
        let reply = Turn::assistant(self.client.complete_or_warning(&request).await);
        conversation.push(reply.clone());
        self.transition(ControllerState::Idle, conversation);

        info!(
            turns = conversation.len(),
            located = location.is_some(),
            "Answered submission"
        );
        Some(Exchange {
            location,
            request,
            reply,
        })
    }
}

/// Line-oriented chat on stdin/stdout. Ends on EOF or `/quit`.
pub async fn run_terminal_chat(
    mut controller: ConversationController,
    mut events: mpsc::UnboundedReceiver<ViewEvent>,
    address: Option<String>,
) -> Result<()> {
    info!("Starting terminal chat session...");
    let mut conversation = ConversationState::new();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    for turn in conversation.turns() {
        print_turn(&mut stdout, turn).await?;
    }

    loop {
        stdout.write_all(b"you> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim() == "/quit" {
            break;
        }

        let Some(exchange) = controller
            .submit(&mut conversation, &line, address.as_deref())
            .await
        else {
            continue;
        };

        // Render events are for the web view; the terminal only surfaces diagnostics.
        while let Ok(event) = events.try_recv() {
            if let ViewEvent::Diagnostic(message) = event {
                warn!("{}", message);
                stdout.write_all(format!("{}\n", message).as_bytes()).await?;
            }
        }
        print_turn(&mut stdout, &exchange.reply).await?;
    }

    info!("Terminal chat session finished.");
    Ok(())
}

async fn print_turn(stdout: &mut tokio::io::Stdout, turn: &Turn) -> Result<()> {
    let speaker = match turn.role {
        Role::Assistant => "assistant",
        Role::User => "you",
        Role::System => "system",
    };
    stdout
        .write_all(format!("{}> {}\n", speaker, turn.content).as_bytes())
        .await?;
    stdout.flush().await?;
    Ok(())
}
