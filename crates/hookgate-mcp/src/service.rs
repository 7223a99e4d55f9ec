// crates/hookgate-mcp/src/service.rs
// ============================================================================
// Module: MCP Service
// Description: Actor owning the tool gateway, sessions, and claim set.
// Purpose: Serialize access to session state through typed messages.
// Dependencies: hookgate-broker, hookgate-core, tokio
// ============================================================================

//! ## Overview
//! [`McpService`] owns the [`ToolGateway`], [`SessionManager`], and
//! [`InhabitationRegistry`]. Transports talk to it through an [`McpHandle`]
//! that sends [`SessionMessage`] values over a bounded channel and waits for
//! the reply with a per-request timeout.
//!
//! Claim changes are applied inline by the actor. Tool calls and lifecycle
//! transitions are spawned so a slow tool or broadcast never stalls other
//! callers. [`McpHandle::shutdown`] stops intake, drains queued messages,
//! waits for spawned work, and completes every open session.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use hookgate_broker::EventPublisher;
use hookgate_core::AuditSink;
use hookgate_core::Clock;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::catalog::register_builtin_tools;
use crate::inhabitation::ClaimSnapshot;
use crate::inhabitation::InhabitationRegistry;
use crate::session::SessionManager;
use crate::session::SessionTransition;
use crate::session::new_session_id;
use crate::tools::ToolDefinition;
use crate::tools::ToolError;
use crate::tools::ToolGateway;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Capacity of the service channel.
const CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// SECTION: Messages
// ============================================================================

/// Typed requests handled by the service actor.
#[derive(Debug)]
pub enum SessionMessage {
    /// Claim a target.
    Inhabit {
        /// Target id.
        target_id: String,
        /// Caller-supplied context.
        context: Value,
        /// Reply: whether the claim was granted.
        reply: oneshot::Sender<bool>,
    },
    /// Release a target.
    Release {
        /// Target id.
        target_id: String,
        /// Reply: whether a claim existed.
        reply: oneshot::Sender<bool>,
    },
    /// Execute a tool.
    ToolCall {
        /// Calling session, when known.
        session_id: Option<String>,
        /// Tool name.
        name: String,
        /// Raw tool parameters.
        params: Value,
        /// Reply: tool result.
        reply: oneshot::Sender<Result<Value, ToolError>>,
    },
    /// Open a new session.
    SessionCreated {
        /// Reply: the new session id.
        reply: oneshot::Sender<String>,
    },
    /// Complete a session.
    SessionCompleted {
        /// Session id.
        session_id: String,
        /// Aggregate statistics.
        stats: Value,
        /// Reply: the transition applied.
        reply: oneshot::Sender<SessionTransition>,
    },
}

/// Actor inbox entries.
enum Command {
    /// A session request.
    Message(SessionMessage),
    /// Stop the actor; the reply carries the number of sessions closed.
    Shutdown(oneshot::Sender<usize>),
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors returned through an [`McpHandle`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The service has shut down.
    #[error("mcp service is closed")]
    Closed,
    /// No reply arrived within the request timeout.
    #[error("mcp service timed out after {0}ms")]
    TimedOut(u128),
    /// The tool call failed.
    #[error(transparent)]
    Tool(#[from] ToolError),
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Owner of the gateway, sessions, and claim set.
pub struct McpService {
    /// Tool gateway.
    gateway: Arc<ToolGateway>,
    /// Session manager.
    sessions: Arc<SessionManager>,
    /// Inhabitation registry.
    inhabitation: Arc<InhabitationRegistry>,
}

impl McpService {
    /// Creates a service from its parts.
    #[must_use]
    pub const fn new(
        gateway: Arc<ToolGateway>,
        sessions: Arc<SessionManager>,
        inhabitation: Arc<InhabitationRegistry>,
    ) -> Self {
        Self {
            gateway,
            sessions,
            inhabitation,
        }
    }

    /// Creates a service with the built-in tool catalog registered.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] when the catalog cannot be registered.
    pub fn with_builtin_tools(
        publisher: &Arc<dyn EventPublisher>,
        clock: &Arc<dyn Clock>,
        audit: &Arc<dyn AuditSink>,
    ) -> Result<Self, ToolError> {
        let gateway = ToolGateway::new(Arc::clone(audit));
        register_builtin_tools(&gateway, publisher, clock)?;
        Ok(Self::new(
            Arc::new(gateway),
            Arc::new(SessionManager::new(
                Arc::clone(publisher),
                Arc::clone(clock),
                Arc::clone(audit),
            )),
            Arc::new(InhabitationRegistry::new(Arc::clone(audit))),
        ))
    }

    /// Spawns the actor on the current runtime and returns its handle.
    #[must_use]
    pub fn spawn(self, request_timeout: Duration) -> McpHandle {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let handle = McpHandle {
            sender,
            request_timeout,
            gateway: Arc::clone(&self.gateway),
            inhabitation: Arc::clone(&self.inhabitation),
        };
        tokio::spawn(self.run(receiver));
        handle
    }

    /// Actor loop.
    async fn run(self, mut receiver: mpsc::Receiver<Command>) {
        let mut tasks = JoinSet::new();
        let mut shutdown_reply = None;
        while let Some(command) = receiver.recv().await {
            match command {
                Command::Message(message) => self.handle(message, &mut tasks),
                Command::Shutdown(reply) => {
                    shutdown_reply = Some(reply);
                    break;
                }
            }
            while tasks.try_join_next().is_some() {}
        }

        receiver.close();
        while let Some(command) = receiver.recv().await {
            match command {
                Command::Message(message) => self.handle(message, &mut tasks),
                Command::Shutdown(reply) => {
                    let _ = reply.send(0);
                }
            }
        }
        while tasks.join_next().await.is_some() {}

        let mut closed = 0;
        for session in self.sessions.open_sessions() {
            let stats = json!({
                "durationMs": self.sessions.elapsed_ms(&session),
                "reason": "shutdown",
            });
            if self.sessions.on_session_end(&session.id, stats).await
                == SessionTransition::Completed
            {
                closed += 1;
            }
        }
        if let Some(reply) = shutdown_reply {
            let _ = reply.send(closed);
        }
    }

    /// Applies one message, spawning work that may wait on I/O.
    fn handle(&self, message: SessionMessage, tasks: &mut JoinSet<()>) {
        match message {
            SessionMessage::Inhabit {
                target_id,
                context,
                reply,
            } => {
                let _ = reply.send(self.inhabitation.inhabit(&target_id, context));
            }
            SessionMessage::Release {
                target_id,
                reply,
            } => {
                let _ = reply.send(self.inhabitation.release(&target_id));
            }
            SessionMessage::ToolCall {
                session_id,
                name,
                params,
                reply,
            } => {
                let gateway = Arc::clone(&self.gateway);
                tasks.spawn(async move {
                    let result = gateway.execute(session_id.as_deref(), &name, params).await;
                    let _ = reply.send(result);
                });
            }
            SessionMessage::SessionCreated {
                reply,
            } => {
                let sessions = Arc::clone(&self.sessions);
                tasks.spawn(async move {
                    let session_id = new_session_id();
                    sessions.on_session_start(&session_id).await;
                    let _ = reply.send(session_id);
                });
            }
            SessionMessage::SessionCompleted {
                session_id,
                stats,
                reply,
            } => {
                let sessions = Arc::clone(&self.sessions);
                tasks.spawn(async move {
                    let transition = sessions.on_session_end(&session_id, stats).await;
                    let _ = reply.send(transition);
                });
            }
        }
    }
}

// ============================================================================
// SECTION: Handle
// ============================================================================

/// Cloneable client of a running [`McpService`].
#[derive(Clone)]
pub struct McpHandle {
    /// Actor inbox.
    sender: mpsc::Sender<Command>,
    /// Per-request timeout.
    request_timeout: Duration,
    /// Read-only view of tool definitions.
    gateway: Arc<ToolGateway>,
    /// Read-only view of the claim set.
    inhabitation: Arc<InhabitationRegistry>,
}

impl McpHandle {
    /// Sends one message and waits for its reply.
    async fn request<T: Send>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionMessage + Send,
    ) -> Result<T, ServiceError> {
        let (reply, response) = oneshot::channel();
        let exchange = async {
            self.sender
                .send(Command::Message(build(reply)))
                .await
                .map_err(|_| ServiceError::Closed)?;
            response.await.map_err(|_| ServiceError::Closed)
        };
        tokio::time::timeout(self.request_timeout, exchange)
            .await
            .map_err(|_| ServiceError::TimedOut(self.request_timeout.as_millis()))?
    }

    /// Claims `target_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the service is closed or slow.
    pub async fn inhabit(&self, target_id: &str, context: Value) -> Result<bool, ServiceError> {
        let target_id = target_id.to_string();
        self.request(|reply| SessionMessage::Inhabit {
            target_id,
            context,
            reply,
        })
        .await
    }

    /// Releases `target_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the service is closed or slow.
    pub async fn release(&self, target_id: &str) -> Result<bool, ServiceError> {
        let target_id = target_id.to_string();
        self.request(|reply| SessionMessage::Release {
            target_id,
            reply,
        })
        .await
    }

    /// Executes a tool.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Tool`] when the call fails, or another
    /// [`ServiceError`] when the service is closed or slow.
    pub async fn call_tool(
        &self,
        session_id: Option<&str>,
        name: &str,
        params: Value,
    ) -> Result<Value, ServiceError> {
        let session_id = session_id.map(str::to_string);
        let name = name.to_string();
        self.request(|reply| SessionMessage::ToolCall {
            session_id,
            name,
            params,
            reply,
        })
        .await?
        .map_err(ServiceError::from)
    }

    /// Opens a session and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the service is closed or slow.
    pub async fn start_session(&self) -> Result<String, ServiceError> {
        self.request(|reply| SessionMessage::SessionCreated {
            reply,
        })
        .await
    }

    /// Completes a session.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the service is closed or slow.
    pub async fn end_session(
        &self,
        session_id: &str,
        stats: Value,
    ) -> Result<SessionTransition, ServiceError> {
        let session_id = session_id.to_string();
        self.request(|reply| SessionMessage::SessionCompleted {
            session_id,
            stats,
            reply,
        })
        .await
    }

    /// Returns advertised tool definitions.
    #[must_use]
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.gateway.definitions()
    }

    /// Returns true when `target_id` is claimed.
    #[must_use]
    pub fn is_inhabited(&self, target_id: &str) -> bool {
        self.inhabitation.is_inhabited(target_id)
    }

    /// Subscribes to claim-set snapshots.
    #[must_use]
    pub fn subscribe_claims(&self) -> watch::Receiver<ClaimSnapshot> {
        self.inhabitation.subscribe()
    }

    /// Stops the service and returns how many open sessions were completed.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Closed`] when the service already stopped.
    pub async fn shutdown(&self) -> Result<usize, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.sender.send(Command::Shutdown(reply)).await.map_err(|_| ServiceError::Closed)?;
        response.await.map_err(|_| ServiceError::Closed)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
