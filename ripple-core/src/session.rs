//! Sessions
//!
//! A graph is single-writer: every operation takes `&mut Graph`. When events
//! come from several tasks, a session serializes them. The graph moves into a
//! dedicated tokio task that owns it exclusively, and cloneable handles send
//! it commands over a bounded channel.
//!
//! # Event Processing
//!
//! Commands are handled strictly one at a time. A `set` propagates the change,
//! runs every sink it reached and replies with their outcomes before the next
//! command is read, so a propagation pass always runs to completion.
//!
//! When the last handle is dropped, the worker stops and hands the graph back
//! through its `JoinHandle`.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info_span, Instrument};

use crate::error::{ConfigError, GraphError};
use crate::graph::{Graph, NodeId};
use crate::reactive::SinkOutcome;
use crate::snapshot::GraphSnapshot;

/// Errors returned by [`SessionHandle`] calls.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The worker has stopped.
    #[error("session closed")]
    Closed,

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

type Reply<T> = oneshot::Sender<T>;

enum Command<V> {
    Set {
        signal: NodeId,
        value: V,
        reply: Reply<Result<Vec<(NodeId, SinkOutcome)>, GraphError>>,
    },
    Get {
        node: NodeId,
        reply: Reply<Result<V, GraphError>>,
    },
    RenderAll {
        reply: Reply<Vec<(NodeId, SinkOutcome)>>,
    },
    Snapshot {
        reply: Reply<GraphSnapshot>,
    },
}

/// Entry point for running a graph behind a single-writer queue.
pub struct Session;

impl Session {
    /// Move `graph` into a new worker task on the current tokio runtime.
    ///
    /// The queue bound and initial render come from the graph's
    /// configuration.
    pub fn spawn<V>(graph: Graph<V>) -> Result<(SessionHandle<V>, JoinHandle<Graph<V>>), SessionError>
    where
        V: Clone + Send + 'static,
    {
        let config = graph.config().clone();
        config.validate()?;

        let (commands, inbox) = mpsc::channel(config.queue_capacity);
        let span = info_span!("session", label = %config.label);
        let worker = tokio::spawn(run_worker(graph, inbox, config.initial_render).instrument(span));

        Ok((SessionHandle { commands }, worker))
    }
}

async fn run_worker<V>(
    mut graph: Graph<V>,
    mut inbox: mpsc::Receiver<Command<V>>,
    initial_render: bool,
) -> Graph<V>
where
    V: Clone + Send + 'static,
{
    if initial_render {
        let sinks = graph.sink_ids();
        let outcomes = graph.run_all(&sinks);
        debug!(sinks = outcomes.len(), "initial render");
    }

    while let Some(command) = inbox.recv().await {
        let delivered = match command {
            Command::Set {
                signal,
                value,
                reply,
            } => {
                let result = graph
                    .set(signal.as_str(), value)
                    .map(|sinks| graph.run_all(&sinks));
                reply.send(result).is_ok()
            }
            Command::Get { node, reply } => reply.send(graph.get(node.as_str())).is_ok(),
            Command::RenderAll { reply } => {
                let sinks = graph.sink_ids();
                reply.send(graph.run_all(&sinks)).is_ok()
            }
            Command::Snapshot { reply } => reply.send(graph.snapshot()).is_ok(),
        };

        if !delivered {
            debug!("requester dropped before the reply was sent");
        }
    }

    debug!("all handles dropped, session stopping");
    graph
}

/// Cloneable handle for submitting events to a session.
pub struct SessionHandle<V> {
    commands: mpsc::Sender<Command<V>>,
}

impl<V> Clone for SessionHandle<V> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
        }
    }
}

impl<V> SessionHandle<V>
where
    V: Send + 'static,
{
    /// Set a signal, then run every sink the change reached.
    pub async fn set(
        &self,
        signal: impl Into<NodeId>,
        value: V,
    ) -> Result<Vec<(NodeId, SinkOutcome)>, SessionError> {
        let signal = signal.into();
        let outcomes = self
            .request(|reply| Command::Set {
                signal,
                value,
                reply,
            })
            .await?;
        Ok(outcomes?)
    }

    /// Read a signal or derivation.
    pub async fn get(&self, node: impl Into<NodeId>) -> Result<V, SessionError> {
        let node = node.into();
        let value = self.request(|reply| Command::Get { node, reply }).await?;
        Ok(value?)
    }

    /// Run every sink, regardless of what changed.
    pub async fn render_all(&self) -> Result<Vec<(NodeId, SinkOutcome)>, SessionError> {
        self.request(|reply| Command::RenderAll { reply }).await
    }

    pub async fn snapshot(&self) -> Result<GraphSnapshot, SessionError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command<V>) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)
    }
}
