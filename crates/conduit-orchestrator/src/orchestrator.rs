use std::collections::HashMap;
use std::sync::Arc;

use conduit_agent::{AgentConstructionCtx, RuntimeContext, StepEvent};
use conduit_factory::AgentFactory;
use conduit_model::Message;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::history::{HistoryStore, RankAllocator};
use crate::message::{history_to_model_messages, Channel, ChatMessage, ChatRole, MessagePart};
use crate::session::{Session, SessionStore};

/// Capacity of the per-exchange streaming channel. Chosen to absorb a burst
/// of reasoner ticks without unbounded growth if the client is slow to
/// drain; see `forward_to_client` for what happens once it's full.
const STREAM_CHANNEL_CAPACITY: usize = 32;

/// Input to one exchange. Mirrors the websocket chat input shape; the
/// orchestrator itself is transport-agnostic — a gateway deserializes the
/// wire frame into its own DTO, resolves `runtime_context` (token lookup,
/// language negotiation, etc.) out of band, and builds this from the two.
/// `RuntimeContext` carries a `dyn TokenProvider`, so this type is not
/// itself `Deserialize` — only the wire DTO on the gateway side is.
#[derive(Clone)]
pub struct ChatAskInput {
    pub user_id: String,
    pub session_id: Option<String>,
    pub message: String,
    pub agent_name: String,
    pub runtime_context: RuntimeContext,
    pub client_exchange_id: Option<String>,
}

/// Server → client frame, tagged by `type` so a websocket layer can forward
/// it as-is.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Stream { message: ChatMessage },
    Final { messages: Vec<ChatMessage>, session: Session },
    Error { content: String, session_id: Option<String> },
}

pub type EventSender = mpsc::Sender<ServerEvent>;

/// Drives one exchange end to end: resolve/create the session, warm the
/// agent, run its graph while streaming progress, then persist the whole
/// batch of produced messages in rank order.
pub struct SessionOrchestrator {
    factory: Arc<AgentFactory>,
    sessions: Arc<dyn SessionStore>,
    history: Arc<dyn HistoryStore>,
    construction_ctx: AgentConstructionCtx,
    ranks: RankAllocator,
    exchange_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionOrchestrator {
    pub fn new(
        factory: Arc<AgentFactory>,
        sessions: Arc<dyn SessionStore>,
        history: Arc<dyn HistoryStore>,
        construction_ctx: AgentConstructionCtx,
    ) -> Self {
        Self {
            factory,
            sessions,
            history,
            construction_ctx,
            ranks: RankAllocator::new(),
            exchange_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Runs one exchange, forwarding intermediate progress and the final
    /// result over `events`. Never propagates an error to the caller beyond
    /// also emitting a single `ServerEvent::Error` first — mirrors the
    /// orchestrator's role as the boundary that converts any uncaught
    /// exception into one error frame with the session id, if known.
    pub async fn run_exchange(
        &self,
        input: ChatAskInput,
        events: EventSender,
    ) -> anyhow::Result<(Session, Vec<ChatMessage>)> {
        let session_id = input.session_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        match self.run_exchange_inner(&session_id, input, &events).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "exchange failed");
                let _ = events
                    .send(ServerEvent::Error {
                        content: e.to_string(),
                        session_id: Some(session_id),
                    })
                    .await;
                Err(e)
            }
        }
    }

    async fn run_exchange_inner(
        &self,
        session_id: &str,
        input: ChatAskInput,
        events: &EventSender,
    ) -> anyhow::Result<(Session, Vec<ChatMessage>)> {
        let session = self.sessions.get_or_create(session_id, &input.user_id).await;
        if session.user_id != input.user_id {
            return Err(OrchestratorError::SessionOwnerMismatch {
                session_id: session_id.to_string(),
            }
            .into());
        }

        // Serializes concurrent exchanges for the same session at (and
        // through) the persistence step, so rank allocation never
        // interleaves between two exchanges sharing a session.
        let lock = self.exchange_lock(session_id).await;
        let _guard = lock.lock().await;

        let (agent, cache_hit) = self
            .factory
            .create_and_init(&input.agent_name, input.runtime_context.clone(), session_id, &self.construction_ctx)
            .await?;
        info!(session_id, agent = %input.agent_name, cache_hit, "warmed session agent");

        let exchange_id = input.client_exchange_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());

        let existing = self.history.list_by_session(session_id).await;
        let max_rank = existing.iter().map(|m| m.rank).max().unwrap_or(0);
        self.ranks.resume_from(session_id, max_rank);

        let mut model_history = history_to_model_messages(&existing);
        model_history.push(Message::user(input.message.clone()));

        // The inbound message is persisted like any other turn so the next
        // exchange's `history_to_model_messages` sees the full back-and-forth,
        // not just prior assistant answers. It consumes the first rank of the
        // exchange, so a brand-new session's reply lands at rank 2, not 1 —
        // see DESIGN.md's note on spec §8 scenario 1.
        let mut produced: Vec<ChatMessage> = vec![ChatMessage {
            session_id: session_id.to_string(),
            exchange_id: exchange_id.clone(),
            rank: self.ranks.allocate(session_id),
            role: ChatRole::User,
            channel: Channel::Final,
            parts: vec![MessagePart::text(input.message.clone())],
            timestamp: chrono::Utc::now(),
            metadata: conduit_agent::MessageMetadata::default(),
        }];

        let (tx, mut rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let invoke_fut = agent.invoke(model_history, tx);

        let collect_fut = async {
            while let Some(event) = rx.recv().await {
                let chat_message = self.step_event_to_chat_message(session_id, &exchange_id, &input.agent_name, event);
                self.forward_to_client(events, &chat_message).await;
                let is_final = chat_message.channel == Channel::Final;
                produced.push(chat_message);
                if is_final {
                    break;
                }
            }
        };
        tokio::join!(invoke_fut, collect_fut);

        let final_messages: Vec<ChatMessage> = produced
            .iter()
            .filter(|m| m.channel == Channel::Final && m.role == ChatRole::Assistant)
            .cloned()
            .collect();
        if final_messages.is_empty() {
            return Err(OrchestratorError::NoFinalMessage {
                agent_name: input.agent_name.clone(),
            }
            .into());
        }

        self.history.append(session_id, produced).await?;

        let _ = events
            .send(ServerEvent::Final {
                messages: final_messages.clone(),
                session: session.clone(),
            })
            .await;

        Ok((session, final_messages))
    }

    fn step_event_to_chat_message(
        &self,
        session_id: &str,
        exchange_id: &str,
        agent_name: &str,
        event: StepEvent,
    ) -> ChatMessage {
        let (role, channel, parts, metadata) = match event {
            StepEvent::Thought(text) => (
                ChatRole::Assistant,
                Channel::Thought,
                vec![MessagePart::text(text)],
                default_metadata(agent_name),
            ),
            StepEvent::Plan(text) => (
                ChatRole::Assistant,
                Channel::Plan,
                vec![MessagePart::text(text)],
                default_metadata(agent_name),
            ),
            StepEvent::ToolResult { tool_name, content } => (
                ChatRole::Tool,
                Channel::ToolResult,
                vec![MessagePart::ToolResultBlock { tool_name, content }],
                default_metadata(agent_name),
            ),
            StepEvent::Final { message, metadata } => (
                ChatRole::Assistant,
                Channel::Final,
                vec![MessagePart::text(message.as_text().unwrap_or_default())],
                metadata,
            ),
        };

        ChatMessage {
            session_id: session_id.to_string(),
            exchange_id: exchange_id.to_string(),
            rank: self.ranks.allocate(session_id),
            role,
            channel,
            parts,
            timestamp: chrono::Utc::now(),
            metadata,
        }
    }

    /// Forwards one message to the client's stream. The `thought` channel
    /// is the only one dropped under backpressure; every other channel —
    /// most importantly `final` — blocks until there's room, since losing
    /// a tool result or the answer itself is never acceptable.
    async fn forward_to_client(&self, events: &EventSender, message: &ChatMessage) {
        if message.channel == Channel::Thought {
            if events.try_send(ServerEvent::Stream { message: message.clone() }).is_err() {
                warn!(session_id = %message.session_id, "dropping thought-channel message under backpressure");
            }
            return;
        }
        let _ = events.send(ServerEvent::Stream { message: message.clone() }).await;
    }

    async fn exchange_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.exchange_locks.lock().await;
        locks.entry(session_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Deletes a session and cascades to its persisted messages. Attachment
    /// cleanup (out of core scope, see `spec.md` §1) is left to the caller.
    pub async fn delete_session(&self, session_id: &str) -> anyhow::Result<()> {
        self.history.delete_session(session_id).await?;
        self.sessions.delete(session_id).await?;
        self.exchange_locks.lock().await.remove(session_id);
        Ok(())
    }
}

fn default_metadata(agent_name: &str) -> conduit_agent::MessageMetadata {
    conduit_agent::MessageMetadata {
        agent_name: Some(agent_name.to_string()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap as StdHashMap;

    use conduit_catalog::{AgentCatalog, AgentKind, AgentScope, AgentSettings, AgentTuning, InMemoryAgentStore};
    use conduit_config::AiConfig;
    use conduit_model::MockProvider;

    use crate::history::InMemoryHistoryStore;
    use crate::session::InMemorySessionStore;

    use super::*;

    fn settings(name: &str, system_prompt: &str) -> AgentSettings {
        let mut values = StdHashMap::new();
        values.insert("system_prompt".to_string(), serde_json::Value::String(system_prompt.to_string()));
        AgentSettings {
            name: name.to_string(),
            enabled: true,
            class_path: "builtin.standard_agent".to_string(),
            kind: AgentKind::Agent,
            tuning: AgentTuning {
                fields: Vec::new(),
                values,
                mcp_servers: Vec::new(),
            },
            crew: Vec::new(),
            scope: AgentScope::Global,
            static_seeded: false,
        }
    }

    async fn orchestrator_with_echo_agent() -> SessionOrchestrator {
        let mut registry = conduit_agent::AgentRegistry::new();
        conduit_agent::register_builtins(&mut registry);
        let registry = Arc::new(registry);
        let catalog = Arc::new(AgentCatalog::new(Arc::new(InMemoryAgentStore::new()), registry.clone()));
        catalog.create(settings("echo", "Echo: {today}")).await.unwrap();

        let factory = Arc::new(AgentFactory::new(catalog, registry, 16));
        let construction_ctx = AgentConstructionCtx {
            model: Arc::new(MockProvider),
            ai_config: AiConfig::default(),
            mcp_catalog: Vec::new(),
        };

        SessionOrchestrator::new(
            factory,
            Arc::new(InMemorySessionStore::new()),
            Arc::new(InMemoryHistoryStore::new()),
            construction_ctx,
        )
    }

    fn ask(session_id: Option<&str>, message: &str) -> ChatAskInput {
        ChatAskInput {
            user_id: "u1".to_string(),
            session_id: session_id.map(str::to_string),
            message: message.to_string(),
            agent_name: "echo".to_string(),
            runtime_context: RuntimeContext::with_static_token("u1", None),
            client_exchange_id: None,
        }
    }

    #[tokio::test]
    async fn tool_less_agent_produces_one_final_event_with_echoed_text() {
        let orchestrator = orchestrator_with_echo_agent().await;
        let (tx, mut rx) = mpsc::channel(32);

        let (session, finals) = orchestrator.run_exchange(ask(Some("s1"), "hello"), tx).await.unwrap();
        assert_eq!(session.id, "s1");
        assert_eq!(finals.len(), 1);
        assert_eq!(finals[0].text(), "MOCK: hello");
        assert_eq!(finals[0].channel, Channel::Final);

        let mut saw_final_event = false;
        while let Ok(event) = rx.try_recv() {
            if let ServerEvent::Final { messages, .. } = event {
                assert_eq!(messages.len(), 1);
                saw_final_event = true;
            }
        }
        assert!(saw_final_event);
    }

    #[tokio::test]
    async fn ranks_are_strictly_increasing_with_no_gaps_within_an_exchange() {
        let orchestrator = orchestrator_with_echo_agent().await;
        let (tx, _rx) = mpsc::channel(32);
        orchestrator.run_exchange(ask(Some("s1"), "first"), tx.clone()).await.unwrap();

        let history = orchestrator.history.list_by_session("s1").await;
        let mut ranks: Vec<u64> = history.iter().map(|m| m.rank).collect();
        ranks.sort_unstable();
        for pair in ranks.windows(2) {
            assert_eq!(pair[1], pair[0] + 1, "ranks must have no gaps");
        }
    }

    #[tokio::test]
    async fn second_exchange_continues_rank_numbering_from_the_first() {
        let orchestrator = orchestrator_with_echo_agent().await;
        let (tx, _rx) = mpsc::channel(32);
        orchestrator.run_exchange(ask(Some("s1"), "first"), tx.clone()).await.unwrap();
        let after_first = orchestrator.history.list_by_session("s1").await;
        let max_after_first = after_first.iter().map(|m| m.rank).max().unwrap();

        orchestrator.run_exchange(ask(Some("s1"), "second"), tx).await.unwrap();
        let after_second = orchestrator.history.list_by_session("s1").await;
        let new_ranks: Vec<u64> = after_second.iter().map(|m| m.rank).filter(|r| *r > max_after_first).collect();
        assert!(!new_ranks.is_empty());
        assert_eq!(*new_ranks.iter().min().unwrap(), max_after_first + 1);
    }

    #[tokio::test]
    async fn second_turn_sees_the_first_turns_conversation_as_context() {
        let orchestrator = orchestrator_with_echo_agent().await;
        let (tx, _rx) = mpsc::channel(32);
        orchestrator.run_exchange(ask(Some("s1"), "first"), tx.clone()).await.unwrap();
        let (_session, finals) = orchestrator.run_exchange(ask(Some("s1"), "second"), tx).await.unwrap();
        // MockProvider echoes the last *user* message verbatim, so the second
        // turn's reply proves the freshly-asked message reached the model,
        // not a stale cached one from the first turn.
        assert_eq!(finals[0].text(), "MOCK: second");
    }

    #[tokio::test]
    async fn a_session_cannot_be_hijacked_by_a_different_user() {
        let orchestrator = orchestrator_with_echo_agent().await;
        let (tx, _rx) = mpsc::channel(32);
        orchestrator.run_exchange(ask(Some("s1"), "hi"), tx.clone()).await.unwrap();

        let mut hijack = ask(Some("s1"), "hi again");
        hijack.user_id = "attacker".to_string();
        let result = orchestrator.run_exchange(hijack, tx).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn delete_session_cascades_to_history() {
        let orchestrator = orchestrator_with_echo_agent().await;
        let (tx, _rx) = mpsc::channel(32);
        orchestrator.run_exchange(ask(Some("s1"), "hi"), tx).await.unwrap();
        assert!(!orchestrator.history.list_by_session("s1").await.is_empty());

        orchestrator.delete_session("s1").await.unwrap();
        assert!(orchestrator.history.list_by_session("s1").await.is_empty());
        assert!(orchestrator.sessions.get("s1").await.is_none());
    }
}
