use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use conduit_catalog::AgentSettings;
use conduit_mcp::{resolve_servers, McpBoundTool, McpRuntime};
use conduit_model::{Message, ModelProvider};
use conduit_tools::{ResilientToolNode, ToolRegistry};
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::capability::{Agent, StepEvent, StepSender};
use crate::context::{ContextTokenProvider, RuntimeContext};
use crate::guardrail::{is_guardrail_failure, localized_refusal};
use crate::metadata::{FinishReason, MessageMetadata};
use crate::registry::AgentConstructionCtx;
use crate::template::{render, TemplateValues};
use crate::turn::{compose_messages, run_model_once};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// The everyday tool-using agent: one system prompt, an optional set of
/// MCP-bound tools, and the reasoner/tool loop described by the state
/// machine `START -> reasoner <-> tools -> ...`.
pub struct StandardAgent {
    name: String,
    ctx: AgentConstructionCtx,
    settings: Mutex<Option<AgentSettings>>,
    runtime_ctx: Mutex<Option<RuntimeContext>>,
    mcp: Mutex<Option<Arc<McpRuntime>>>,
}

impl StandardAgent {
    pub fn new(name: impl Into<String>, ctx: AgentConstructionCtx) -> Self {
        Self {
            name: name.into(),
            ctx,
            settings: Mutex::new(None),
            runtime_ctx: Mutex::new(None),
            mcp: Mutex::new(None),
        }
    }

    fn model(&self) -> Arc<dyn ModelProvider> {
        self.ctx.model.clone()
    }

    async fn system_prompt(&self) -> String {
        let settings = self.settings.lock().await;
        let template = settings
            .as_ref()
            .and_then(|s| s.tuning.string_value("system_prompt"))
            .unwrap_or(DEFAULT_SYSTEM_PROMPT)
            .to_string();
        drop(settings);

        let runtime_ctx = self.runtime_ctx.lock().await;
        let values = TemplateValues {
            today: Some(chrono::Local::now().format("%Y-%m-%d").to_string()),
            user_id: runtime_ctx.as_ref().map(|c| c.user_id.clone()),
            session_id: None,
            agent_name: Some(self.name.clone()),
        };
        render(&template, &values)
    }
}

#[async_trait]
impl Agent for StandardAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply_settings(&self, settings: AgentSettings) -> anyhow::Result<()> {
        *self.settings.lock().await = Some(settings);
        Ok(())
    }

    async fn set_runtime_context(&self, ctx: RuntimeContext) -> anyhow::Result<()> {
        *self.runtime_ctx.lock().await = Some(ctx);
        Ok(())
    }

    async fn async_init(&self, _crew: Vec<Arc<dyn Agent>>) -> anyhow::Result<()> {
        let settings = self.settings.lock().await;
        let server_names = settings
            .as_ref()
            .map(|s| s.tuning.mcp_servers.clone())
            .unwrap_or_default();
        drop(settings);

        let runtime_ctx = self
            .runtime_ctx
            .lock()
            .await
            .clone()
            .ok_or_else(|| anyhow::anyhow!("async_init called before set_runtime_context"))?;

        let servers = resolve_servers(&server_names, &self.ctx.mcp_catalog);
        let mcp = Arc::new(McpRuntime::new(
            servers,
            Arc::new(ContextTokenProvider(runtime_ctx)),
        ));
        mcp.init().await?;
        *self.mcp.lock().await = Some(mcp);
        Ok(())
    }

    async fn invoke(&self, history: Vec<Message>, sender: StepSender) {
        let mcp = self.mcp.lock().await.clone();
        run_reasoner_loop(&self.name, &self.ctx, self.model(), mcp, self.system_prompt().await, history, sender).await;
    }

    async fn aclose(&self) {
        if let Some(mcp) = self.mcp.lock().await.take() {
            mcp.aclose().await;
        }
    }
}

/// Shared driver for the reasoner/tool state machine. Lives outside
/// [`StandardAgent`] so a leader (whose "tools" are crew members, not MCP
/// tools) can still share the model round-trip and bookkeeping without
/// duplicating the bounded-loop logic.
pub(crate) async fn run_reasoner_loop(
    agent_name: &str,
    ctx: &AgentConstructionCtx,
    model: Arc<dyn ModelProvider>,
    mcp: Option<Arc<McpRuntime>>,
    system_prompt: String,
    mut history: Vec<Message>,
    sender: StepSender,
) {
    let started = Instant::now();
    let max_rounds = ctx.ai_config.max_tool_rounds;
    let timeout = Duration::from_secs(ctx.ai_config.tool_call_timeout_secs);
    let language = None::<String>; // resolved per-request by the orchestrator; absence means English.
    let mut tool_outputs: Vec<(String, String)> = Vec::new();

    for round in 0..max_rounds {
        let messages = compose_messages(system_prompt.clone(), history.clone());
        let tools = match &mcp {
            Some(mcp) => mcp.get_tools().await,
            None => Vec::new(),
        };

        let turn = match run_model_once(model.as_ref(), messages, tools).await {
            Ok(turn) => turn,
            Err(e) => {
                let text = if is_guardrail_failure(&e) {
                    localized_refusal(language.as_deref()).to_string()
                } else {
                    warn!(agent = %agent_name, error = %e, "reasoner model invocation failed");
                    "Something went wrong while generating a response. Please try again.".to_string()
                };
                let finish_reason = if is_guardrail_failure(&e) {
                    FinishReason::Guardrail
                } else {
                    FinishReason::Error
                };
                let _ = sender
                    .send(StepEvent::Final {
                        message: Message::assistant(text),
                        metadata: MessageMetadata {
                            agent_name: Some(agent_name.to_string()),
                            finish_reason: Some(finish_reason),
                            latency_ms: Some(started.elapsed().as_millis() as u64),
                            ..Default::default()
                        },
                    })
                    .await;
                return;
            }
        };

        if turn.pending_calls.is_empty() {
            let mut metadata = MessageMetadata {
                model: Some(model.model_name().to_string()),
                token_usage: turn.usage,
                agent_name: Some(agent_name.to_string()),
                finish_reason: Some(FinishReason::Stop),
                latency_ms: Some(started.elapsed().as_millis() as u64),
                ..Default::default()
            };
            for (name, content) in &tool_outputs {
                metadata.record_tool_output(name, content);
            }
            let _ = sender
                .send(StepEvent::Final {
                    message: Message::assistant(turn.text),
                    metadata,
                })
                .await;
            return;
        }

        info!(agent = %agent_name, round, calls = turn.pending_calls.len(), "reasoner dispatching tool calls");

        let Some(mcp) = &mcp else {
            // The model asked for tools but none are bound — fabricate the
            // fallback the resilient tool node would have produced, so the
            // loop can still make progress instead of dropping the calls.
            for call in &turn.pending_calls {
                let content = "[tool_unavailable] no tools are bound to this agent";
                history.push(Message::tool_result(call.id.clone(), content));
                tool_outputs.push((call.name.clone(), content.to_string()));
                let _ = sender
                    .send(StepEvent::ToolResult {
                        tool_name: call.name.clone(),
                        content: content.to_string(),
                    })
                    .await;
            }
            continue;
        };

        let registry = Arc::new(build_registry_for(mcp).await);
        let node = ResilientToolNode::new(registry, timeout);

        let calls: Vec<conduit_tools::ToolCall> = turn
            .pending_calls
            .iter()
            .map(|c| conduit_tools::ToolCall {
                id: c.id.clone(),
                name: c.name.clone(),
                args: serde_json::from_str(&c.arguments).unwrap_or(serde_json::Value::Null),
            })
            .collect();

        let outcomes = node.execute_many(calls).await;
        let needs_refresh = outcomes.iter().any(|o| o.should_refresh());
        if needs_refresh {
            if let Err(e) = mcp.refresh_and_bind().await {
                warn!(agent = %agent_name, error = %e, "mcp refresh_and_bind failed");
            }
        }

        for (call, outcome) in turn.pending_calls.iter().zip(outcomes) {
            let output = outcome.into_tool_output();
            tool_outputs.push((call.name.clone(), output.content.clone()));
            let _ = sender
                .send(StepEvent::ToolResult {
                    tool_name: call.name.clone(),
                    content: output.content.clone(),
                })
                .await;
            history.push(Message::tool_result(call.id.clone(), output.content));
        }
    }

    // Bounded recursion depth exceeded: wrap up rather than loop forever.
    let _ = sender
        .send(StepEvent::Final {
            message: Message::assistant(
                "I've reached the maximum number of reasoning steps for this request without a final answer.",
            ),
            metadata: MessageMetadata {
                agent_name: Some(agent_name.to_string()),
                finish_reason: Some(FinishReason::RoundsExhausted),
                latency_ms: Some(started.elapsed().as_millis() as u64),
                ..Default::default()
            },
        })
        .await;
}

async fn build_registry_for(mcp: &Arc<McpRuntime>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for schema in mcp.get_tools().await {
        registry.register(McpBoundTool::new(schema, mcp.clone()));
    }
    registry
}

/// Builds a receiver-free event sink for call sites that only want the
/// final outcome of an `invoke` (e.g. leader crew dispatch, or tests that
/// don't care about intermediate streaming).
pub async fn invoke_and_collect_final(
    agent: &dyn Agent,
    history: Vec<Message>,
) -> Option<(Message, MessageMetadata)> {
    let (tx, mut rx) = mpsc::channel(32);
    let agent_fut = agent.invoke(history, tx);
    let collect_fut = async {
        let mut result = None;
        while let Some(event) = rx.recv().await {
            if let StepEvent::Final { message, metadata } = event {
                result = Some((message, metadata));
            }
        }
        result
    };
    let (_, result) = tokio::join!(agent_fut, collect_fut);
    result
}

#[cfg(test)]
mod tests {
    use conduit_config::AiConfig;
    use conduit_model::{MockProvider, ScriptedMockProvider};

    use super::*;
    use crate::capability::Agent as _;

    fn settings(name: &str, system_prompt: &str) -> AgentSettings {
        use std::collections::HashMap;

        use conduit_catalog::{AgentKind, AgentScope, AgentTuning};

        let mut values = HashMap::new();
        values.insert(
            "system_prompt".to_string(),
            serde_json::Value::String(system_prompt.to_string()),
        );
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

    fn test_ctx(model: Arc<dyn ModelProvider>) -> AgentConstructionCtx {
        AgentConstructionCtx {
            model,
            ai_config: AiConfig::default(),
            mcp_catalog: Vec::new(),
        }
    }

    #[tokio::test]
    async fn echo_agent_renders_today_placeholder_and_returns_final() {
        let agent = StandardAgent::new("echo", test_ctx(Arc::new(MockProvider)));
        agent.apply_settings(settings("echo", "Echo: {today}")).await.unwrap();
        agent
            .set_runtime_context(RuntimeContext::with_static_token("u1", None))
            .await
            .unwrap();
        agent.async_init(Vec::new()).await.unwrap();

        let (message, metadata) =
            invoke_and_collect_final(&agent, vec![Message::user("hello")])
                .await
                .expect("must produce a final message");

        assert_eq!(message.as_text().unwrap(), "MOCK: hello");
        assert_eq!(metadata.finish_reason, Some(FinishReason::Stop));
        agent.aclose().await;
    }

    #[tokio::test]
    async fn tool_less_agent_skips_pending_calls_gracefully() {
        let scripted = ScriptedMockProvider::tool_then_text("c1", "search", "{}", "done");
        let agent = StandardAgent::new("no-tools", test_ctx(Arc::new(scripted)));
        agent.apply_settings(settings("no-tools", "prompt")).await.unwrap();
        agent
            .set_runtime_context(RuntimeContext::with_static_token("u1", None))
            .await
            .unwrap();
        agent.async_init(Vec::new()).await.unwrap();

        let (message, _) = invoke_and_collect_final(&agent, vec![Message::user("hi")])
            .await
            .expect("must still finish");
        assert_eq!(message.as_text().unwrap(), "done");
    }
}
