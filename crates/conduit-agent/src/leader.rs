use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use conduit_catalog::AgentSettings;
use conduit_model::{Message, ModelProvider};
use conduit_tools::ToolSchema;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::builtin::invoke_and_collect_final;
use crate::capability::{Agent, StepEvent, StepSender};
use crate::context::RuntimeContext;
use crate::guardrail::{is_guardrail_failure, localized_refusal};
use crate::metadata::{FinishReason, MessageMetadata};
use crate::registry::AgentConstructionCtx;
use crate::template::{render, TemplateValues};
use crate::turn::{compose_messages, run_model_once};

const DEFAULT_LEADER_PROMPT: &str = "You coordinate a crew of specialized agents. Delegate to exactly the crew member best suited to the user's request.";

/// A leader whose "tools" are named crew members rather than MCP tools. The
/// model picks a crew member by name; the leader invokes that member with
/// the current conversation and folds its final message back in as a
/// tool-result before producing its own summary.
pub struct LeaderAgent {
    name: String,
    ctx: AgentConstructionCtx,
    settings: Mutex<Option<AgentSettings>>,
    runtime_ctx: Mutex<Option<RuntimeContext>>,
    crew: Mutex<HashMap<String, Arc<dyn Agent>>>,
}

impl LeaderAgent {
    pub fn new(name: impl Into<String>, ctx: AgentConstructionCtx) -> Self {
        Self {
            name: name.into(),
            ctx,
            settings: Mutex::new(None),
            runtime_ctx: Mutex::new(None),
            crew: Mutex::new(HashMap::new()),
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
            .unwrap_or(DEFAULT_LEADER_PROMPT)
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

    /// One tool schema per crew member, so the model can dispatch to it by
    /// name the same way it would call any other bound tool.
    async fn crew_schemas(&self) -> Vec<ToolSchema> {
        let crew = self.crew.lock().await;
        crew.keys()
            .map(|name| ToolSchema {
                name: name.clone(),
                description: format!("Delegate this request to the '{name}' crew member."),
                parameters: json!({
                    "type": "object",
                    "properties": { "message": { "type": "string" } },
                    "required": ["message"],
                }),
            })
            .collect()
    }
}

#[async_trait]
impl Agent for LeaderAgent {
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

    async fn async_init(&self, crew: Vec<Arc<dyn Agent>>) -> anyhow::Result<()> {
        let mut map = HashMap::with_capacity(crew.len());
        for member in crew {
            map.insert(member.name().to_string(), member);
        }
        *self.crew.lock().await = map;
        Ok(())
    }

    async fn invoke(&self, history: Vec<Message>, sender: StepSender) {
        let started = Instant::now();
        let max_rounds = self.ctx.ai_config.max_tool_rounds;
        let system_prompt = self.system_prompt().await;
        let mut history = history;
        let language = None::<String>;

        for round in 0..max_rounds {
            let messages = compose_messages(system_prompt.clone(), history.clone());
            let tools = self.crew_schemas().await;

            let turn = match run_model_once(self.model().as_ref(), messages, tools).await {
                Ok(turn) => turn,
                Err(e) => {
                    let text = if is_guardrail_failure(&e) {
                        localized_refusal(language.as_deref()).to_string()
                    } else {
                        warn!(agent = %self.name, error = %e, "leader model invocation failed");
                        "Something went wrong while coordinating the crew. Please try again.".to_string()
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
                                agent_name: Some(self.name.clone()),
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
                let metadata = MessageMetadata {
                    model: Some(self.model().model_name().to_string()),
                    token_usage: turn.usage,
                    agent_name: Some(self.name.clone()),
                    finish_reason: Some(FinishReason::Stop),
                    latency_ms: Some(started.elapsed().as_millis() as u64),
                    ..Default::default()
                };
                let _ = sender
                    .send(StepEvent::Final {
                        message: Message::assistant(turn.text),
                        metadata,
                    })
                    .await;
                return;
            }

            info!(agent = %self.name, round, calls = turn.pending_calls.len(), "leader dispatching to crew");

            let crew = self.crew.lock().await;
            for call in &turn.pending_calls {
                let delegate_message = serde_json::from_str::<serde_json::Value>(&call.arguments)
                    .ok()
                    .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
                    .unwrap_or_else(|| {
                        history
                            .iter()
                            .rev()
                            .find_map(|m| m.as_text())
                            .unwrap_or_default()
                            .to_string()
                    });

                let content = match crew.get(&call.name) {
                    Some(member) => {
                        let member_history = vec![Message::user(delegate_message)];
                        match invoke_and_collect_final(member.as_ref(), member_history).await {
                            Some((message, _)) => message
                                .as_text()
                                .unwrap_or("(crew member returned no text)")
                                .to_string(),
                            None => "[tool_unavailable] crew member produced no final message".to_string(),
                        }
                    }
                    None => format!("[tool_unavailable] unknown crew member {:?}", call.name),
                };

                let _ = sender
                    .send(StepEvent::ToolResult {
                        tool_name: call.name.clone(),
                        content: content.clone(),
                    })
                    .await;
                history.push(Message::tool_result(call.id.clone(), content));
            }
            drop(crew);
        }

        let _ = sender
            .send(StepEvent::Final {
                message: Message::assistant(
                    "I've reached the maximum number of coordination steps for this request without a final answer.",
                ),
                metadata: MessageMetadata {
                    agent_name: Some(self.name.clone()),
                    finish_reason: Some(FinishReason::RoundsExhausted),
                    latency_ms: Some(started.elapsed().as_millis() as u64),
                    ..Default::default()
                },
            })
            .await;
    }

    async fn aclose(&self) {
        let crew = self.crew.lock().await;
        for member in crew.values() {
            member.aclose().await;
        }
    }
}
