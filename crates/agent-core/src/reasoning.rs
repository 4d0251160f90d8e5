//! Reasoning Loop
//!
//! Implements the tool-calling loop: the agent asks the model, runs any tools
//! it requests (through the callback pipeline), feeds the responses back and
//! repeats until the model answers in plain text.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::callback::{
    run_after_callbacks, run_before_callbacks, AfterToolCallback, BeforeToolCallback, ToolContext,
};
use crate::error::{AgentError, Result};
use crate::message::{Message, Role};
use crate::provider::{GenerationOptions, LlmProvider};
use crate::schema::OutputSchema;
use crate::session::{Session, SessionState};
use crate::tool::{Tool, ToolCall, ToolRegistry};

const DEFAULT_INSTRUCTION: &str = "You are a helpful AI assistant. Be concise and accurate.";

/// Declarative agent configuration.
///
/// This is everything that describes an agent except the provider that runs
/// it: name, model, instruction, tools, callbacks and optional structured
/// output.
#[derive(Clone)]
pub struct AgentConfig {
    /// Agent name, unique within an application
    pub name: String,

    /// One-line description shown in agent listings
    pub description: String,

    /// System instruction
    pub instruction: String,

    /// Tools the model may call
    pub tools: ToolRegistry,

    /// Hooks run before each tool call, in order
    pub before_tool_callbacks: Vec<Arc<dyn BeforeToolCallback>>,

    /// Hooks run after each tool call, in order
    pub after_tool_callbacks: Vec<Arc<dyn AfterToolCallback>>,

    /// Schema the final answer must satisfy
    pub output_schema: Option<Arc<dyn OutputSchema>>,

    /// Session state key receiving the final answer
    pub output_key: Option<String>,

    /// Maximum reasoning iterations before giving up
    pub max_iterations: usize,

    /// Generation options (the model identifier lives here)
    pub generation: GenerationOptions,
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("name", &self.name)
            .field("model", &self.generation.model)
            .field("tools", &self.tools)
            .field("before_tool_callbacks", &self.before_tool_callbacks.len())
            .field("after_tool_callbacks", &self.after_tool_callbacks.len())
            .field("output_schema", &self.output_schema.as_ref().map(|s| s.name().to_string()))
            .field("output_key", &self.output_key)
            .finish()
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "assistant".into(),
            description: String::new(),
            instruction: DEFAULT_INSTRUCTION.into(),
            tools: ToolRegistry::new(),
            before_tool_callbacks: Vec::new(),
            after_tool_callbacks: Vec::new(),
            output_schema: None,
            output_key: None,
            max_iterations: 10,
            generation: GenerationOptions::default(),
        }
    }
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        let mut config = Self {
            name: name.into(),
            ..Default::default()
        };
        config.generation.model = model.into();
        config
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn shared_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.register_boxed(tool);
        self
    }

    pub fn before_tool_callback<C: BeforeToolCallback + 'static>(mut self, callback: C) -> Self {
        self.before_tool_callbacks.push(Arc::new(callback));
        self
    }

    pub fn after_tool_callback<C: AfterToolCallback + 'static>(mut self, callback: C) -> Self {
        self.after_tool_callbacks.push(Arc::new(callback));
        self
    }

    pub fn output_schema<S: OutputSchema + 'static>(mut self, schema: S) -> Self {
        self.output_schema = Some(Arc::new(schema));
        self
    }

    pub fn output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Model identifier
    pub fn model(&self) -> &str {
        &self.generation.model
    }

    /// Reject configurations the loop cannot run
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AgentError::Config("Agent name must not be empty".into()));
        }
        if self.generation.model.trim().is_empty() {
            return Err(AgentError::Config(format!("Agent '{}' has no model", self.name)));
        }
        if self.output_schema.is_some() && !self.tools.is_empty() {
            return Err(AgentError::Config(format!(
                "Agent '{}' declares an output schema and cannot use tools",
                self.name
            )));
        }
        if self.max_iterations == 0 {
            return Err(AgentError::Config("max_iterations must be at least 1".into()));
        }
        Ok(())
    }
}

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent, validating its configuration
    pub fn new(provider: Arc<dyn LlmProvider>, config: AgentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { provider, config })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn model(&self) -> &str {
        self.config.model()
    }

    /// Build the full system prompt, including the output schema if any
    pub fn system_prompt(&self) -> String {
        let mut prompt = self.config.instruction.clone();

        if let Some(schema) = &self.config.output_schema {
            let rendered = serde_json::to_string_pretty(&schema.json_schema()).unwrap_or_default();
            prompt.push_str(&format!(
                "\n\nRespond with a single JSON object matching the `{}` schema:\n{}",
                schema.name(),
                rendered
            ));
        }

        prompt
    }

    /// Generation options for one request: configured options plus tool
    /// declarations and response schema
    pub fn generation_options(&self) -> GenerationOptions {
        let mut options = self.config.generation.clone();
        options.tools = self.config.tools.schemas();

        if let Some(schema) = &self.config.output_schema {
            options.response_schema = Some(schema.json_schema());
            options.response_mime_type = Some("application/json".into());
        }

        options
    }

    /// Run the agent over a session whose last message is the user's turn
    pub async fn run(&self, session: &mut Session) -> Result<String> {
        // Ensure system prompt is set
        if session.conversation.messages().first().map(|m| &m.role) != Some(&Role::System) {
            session
                .conversation
                .messages_mut()
                .insert(0, Message::system(self.system_prompt()));
        }

        let options = self.generation_options();

        for iteration in 1..=self.config.max_iterations {
            let completion = self
                .provider
                .complete(session.conversation.messages(), &options)
                .await?;

            let mut calls = completion.tool_calls;

            if calls.is_empty() {
                // No tool call - this is the final response
                session.conversation.push(Message::assistant(&completion.content));
                self.store_output(&completion.content, &mut session.state)?;
                tracing::debug!(agent = %self.config.name, iteration, "Agent finished");
                return Ok(completion.content);
            }

            for call in &mut calls {
                if call.id.is_none() {
                    call.id = Some(uuid::Uuid::new_v4().to_string());
                }
            }

            session
                .conversation
                .push(Message::assistant_with_tool_calls(completion.content, calls.clone()));

            for call in &calls {
                let response = self.dispatch_tool(call, &mut session.state).await;
                session
                    .conversation
                    .push(Message::tool_response(&call.name, call.id.clone(), &response));
            }
        }

        Err(AgentError::MaxIterations(self.config.max_iterations))
    }

    /// Run with a simple string input (creates a throwaway session)
    pub async fn ask(&self, question: &str) -> Result<String> {
        let mut session = Session::new(self.config.name.clone(), "local");
        session.conversation.push(Message::user(question));
        self.run(&mut session).await
    }

    /// Run one tool call through the callback pipeline.
    ///
    /// Always produces a response for the model: a before-callback
    /// short-circuit, the (possibly rewritten) tool response, or an error
    /// object when the tool is unknown or fails.
    pub async fn dispatch_tool(&self, call: &ToolCall, state: &mut SessionState) -> Value {
        let Some(tool) = self.config.tools.get(&call.name) else {
            tracing::warn!(agent = %self.config.name, tool = %call.name, "Model requested unknown tool");
            return json!({ "error": AgentError::ToolNotFound(call.name.clone()).to_string() });
        };

        let schema = tool.schema();
        let call_id = call.id.as_deref();

        {
            let mut ctx = ToolContext::new(&self.config.name, call_id, state);
            if let Some(response) = run_before_callbacks(
                &self.config.before_tool_callbacks,
                &schema,
                &call.arguments,
                &mut ctx,
            ) {
                tracing::info!(agent = %self.config.name, tool = %call.name, "Tool call short-circuited by callback");
                return response;
            }
        }

        tracing::debug!(tool = %call.name, "Executing tool");

        let response = match self.config.tools.execute(call).await {
            Ok(result) => result.into_response(),
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "Tool failed");
                json!({ "error": e.to_string() })
            }
        };

        let mut ctx = ToolContext::new(&self.config.name, call_id, state);
        run_after_callbacks(
            &self.config.after_tool_callbacks,
            &schema,
            &call.arguments,
            &mut ctx,
            response,
        )
    }

    /// Validate the final answer and store it under the output key
    fn store_output(&self, content: &str, state: &mut SessionState) -> Result<()> {
        let value = match &self.config.output_schema {
            Some(schema) => schema.parse(content)?,
            None => Value::String(content.to_string()),
        };

        if let Some(key) = &self.config.output_key {
            state.set(key.clone(), value);
        }

        Ok(())
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.config.tools
    }

    /// Get configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Get the provider
    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }
}
