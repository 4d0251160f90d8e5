//! Tool Callbacks
//!
//! Hooks that run around every tool call an agent makes.
//!
//! - A [`BeforeToolCallback`] sees the tool, its arguments and the session
//!   state. Returning `Some(response)` skips the tool entirely and hands
//!   `response` to the model instead.
//! - An [`AfterToolCallback`] additionally sees the tool's response.
//!   Returning `Some(response)` replaces it. After-callbacks only run when
//!   the tool actually ran, so a short-circuit response reaches the model
//!   untouched.
//!
//! Callbacks are kept as ordered lists. They run in registration order and
//! the first one returning `Some` wins; later callbacks are not consulted.
//!
//! ```rust,ignore
//! fn block_everything(
//!     tool: &ToolSchema,
//!     _args: &ToolArgs,
//!     _ctx: &mut ToolContext<'_>,
//! ) -> Option<serde_json::Value> {
//!     Some(serde_json::json!({"error": format!("{} is disabled", tool.name)}))
//! }
//!
//! let config = AgentConfig::new("guarded", "gemini-2.0-flash")
//!     .before_tool_callback(block_everything);
//! ```

use std::sync::Arc;

use serde_json::Value;

use crate::session::SessionState;
use crate::tool::{ToolArgs, ToolSchema};

/// Per-call context handed to callbacks
pub struct ToolContext<'a> {
    /// Name of the agent making the call
    pub agent_name: &'a str,

    /// Call ID assigned by the model or the loop
    pub call_id: Option<&'a str>,

    /// Session state, shared across all calls in the session
    pub state: &'a mut SessionState,
}

impl<'a> ToolContext<'a> {
    pub fn new(agent_name: &'a str, call_id: Option<&'a str>, state: &'a mut SessionState) -> Self {
        Self {
            agent_name,
            call_id,
            state,
        }
    }
}

/// Hook invoked before a tool runs
pub trait BeforeToolCallback: Send + Sync {
    fn before_tool(
        &self,
        tool: &ToolSchema,
        args: &ToolArgs,
        ctx: &mut ToolContext<'_>,
    ) -> Option<Value>;
}

impl<F> BeforeToolCallback for F
where
    F: Fn(&ToolSchema, &ToolArgs, &mut ToolContext<'_>) -> Option<Value> + Send + Sync,
{
    fn before_tool(
        &self,
        tool: &ToolSchema,
        args: &ToolArgs,
        ctx: &mut ToolContext<'_>,
    ) -> Option<Value> {
        self(tool, args, ctx)
    }
}

/// Hook invoked after a tool runs
pub trait AfterToolCallback: Send + Sync {
    fn after_tool(
        &self,
        tool: &ToolSchema,
        args: &ToolArgs,
        ctx: &mut ToolContext<'_>,
        response: &Value,
    ) -> Option<Value>;
}

impl<F> AfterToolCallback for F
where
    F: Fn(&ToolSchema, &ToolArgs, &mut ToolContext<'_>, &Value) -> Option<Value> + Send + Sync,
{
    fn after_tool(
        &self,
        tool: &ToolSchema,
        args: &ToolArgs,
        ctx: &mut ToolContext<'_>,
        response: &Value,
    ) -> Option<Value> {
        self(tool, args, ctx, response)
    }
}

/// Run before-callbacks in order; the first `Some` short-circuits the call
pub fn run_before_callbacks(
    callbacks: &[Arc<dyn BeforeToolCallback>],
    tool: &ToolSchema,
    args: &ToolArgs,
    ctx: &mut ToolContext<'_>,
) -> Option<Value> {
    callbacks
        .iter()
        .find_map(|cb| cb.before_tool(tool, args, ctx))
}

/// Run after-callbacks in order; the first `Some` replaces `response`
pub fn run_after_callbacks(
    callbacks: &[Arc<dyn AfterToolCallback>],
    tool: &ToolSchema,
    args: &ToolArgs,
    ctx: &mut ToolContext<'_>,
    response: Value,
) -> Value {
    callbacks
        .iter()
        .find_map(|cb| cb.after_tool(tool, args, ctx, &response))
        .unwrap_or(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn schema(name: &str) -> ToolSchema {
        ToolSchema {
            name: name.into(),
            description: String::new(),
            parameters: Vec::new(),
            category: None,
            has_side_effects: false,
        }
    }

    fn no_opinion(_: &ToolSchema, _: &ToolArgs, _: &mut ToolContext<'_>) -> Option<Value> {
        None
    }

    fn block_by_name(tool: &ToolSchema, _: &ToolArgs, _: &mut ToolContext<'_>) -> Option<Value> {
        Some(json!({"blocked": tool.name}))
    }

    struct CountingBlock(AtomicUsize);

    impl BeforeToolCallback for CountingBlock {
        fn before_tool(&self, _: &ToolSchema, _: &ToolArgs, _: &mut ToolContext<'_>) -> Option<Value> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Some(json!({"blocked": "late"}))
        }
    }

    fn mark_seen(_: &ToolSchema, _: &ToolArgs, ctx: &mut ToolContext<'_>, _: &Value) -> Option<Value> {
        ctx.state.set("seen", true);
        None
    }

    fn wrap(_: &ToolSchema, _: &ToolArgs, _: &mut ToolContext<'_>, response: &Value) -> Option<Value> {
        Some(json!({"wrapped": response}))
    }

    #[test]
    fn test_before_callbacks_first_some_wins() {
        let late = Arc::new(CountingBlock(AtomicUsize::new(0)));
        let callbacks: Vec<Arc<dyn BeforeToolCallback>> =
            vec![Arc::new(no_opinion), Arc::new(block_by_name), late.clone()];

        let mut state = SessionState::new();
        let mut ctx = ToolContext::new("agent", None, &mut state);
        let out = run_before_callbacks(&callbacks, &schema("search"), &ToolArgs::new(), &mut ctx);

        assert_eq!(out, Some(json!({"blocked": "search"})));
        assert_eq!(late.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_before_callbacks_none_when_all_abstain() {
        let callbacks: Vec<Arc<dyn BeforeToolCallback>> = vec![Arc::new(no_opinion)];

        let mut state = SessionState::new();
        let mut ctx = ToolContext::new("agent", None, &mut state);
        assert!(run_before_callbacks(&callbacks, &schema("x"), &ToolArgs::new(), &mut ctx).is_none());
    }

    #[test]
    fn test_after_callbacks_pass_through_when_none() {
        let callbacks: Vec<Arc<dyn AfterToolCallback>> = vec![Arc::new(mark_seen)];

        let mut state = SessionState::new();
        let mut ctx = ToolContext::new("agent", Some("c1"), &mut state);
        let out = run_after_callbacks(
            &callbacks,
            &schema("search"),
            &ToolArgs::new(),
            &mut ctx,
            json!({"result": "x"}),
        );

        assert_eq!(out, json!({"result": "x"}));
        assert_eq!(state.get("seen"), Some(&json!(true)));
    }

    #[test]
    fn test_after_callback_rewrites_response() {
        let callbacks: Vec<Arc<dyn AfterToolCallback>> = vec![Arc::new(mark_seen), Arc::new(wrap)];

        let mut state = SessionState::new();
        let mut ctx = ToolContext::new("agent", None, &mut state);
        let out = run_after_callbacks(
            &callbacks,
            &schema("search"),
            &ToolArgs::new(),
            &mut ctx,
            json!(1),
        );

        assert_eq!(out, json!({"wrapped": 1}));
    }
}
