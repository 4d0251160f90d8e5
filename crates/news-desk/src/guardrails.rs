//! Search Guardrails
//!
//! Two tool callbacks for the lesson 4 agent:
//!
//! - [`filter_news_sources`] runs before `google_search` and refuses queries
//!   aimed at user-generated or encyclopedic sites.
//! - [`inject_process_log`] runs after `google_search`, records which domains
//!   the results came from and returns the running log alongside the results.
//!
//! Both only look at `google_search`; every other tool passes through.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use agent_core::{ToolArgs, ToolContext, ToolSchema};
use regex::Regex;
use serde_json::{json, Value};

/// Domains the search tool may not target
pub const BLOCKED_DOMAINS: [&str; 6] = [
    "wikipedia.org",
    "reddit.com",
    "youtube.com",
    "medium.com",
    "investopedia.com",
    "quora.com",
];

/// Tool both callbacks apply to
pub const SEARCH_TOOL: &str = "google_search";

/// Session state key of the process log
pub const PROCESS_LOG_KEY: &str = "process_log";

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[^\s/]+").expect("URL pattern is a valid regex")
});

/// First denylisted domain the query targets, by `site:` qualifier or by
/// the domain's leading label (`reddit` for `reddit.com`)
pub fn blocked_domain(query: &str) -> Option<&'static str> {
    let query = query.to_lowercase();
    BLOCKED_DOMAINS.iter().copied().find(|domain| {
        let label = domain.split('.').next().unwrap_or(domain);
        query.contains(&format!("site:{domain}")) || query.contains(label)
    })
}

/// Before-callback: block searches that target a denylisted domain
pub fn filter_news_sources(
    tool: &ToolSchema,
    args: &ToolArgs,
    ctx: &mut ToolContext<'_>,
) -> Option<Value> {
    if tool.name != SEARCH_TOOL {
        return None;
    }

    let query = args.get("query").and_then(Value::as_str).unwrap_or_default();
    let domain = blocked_domain(query)?;

    tracing::info!(agent = ctx.agent_name, query, domain, "Blocked search query");
    Some(json!({
        "error": "blocked_source",
        "reason": format!("Searches targeting {domain} are not allowed. Use professional news sources."),
    }))
}

/// Distinct network locations of every URL in `text`, sorted.
///
/// The location is taken verbatim: case, ports and non-ASCII hosts are kept.
pub fn extract_source_domains(text: &str) -> Vec<String> {
    URL_PATTERN
        .find_iter(text)
        .filter_map(|m| m.as_str().split_once("://"))
        .map(|(_, rest)| {
            let end = rest.find(['?', '#']).unwrap_or(rest.len());
            rest[..end].to_string()
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Raw search payload: `search_results`, else `results`, else empty. A
/// response that is not an object is the payload itself.
fn raw_results(response: &Value) -> Value {
    match response {
        Value::Object(map) => ["search_results", "results"]
            .iter()
            .filter_map(|key| map.get(*key))
            .find(|v| is_truthy(v))
            .cloned()
            .unwrap_or_else(|| Value::String(String::new())),
        other => other.clone(),
    }
}

/// After-callback: prepend the sourced domains to the session's process log
pub fn inject_process_log(
    tool: &ToolSchema,
    _args: &ToolArgs,
    ctx: &mut ToolContext<'_>,
    response: &Value,
) -> Option<Value> {
    if tool.name != SEARCH_TOOL {
        return None;
    }

    // Only textual payloads are scanned for URLs
    let (raw, domains) = match raw_results(response) {
        Value::String(text) => {
            let domains = extract_source_domains(&text);
            (text, domains)
        }
        other => (other.to_string(), Vec::new()),
    };

    let mut log = ctx.state.get_string_list(PROCESS_LOG_KEY);
    if !domains.is_empty() {
        log.insert(0, format!("Action: Sourced news from: {}.", domains.join(", ")));
        ctx.state.set(PROCESS_LOG_KEY, json!(log));
        tracing::debug!(agent = ctx.agent_name, domains = ?domains, "Process log updated");
    }

    Some(json!({
        "search_results": raw,
        "process_log": log,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::SessionState;

    fn schema(name: &str) -> ToolSchema {
        ToolSchema {
            name: name.into(),
            description: String::new(),
            parameters: Vec::new(),
            category: None,
            has_side_effects: false,
        }
    }

    fn query(q: &str) -> ToolArgs {
        let mut args = ToolArgs::new();
        args.insert("query".into(), json!(q));
        args
    }

    #[test]
    fn test_blocked_domain_matches_site_and_label() {
        assert_eq!(blocked_domain("AI news site:Reddit.com"), Some("reddit.com"));
        assert_eq!(blocked_domain("wikipedia large language model"), Some("wikipedia.org"));
        assert_eq!(blocked_domain("youtube keynote"), Some("youtube.com"));
        assert_eq!(blocked_domain("latest AI chip news reuters"), None);
    }

    #[test]
    fn test_filter_blocks_with_fixed_reason() {
        let mut state = SessionState::new();
        let mut ctx = ToolContext::new("agent", None, &mut state);

        let out = filter_news_sources(&schema(SEARCH_TOOL), &query("AI trends site:quora.com"), &mut ctx)
            .unwrap();
        assert_eq!(
            out,
            json!({
                "error": "blocked_source",
                "reason": "Searches targeting quora.com are not allowed. Use professional news sources."
            })
        );
    }

    #[test]
    fn test_filter_ignores_other_tools_and_clean_queries() {
        let mut state = SessionState::new();
        let mut ctx = ToolContext::new("agent", None, &mut state);

        assert!(filter_news_sources(&schema("get_financial_context"), &query("reddit"), &mut ctx).is_none());
        assert!(filter_news_sources(&schema(SEARCH_TOOL), &query("AI news today"), &mut ctx).is_none());
        assert!(filter_news_sources(&schema(SEARCH_TOOL), &ToolArgs::new(), &mut ctx).is_none());
    }

    #[test]
    fn test_extract_source_domains_sorted_unique() {
        let text = "See https://www.reuters.com/a and http://apnews.com/b, \
                    again https://www.reuters.com/c plus http://localhost:8080/x";
        assert_eq!(
            extract_source_domains(text),
            vec!["apnews.com", "localhost:8080", "www.reuters.com"]
        );
        assert!(extract_source_domains("no links here").is_empty());
    }

    #[test]
    fn test_source_domains_are_taken_verbatim() {
        let text = "https://WWW.Reuters.COM/a https://news.example.com:443/b \
                    https://bücher.de/c https://www.ft.com?x=1 https://www.ft.com#top";
        assert_eq!(
            extract_source_domains(text),
            vec!["WWW.Reuters.COM", "bücher.de", "news.example.com:443", "www.ft.com"]
        );
    }

    #[test]
    fn test_process_log_most_recent_first() {
        let mut state = SessionState::new();

        for url in ["https://a.com/1", "https://b.com/2"] {
            let mut ctx = ToolContext::new("agent", None, &mut state);
            inject_process_log(
                &schema(SEARCH_TOOL),
                &query("ai"),
                &mut ctx,
                &json!({"search_results": format!("story {url}")}),
            );
        }

        assert_eq!(
            state.get_string_list(PROCESS_LOG_KEY),
            vec![
                "Action: Sourced news from: b.com.".to_string(),
                "Action: Sourced news from: a.com.".to_string(),
            ]
        );
    }

    #[test]
    fn test_inject_returns_results_and_log() {
        let mut state = SessionState::new();
        let mut ctx = ToolContext::new("agent", None, &mut state);

        let out = inject_process_log(
            &schema(SEARCH_TOOL),
            &query("ai"),
            &mut ctx,
            &json!({"results": "https://x.org/1 https://y.org/2"}),
        )
        .unwrap();

        assert_eq!(out["search_results"], "https://x.org/1 https://y.org/2");
        assert_eq!(out["process_log"], json!(["Action: Sourced news from: x.org, y.org."]));
    }

    #[test]
    fn test_inject_without_urls_leaves_log_untouched() {
        let mut state = SessionState::new();
        let mut ctx = ToolContext::new("agent", None, &mut state);

        let out = inject_process_log(&schema(SEARCH_TOOL), &query("ai"), &mut ctx, &json!("plain text"))
            .unwrap();

        assert_eq!(out, json!({"search_results": "plain text", "process_log": []}));
        assert!(state.get(PROCESS_LOG_KEY).is_none());
    }

    #[test]
    fn test_inject_passes_other_tools_through() {
        let mut state = SessionState::new();
        let mut ctx = ToolContext::new("agent", None, &mut state);

        let out = inject_process_log(&schema("get_financial_context"), &ToolArgs::new(), &mut ctx, &json!({}));
        assert!(out.is_none());
    }

    #[test]
    fn test_raw_results_prefers_truthy_keys() {
        assert_eq!(raw_results(&json!({"search_results": "", "results": "r"})), json!("r"));
        assert_eq!(raw_results(&json!({"error": "x"})), json!(""));
        assert_eq!(raw_results(&json!({"search_results": ["a"]})), json!(["a"]));
    }

    #[test]
    fn test_non_text_payload_is_stringified_but_not_scanned() {
        let mut state = SessionState::new();
        let mut ctx = ToolContext::new("agent", None, &mut state);

        let out = inject_process_log(
            &schema(SEARCH_TOOL),
            &query("ai"),
            &mut ctx,
            &json!({"search_results": ["https://a.com/x"]}),
        )
        .unwrap();

        assert_eq!(out["search_results"], r#"["https://a.com/x"]"#);
        assert_eq!(out["process_log"], json!([]));
    }
}
