//! Research Report Output
//!
//! JSON schema and typed output schema for the structured lesson 5 agent,
//! plus Markdown rendering of a validated report.

use agent_core::TypedSchema;
use serde_json::{json, Value};

use crate::model::{ResearchReport, MAX_REPORT_ITEMS, MIN_HEADLINE_CHARS, MIN_REPORT_ITEMS};

pub const REPORT_SCHEMA_NAME: &str = "ResearchReport";

/// JSON schema describing [`ResearchReport`]
pub fn report_json_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "title": {
                "type": "string",
                "description": "Title of the research report"
            },
            "items": {
                "type": "array",
                "minItems": MIN_REPORT_ITEMS,
                "maxItems": MAX_REPORT_ITEMS,
                "items": {
                    "type": "object",
                    "properties": {
                        "headline": {
                            "type": "string",
                            "minLength": MIN_HEADLINE_CHARS,
                            "description": "News headline"
                        },
                        "company": {
                            "type": "string",
                            "description": "Company the story is about"
                        },
                        "ticker": {
                            "type": "string",
                            "nullable": true,
                            "description": "Stock ticker, if the company is listed"
                        },
                        "market_data": {
                            "type": "string",
                            "description": "Price and daily change, or a not-available note"
                        },
                        "summary": {
                            "type": "string",
                            "description": "Two or three sentence summary"
                        },
                        "sources": {
                            "type": "array",
                            "minItems": 1,
                            "items": {"type": "string"},
                            "description": "Absolute URLs backing the story"
                        }
                    },
                    "required": ["headline", "company", "market_data", "summary", "sources"]
                }
            },
            "process_log": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Steps taken, most recent first"
            }
        },
        "required": ["title", "items"]
    })
}

/// Typed output schema attached to the structured agent
pub fn report_schema() -> TypedSchema<ResearchReport> {
    TypedSchema::new(REPORT_SCHEMA_NAME, report_json_schema())
}

/// Render a report as Markdown
pub fn render_markdown(report: &ResearchReport) -> String {
    let mut md = format!("# {}\n", report.title.trim());

    for (idx, item) in report.items.iter().enumerate() {
        md.push_str(&format!("\n## {}. {}\n\n", idx + 1, item.headline.trim()));

        match &item.ticker {
            Some(ticker) => md.push_str(&format!("**Company:** {} ({ticker})\n\n", item.company)),
            None => md.push_str(&format!("**Company:** {}\n\n", item.company)),
        }
        md.push_str(&format!("**Market data:** {}\n\n", item.market_data));
        md.push_str(&format!("{}\n\n", item.summary.trim()));

        md.push_str("**Sources:**\n");
        for source in &item.sources {
            md.push_str(&format!("- <{source}>\n"));
        }
    }

    if !report.process_log.is_empty() {
        md.push_str("\n## Process log\n\n");
        for entry in &report.process_log {
            md.push_str(&format!("- {entry}\n"));
        }
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewsItem;
    use agent_core::{AgentError, OutputSchema};

    fn item(n: usize, ticker: Option<&str>) -> Value {
        json!({
            "headline": format!("Headline number {n}"),
            "company": "Nvidia",
            "ticker": ticker,
            "market_data": "$189.20 (+1.25%)",
            "summary": "A summary.",
            "sources": [format!("https://www.reuters.com/{n}")]
        })
    }

    #[test]
    fn test_schema_parses_and_normalizes() {
        let body = json!({
            "title": "AI Weekly",
            "items": [item(1, Some("NVDA")), item(2, None), item(3, None)]
        });
        let text = format!("```json\n{body}\n```");

        let value = report_schema().parse(&text).unwrap();
        assert_eq!(value["process_log"], json!([]));
        assert_eq!(value["items"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_schema_rejects_too_few_items() {
        let body = json!({"title": "t", "items": [item(1, None), item(2, None)]});
        let err = report_schema().parse(&body.to_string()).unwrap_err();
        assert!(matches!(
            err,
            AgentError::SchemaValidation { ref schema, .. } if schema == REPORT_SCHEMA_NAME
        ));
    }

    #[test]
    fn test_json_schema_bounds() {
        let schema = report_json_schema();
        assert_eq!(schema["properties"]["items"]["minItems"], 3);
        assert_eq!(schema["properties"]["items"]["maxItems"], 10);
        assert_eq!(schema["properties"]["items"]["items"]["properties"]["sources"]["minItems"], 1);
    }

    #[test]
    fn test_render_markdown() {
        let report = ResearchReport {
            title: "AI Weekly".into(),
            items: vec![NewsItem {
                headline: "Nvidia ships a new chip".into(),
                company: "Nvidia".into(),
                ticker: Some("NVDA".into()),
                market_data: "$189.20 (+1.25%)".into(),
                summary: "Faster training.".into(),
                sources: vec!["https://www.reuters.com/x".into()],
            }],
            process_log: vec!["Action: Sourced news from: www.reuters.com.".into()],
        };

        let md = render_markdown(&report);
        assert!(md.starts_with("# AI Weekly\n"));
        assert!(md.contains("## 1. Nvidia ships a new chip"));
        assert!(md.contains("**Company:** Nvidia (NVDA)"));
        assert!(md.contains("- <https://www.reuters.com/x>"));
        assert!(md.ends_with("- Action: Sourced news from: www.reuters.com.\n"));
    }
}
