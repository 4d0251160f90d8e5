//! Lesson 6 streaming driver
//!
//! Opens a live session on the lesson 6 agent, sends one prompt and prints
//! the reply as it streams in.
//!
//! ```text
//! cargo run -p agent-server --bin live-demo -- "Give me 3 recent AI headlines"
//! ```

use std::io::Write;
use std::sync::Arc;

use futures::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use agent_core::{
    live::SessionResumptionConfig, Agent, InMemoryRunner, LiveRequestQueue, Message, Modality,
    RunConfig,
};
use agent_runtime::{GeminiLiveConnector, GeminiProvider};
use news_desk::LessonKit;

const APP_NAME: &str = "Lesson6 Streaming Demo";
const USER_ID: &str = "demo-user";
const DEFAULT_PROMPT: &str = "Give me 2 recent AI headlines";

/// Log filter from `RUST_LOG`; read after `.env` is loaded
fn env_filter() -> EnvFilter {
    EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries the streamed answer
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let prompt = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_PROMPT.into());

    let gemini = Arc::new(GeminiProvider::from_env()?);
    let kit = if std::env::var("NEWS_DESK_OFFLINE").is_ok_and(|v| v == "1" || v == "true") {
        LessonKit::offline()
    } else {
        LessonKit::gemini(gemini.clone())?
    };

    let agent = Agent::new(gemini, kit.lesson6())?;
    let runner = InMemoryRunner::new(APP_NAME, agent)
        .with_live_connector(Arc::new(GeminiLiveConnector::from_env()));
    let session = runner.create_session(USER_ID)?;

    let run_config = RunConfig {
        response_modalities: vec![Modality::Text],
        session_resumption: Some(SessionResumptionConfig::default()),
    };
    let (queue, requests) = LiveRequestQueue::channel();
    let mut events = runner.run_live(&session, requests, run_config).await?;

    queue.send_content(Message::user(prompt))?;

    let mut stdout = std::io::stdout();
    while let Some(event) = events.next().await {
        let event = event?;
        if event.is_final() {
            break;
        }
        if let Some(text) = event.text() {
            print!("{text}");
            stdout.flush()?;
        }
    }
    println!();

    queue.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_reads_dotenv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "RUST_LOG=news_desk=trace\n").unwrap();

        dotenvy::from_path_override(&path).unwrap();

        assert_eq!(env_filter().to_string(), "news_desk=trace");
    }
}
