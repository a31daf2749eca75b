//! `chainloom chat`: single-message or interactive chat with the demo agent.

use std::sync::Arc;
use chainloom::KeywordReasoner;
use chainloom_agent::Agent;
use chainloom_config::AppConfig;
use chainloom_core::event::EventBus;
use chainloom_core::session::SessionStore;
use chainloom_memory::InMemorySessionStore;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

pub async fn run(config: &AppConfig, session: &str, message: Option<String>) -> anyhow::Result<()> {
    let tools = Arc::new(chainloom_tools::default_registry()?);
    let tool_names = tools.names().join(", ");
    let bus = Arc::new(EventBus::default());
    let agent = Agent::from_config(Arc::new(KeywordReasoner), tools, config)?
        .with_event_bus(bus.clone());
    let store = InMemorySessionStore::new();

    let mut events = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => debug!(kind = event.kind(), session_id = event.session_id(), "Domain event"),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Event subscriber lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    if let Some(message) = message {
        let outcome = agent.invoke(&store, session, &message).await?;
        println!("{}", outcome.output);
        return Ok(());
    }

    println!();
    println!("  Chainloom agent (offline keyword reasoner)");
    println!("  Session: {session}");
    println!("  Tools:   {tool_names}");
    println!("  Commands: /history, /clear, exit");
    println!();

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"  You > ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "exit" | "quit" => break,
            "/history" => {
                let conversation = store.get(session).await.snapshot().await;
                println!("{}", conversation.transcript());
            }
            "/clear" => {
                store.clear(session).await?;
                println!("  (history cleared)");
            }
            input => match agent.invoke(&store, session, input).await {
                Ok(outcome) => println!("  AI  > {}", outcome.output),
                Err(e) => eprintln!("  error: {e}"),
            },
        }
    }

    Ok(())
}
