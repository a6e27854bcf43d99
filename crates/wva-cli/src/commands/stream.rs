//! Stream command - print pushed events until interrupted

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use wva_client::stream::Listener;
use wva_client::{ConnectionState, StreamEvent, Wva};

use crate::output::{format_json_value, OutputContext, OutputFormat};

/// Enable the event stream and print every event until Ctrl+C
pub async fn stream(wva: &Wva, ctx: &OutputContext) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let forward: Listener = Arc::new(move |event: &StreamEvent| -> anyhow::Result<()> {
        tx.send(event.clone())?;
        Ok(())
    });

    let events = wva.event_stream();
    events.add_event_listener(forward.clone());
    events.enable();

    ctx.info(&format!("Streaming events from {}...", wva.hostname()));
    ctx.info("Press Ctrl+C to stop");

    let mut last_state = ConnectionState::Disabled;
    while running.load(Ordering::SeqCst) {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => print_event(&event, ctx),
                None => break,
            },
            _ = tokio::time::sleep(Duration::from_millis(100)) => {
                let state = events.status();
                if state != last_state {
                    tracing::debug!(%state, "Event stream state");
                    last_state = state;
                }
            }
        }
    }

    ctx.info("\nStopping event stream...");
    events.disable().await;
    events.remove_event_listener(&forward);
    ctx.success("Event stream disabled");

    Ok(())
}

fn print_event(event: &StreamEvent, ctx: &OutputContext) {
    match ctx.format {
        OutputFormat::Table => println!("{}", event_line(event)),
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string(event) {
                println!("{}", json);
            }
        }
    }
}

/// One-line summary: `[seq] short_name: element=value ...`
fn event_line(event: &StreamEvent) -> String {
    let Some(data) = event.data() else {
        return serde_json::to_string(event).unwrap_or_default();
    };

    let values: Vec<String> = data
        .iter()
        .filter_map(|(key, item)| {
            item.get("value")
                .map(|v| format!("{}={}", key, format_json_value(v)))
        })
        .collect();

    format!(
        "[{}] {}: {}",
        event
            .sequence()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string()),
        event.short_name().unwrap_or("?"),
        values.join(" ")
    )
}
