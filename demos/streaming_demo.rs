//! Streaming Demo: Paced reveal of a bursty token stream.
//!
//! A fake transport thread pushes an answer in bursts of 1-40 characters
//! at irregular intervals. The reveal actor smooths that into a steady
//! word-by-word reveal, and the fenced code block pops in whole.
//!
//! Pass `fast` or `off` as the first argument to change the pacing preset.
//! Set `RUST_LOG=reveal=debug` to watch batches being scheduled.

use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use crossterm::{execute, queue};
use reveal::{
    AnimationSpeed, Fragment, MessageId, MessageStatus, RevealActor, RevealConfig, RevealEvent,
    StreamCommand, StructuralFields,
};
use std::io::{self, Write};
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Sample text to stream (simulating an LLM response).
const SAMPLE_TEXT: &str = r#"Here is how the reveal engine keeps streaming answers readable.

Tokens arrive in bursts: sometimes one word, sometimes a whole sentence at once. Instead of dumping each burst on screen, the engine spreads every new batch of words over a fixed time budget, and caps how long any single word may wait.

```rust
fn per_part_time(stack: Duration, max_word: Duration, batch: u32) -> Duration {
    max_word.min(stack / batch)
}
```

Code blocks like the one above are held back until the closing fence arrives, then shown in one piece, so the renderer never sees half a block.
"#;

fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let speed = match std::env::args().nth(1).as_deref() {
        Some("fast") => AnimationSpeed::Fast,
        Some("off") => AnimationSpeed::Disabled,
        _ => AnimationSpeed::Normal,
    };

    let actor = RevealActor::spawn(RevealConfig::preset(speed));
    let id = MessageId::from("demo-answer");
    actor.open(id.clone()).map_err(io::Error::other)?;

    let transport = spawn_transport(&actor, id.clone());
    let started = Instant::now();
    let mut stdout = io::stdout();
    let mut shown = 0;

    while let Ok(event) = actor.events().recv() {
        match event {
            RevealEvent::FieldsChanged { fields, .. } => {
                if let Some(header) = fields.header {
                    queue!(
                        stdout,
                        SetAttribute(Attribute::Bold),
                        SetForegroundColor(Color::Cyan),
                        Print(format!("== {header} ==\n")),
                        ResetColor,
                        SetAttribute(Attribute::Reset),
                    )?;
                }
                if let Some(status) = fields.status {
                    queue!(
                        stdout,
                        SetForegroundColor(Color::DarkGrey),
                        Print(format!("[{status:?}]\n")),
                        ResetColor,
                    )?;
                }
            }
            RevealEvent::Revealed { visible_text, .. } => {
                // Visible text only ever grows; print the new tail.
                queue!(stdout, Print(&visible_text[shown..]))?;
                shown = visible_text.len();
            }
            RevealEvent::Completed { .. } => {
                execute!(
                    stdout,
                    SetForegroundColor(Color::Green),
                    Print(format!("\nDone in {:.2?}\n", started.elapsed())),
                    ResetColor,
                )?;
                break;
            }
        }
        stdout.flush()?;
    }

    let _ = transport.join();
    actor.join();
    Ok(())
}

/// Push the sample text in irregular bursts, like a model would.
fn spawn_transport(actor: &RevealActor, id: MessageId) -> thread::JoinHandle<()> {
    let fragments = burst_fragments(SAMPLE_TEXT);
    let commands = actor.commands();

    thread::spawn(move || {
        let header = StructuralFields::default()
            .with_header("Assistant")
            .with_status(MessageStatus::Loading);
        let _ = commands.send(StreamCommand::Ingest {
            id: id.clone(),
            fragment: Fragment::fields(header),
        });

        for (i, delta) in fragments.into_iter().enumerate() {
            let fragment = Fragment::text(delta);
            if commands.send(StreamCommand::Ingest { id: id.clone(), fragment }).is_err() {
                return;
            }
            // Pseudo-random 5-120ms gaps
            thread::sleep(Duration::from_millis(5 + ((i * 37) % 116) as u64));
        }

        let _ = commands.send(StreamCommand::EndStream {
            id,
            final_fields: Some(StructuralFields::default().with_status(MessageStatus::Success)),
        });
    })
}

/// Cut `text` into pseudo-random bursts of 1-40 characters.
fn burst_fragments(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut fragments = Vec::new();
    let mut index = 0;
    while index < chars.len() {
        let size = ((index * 13) % 40) + 1;
        let end = (index + size).min(chars.len());
        fragments.push(chars[index..end].iter().collect());
        index = end;
    }
    fragments
}
