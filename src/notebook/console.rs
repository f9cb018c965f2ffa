//! Interactive console channel — reads lines from stdin and drives the
//! notebook engine.
//!
//! Plain lines append to the draft; `:commands` do everything else. While
//! a generation is streaming the loop keeps servicing stdin so `:cancel`
//! works mid-stream. Runs until the `shutdown` token is cancelled (Ctrl-C)
//! or stdin is closed.

use std::io::Write as _;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::llm::StreamEvent;
use super::Notebook;

const HELP: &str = "\
Plain text appends to the draft. Commands:
  :gen                  generate a continuation
  :cancel               cancel generation / stop audio
  :retry                regenerate from the last prompt
  :undo                 drop the last generation
  :show                 print the draft
  :clear                clear the draft
  :models               list models on the endpoint
  :model <name>         select a model
  :params               show sampling parameters
  :set <key> <value>    set one sampling parameter
  :preset save|load|delete <name>
  :preset list
  :memory / :lore / :note [text]   set a context field (empty clears)
  :grammar              check grammar
  :fix <n> [m]          apply suggestion m of finding n
  :md                   open markdown preview in the browser
  :say on|off           toggle speech for generated text
  :speak                speak the current draft aloud
  :quit                 save and exit";

pub async fn run(mut notebook: Notebook, shutdown: CancellationToken) -> Result<(), AppError> {
    info!("console channel started");
    println!("─────────────────────────────────");
    println!(" Quillpad console  (:help, Ctrl-C to quit)");
    println!("─────────────────────────────────");
    if !notebook.draft().is_empty() {
        println!("[restored session — :show to view]");
    }

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                println!("\n[shutdown — saving session]");
                info!("console shutting down");
                break;
            }

            line = lines.next_line() => {
                match line {
                    Err(e) => {
                        warn!("console read error: {e}");
                        break;
                    }
                    Ok(None) => {
                        info!("stdin closed");
                        break;
                    }
                    Ok(Some(input)) => {
                        let input = input.trim_end().to_string();
                        if input == ":quit" {
                            break;
                        }
                        if let Err(e) = dispatch(&mut notebook, &input, &mut lines, &shutdown).await {
                            println!("error: {e}");
                        }
                    }
                }
            }
        }
    }

    notebook.save_session()?;
    Ok(())
}

async fn dispatch(
    notebook: &mut Notebook,
    input: &str,
    lines: &mut Lines<BufReader<Stdin>>,
    shutdown: &CancellationToken,
) -> Result<(), AppError> {
    if !input.starts_with(':') {
        if !input.is_empty() {
            notebook.append_line(input);
        }
        return Ok(());
    }

    let (command, rest) = match input.split_once(' ') {
        Some((c, r)) => (c, r.trim()),
        None => (input, ""),
    };

    match command {
        ":help" => println!("{HELP}"),
        ":show" => println!("{}", notebook.draft()),
        ":clear" => notebook.clear_draft()?,

        ":gen" => {
            let rx = notebook.begin_generation().await?;
            pump_stream(notebook, rx, lines, shutdown).await?;
        }
        ":retry" => {
            let rx = notebook.retry().await?;
            pump_stream(notebook, rx, lines, shutdown).await?;
        }
        ":cancel" => notebook.cancel(),
        ":undo" => notebook.undo()?,

        ":models" => {
            for model in notebook.list_models().await? {
                println!("{model}");
            }
        }
        ":model" => {
            if rest.is_empty() {
                println!("{}", notebook.model());
            } else {
                notebook.set_model(rest);
            }
        }
        ":params" => {
            let json = serde_json::to_string_pretty(notebook.params())
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            println!("{json}");
        }
        ":set" => match rest.split_once(' ') {
            Some((key, value)) => notebook.set_param(key.trim(), value.trim())?,
            None => println!("usage: :set <key> <value>"),
        },

        ":preset" => handle_preset(notebook, rest)?,

        ":memory" => notebook.context_mut().memory = rest.to_string(),
        ":lore" => notebook.context_mut().lorebook = rest.to_string(),
        ":note" => notebook.context_mut().author_note = rest.to_string(),

        ":grammar" => {
            let matches = notebook.check_grammar().await?;
            if matches.is_empty() {
                println!("no issues found");
            }
            for (i, m) in matches.iter().enumerate() {
                let suggestions: Vec<&str> =
                    m.replacements.iter().map(|r| r.value.as_str()).collect();
                println!(
                    "[{i}] @{}+{}: {} → {}",
                    m.offset,
                    m.length,
                    m.message,
                    suggestions.join(" | ")
                );
            }
        }
        ":fix" => {
            let mut parts = rest.split_whitespace();
            let index: usize = parts
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| AppError::Grammar("usage: :fix <n> [m]".into()))?;
            let choice: usize = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            let applied = notebook.apply_fix(index, choice)?;
            println!("applied: {applied}");
        }

        ":md" => {
            let path = notebook.preview_markdown()?;
            println!("preview: {}", path.display());
        }

        ":say" => match rest {
            "on" => notebook.set_audio_enabled(true)?,
            "off" => notebook.set_audio_enabled(false)?,
            _ => println!("audio: {}", if notebook.audio_enabled() { "on" } else { "off" }),
        },
        ":speak" => speak(notebook, notebook.draft().to_string()),

        other => println!("unknown command: {other}  (:help for the list)"),
    }
    Ok(())
}

fn handle_preset(notebook: &mut Notebook, rest: &str) -> Result<(), AppError> {
    let (action, name) = match rest.split_once(' ') {
        Some((a, n)) => (a, n.trim()),
        None => (rest, ""),
    };
    match action {
        "save" => notebook.preset_save(name)?,
        "load" => notebook.preset_load(name)?,
        "delete" => {
            if !notebook.preset_delete(name)? {
                println!("no such preset: {name}");
            }
        }
        "list" | "" => {
            for name in notebook.preset_list()? {
                println!("{name}");
            }
        }
        other => println!("unknown preset action: {other}"),
    }
    Ok(())
}

/// Consume the token stream, printing tokens as they arrive while still
/// servicing stdin so `:cancel` interrupts mid-stream.
async fn pump_stream(
    notebook: &mut Notebook,
    mut rx: tokio::sync::mpsc::Receiver<StreamEvent>,
    lines: &mut Lines<BufReader<Stdin>>,
    shutdown: &CancellationToken,
) -> Result<(), AppError> {
    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                notebook.cancel();
                // Drain the rest of the stream so no arrived token is lost.
                while let Some(event) = rx.recv().await {
                    match event {
                        StreamEvent::Token(token) => notebook.apply_token(&token),
                        StreamEvent::Finished(_) | StreamEvent::Failed(_) => break,
                    }
                }
                println!();
                notebook.finish_generation(crate::llm::StopReason::Cancelled)?;
                return Ok(());
            }

            line = lines.next_line() => {
                match line {
                    Ok(Some(input)) if input.trim() == ":cancel" => notebook.cancel(),
                    Ok(Some(_)) => println!("[generating — :cancel to interrupt]"),
                    _ => notebook.cancel(),
                }
            }

            event = rx.recv() => {
                match event {
                    Some(StreamEvent::Token(token)) => {
                        print!("{token}");
                        let _ = std::io::stdout().flush();
                        notebook.apply_token(&token);
                    }
                    Some(StreamEvent::Finished(reason)) => {
                        println!();
                        debug!(?reason, "stream closed");
                        if let Some(text) = notebook.finish_generation(reason)? {
                            speak(notebook, text);
                        }
                        return Ok(());
                    }
                    Some(StreamEvent::Failed(e)) => {
                        println!();
                        notebook.finish_generation(crate::llm::StopReason::Done)?;
                        return Err(e.into());
                    }
                    None => {
                        println!();
                        notebook.finish_generation(crate::llm::StopReason::Done)?;
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Fire-and-forget speech so the console stays responsive; `:cancel`
/// reaches the shared stop flag through the engine.
fn speak(notebook: &Notebook, text: String) {
    let Some(voice) = notebook.voice() else {
        println!("tts is not enabled in config");
        return;
    };
    let voice = voice.clone();
    tokio::spawn(async move {
        if let Err(e) = voice.speak(&text).await {
            warn!(error = %e, "speech failed");
        }
    });
}
