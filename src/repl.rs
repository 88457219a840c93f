//! Terminal chat — stdin/stdout REPL, either against an in-process session or
//! a remote server through the sync coordinator.

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt, stream};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::dialogue::{BotTurn, ConversationSession, DialogueEngine, ExpectedInput};
use crate::error::SyncError;
use crate::model::{ChatId, MessageId, Role};
use crate::sync::{MessageSyncCoordinator, SyncManager};

type LineStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Non-empty trimmed lines from stdin, ending at EOF.
fn stdin_lines() -> LineStream {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    tokio::spawn(async move {
        let reader = BufReader::new(tokio::io::stdin());
        let mut lines = reader.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        eprint!("> ");
                        continue;
                    }
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break, // EOF
                Err(e) => {
                    tracing::error!("Error reading stdin: {}", e);
                    break;
                }
            }
        }
    });

    Box::pin(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|line| (line, rx))
    }))
}

/// A turn as printed in the terminal.
pub fn format_turn(turn: &BotTurn) -> String {
    match turn.expected {
        ExpectedInput::YesNo => format!("{} [{}]", turn.prompt, turn.options.join(" / ")),
        _ => turn.render(),
    }
}

/// Chat with an in-process session. No server or database involved.
pub async fn run_local(engine: Arc<DialogueEngine>) -> anyhow::Result<()> {
    let mut session = ConversationSession::new(ChatId(0), engine);
    if let Some(welcome) = session.history().first() {
        println!("\n{}\n", welcome.content);
    }
    eprint!("> ");

    let mut lines = stdin_lines();
    while let Some(line) = lines.next().await {
        match line.as_str() {
            "/quit" => break,
            "/state" => eprintln!("state: {}", session.current_state()),
            "/records" => {
                for record in session.records() {
                    eprintln!(
                        "{} @ {}",
                        record.name.as_deref().unwrap_or("-"),
                        record.slot.as_deref().unwrap_or("-")
                    );
                }
            }
            input => {
                for turn in session.respond(input) {
                    println!("\n{}", format_turn(&turn));
                }
                println!();
                if session.is_finished() {
                    eprintln!("(conversation finished, /quit to exit)");
                }
            }
        }
        eprint!("> ");
    }
    Ok(())
}

/// Prints confirmed bot messages the terminal hasn't shown yet.
struct Transcript {
    printed: HashSet<MessageId>,
}

impl Transcript {
    fn new() -> Self {
        Self {
            printed: HashSet::new(),
        }
    }

    async fn catch_up(&mut self, coordinator: &MessageSyncCoordinator) {
        for message in coordinator.messages().await {
            if message.is_optimistic() || !self.printed.insert(message.id) {
                continue;
            }
            if message.role == Role::Bot {
                println!("\n{}\n", message.content);
            }
        }
    }
}

/// Chat with a remote server. Opens `chat_id`, or a new chat when `None`.
pub async fn run_remote(manager: SyncManager, chat_id: Option<ChatId>) -> anyhow::Result<()> {
    let chat_id = match chat_id {
        Some(id) => id,
        None => manager.create_chat().await?.id,
    };
    let mut coordinator = manager.open(chat_id).await?;
    let mut transcript = Transcript::new();
    eprintln!("   Chat {}", coordinator.chat_id());
    transcript.catch_up(&coordinator).await;
    eprint!("> ");

    let mut lines = stdin_lines();
    while let Some(line) = lines.next().await {
        let mut words = line.split_whitespace();
        match (words.next(), words.next()) {
            (Some("/quit"), _) => break,
            (Some("/refresh"), _) => match coordinator.refresh().await {
                Ok(_) => transcript.catch_up(&coordinator).await,
                Err(e) => eprintln!("⚠️  {e}"),
            },
            (Some("/chats"), _) => match manager.list_chats().await {
                Ok(chats) => {
                    for chat in chats {
                        eprintln!("   {} (created {})", chat.id, chat.created_at.to_rfc3339());
                    }
                }
                Err(e) => eprintln!("⚠️  {e}"),
            },
            (Some("/new"), _) => {
                let target = manager.create_chat().await.map(|c| c.id);
                switch(&manager, &mut coordinator, &mut transcript, target).await;
            }
            (Some("/open"), Some(id)) => match id.parse::<i64>() {
                Ok(id) => switch(&manager, &mut coordinator, &mut transcript, Ok(ChatId(id))).await,
                Err(_) => eprintln!("⚠️  Not a chat id: {id}"),
            },
            _ => {
                let handle = coordinator.submit(line.as_str()).await;
                match handle.outcome().await {
                    Ok(stored) => {
                        transcript.printed.insert(stored.id);
                        transcript.catch_up(&coordinator).await;
                        if let Some(e) = coordinator.last_error().await {
                            eprintln!("⚠️  {e}");
                        }
                    }
                    Err(e) => eprintln!("❌ Not sent: {e}"),
                }
            }
        }
        eprint!("> ");
    }

    manager.close(coordinator.chat_id()).await;
    Ok(())
}

/// Move the terminal to another chat, closing the current one.
async fn switch(
    manager: &SyncManager,
    current: &mut Arc<MessageSyncCoordinator>,
    transcript: &mut Transcript,
    target: Result<ChatId, SyncError>,
) {
    let opened = match target {
        Ok(id) => manager.open(id).await,
        Err(e) => Err(e),
    };
    match opened {
        Ok(next) if next.chat_id() == current.chat_id() => {}
        Ok(next) => {
            manager.close(current.chat_id()).await;
            *current = next;
            *transcript = Transcript::new();
            eprintln!("   Chat {}", current.chat_id());
            transcript.catch_up(current).await;
        }
        Err(e) => eprintln!("⚠️  {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yes_no_turns_show_choices() {
        let turn = BotTurn::yes_no("Ready?");
        assert_eq!(format_turn(&turn), "Ready? [Yes / No]");
    }

    #[test]
    fn slot_turns_are_numbered() {
        let slots = vec!["Mon".to_string()];
        assert_eq!(format_turn(&BotTurn::slots("Pick.", &slots)), "Pick.\n1. Mon");
    }
}
