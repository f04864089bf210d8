//! Minimal terminal front end. Renders plain text only; every state
//! transition goes through [`ChatService`]. The loop awaits each send
//! before reading the next line, so there is never more than one request
//! in flight — the same discipline the service enforces with `&mut self`.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::api::HistoryStore;
use crate::errors::AppError;
use crate::service::chat_service::ChatService;
use crate::session::SessionCache;

const HELP: &str = "\
Commands:
  :list          show all conversations
  :open <n>      switch to conversation n from :list
  :new           start a new chat
  :delete [n]    delete conversation n (default: the current one)
  :help          show this help
  :quit          exit
Anything else is sent to the assistant.";

pub async fn run<H, S>(service: &mut ChatService<H, S>) -> anyhow::Result<()>
where
    H: HistoryStore,
    S: SessionCache,
{
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("AI Tools Hub chat. {}", summary(service));
    println!("{HELP}");
    print_thread(service);

    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(' ').map_or((line, ""), |(cmd, rest)| (cmd, rest.trim())) {
            (":quit" | ":q", _) => break,
            (":help", _) => println!("{HELP}"),
            (":list", _) => print_conversations(service),
            (":new", _) => {
                service.new_chat()?;
                println!("Started a new chat. Type a message to begin.");
            }
            (":open", arg) => match resolve_index(service, arg) {
                Some(id) => {
                    service.select(&id)?;
                    print_thread(service);
                }
                None => println!("Usage: :open <n>  (see :list)"),
            },
            (":delete", arg) => {
                let target = if arg.is_empty() {
                    service.active_id().map(str::to_string)
                } else {
                    resolve_index(service, arg)
                };
                let Some(id) = target else {
                    println!("Nothing to delete. Pick a conversation with :list / :open first.");
                    continue;
                };
                delete_with_confirmation(service, &mut lines, &id).await?;
            }
            (cmd, _) if cmd.starts_with(':') => {
                println!("Unknown command {cmd}. Try :help");
            }
            _ => match service.send(line).await {
                Ok(outcome) => println!("model: {}", outcome.reply.text),
                Err(e) if e.is_auth() => {
                    eprintln!("{e}");
                    break;
                }
                Err(e) if e.is_validation() => println!("{e}"),
                Err(e) => eprintln!("{e}"),
            },
        }
    }

    Ok(())
}

async fn delete_with_confirmation<H, S>(
    service: &mut ChatService<H, S>,
    lines: &mut Lines<BufReader<Stdin>>,
    id: &str,
) -> anyhow::Result<()>
where
    H: HistoryStore,
    S: SessionCache,
{
    let Some(title) = service.conversations().iter().find(|c| c.id == id).map(|c| c.title.clone())
    else {
        println!("No such conversation.");
        return Ok(());
    };

    print!("Delete \"{title}\"? [y/N] ");
    std::io::stdout().flush()?;
    let confirmed = matches!(
        lines.next_line().await?.as_deref().map(str::trim),
        Some("y" | "Y" | "yes")
    );
    if !confirmed {
        println!("Kept.");
        return Ok(());
    }

    match service.delete_conversation(id).await {
        Ok(()) => {
            println!("Deleted. {}", summary(service));
            print_thread(service);
        }
        Err(e @ AppError::PartialDelete { .. }) => {
            eprintln!("{e}. Run :delete again to retry.");
        }
        Err(e) if e.is_not_found() => println!("Already gone. Refresh with :list."),
        Err(e) => eprintln!("{e}"),
    }
    Ok(())
}

fn resolve_index<H, S>(service: &ChatService<H, S>, arg: &str) -> Option<String>
where
    H: HistoryStore,
    S: SessionCache,
{
    let n: usize = arg.parse().ok()?;
    service.conversations().get(n.checked_sub(1)?).map(|c| c.id.clone())
}

fn summary<H, S>(service: &ChatService<H, S>) -> String
where
    H: HistoryStore,
    S: SessionCache,
{
    match service.conversations().len() {
        0 => "No conversations yet.".to_string(),
        1 => "1 conversation.".to_string(),
        n => format!("{n} conversations."),
    }
}

fn print_conversations<H, S>(service: &ChatService<H, S>)
where
    H: HistoryStore,
    S: SessionCache,
{
    if service.conversations().is_empty() {
        println!("No conversations yet.");
        return;
    }
    for (index, conversation) in service.conversations().iter().enumerate() {
        let marker = if Some(conversation.id.as_str()) == service.active_id() { "*" } else { " " };
        println!(
            "{:>3}{marker} {}  ({})",
            index + 1,
            conversation.title,
            conversation.timestamp.format("%Y-%m-%d %H:%M")
        );
    }
}

fn print_thread<H, S>(service: &ChatService<H, S>)
where
    H: HistoryStore,
    S: SessionCache,
{
    let Some(conversation) = service.active_conversation() else {
        println!("(new chat)");
        return;
    };
    println!("── {} ──", conversation.title);
    for message in &conversation.messages {
        println!("{}: {}", message.role, message.text);
    }
}
