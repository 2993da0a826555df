use std::io::Write;
use tokio::io::AsyncBufReadExt;
use tracing::info;

use symbiosis_config::SymbiosisConfig;
use symbiosis_core::{DirectorAction, KnowledgeGraph, Mood, SessionMode, TurnReply};
use symbiosis_runtime::Pipeline;

pub(super) async fn cmd_chat(config: SymbiosisConfig, fresh: bool) -> symbiosis_core::Result<()> {
    if config.services.openrouter_api_key.is_none() {
        eprintln!("⚠️  No completion API key found.");
        eprintln!("   Add to [services] in symbiosis.toml:  openrouter_api_key = \"sk-or-...\"");
        eprintln!("   Or set env var: export OPENROUTER_API_KEY=sk-or-...");
        eprintln!();
    }
    let pipeline = Pipeline::from_config(&config)?;

    println!("Symbiosis");
    println!("   Talking with {}", config.agent.subject_name);
    println!("   'director mode' opens the archive, 'question time' starts an interview, 'done' leaves either");
    println!("   Type 'exit' or Ctrl+D to quit");
    println!();

    let mut session = pipeline.new_session();
    info!(session = %session.id, "chat session started");
    if !fresh {
        pipeline
            .restore_session(&mut session, chrono::Utc::now())
            .await;
        if !session.history.is_empty() {
            println!("\x1b[90m   restored {} messages\x1b[0m", session.history.len());
        }
    }

    let stdin = tokio::io::stdin();
    let mut lines = tokio::io::BufReader::new(stdin).lines();

    loop {
        eprint!("{} ", prompt(session.mode));
        std::io::stderr().flush().ok();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => break,
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "exit" || trimmed == "quit" || trimmed == "/exit" {
            break;
        }

        let reply = pipeline
            .run_turn(&mut session, trimmed, chrono::Local::now().date_naive())
            .await;
        print_reply(&reply);
        println!();
    }

    eprintln!("\x1b[90m   saving memories...\x1b[0m");
    pipeline.shutdown().await;
    println!("👋 Goodbye!");
    Ok(())
}

fn prompt(mode: SessionMode) -> &'static str {
    match mode {
        SessionMode::Standard => "\x1b[36myou>\x1b[0m",
        SessionMode::Interrogation => "\x1b[33myou (interview)>\x1b[0m",
        SessionMode::Director => "\x1b[35myou (archive)>\x1b[0m",
    }
}

fn mood_color(mood: Mood) -> &'static str {
    match mood {
        Mood::Joyful | Mood::Affectionate => "\x1b[32m",
        Mood::Sad | Mood::Dislike => "\x1b[34m",
        Mood::Glitch => "\x1b[31m",
        Mood::Cryptic => "\x1b[35m",
        Mood::Curious | Mood::Question => "\x1b[33m",
        Mood::Neutral => "\x1b[37m",
    }
}

fn print_reply(reply: &TurnReply) {
    let color = mood_color(reply.mood);
    println!("{color}symbiosis [{}]>\x1b[0m {}", reply.mood, reply.response_text);

    if let Some(graph) = &reply.knowledge_graph
        && !graph.is_empty()
    {
        for line in graph_outline(graph) {
            println!("\x1b[90m{line}\x1b[0m");
        }
    }

    match reply.director_action {
        Some(DirectorAction::ShowDecks) => {
            println!("\x1b[90m   decks: {}\x1b[0m", reply.deck_keywords.join(", "));
        }
        Some(DirectorAction::PlayMedia) => {
            for file in &reply.files {
                println!("\x1b[90m   ▶ {} ({})\x1b[0m", file.name, file.url);
            }
        }
        None => {}
    }
}

/// Indented tree lines, one per node.
fn graph_outline(graph: &KnowledgeGraph) -> Vec<String> {
    let mut lines = Vec::new();
    for root in &graph.roots {
        lines.push(format!("   ◆ {} [{}]", root.label, root.mood));
        for branch in &root.branches {
            lines.push(format!("     ├─ {} [{}]", branch.label, branch.mood));
            for leaf in &branch.leaves {
                lines.push(format!("     │   · {} [{}]", leaf.text, leaf.mood));
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use symbiosis_core::{GraphBranch, GraphLeaf, GraphRoot};

    #[test]
    fn test_graph_outline_nests_nodes() {
        let graph = KnowledgeGraph {
            roots: vec![GraphRoot {
                label: "SISTER".into(),
                mood: Mood::Affectionate,
                branches: vec![GraphBranch {
                    label: "GARDEN".into(),
                    mood: Mood::Joyful,
                    leaves: vec![GraphLeaf {
                        text: "ROSES".into(),
                        mood: Mood::Joyful,
                    }],
                }],
            }],
        };
        let lines = graph_outline(&graph);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("SISTER [AFFECTIONATE]"));
        assert!(lines[2].contains("ROSES"));
    }
}
