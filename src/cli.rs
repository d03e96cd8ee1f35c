//! Command-line interface and REPL
//!
//! Feeds typed events to the engine without any hardware attached.

use anyhow::{anyhow, bail, Result};
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::catalog::Catalog;
use crate::engine::{ControlEvent, ControlId, EngineHandle, RouteOutcome};

/// One REPL line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Cc { channel: u8, cc: u8, value: u8 },
    Table,
    Reset,
    Set { key: String, value: i64 },
    Help,
    Exit,
}

pub fn parse_command(line: &str) -> Result<ReplCommand> {
    let mut parts = line.split_whitespace();
    let command = parts.next().ok_or_else(|| anyhow!("empty command"))?;
    let args: Vec<&str> = parts.collect();

    match command {
        "cc" => {
            let [channel, cc, value] = args.as_slice() else {
                bail!("usage: cc <channel> <cc> <value>");
            };
            let channel: u8 = channel.parse()?;
            let cc: u8 = cc.parse()?;
            let value: u8 = value.parse()?;
            if !(1..=16).contains(&channel) || cc > 127 || value > 127 {
                bail!("channel must be 1-16, cc and value 0-127");
            }
            Ok(ReplCommand::Cc { channel, cc, value })
        }
        "table" => Ok(ReplCommand::Table),
        "reset" => Ok(ReplCommand::Reset),
        // Setting names contain spaces ("Set 1 button"): the value is the last word
        "set" => {
            let Some((value, key)) = args.split_last() else {
                bail!("usage: set <key> <value>");
            };
            if key.is_empty() {
                bail!("usage: set <key> <value>");
            }
            Ok(ReplCommand::Set {
                key: key.join(" "),
                value: value.parse()?,
            })
        }
        "help" => Ok(ReplCommand::Help),
        "exit" | "quit" => Ok(ReplCommand::Exit),
        other => bail!("unknown command '{}' (try 'help')", other),
    }
}

fn print_help() {
    println!("{}", "Commands:".bold());
    println!("  {}  route a Control Change", "cc <ch> <num> <val>".yellow());
    println!("  {}                show the mapping table", "table".yellow());
    println!("  {}                all buttons off, default mapping", "reset".yellow());
    println!("  {}       change a host setting", "set <key> <n>".yellow());
    println!("  {}                 leave", "exit".yellow());
}

fn print_outcome(catalog: &Catalog, id: ControlId, outcome: &RouteOutcome) {
    let label = catalog.label(id);
    match outcome {
        RouteOutcome::Dispatched { target, value, .. } => {
            println!("  {} → {} = {:.4}", label, target.green(), value)
        }
        RouteOutcome::Forwarded => println!("  {} {}", label, "passed through raw".dimmed()),
        RouteOutcome::Dropped { reason, .. } => println!("  {} {}", label, reason.to_string().red()),
        RouteOutcome::Consumed => println!("  {} {}", label, "consumed by modifiers".dimmed()),
    }
}

pub async fn run_repl(engine: EngineHandle, catalog: Catalog) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    println!("{}", "Surface Remap REPL - type 'help'".bold().cyan());

    loop {
        let line = match rl.readline("remap> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        if line.trim().is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line.as_str());

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e.to_string().red());
                continue;
            }
        };

        match command {
            ReplCommand::Cc { channel, cc, value } => {
                let id = ControlId::new(channel, cc);
                match engine.route(ControlEvent::new(id, value)).await {
                    Some(outcome) => print_outcome(&catalog, id, &outcome),
                    None => bail!("engine stopped"),
                }
            }
            ReplCommand::Table => {
                let snapshot = engine.snapshot().await.ok_or_else(|| anyhow!("engine stopped"))?;
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
            ReplCommand::Reset => {
                engine.reset().await;
                println!("{}", "Mapping reset".green());
            }
            ReplCommand::Set { key, value } => {
                println!("  {} = {}", key.yellow(), value);
                engine.set_setting(key, value);
            }
            ReplCommand::Help => print_help(),
            ReplCommand::Exit => break,
        }
    }

    Ok(())
}
