//! Machine-readable presenter
//!
//! Every bridge event is printed as one JSON object per line on stdout.
//! Commands are read from stdin, one per line:
//!
//! ```text
//! answer <question-id> <value>
//! secret <password>
//! decline-secret
//! ```

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use pkgbridge_core::{next_delivery, BridgeEvent, Delivery, OperationResult, TransactionBridge};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

/// A command read from stdin
#[derive(Debug, PartialEq, Eq)]
pub enum MachineCommand {
    Answer { question_id: Uuid, value: usize },
    Secret(String),
    DeclineSecret,
}

impl MachineCommand {
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
        match verb {
            "answer" => {
                let (id, value) = rest
                    .trim()
                    .split_once(' ')
                    .ok_or_else(|| "usage: answer <question-id> <value>".to_string())?;
                let question_id =
                    Uuid::parse_str(id.trim()).map_err(|e| format!("bad question id: {}", e))?;
                let value = value
                    .trim()
                    .parse()
                    .map_err(|_| format!("bad answer value: {}", value.trim()))?;
                Ok(Self::Answer { question_id, value })
            }
            // The password is everything after the first space, verbatim.
            "secret" if !rest.is_empty() => Ok(Self::Secret(rest.to_string())),
            "secret" => Err("usage: secret <password>".to_string()),
            "decline-secret" => Ok(Self::DeclineSecret),
            other => Err(format!("unknown command: {}", other)),
        }
    }
}

/// Emit events until the operation finishes, serving stdin commands
pub async fn run(bridge: Arc<TransactionBridge>, mut rx: broadcast::Receiver<BridgeEvent>) {
    let commands = tokio::spawn(read_commands(bridge));

    loop {
        match next_delivery(&mut rx).await {
            Some(Delivery::Event(event)) => {
                let finished = matches!(event, BridgeEvent::OperationFinished { .. });
                match serde_json::to_string(&event) {
                    Ok(line) => emit(&line),
                    Err(e) => warn!(error = %e, "Could not serialize event"),
                }
                if finished {
                    break;
                }
            }
            Some(Delivery::Skipped(skipped)) => {
                emit(&json!({ "type": "lagged", "skipped": skipped }).to_string());
            }
            None => break,
        }
    }
    commands.abort();
}

/// Print the final result as the last line
pub fn print_result(result: &OperationResult) -> Result<()> {
    let line = json!({ "type": "result", "result": result });
    emit(&line.to_string());
    Ok(())
}

async fn read_commands(bridge: Arc<TransactionBridge>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("Command input closed");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read command input");
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match MachineCommand::parse(&line) {
            Ok(MachineCommand::Answer { question_id, value }) => {
                if let Err(e) = bridge.answer(question_id, value) {
                    emit_error(&e.to_string());
                }
            }
            Ok(MachineCommand::Secret(secret)) => {
                bridge.supply_secret(secret).await;
            }
            Ok(MachineCommand::DeclineSecret) => bridge.decline_secret().await,
            Err(message) => emit_error(&message),
        }
    }
}

fn emit_error(message: &str) {
    emit(&json!({ "type": "error", "message": message }).to_string());
}

fn emit(line: &str) {
    let mut stdout = std::io::stdout().lock();
    if writeln!(stdout, "{}", line).and_then(|()| stdout.flush()).is_err() {
        debug!("stdout closed; dropping output");
    }
}
