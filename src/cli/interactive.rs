//! Terminal presenter
//!
//! Progress text goes to stdout, worker diagnostics to stderr. Questions and
//! the password are asked with `inquire` prompts on a blocking thread.

use std::sync::Arc;

use inquire::{Confirm, Password, Select};
use pkgbridge_core::{
    next_delivery, BridgeEvent, DefaultAnswers, Delivery, Question, QuestionKind, StreamKind,
    TransactionBridge,
};
use tokio::sync::broadcast;
use tracing::warn;

/// Render events until the operation finishes
pub async fn run(
    bridge: Arc<TransactionBridge>,
    mut rx: broadcast::Receiver<BridgeEvent>,
    defaults: DefaultAnswers,
) {
    loop {
        let event = match next_delivery(&mut rx).await {
            Some(Delivery::Event(event)) => event,
            Some(Delivery::Skipped(_)) => continue,
            None => return,
        };

        match event {
            BridgeEvent::LogLine { stream, line, .. } => match stream {
                StreamKind::Stdout => println!("{}", line),
                StreamKind::Stderr => eprintln!("{}", line),
            },
            BridgeEvent::QuestionAsked { question, .. } => {
                let id = question.id;
                let default = defaults.for_question(&question.spec);
                let value = tokio::task::spawn_blocking(move || ask(&question, default))
                    .await
                    .unwrap_or_else(|e| {
                        warn!(error = %e, "Prompt task failed");
                        default
                    });
                if let Err(e) = bridge.answer(id, value) {
                    warn!(question_id = %id, error = %e, "Answer rejected");
                }
            }
            BridgeEvent::SecretRequired { reason } => {
                let entered = tokio::task::spawn_blocking(move || ask_password(&reason))
                    .await
                    .ok()
                    .flatten();
                match entered {
                    Some(secret) => {
                        if !bridge.supply_secret(secret).await {
                            eprintln!("Sorry, that password was not accepted.");
                        }
                    }
                    None => bridge.decline_secret().await,
                }
            }
            BridgeEvent::OperationFinished { .. } => return,
            _ => {}
        }
    }
}

/// Ask one question; a failed or cancelled prompt yields `default`
fn ask(question: &Question, default: usize) -> usize {
    let answer = match question.kind() {
        QuestionKind::YesNo => Confirm::new(&question.spec.text)
            .with_default(default == 1)
            .prompt()
            .map(usize::from),
        QuestionKind::SelectProvider | QuestionKind::Conflict => {
            let labels = option_labels(question.options());
            Select::new(&question.spec.text, labels)
                .with_starting_cursor(default)
                .raw_prompt()
                .map(|choice| choice.index)
        }
    };

    answer.unwrap_or_else(|e| {
        warn!(error = %e, default, "Prompt not answered; using default");
        default
    })
}

fn ask_password(reason: &str) -> Option<String> {
    Password::new("Password:")
        .without_confirmation()
        .with_display_mode(inquire::PasswordDisplayMode::Masked)
        .with_help_message(reason)
        .prompt()
        .ok()
}

/// Option labels as shown in the selection list; gaps get a placeholder
fn option_labels(options: &[String]) -> Vec<String> {
    options
        .iter()
        .enumerate()
        .map(|(i, text)| {
            if text.trim().is_empty() {
                format!("(option {})", i)
            } else {
                text.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_labels_fill_gaps() {
        let labels = option_labels(&["".to_string(), "foo".to_string(), " ".to_string()]);
        assert_eq!(labels, vec!["(option 0)", "foo", "(option 2)"]);
    }
}
