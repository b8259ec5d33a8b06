//! Terminal approval prompts
//!
//! Stdin is read on the blocking pool so a prompt never stalls the runtime.

use async_trait::async_trait;
use std::io::{self, BufRead, Write};
use toolgate_foundation::{ApprovalDelegate, ApprovalRequest, ApprovalResponse};
use toolgate_tool::format::truncate_inline;

/// How many unreadable answers before giving up with a denial
const MAX_ATTEMPTS: usize = 3;

/// Read one line from stdin. `None` on EOF.
pub async fn read_line(prompt: &str) -> io::Result<Option<String>> {
    let prompt = prompt.to_string();
    tokio::task::spawn_blocking(move || {
        let mut stdout = io::stdout();
        write!(stdout, "{}", prompt)?;
        stdout.flush()?;

        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            Ok(None)
        } else {
            Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
        }
    })
    .await
    .map_err(io::Error::other)?
}

/// Asks on the terminal
pub struct TerminalApproval;

impl TerminalApproval {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalApproval {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApprovalDelegate for TerminalApproval {
    async fn request_approval(&self, request: &ApprovalRequest) -> ApprovalResponse {
        println!("\n⚠ Permission Required: {}", request.tool);
        println!("  Reason: {}", request.reason.description());
        println!("  Arguments: {}", truncate_inline(&request.arguments, 120));

        for _ in 0..MAX_ATTEMPTS {
            match read_line("  [y] Allow Once  [a] Always Allow  [n] Deny > ").await {
                Ok(Some(answer)) => match ApprovalResponse::from_input(&answer) {
                    Some(response) => return response,
                    None => println!("  Please answer y, a or n."),
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Failed to read approval: {}", e);
                    break;
                }
            }
        }

        ApprovalResponse::Deny
    }
}

/// Approves every call once without asking (`--yes`)
pub struct AutoApprove;

#[async_trait]
impl ApprovalDelegate for AutoApprove {
    async fn request_approval(&self, request: &ApprovalRequest) -> ApprovalResponse {
        tracing::debug!(tool = %request.tool, "Auto-approved");
        ApprovalResponse::AllowOnce
    }
}
