//! Interactive session
//!
//! Each line is either a tool call (`ls {"path": "src"}`) or a meta command.
//! "Always allow" grants made at a prompt last until the session ends.

use anyhow::Result;
use toolgate_foundation::ToolCall;
use toolgate_tool::{format_block, OutputFilter, ToolRegistry};

use crate::cli::{call_id, list_tools};
use crate::prompt::{read_line, TerminalApproval};

const HELP: &str = "\
Commands:
  <tool> [json]          run a tool, e.g. ls {\"path\": \"src\"}
  :tools                 list tools and permissions
  :perm <tool>           show one tool's permission
  :allow <tool>          allow a tool (confirmation flag unchanged)
  :always <tool>         allow a tool for the rest of the session
  :confirm <tool> on|off toggle per-call confirmation
  :help                  this text
  :quit                  leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Empty,
    Tools,
    Help,
    Quit,
    Perm(String),
    Allow(String),
    Always(String),
    Confirm(String, bool),
    Call { tool: String, args: String },
}

/// Parse one input line
pub fn parse_line(line: &str) -> std::result::Result<ReplCommand, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ReplCommand::Empty);
    }

    let Some(meta) = line.strip_prefix(':') else {
        let (tool, args) = match line.split_once(char::is_whitespace) {
            Some((tool, rest)) => (tool, rest.trim()),
            None => (line, ""),
        };
        let args = if args.is_empty() { "{}" } else { args };
        return Ok(ReplCommand::Call {
            tool: tool.to_string(),
            args: args.to_string(),
        });
    };

    let mut words = meta.split_whitespace();
    let command = words.next().unwrap_or_default();
    let target = words.next().map(str::to_string);
    let extra = words.next();

    let need_tool = |cmd: &str| target.clone().ok_or_else(|| format!(":{} needs a tool name", cmd));

    match command {
        "tools" => Ok(ReplCommand::Tools),
        "help" | "h" | "?" => Ok(ReplCommand::Help),
        "quit" | "q" | "exit" => Ok(ReplCommand::Quit),
        "perm" => Ok(ReplCommand::Perm(need_tool("perm")?)),
        "allow" => Ok(ReplCommand::Allow(need_tool("allow")?)),
        "always" => Ok(ReplCommand::Always(need_tool("always")?)),
        "confirm" => {
            let tool = need_tool("confirm")?;
            match extra {
                Some("on") | Some("true") | Some("yes") => Ok(ReplCommand::Confirm(tool, true)),
                Some("off") | Some("false") | Some("no") => Ok(ReplCommand::Confirm(tool, false)),
                _ => Err(":confirm needs on or off".to_string()),
            }
        }
        other => Err(format!("unknown command :{} (try :help)", other)),
    }
}

pub async fn run(registry: &ToolRegistry, filter: &OutputFilter) -> Result<()> {
    println!("toolgate - sandbox {}", registry.sandbox_root().display());
    println!("Type :help for commands.\n");
    let approval = TerminalApproval::new();

    loop {
        let Some(line) = read_line("toolgate> ").await? else {
            println!();
            break;
        };

        let command = match parse_line(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };

        match command {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{}", HELP),
            ReplCommand::Tools => list_tools(registry),
            ReplCommand::Perm(tool) => match registry.get_permission(&tool) {
                Some(p) => println!(
                    "{}: allowed={} require_confirmation={} denied={}",
                    tool,
                    p.allowed,
                    p.require_confirmation,
                    registry.is_denied(&tool)
                ),
                None => println!("Unknown tool: {}", tool),
            },
            ReplCommand::Allow(tool) => report(registry.allow_tool(&tool, false), &tool, "allowed"),
            ReplCommand::Always(tool) => report(
                registry.allow_tool(&tool, true),
                &tool,
                "allowed for this session",
            ),
            ReplCommand::Confirm(tool, on) => report(
                registry.set_require_confirmation(&tool, on),
                &tool,
                if on { "requires confirmation" } else { "runs without confirmation" },
            ),
            ReplCommand::Call { tool, args } => {
                let call = ToolCall::new(call_id(), tool, args);
                let result = registry.execute_with_approval(&call, &approval).await;
                println!("{}\n", format_block(&result, filter));
            }
        }
    }

    Ok(())
}

fn report(outcome: std::result::Result<(), toolgate_foundation::ToolError>, tool: &str, what: &str) {
    match outcome {
        Ok(()) => println!("✓ {} {}", tool, what),
        Err(e) => println!("✗ {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tool_calls() {
        assert_eq!(
            parse_line("ls").unwrap(),
            ReplCommand::Call {
                tool: "ls".into(),
                args: "{}".into()
            }
        );
        assert_eq!(
            parse_line("  cat {\"path\": \"a b.txt\"}  ").unwrap(),
            ReplCommand::Call {
                tool: "cat".into(),
                args: "{\"path\": \"a b.txt\"}".into()
            }
        );
        assert_eq!(parse_line("   ").unwrap(), ReplCommand::Empty);
    }

    #[test]
    fn test_parse_meta_commands() {
        assert_eq!(parse_line(":q").unwrap(), ReplCommand::Quit);
        assert_eq!(parse_line(":tools").unwrap(), ReplCommand::Tools);
        assert_eq!(parse_line(":always cat").unwrap(), ReplCommand::Always("cat".into()));
        assert_eq!(
            parse_line(":confirm rm on").unwrap(),
            ReplCommand::Confirm("rm".into(), true)
        );
        assert_eq!(
            parse_line(":confirm rm off").unwrap(),
            ReplCommand::Confirm("rm".into(), false)
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_line(":allow").is_err());
        assert!(parse_line(":confirm rm maybe").is_err());
        assert!(parse_line(":launch").is_err());
    }
}
