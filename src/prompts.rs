//! System prompts for each action.

use crate::git::WorkspaceContext;
use crate::history::Action;

// Prompt files loaded at compile time
pub const CMD_PROMPT: &str = include_str!("prompts/cmd.txt");
pub const WRITE_PROMPT: &str = include_str!("prompts/write.txt");
pub const EXPLAIN_PROMPT: &str = include_str!("prompts/explain.txt");
pub const EXPLAIN_LINES_PROMPT: &str = include_str!("prompts/explain_lines.txt");
pub const FOLLOW_UP_PROMPT: &str = include_str!("prompts/follow_up.txt");
pub const CHECK_PROMPT: &str = include_str!("prompts/check.txt");
pub const COMMIT_PROMPT: &str = include_str!("prompts/commit.txt");

/// Shell commands for the user's platform, grounded in where they are.
#[must_use]
pub fn cmd_system(context: &WorkspaceContext) -> String {
    let mut prompt = CMD_PROMPT.trim().replace("{os}", os_name());
    prompt.push_str(&format!(
        "\n\nThe user is in {} which contains: {}.",
        context.cwd,
        if context.listing.is_empty() {
            "no files"
        } else {
            context.listing.as_str()
        }
    ));
    if let Some(branch) = &context.branch {
        prompt.push_str(&format!(" The current git branch is {branch}."));
    }
    prompt
}

#[must_use]
pub fn write_system() -> String {
    WRITE_PROMPT.trim().to_string()
}

/// Explain an earlier output line by line, or answer `question` about it.
#[must_use]
pub fn explain_system(question: Option<&str>) -> String {
    let base = EXPLAIN_PROMPT.trim();
    match question.map(str::trim).filter(|q| !q.is_empty()) {
        Some(question) => format!(
            "{base} The user will provide an input. Concisely answer the following about it: {question}"
        ),
        None => format!("{base} {}", EXPLAIN_LINES_PROMPT.trim()),
    }
}

/// Continue the conversation about an earlier exchange.
#[must_use]
pub fn follow_up_system(action: Action) -> String {
    let role = match action {
        Action::Cmd => "You are an expert helping the user with the shell.",
        Action::Write => "You are an expert at writing regex, code, and other programming syntax.",
        Action::Explain => {
            "You are an interface within a terminal shell. Your job is to explain shell commands, \
             code, regex, and answer other programming related questions."
        }
        Action::Check => "You are an expert at analyzing git diffs for issues.",
        Action::Commit => "You are an expert at writing git commit messages.",
    };
    format!("{role} {}", FOLLOW_UP_PROMPT.trim())
}

#[must_use]
pub fn check_system() -> String {
    CHECK_PROMPT.trim().to_string()
}

#[must_use]
pub fn commit_system() -> String {
    COMMIT_PROMPT.trim().to_string()
}

/// Append the user's configured instructions to a system prompt.
#[must_use]
pub fn with_user_prompt(system: String, extra: Option<&str>) -> String {
    match extra.map(str::trim).filter(|extra| !extra.is_empty()) {
        Some(extra) => format!("{system}\n\n{extra}"),
        None => system,
    }
}

fn os_name() -> &'static str {
    match std::env::consts::OS {
        "macos" => "macOS",
        "linux" => "Linux",
        "windows" => "Windows",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn cmd_prompt_includes_workspace() {
        let context = WorkspaceContext {
            cwd: "/home/me/project".to_string(),
            listing: "Cargo.toml, src".to_string(),
            branch: Some("main".to_string()),
        };
        let prompt = cmd_system(&context);
        assert!(!prompt.contains("{os}"));
        assert!(prompt.contains("/home/me/project which contains: Cargo.toml, src."));
        assert!(prompt.ends_with("The current git branch is main."));
    }

    #[test]
    fn explain_with_and_without_question() {
        assert!(explain_system(None).contains("Explain what each line does"));
        let prompt = explain_system(Some("  why -r?  "));
        assert!(prompt.ends_with("answer the following about it: why -r?"));
        assert_eq!(explain_system(Some("   ")), explain_system(None));
    }

    #[test]
    fn follow_ups_differ_per_action() {
        let check = follow_up_system(Action::Check);
        assert!(check.starts_with("You are an expert at analyzing git diffs"));
        assert!(check.ends_with(FOLLOW_UP_PROMPT.trim()));
        assert_ne!(check, follow_up_system(Action::Write));
    }

    #[test]
    fn user_prompt_is_appended() {
        assert_eq!(
            with_user_prompt("base".to_string(), Some("Use fish syntax.")),
            "base\n\nUse fish syntax."
        );
        assert_eq!(with_user_prompt("base".to_string(), Some("  ")), "base");
        assert_eq!(with_user_prompt("base".to_string(), None), "base");
    }
}
