//! `pls check` and `pls commit`: model help on top of the working tree diff.

use anyhow::{Result, bail};
use colored::Colorize;

use super::{App, Output, Query};
use crate::git::Git;
use crate::history::{Action, Exchange};
use crate::prompts;

/// Diffs beyond this many bytes are truncated before being sent.
pub const MAX_DIFF_CHARS: usize = 10_000;

/// Review the unstaged (or staged) diff for bugs.
pub async fn run_check(app: &App, git: &Git, staged: bool) -> Result<()> {
    let diff = git.diff(staged, MAX_DIFF_CHARS)?;
    if diff.trim().is_empty() {
        println!("No changes to check");
        return Ok(());
    }

    let query = Query::new(prompts::check_system(), diff.as_str()).with_diff_coloring();
    let review = app.ask(query, Output::Print).await?;
    app.remember(&Exchange::new(diff, Action::Check, review));
    Ok(())
}

/// Write a commit message for the staged changes and commit them. When
/// nothing is staged, every change is staged first.
pub async fn run_commit(app: &App, git: &Git) -> Result<()> {
    let mut diff = git.diff(true, MAX_DIFF_CHARS)?;
    if diff.trim().is_empty() && !git.diff(false, MAX_DIFF_CHARS)?.trim().is_empty() {
        println!("Staging all changes...");
        git.stage_all()?;
        diff = git.diff(true, MAX_DIFF_CHARS)?;
    }
    if diff.trim().is_empty() {
        println!("No changes to commit");
        return Ok(());
    }

    println!("Analyzing changes and generating commit message...");
    let reply = app
        .ask(
            Query::new(prompts::commit_system(), diff.as_str()),
            Output::Silent,
        )
        .await?;
    let Some(message) = clean_commit_message(&reply) else {
        bail!("Failed to generate commit message");
    };
    println!("Generated commit message: {}", message.green());

    git.commit(&message)?;
    println!(
        "Changes committed successfully. Run {} to push your changes.",
        "git push".bold()
    );
    app.remember(&Exchange::new(diff, Action::Commit, message));
    Ok(())
}

/// First non-empty line of a reply, without surrounding quotes or backticks.
fn clean_commit_message(reply: &str) -> Option<String> {
    reply
        .lines()
        .map(|line| line.trim().trim_matches(|c| matches!(c, '"' | '\'' | '`')).trim())
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::process::Command;

    use pretty_assertions::assert_eq;

    use super::super::test_support::{app_for, mock_reply, request_bodies};
    use super::*;

    fn init_repo(dir: &std::path::Path) -> Option<Git> {
        let run = |args: &[&str]| {
            Command::new("git")
                .args(args)
                .current_dir(dir)
                .output()
                .is_ok_and(|output| output.status.success())
        };
        let ready = run(&["init", "-q"])
            && run(&["config", "user.email", "pls@example.com"])
            && run(&["config", "user.name", "pls"])
            && run(&["config", "commit.gpgsign", "false"]);
        ready.then(|| Git::new(dir))
    }

    #[test]
    fn commit_message_is_first_clean_line() {
        assert_eq!(
            clean_commit_message("\n\n`feat: add login`\nBody text"),
            Some("feat: add login".to_string())
        );
        assert_eq!(
            clean_commit_message("\"fix: handle empty diff\""),
            Some("fix: handle empty diff".to_string())
        );
        assert_eq!(clean_commit_message("```\n```"), None);
        assert_eq!(clean_commit_message("   \n"), None);
    }

    #[tokio::test]
    async fn check_without_changes_skips_the_model() {
        let server = mock_reply("unused").await;
        let repo = tempfile::tempdir().expect("tempdir");
        let home = tempfile::tempdir().expect("tempdir");
        let Some(git) = init_repo(repo.path()) else {
            return;
        };
        let app = app_for(&server, home.path());

        run_check(&app, &git, false).await.expect("check");
        assert!(request_bodies(&server).await.is_empty());
        assert_eq!(app.history().load_last().expect("load"), None);
    }

    #[tokio::test]
    async fn commit_stages_and_commits_generated_message() {
        let server = mock_reply("\"feat: add notes\"").await;
        let repo = tempfile::tempdir().expect("tempdir");
        let home = tempfile::tempdir().expect("tempdir");
        let Some(git) = init_repo(repo.path()) else {
            return;
        };
        fs::write(repo.path().join("notes.txt"), "hello\n").expect("write");
        fs::write(repo.path().join("seed.txt"), "seed\n").expect("write");
        git.stage_all().expect("stage");
        git.commit("chore: seed").expect("seed commit");
        fs::write(repo.path().join("notes.txt"), "hello\nworld\n").expect("write");

        let app = app_for(&server, home.path());
        run_commit(&app, &git).await.expect("commit");

        let bodies = request_bodies(&server).await;
        let sent = bodies[0]["messages"][0]["content"].as_str().unwrap_or_default();
        assert!(sent.contains("+world"));

        let log = Command::new("git")
            .args(["log", "-1", "--format=%s"])
            .current_dir(repo.path())
            .output()
            .expect("git log");
        assert_eq!(String::from_utf8_lossy(&log.stdout).trim(), "feat: add notes");

        let last = app.history().load_last().expect("load").expect("saved");
        assert_eq!(last.action, Action::Commit);
        assert_eq!(last.output, "feat: add notes");
    }
}
