//! `pls <task>`, `pls write`, `pls explain` and `pls duh`.

use std::path::Path;

use anyhow::{Result, bail};

use super::{App, Output, Query, print_footer};
use crate::git::WorkspaceContext;
use crate::history::{Action, Exchange};
use crate::prompts;

const CMD_FOOTER: &str =
    "Run pls explain to describe each step or pls explain 'question' to ask a follow up";
const WRITE_FOOTER: &str =
    "Run pls explain to elaborate or pls explain 'question' to ask a follow up";
const DEFAULT_FOLLOW_UP: &str = "Explain your previous answer in more detail.";

/// Write shell commands for `task`, using `cwd` as context.
pub async fn run_cmd(app: &App, task: &str, cwd: &Path) -> Result<()> {
    let task = task.trim();
    if task.is_empty() {
        bail!("Tell pls what you need, e.g. `pls find files larger than 100MB`");
    }

    let context = WorkspaceContext::probe(cwd);
    let commands = app
        .ask(
            Query::new(prompts::cmd_system(&context), task).verbatim(),
            Output::Print,
        )
        .await?;
    app.remember(&Exchange::new(task, Action::Cmd, &commands));
    print_footer(CMD_FOOTER);
    Ok(())
}

/// Answer a question or write code.
pub async fn run_write(app: &App, question: &str) -> Result<()> {
    let question = question.trim();
    if question.is_empty() {
        bail!("Nothing to answer. Try `pls write a regex that matches ISO dates`");
    }

    let answer = app
        .ask(Query::new(prompts::write_system(), question), Output::Print)
        .await?;
    app.remember(&Exchange::new(question, Action::Write, &answer));
    print_footer(WRITE_FOOTER);
    Ok(())
}

/// Explain the last output, or ask `question` about it. Without a previous
/// exchange the question is answered like `pls write`.
pub async fn run_explain(app: &App, question: Option<&str>) -> Result<()> {
    let question = question.map(str::trim).filter(|q| !q.is_empty());
    let Some(last) = app.history().load_last()? else {
        return match question {
            Some(question) => run_write(app, question).await,
            None => bail!("Nothing to explain yet. Ask something first, e.g. `pls list open ports`"),
        };
    };

    let query = match last.action {
        Action::Cmd => Query::new(prompts::explain_system(question), last.output.as_str()),
        action => Query::new(
            prompts::follow_up_system(action),
            question.unwrap_or(DEFAULT_FOLLOW_UP),
        )
        .with_history(&last),
    };
    println!();
    let response = app.ask(query, Output::Print).await?;

    let input = question.unwrap_or(last.output.as_str());
    app.remember(&Exchange::new(input, Action::Explain, &response));
    Ok(())
}

/// Refine the last shell-command answer with a clarification.
pub async fn run_duh(app: &App, clarification: &str, cwd: &Path) -> Result<()> {
    let last = app
        .history()
        .load_last()?
        .filter(|last| last.action == Action::Cmd && !last.input.is_empty());
    let Some(last) = last else {
        println!("No previous input to clarify.");
        return Ok(());
    };

    let context = WorkspaceContext::probe(cwd);
    let query = Query::new(prompts::cmd_system(&context), clarification.trim())
        .with_history(&last)
        .verbatim();
    let commands = app.ask(query, Output::Print).await?;
    app.remember(&Exchange::new(last.input, Action::Cmd, &commands));
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::super::test_support::{app_for, mock_reply, request_bodies};
    use super::*;

    #[tokio::test]
    async fn cmd_saves_exchange() {
        let server = mock_reply("du -sh * | sort -h").await;
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("photos.zip"), "").expect("seed file");
        let app = app_for(&server, dir.path());

        run_cmd(&app, "show folder sizes", dir.path())
            .await
            .expect("cmd");

        let last = app.history().load_last().expect("load").expect("saved");
        assert_eq!(last.action, Action::Cmd);
        assert_eq!(last.turns(), ["show folder sizes", "du -sh * | sort -h"]);

        let bodies = request_bodies(&server).await;
        let system = bodies[0]["system"].as_str().unwrap_or_default();
        assert!(system.contains("shell commands"));
        assert!(system.contains("photos.zip"));
    }

    #[tokio::test]
    async fn empty_task_is_rejected() {
        let server = mock_reply("unused").await;
        let dir = tempfile::tempdir().expect("tempdir");
        let app = app_for(&server, dir.path());
        assert!(run_cmd(&app, "   ", dir.path()).await.is_err());
        assert!(request_bodies(&server).await.is_empty());
    }

    #[tokio::test]
    async fn explain_after_cmd_sends_commands_as_input() {
        let server = mock_reply("`ls`: lists files").await;
        let dir = tempfile::tempdir().expect("tempdir");
        let app = app_for(&server, dir.path());
        app.history()
            .save_last(&Exchange::new("list files", Action::Cmd, "ls"))
            .expect("seed history");

        run_explain(&app, None).await.expect("explain");

        let bodies = request_bodies(&server).await;
        assert_eq!(bodies[0]["messages"].as_array().map(Vec::len), Some(1));
        assert_eq!(bodies[0]["messages"][0]["content"], "ls");
        let last = app.history().load_last().expect("load").expect("saved");
        assert_eq!(last.action, Action::Explain);
        assert_eq!(last.input, "ls");
    }

    #[tokio::test]
    async fn explain_after_check_is_a_follow_up() {
        let server = mock_reply("It removes the guard.").await;
        let dir = tempfile::tempdir().expect("tempdir");
        let app = app_for(&server, dir.path());
        app.history()
            .save_last(&Exchange::new("+a\n-b", Action::Check, "Possible bug"))
            .expect("seed history");

        run_explain(&app, Some("why is it a bug?"))
            .await
            .expect("explain");

        let bodies = request_bodies(&server).await;
        let messages = bodies[0]["messages"].as_array().cloned().unwrap_or_default();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[2]["content"], "why is it a bug?");
    }

    #[tokio::test]
    async fn explain_without_history_falls_back_to_write() {
        let server = mock_reply("42").await;
        let dir = tempfile::tempdir().expect("tempdir");
        let app = app_for(&server, dir.path());

        run_explain(&app, Some("what is the answer?"))
            .await
            .expect("explain");

        let last = app.history().load_last().expect("load").expect("saved");
        assert_eq!(last.action, Action::Write);

        let empty = tempfile::tempdir().expect("tempdir");
        let fresh = app_for(&server, empty.path());
        assert!(run_explain(&fresh, None).await.is_err());
    }

    #[tokio::test]
    async fn duh_requires_a_previous_cmd() {
        let server = mock_reply("ls -laS").await;
        let dir = tempfile::tempdir().expect("tempdir");
        let app = app_for(&server, dir.path());

        run_duh(&app, "sorted by size", dir.path())
            .await
            .expect("duh");
        assert!(request_bodies(&server).await.is_empty());

        app.history()
            .save_last(&Exchange::new("list files", Action::Cmd, "ls -la"))
            .expect("seed history");
        run_duh(&app, "sorted by size", dir.path())
            .await
            .expect("duh");

        let last = app.history().load_last().expect("load").expect("saved");
        assert_eq!(last.turns(), ["list files", "ls -laS"]);
    }
}
