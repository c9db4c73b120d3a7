//! CLI entry point for `pls`.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::Colorize;
use dotenvy::dotenv;

mod client;
mod commands;
mod config;
mod error_hints;
mod git;
mod history;
mod logging;
mod models;
mod palette;
mod prompts;
mod provider;
mod render;
mod sse;
mod streaming;
mod ui;
mod utils;

use crate::commands::{App, ask, review, setup};
use crate::config::{Config, default_config_path};
use crate::git::Git;
use crate::history::FileHistoryStore;
use crate::provider::ProviderKind;
use crate::render::RenderConfig;
use crate::streaming::StreamError;

/// Exit status for a Ctrl-C interrupted request.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(
    name = "pls",
    version,
    about = "Ask an LLM for shell commands, code and git reviews",
    args_conflicts_with_subcommands = true,
    after_help = "Examples:\
    \n   pls find files larger than 100MB\
    \n   pls explain\
    \n   pls write a regex that matches ISO dates\
    \n   pls check --staged\
    \n   pls commit"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// What you need shell commands for
    #[arg(trailing_var_arg = true, value_name = "TASK")]
    task: Vec<String>,

    /// Increase logging (-v info, -vv raw stream payloads)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Config profile name
    #[arg(long, env = "PLS_PROFILE", global = true)]
    profile: Option<String>,

    /// Provider to use for this run
    #[arg(long, value_enum, global = true)]
    provider: Option<ProviderKind>,

    /// Model to use for this run
    #[arg(long, global = true)]
    model: Option<String>,

    /// Print raw text instead of rendered markdown
    #[arg(long, global = true)]
    no_markdown: bool,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Write shell commands for a task
    Cmd {
        #[arg(trailing_var_arg = true, required = true)]
        task: Vec<String>,
    },
    /// Answer a question or write code, regex and the like
    Write {
        #[arg(trailing_var_arg = true, required = true)]
        question: Vec<String>,
    },
    /// Explain the last answer, or ask a question about it
    Explain {
        #[arg(trailing_var_arg = true)]
        question: Vec<String>,
    },
    /// Refine the last shell commands with a clarification
    Duh {
        #[arg(trailing_var_arg = true, required = true)]
        clarification: Vec<String>,
    },
    /// Review the working tree diff for bugs
    Check {
        /// Review staged changes instead of unstaged ones
        #[arg(long)]
        staged: bool,
    },
    /// Generate a commit message and commit
    Commit,
    /// Change a setting in the config file
    Set {
        key: String,
        #[arg(trailing_var_arg = true, required = true)]
        value: Vec<String>,
    },
    /// Store an API key
    Login,
    /// Remove the stored API key
    Logout,
    /// Forget the last exchange
    Clear,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let cli = Cli::parse();
    logging::set_verbosity(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(&err),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let command = match cli.command.clone() {
        Some(command) => command,
        None if cli.task.is_empty() => {
            Cli::command().print_help()?;
            return Ok(());
        }
        None => Commands::Cmd {
            task: cli.task.clone(),
        },
    };

    match command {
        Commands::Completions { shell } => {
            generate_completions(shell);
            Ok(())
        }
        Commands::Set { key, value } => setup::set(&config_path(&cli)?, &key, &value.join(" ")),
        Commands::Login => {
            let provider = login_provider(&cli);
            setup::login(&config_path(&cli)?, provider, cli.provider.is_some())
        }
        Commands::Logout => setup::logout(&config_path(&cli)?, login_provider(&cli)),
        Commands::Clear => {
            let config = load_config(&cli)?;
            setup::clear(&FileHistoryStore::new(config.history_path()))
        }
        command => {
            let app = build_app(&cli)?;
            let cwd = std::env::current_dir().context("Failed to read the current directory")?;
            match command {
                Commands::Cmd { task } => ask::run_cmd(&app, &task.join(" "), &cwd).await,
                Commands::Write { question } => ask::run_write(&app, &question.join(" ")).await,
                Commands::Explain { question } => {
                    let question = question.join(" ");
                    let question = (!question.trim().is_empty()).then_some(question.as_str());
                    ask::run_explain(&app, question).await
                }
                Commands::Duh { clarification } => {
                    ask::run_duh(&app, &clarification.join(" "), &cwd).await
                }
                Commands::Check { staged } => review::run_check(&app, &Git::new(cwd), staged).await,
                Commands::Commit => review::run_commit(&app, &Git::new(cwd)).await,
                other => unreachable!("{other:?} is handled before the app is built"),
            }
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.clone(), cli.profile.as_deref())?;
    if let Some(provider) = cli.provider {
        config.provider = Some(provider);
    }
    if let Some(model) = &cli.model {
        config.model = Some(model.clone());
    }
    logging::info(format!(
        "Using {} with model {}",
        config.provider(),
        config.model()
    ));
    Ok(config)
}

fn build_app(cli: &Cli) -> Result<App> {
    let config = load_config(cli)?;
    let render = RenderConfig::probe(
        config.markdown_enabled() && !cli.no_markdown,
        config.color_enabled(),
    );
    render.apply_color_mode();
    let history = FileHistoryStore::new(config.history_path());
    Ok(App::new(config, render, Box::new(history)))
}

fn config_path(cli: &Cli) -> Result<PathBuf> {
    cli.config
        .clone()
        .or_else(default_config_path)
        .context("Could not determine where to store the config file")
}

/// The provider named on the command line, else the configured one.
fn login_provider(cli: &Cli) -> ProviderKind {
    cli.provider.unwrap_or_else(|| {
        config_path(cli)
            .and_then(|path| Config::load_file(&path, cli.profile.as_deref()))
            .map(|config| config.provider())
            .unwrap_or_default()
    })
}

fn report(err: &anyhow::Error) -> ExitCode {
    let Some(stream_error) = err.downcast_ref::<StreamError>() else {
        eprintln!("{} {err:#}", "error:".red().bold());
        return ExitCode::FAILURE;
    };

    let hint = error_hints::hint_for(stream_error);
    let (r, g, b) = palette::RED_RGB;
    eprintln!(
        "{} {}",
        format!("[{}]", hint.error_type.label()).truecolor(r, g, b).bold(),
        hint.message
    );
    if !hint.suggestion.is_empty() {
        let (r, g, b) = palette::YELLOW_RGB;
        eprintln!("{}", hint.suggestion.truecolor(r, g, b));
    }

    if matches!(stream_error, StreamError::Interrupted) {
        ExitCode::from(EXIT_INTERRUPTED)
    } else {
        ExitCode::FAILURE
    }
}

/// Generate shell completions for the given shell
fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_words_are_a_task() {
        let cli = Cli::try_parse_from(["pls", "list", "open", "ports"]).expect("parse");
        assert!(cli.command.is_none());
        assert_eq!(cli.task, ["list", "open", "ports"]);
    }

    #[test]
    fn subcommands_take_their_own_words() {
        let cli = Cli::try_parse_from(["pls", "explain", "-vv", "why", "-r?"]).expect("parse");
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Some(Commands::Explain { question }) => assert_eq!(question, ["why", "-r?"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_overrides_parse() {
        let cli = Cli::try_parse_from([
            "pls",
            "check",
            "--staged",
            "--provider",
            "openai",
            "--no-markdown",
        ])
        .expect("parse");
        assert_eq!(cli.provider, Some(ProviderKind::OpenAi));
        assert!(cli.no_markdown);
        assert!(matches!(cli.command, Some(Commands::Check { staged: true })));
    }
}
