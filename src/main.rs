//! shellrun CLI entry point
//!
//! Usage:
//!   shellrun exec <command>        Run a command and wait for it
//!   shellrun spawn <command>...    Run commands concurrently
//!   shellrun shells                List shell kinds and their programs
//!   shellrun config                Show resolved configuration

use std::process::ExitCode;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use shellrun::cli::{
    commands::{ConfigArgs, ExecArgs, OutputFormat, ShellsArgs, SpawnArgs},
    Cli, Commands,
};
use shellrun::config::{find_config_files, load_config, Config};
use shellrun::executor::CommandResult;
use shellrun::logging::init_logging;
use shellrun::manager::{AsyncId, AsyncState, OutputCallback};
use shellrun::shell::ShellKind;
use shellrun::ShellRunner;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.log_json) {
        eprintln!("{}: {:#}", "warning".yellow().bold(), e);
    }

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Exec(args) => exec_command(args, &config, cli.verbose),
        Commands::Spawn(args) => spawn_commands(args, &config, cli.verbose),
        Commands::Shells(args) => {
            list_shells(args, &config)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config(args) => {
            show_config(args, &config)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Process exit status for a finished command
///
/// Negative sentinels, timeouts and codes that do not fit a byte map to 1.
fn exit_status(result: &CommandResult) -> u8 {
    if result.timed_out {
        return 1;
    }
    u8::try_from(result.exit_code).unwrap_or(1)
}

/// Run one command synchronously
fn exec_command(args: ExecArgs, config: &Config, verbose: bool) -> Result<ExitCode> {
    let runner = ShellRunner::from_config(config).context("Failed to start runner")?;

    if let Some(ref dir) = args.dir {
        runner.set_working_directory(dir);
    }
    for (key, value) in args.env_as_map() {
        runner.set_environment(key, value);
    }
    if let Some(ref policy) = args.policy {
        runner.set_execution_policy(policy);
    }

    let shell = args.shell.unwrap_or(runner.default_shell());
    let timeout_ms = args.timeout_ms.unwrap_or(runner.default_timeout_ms());

    if verbose {
        let line = runner.context().invocation(&args.command, shell).command_line();
        eprintln!("{}: {}", "exec".cyan(), line);
    }

    let result = runner.execute_sync(&args.command, shell, timeout_ms);

    match args.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&serde_json::json!({
                "command": args.command,
                "shell": shell,
                "timeout_ms": timeout_ms,
                "result": result,
            }))?;
            println!("{}", json);
        }
        OutputFormat::Plain => {
            print!("{}", result.output);
            eprint!("{}", result.error);
        }
        OutputFormat::Table => {
            print_result_table(&result);
        }
    }

    if verbose {
        eprintln!(
            "{}: exit {} in {}ms",
            status_label(&result),
            result.exit_code,
            result.execution_time_ms
        );
    }

    Ok(ExitCode::from(exit_status(&result)))
}

fn status_label(result: &CommandResult) -> colored::ColoredString {
    if result.timed_out {
        "timed out".yellow()
    } else if result.success() {
        "success".green()
    } else {
        "failed".red()
    }
}

fn print_result_table(result: &CommandResult) {
    println!("{}: {}", "Status".cyan(), status_label(result));
    println!("{}: {}", "Exit code".cyan(), result.exit_code);
    println!("{}: {}ms", "Time".cyan(), result.execution_time_ms);

    if !result.output.is_empty() {
        println!();
        println!("{}:", "Output".cyan());
        print!("{}", result.output);
        if !result.output.ends_with('\n') {
            println!();
        }
    }

    if !result.error.is_empty() {
        println!();
        println!("{}:", "Error".cyan());
        print!("{}", result.error);
        if !result.error.ends_with('\n') {
            println!();
        }
    }
}

/// Outcome of one `spawn` argument
struct Spawned {
    command: String,
    id: Option<AsyncId>,
    state: Option<AsyncState>,
    result: CommandResult,
    rejected: Option<String>,
}

/// Callback printing each stream with a `[n]` prefix per line
fn prefixed_printer(index: usize) -> OutputCallback {
    Box::new(move |stream, text| {
        for line in text.lines() {
            if stream.is_stderr() {
                eprintln!("[{}] {}", index, line);
            } else {
                println!("[{}] {}", index, line);
            }
        }
    })
}

/// Run commands through the async manager and summarise
fn spawn_commands(args: SpawnArgs, config: &Config, verbose: bool) -> Result<ExitCode> {
    let runner = ShellRunner::from_config(config).context("Failed to start runner")?;
    let shell = args.shell.unwrap_or(runner.default_shell());
    let timeout_ms = args.timeout_ms.unwrap_or(runner.default_timeout_ms());

    let mut spawned: Vec<Spawned> = args
        .commands
        .iter()
        .enumerate()
        .map(|(index, command)| {
            let callback = prefixed_printer(index + 1);
            match runner.execute_async(command, shell, timeout_ms, Some(callback)) {
                Ok(id) => {
                    if verbose {
                        eprintln!("{}: [{}] id {} {}", "spawn".cyan(), index + 1, id, command);
                    }
                    Spawned {
                        command: command.clone(),
                        id: Some(id),
                        state: None,
                        result: CommandResult::default(),
                        rejected: None,
                    }
                }
                Err(e) => Spawned {
                    command: command.clone(),
                    id: None,
                    state: None,
                    result: CommandResult::default(),
                    rejected: Some(e.to_string()),
                },
            }
        })
        .collect();

    let ids: Vec<AsyncId> = spawned.iter().filter_map(|s| s.id).collect();

    thread::scope(|scope| {
        let (done_tx, done_rx) = mpsc::channel::<()>();

        if let Some(cancel_after) = args.cancel_after_ms {
            let runner = &runner;
            let ids = &ids;
            scope.spawn(move || {
                if done_rx.recv_timeout(Duration::from_millis(cancel_after))
                    == Err(mpsc::RecvTimeoutError::Timeout)
                {
                    let cancelled = ids.iter().filter(|id| runner.terminate_async(**id)).count();
                    tracing::info!("Cancelled {} command(s) after {}ms", cancelled, cancel_after);
                }
            });
        }

        for entry in spawned.iter_mut() {
            if let Some(id) = entry.id {
                // Callbacks print the output; the summary must come after it
                entry.result = runner.wait_async(id);
                entry.state = Some(runner.get_async_status(id));
            }
        }

        // Wakes the canceller early; it may already be gone
        let _ = done_tx.send(());
    });

    print_spawn_summary(&spawned, args.format)?;

    let all_completed = spawned
        .iter()
        .all(|s| s.state == Some(AsyncState::Completed));
    Ok(if all_completed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_spawn_summary(spawned: &[Spawned], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let entries: Vec<_> = spawned
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "command": s.command,
                        "id": s.id,
                        "state": s.state,
                        "rejected": s.rejected,
                        "result": s.result,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Plain => {
            for s in spawned {
                match (s.id, s.state) {
                    (Some(id), Some(state)) => println!("{} {}", id, state),
                    _ => println!("- rejected"),
                }
            }
        }
        OutputFormat::Table => {
            println!();
            println!("{}:", "Summary".cyan());
            for (index, s) in spawned.iter().enumerate() {
                let state = match (s.state, &s.rejected) {
                    (Some(state), _) => colour_state(state),
                    (None, Some(reason)) => format!("rejected ({})", reason).red(),
                    (None, None) => "unknown".normal(),
                };
                println!(
                    "  [{}] {:<10} exit {:>3} {:>6}ms  {}",
                    index + 1,
                    state,
                    s.result.exit_code,
                    s.result.execution_time_ms,
                    s.command
                );
            }
        }
    }

    Ok(())
}

fn colour_state(state: AsyncState) -> colored::ColoredString {
    let label = state.as_str();
    match state {
        AsyncState::Completed => label.green(),
        AsyncState::Failed => label.red(),
        AsyncState::TimedOut | AsyncState::Cancelled => label.yellow(),
        AsyncState::Running => label.normal(),
    }
}

/// List each shell kind with its program and PATH resolution
fn list_shells(args: ShellsArgs, config: &Config) -> Result<()> {
    let rows: Vec<(ShellKind, &str, Option<std::path::PathBuf>)> = ShellKind::ALL
        .iter()
        .map(|&kind| (kind, config.shells.program(kind), config.shells.locate(kind)))
        .collect();

    match args.format {
        OutputFormat::Json => {
            let entries: Vec<_> = rows
                .iter()
                .map(|(kind, program, path)| {
                    serde_json::json!({
                        "shell": kind,
                        "program": program,
                        "path": path,
                        "default": *kind == config.defaults.shell,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Plain => {
            for (kind, _, path) in &rows {
                if path.is_some() {
                    println!("{}", kind);
                }
            }
        }
        OutputFormat::Table => {
            for (kind, program, path) in &rows {
                let marker = if *kind == config.defaults.shell { "*" } else { " " };
                let location = match path {
                    Some(path) => path.display().to_string().green(),
                    None => "not found".yellow(),
                };
                println!("{} {:<11} {:<16} {}", marker, kind.as_str(), program, location);
            }
        }
    }

    Ok(())
}

/// Show the resolved configuration
fn show_config(args: ConfigArgs, config: &Config) -> Result<()> {
    match args.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        OutputFormat::Plain => {
            print!("{}", toml::to_string_pretty(config).context("Failed to render config")?);
        }
        OutputFormat::Table => {
            let files = find_config_files();
            println!("{}:", "Config files".cyan());
            if files.is_empty() {
                println!("  None (using defaults)");
            }
            for file in &files {
                println!("  - {}", file.display());
            }

            println!();
            println!("{}:", "Defaults".cyan());
            println!("  shell: {}", config.defaults.shell);
            println!("  timeout_ms: {}", config.defaults.timeout_ms);
            println!("  max_concurrent: {}", config.defaults.max_concurrent);

            println!();
            println!("{}:", "Context".cyan());
            let working_dir = config
                .context
                .expanded_working_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(inherit)".to_string());
            println!("  working_dir: {}", working_dir);
            let policy = if config.context.execution_policy.is_empty() {
                "(Bypass)"
            } else {
                config.context.execution_policy.as_str()
            };
            println!("  execution_policy: {}", policy);
            let mut env: Vec<_> = config.context.env.iter().collect();
            env.sort();
            for (key, value) in env {
                println!("  env.{}: {}", key, value);
            }

            println!();
            println!("{}:", "Shells".cyan());
            for kind in ShellKind::ALL {
                println!("  {}: {}", kind, config.shells.program(kind));
            }
        }
    }

    Ok(())
}
