//! Bastion - security-awareness progression and assessment engine
//!
//! CLI entry point with global panic handler.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bastion::cli::CommandContext;
use bastion::config::{bastion_home, Config};
use bastion::core::{Difficulty, SurveyInput};
use bastion::error::exit_codes;
use bastion::storage::FileStore;

// =============================================================================
// CLI Definition
// =============================================================================

/// Bastion - security-awareness progression and assessment engine
#[derive(Parser)]
#[command(name = "bastion")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output as JSON
    #[arg(long, short, global = true)]
    json: bool,
    /// Suppress output
    #[arg(long, short, global = true)]
    quiet: bool,
    /// Session that owns served question sets
    #[arg(long, global = true, default_value = "default")]
    session: String,
    /// Data directory (defaults to ~/.bastion/data)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// [Learner] Show module access, final assessment and certificate state
    Status {
        learner: String,
    },

    /// [Learner] Open a module and optionally log time spent in it
    Enter {
        learner: String,
        module: String,
        /// Minutes spent to add
        #[arg(long)]
        minutes: Option<u32>,
    },

    /// [Learner] Serve a knowledge check, or the final assessment without --module
    Quiz {
        learner: String,
        #[arg(long)]
        module: Option<String>,
    },

    /// [Learner] Submit answers to the served knowledge check or final assessment
    Submit {
        learner: String,
        #[arg(long)]
        module: Option<String>,
        /// Answer as QUESTION_ID=LETTER (repeatable)
        #[arg(long = "answer", short = 'a')]
        answers: Vec<String>,
    },

    /// [Learner] Show a scenario, or score choices against it
    Simulate {
        learner: String,
        scenario: String,
        #[arg(long)]
        module: Option<String>,
        /// Choice as DECISION_ID=OPTION_ID (repeatable)
        #[arg(long = "choice", short = 'c')]
        choices: Vec<String>,
        /// Mark the run as completed
        #[arg(long)]
        finalize: bool,
    },

    /// [Learner] Submit the satisfaction survey
    Survey {
        learner: String,
        /// Rating from 1 to 5
        #[arg(long)]
        rating: Option<u8>,
        #[arg(long, default_value = "")]
        feedback: String,
        /// easy, medium or hard
        #[arg(long)]
        difficulty: Option<String>,
        #[arg(long)]
        module: Option<String>,
    },

    /// [Learner] Check whether a certificate can be issued
    Certificate {
        learner: String,
    },

    /// [Learner] Release every question set served in this session
    EndSession,

    /// [Admin] Show learner or aggregate statistics
    Stats {
        learner: Option<String>,
        /// Maximum learner records to aggregate over
        #[arg(long, default_value_t = bastion::cli::stats::DEFAULT_LIMIT)]
        limit: usize,
    },

    /// [Admin] Replace the course catalog from a JSON file
    Import {
        path: PathBuf,
        /// Validate without writing
        #[arg(long)]
        dry_run: bool,
    },
}

// =============================================================================
// Main
// =============================================================================

fn main() -> ExitCode {
    setup_panic_handler();
    init_logging();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("bastion error: {}", e);
            ExitCode::from(exit_codes::ERROR as u8)
        }
    }
}

/// Log to stderr, filtered by `BASTION_LOG` (default `warn`).
fn init_logging() {
    let filter = EnvFilter::try_from_env("BASTION_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Set up the global panic handler.
///
/// On panic, logs to ~/.bastion/crash.log and exits with the error code.
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("bastion panic: {}", info);

        if let Some(home) = bastion_home() {
            let crash_log = home.join("crash.log");
            if let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&crash_log)
            {
                let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
                let _ = writeln!(file, "[{}] {}", timestamp, info);
            }
        }

        std::process::exit(exit_codes::ERROR);
    }));
}

/// Run the CLI and return the exit code.
fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load();

    let store = match &cli.data_dir {
        Some(dir) => FileStore::with_dir(dir)?,
        None => FileStore::new()?,
    };
    let ctx = CommandContext::new(store, config, cli.session.as_str());
    let (json, quiet) = (cli.json, cli.quiet);

    match cli.command {
        Commands::Status { learner } => run_status(ctx, &learner, json, quiet),
        Commands::Enter {
            learner,
            module,
            minutes,
        } => run_enter(ctx, &learner, &module, minutes, json, quiet),
        Commands::Quiz { learner, module } => run_quiz(ctx, &learner, module.as_deref(), json, quiet),
        Commands::Submit {
            learner,
            module,
            answers,
        } => run_submit(ctx, &learner, module.as_deref(), &answers, json, quiet),
        Commands::Simulate {
            learner,
            scenario,
            module,
            choices,
            finalize,
        } => run_simulate(
            ctx,
            &learner,
            &scenario,
            module.as_deref(),
            &choices,
            finalize,
            json,
            quiet,
        ),
        Commands::Survey {
            learner,
            rating,
            feedback,
            difficulty,
            module,
        } => {
            let difficulty = difficulty
                .as_deref()
                .map(str::parse::<Difficulty>)
                .transpose()?;
            let input = SurveyInput {
                rating,
                feedback,
                difficulty,
                module_id: module,
            };
            run_survey(ctx, &learner, &input, json, quiet)
        }
        Commands::Certificate { learner } => run_certificate(ctx, &learner, json, quiet),
        Commands::EndSession => run_end_session(ctx, quiet),
        Commands::Stats { learner, limit } => run_stats(ctx, learner.as_deref(), limit, json, quiet),
        Commands::Import { path, dry_run } => run_import(ctx, &path, dry_run, json, quiet),
    }
}

/// Map a command outcome to an exit code.
fn outcome_to_exit_code(success: bool, denied: bool) -> ExitCode {
    if denied {
        ExitCode::from(exit_codes::DENIED as u8)
    } else if success {
        ExitCode::from(exit_codes::OK as u8)
    } else {
        ExitCode::from(exit_codes::ERROR as u8)
    }
}

fn print(formatted: &str) {
    if !formatted.is_empty() {
        print!("{}", formatted);
        if !formatted.ends_with('\n') {
            println!();
        }
    }
}

type CliResult = Result<ExitCode, Box<dyn std::error::Error>>;

fn run_status(ctx: CommandContext<FileStore>, learner: &str, json: bool, quiet: bool) -> CliResult {
    use bastion::cli::status::{StatusCommand, StatusOptions};

    let cmd = StatusCommand::new(ctx);
    let options = StatusOptions { json, quiet };
    let output = cmd.run(learner);
    print(&cmd.format_output(&output, &options));

    Ok(outcome_to_exit_code(output.success, false))
}

fn run_enter(
    ctx: CommandContext<FileStore>,
    learner: &str,
    module: &str,
    minutes: Option<u32>,
    json: bool,
    quiet: bool,
) -> CliResult {
    use bastion::cli::enter::{EnterCommand, EnterOptions};

    let cmd = EnterCommand::new(ctx);
    let options = EnterOptions {
        json,
        quiet,
        minutes,
    };
    let output = cmd.run(learner, module, &options);
    print(&cmd.format_output(&output, &options));

    Ok(outcome_to_exit_code(output.success, output.denied))
}

fn run_quiz(
    ctx: CommandContext<FileStore>,
    learner: &str,
    module: Option<&str>,
    json: bool,
    quiet: bool,
) -> CliResult {
    use bastion::cli::quiz::{QuizCommand, QuizOptions};

    let cmd = QuizCommand::new(ctx);
    let options = QuizOptions { json, quiet };
    let output = cmd.run(learner, module);
    print(&cmd.format_output(&output, &options));

    Ok(outcome_to_exit_code(output.success, output.denied))
}

fn run_submit(
    ctx: CommandContext<FileStore>,
    learner: &str,
    module: Option<&str>,
    answers: &[String],
    json: bool,
    quiet: bool,
) -> CliResult {
    use bastion::cli::parse_pairs;
    use bastion::cli::submit::{SubmitCommand, SubmitOptions};

    let answers = parse_pairs(answers)?;
    let cmd = SubmitCommand::new(ctx);
    let options = SubmitOptions { json, quiet };
    let output = cmd.run(learner, module, &answers);
    print(&cmd.format_output(&output, &options));

    Ok(outcome_to_exit_code(output.success, output.denied))
}

#[allow(clippy::too_many_arguments)]
fn run_simulate(
    ctx: CommandContext<FileStore>,
    learner: &str,
    scenario: &str,
    module: Option<&str>,
    choices: &[String],
    finalize: bool,
    json: bool,
    quiet: bool,
) -> CliResult {
    use bastion::cli::parse_pairs;
    use bastion::cli::simulate::{SimulateCommand, SimulateOptions};

    let choices: HashMap<String, String> = parse_pairs(choices)?;
    let cmd = SimulateCommand::new(ctx);
    let options = SimulateOptions {
        json,
        quiet,
        finalize,
    };
    let output = cmd.run(learner, scenario, module, &choices, &options);
    print(&cmd.format_output(&output, &options));

    Ok(outcome_to_exit_code(output.success, output.denied))
}

fn run_survey(
    ctx: CommandContext<FileStore>,
    learner: &str,
    input: &SurveyInput,
    json: bool,
    quiet: bool,
) -> CliResult {
    use bastion::cli::survey::{SurveyCommand, SurveyOptions};

    let cmd = SurveyCommand::new(ctx);
    let options = SurveyOptions { json, quiet };
    let output = cmd.run(learner, input);
    print(&cmd.format_output(&output, &options));

    Ok(outcome_to_exit_code(output.success, output.denied))
}

fn run_certificate(
    ctx: CommandContext<FileStore>,
    learner: &str,
    json: bool,
    quiet: bool,
) -> CliResult {
    use bastion::cli::certificate::{CertificateCommand, CertificateOptions};

    let cmd = CertificateCommand::new(ctx);
    let options = CertificateOptions { json, quiet };
    let output = cmd.run(learner);
    print(&cmd.format_output(&output, &options));

    Ok(outcome_to_exit_code(output.success, output.denied))
}

fn run_end_session(ctx: CommandContext<FileStore>, quiet: bool) -> CliResult {
    ctx.with_engine(|engine| engine.end_session())?;
    if !quiet {
        println!("Session {} ended", ctx.session_id);
    }
    Ok(ExitCode::from(exit_codes::OK as u8))
}

fn run_stats(
    ctx: CommandContext<FileStore>,
    learner: Option<&str>,
    limit: usize,
    json: bool,
    quiet: bool,
) -> CliResult {
    use bastion::cli::stats::{StatsCommand, StatsOptions};

    let cmd = StatsCommand::new(ctx);
    let options = StatsOptions { json, quiet, limit };
    let output = cmd.run(learner, &options);
    print(&cmd.format_output(&output, &options));

    Ok(outcome_to_exit_code(output.success, false))
}

fn run_import(
    ctx: CommandContext<FileStore>,
    path: &std::path::Path,
    dry_run: bool,
    json: bool,
    quiet: bool,
) -> CliResult {
    use bastion::cli::import::{ImportCommand, ImportOptions};

    let cmd = ImportCommand::new(ctx);
    let options = ImportOptions {
        json,
        quiet,
        dry_run,
    };
    let output = cmd.run(path, &options);
    print(&cmd.format_output(&output, &options));

    Ok(outcome_to_exit_code(output.success, false))
}
