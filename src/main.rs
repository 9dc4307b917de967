/*!
 * Pipeworks - Main Entry Point
 *
 * Command line front end:
 * - `pipe`: run a shell-style pipeline split on a separator token
 * - `run`: run a program inside the deadline-bounded sandbox
 */

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing::debug;

use pipeworks::core::limits::{
    CLI_EXEC_FAILURE_EXIT_CODE, CLI_SIGNAL_EXIT_BASE, CLI_SYSTEM_ERROR_EXIT_CODE,
    CLI_TIMEOUT_EXIT_CODE,
};
use pipeworks::monitoring::json_requested;
use pipeworks::process::ExecCommand;
use pipeworks::{
    init_tracing, BoundedExecutor, BoundedTask, ExecFailureMode, HarnessConfig, Pipeline,
    PipelineExecutor, StageSpec, TaskOutcome,
};

/// Top-level CLI parser for `pipeworks`
#[derive(Debug, Parser)]
#[command(
    name = "pipeworks",
    version,
    about = "Shell-style pipelines and deadline-bounded sandboxed runs"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run programs connected by pipes: `pipe -- echo hi '|' tr a-z A-Z`
    Pipe {
        /// Token separating stages
        #[arg(long, default_value = "|")]
        sep: String,

        /// Report unexecutable programs distinctly instead of as exit status 1
        #[arg(long)]
        distinct_exec_failure: bool,

        /// Print the pipeline result as JSON on stderr
        #[arg(long)]
        json: bool,

        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        words: Vec<String>,
    },

    /// Run one program in the sandbox under a deadline
    Run {
        /// Deadline in seconds, 0 for none
        #[arg(long)]
        timeout: Option<f64>,

        /// Print a classification line on stdout
        #[arg(long)]
        verbose: bool,

        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        words: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = HarnessConfig::from_env().context("reading PIPEWORKS_* environment")?;
    init_tracing(config.trace_json || json_requested());

    let code = match cli.command {
        Command::Pipe {
            sep,
            distinct_exec_failure,
            json,
            words,
        } => {
            let mut pipeline_config = config.pipeline;
            if distinct_exec_failure {
                pipeline_config.exec_failure = ExecFailureMode::Distinct;
            }

            let pipeline = split_stages(&words, &sep)?;
            debug!(%pipeline, "Parsed pipeline");
            let result = PipelineExecutor::new(pipeline_config).run(&pipeline);
            if json {
                eprintln!("{}", serde_json::to_string_pretty(&result)?);
            }
            result.exit_code()
        }
        Command::Run {
            timeout,
            verbose,
            words,
        } => {
            let deadline = match timeout {
                Some(secs) => Duration::try_from_secs_f64(secs)
                    .with_context(|| format!("invalid --timeout {}", secs))?,
                None => config.sandbox.default_deadline,
            };
            let command = ExecCommand::new(&words[0], &words)?;

            let task = BoundedTask::new(move || {
                let errno = command.exec();
                eprintln!("pipeworks: cannot execute {:?}: {}", command.program(), errno.desc());
                // SAFETY: terminates the forked child without unwinding into the caller
                unsafe { nix::libc::_exit(CLI_EXEC_FAILURE_EXIT_CODE) }
            })
            .with_deadline(deadline)
            .with_verbose(verbose || config.sandbox.verbose);

            exit_code_for(&BoundedExecutor::new(config.sandbox).run(task))
        }
    };

    std::process::exit(code)
}

/// Split `words` into stages on the literal `sep` token
fn split_stages(words: &[String], sep: &str) -> Result<Pipeline> {
    let mut stages = Vec::new();
    for (index, argv) in words.split(|w| w == sep).enumerate() {
        if argv.is_empty() {
            bail!("stage {} is empty", index);
        }
        stages.push(StageSpec::with_argv(argv[0].clone(), argv.to_vec()));
    }
    Ok(Pipeline::new(stages))
}

fn exit_code_for(outcome: &TaskOutcome) -> i32 {
    match outcome {
        TaskOutcome::Success => 0,
        TaskOutcome::ApplicationFailure(code) => *code,
        TaskOutcome::KilledBySignal { signal } => CLI_SIGNAL_EXIT_BASE + *signal as i32,
        TaskOutcome::TimedOut { .. } => CLI_TIMEOUT_EXIT_CODE,
        TaskOutcome::SystemError(_) => CLI_SYSTEM_ERROR_EXIT_CODE,
    }
}
