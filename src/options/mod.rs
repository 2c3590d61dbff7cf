//! Runtime options.
//!
//! Runtime flags come from the `GRAFT_RTS` environment variable and from the
//! command line between `+RTS` and `-RTS`. Everything else belongs to the
//! program being run.
//!
//! ```text
//! graft a b +RTS -N4 -C0.5 -RTS c -- d +RTS e
//!       ^^^ program   runtime      ^ program  ^^^^^^^^^^^ program (after --)
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::runtime::{registers::REGISTERS_PER_KIND, stack::DEFAULT_STACK_LIMIT, vm::apply_table};

pub const RTS_ENV_VAR: &str = "GRAFT_RTS";
pub const DEFAULT_SPARK_BUDGET: usize = 4096;

pub const USAGE: &str = "\
usage: graft [program args] [+RTS <rts options> -RTS] [--RTS | -- program args]

runtime options:
  -N[<n>]     number of workers (bare -N means 1)
  -C[<secs>]  idle time before a worker may retire (default 0, disabled)
  -e<n>       spark budget: maximum outstanding sparks
  -K<n>       continuation stack limit in frames
  -Ds         trace the scheduler
  --info      print runtime information and exit
  -?          print this message";

/// Independent diagnostic toggles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugFlags {
    pub scheduler: bool,
}

/// Numeric knobs consumed by the worker pool and execution contexts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeOptions {
    pub worker_count: usize,
    /// Milliseconds a worker may idle before retiring. Zero disables retiring.
    pub idle_timeout_ms: u64,
    pub spark_budget: usize,
    /// Continuation stack depth limit, in frames.
    pub stack_limit: usize,
    pub debug: DebugFlags,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get().max(1),
            idle_timeout_ms: 0,
            spark_budget: DEFAULT_SPARK_BUDGET,
            stack_limit: DEFAULT_STACK_LIMIT,
            debug: DebugFlags::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionProblem {
    #[error("unexpected RTS argument: {0}")]
    UnexpectedArgument(String),
    #[error("unknown RTS options: {0}")]
    UnknownLongOption(String),
    #[error("unknown RTS option: {0}")]
    UnknownOption(String),
    #[error("bad RTS option: {0}")]
    BadOption(String),
    #[error("bad value for -{flag}")]
    BadValue { flag: char, value: String },
}

/// Every problem found while parsing, in the order found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", render_problems(.problems))]
pub struct OptionsError {
    pub problems: Vec<OptionProblem>,
}

fn render_problems(problems: &[OptionProblem]) -> String {
    problems.iter().map(|p| p.to_string()).collect::<Vec<_>>().join("\n")
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedArgs {
    pub options: RuntimeOptions,
    pub program_args: Vec<String>,
    /// Runtime arguments in processing order: environment first.
    pub rts_args: Vec<String>,
    pub show_info: bool,
    pub show_usage: bool,
}

/// Reads `GRAFT_RTS` and parses it together with `args` (program name excluded).
pub fn from_env_and_args(args: &[String]) -> Result<ParsedArgs, OptionsError> {
    let env = std::env::var(RTS_ENV_VAR).ok();
    parse(env.as_deref(), args)
}

/// Parses runtime options from an optional environment string and the
/// command-line arguments, starting from the defaults.
pub fn parse(env: Option<&str>, args: &[String]) -> Result<ParsedArgs, OptionsError> {
    let mut rts_args: Vec<String> = env
        .map(|s| s.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    let mut program_args = Vec::new();

    let mut in_rts = false;
    let mut rest = args.iter();
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--RTS" => break,
            "--" => {
                program_args.push(arg.clone());
                break;
            }
            "+RTS" => in_rts = true,
            "-RTS" => in_rts = false,
            _ if in_rts => rts_args.push(arg.clone()),
            _ => program_args.push(arg.clone()),
        }
    }
    program_args.extend(rest.cloned());

    let mut parsed = ParsedArgs {
        options: RuntimeOptions::default(),
        program_args,
        rts_args: Vec::new(),
        show_info: false,
        show_usage: false,
    };
    let mut problems = Vec::new();
    for arg in &rts_args {
        apply_flag(arg, &mut parsed, &mut problems);
    }
    parsed.rts_args = rts_args;

    if problems.is_empty() {
        Ok(parsed)
    } else {
        Err(OptionsError { problems })
    }
}

fn apply_flag(arg: &str, parsed: &mut ParsedArgs, problems: &mut Vec<OptionProblem>) {
    let Some(body) = arg.strip_prefix('-') else {
        problems.push(OptionProblem::UnexpectedArgument(arg.to_string()));
        return;
    };
    let mut chars = body.chars();
    let Some(flag) = chars.next() else {
        problems.push(OptionProblem::UnknownOption(arg.to_string()));
        return;
    };
    let value = chars.as_str();
    let options = &mut parsed.options;

    match flag {
        '?' => parsed.show_usage = true,
        '-' => {
            if value == "info" {
                parsed.show_info = true;
            } else {
                problems.push(OptionProblem::UnknownLongOption(arg.to_string()));
            }
        }
        'D' => {
            for c in value.chars() {
                match c {
                    's' => options.debug.scheduler = true,
                    _ => {
                        problems.push(OptionProblem::BadOption(arg.to_string()));
                        break;
                    }
                }
            }
        }
        'C' => {
            if value.is_empty() {
                options.idle_timeout_ms = 0;
            } else {
                match value.parse::<f32>() {
                    Ok(secs) if secs.is_finite() && secs >= 0.0 => {
                        options.idle_timeout_ms = (1000.0 * secs) as u64;
                    }
                    _ => problems.push(bad_value('C', value)),
                }
            }
        }
        'N' => {
            if value.is_empty() {
                options.worker_count = 1;
            } else {
                match positive(value) {
                    Some(n) => options.worker_count = n,
                    None => problems.push(bad_value('N', value)),
                }
            }
        }
        'e' => {
            if !value.is_empty() {
                match positive(value) {
                    Some(n) => options.spark_budget = n,
                    None => problems.push(bad_value('e', value)),
                }
            }
        }
        'K' => match positive(value) {
            Some(n) => options.stack_limit = n,
            None => problems.push(bad_value('K', value)),
        },
        _ => problems.push(OptionProblem::UnknownOption(arg.to_string())),
    }
}

fn positive(value: &str) -> Option<usize> {
    value.parse::<usize>().ok().filter(|n| *n > 0)
}

fn bad_value(flag: char, value: &str) -> OptionProblem {
    OptionProblem::BadValue {
        flag,
        value: value.to_string(),
    }
}

/// Report printed by `--info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeInfo {
    pub name: String,
    pub version: String,
    pub registers_per_kind: usize,
    pub apply_schemas: Vec<String>,
    pub options: RuntimeOptions,
}

impl RuntimeInfo {
    pub fn new(options: &RuntimeOptions) -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            registers_per_kind: REGISTERS_PER_KIND,
            apply_schemas: apply_table::global().schema_codes(),
            options: options.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
