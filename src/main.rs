use std::{env, process};

use graft::{
    options::{self, ParsedArgs, RuntimeInfo, RuntimeOptions, USAGE},
    runtime::{
        closure::Closure,
        compiled_function::Step,
        frame::Frame,
        pool::WorkerPool,
        value::Value,
    },
};
use serde_json::json;
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_SUM_TO: i64 = 1_000_000;

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let parsed = match options::from_env_and_args(&args) {
        Ok(parsed) => parsed,
        Err(err) => {
            for problem in &err.problems {
                eprintln!("graft: {}", problem);
            }
            eprintln!("{}", USAGE);
            process::exit(1);
        }
    };

    if parsed.show_usage {
        eprintln!("{}", USAGE);
        process::exit(1);
    }
    if parsed.show_info {
        match RuntimeInfo::new(&parsed.options).to_json() {
            Ok(json) => println!("{}", json),
            Err(err) => {
                eprintln!("Error: failed to render runtime info: {}", err);
                process::exit(1);
            }
        }
        return;
    }

    init_logging(&parsed.options);

    let Some((sum_to, roots)) = extract_workload(&parsed) else {
        process::exit(1);
    };
    run_demo(parsed.options, sum_to, roots);
}

fn init_logging(options: &RuntimeOptions) {
    let default = if options.debug.scheduler {
        "warn,graft::scheduler=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// Positional program arguments: `[sum-to] [roots]`.
fn extract_workload(parsed: &ParsedArgs) -> Option<(i64, usize)> {
    let mut positional = parsed.program_args.iter().filter(|arg| arg.as_str() != "--");
    let sum_to = match positional.next() {
        Some(value) => match value.parse::<i64>() {
            Ok(n) if n >= 0 => n,
            _ => {
                eprintln!("Error: sum-to expects a non-negative integer, got {}", value);
                return None;
            }
        },
        None => DEFAULT_SUM_TO,
    };
    let roots = match positional.next() {
        Some(value) => match value.parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => {
                eprintln!("Error: roots expects a positive integer, got {}", value);
                return None;
            }
        },
        None => parsed.options.worker_count.max(1) * 2,
    };
    Some((sum_to, roots))
}

/// `sum(self, acc, i)`: tail-recursive `acc + i + (i - 1) + ... + 1`.
fn sum_loop() -> Closure {
    Closure::function("sum", 3, |ctx, _| {
        let this = ctx.r(1)?;
        let acc = ctx.l(1)?;
        let i = ctx.l(2)?;
        if i == 0 {
            return Ok(ctx.ret(Closure::boxed(Value::Long(acc))));
        }
        Ok(Step::Apply(
            this.clone(),
            vec![Value::Boxed(this), Value::Long(acc.wrapping_add(i)), Value::Long(i - 1)],
        ))
    })
}

/// Every root sparks and then demands one shared thunk, so the sum is
/// computed once no matter how many workers race for it.
fn build_workload(sum_to: i64, roots: usize) -> Vec<Closure> {
    let sum = sum_loop();
    let shared = Closure::thunk(Vec::new(), move |_, _| {
        Ok(Step::Apply(
            sum.clone(),
            vec![Value::Boxed(sum.clone()), Value::Long(0), Value::Long(sum_to)],
        ))
    });

    (0..roots)
        .map(|root| {
            let shared = shared.clone();
            Closure::thunk(vec![Value::Long(root as i64)], move |ctx, free| {
                ctx.spark(shared.clone());
                ctx.push(Frame::case(free.to_vec(), |ctx, free| {
                    let total = ctx.r(1)?.unboxed().and_then(|v| v.as_long()).unwrap_or(0);
                    let offset = free.first().and_then(Value::as_long).unwrap_or(0);
                    Ok(ctx.ret(Closure::boxed(Value::Long(total + offset))))
                }))?;
                Ok(Step::Enter(shared.clone()))
            })
        })
        .collect()
}

fn run_demo(options: RuntimeOptions, sum_to: i64, roots: usize) {
    let pool = match WorkerPool::new(options) {
        Ok(pool) => pool,
        Err(err) => {
            eprintln!("Error: {}", err);
            process::exit(1);
        }
    };

    let report = pool.run(build_workload(sum_to, roots));
    let mut failed = false;
    let results: Vec<String> = report
        .results
        .iter()
        .map(|result| match result {
            Ok(value) => value.resolve().to_string(),
            Err(err) => {
                failed = true;
                format!("error: {}", err)
            }
        })
        .collect();

    let summary = json!({
        "sum_to": sum_to,
        "results": results,
        "stats": report.stats,
        "pool": report.counters,
    });
    match serde_json::to_string_pretty(&summary) {
        Ok(text) => println!("{}", text),
        Err(err) => {
            eprintln!("Error: failed to render report: {}", err);
            process::exit(1);
        }
    }
    if failed {
        process::exit(1);
    }
}
