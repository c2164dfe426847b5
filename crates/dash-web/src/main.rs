use dash_core::scenario::{detect_repo_root, detect_scenario_root, effective_timeout};
use dash_web::{parse_rate_limit_spec, run_web_server, RateLimit, WebError, WebState};
use dashd::{Supervisor, SupervisorConfig};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BIND: &str = "127.0.0.1:8080";

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliArgs {
    bind: String,
    log_dir: Option<PathBuf>,
    timeout_secs: Option<u64>,
    rate_limit: Option<(u32, u32)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliCommand {
    Run(CliArgs),
    Help(String),
}

#[derive(Debug, thiserror::Error)]
enum MainError {
    #[error("{0}")]
    Args(String),
    #[error("failed to inspect working directory: {0}")]
    Cwd(std::io::Error),
    #[error(transparent)]
    Web(#[from] WebError),
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("agent-dashboard failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), MainError> {
    let mut argv = env::args();
    let program = argv.next().unwrap_or_else(|| "dash-web".to_string());
    let command = parse_cli_args(argv.collect::<Vec<_>>(), &program)?;
    let args = match command {
        CliCommand::Run(args) => args,
        CliCommand::Help(text) => {
            println!("{text}");
            return Ok(());
        }
    };

    let cwd = env::current_dir().map_err(MainError::Cwd)?;
    let repo_root = detect_repo_root(&cwd);
    let scenario_root = detect_scenario_root();

    let default_timeout = match args.timeout_secs {
        Some(secs) => Duration::from_secs(secs),
        None => effective_timeout(&scenario_root),
    };
    let log_dir = args
        .log_dir
        .unwrap_or_else(|| repo_root.join(".vrooli/agent-logs"));

    let supervisor = Arc::new(Supervisor::new(SupervisorConfig {
        default_timeout,
        log_dir,
        scenario_root,
        extra_bin_dirs: Vec::new(),
    }));
    let limiter = args
        .rate_limit
        .map(|(rpm, burst)| RateLimit::new(rpm, burst));

    println!("agent-dashboard binding to {}", args.bind);
    run_web_server(&args.bind, WebState::new(supervisor, limiter)).await?;
    Ok(())
}

fn parse_cli_args(args: Vec<String>, program: &str) -> Result<CliCommand, MainError> {
    let mut parsed = CliArgs {
        bind: DEFAULT_BIND.to_string(),
        log_dir: None,
        timeout_secs: None,
        rate_limit: None,
    };

    let mut idx = 0usize;
    while idx < args.len() {
        let arg = &args[idx];
        match arg.as_str() {
            "--help" | "-h" => return Ok(CliCommand::Help(usage(program))),
            "--bind" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| MainError::Args("missing value for --bind".to_string()))?;
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(MainError::Args("bind address must not be empty".to_string()));
                }
                parsed.bind = trimmed.to_string();
            }
            "--log-dir" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| MainError::Args("missing value for --log-dir".to_string()))?;
                parsed.log_dir = Some(PathBuf::from(value));
            }
            "--timeout-secs" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| {
                    MainError::Args("missing value for --timeout-secs".to_string())
                })?;
                let secs: u64 = value.parse().map_err(|_| {
                    MainError::Args(format!("invalid value for --timeout-secs: '{value}'"))
                })?;
                if secs == 0 {
                    return Err(MainError::Args(
                        "--timeout-secs must be greater than zero".to_string(),
                    ));
                }
                parsed.timeout_secs = Some(secs);
            }
            "--rate-limit" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| MainError::Args("missing value for --rate-limit".to_string()))?;
                parsed.rate_limit = Some(parse_rate_limit_spec(value).map_err(MainError::Args)?);
            }
            other => {
                return Err(MainError::Args(format!(
                    "unknown argument: {other}\n\n{}",
                    usage(program)
                )));
            }
        }
        idx += 1;
    }

    Ok(CliCommand::Run(parsed))
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {program} [--bind <ip:port>] [--log-dir <path>] [--timeout-secs <secs>] [--rate-limit <rpm[:burst]>]\n\
Defaults:\n\
  --bind {DEFAULT_BIND}\n\
  --log-dir <repo-root>/.vrooli/agent-logs\n\
  --timeout-secs from the scenario config (600 when absent)\n\
  --rate-limit disabled"
    )
}
