use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use benchmark_models::console::{Console, RunOpts};
use benchmark_models::error::BenchmarkError;
use benchmark_models::logger::{Log, MemoryLog};

fn console() -> (Console, Arc<MemoryLog>) {
    let log = Arc::new(MemoryLog::new());
    let sink: Log = log.clone();
    (Console::new(sink), log)
}

#[test]
fn captures_and_trims_stdout() {
    let (console, _) = console();
    assert_eq!(console.sh("echo hello").unwrap(), "hello");
}

#[test]
fn merges_stderr_after_stdout() {
    let (console, _) = console();
    let output = console.sh("echo out; echo err 1>&2").unwrap();
    assert_eq!(output, "out\nerr");
}

#[test]
fn logs_the_command_before_running_it() {
    let (console, log) = console();
    console.sh("echo hello").unwrap();
    assert!(log.contains("> echo hello"));
}

#[test]
fn nonzero_exit_is_fatal_by_default() {
    let (console, _) = console();
    let err = console.sh("exit 3").unwrap_err();
    match err {
        BenchmarkError::CommandFailed { command, code } => {
            assert_eq!(command, "exit 3");
            assert_eq!(code, 3);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn can_fail_returns_output_despite_exit_code() {
    let (console, _) = console();
    let opts = RunOpts {
        can_fail: true,
        ..RunOpts::default()
    };
    let output = console.sh_opts("echo boom; exit 1", &opts).unwrap();
    assert_eq!(output, "boom");
}

#[test]
fn timeout_kills_the_child() {
    let (console, log) = console();
    let opts = RunOpts {
        timeout: Duration::from_millis(300),
        ..RunOpts::default()
    };
    let started = Instant::now();
    let err = console.sh_opts("sleep 5", &opts).unwrap_err();
    assert!(matches!(err, BenchmarkError::CommandTimeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(log.contains("Console script timeout"));
}

#[test]
fn secret_commands_are_redacted() {
    let (console, log) = console();
    let opts = RunOpts {
        secret: true,
        ..RunOpts::default()
    };
    let err = console.sh_opts("exit 7", &opts).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("<secret>"));
    assert!(!message.contains("exit 7"));
    assert!(!log.contains("exit 7"));
}

#[test]
fn extra_env_vars_reach_the_child() {
    let (console, _) = console();
    let mut env = BTreeMap::new();
    env.insert("BENCH_TEST_VAR".to_string(), "42".to_string());
    let opts = RunOpts {
        env: Some(env),
        ..RunOpts::default()
    };
    assert_eq!(console.sh_opts("echo $BENCH_TEST_VAR", &opts).unwrap(), "42");
}

#[test]
fn live_output_streams_each_line_with_prefix() {
    let log = Arc::new(MemoryLog::new());
    let sink: Log = log.clone();
    let console = Console::with_live_output(sink);

    let opts = RunOpts {
        prefix: "[m] ".to_string(),
        ..RunOpts::default()
    };
    let output = console.sh_opts("printf 'a\\nb\\n'", &opts).unwrap();
    assert_eq!(output, "a\nb");
    assert!(log.contains("[m] a"));
    assert!(log.contains("[m] b"));
}
