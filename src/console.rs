use crate::config::Config;
use crate::error::{BenchmarkError, Result};
use crate::logger::Log;

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Per-invocation options for [`Console::sh_opts`].
#[derive(Debug, Clone)]
pub struct RunOpts {
    /// Return the captured output on a nonzero exit instead of raising.
    pub can_fail: bool,
    /// Wall-clock deadline; the child is killed when it expires.
    pub timeout: Duration,
    /// Redact the command text from logs and error messages.
    pub secret: bool,
    /// Prepended to every logged output line.
    pub prefix: String,
    /// Extra environment variables for the child.
    pub env: Option<BTreeMap<String, String>>,
}

impl Default for RunOpts {
    fn default() -> Self {
        RunOpts {
            can_fail: false,
            timeout: Duration::from_secs(Config::default().shell_timeout_secs),
            secret: false,
            prefix: String::new(),
            env: None,
        }
    }
}

impl RunOpts {
    pub fn timeout(seconds: u64) -> RunOpts {
        RunOpts {
            timeout: Duration::from_secs(seconds),
            ..RunOpts::default()
        }
    }
}

/// Runs shell commands on the host.
pub struct Console {
    pub shell_verbose: bool,
    pub live_output: bool,
    log: Log,
}

impl Console {
    pub fn new(log: Log) -> Console {
        Console {
            shell_verbose: true,
            live_output: false,
            log,
        }
    }

    /// A console that streams child stdout to the sink line by line.
    pub fn with_live_output(log: Log) -> Console {
        Console {
            shell_verbose: true,
            live_output: true,
            log,
        }
    }

    pub fn log(&self) -> &Log {
        &self.log
    }

    /// Run `command` with default options.
    pub fn sh(&self, command: &str) -> Result<String> {
        self.sh_opts(command, &RunOpts::default())
    }

    /// Run `command` through the shell.
    ///
    /// Returns the captured stdout with stderr appended, trimmed. Raises on
    /// nonzero exit unless `opts.can_fail`, and on timeout always.
    pub fn sh_opts(&self, command: &str, opts: &RunOpts) -> Result<String> {
        if self.shell_verbose && !opts.secret {
            self.log.info(&format!("> {}", command));
        }

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(env) = &opts.env {
            cmd.envs(env);
        }
        let mut child = cmd.spawn()?;

        let deadline = Instant::now() + opts.timeout;
        let display = if opts.secret {
            "<secret>".to_string()
        } else {
            command.to_string()
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stderr_handle = thread::spawn(move || match stderr {
            Some(pipe) => read_lossy(pipe),
            None => String::new(),
        });

        let mut lines = Vec::new();
        let stdout_handle = if self.live_output {
            // The read loop ends when the child closes its stdout; the
            // deadline only covers the wait that follows.
            if let Some(pipe) = stdout {
                for line in BufReader::new(pipe).lines() {
                    let line = line?;
                    self.log.info(&format!("{}{}", opts.prefix, line));
                    lines.push(line);
                }
            }
            None
        } else {
            Some(thread::spawn(move || match stdout {
                Some(pipe) => read_lossy(pipe),
                None => String::new(),
            }))
        };

        let status = self.wait_or_kill(&mut child, deadline, &display, opts.timeout)?;

        let outs = match stdout_handle {
            Some(handle) => {
                let text = handle.join().unwrap_or_default();
                self.log.info(&format!("{}{}", opts.prefix, text));
                text
            }
            None => lines.join("\n"),
        };
        let errs = stderr_handle.join().unwrap_or_default();
        if !errs.is_empty() {
            self.log.error(&format!("{}{}", opts.prefix, errs));
        }

        if !status.success() && !opts.can_fail {
            let code = status.code().unwrap_or(-1);
            self.log.error(&format!(
                "Subprocess '{}' failed with exit code {}",
                display, code
            ));
            return Err(BenchmarkError::CommandFailed {
                command: display,
                code,
            });
        }

        let mut combined = outs.trim_end().to_string();
        if !errs.is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str(errs.trim_end());
        }
        Ok(combined.trim().to_string())
    }

    fn wait_or_kill(
        &self,
        child: &mut Child,
        deadline: Instant,
        display: &str,
        timeout: Duration,
    ) -> Result<ExitStatus> {
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                self.log.error("Console script timeout");
                return Err(BenchmarkError::CommandTimeout {
                    command: display.to_string(),
                    seconds: timeout.as_secs(),
                });
            }
            thread::sleep(Duration::from_millis(25));
        }
    }
}

fn read_lossy(mut pipe: impl Read) -> String {
    let mut buf = Vec::new();
    let _ = pipe.read_to_end(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}
