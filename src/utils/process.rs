use crate::error::AppError;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

/// Shared cancellation flag, raised from the Ctrl-C handler
pub type CancelFlag = Arc<AtomicBool>;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Captured output of a finished command
#[derive(Debug, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `program` to completion, killing it if `cancel` is raised.
///
/// Failures to start or a non-zero exit are mapped through `fail` so each
/// caller reports its own stage. `on_tick` runs on every poll while the child
/// is alive.
pub fn run_command(
    program: &str,
    args: &[String],
    cancel: &AtomicBool,
    fail: fn(String) -> AppError,
    mut on_tick: Option<&mut dyn FnMut()>,
) -> Result<CommandOutput, AppError> {
    if cancel.load(Ordering::Relaxed) {
        return Err(AppError::Cancelled);
    }

    debug!("{} args: {:?}", program, args);

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| fail(format!("Failed to start {}: {}", program, e)))?;

    // Drain both pipes so a chatty child never blocks on a full buffer
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    loop {
        if cancel.load(Ordering::Relaxed) {
            debug!("Cancellation requested, killing {}", program);
            kill_child(&mut child);
            let _ = collect(stdout);
            let _ = collect(stderr);
            return Err(AppError::Cancelled);
        }

        if let Some(tick) = on_tick.as_deref_mut() {
            tick();
        }

        match child.try_wait() {
            Ok(Some(status)) => {
                let output = CommandOutput {
                    stdout: collect(stdout),
                    stderr: collect(stderr),
                };
                if !status.success() {
                    return Err(fail(failure_message(program, status, &output.stderr)));
                }
                return Ok(output);
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                kill_child(&mut child);
                return Err(fail(format!("Failed to check {} status: {}", program, e)));
            }
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut p| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = p.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

fn kill_child(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn failure_message(program: &str, status: ExitStatus, stderr: &str) -> String {
    if stderr.trim().is_empty() {
        format!("{} failed with status: {}", program, status)
    } else {
        let last_lines: Vec<&str> = stderr.lines().rev().take(5).collect();
        format!(
            "{} failed ({}): {}",
            program,
            status,
            last_lines.into_iter().rev().collect::<Vec<_>>().join("\n")
        )
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_captures_stdout() {
        let cancel = AtomicBool::new(false);
        let out = run_command("sh", &args(&["-c", "echo hello"]), &cancel, AppError::Probe, None)
            .unwrap();
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn test_failure_uses_stage_and_stderr_tail() {
        let cancel = AtomicBool::new(false);
        let err = run_command(
            "sh",
            &args(&["-c", "echo broken pipe >&2; exit 3"]),
            &cancel,
            AppError::Encode,
            None,
        )
        .unwrap_err();
        match err {
            AppError::Encode(msg) => assert!(msg.contains("broken pipe")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_program() {
        let cancel = AtomicBool::new(false);
        let err = run_command("definitely-not-a-tool-42", &[], &cancel, AppError::Score, None)
            .unwrap_err();
        assert!(matches!(err, AppError::Score(_)));
    }

    #[test]
    fn test_cancel_kills_running_child() {
        let cancel: CancelFlag = Arc::new(AtomicBool::new(false));
        let flag = cancel.clone();
        let setter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            flag.store(true, Ordering::Relaxed);
        });

        let started = Instant::now();
        let err = run_command("sleep", &args(&["10"]), &cancel, AppError::Encode, None)
            .unwrap_err();
        setter.join().unwrap();

        assert!(matches!(err, AppError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_already_cancelled_never_spawns() {
        let cancel = AtomicBool::new(true);
        let mut ticks = 0;
        let mut count = || ticks += 1;
        let tick: &mut dyn FnMut() = &mut count;
        let err = run_command("sh", &args(&["-c", "true"]), &cancel, AppError::Encode, Some(tick))
            .unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
        assert_eq!(ticks, 0);
    }
}
