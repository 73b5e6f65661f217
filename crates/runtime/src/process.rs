//! Blocking child-process execution with a wall-clock bound.

use std::io;
use std::process::{Command, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Default bound for both compiling and running a kernel.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Exited(ExitStatus),
    TimedOut,
}

/// Spawn `command` and wait for it, killing the child once `timeout` elapses.
pub fn run_with_timeout(command: &mut Command, timeout: Duration) -> io::Result<Completion> {
    let mut child = command.spawn()?;
    let start = Instant::now();

    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Completion::Exited(status)),
            Ok(None) => {}
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(err);
            }
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            // Reap so the killed child does not linger as a zombie.
            let _ = child.wait();
            return Ok(Completion::TimedOut);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Last `max_lines` lines of `text`, for error messages.
pub fn tail(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_successful_exit() {
        let completion =
            run_with_timeout(&mut Command::new("true"), Duration::from_secs(5)).unwrap();
        assert!(matches!(completion, Completion::Exited(status) if status.success()));
    }

    #[test]
    fn test_failing_exit() {
        let completion =
            run_with_timeout(&mut Command::new("false"), Duration::from_secs(5)).unwrap();
        assert!(matches!(completion, Completion::Exited(status) if !status.success()));
    }

    #[test]
    fn test_timeout_kills_child() {
        let start = Instant::now();
        let completion =
            run_with_timeout(Command::new("sleep").arg("30"), Duration::from_millis(200)).unwrap();
        assert_eq!(completion, Completion::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_missing_binary_is_spawn_error() {
        assert!(run_with_timeout(
            &mut Command::new("/nonexistent/nmbench-binary"),
            Duration::from_secs(1)
        )
        .is_err());
    }

    #[test]
    fn test_tail_keeps_last_lines() {
        assert_eq!(tail("a\nb\nc\nd", 2), "c\nd");
        assert_eq!(tail("a", 5), "a");
        assert_eq!(tail("", 5), "");
    }
}
