//! Browser-presence detection and the wait-for-exit loop.

use std::time::Duration;

use serde::Serialize;

/// Answers "is the browser running right now?".
pub trait ProcessProbe {
    fn is_running(&self) -> bool;
}

/// Sleeps between presence polls.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Real wall-clock sleeper.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Matches process names against the running process table.
///
/// Linux reads `/proc/<pid>/comm`. Elsewhere `pgrep -x` is consulted; if it
/// cannot be spawned the browser is assumed not to be running.
#[derive(Debug, Clone)]
pub struct SystemProbe {
    names: Vec<String>,
}

impl SystemProbe {
    #[must_use]
    pub fn new(names: &[String]) -> Self {
        Self {
            names: names.to_vec(),
        }
    }

    fn matches(&self, comm: &str) -> bool {
        self.names.iter().any(|n| n == comm)
    }
}

impl ProcessProbe for SystemProbe {
    #[cfg(target_os = "linux")]
    fn is_running(&self) -> bool {
        let Ok(proc_dir) = std::fs::read_dir("/proc") else {
            return false;
        };
        for entry in proc_dir {
            let Ok(entry) = entry else {
                continue;
            };
            let name = entry.file_name();
            if !name.to_string_lossy().chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            let comm = std::fs::read_to_string(entry.path().join("comm")).unwrap_or_default();
            if self.matches(comm.trim()) {
                return true;
            }
        }
        false
    }

    #[cfg(not(target_os = "linux"))]
    fn is_running(&self) -> bool {
        use std::process::{Command, Stdio};
        self.names.iter().any(|name| {
            Command::new("pgrep")
                .arg("-x")
                .arg(name)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .is_ok_and(|s| s.success())
        })
    }
}

/// How the wait loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserWait {
    /// Not running on the first check.
    NotRunning,
    /// Was running; exited after this many polls.
    Exited { polls: u64 },
    /// Running, but the caller asked not to block.
    ProceededWhileRunning,
}

/// Check the probe and, when `block` is set, poll until the browser exits.
///
/// There is no timeout: an interactive user aborts with Ctrl-C. `on_first_wait`
/// runs once, before the first sleep, so callers can tell the user why they
/// are waiting.
pub fn wait_for_browser_exit<P, S, F>(
    probe: &P,
    sleeper: &mut S,
    interval: Duration,
    block: bool,
    mut on_first_wait: F,
) -> BrowserWait
where
    P: ProcessProbe + ?Sized,
    S: Sleeper + ?Sized,
    F: FnMut(),
{
    if !probe.is_running() {
        return BrowserWait::NotRunning;
    }
    if !block {
        return BrowserWait::ProceededWhileRunning;
    }

    on_first_wait();
    let mut polls = 0_u64;
    while probe.is_running() {
        sleeper.sleep(interval);
        polls += 1;
    }
    BrowserWait::Exited { polls }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// Reports "running" for the first `remaining` checks.
    struct CountdownProbe {
        remaining: Cell<u32>,
    }

    impl ProcessProbe for CountdownProbe {
        fn is_running(&self) -> bool {
            let left = self.remaining.get();
            if left == 0 {
                return false;
            }
            self.remaining.set(left - 1);
            true
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        slept: Vec<Duration>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&mut self, duration: Duration) {
            self.slept.push(duration);
        }
    }

    #[test]
    fn not_running_never_sleeps() {
        let probe = CountdownProbe {
            remaining: Cell::new(0),
        };
        let mut sleeper = RecordingSleeper::default();
        let mut told = false;
        let out = wait_for_browser_exit(&probe, &mut sleeper, Duration::from_millis(5), true, || {
            told = true;
        });
        assert_eq!(out, BrowserWait::NotRunning);
        assert!(sleeper.slept.is_empty());
        assert!(!told);
    }

    #[test]
    fn blocking_polls_until_exit() {
        let probe = CountdownProbe {
            remaining: Cell::new(4),
        };
        let mut sleeper = RecordingSleeper::default();
        let mut told = 0;
        let out = wait_for_browser_exit(&probe, &mut sleeper, Duration::from_millis(7), true, || {
            told += 1;
        });
        // First check + three more "running" answers, one sleep each.
        assert_eq!(out, BrowserWait::Exited { polls: 3 });
        assert_eq!(sleeper.slept, vec![Duration::from_millis(7); 3]);
        assert_eq!(told, 1);
    }

    #[test]
    fn non_blocking_proceeds_immediately() {
        let probe = CountdownProbe {
            remaining: Cell::new(100),
        };
        let mut sleeper = RecordingSleeper::default();
        let out = wait_for_browser_exit(&probe, &mut sleeper, Duration::from_secs(1), false, || {});
        assert_eq!(out, BrowserWait::ProceededWhileRunning);
        assert!(sleeper.slept.is_empty());
    }

    #[test]
    fn system_probe_ignores_unknown_names() {
        let probe = SystemProbe::new(&["pov-no-such-process-name".to_string()]);
        assert!(!probe.is_running());
    }
}
