//! Focus notifications read line by line from an input stream (stdin).
//!
//! Each line is `<pid> <window_id>`; the window id may be decimal or
//! `0x`-prefixed hex as printed by X11 tools.

use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};
use swap_sched::{FocusOutcome, SchedulerHandle};
use tracing::{debug, info, warn};

/// Parse one notification line.
pub fn parse_line(line: &str) -> Option<(u32, u64)> {
    let mut fields = line.split_whitespace();
    let pid = fields.next()?.parse().ok()?;
    let window = parse_window(fields.next()?)?;
    if fields.next().is_some() {
        return None;
    }
    Some((pid, window))
}

fn parse_window(text: &str) -> Option<u64> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

/// Feed notifications from `input` to the scheduler on a named thread.
///
/// The thread blocks on `input` and is never joined by the daemon: it ends
/// with the input, or with the process.
pub fn spawn_reader<R>(handle: SchedulerHandle, input: R) -> io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("swapsched-focus".to_string())
        .spawn(move || read_events(&handle, input))
}

fn read_events<R: BufRead>(handle: &SchedulerHandle, input: R) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read focus input: {}", e);
                return;
            }
        };

        if handle.is_stopped() {
            debug!("Scheduler stopped, dropping focus input");
            return;
        }
        if line.trim().is_empty() {
            continue;
        }
        let Some((pid, window)) = parse_line(&line) else {
            warn!("Ignoring malformed focus line: {:?}", line);
            continue;
        };

        match handle.on_focus_changed(pid, window) {
            FocusOutcome::Switched(id) => debug!("Window {:#x} switched to {}", window, id),
            outcome => debug!("Window {:#x}: {:?}", window, outcome),
        }
    }
    info!("Focus input closed");
}
