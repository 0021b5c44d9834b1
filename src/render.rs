//! Plain-text rendering of a session snapshot.

use std::fmt::Write;

use crate::session::SessionSnapshot;

const BAR_WIDTH: usize = 20;

/// Fixed-width meter for a value in [0, 1]. Out-of-range input is clamped.
pub fn bar(value: f64) -> String {
    let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    let filled = (value * BAR_WIDTH as f64).round() as usize;
    let mut out = String::with_capacity(BAR_WIDTH + 2);
    out.push('[');
    out.extend(std::iter::repeat('#').take(filled));
    out.extend(std::iter::repeat('.').take(BAR_WIDTH - filled));
    out.push(']');
    out
}

pub fn connection_banner(snapshot: &SessionSnapshot) -> String {
    let backend = match (snapshot.backend_reachable, snapshot.using_real_data) {
        (false, _) => "backend unreachable",
        (true, true) => "backend up (device)",
        (true, false) => "backend up (simulated)",
    };

    match (&snapshot.session_id, snapshot.connected) {
        (Some(id), true) => {
            let short: String = id.chars().take(8).collect();
            let feed = if snapshot.using_remote_data {
                "live"
            } else {
                "waiting"
            };
            format!("connected {short} {feed} | {backend}")
        }
        _ => format!("disconnected | {backend}"),
    }
}

pub fn status_line(snapshot: &SessionSnapshot) -> String {
    let activity = &snapshot.activity;
    let mut line = connection_banner(snapshot);

    let _ = write!(
        line,
        " | L {} {:.2} R {} {:.2} {}",
        bar(activity.left),
        activity.left,
        bar(activity.right),
        activity.right,
        activity.label
    );
    let _ = write!(
        line,
        " | eye {}{} {}",
        snapshot.eye.direction,
        if snapshot.eye.blink_active { " blink" } else { "" },
        snapshot.alertness.as_str()
    );
    let _ = write!(
        line,
        " | cam {}",
        if snapshot.camera_active { "on" } else { "off" }
    );
    if snapshot.error_count > 0 {
        let _ = write!(line, " | errors {}", snapshot.error_count);
    }
    line
}
