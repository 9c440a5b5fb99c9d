pub mod logging;

use std::time::Duration;

/// Compact "time since" label: `42s ago`, `5m ago`, `3h ago`.
pub fn format_age(age: Duration) -> String {
    let seconds = age.as_secs();
    if seconds < 60 {
        return format!("{seconds}s ago");
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    format!("{}h ago", minutes / 60)
}
