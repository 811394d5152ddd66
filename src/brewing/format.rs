use crate::types::{MINUTES_PER_DAY, MINUTES_PER_HOUR};

/// Renders a minute count as `45m`, `1h 30m` or `1d 1h`.
///
/// Floor division throughout; the smallest unit of the top band is dropped,
/// never rounded.
pub fn format_minutes(minutes: u32) -> String {
    if minutes < MINUTES_PER_HOUR {
        format!("{}m", minutes)
    } else if minutes < MINUTES_PER_DAY {
        let hours = minutes / MINUTES_PER_HOUR;
        let mins = minutes % MINUTES_PER_HOUR;
        format!("{}h {}m", hours, mins)
    } else {
        let days = minutes / MINUTES_PER_DAY;
        let hours = (minutes % MINUTES_PER_DAY) / MINUTES_PER_HOUR;
        format!("{}d {}h", days, hours)
    }
}
