const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Renders elapsed seconds as "1 дней 1 часов 1 минут 1 секунд".
///
/// Fractions are truncated and negative values (clock skew) count as zero.
/// The days segment is left out when it is zero.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let days = total / DAY;
    let hours = total % DAY / HOUR;
    let minutes = total % HOUR / MINUTE;
    let seconds = total % MINUTE;

    if days > 0 {
        format!("{} дней {} часов {} минут {} секунд", days, hours, minutes, seconds)
    } else {
        format!("{} часов {} минут {} секунд", hours, minutes, seconds)
    }
}
