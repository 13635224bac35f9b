const SIZE_UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];
const SIZE_DIVISOR: f64 = 1024.0;

/// Human-readable byte count for display only (never used on the wire)
pub fn format_size(bytes: u64) -> String {
    if bytes < SIZE_DIVISOR as u64 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= SIZE_DIVISOR && unit < SIZE_UNITS.len() - 1 {
        value /= SIZE_DIVISOR;
        unit += 1;
    }

    format!("{:.1} {}", value, SIZE_UNITS[unit])
}
