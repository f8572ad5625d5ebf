//! Number formatting for summary and log lines.

/// Exact count with thousands separators, as printed in `[OK]` summaries.
///
/// # Examples
/// ```
/// use listsync::utils::format_count;
/// assert_eq!(format_count(512), "512");
/// assert_eq!(format_count(8642), "8,642");
/// assert_eq!(format_count(131_072), "131,072");
/// ```
pub fn format_count(count: usize) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Download size in binary units with one decimal.
///
/// The unit is chosen after rounding, so values just under a boundary are
/// promoted instead of printing `1024.0 KiB`.
///
/// # Examples
/// ```
/// use listsync::utils::format_size;
/// assert_eq!(format_size(900), "900 B");
/// assert_eq!(format_size(1_500_000), "1.4 MiB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1023.95 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
