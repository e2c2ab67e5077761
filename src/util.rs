use chrono::{DateTime, SecondsFormat, Utc};

/// Render a byte count the way the upload log shows it: `1,234,567 bytes (1.18 MB)`.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;

    format!(
        "{} bytes ({:.2} MB)",
        group_thousands(bytes),
        bytes as f64 / MIB
    )
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SSZ`.
#[must_use]
pub fn utc_timestamp() -> String {
    format_timestamp(Utc::now())
}

#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
