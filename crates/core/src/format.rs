//! Display formatting for tender amounts, deadlines and counters.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Formats an amount with thousands separators and two decimals, e.g. `1,234.50 EUR`.
pub fn format_currency(amount: Decimal, currency: &str) -> String {
    let rounded = amount.round_dp(2);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let digits = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));
    format!(
        "{sign}{}.{frac_part} {}",
        group_thousands(int_part),
        currency.trim().to_uppercase()
    )
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Describes a submission deadline relative to `now`, in calendar days.
pub fn format_deadline(deadline: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let days = (deadline.date_naive() - now.date_naive()).num_days();
    match days {
        d if d < -1 => format!("overdue by {} days", -d),
        -1 => "overdue by 1 day".to_string(),
        0 => "due today".to_string(),
        1 => "due tomorrow".to_string(),
        d => format!("due in {d} days"),
    }
}

/// Short form for large counters: `999`, `1.2K`, `3.4M`, `1B`.
pub fn format_compact(value: u64) -> String {
    const UNITS: [(f64, &str); 3] = [(1e3, "K"), (1e6, "M"), (1e9, "B")];

    if value < 1_000 {
        return value.to_string();
    }

    let scale = |divisor: f64| (value as f64 / divisor * 10.0).round() / 10.0;
    let mut unit = 0;
    let mut scaled = scale(UNITS[0].0);
    // 999_950 rounds to 1000.0K; promote it to the next unit.
    while scaled >= 1000.0 && unit + 1 < UNITS.len() {
        unit += 1;
        scaled = scale(UNITS[unit].0);
    }

    let text = format!("{scaled:.1}");
    let text = text.strip_suffix(".0").unwrap_or(&text);
    format!("{text}{}", UNITS[unit].1)
}
