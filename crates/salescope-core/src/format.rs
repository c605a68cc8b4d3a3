//! Locale-fixed display formatting: Brazilian real amounts, comma decimals,
//! dot-grouped counts. Pure functions, no locale crate; the output locale is
//! part of the product, not of the runtime environment.

/// `R$ 1.234,56`. Non-finite or negative input renders as zero.
pub fn format_currency(value: f64) -> String {
    if !value.is_finite() || value < 0.0 {
        return "R$ 0,00".to_string();
    }
    let cents = (value * 100.0).round() as u64;
    let whole = cents / 100;
    let frac = cents % 100;
    format!("R$ {},{:02}", group_thousands(whole), frac)
}

/// `R$ 1.234`, for compact KPI cards and chart axes.
pub fn format_currency_whole(value: f64) -> String {
    if !value.is_finite() || value < 0.0 {
        return "R$ 0".to_string();
    }
    format!("R$ {}", group_thousands(value.round() as u64))
}

/// One-decimal percentage with a comma separator, from a fraction:
/// `0.123` → `12,3%`.
pub fn format_percentage(fraction: f64) -> String {
    let fraction = if fraction.is_finite() { fraction } else { 0.0 };
    let tenths = (fraction * 1000.0).round() as i64;
    format!("{},{}%", tenths / 10, (tenths % 10).abs())
}

/// Dot-grouped integer count: `1234567` → `1.234.567`.
pub fn format_count(n: u64) -> String {
    group_thousands(n)
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let len = digits.len();
    let mut result = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            result.push('.');
        }
        result.push(c);
    }
    result
}
