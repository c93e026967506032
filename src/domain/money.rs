/// Default token the exchange appends to cash (won) amounts.
pub const DEFAULT_CASH_MARKER: &str = "KRW";

/// Extract a number from a decorated display string by keeping only digits and '.'.
///
/// This is lossy on purpose: signs, currency suffixes, coin symbols and
/// thousands separators are all dropped, and anything that still fails to
/// parse (empty input, more than one decimal point, a digit run too long
/// for an f64) becomes `0.0`.
/// Example: "1,234.50 KRW" -> 1234.5, "0.015 BTC" -> 0.015, "" -> 0.0
pub fn parse_lenient(input: &str) -> f64 {
    let digits: String = input
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if digits.is_empty() {
        return 0.0;
    }

    digits
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Parse a cash amount by removing the cash marker and thousands separators.
///
/// Unlike [`parse_lenient`] every other character must form a valid number,
/// otherwise the amount is treated as `0.0`. Non-finite results count as failures.
/// Example: "1,500 KRW" -> 1500.0, "-2,000KRW" -> -2000.0, "12 BTC" -> 0.0
pub fn parse_cash_amount(input: &str, marker: &str) -> f64 {
    let cleaned = if marker.is_empty() {
        input.replace(',', "")
    } else {
        input.replace(marker, "").replace(',', "")
    };

    match cleaned.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

/// Format an amount with a fixed number of decimals and ',' thousands grouping.
/// Example: (1234567.891, 2) -> "1,234,567.89", (-5.0, 0) -> "-5"
pub fn format_amount(value: f64, decimals: usize) -> String {
    let rendered = format!("{:.*}", decimals, value.abs());
    let (units, fraction) = match rendered.split_once('.') {
        Some((units, fraction)) => (units, Some(fraction)),
        None => (rendered.as_str(), None),
    };

    let mut grouped = String::with_capacity(units.len() + units.len() / 3);
    for (i, digit) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    // Avoid "-0.00" for values that round to zero
    let is_zero = rendered.chars().all(|c| c == '0' || c == '.');
    let sign = if value < 0.0 && !is_zero { "-" } else { "" };

    match fraction {
        Some(fraction) => format!("{}{}.{}", sign, grouped, fraction),
        None => format!("{}{}", sign, grouped),
    }
}
