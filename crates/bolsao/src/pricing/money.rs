/// Rounds a monetary value to cents, half away from zero.
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value * 100.0).round() / 100.0
}

/// Formats a value the way award letters and the spreadsheet show money:
/// `R$ 1.234,56`.
pub fn format_brl(value: f64) -> String {
    let value = round2(value);
    let sign = if value < 0.0 { "-" } else { "" };
    let fixed = format!("{:.2}", value.abs());
    let (integer, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (idx, digit) in integer.chars().enumerate() {
        if idx > 0 && (integer.len() - idx) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    format!("R$ {sign}{grouped},{cents}")
}

/// Parses currency as the spreadsheet shows it (`R$ 1.234,56`), typed in by
/// hand (`1500`) or rendered from a plain number (`1100.5`). Anything
/// unparseable reads as zero.
pub fn parse_brl(raw: &str) -> f64 {
    let cleaned: String = raw
        .replace("R$", "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return 0.0;
    }

    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else if is_grouped_thousands(&cleaned) {
        cleaned.replace('.', "")
    } else {
        cleaned
    };
    match normalized.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

/// `1.234` or `-12.345.678`: dots only ever separate groups of three digits.
fn is_grouped_thousands(raw: &str) -> bool {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    let mut groups = digits.split('.');
    let lead = groups.next().unwrap_or_default();
    let rest: Vec<&str> = groups.collect();

    let all_digits = |group: &str| group.bytes().all(|b| b.is_ascii_digit());
    !rest.is_empty()
        && (1..=3).contains(&lead.len())
        && all_digits(lead)
        && rest.iter().all(|group| group.len() == 3 && all_digits(group))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_cents() {
        assert_eq!(round2(909.090909), 909.09);
        assert_eq!(round2(993.63537), 993.64);
        assert_eq!(round2(f64::NAN), 0.0);
    }

    #[test]
    fn formats_with_brazilian_separators() {
        assert_eq!(format_brl(0.0), "R$ 0,00");
        assert_eq!(format_brl(993.64), "R$ 993,64");
        assert_eq!(format_brl(12832.77), "R$ 12.832,77");
        assert_eq!(format_brl(1234567.891), "R$ 1.234.567,89");
        assert_eq!(format_brl(-1500.5), "R$ -1.500,50");
    }

    #[test]
    fn parses_currency_defensively() {
        assert_eq!(parse_brl("R$ 1.234,56"), 1234.56);
        assert_eq!(parse_brl("1500"), 1500.0);
        assert_eq!(parse_brl(""), 0.0);
        assert_eq!(parse_brl("a combinar"), 0.0);
        assert_eq!(parse_brl("R$\u{a0}-1.500,50"), -1500.5);
    }

    #[test]
    fn parses_plain_numbers_rendered_from_cells() {
        assert_eq!(parse_brl("1100.5"), 1100.5);
        assert_eq!(parse_brl("950.25"), 950.25);
        assert_eq!(parse_brl("0.5"), 0.5);
        assert_eq!(parse_brl("1.100"), 1100.0);
        assert_eq!(parse_brl("12.832.770"), 12832770.0);
    }
}
