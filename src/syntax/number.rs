//! Number ↔ text conversions with JavaScript semantics.
//!
//! Shared by the code generator (numeric literals) and the sandbox
//! (`String(n)`, `Number(s)`, `toFixed`, `parseFloat`).

/// Render a number the way `String(n)` does.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let (negative, digits, exponent) = shortest_digits(value);
    let mut out = String::new();
    if negative {
        out.push('-');
    }

    let k = digits.len() as i32;
    let n = exponent + 1;
    if k <= n && n <= 21 {
        out.push_str(&digits);
        out.extend(std::iter::repeat_n('0', (n - k) as usize));
    } else if 0 < n && n <= 21 {
        out.push_str(&digits[..n as usize]);
        out.push('.');
        out.push_str(&digits[n as usize..]);
    } else if -6 < n && n <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat_n('0', (-n) as usize));
        out.push_str(&digits);
    } else {
        out.push_str(&digits[..1]);
        if k > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        out.push('e');
        out.push(if n - 1 >= 0 { '+' } else { '-' });
        out.push_str(&(n - 1).abs().to_string());
    }
    out
}

/// Shortest round-trip decimal digits of a finite, non-zero number.
///
/// Returns `(negative, digits, exponent)` where the value equals
/// `0.d1d2d3… × 10^(exponent + 1)`.
fn shortest_digits(value: f64) -> (bool, String, i32) {
    let formatted = format!("{:e}", value.abs());
    let (mantissa, exponent) = formatted
        .split_once('e')
        .unwrap_or((formatted.as_str(), "0"));
    let digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();
    let digits = digits.trim_end_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };
    (
        value.is_sign_negative(),
        digits.to_string(),
        exponent.parse().unwrap_or(0),
    )
}

/// `Number.prototype.toFixed` for `fraction_digits` in `0..=100`.
pub fn to_fixed(value: f64, fraction_digits: usize) -> String {
    if !value.is_finite() || value.abs() >= 1e21 {
        return format_number(value);
    }

    // Exact decimal expansion; an f64 never needs more than 1074 fraction digits.
    let exact = format!("{:.1100}", value.abs());
    let (int_part, frac_part) = exact.split_once('.').unwrap_or((exact.as_str(), ""));
    let mut digits: Vec<u8> = int_part
        .bytes()
        .chain(frac_part.bytes().take(fraction_digits))
        .map(|b| b - b'0')
        .collect();
    let round_up = frac_part
        .as_bytes()
        .get(fraction_digits)
        .is_some_and(|b| *b >= b'5');

    let mut int_len = int_part.len();
    if round_up {
        let mut i = digits.len();
        loop {
            if i == 0 {
                digits.insert(0, 1);
                int_len += 1;
                break;
            }
            i -= 1;
            if digits[i] == 9 {
                digits[i] = 0;
            } else {
                digits[i] += 1;
                break;
            }
        }
    }

    let mut out = String::new();
    if value < 0.0 {
        out.push('-');
    }
    for (i, digit) in digits.iter().enumerate() {
        if i == int_len {
            out.push('.');
        }
        out.push((b'0' + digit) as char);
    }
    out
}

/// `base ** exponent`.
///
/// Differs from [`f64::powf`] where JavaScript returns `NaN`: a `NaN`
/// exponent, and `±1` raised to `±Infinity`.
pub fn js_pow(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        return f64::NAN;
    }
    base.powf(exponent)
}

/// Render an integer-valued number in the given radix (`2..=36`).
///
/// Fractions are rendered to a bounded number of digits.
pub fn format_radix(value: f64, radix: u32) -> String {
    if radix == 10 || !value.is_finite() {
        return format_number(value);
    }
    let negative = value < 0.0;
    let magnitude = value.abs();
    let mut int_part = magnitude.trunc();
    let mut frac = magnitude - int_part;

    let mut int_digits = Vec::new();
    if int_part == 0.0 {
        int_digits.push('0');
    }
    while int_part >= 1.0 {
        let digit = (int_part % radix as f64) as u32;
        int_digits.push(std::char::from_digit(digit, radix).unwrap_or('0'));
        int_part = (int_part / radix as f64).trunc();
    }
    int_digits.reverse();

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.extend(int_digits);
    if frac > 0.0 {
        out.push('.');
        let mut count = 0;
        while frac > 0.0 && count < 52 {
            frac *= radix as f64;
            let digit = frac.trunc() as u32;
            out.push(std::char::from_digit(digit, radix).unwrap_or('0'));
            frac -= digit as f64;
            count += 1;
        }
    }
    out
}

/// Whitespace as understood by `String.prototype.trim` and `Number(...)`.
pub fn is_js_whitespace(ch: char) -> bool {
    matches!(
        ch,
        '\u{0009}'
            | '\u{000B}'
            | '\u{000C}'
            | ' '
            | '\u{00A0}'
            | '\u{FEFF}'
            | '\n'
            | '\r'
            | '\u{2028}'
            | '\u{2029}'
    ) || (ch != '\u{0085}' && ch.is_whitespace())
}

/// String → number conversion (`Number("...")`, unary `+`).
pub fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim_matches(is_js_whitespace);
    if trimmed.is_empty() {
        return 0.0;
    }

    let radix = match trimmed.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return parse_integer_digits(&trimmed[2..], radix).unwrap_or(f64::NAN);
    }

    let unsigned = trimmed.trim_start_matches(['+', '-']);
    if unsigned == "Infinity" && trimmed.len() - unsigned.len() <= 1 {
        return if trimmed.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }
    if !is_decimal_literal(trimmed) {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Parse the longest decimal-literal prefix (`parseFloat`).
pub fn parse_float_prefix(text: &str) -> f64 {
    let trimmed = text.trim_start_matches(is_js_whitespace);
    let unsigned = trimmed.trim_start_matches(['+', '-']);
    let sign_len = trimmed.len() - unsigned.len();
    if sign_len <= 1 && unsigned.starts_with("Infinity") {
        return if trimmed.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }
    if sign_len > 1 {
        return f64::NAN;
    }

    let bytes = unsigned.as_bytes();
    let mut end = 0;
    let mut saw_digit = false;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        saw_digit = true;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        let mut frac_end = end + 1;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
            saw_digit = true;
        }
        end = frac_end;
    }
    if !saw_digit {
        return f64::NAN;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > digits_start {
            end = exp_end;
        }
    }

    let literal = &trimmed[..sign_len + end];
    literal.parse::<f64>().unwrap_or(f64::NAN)
}

/// Parse a run of digits in `radix`; `None` when empty or invalid.
pub fn parse_integer_digits(digits: &str, radix: u32) -> Option<f64> {
    if digits.is_empty() {
        return None;
    }
    let mut value = 0.0f64;
    for ch in digits.chars() {
        let digit = ch.to_digit(radix)?;
        value = value * radix as f64 + digit as f64;
    }
    Some(value)
}

fn is_decimal_literal(text: &str) -> bool {
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(index) => (&unsigned[..index], Some(&unsigned[index + 1..])),
        None => (unsigned, None),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) {
        return false;
    }
    if int_part.is_empty() && frac_part.is_empty() {
        return false;
    }
    match exponent {
        None => true,
        Some(exp) => {
            let digits = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            !digits.is_empty() && all_digits(digits)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_like_javascript() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(123456789012345680000.0), "123456789012345680000");
        assert_eq!(format_number(0.000001), "0.000001");
        assert_eq!(format_number(1e-7), "1e-7");
        assert_eq!(format_number(-1.5e-10), "-1.5e-10");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn to_fixed_rounds_half_up_on_exact_ties() {
        assert_eq!(to_fixed(2.5, 0), "3");
        assert_eq!(to_fixed(1.005, 2), "1.00");
        assert_eq!(to_fixed(3.14159, 2), "3.14");
        assert_eq!(to_fixed(-1.5, 0), "-2");
        assert_eq!(to_fixed(9.99, 1), "10.0");
        assert_eq!(to_fixed(-0.0001, 2), "-0.00");
        assert_eq!(to_fixed(-0.0, 2), "0.00");
    }

    #[test]
    fn parses_strings_like_number() {
        assert_eq!(parse_number("  42  "), 42.0);
        assert_eq!(parse_number(""), 0.0);
        assert_eq!(parse_number("0x1F"), 31.0);
        assert_eq!(parse_number("-Infinity"), f64::NEG_INFINITY);
        assert!(parse_number("inf").is_nan());
        assert!(parse_number("12px").is_nan());
        assert_eq!(parse_number(".5"), 0.5);
        assert_eq!(parse_float_prefix("3.5em"), 3.5);
        assert_eq!(parse_float_prefix("1e3x"), 1000.0);
        assert!(parse_float_prefix("x1").is_nan());
    }

    #[test]
    fn pow_follows_javascript() {
        assert!(js_pow(1.0, f64::NAN).is_nan());
        assert!(js_pow(-1.0, f64::INFINITY).is_nan());
        assert_eq!(js_pow(2.0, -1.0), 0.5);
        assert_eq!(js_pow(f64::NAN, 0.0), 1.0);
    }

    #[test]
    fn radix_rendering() {
        assert_eq!(format_radix(255.0, 16), "ff");
        assert_eq!(format_radix(-5.0, 2), "-101");
        assert_eq!(format_radix(0.5, 2), "0.1");
    }
}
