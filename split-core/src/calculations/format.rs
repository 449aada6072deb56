//! Parsing and display helpers for money text.
//!
//! Amounts are typed with optional comma thousands separators. Everything
//! here is infallible: bad input parses to `None` or is filtered away.

use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::trace;

use super::common::round_half_up;

/// Characters stripped from free text before it is stored or displayed.
const UNSAFE_CHARS: [char; 5] = ['<', '>', '"', '\'', '&'];

/// Parses money text such as `"4,000.50"`.
///
/// Commas are removed and surrounding whitespace trimmed. Empty input,
/// scientific notation and trailing garbage all yield `None`.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use split_core::calculations::format::parse_amount;
///
/// assert_eq!(parse_amount("4,000.50"), Some(dec!(4000.50)));
/// assert_eq!(parse_amount("  "), None);
/// assert_eq!(parse_amount("1e12"), None);
/// ```
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned = raw.replace(',', "");
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        return None;
    }
    if !cleaned
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
    {
        trace!(raw, "rejecting amount with non-numeric characters");
        return None;
    }

    Decimal::from_str(cleaned).ok()
}

/// Whether the amount text is blank once commas and whitespace are gone.
pub fn is_blank_amount(raw: &str) -> bool {
    raw.replace(',', "").trim().is_empty()
}

/// Live formatting for amount fields.
///
/// Keeps digits, commas and periods, drops the commas, then regroups the
/// integer portion (everything before the first period) in threes.
/// Applying it twice gives the same text as applying it once.
///
/// ```
/// use split_core::calculations::format::format_with_thousands;
///
/// assert_eq!(format_with_thousands("1234567"), "1,234,567");
/// assert_eq!(format_with_thousands("$12,34.5"), "1,234.5");
/// ```
pub fn format_with_thousands(raw: &str) -> String {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    match kept.split_once('.') {
        Some((int_part, frac_part)) => format!("{}.{}", group_thousands(int_part), frac_part),
        None => group_thousands(&kept),
    }
}

/// Inserts a comma every three digits counting from the right.
pub fn group_thousands(digits: &str) -> String {
    let len = digits.chars().count();
    let mut out = String::with_capacity(len + len / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Renders an amount with two decimals, grouped thousands and a currency
/// symbol prefix, e.g. `$1,234.50`.
pub fn format_currency(
    amount: Decimal,
    symbol: &str,
) -> String {
    let rounded = format!("{:.2}", round_half_up(amount));
    let (sign, unsigned) = match rounded.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rounded.as_str()),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, "00"));

    format!("{symbol}{sign}{}.{frac_part}", group_thousands(int_part))
}

/// Truncates free text to `max_len` characters, then strips `< > " ' &`.
pub fn sanitize_text(
    input: &str,
    max_len: usize,
) -> String {
    input
        .chars()
        .take(max_len)
        .filter(|c| !UNSAFE_CHARS.contains(c))
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    // =========================================================================
    // parse_amount tests
    // =========================================================================

    #[test]
    fn parse_amount_strips_commas() {
        let result = parse_amount("1,234,567.89");

        assert_eq!(result, Some(dec!(1234567.89)));
    }

    #[test]
    fn parse_amount_trims_whitespace() {
        let result = parse_amount("  4000 ");

        assert_eq!(result, Some(dec!(4000)));
    }

    #[test]
    fn parse_amount_empty_is_none() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount(" , "), None);
    }

    #[test]
    fn parse_amount_rejects_garbage() {
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount("12abc"), None);
        assert_eq!(parse_amount("1e12"), None);
        assert_eq!(parse_amount("1.2.3"), None);
    }

    #[test]
    fn parse_amount_keeps_sign() {
        assert_eq!(parse_amount("-5"), Some(dec!(-5)));
        assert_eq!(parse_amount("0"), Some(dec!(0)));
    }

    // =========================================================================
    // format_with_thousands tests
    // =========================================================================

    #[test]
    fn format_groups_integer_digits() {
        assert_eq!(format_with_thousands("1234"), "1,234");
        assert_eq!(format_with_thousands("123"), "123");
        assert_eq!(format_with_thousands("1000000"), "1,000,000");
    }

    #[test]
    fn format_drops_everything_but_digits_and_periods() {
        let result = format_with_thousands("$ 4,0a00.5");

        assert_eq!(result, "4,000.5");
    }

    #[test]
    fn format_leaves_fraction_ungrouped() {
        let result = format_with_thousands("1234.5678");

        assert_eq!(result, "1,234.5678");
    }

    #[test]
    fn format_keeps_a_trailing_period_while_typing() {
        let result = format_with_thousands("1234.");

        assert_eq!(result, "1,234.");
    }

    #[test]
    fn format_is_idempotent() {
        for raw in ["", "5", "12345", "9,99,9.01", "1.2.3", "abc", "0001234"] {
            let once = format_with_thousands(raw);
            assert_eq!(format_with_thousands(&once), once, "input {raw:?}");
        }
    }

    #[test]
    fn format_then_parse_matches_parse() {
        for raw in [
            "4000",
            "4,000.50",
            "1234567",
            "0.75",
            "",
            ",",
            ",,5,,",
            "1,2,3,4",
            "9,99,9.01",
            "1.2.3",
            "0001234",
            "12.",
        ] {
            assert_eq!(
                parse_amount(&format_with_thousands(raw)),
                parse_amount(raw),
                "input {raw:?}"
            );
        }
    }

    // =========================================================================
    // format_currency tests
    // =========================================================================

    #[test]
    fn format_currency_pads_and_groups() {
        assert_eq!(format_currency(dec!(1234.5), "$"), "$1,234.50");
        assert_eq!(format_currency(dec!(700), "£"), "£700.00");
        assert_eq!(format_currency(dec!(0), "NZ$"), "NZ$0.00");
    }

    #[test]
    fn format_currency_rounds_half_up() {
        let result = format_currency(dec!(699.99999999999999999999999996), "$");

        assert_eq!(result, "$700.00");
    }

    #[test]
    fn format_currency_keeps_sign_after_symbol() {
        let result = format_currency(dec!(-1234.5), "$");

        assert_eq!(result, "$-1,234.50");
    }

    // =========================================================================
    // sanitize_text tests
    // =========================================================================

    #[test]
    fn sanitize_strips_markup_characters() {
        let result = sanitize_text(r#"<b>"Tom" & 'Jerry'</b>"#, 100);

        assert_eq!(result, "bTom  Jerry/b");
    }

    #[test]
    fn sanitize_truncates_before_stripping() {
        let result = sanitize_text("abc<def", 4);

        assert_eq!(result, "abc");
    }

    #[test]
    fn sanitize_counts_characters_not_bytes() {
        let result = sanitize_text("ééééé", 3);

        assert_eq!(result, "ééé");
    }
}
