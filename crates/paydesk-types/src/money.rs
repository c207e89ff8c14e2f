//! Decimal-exact currency arithmetic.
//!
//! Every money computation in the workspace goes through this module.
//! Amounts are [`Decimal`]; binary floating point never touches money.
//! Checked operations surface overflow as [`PaydeskError::ArithmeticOverflow`]
//! instead of panicking.
//!
//! Two parsers exist:
//! - [`parse_amount`] is strict and is the only entry for the settlement path.
//! - [`parse_display`] accepts display strings (`"$1,234.50"`) and is meant
//!   for reporting boundaries only.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::constants::CURRENCY_SCALE;
use crate::{PaydeskError, Result};

/// `a + b`.
pub fn add(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_add(b)
        .ok_or(PaydeskError::ArithmeticOverflow { op: "add" })
}

/// `a - b`.
pub fn subtract(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_sub(b)
        .ok_or(PaydeskError::ArithmeticOverflow { op: "subtract" })
}

/// `a * b`.
pub fn multiply(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_mul(b)
        .ok_or(PaydeskError::ArithmeticOverflow { op: "multiply" })
}

/// `a / b`. Division by zero yields zero rather than an error.
pub fn divide(a: Decimal, b: Decimal) -> Result<Decimal> {
    if b.is_zero() {
        return Ok(Decimal::ZERO);
    }
    a.checked_div(b)
        .ok_or(PaydeskError::ArithmeticOverflow { op: "divide" })
}

/// `percent`% of `amount`, rounded to currency precision.
pub fn percentage(amount: Decimal, percent: Decimal) -> Result<Decimal> {
    let scaled = multiply(amount, percent)?;
    Ok(round_currency(divide(scaled, Decimal::ONE_HUNDRED)?))
}

/// Checked sum over a sequence. The empty sum is zero.
pub fn sum<I>(amounts: I) -> Result<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    amounts.into_iter().try_fold(Decimal::ZERO, add)
}

/// Round to [`CURRENCY_SCALE`] digits, midpoint away from zero.
#[must_use]
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Half of the smallest currency unit (0.005).
#[must_use]
pub fn currency_tolerance() -> Decimal {
    Decimal::new(5, CURRENCY_SCALE + 1)
}

/// `|a - b| <= tolerance`. An overflowing difference is never equal.
#[must_use]
pub fn approx_eq(a: Decimal, b: Decimal, tolerance: Decimal) -> bool {
    a.checked_sub(b)
        .is_some_and(|diff| diff.abs() <= tolerance.abs())
}

/// [`approx_eq`] with [`currency_tolerance`].
#[must_use]
pub fn approx_eq_currency(a: Decimal, b: Decimal) -> bool {
    approx_eq(a, b, currency_tolerance())
}

/// A usable settlement amount: positive once rounded to currency precision.
#[must_use]
pub fn is_valid(amount: Decimal) -> bool {
    round_currency(amount) > Decimal::ZERO
}

/// Round to currency precision and reject anything that is not [`is_valid`].
pub fn normalize_amount(amount: Decimal) -> Result<Decimal> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(PaydeskError::invalid_amount(format!("{amount} is negative")));
    }
    let rounded = round_currency(amount);
    if rounded.is_zero() {
        return Err(PaydeskError::invalid_amount(format!(
            "{amount} is zero at currency precision"
        )));
    }
    Ok(rounded)
}

/// Strict numeric parse: optional sign, digits, at most one decimal point.
///
/// No symbols, separators or exponents. Does not check the sign of the
/// result; pair with [`normalize_amount`].
pub fn parse_amount(raw: &str) -> Result<Decimal> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix(['-', '+'])
        .unwrap_or(trimmed);

    let well_formed = !digits.is_empty()
        && digits.chars().any(|c| c.is_ascii_digit())
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.matches('.').count() <= 1;
    if !well_formed {
        return Err(PaydeskError::invalid_amount(format!("{raw:?} is not a number")));
    }

    Decimal::from_str_exact(trimmed)
        .map_err(|e| PaydeskError::invalid_amount(format!("{raw:?}: {e}")))
}

/// Lenient parse of a display-formatted amount.
///
/// Strips currency symbols, whitespace and `,` thousands separators.
/// Accounting negatives in parentheses (`"(12.00)"`) are honoured.
pub fn parse_display(raw: &str) -> Result<Decimal> {
    let trimmed = raw.trim();
    let (body, parenthesized) = match trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
    {
        Some(inner) => (inner, true),
        None => (trimmed, false),
    };

    let cleaned: String = body
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
        .collect();
    let value = parse_amount(&cleaned).map_err(|_| {
        PaydeskError::invalid_amount(format!("{raw:?} is not a display amount"))
    })?;

    Ok(if parenthesized { -value.abs() } else { value })
}

/// Render `amount` as `"{symbol}1,234.50"`, negatives as `"-{symbol}12.00"`.
#[must_use]
pub fn format_currency(amount: Decimal, symbol: &str) -> String {
    let mut rounded = round_currency(amount);
    rounded.rescale(CURRENCY_SCALE);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let plain = rounded.abs().to_string();
    let (int_part, frac_part) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{sign}{symbol}{grouped}.{frac_part}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(n: i64, scale: u32) -> Decimal {
        Decimal::new(n, scale)
    }

    #[test]
    fn decimal_sums_do_not_drift() {
        // 0.1 + 0.2 == 0.3 exactly, unlike f64.
        assert_eq!(add(d(1, 1), d(2, 1)).unwrap(), d(3, 1));
        let total = sum(std::iter::repeat_n(d(1, 1), 10)).unwrap();
        assert_eq!(total, Decimal::ONE);
    }

    #[test]
    fn subtract_and_multiply() {
        assert_eq!(subtract(d(1000, 0), d(400, 0)).unwrap(), d(600, 0));
        assert_eq!(multiply(d(1999, 2), d(3, 0)).unwrap(), d(5997, 2));
    }

    #[test]
    fn overflow_is_an_error_not_a_panic() {
        let err = add(Decimal::MAX, Decimal::ONE).unwrap_err();
        assert!(matches!(err, PaydeskError::ArithmeticOverflow { op: "add" }));
        assert!(multiply(Decimal::MAX, d(2, 0)).is_err());
        assert!(sum([Decimal::MAX, Decimal::MAX]).is_err());
    }

    #[test]
    fn divide_by_zero_returns_zero() {
        assert_eq!(divide(d(100, 0), Decimal::ZERO).unwrap(), Decimal::ZERO);
        assert_eq!(divide(d(100, 0), d(4, 0)).unwrap(), d(25, 0));
    }

    #[test]
    fn percentage_rounds_to_cents() {
        assert_eq!(percentage(d(1000, 0), d(12, 0)).unwrap(), d(12000, 2));
        // 12.5% of 0.99 = 0.12375 -> 0.12
        assert_eq!(percentage(d(99, 2), d(125, 1)).unwrap(), d(12, 2));
    }

    #[test]
    fn empty_sum_is_zero() {
        assert_eq!(sum(Vec::new()).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn round_currency_midpoint_away_from_zero() {
        assert_eq!(round_currency(d(1005, 3)), d(101, 2));
        assert_eq!(round_currency(d(-1005, 3)), d(-101, 2));
        assert_eq!(round_currency(d(1004, 3)), d(100, 2));
    }

    #[test]
    fn tolerance_equality() {
        assert!(approx_eq_currency(d(1000, 2), d(1004, 3)));
        assert!(!approx_eq_currency(d(1000, 2), d(1006, 3)));
        assert!(approx_eq(d(1, 0), d(2, 0), d(1, 0)));
        assert!(!approx_eq(Decimal::MAX, Decimal::MIN, Decimal::ONE));
    }

    #[test]
    fn validity_predicate() {
        assert!(is_valid(d(1, 2)));
        assert!(!is_valid(Decimal::ZERO));
        assert!(!is_valid(d(-5, 0)));
        assert!(!is_valid(d(4, 3))); // 0.004 rounds to 0.00
    }

    #[test]
    fn normalize_rejects_zero_and_negative() {
        assert_eq!(normalize_amount(d(400, 0)).unwrap(), d(40000, 2));
        assert_eq!(normalize_amount(d(12345, 3)).unwrap(), d(1235, 2));
        assert!(matches!(
            normalize_amount(Decimal::ZERO),
            Err(PaydeskError::InvalidAmount { .. })
        ));
        assert!(matches!(
            normalize_amount(d(-1, 0)),
            Err(PaydeskError::InvalidAmount { .. })
        ));
        assert!(normalize_amount(d(1, 3)).is_err());
    }

    #[test]
    fn strict_parse_accepts_plain_numbers_only() {
        assert_eq!(parse_amount("400").unwrap(), d(400, 0));
        assert_eq!(parse_amount(" 12.50 ").unwrap(), d(1250, 2));
        assert_eq!(parse_amount("-3").unwrap(), d(-3, 0));
        for bad in ["", "abc", "1,000", "$5", "1e3", "1.2.3", "NaN", "inf", "-", "."] {
            assert!(
                matches!(parse_amount(bad), Err(PaydeskError::InvalidAmount { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn display_parse_strips_symbols_and_separators() {
        assert_eq!(parse_display("$1,234.50").unwrap(), d(123_450, 2));
        assert_eq!(parse_display("₱ 1,000").unwrap(), d(1000, 0));
        assert_eq!(parse_display("(12.00)").unwrap(), d(-1200, 2));
        assert_eq!(parse_display("PHP 99.99").unwrap(), d(9999, 2));
        assert!(parse_display("free").is_err());
    }

    #[test]
    fn format_groups_thousands() {
        assert_eq!(format_currency(d(123_450, 2), "$"), "$1,234.50");
        assert_eq!(format_currency(d(1_000_000, 0), ""), "1,000,000.00");
        assert_eq!(format_currency(d(-12, 0), "$"), "-$12.00");
        assert_eq!(format_currency(d(5, 1), "$"), "$0.50");
        assert_eq!(format_currency(Decimal::ZERO, "$"), "$0.00");
    }
}
