use rust_decimal::Decimal;

/// Renders an amount as `$1,234.50`.
pub fn format_money(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let fixed = format!("{:.2}", rounded.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("{sign}${grouped}.{cents}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_thousands_with_two_decimals() {
        assert_eq!(format_money(Decimal::new(123_450, 2)), "$1,234.50");
        assert_eq!(format_money(Decimal::new(5, 1)), "$0.50");
        assert_eq!(format_money(Decimal::new(100_000_000, 0)), "$100,000,000.00");
        assert_eq!(format_money(Decimal::new(-99_999, 2)), "-$999.99");
        assert_eq!(format_money(Decimal::ZERO), "$0.00");
    }
}
