//! Session pricing. Everything here is pure so the stores can apply the same
//! arithmetic while they hold a wallet lock.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

const SECONDS_PER_MINUTE: i64 = 60;

const MONEY_SCALE: u32 = 2;

/// Rounds to cents, halves away from zero. The result always carries two
/// decimal places so `40` and `40.00` serialize the same way.
pub fn round_money(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}

/// True for a strictly positive amount with at most two decimal places.
pub fn is_valid_amount(amount: Decimal) -> bool {
    amount > Decimal::ZERO && amount.normalize().scale() <= MONEY_SCALE
}

/// Price of a session billed per minute and prorated per second.
pub fn session_cost(rate_per_minute: Decimal, duration_secs: i64) -> Decimal {
    if duration_secs <= 0 || rate_per_minute <= Decimal::ZERO {
        return round_money(Decimal::ZERO);
    }
    round_money(rate_per_minute * Decimal::from(duration_secs) / Decimal::from(SECONDS_PER_MINUTE))
}

/// Splits a charged amount into `(platform_fee, creator_earning)`.
/// The two parts always add up to `amount`.
pub fn split(amount: Decimal, commission_percent: Decimal) -> (Decimal, Decimal) {
    let fee = round_money(amount * commission_percent / Decimal::ONE_HUNDRED);
    (fee, round_money(amount - fee))
}

/// Longest session, in seconds, that `balance` pays for at `rate_per_minute`.
pub fn max_duration_secs(balance: Decimal, rate_per_minute: Decimal, cap_minutes: u32) -> i64 {
    let cap = i64::from(cap_minutes) * SECONDS_PER_MINUTE;
    if rate_per_minute <= Decimal::ZERO {
        return cap;
    }
    if balance <= Decimal::ZERO {
        return 0;
    }
    let affordable = (balance * Decimal::from(SECONDS_PER_MINUTE) / rate_per_minute)
        .floor()
        .to_i64()
        .unwrap_or(i64::MAX);
    affordable.min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn cost_is_prorated_per_second() {
        assert_eq!(session_cost(d("10"), 90), d("15.00"));
        assert_eq!(session_cost(d("7.5"), 61), d("7.63"));
        assert_eq!(session_cost(d("10"), 0), Decimal::ZERO);
        assert_eq!(session_cost(Decimal::ZERO, 600), Decimal::ZERO);
    }

    #[test]
    fn split_parts_sum_to_amount() {
        assert_eq!(split(d("100"), d("20")), (d("20.00"), d("80.00")));

        let (fee, earning) = split(d("33.33"), d("20"));
        assert_eq!(fee, d("6.67"));
        assert_eq!(earning, d("26.66"));
        assert_eq!(fee + earning, d("33.33"));
    }

    #[test]
    fn max_duration_respects_balance_and_cap() {
        assert_eq!(max_duration_secs(d("25"), d("10"), 120), 150);
        assert_eq!(max_duration_secs(d("10000"), d("1"), 30), 30 * 60);
        assert_eq!(max_duration_secs(d("5"), Decimal::ZERO, 30), 30 * 60);
        assert_eq!(max_duration_secs(Decimal::ZERO, d("10"), 30), 0);
    }

    #[test]
    fn money_always_has_two_decimals() {
        assert_eq!(round_money(d("40")).to_string(), "40.00");
        assert_eq!(round_money(d("10.500")).to_string(), "10.50");
        assert_eq!(session_cost(d("10"), 60).to_string(), "10.00");
        assert_eq!(session_cost(d("10"), 0).to_string(), "0.00");

        let (fee, earning) = split(d("10.00"), d("20"));
        assert_eq!((fee.to_string(), earning.to_string()), ("2.00".to_string(), "8.00".to_string()));
    }

    #[test]
    fn amount_validation() {
        assert!(is_valid_amount(d("10.50")));
        assert!(is_valid_amount(d("10.500")));
        assert!(!is_valid_amount(d("10.505")));
        assert!(!is_valid_amount(Decimal::ZERO));
        assert!(!is_valid_amount(d("-1")));
    }
}
