//! Fiat-to-satoshi price conversion.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Satoshi prices are rounded to this step so quotes do not suggest
/// false precision and absorb rate jitter between quote and payment.
pub const SATOSHI_ROUNDING_STEP: i64 = 10_000;

/// Satoshi per BTC (1e8) over cents per EUR (1e2): multiplying cents by
/// this and dividing by the EUR/BTC rate yields satoshi.
const CENT_TO_SATOSHI_SCALE: i64 = 1_000_000;

/// Convert a fiat total in cents to a satoshi price.
///
/// `satoshi = round_to_step(cents * 1/(1 - fee) * 1e6 / rate)` where
/// `rate` is EUR per BTC and `fee` is the margin fraction. Returns `None`
/// when the inputs cannot produce a meaningful positive price: rate not
/// positive, fee outside `[0, 1)`, or a total that rounds to zero.
pub fn satoshi_price(total_cents: i64, eur_per_btc: Decimal, fee_fraction: Decimal) -> Option<i64> {
    if total_cents <= 0 || eur_per_btc <= Decimal::ZERO {
        return None;
    }
    if fee_fraction < Decimal::ZERO || fee_fraction >= Decimal::ONE {
        return None;
    }

    let gross_cents = Decimal::from(total_cents) / (Decimal::ONE - fee_fraction);
    let satoshi = gross_cents * Decimal::from(CENT_TO_SATOSHI_SCALE) / eur_per_btc;

    let step = Decimal::from(SATOSHI_ROUNDING_STEP);
    let rounded =
        (satoshi / step).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero) * step;
    rounded.to_i64().filter(|s| *s > 0)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn worked_example_without_fee() {
        // 10.00 EUR at 400 EUR/BTC is 0.025 BTC = 2,500,000 satoshi,
        // already a multiple of the rounding step.
        assert_eq!(satoshi_price(1000, dec("400"), Decimal::ZERO), Some(2_500_000));
    }

    #[test]
    fn rounds_to_coarse_step() {
        // 1000 * 1e6 / 417 = 2,398,081.5; nearest step is 2,400,000.
        assert_eq!(satoshi_price(1000, dec("417"), Decimal::ZERO), Some(2_400_000));
    }

    #[test]
    fn fee_margin_increases_price() {
        // A 50% fee fraction doubles the gross amount.
        assert_eq!(satoshi_price(1000, dec("400"), dec("0.5")), Some(5_000_000));
        let flat = satoshi_price(1000, dec("400"), Decimal::ZERO).unwrap();
        let with_fee = satoshi_price(1000, dec("400"), dec("0.02")).unwrap();
        assert!(with_fee > flat);
    }

    #[test]
    fn unusable_rate_is_rejected() {
        assert_eq!(satoshi_price(1000, Decimal::ZERO, Decimal::ZERO), None);
        assert_eq!(satoshi_price(1000, dec("-400"), Decimal::ZERO), None);
    }

    #[test]
    fn unusable_fee_is_rejected() {
        assert_eq!(satoshi_price(1000, dec("400"), Decimal::ONE), None);
        assert_eq!(satoshi_price(1000, dec("400"), dec("1.5")), None);
        assert_eq!(satoshi_price(1000, dec("400"), dec("-0.1")), None);
    }

    #[test]
    fn dust_totals_round_to_nothing() {
        // One cent at a very high rate rounds down to zero satoshi.
        assert_eq!(satoshi_price(1, dec("10000000"), Decimal::ZERO), None);
        assert_eq!(satoshi_price(0, dec("400"), Decimal::ZERO), None);
    }
}
