use rust_decimal::{Decimal, RoundingStrategy};

/// Result of splitting a payment into platform and helper portions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionSplit {
    pub commission_amount: Decimal,
    pub helper_amount: Decimal,
}

/// Split an amount between the platform commission and the helper payout.
///
/// The commission is rounded half-up to the currency minor unit (2 decimal
/// places) and the helper gets the exact remainder, so the two parts always
/// sum back to the original amount. The rate is passed in by the caller and
/// snapshotted onto the commission record; it is never re-read at settlement.
pub fn split(original_amount: Decimal, rate: Decimal) -> CommissionSplit {
    let commission_amount = (original_amount * rate)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    CommissionSplit {
        commission_amount,
        helper_amount: original_amount - commission_amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_budget_of_200_sek_at_default_rate() {
        let split = split(dec!(200), dec!(0.10));
        assert_eq!(split.commission_amount, dec!(20.00));
        assert_eq!(split.helper_amount, dec!(180.00));
    }

    #[test]
    fn test_parts_always_sum_to_original() {
        for (amount, rate) in [
            (dec!(199.99), dec!(0.10)),
            (dec!(0.01), dec!(0.10)),
            (dec!(333.33), dec!(0.15)),
            (dec!(1), dec!(0.125)),
            (dec!(12345.67), dec!(0.07)),
        ] {
            let s = split(amount, rate);
            assert_eq!(
                s.commission_amount + s.helper_amount,
                amount,
                "split of {} at {} does not sum back",
                amount,
                rate
            );
        }
    }

    #[test]
    fn test_midpoint_rounds_up() {
        // 0.05 * 0.10 = 0.005, a midpoint: half-up gives the platform the öre
        let s = split(dec!(0.05), dec!(0.10));
        assert_eq!(s.commission_amount, dec!(0.01));
        assert_eq!(s.helper_amount, dec!(0.04));
    }

    #[test]
    fn test_zero_rate_gives_everything_to_helper() {
        let s = split(dec!(500), Decimal::ZERO);
        assert_eq!(s.commission_amount, Decimal::ZERO);
        assert_eq!(s.helper_amount, dec!(500));
    }
}
