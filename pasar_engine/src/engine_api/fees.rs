use serde::{Deserialize, Serialize};

use crate::db_types::{Money, PaymentMethod};

/// The platform and gateway fee rates, in basis points.
///
/// A schedule is handed to the engine at order placement and the resulting amounts are frozen onto the order row,
/// so a later rate change never alters an existing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// The platform's cut of the order total, deducted from the seller's revenue.
    pub platform_bps: u32,
    /// The processor surcharge, added on top of the buyer's charge.
    pub gateway_bps: u32,
}

impl FeeSchedule {
    pub fn new(platform_bps: u32, gateway_bps: u32) -> Self {
        Self { platform_bps, gateway_bps }
    }

    /// A schedule that levies nothing. Handy in tests and for fee-exempt flows.
    pub fn free() -> Self {
        Self { platform_bps: 0, gateway_bps: 0 }
    }

    pub fn platform_fee(&self, total: Money) -> Money {
        basis_points(total, self.platform_bps)
    }

    pub fn gateway_fee(&self, total: Money) -> Money {
        basis_points(total, self.gateway_bps)
    }

    /// The `(platform_fee, gateway_fee)` pair for an order. Only gateway orders carry fees; cash and balance
    /// orders settle at face value.
    pub fn fees_for(&self, method: PaymentMethod, total: Money) -> (Money, Money) {
        match method {
            PaymentMethod::Gateway => (self.platform_fee(total), self.gateway_fee(total)),
            PaymentMethod::Cash | PaymentMethod::Balance => (Money::zero(), Money::zero()),
        }
    }
}

/// `amount * bps / 10_000`, rounded half-up. The intermediate product is widened to `i128` so large totals cannot
/// overflow.
fn basis_points(amount: Money, bps: u32) -> Money {
    let product = i128::from(amount.value()) * i128::from(bps);
    let fee = (product + 5_000) / 10_000;
    #[allow(clippy::cast_possible_truncation)]
    Money::from(fee as i64)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn gateway_orders_carry_fees() {
        let fees = FeeSchedule::new(500, 200); // 5% platform, 2% gateway
        let (platform, gateway) = fees.fees_for(PaymentMethod::Gateway, Money::from(100_000));
        assert_eq!(platform, Money::from(5_000));
        assert_eq!(gateway, Money::from(2_000));
    }

    #[test]
    fn cash_and_balance_orders_are_fee_free() {
        let fees = FeeSchedule::new(500, 200);
        assert_eq!(fees.fees_for(PaymentMethod::Cash, Money::from(100_000)), (Money::zero(), Money::zero()));
        assert_eq!(fees.fees_for(PaymentMethod::Balance, Money::from(100_000)), (Money::zero(), Money::zero()));
    }

    #[test]
    fn fees_round_half_up() {
        // 2.5% of 999 is 24.975 and rounds up to 25.
        assert_eq!(FeeSchedule::new(250, 0).platform_fee(Money::from(999)), Money::from(25));
        // 1% of 49 is 0.49 and rounds down to 0.
        assert_eq!(FeeSchedule::new(100, 0).platform_fee(Money::from(49)), Money::from(0));
        // 1% of 50 is exactly 0.5 and rounds up to 1.
        assert_eq!(FeeSchedule::new(100, 0).platform_fee(Money::from(50)), Money::from(1));
    }

    #[test]
    fn large_totals_do_not_overflow() {
        let total = Money::from(i64::MAX / 20_000);
        let fee = FeeSchedule::new(10_000, 0).platform_fee(total);
        assert_eq!(fee, total);
    }
}
