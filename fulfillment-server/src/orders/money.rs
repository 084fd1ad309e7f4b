//! Money calculation utilities using rust_decimal for precision
//!
//! All amounts are `Decimal`, rounded to 2 decimal places half-up where a
//! percentage is applied. Remainders stay with the party the rate is taken
//! from so every split sums back to its input exactly.

use rust_decimal::prelude::*;
use shared::order::OrderItem;

/// Rounding precision for monetary values
const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Fixed delivery charge added to every order
pub const DELIVERY_CHARGE: Decimal = Decimal::from_parts(40, 0, 0, false, 0);
/// Fixed platform fee added to every order
pub const PLATFORM_FEE: Decimal = Decimal::from_parts(4, 0, 0, false, 0);
/// Platform commission on vendor item revenue (2%)
pub const COMMISSION_RATE: Decimal = Decimal::from_parts(2, 0, 0, false, 2);
/// Flat rider fee per delivered order
pub const RIDER_DELIVERY_FEE: Decimal = Decimal::from_parts(40, 0, 0, false, 0);
/// Late fee on the vendor's item total (10%)
pub const LATE_FEE_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);
/// Payout fee on withdrawals (2%)
pub const WITHDRAWAL_FEE_RATE: Decimal = Decimal::from_parts(2, 0, 0, false, 2);

/// Maximum quantity per order line
pub const MAX_QUANTITY: u32 = 99;

/// Round to 2 dp, half away from zero
#[inline]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Σ(unit_price × quantity)
pub fn items_subtotal(items: &[OrderItem]) -> Decimal {
    items.iter().map(OrderItem::line_total).sum()
}

/// subtotal + delivery charge + platform fee (computed once at creation)
pub fn order_total(subtotal: Decimal) -> Decimal {
    subtotal + DELIVERY_CHARGE + PLATFORM_FEE
}

/// Item totals per vendor, in first-appearance order
pub fn vendor_item_totals(items: &[OrderItem]) -> Vec<(String, Decimal)> {
    let mut totals: Vec<(String, Decimal)> = Vec::new();
    for item in items {
        match totals.iter_mut().find(|(v, _)| *v == item.vendor_id) {
            Some((_, total)) => *total += item.line_total(),
            None => totals.push((item.vendor_id.clone(), item.line_total())),
        }
    }
    totals
}

/// Commission split for one vendor's items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorSplit {
    pub item_total: Decimal,
    pub commission: Decimal,
    pub vendor_income: Decimal,
}

/// commission = item_total × 2%, vendor_income = item_total − commission
pub fn vendor_split(item_total: Decimal) -> VendorSplit {
    let commission = round_money(item_total * COMMISSION_RATE);
    VendorSplit {
        item_total,
        commission,
        vendor_income: item_total - commission,
    }
}

/// 10% of an item amount, rounded half-up
pub fn late_fee(item_total: Decimal) -> Decimal {
    round_money(item_total * LATE_FEE_RATE)
}

/// Charge one late fee on the order subtotal and split it across vendors
///
/// Each vendor pays its proportional share truncated to cents; the last
/// vendor absorbs the rounding remainder, so the shares sum to the fee.
pub fn split_late_fee(
    subtotal: Decimal,
    vendor_totals: &[(String, Decimal)],
) -> (Decimal, Vec<(String, Decimal)>) {
    let fee = late_fee(subtotal);
    if vendor_totals.is_empty() || subtotal.is_zero() {
        return (fee, Vec::new());
    }

    let mut charged = Decimal::ZERO;
    let mut shares = Vec::with_capacity(vendor_totals.len());
    let last = vendor_totals.len() - 1;
    for (idx, (vendor_id, item_total)) in vendor_totals.iter().enumerate() {
        let share = if idx == last {
            fee - charged
        } else {
            (fee * *item_total / subtotal)
                .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::ToZero)
        };
        charged += share;
        shares.push((vendor_id.clone(), share));
    }
    (fee, shares)
}

/// Returns (fee, net_amount)
pub fn withdrawal_fee(amount: Decimal) -> (Decimal, Decimal) {
    let fee = round_money(amount * WITHDRAWAL_FEE_RATE);
    (fee, amount - fee)
}

/// Incremental running mean: `(old × (n−1) + rating) / n`
///
/// `n` is the delivery count after incrementing for this delivery.
pub fn running_average(old_average: f64, n: u32, rating: u8) -> f64 {
    if n == 0 {
        return old_average;
    }
    let n = f64::from(n);
    (old_average * (n - 1.0) + f64::from(rating)) / n
}

/// Compare two amounts within [`MONEY_TOLERANCE`]
pub fn money_eq(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() < MONEY_TOLERANCE
}
