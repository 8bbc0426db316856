use crate::{
    cart::{CartSnapshot, LineKey, SkipReason},
    config::CartConfig,
    db::DbPool,
    entities::{Coupon, Product, ProductVariant},
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::EntityTrait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Rounds a monetary amount half-up to two places. Percentage math can
/// produce sub-cent values; everything persisted or displayed goes through
/// this first.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Threshold-based flat shipping quote. Local rule, no carrier integration.
pub fn shipping_quote(subtotal: Decimal, config: &CartConfig) -> Decimal {
    if subtotal >= config.free_shipping_threshold || subtotal <= Decimal::ZERO {
        Decimal::ZERO
    } else {
        config.flat_shipping_fee
    }
}

/// The discount mechanism applied to a cart. The two variants are mutually
/// exclusive: a cart with a redeemable coupon prices by percentage, any
/// other cart prices by the paired-promotion rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscountPolicy {
    /// For every two promo-flagged units, the cheaper one is free.
    PromoPairs,
    CouponPercent { code: String, percent: Decimal },
}

/// A cart line the pricing pass fully resolved against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub product_name: String,
    pub variant_label: Option<String>,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub line_subtotal: Decimal,
    pub promo_eligible: bool,
}

/// A line excluded from pricing, with the reason. Best-effort pricing skips
/// bad data instead of failing the buyer; the report keeps that observable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedLine {
    pub reference: String,
    pub reason: SkippedLineReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkippedLineReason {
    MalformedKey,
    NonPositiveQuantity,
    UnknownProduct,
    UnknownVariant,
    NegativePrice,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricingResult {
    pub lines: Vec<PricedLine>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub policy: DiscountPolicy,
    pub skipped: Vec<SkippedLine>,
}

impl PricingResult {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Resolves cart snapshots against the catalog and computes payable totals.
#[derive(Clone)]
pub struct PricingService {
    db: Arc<DbPool>,
}

impl PricingService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Prices a cart snapshot. Unresolvable lines are skipped and reported;
    /// only infrastructure failures surface as errors.
    #[instrument(skip(self, snapshot), fields(lines = snapshot.lines.len()))]
    pub async fn price(&self, snapshot: &CartSnapshot) -> Result<PricingResult, ServiceError> {
        let mut resolved = Vec::with_capacity(snapshot.lines.len());
        let mut skipped: Vec<SkippedLine> = snapshot
            .skipped
            .iter()
            .map(|entry| SkippedLine {
                reference: entry.raw_key.clone(),
                reason: match entry.reason {
                    SkipReason::MalformedKey => SkippedLineReason::MalformedKey,
                    SkipReason::NonPositiveQuantity => SkippedLineReason::NonPositiveQuantity,
                },
            })
            .collect();

        for line in &snapshot.lines {
            match self.resolve_line(line.key, line.quantity).await? {
                Ok(priced) => resolved.push(priced),
                Err(skip) => {
                    warn!(reference = %skip.reference, reason = ?skip.reason, "skipping unpriceable cart line");
                    skipped.push(skip);
                }
            }
        }

        let policy = self.resolve_policy(snapshot.coupon_id).await?;
        Ok(compute_pricing(resolved, policy, skipped))
    }

    /// Resolves one line against the catalog. The inner `Err` is a skip
    /// report, not a failure.
    async fn resolve_line(
        &self,
        key: LineKey,
        quantity: u32,
    ) -> Result<Result<PricedLine, SkippedLine>, ServiceError> {
        let skip = |reason| {
            Ok(Err(SkippedLine {
                reference: key.encode(),
                reason,
            }))
        };

        let Some(product) = Product::find_by_id(key.product_id).one(&*self.db).await? else {
            return skip(SkippedLineReason::UnknownProduct);
        };

        let variant = match key.variant_id {
            Some(variant_id) => {
                match ProductVariant::find_by_id(variant_id).one(&*self.db).await? {
                    Some(v) if v.product_id == product.id => Some(v),
                    _ => return skip(SkippedLineReason::UnknownVariant),
                }
            }
            None => None,
        };

        let unit_price = product.price + variant.as_ref().map(|v| v.price_delta).unwrap_or_default();
        if unit_price < Decimal::ZERO {
            return skip(SkippedLineReason::NegativePrice);
        }

        Ok(Ok(PricedLine {
            product_id: product.id,
            variant_id: variant.as_ref().map(|v| v.id),
            product_name: product.name,
            variant_label: variant.map(|v| v.label),
            unit_price,
            quantity,
            line_subtotal: unit_price * Decimal::from(quantity),
            promo_eligible: product.promo_buy_one_get_two,
        }))
    }

    /// A redeemable applied coupon selects percentage pricing; anything else
    /// falls back to the paired-promotion rule.
    async fn resolve_policy(
        &self,
        coupon_id: Option<Uuid>,
    ) -> Result<DiscountPolicy, ServiceError> {
        let Some(coupon_id) = coupon_id else {
            return Ok(DiscountPolicy::PromoPairs);
        };
        match Coupon::find_by_id(coupon_id).one(&*self.db).await? {
            Some(coupon) if coupon.is_redeemable_at(Utc::now()) => {
                Ok(DiscountPolicy::CouponPercent {
                    code: coupon.code,
                    percent: coupon.discount_percent,
                })
            }
            _ => {
                warn!(%coupon_id, "applied coupon no longer redeemable; pricing without it");
                Ok(DiscountPolicy::PromoPairs)
            }
        }
    }
}

/// Pure pricing pass over resolved lines.
pub fn compute_pricing(
    lines: Vec<PricedLine>,
    policy: DiscountPolicy,
    skipped: Vec<SkippedLine>,
) -> PricingResult {
    let subtotal: Decimal = lines.iter().map(|line| line.line_subtotal).sum();

    let discount = match &policy {
        DiscountPolicy::PromoPairs => paired_promo_discount(&lines),
        DiscountPolicy::CouponPercent { percent, .. } => {
            round_money(subtotal * *percent / Decimal::from(100))
        }
    };

    PricingResult {
        total: subtotal - discount,
        subtotal,
        discount,
        policy,
        lines,
        skipped,
    }
}

/// For N promo-flagged units priced p1 <= ... <= pN, the discount is the sum
/// of the floor(N/2) cheapest unit prices: per pair of qualifying units, the
/// cheaper one is free.
fn paired_promo_discount(lines: &[PricedLine]) -> Decimal {
    let mut unit_prices: Vec<Decimal> = lines
        .iter()
        .filter(|line| line.promo_eligible)
        .flat_map(|line| std::iter::repeat(line.unit_price).take(line.quantity as usize))
        .collect();

    if unit_prices.len() < 2 {
        return Decimal::ZERO;
    }

    unit_prices.sort();
    let free_units = unit_prices.len() / 2;
    unit_prices.iter().take(free_units).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(unit_price: Decimal, quantity: u32, promo: bool) -> PricedLine {
        PricedLine {
            product_id: Uuid::new_v4(),
            variant_id: None,
            product_name: "item".to_string(),
            variant_label: None,
            unit_price,
            quantity,
            line_subtotal: unit_price * Decimal::from(quantity),
            promo_eligible: promo,
        }
    }

    #[test]
    fn empty_cart_prices_to_zero() {
        let result = compute_pricing(vec![], DiscountPolicy::PromoPairs, vec![]);
        assert_eq!(result.subtotal, Decimal::ZERO);
        assert_eq!(result.discount, Decimal::ZERO);
        assert_eq!(result.total, Decimal::ZERO);
    }

    #[test]
    fn two_promo_units_discount_the_cheaper_one() {
        // {A(1000, promo) x2, B(500, non-promo) x1}
        let result = compute_pricing(
            vec![line(dec!(1000), 2, true), line(dec!(500), 1, false)],
            DiscountPolicy::PromoPairs,
            vec![],
        );
        assert_eq!(result.subtotal, dec!(2500));
        assert_eq!(result.discount, dec!(1000));
        assert_eq!(result.total, dec!(1500));
    }

    #[test]
    fn odd_promo_count_discounts_the_floored_half() {
        // 5 units priced 10, 20, 30, 40, 50 -> 2 free: 10 + 20
        let lines = vec![
            line(dec!(30), 1, true),
            line(dec!(10), 1, true),
            line(dec!(50), 1, true),
            line(dec!(20), 1, true),
            line(dec!(40), 1, true),
        ];
        let result = compute_pricing(lines, DiscountPolicy::PromoPairs, vec![]);
        assert_eq!(result.discount, dec!(30));
        assert_eq!(result.total, dec!(120));
    }

    #[test]
    fn single_promo_unit_earns_no_discount() {
        let result = compute_pricing(
            vec![line(dec!(999.90), 1, true)],
            DiscountPolicy::PromoPairs,
            vec![],
        );
        assert_eq!(result.discount, Decimal::ZERO);
    }

    #[test]
    fn quantity_expands_into_discrete_units() {
        // One line of qty 4 behaves like four units: two go free.
        let result = compute_pricing(
            vec![line(dec!(100), 4, true)],
            DiscountPolicy::PromoPairs,
            vec![],
        );
        assert_eq!(result.discount, dec!(200));
        assert_eq!(result.total, dec!(200));
    }

    #[test]
    fn non_promo_lines_never_contribute_units() {
        let result = compute_pricing(
            vec![line(dec!(100), 10, false)],
            DiscountPolicy::PromoPairs,
            vec![],
        );
        assert_eq!(result.discount, Decimal::ZERO);
    }

    #[test]
    fn coupon_percent_rounds_half_up() {
        // 10.05% of 99.90 = 10.039950 -> 10.04
        let result = compute_pricing(
            vec![line(dec!(99.90), 1, false)],
            DiscountPolicy::CouponPercent {
                code: "PROMO".to_string(),
                percent: dec!(10.05),
            },
            vec![],
        );
        assert_eq!(result.discount, dec!(10.04));
        assert_eq!(result.total, dec!(89.86));
    }

    #[test]
    fn coupon_policy_ignores_promo_flags() {
        // The two mechanisms never combine.
        let result = compute_pricing(
            vec![line(dec!(1000), 2, true)],
            DiscountPolicy::CouponPercent {
                code: "TEN".to_string(),
                percent: dec!(10),
            },
            vec![],
        );
        assert_eq!(result.discount, dec!(200));
        assert_eq!(result.total, dec!(1800));
    }

    #[test]
    fn hundred_percent_coupon_zeroes_the_total() {
        let result = compute_pricing(
            vec![line(dec!(123.45), 1, false)],
            DiscountPolicy::CouponPercent {
                code: "FULL".to_string(),
                percent: dec!(100),
            },
            vec![],
        );
        assert_eq!(result.total, Decimal::ZERO);
    }

    #[test]
    fn skipped_lines_are_carried_into_the_result() {
        let skipped = vec![SkippedLine {
            reference: "legacy-garbage".to_string(),
            reason: SkippedLineReason::MalformedKey,
        }];
        let result = compute_pricing(vec![], DiscountPolicy::PromoPairs, skipped.clone());
        assert_eq!(result.skipped, skipped);
    }

    #[test]
    fn round_money_is_half_up() {
        assert_eq!(round_money(dec!(1.005)), dec!(1.01));
        assert_eq!(round_money(dec!(1.004)), dec!(1.00));
        assert_eq!(round_money(dec!(2.675)), dec!(2.68));
    }

    #[test]
    fn shipping_quote_uses_threshold() {
        let config = CartConfig::default();
        assert_eq!(shipping_quote(dec!(1499.99), &config), dec!(50.00));
        assert_eq!(shipping_quote(dec!(1500.00), &config), Decimal::ZERO);
        assert_eq!(shipping_quote(Decimal::ZERO, &config), Decimal::ZERO);
    }
}
