use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Percentage discount coupon. Read-only at cart time; a cart holds at most
/// one applied coupon id.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Stored uppercase; lookups normalize the submitted code.
    #[sea_orm(unique)]
    pub code: String,
    /// 0-100
    #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
    pub discount_percent: Decimal,
    pub active: bool,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Model {
    /// A coupon is redeemable when active and inside its validity window.
    pub fn is_redeemable_at(&self, now: DateTime<Utc>) -> bool {
        self.active && self.valid_from <= now && now <= self.valid_to
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn coupon(active: bool, from_offset: i64, to_offset: i64) -> Model {
        let now = Utc::now();
        Model {
            id: Uuid::new_v4(),
            code: "PROMO10".to_string(),
            discount_percent: dec!(10.00),
            active,
            valid_from: now + Duration::days(from_offset),
            valid_to: now + Duration::days(to_offset),
            created_at: now,
        }
    }

    #[test]
    fn redeemable_inside_window() {
        assert!(coupon(true, -1, 1).is_redeemable_at(Utc::now()));
    }

    #[test]
    fn not_redeemable_when_inactive_or_outside_window() {
        let now = Utc::now();
        assert!(!coupon(false, -1, 1).is_redeemable_at(now));
        assert!(!coupon(true, 1, 2).is_redeemable_at(now));
        assert!(!coupon(true, -2, -1).is_redeemable_at(now));
    }
}
