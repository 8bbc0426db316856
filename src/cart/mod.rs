pub mod store;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Composite cart line key: product plus optional variant selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineKey {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
}

impl LineKey {
    pub fn new(product_id: Uuid, variant_id: Option<Uuid>) -> Self {
        Self {
            product_id,
            variant_id,
        }
    }

    /// Stable string form used as the session-store map key
    /// (`product:variant` or bare `product`). UUIDs never contain `:`,
    /// so the encoding is unambiguous.
    pub fn encode(&self) -> String {
        match self.variant_id {
            Some(variant_id) => format!("{}:{}", self.product_id, variant_id),
            None => self.product_id.to_string(),
        }
    }

    /// Parses a stored key. Returns `None` for malformed legacy entries;
    /// snapshotting skips those rather than failing the whole cart.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.split_once(':') {
            Some((product, variant)) => Some(Self {
                product_id: product.parse().ok()?,
                variant_id: Some(variant.parse().ok()?),
            }),
            None => Some(Self {
                product_id: raw.parse().ok()?,
                variant_id: None,
            }),
        }
    }
}

impl std::fmt::Display for LineKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Direction of a single-step quantity update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantityAction {
    Increase,
    Decrease,
}

/// Wire form of a session cart as persisted in the session store. Keys are
/// the encoded `LineKey` strings; legacy deployments may hold entries this
/// code can no longer parse, which is why `snapshot` is lenient.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredCart {
    #[serde(default)]
    pub lines: BTreeMap<String, i64>,
    #[serde(default)]
    pub coupon_id: Option<Uuid>,
    #[serde(default)]
    pub shipping_quote: Option<Decimal>,
}

impl StoredCart {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Increments the line for `key` by one, creating it if absent.
    pub fn add_line(&mut self, key: LineKey) {
        *self.lines.entry(key.encode()).or_insert(0) += 1;
    }

    /// Steps a line's quantity. Decreasing below 1 removes the line: a
    /// quantity of zero is never stored.
    pub fn update_line(&mut self, key: LineKey, action: QuantityAction) {
        let encoded = key.encode();
        match action {
            QuantityAction::Increase => {
                *self.lines.entry(encoded).or_insert(0) += 1;
            }
            QuantityAction::Decrease => {
                if let Some(quantity) = self.lines.get_mut(&encoded) {
                    *quantity -= 1;
                    if *quantity < 1 {
                        self.lines.remove(&encoded);
                    }
                }
            }
        }
    }

    /// Deletes the line if present; no-op otherwise.
    pub fn remove_line(&mut self, key: LineKey) {
        self.lines.remove(&key.encode());
    }

    /// Resolves the stored map into typed lines for pricing. Entries with an
    /// unparsable key or a non-positive quantity are reported as skipped,
    /// never fatal.
    pub fn snapshot(&self) -> CartSnapshot {
        let mut lines = Vec::with_capacity(self.lines.len());
        let mut skipped = Vec::new();

        for (raw_key, &quantity) in &self.lines {
            match LineKey::parse(raw_key) {
                Some(key) if quantity >= 1 => lines.push(CartLine {
                    key,
                    quantity: quantity as u32,
                }),
                Some(_) => skipped.push(SkippedEntry {
                    raw_key: raw_key.clone(),
                    reason: SkipReason::NonPositiveQuantity,
                }),
                None => skipped.push(SkippedEntry {
                    raw_key: raw_key.clone(),
                    reason: SkipReason::MalformedKey,
                }),
            }
        }

        CartSnapshot {
            lines,
            coupon_id: self.coupon_id,
            shipping_quote: self.shipping_quote,
            skipped,
        }
    }
}

/// One resolved cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    pub key: LineKey,
    pub quantity: u32,
}

/// Typed view of a cart produced by `StoredCart::snapshot`.
#[derive(Debug, Clone, Default)]
pub struct CartSnapshot {
    pub lines: Vec<CartLine>,
    pub coupon_id: Option<Uuid>,
    pub shipping_quote: Option<Decimal>,
    pub skipped: Vec<SkippedEntry>,
}

impl CartSnapshot {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// A session-store entry the snapshot pass could not use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub raw_key: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MalformedKey,
    NonPositiveQuantity,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(variant: bool) -> LineKey {
        LineKey::new(
            Uuid::new_v4(),
            if variant { Some(Uuid::new_v4()) } else { None },
        )
    }

    #[test]
    fn line_key_round_trips_through_encoding() {
        for k in [key(true), key(false)] {
            assert_eq!(LineKey::parse(&k.encode()), Some(k));
        }
    }

    #[test]
    fn malformed_keys_fail_to_parse() {
        assert_eq!(LineKey::parse(""), None);
        assert_eq!(LineKey::parse("12-34"), None);
        assert_eq!(LineKey::parse("not-a-uuid:also-not"), None);
        assert_eq!(
            LineKey::parse(&format!("{}:trailing-junk", Uuid::new_v4())),
            None
        );
    }

    #[test]
    fn add_line_increments_from_absent() {
        let mut cart = StoredCart::default();
        let k = key(true);
        cart.add_line(k);
        cart.add_line(k);
        assert_eq!(cart.lines[&k.encode()], 2);
    }

    #[test]
    fn decrease_below_one_removes_the_line() {
        let mut cart = StoredCart::default();
        let k = key(false);
        cart.add_line(k);
        cart.update_line(k, QuantityAction::Decrease);
        assert!(cart.is_empty());
    }

    #[test]
    fn decrease_on_missing_line_is_a_noop() {
        let mut cart = StoredCart::default();
        cart.update_line(key(false), QuantityAction::Decrease);
        assert!(cart.is_empty());
    }

    #[test]
    fn remove_line_is_noop_when_absent() {
        let mut cart = StoredCart::default();
        let k = key(true);
        cart.add_line(k);
        cart.remove_line(key(true));
        assert_eq!(cart.lines.len(), 1);
        cart.remove_line(k);
        assert!(cart.is_empty());
    }

    #[test]
    fn snapshot_skips_malformed_and_non_positive_entries() {
        let mut cart = StoredCart::default();
        let good = key(true);
        cart.add_line(good);
        cart.lines.insert("legacy-garbage".to_string(), 3);
        cart.lines.insert(Uuid::new_v4().to_string(), 0);

        let snapshot = cart.snapshot();
        assert_eq!(snapshot.lines.len(), 1);
        assert_eq!(snapshot.lines[0].key, good);
        assert_eq!(snapshot.skipped.len(), 2);
        assert!(snapshot
            .skipped
            .iter()
            .any(|s| s.reason == SkipReason::MalformedKey && s.raw_key == "legacy-garbage"));
        assert!(snapshot
            .skipped
            .iter()
            .any(|s| s.reason == SkipReason::NonPositiveQuantity));
    }

    #[test]
    fn stored_cart_survives_json_round_trip() {
        let mut cart = StoredCart::default();
        cart.add_line(key(true));
        cart.coupon_id = Some(Uuid::new_v4());

        let json = serde_json::to_string(&cart).unwrap();
        let back: StoredCart = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cart);
    }
}
