//! Store item domain model

use crate::domain::round::Multiplier;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A purchasable tap-round boost
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreItem {
    /// Stable catalog id, e.g. "double-tap"
    pub id: String,
    pub name: String,
    pub description: String,
    /// Price in KTC
    pub price: Decimal,
    /// Multiplier factor the boost arms
    pub factor: u32,
    /// Boosted taps per use
    pub charges: u32,
}

impl StoreItem {
    /// The fixed boost catalog
    pub fn catalog() -> Vec<StoreItem> {
        vec![
            StoreItem {
                id: "double-tap".to_string(),
                name: "Double Tap".to_string(),
                description: "2x tap reward for 50 taps".to_string(),
                price: Decimal::from(150),
                factor: 2,
                charges: 50,
            },
            StoreItem {
                id: "golden-finger".to_string(),
                name: "Golden Finger".to_string(),
                description: "5x tap reward for 20 taps".to_string(),
                price: Decimal::from(400),
                factor: 5,
                charges: 20,
            },
            StoreItem {
                id: "turbo-surge".to_string(),
                name: "Turbo Surge".to_string(),
                description: "10x tap reward for 10 taps".to_string(),
                price: Decimal::from(900),
                factor: 10,
                charges: 10,
            },
        ]
    }

    /// Look up a catalog item by id
    pub fn find(id: &str) -> Option<StoreItem> {
        Self::catalog().into_iter().find(|item| item.id == id)
    }

    /// The multiplier this boost arms when used in a round
    pub fn to_multiplier(&self) -> Multiplier {
        Multiplier {
            factor: self.factor,
            charges: self.charges,
        }
    }
}

/// A boost owned by an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnedItem {
    pub account_id: Uuid,
    pub item_id: String,
    pub quantity: i64,
    pub acquired_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_ids_are_unique() {
        let catalog = StoreItem::catalog();
        let ids: HashSet<_> = catalog.iter().map(|i| i.id.clone()).collect();
        assert_eq!(ids.len(), catalog.len());
    }

    #[test]
    fn test_find_known_and_unknown_items() {
        assert!(StoreItem::find("double-tap").is_some());
        assert!(StoreItem::find("no-such-boost").is_none());
    }

    #[test]
    fn test_boost_maps_to_multiplier() {
        let item = StoreItem::find("golden-finger").unwrap();
        let m = item.to_multiplier();
        assert_eq!(m.factor, 5);
        assert_eq!(m.charges, 20);
    }

    #[test]
    fn test_prices_are_positive() {
        for item in StoreItem::catalog() {
            assert!(item.price > Decimal::ZERO, "{} has bad price", item.id);
        }
    }
}
