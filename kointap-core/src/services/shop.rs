//! Shop service - catalog, purchases, and multiplier activation

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::adapters::duckdb::DuckDbStore;
use crate::domain::result::{Error, Result};
use crate::domain::{Multiplier, OwnedItem, StoreItem};

/// Shop service for the fixed item catalog
pub struct ShopService {
    store: Arc<DuckDbStore>,
}

impl ShopService {
    pub fn new(store: Arc<DuckDbStore>) -> Self {
        Self { store }
    }

    pub fn catalog(&self) -> Vec<StoreItem> {
        StoreItem::catalog()
    }

    /// Buy one unit of a catalog item. Debit and grant commit together.
    pub fn buy(&self, account_id: &Uuid, item_id: &str) -> Result<PurchaseReceipt> {
        let item = StoreItem::find(item_id)
            .ok_or_else(|| Error::not_found(format!("store item '{}'", item_id)))?;
        let account = self
            .store
            .purchase_item(account_id, &item.id, item.price, &item.name)?;
        Ok(PurchaseReceipt {
            balance: account.balance,
            item,
        })
    }

    /// Items the account owns at least one of, joined with catalog data.
    /// Rows for ids no longer in the catalog are skipped.
    pub fn owned(&self, account_id: &Uuid) -> Result<Vec<(StoreItem, OwnedItem)>> {
        let owned = self.store.get_owned_items(account_id)?;
        Ok(owned
            .into_iter()
            .filter_map(|o| StoreItem::find(&o.item_id).map(|item| (item, o)))
            .collect())
    }

    /// Consume one unit and hand back the multiplier it arms
    pub fn use_item(&self, account_id: &Uuid, item_id: &str) -> Result<Multiplier> {
        let item = StoreItem::find(item_id)
            .ok_or_else(|| Error::not_found(format!("store item '{}'", item_id)))?;
        if !self.store.consume_item(account_id, &item.id)? {
            return Err(Error::validation(format!("no '{}' owned", item.name)));
        }
        Ok(item.to_multiplier())
    }
}

/// Outcome of a store purchase
#[derive(Debug, Serialize)]
pub struct PurchaseReceipt {
    pub item: StoreItem,
    pub balance: Decimal,
}
