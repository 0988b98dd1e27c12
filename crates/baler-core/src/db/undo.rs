//! Undo journal for transactions that may fail mid-flight.
//!
//! New-order validates its inputs before touching anything, so the only
//! mid-flight failure left is a disk-tier I/O error; payment keeps a
//! journal too so the driver can revert it if it ever needs to. The
//! journal records pre-images of mutated rows (for the compressed
//! relations, just the touched slots) and the identities of inserted
//! rows, and is discarded on commit.

use crate::rows::{District, NewOrder, Warehouse};
use crate::schema::AttrValue;

/// Saved `(slot, value)` pre-images of one compressed tuple.
pub(crate) type SlotImage = Vec<(usize, AttrValue)>;

#[derive(Debug, Default)]
pub struct UndoJournal {
    pub(crate) warehouses: Vec<(u32, Warehouse)>,
    pub(crate) districts: Vec<(u32, District)>,
    pub(crate) stocks: Vec<(u32, SlotImage)>,
    pub(crate) customers: Vec<(u32, SlotImage)>,
    /// Primary keys of rows this transaction created.
    pub(crate) inserted_orders: Vec<u64>,
    pub(crate) inserted_order_secondaries: Vec<u64>,
    pub(crate) inserted_orderlines: Vec<u64>,
    pub(crate) inserted_neworders: Vec<u64>,
    /// Number of history rows appended by this transaction.
    pub(crate) inserted_history: usize,
    /// NewOrder rows this transaction consumed.
    pub(crate) deleted_neworders: Vec<(u64, NewOrder)>,
}

impl UndoJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.warehouses.is_empty()
            && self.districts.is_empty()
            && self.stocks.is_empty()
            && self.customers.is_empty()
            && self.inserted_orders.is_empty()
            && self.inserted_orderlines.is_empty()
            && self.inserted_neworders.is_empty()
            && self.inserted_history == 0
            && self.deleted_neworders.is_empty()
    }

    pub(crate) fn save_warehouse(&mut self, key: u32, row: &Warehouse) {
        if !self.warehouses.iter().any(|(k, _)| *k == key) {
            self.warehouses.push((key, row.clone()));
        }
    }

    pub(crate) fn save_district(&mut self, key: u32, row: &District) {
        if !self.districts.iter().any(|(k, _)| *k == key) {
            self.districts.push((key, row.clone()));
        }
    }

    pub(crate) fn save_stock_slots(&mut self, key: u32, image: SlotImage) {
        if !self.stocks.iter().any(|(k, _)| *k == key) {
            self.stocks.push((key, image));
        }
    }

    pub(crate) fn save_customer_slots(&mut self, key: u32, image: SlotImage) {
        if !self.customers.iter().any(|(k, _)| *k == key) {
            self.customers.push((key, image));
        }
    }
}
