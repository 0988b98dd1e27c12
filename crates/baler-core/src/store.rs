//! The tiered tuple store: one per compressible relation.
//!
//! Every stored tuple is exactly one cell, either compressed bytes in
//! memory or a frame index into the relation's scratch file. The tier is
//! decided once, at insert time, by the accountant; a cell never migrates
//! afterwards. The store owns its scratch attribute vector and native-row
//! buffer, so `find` hands out a borrow that is valid until the next call
//! on the same store.

use std::marker::PhantomData;
use std::path::PathBuf;

use tracing::info;
use xxhash_rust::xxh3::xxh3_64;

use crate::accountant::{Accountant, RelationId};
use crate::btree::BPlusTree;
use crate::diskfile::PageFile;
use crate::enums::EnumCatalog;
use crate::error::{ModelError, Result, TxnError};
use crate::model::Model;
use crate::relation::Relation;
use crate::schema::{AttrVector, Schema};
use crate::types::BLOCK_SIZE;

/// One stored tuple.
#[derive(Debug)]
pub enum Cell {
    /// Key digest byte followed by the compressed slot segments.
    InMemory(Vec<u8>),
    /// Frame index into the relation's scratch file, holding the full
    /// uncompressed native row.
    OnDisk(u64),
}

/// Which tier a key landed in; exposed for stats and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    InMemory,
    OnDisk,
}

fn key_digest(key: u64) -> u8 {
    xxh3_64(&key.to_le_bytes()) as u8
}

pub struct TieredStore<R: Relation> {
    schema: Schema,
    model: Model,
    rel_id: RelationId,
    index: BPlusTree<R::Key, Cell>,
    disk: Option<PageFile>,
    scratch_path: PathBuf,
    scratch_tuple: AttrVector,
    scratch_bytes: Vec<u8>,
    frame_bytes: u64,
    in_mem_count: u64,
    on_disk_count: u64,
    _relation: PhantomData<R>,
}

impl<R: Relation> TieredStore<R> {
    /// `scratch_path` is where the overflow file goes if the budget ever
    /// routes a tuple to disk; nothing is created until then.
    pub fn new(model: Model, rel_id: RelationId, scratch_path: PathBuf) -> Self {
        let schema = R::schema();
        let scratch_tuple = schema.new_vector();
        let frame_bytes = (R::NATIVE_SIZE.div_ceil(BLOCK_SIZE) * BLOCK_SIZE) as u64;
        Self {
            schema,
            model,
            rel_id,
            index: BPlusTree::new(),
            disk: None,
            scratch_path,
            scratch_tuple,
            scratch_bytes: vec![0u8; R::NATIVE_SIZE],
            frame_bytes,
            in_mem_count: 0,
            on_disk_count: 0,
            _relation: PhantomData,
        }
    }

    pub fn arity(&self) -> usize {
        self.schema.arity()
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn in_mem_count(&self) -> u64 {
        self.in_mem_count
    }

    pub fn on_disk_count(&self) -> u64 {
        self.on_disk_count
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index_size_bytes(&self) -> u64 {
        self.index.size_bytes()
    }

    pub fn tier_of(&self, key: R::Key) -> Option<Tier> {
        self.index.get(&key).map(|cell| match cell {
            Cell::InMemory(_) => Tier::InMemory,
            Cell::OnDisk(_) => Tier::OnDisk,
        })
    }

    /// Insert a full tuple, letting the accountant pick the tier.
    ///
    /// With `prefix_len < arity` this only builds the compressed
    /// sub-tuple and commits nothing, for callers that want the encoded
    /// prefix without an index entry.
    pub fn insert(
        &mut self,
        acct: &mut Accountant,
        enums: &EnumCatalog,
        row: &AttrVector,
        prefix_len: usize,
    ) -> Result<()> {
        if prefix_len < self.schema.arity() {
            self.model.compress(row, prefix_len)?;
            return Ok(());
        }

        let key = R::key_of(row)?;
        if self.index.contains_key(&key) {
            return Err(TxnError::DuplicateKey { relation: R::TAG, key: key.into() }.into());
        }

        let compressed = self.model.compress(row, self.schema.arity())?;
        let cell_len = compressed.len() as u64 + 1;

        if acct.to_memory(cell_len) {
            let mut cell = Vec::with_capacity(cell_len as usize);
            cell.push(key_digest(key.into()));
            cell.extend_from_slice(&compressed);
            self.index
                .insert(key, Cell::InMemory(cell))
                .unwrap_or_else(|_| unreachable!("checked for duplicate above"));
            self.in_mem_count += 1;
            acct.add_mem(self.rel_id, cell_len);
        } else {
            let native = R::to_row(row, enums)?;
            R::write_native(&native, &mut self.scratch_bytes);
            if self.disk.is_none() {
                info!(relation = R::TAG, path = %self.scratch_path.display(), "budget exceeded, opening overflow file");
                self.disk = Some(PageFile::create(&self.scratch_path, R::NATIVE_SIZE)?);
            }
            let frame = self
                .disk
                .as_mut()
                .expect("overflow file just ensured")
                .append(&self.scratch_bytes)?;
            self.index
                .insert(key, Cell::OnDisk(frame))
                .unwrap_or_else(|_| unreachable!("checked for duplicate above"));
            self.on_disk_count += 1;
            acct.add_disk(self.rel_id, self.frame_bytes);
        }
        Ok(())
    }

    /// Point lookup. Returns a borrow of the store's scratch tuple with
    /// slots `[0..prefix_len)` filled. On-disk cells always materialise
    /// the full row; disk frames are not field-truncatable.
    pub fn find(
        &mut self,
        enums: &mut EnumCatalog,
        key: R::Key,
        prefix_len: usize,
    ) -> Result<Option<&AttrVector>> {
        let Some(cell) = self.index.get(&key) else {
            return Ok(None);
        };
        match cell {
            Cell::InMemory(bytes) => {
                let expected = key_digest(key.into());
                let actual = bytes[0];
                if actual != expected {
                    return Err(ModelError::ModelInconsistency { expected, actual }.into());
                }
                self.model.decompress(&bytes[1..], &mut self.scratch_tuple, prefix_len)?;
                if prefix_len >= self.schema.arity() {
                    let derived = R::key_of(&self.scratch_tuple)?;
                    if derived != key {
                        return Err(ModelError::KeyMismatch {
                            expected: key.into(),
                            actual: derived.into(),
                        }
                        .into());
                    }
                }
            }
            Cell::OnDisk(frame) => {
                let frame = *frame;
                self.disk
                    .as_mut()
                    .expect("on-disk cell without an overflow file")
                    .read_at(frame, &mut self.scratch_bytes)?;
                let row = R::read_native(&self.scratch_bytes);
                R::to_attrs(&row, &mut self.scratch_tuple, enums)?;
                let derived = R::key_of(&self.scratch_tuple)?;
                if derived != key {
                    return Err(ModelError::KeyMismatch {
                        expected: key.into(),
                        actual: derived.into(),
                    }
                    .into());
                }
            }
        }
        Ok(Some(&self.scratch_tuple))
    }

    /// Write back the `touched` slots of `row` into the stored tuple.
    ///
    /// Only the touched slots of `row` need to hold meaningful values, so
    /// a prefix read is enough to feed an update. In-memory cells are
    /// re-encoded slot by slot and spliced; on-disk cells are read,
    /// patched and rewritten into the same frame.
    pub fn update(
        &mut self,
        acct: &mut Accountant,
        enums: &mut EnumCatalog,
        key: R::Key,
        row: &AttrVector,
        touched: &[usize],
    ) -> Result<()> {
        let Some(cell) = self.index.get_mut(&key) else {
            return Err(TxnError::KeyNotFound { relation: R::TAG, key: key.into() }.into());
        };
        match cell {
            Cell::InMemory(bytes) => {
                let old_len = bytes.len() as u64;
                let mut tail = bytes[1..].to_vec();
                for &slot in touched {
                    let segment = self.model.update_single(row, slot)?;
                    tail = self.model.splice_single(&tail, slot, &segment)?;
                }
                bytes.truncate(1);
                bytes.extend_from_slice(&tail);
                let new_len = bytes.len() as u64;
                if new_len >= old_len {
                    acct.add_mem(self.rel_id, new_len - old_len);
                } else {
                    acct.sub_mem(self.rel_id, old_len - new_len);
                }
            }
            Cell::OnDisk(frame) => {
                let frame = *frame;
                let disk = self.disk.as_mut().expect("on-disk cell without an overflow file");
                disk.read_at(frame, &mut self.scratch_bytes)?;
                let stored = R::read_native(&self.scratch_bytes);
                R::to_attrs(&stored, &mut self.scratch_tuple, enums)?;
                for &slot in touched {
                    let value = row.get(slot)?.clone();
                    self.scratch_tuple.set(slot, value)?;
                }
                let updated = R::to_row(&self.scratch_tuple, enums)?;
                R::write_native(&updated, &mut self.scratch_bytes);
                self.disk
                    .as_mut()
                    .expect("on-disk cell without an overflow file")
                    .write_at(frame, &self.scratch_bytes)?;
            }
        }
        Ok(())
    }

    /// Remove a tuple. On-disk frames are not reclaimed; the scratch file
    /// is append-only and dies with the store.
    pub fn erase(&mut self, acct: &mut Accountant, key: R::Key) -> Result<()> {
        match self.index.remove(&key) {
            None => Err(TxnError::KeyNotFound { relation: R::TAG, key: key.into() }.into()),
            Some(Cell::InMemory(bytes)) => {
                self.in_mem_count -= 1;
                acct.sub_mem(self.rel_id, bytes.len() as u64);
                Ok(())
            }
            Some(Cell::OnDisk(_)) => {
                self.on_disk_count -= 1;
                acct.sub_disk(self.rel_id, self.frame_bytes);
                Ok(())
            }
        }
    }

    /// Visit every stored tuple in key order, fully decoded. The same
    /// scratch vector is reused across calls to `f`; the catalogue is
    /// handed back to the visitor for enum-id reveals.
    pub fn for_each_row(
        &mut self,
        enums: &mut EnumCatalog,
        mut f: impl FnMut(&AttrVector, &EnumCatalog) -> Result<()>,
    ) -> Result<()> {
        let arity = self.schema.arity();
        for (_, cell) in self.index.iter() {
            match cell {
                Cell::InMemory(bytes) => {
                    self.model.decompress(&bytes[1..], &mut self.scratch_tuple, arity)?;
                }
                Cell::OnDisk(frame) => {
                    let frame = *frame;
                    self.disk
                        .as_mut()
                        .expect("on-disk cell without an overflow file")
                        .read_at(frame, &mut self.scratch_bytes)?;
                    let row = R::read_native(&self.scratch_bytes);
                    R::to_attrs(&row, &mut self.scratch_tuple, enums)?;
                }
            }
            f(&self.scratch_tuple, enums)?;
        }
        Ok(())
    }

    /// Ranged variant of [`Self::for_each_row`]: visits keys in
    /// `[start, end)`. Key derivations are dense in `(w_id, d_id, ...)`,
    /// so per-warehouse and per-district scans reduce to one key range.
    pub fn for_each_row_range(
        &mut self,
        enums: &mut EnumCatalog,
        start: R::Key,
        end: R::Key,
        mut f: impl FnMut(&AttrVector, &EnumCatalog) -> Result<()>,
    ) -> Result<()> {
        let arity = self.schema.arity();
        for (key, cell) in self.index.range_from(start) {
            if *key >= end {
                break;
            }
            match cell {
                Cell::InMemory(bytes) => {
                    self.model.decompress(&bytes[1..], &mut self.scratch_tuple, arity)?;
                }
                Cell::OnDisk(frame) => {
                    let frame = *frame;
                    self.disk
                        .as_mut()
                        .expect("on-disk cell without an overflow file")
                        .read_at(frame, &mut self.scratch_bytes)?;
                    let row = R::read_native(&self.scratch_bytes);
                    R::to_attrs(&row, &mut self.scratch_tuple, enums)?;
                }
            }
            f(&self.scratch_tuple, enums)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::StockRel;
    use crate::rows::Stock;
    use crate::types::{PAGE_SLACK, stock_key};
    use tempfile::TempDir;

    fn stock_row(w_id: i32, s_id: i32) -> Stock {
        let mut s = Stock {
            s_i_id: s_id,
            s_w_id: w_id,
            s_quantity: 10 + (s_id % 91),
            s_ytd: s_id % 10,
            s_order_cnt: s_id % 100,
            s_remote_cnt: 0,
            s_data: format!("stock words {}", s_id % 5),
            ..Default::default()
        };
        for d in 0..10 {
            s.s_dist[d] = format!("dist-info-str#{:02}#{:02}#{:04}", d + 1, w_id, s_id);
        }
        s
    }

    struct Fixture {
        _dir: TempDir,
        store: TieredStore<StockRel>,
        acct: Accountant,
        enums: EnumCatalog,
    }

    fn fixture(budget: u64, n_rows: i32) -> Fixture {
        let dir = TempDir::new().unwrap();
        let schema = StockRel::schema();
        let mut enums = EnumCatalog::new();

        let mut sample = Vec::new();
        for s_id in 1..=n_rows {
            let mut v = schema.new_vector();
            StockRel::to_attrs(&stock_row(1, s_id), &mut v, &mut enums).unwrap();
            sample.push(v);
        }
        let model = Model::fit(&schema, &sample, 0).unwrap();
        let store = TieredStore::<StockRel>::new(
            model,
            RelationId::Stock,
            dir.path().join("stock_overflow.bin"),
        );
        Fixture { _dir: dir, store, acct: Accountant::new(budget), enums }
    }

    fn insert_all(fx: &mut Fixture, n_rows: i32) {
        let schema = StockRel::schema();
        let mut v = schema.new_vector();
        for s_id in 1..=n_rows {
            StockRel::to_attrs(&stock_row(1, s_id), &mut v, &mut fx.enums).unwrap();
            fx.store.insert(&mut fx.acct, &fx.enums, &v, schema.arity()).unwrap();
        }
    }

    #[test]
    fn test_insert_find_roundtrip_in_memory() {
        let mut fx = fixture(u64::MAX, 50);
        insert_all(&mut fx, 50);
        assert_eq!(fx.store.in_mem_count(), 50);
        assert_eq!(fx.store.on_disk_count(), 0);

        let found = fx.store.find(&mut fx.enums, stock_key(1, 17), 17).unwrap().unwrap();
        let row = StockRel::to_row(found, &fx.enums).unwrap();
        assert_eq!(row.s_i_id, 17);
        assert_eq!(row.s_quantity, 10 + 17 % 91);
        assert_eq!(row.s_data, "stock words 2");
    }

    #[test]
    fn test_zero_budget_routes_everything_to_disk() {
        let mut fx = fixture(0, 30);
        insert_all(&mut fx, 30);
        assert_eq!(fx.store.in_mem_count(), 0);
        assert_eq!(fx.store.on_disk_count(), 30);
        assert_eq!(fx.acct.in_mem_total(), 0);
        assert_eq!(fx.acct.disk_total(), 30 * 4096);

        // Disk finds still return the correct full row, even for a short
        // prefix request.
        let found = fx.store.find(&mut fx.enums, stock_key(1, 9), 1).unwrap().unwrap();
        let row = StockRel::to_row(found, &fx.enums).unwrap();
        assert_eq!(row.s_i_id, 9);
        assert_eq!(row.s_dist[3], "dist-info-str#04#01#0009");
    }

    #[test]
    fn test_no_overflow_file_until_first_spill() {
        let fx = fixture(u64::MAX, 10);
        let path = fx.store.scratch_path.clone();
        let mut fx = fx;
        insert_all(&mut fx, 10);
        assert!(!path.exists());
    }

    #[test]
    fn test_accountant_matches_cell_sizes() {
        let mut fx = fixture(u64::MAX, 40);
        insert_all(&mut fx, 40);
        let total: u64 = (1..=40)
            .map(|s_id| match fx.store.index.get(&stock_key(1, s_id)).unwrap() {
                Cell::InMemory(b) => b.len() as u64,
                Cell::OnDisk(_) => 0,
            })
            .sum();
        assert_eq!(fx.acct.in_mem_total(), total);
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut fx = fixture(u64::MAX, 5);
        insert_all(&mut fx, 5);
        let schema = StockRel::schema();
        let mut v = schema.new_vector();
        StockRel::to_attrs(&stock_row(1, 3), &mut v, &mut fx.enums).unwrap();
        let err = fx.store.insert(&mut fx.acct, &fx.enums, &v, schema.arity()).unwrap_err();
        assert!(matches!(err, crate::error::Error::Txn(TxnError::DuplicateKey { .. })));
        assert_eq!(fx.store.len(), 5);
    }

    #[test]
    fn test_update_single_slot_in_memory() {
        let mut fx = fixture(u64::MAX, 20);
        insert_all(&mut fx, 20);
        let key = stock_key(1, 4);

        let mut v = fx.store.find(&mut fx.enums, key, 5).unwrap().unwrap().clone();
        v.set_int(0, 77).unwrap();
        fx.store.update(&mut fx.acct, &mut fx.enums, key, &v, &[0]).unwrap();

        let found = fx.store.find(&mut fx.enums, key, 1).unwrap().unwrap();
        assert_eq!(found.get_int(0).unwrap(), 77);
        // The tail survived the splice.
        let full = fx.store.find(&mut fx.enums, key, 17).unwrap().unwrap();
        assert_eq!(full.get_int(15).unwrap(), 4);
    }

    #[test]
    fn test_update_on_disk_rewrites_frame_without_mem_growth() {
        let mut fx = fixture(0, 10);
        insert_all(&mut fx, 10);
        let key = stock_key(1, 2);
        let mem_before = fx.acct.in_mem_total();
        let disk_before = fx.acct.disk_total();

        let mut v = fx.store.find(&mut fx.enums, key, 17).unwrap().unwrap().clone();
        v.set_int(0, 55).unwrap();
        v.set_int(1, 999).unwrap();
        fx.store.update(&mut fx.acct, &mut fx.enums, key, &v, &[0, 1]).unwrap();

        let found = fx.store.find(&mut fx.enums, key, 17).unwrap().unwrap();
        assert_eq!(found.get_int(0).unwrap(), 55);
        assert_eq!(found.get_int(1).unwrap(), 999);
        assert_eq!(fx.acct.in_mem_total(), mem_before);
        assert_eq!(fx.acct.disk_total(), disk_before);
        assert_eq!(fx.store.tier_of(key), Some(Tier::OnDisk));
    }

    #[test]
    fn test_erase() {
        let mut fx = fixture(u64::MAX, 10);
        insert_all(&mut fx, 10);
        let key = stock_key(1, 6);
        fx.store.erase(&mut fx.acct, key).unwrap();
        assert!(fx.store.find(&mut fx.enums, key, 1).unwrap().is_none());
        assert_eq!(fx.store.len(), 9);
        assert!(fx.store.erase(&mut fx.acct, key).is_err());

        // Accounting still matches the remaining cells.
        let total: u64 = (1..=10)
            .filter(|&s| s != 6)
            .map(|s_id| match fx.store.index.get(&stock_key(1, s_id)).unwrap() {
                Cell::InMemory(b) => b.len() as u64,
                Cell::OnDisk(_) => 0,
            })
            .sum();
        assert_eq!(fx.acct.in_mem_total(), total);
    }

    #[test]
    fn test_spill_mid_stream_keeps_both_tiers_readable() {
        // A budget that admits only the first few cells.
        let mut fx = fixture(400 + PAGE_SLACK, 30);
        insert_all(&mut fx, 30);
        assert!(fx.store.in_mem_count() > 0, "some cells should fit");
        assert!(fx.store.on_disk_count() > 0, "some cells should spill");

        for s_id in 1..=30 {
            let found = fx.store.find(&mut fx.enums, stock_key(1, s_id), 17).unwrap().unwrap();
            assert_eq!(found.get_int(15).unwrap(), s_id as i64);
        }
    }

    #[test]
    fn test_for_each_row_visits_in_key_order() {
        let mut fx = fixture(400 + PAGE_SLACK, 25);
        insert_all(&mut fx, 25);
        let mut seen = Vec::new();
        fx.store
            .for_each_row(&mut fx.enums, |v, _| {
                seen.push(v.get_int(15).unwrap());
                Ok(())
            })
            .unwrap();
        let expected: Vec<i64> = (1..=25).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_for_each_row_range() {
        let mut fx = fixture(u64::MAX, 25);
        insert_all(&mut fx, 25);
        let mut seen = Vec::new();
        fx.store
            .for_each_row_range(&mut fx.enums, stock_key(1, 10), stock_key(1, 15), |v, _| {
                seen.push(v.get_int(15).unwrap());
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec![10, 11, 12, 13, 14]);
    }
}
