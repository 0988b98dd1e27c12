//! The nine-relation table set and the TPC-C transaction façade.
//!
//! Loading is two-phase. The generator bulk-inserts plain rows; Stock,
//! Customer and OrderLine land in ordinary B+-trees first. Once the load
//! finishes, `mount_compressed` fits one model per growing relation over
//! a strided sample, then drains the plain rows into tiered stores and
//! drops them. From that point every read and write of the three growing
//! relations goes through compressed cells or disk frames.

mod outputs;
mod transactions;
mod undo;

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use tracing::info;

pub use outputs::{
    DeliveryOrderInfo, ItemInfo, NewOrderItem, NewOrderOutput, OrderLineSubset, OrderStatusOutput,
    PaymentOutput,
};
pub use undo::UndoJournal;

use crate::accountant::{Accountant, RelationId};
use crate::btree::BPlusTree;
use crate::enums::EnumCatalog;
use crate::error::{Result, StorageError, TxnError};
use crate::model::Model;
use crate::relation::{CustomerRel, OrderLineRel, Relation, StockRel};
use crate::rows::{Customer, District, History, Item, NewOrder, Order, OrderLine, Stock, Warehouse};
use crate::schema::AttrVector;
use crate::store::{Tier, TieredStore};
use crate::types::{
    CUSTOMERS_PER_DISTRICT, DISTRICTS_PER_WAREHOUSE, MAX_OL_CNT, STOCK_PER_WAREHOUSE,
    TablesConfig, customer_key, district_key, neworder_key, order_by_customer_key, order_key,
    orderline_key, stock_key,
};

const NOT_MOUNTED: &str = "compressed stores not mounted; call mount_compressed after loading";

/// Secondary-index entry for customer-by-name lookups. Carries key copies
/// only; the row itself is resolved through the primary index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct NameKey {
    w_id: i32,
    d_id: i32,
    last: String,
    first: String,
    c_id: i32,
}

/// All TPC-C state for one node.
pub struct TpccTables {
    config: TablesConfig,
    acct: Accountant,
    enums: EnumCatalog,

    items: Vec<Item>,
    warehouses: BPlusTree<u32, Warehouse>,
    districts: BPlusTree<u32, District>,
    orders: BPlusTree<u64, Order>,
    /// `(w, d, c, o)` secondary key to primary order key.
    orders_by_customer: BPlusTree<u64, u64>,
    neworders: BTreeMap<u64, NewOrder>,
    history: Vec<History>,
    customers_by_name: BTreeSet<NameKey>,

    // Plain rows during bulk load; empty after mounting.
    stock_plain: BPlusTree<u32, Stock>,
    customers_plain: BPlusTree<u32, Customer>,
    orderlines_plain: BPlusTree<u64, OrderLine>,

    stock: Option<TieredStore<StockRel>>,
    customers: Option<TieredStore<CustomerRel>>,
    orderlines: Option<TieredStore<OrderLineRel>>,

    // Per-relation staging vectors, reused across transactions.
    stock_buffer: AttrVector,
    customer_buffer: AttrVector,
    ol_buffer: AttrVector,
}

impl TpccTables {
    pub fn new(config: TablesConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.scratch_dir).map_err(StorageError::Io)?;
        std::fs::create_dir_all(&config.model_dir).map_err(StorageError::Io)?;
        let acct = Accountant::new(config.memory_budget);
        Ok(Self {
            config,
            acct,
            enums: EnumCatalog::new(),
            items: Vec::new(),
            warehouses: BPlusTree::new(),
            districts: BPlusTree::new(),
            orders: BPlusTree::new(),
            orders_by_customer: BPlusTree::new(),
            neworders: BTreeMap::new(),
            history: Vec::new(),
            customers_by_name: BTreeSet::new(),
            stock_plain: BPlusTree::new(),
            customers_plain: BPlusTree::new(),
            orderlines_plain: BPlusTree::new(),
            stock: None,
            customers: None,
            orderlines: None,
            stock_buffer: StockRel::schema().new_vector(),
            customer_buffer: CustomerRel::schema().new_vector(),
            ol_buffer: OrderLineRel::schema().new_vector(),
        })
    }

    // ---- bulk-load inserts ----

    pub fn reserve_items(&mut self, n: usize) {
        self.items.reserve(n);
    }

    /// Items arrive densely, id 1 first.
    pub fn insert_item(&mut self, item: Item) {
        debug_assert_eq!(item.i_id as usize, self.items.len() + 1);
        self.acct.add_mem(RelationId::Item, item.approx_size());
        self.items.push(item);
    }

    pub fn find_item(&self, i_id: i32) -> Option<&Item> {
        if i_id < 1 {
            return None;
        }
        self.items.get(i_id as usize - 1)
    }

    pub fn insert_warehouse(&mut self, w: Warehouse) -> Result<()> {
        self.acct.add_mem(RelationId::Warehouse, w.approx_size());
        let key = w.w_id as u32;
        self.warehouses
            .insert(key, w)
            .map_err(|_| TxnError::DuplicateKey { relation: "warehouse", key: key as u64 }.into())
    }

    pub fn find_warehouse(&self, w_id: i32) -> Option<&Warehouse> {
        self.warehouses.get(&(w_id as u32))
    }

    pub fn insert_district(&mut self, d: District) -> Result<()> {
        self.acct.add_mem(RelationId::District, d.approx_size());
        let key = district_key(d.d_w_id, d.d_id);
        self.districts
            .insert(key, d)
            .map_err(|_| TxnError::DuplicateKey { relation: "district", key: key as u64 }.into())
    }

    pub fn find_district(&self, w_id: i32, d_id: i32) -> Option<&District> {
        self.districts.get(&district_key(w_id, d_id))
    }

    /// Load-phase only; compressed inserts happen via `mount_compressed`.
    pub fn insert_stock(&mut self, s: Stock) -> Result<()> {
        let key = stock_key(s.s_w_id, s.s_i_id);
        self.stock_plain
            .insert(key, s)
            .map_err(|_| TxnError::DuplicateKey { relation: "stock", key: key as u64 }.into())
    }

    /// Load-phase only.
    pub fn insert_customer(&mut self, c: Customer) -> Result<()> {
        let key = customer_key(c.c_w_id, c.c_d_id, c.c_id);
        self.customers_by_name.insert(NameKey {
            w_id: c.c_w_id,
            d_id: c.c_d_id,
            last: c.c_last.clone(),
            first: c.c_first.clone(),
            c_id: c.c_id,
        });
        self.customers_plain
            .insert(key, c)
            .map_err(|_| TxnError::DuplicateKey { relation: "customer", key: key as u64 }.into())
    }

    /// Load-phase only.
    pub fn insert_orderline(&mut self, ol: OrderLine) -> Result<()> {
        let key = orderline_key(ol.ol_w_id, ol.ol_d_id, ol.ol_o_id, ol.ol_number);
        self.orderlines_plain
            .insert(key, ol)
            .map_err(|_| TxnError::DuplicateKey { relation: "orderline", key }.into())
    }

    pub fn insert_order(&mut self, o: Order) -> Result<()> {
        self.insert_order_internal(o, None)
    }

    pub(crate) fn insert_order_internal(
        &mut self,
        o: Order,
        journal: Option<&mut UndoJournal>,
    ) -> Result<()> {
        let key = order_key(o.o_w_id, o.o_d_id, o.o_id);
        let secondary = order_by_customer_key(o.o_w_id, o.o_d_id, o.o_c_id, o.o_id);
        self.acct.add_mem(RelationId::Order, o.approx_size());
        self.orders
            .insert(key, o)
            .map_err(|_| TxnError::DuplicateKey { relation: "order", key })?;
        self.orders_by_customer
            .insert(secondary, key)
            .map_err(|_| TxnError::DuplicateKey { relation: "order", key: secondary })?;
        if let Some(journal) = journal {
            journal.inserted_orders.push(key);
            journal.inserted_order_secondaries.push(secondary);
        }
        Ok(())
    }

    pub fn find_order(&self, w_id: i32, d_id: i32, o_id: i32) -> Option<&Order> {
        self.orders.get(&order_key(w_id, d_id, o_id))
    }

    pub fn insert_neworder(&mut self, w_id: i32, d_id: i32, o_id: i32) -> Result<()> {
        self.insert_neworder_internal(w_id, d_id, o_id, None)
    }

    pub(crate) fn insert_neworder_internal(
        &mut self,
        w_id: i32,
        d_id: i32,
        o_id: i32,
        journal: Option<&mut UndoJournal>,
    ) -> Result<()> {
        let key = neworder_key(w_id, d_id, o_id);
        let no = NewOrder { no_w_id: w_id, no_d_id: d_id, no_o_id: o_id };
        self.acct.add_mem(RelationId::NewOrder, no.approx_size());
        if self.neworders.insert(key, no).is_some() {
            return Err(TxnError::DuplicateKey { relation: "neworder", key }.into());
        }
        if let Some(journal) = journal {
            journal.inserted_neworders.push(key);
        }
        Ok(())
    }

    pub fn find_neworder(&self, w_id: i32, d_id: i32, o_id: i32) -> Option<&NewOrder> {
        self.neworders.get(&neworder_key(w_id, d_id, o_id))
    }

    pub fn insert_history(&mut self, h: History) {
        self.insert_history_internal(h, None);
    }

    pub(crate) fn insert_history_internal(&mut self, h: History, journal: Option<&mut UndoJournal>) {
        self.acct.add_mem(RelationId::History, h.approx_size());
        self.history.push(h);
        if let Some(journal) = journal {
            journal.inserted_history += 1;
        }
    }

    pub fn history(&self) -> &[History] {
        &self.history
    }

    /// All customers matching `(w_id, d_id, c_last)`, picking the
    /// n/2-rounded-up one by first name, TPC-C 2.6.2.
    pub fn find_customer_by_name(&self, w_id: i32, d_id: i32, c_last: &str) -> Result<i32> {
        let start = NameKey {
            w_id,
            d_id,
            last: c_last.to_owned(),
            first: String::new(),
            c_id: 0,
        };
        let matches: Vec<&NameKey> = self
            .customers_by_name
            .range(start..)
            .take_while(|k| k.w_id == w_id && k.d_id == d_id && k.last == c_last)
            .collect();
        if matches.is_empty() {
            return Err(TxnError::UnknownCustomer {
                w_id,
                d_id,
                last: c_last.to_owned(),
            }
            .into());
        }
        Ok(matches[(matches.len() - 1) / 2].c_id)
    }

    // ---- model fitting and conversion ----

    /// Fit the three models over strided samples of the loaded data, then
    /// move every Stock, Customer and OrderLine row into its tiered
    /// store. Model files land in the configured model directory.
    pub fn mount_compressed(&mut self, num_warehouses: i32) -> Result<()> {
        let jump = (num_warehouses / 5).max(1) as usize;
        let uid = self.config.fitter_seed;

        // OrderLine.
        let started = Instant::now();
        let mut sample = Vec::new();
        let mut buf = OrderLineRel::schema().new_vector();
        for w in 1..=num_warehouses {
            for d in 1..=DISTRICTS_PER_WAREHOUSE {
                for o in (w..=Order::INITIAL_ORDERS_PER_DISTRICT).step_by(jump) {
                    for number in 1..=MAX_OL_CNT {
                        let Some(ol) = self.orderlines_plain.get(&orderline_key(w, d, o, number))
                        else {
                            break;
                        };
                        OrderLineRel::to_attrs(ol, &mut buf, &mut self.enums)?;
                        sample.push(buf.clone());
                    }
                }
            }
        }
        let model = Model::fit(&OrderLineRel::schema(), &sample, self.config.fitter_seed)?;
        model.save(&self.config.model_dir.join(format!("{uid}_orderline_model.json")))?;
        let mut store = TieredStore::<OrderLineRel>::new(
            model,
            RelationId::OrderLine,
            self.config.scratch_dir.join("orderline_overflow.bin"),
        );
        for (_, ol) in self.orderlines_plain.iter() {
            OrderLineRel::to_attrs(ol, &mut buf, &mut self.enums)?;
            store.insert(&mut self.acct, &self.enums, &buf, buf.arity())?;
        }
        info!(
            rows = store.len(),
            sampled = sample.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "orderline relation mounted"
        );
        self.orderlines = Some(store);
        self.orderlines_plain = BPlusTree::new();

        // Stock.
        let started = Instant::now();
        let mut sample = Vec::new();
        let mut buf = StockRel::schema().new_vector();
        for w in 1..=num_warehouses {
            for s_id in (w..=STOCK_PER_WAREHOUSE).step_by(jump) {
                if let Some(s) = self.stock_plain.get(&stock_key(w, s_id)) {
                    StockRel::to_attrs(s, &mut buf, &mut self.enums)?;
                    sample.push(buf.clone());
                }
            }
        }
        let model = Model::fit(&StockRel::schema(), &sample, self.config.fitter_seed)?;
        model.save(&self.config.model_dir.join(format!("{uid}_stock_model.json")))?;
        let mut store = TieredStore::<StockRel>::new(
            model,
            RelationId::Stock,
            self.config.scratch_dir.join("stock_overflow.bin"),
        );
        for (_, s) in self.stock_plain.iter() {
            StockRel::to_attrs(s, &mut buf, &mut self.enums)?;
            store.insert(&mut self.acct, &self.enums, &buf, buf.arity())?;
        }
        info!(
            rows = store.len(),
            sampled = sample.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "stock relation mounted"
        );
        self.stock = Some(store);
        self.stock_plain = BPlusTree::new();

        // Customer.
        let started = Instant::now();
        let mut sample = Vec::new();
        let mut buf = CustomerRel::schema().new_vector();
        for w in 1..=num_warehouses {
            for d in 1..=DISTRICTS_PER_WAREHOUSE {
                for c_id in (w..=CUSTOMERS_PER_DISTRICT).step_by(jump) {
                    if let Some(c) = self.customers_plain.get(&customer_key(w, d, c_id)) {
                        CustomerRel::to_attrs(c, &mut buf, &mut self.enums)?;
                        sample.push(buf.clone());
                    }
                }
            }
        }
        let model = Model::fit(&CustomerRel::schema(), &sample, self.config.fitter_seed)?;
        model.save(&self.config.model_dir.join(format!("{uid}_customer_model.json")))?;
        let mut store = TieredStore::<CustomerRel>::new(
            model,
            RelationId::Customer,
            self.config.scratch_dir.join("customer_overflow.bin"),
        );
        for (_, c) in self.customers_plain.iter() {
            CustomerRel::to_attrs(c, &mut buf, &mut self.enums)?;
            store.insert(&mut self.acct, &self.enums, &buf, buf.arity())?;
        }
        info!(
            rows = store.len(),
            sampled = sample.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "customer relation mounted"
        );
        self.customers = Some(store);
        self.customers_plain = BPlusTree::new();

        self.refresh_model_footprint();
        Ok(())
    }

    /// Models never change after fitting, but the enum catalogue can grow
    /// with fresh strings, so the footprint is recomputed when it does.
    pub(crate) fn refresh_model_footprint(&mut self) {
        let models = self.stock.as_ref().map_or(0, |s| s.model().byte_size())
            + self.customers.as_ref().map_or(0, |s| s.model().byte_size())
            + self.orderlines.as_ref().map_or(0, |s| s.model().byte_size());
        self.acct.set_model_footprint(models + self.enums.byte_size());
    }

    // ---- compressed-row accessors ----

    /// Fully decode one stock row. Mostly for tests and the CSV dumper;
    /// transactions use prefix reads internally.
    pub fn stock_row(&mut self, w_id: i32, s_id: i32) -> Result<Option<Stock>> {
        let store = self.stock.as_mut().expect(NOT_MOUNTED);
        match store.find(&mut self.enums, stock_key(w_id, s_id), StockRel::schema().arity())? {
            Some(v) => Ok(Some(StockRel::to_row(v, &self.enums)?)),
            None => Ok(None),
        }
    }

    pub fn customer_row(&mut self, w_id: i32, d_id: i32, c_id: i32) -> Result<Option<Customer>> {
        let store = self.customers.as_mut().expect(NOT_MOUNTED);
        let arity = CustomerRel::schema().arity();
        match store.find(&mut self.enums, customer_key(w_id, d_id, c_id), arity)? {
            Some(v) => Ok(Some(CustomerRel::to_row(v, &self.enums)?)),
            None => Ok(None),
        }
    }

    pub fn orderline_row(
        &mut self,
        w_id: i32,
        d_id: i32,
        o_id: i32,
        number: i32,
    ) -> Result<Option<OrderLine>> {
        let store = self.orderlines.as_mut().expect(NOT_MOUNTED);
        let arity = OrderLineRel::schema().arity();
        match store.find(&mut self.enums, orderline_key(w_id, d_id, o_id, number), arity)? {
            Some(v) => Ok(Some(OrderLineRel::to_row(v, &self.enums)?)),
            None => Ok(None),
        }
    }

    pub fn stock_tier(&self, w_id: i32, s_id: i32) -> Option<Tier> {
        self.stock.as_ref().expect(NOT_MOUNTED).tier_of(stock_key(w_id, s_id))
    }

    // ---- full scans (CSV dumper) ----

    pub fn for_each_stock(&mut self, mut f: impl FnMut(&Stock) -> Result<()>) -> Result<()> {
        let store = self.stock.as_mut().expect(NOT_MOUNTED);
        store.for_each_row(&mut self.enums, |v, enums| f(&StockRel::to_row(v, enums)?))
    }

    pub fn for_each_customer(&mut self, mut f: impl FnMut(&Customer) -> Result<()>) -> Result<()> {
        let store = self.customers.as_mut().expect(NOT_MOUNTED);
        store.for_each_row(&mut self.enums, |v, enums| f(&CustomerRel::to_row(v, enums)?))
    }

    pub fn for_each_orderline(&mut self, mut f: impl FnMut(&OrderLine) -> Result<()>) -> Result<()> {
        let store = self.orderlines.as_mut().expect(NOT_MOUNTED);
        store.for_each_row(&mut self.enums, |v, enums| f(&OrderLineRel::to_row(v, enums)?))
    }

    // ---- stats ----

    pub fn accountant(&self) -> &Accountant {
        &self.acct
    }

    /// Combined byte size of every index structure, for the stats line.
    pub fn tree_size(&self) -> u64 {
        let tiered = self.stock.as_ref().map_or(0, TieredStore::index_size_bytes)
            + self.customers.as_ref().map_or(0, TieredStore::index_size_bytes)
            + self.orderlines.as_ref().map_or(0, TieredStore::index_size_bytes);
        tiered
            + self.warehouses.size_bytes()
            + self.districts.size_bytes()
            + self.orders.size_bytes()
            + self.orders_by_customer.size_bytes()
    }

    /// `(in_memory, on_disk)` tuple counts per compressible relation.
    pub fn tier_counts(&self, rel: RelationId) -> (u64, u64) {
        match rel {
            RelationId::Stock => {
                let s = self.stock.as_ref().expect(NOT_MOUNTED);
                (s.in_mem_count(), s.on_disk_count())
            }
            RelationId::Customer => {
                let s = self.customers.as_ref().expect(NOT_MOUNTED);
                (s.in_mem_count(), s.on_disk_count())
            }
            RelationId::OrderLine => {
                let s = self.orderlines.as_ref().expect(NOT_MOUNTED);
                (s.in_mem_count(), s.on_disk_count())
            }
            _ => (0, 0),
        }
    }
}
