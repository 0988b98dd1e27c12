//! TPC-C initial-population generator, clause 4.3.
//!
//! Scales below the standard 100k items / 3k customers are allowed so
//! tests can load small databases quickly; the shape of the data is the
//! same at any scale.

use baler_core::db::TpccTables;
use baler_core::error::Result;
use baler_core::rows::{Customer, District, History, Item, Order, OrderLine, Stock, Warehouse};
use baler_core::types::{DATETIME_LEN, DISTRICTS_PER_WAREHOUSE, NUM_ITEMS};
use tracing::info;

use crate::random::{TpccRandom, make_last_name};

pub struct TpccGenerator {
    random: TpccRandom,
    now: String,
    num_items: i32,
    districts_per_warehouse: i32,
    customers_per_district: i32,
    new_orders_per_district: i32,
}

/// Append the "original" marker after the last space, TPC-C 4.3.3.1.
fn set_original(s: &mut String) {
    let keep = s.rfind(' ').map(|p| p + 1).unwrap_or(0);
    s.truncate(keep);
    s.push_str("original");
}

fn make_tax(random: &mut TpccRandom) -> f64 {
    random.fixed_point(4, Warehouse::MIN_TAX, Warehouse::MAX_TAX)
}

impl TpccGenerator {
    pub fn new(
        random: TpccRandom,
        now: &str,
        num_items: i32,
        districts_per_warehouse: i32,
        customers_per_district: i32,
        new_orders_per_district: i32,
    ) -> Self {
        assert_eq!(now.len(), DATETIME_LEN);
        assert!((1..=NUM_ITEMS).contains(&num_items));
        assert!((1..=DISTRICTS_PER_WAREHOUSE).contains(&districts_per_warehouse));
        assert!((1..=CUSTOMERS_STANDARD).contains(&customers_per_district));
        assert!(new_orders_per_district <= customers_per_district);
        Self {
            random,
            now: now.to_owned(),
            num_items,
            districts_per_warehouse,
            customers_per_district,
            new_orders_per_district,
        }
    }

    /// The full standard scale: 100k items, 10 districts, 3k customers,
    /// 900 initial new-orders per district.
    pub fn standard(random: TpccRandom, now: &str) -> Self {
        Self::new(random, now, NUM_ITEMS, 10, CUSTOMERS_STANDARD, 900)
    }

    pub fn make_items_table(&mut self, tables: &mut TpccTables) {
        tables.reserve_items(self.num_items as usize);
        let original_rows = self.select_unique_ids(self.num_items / 10, 1, self.num_items);
        for i_id in 1..=self.num_items {
            let item = self.generate_item(i_id, original_rows.contains(&i_id));
            tables.insert_item(item);
        }
        info!(items = self.num_items, "items table loaded");
    }

    pub fn make_warehouse(&mut self, tables: &mut TpccTables, w_id: i32) -> Result<()> {
        self.make_stock(tables, w_id)?;
        self.make_warehouse_without_stock(tables, w_id)
    }

    fn generate_item(&mut self, i_id: i32, original: bool) -> Item {
        let mut item = Item {
            i_id,
            i_im_id: self.random.number(Item::MIN_IM, Item::MAX_IM),
            i_price: self.random.fixed_point(2, Item::MIN_PRICE, Item::MAX_PRICE),
            i_name: self.random.astring(Item::MIN_NAME, Item::MAX_NAME, 26),
            i_data: self.random.astring(Item::MIN_DATA, Item::MAX_DATA, 26),
        };
        if original {
            set_original(&mut item.i_data);
        }
        item
    }

    fn generate_warehouse(&mut self, w_id: i32) -> Warehouse {
        Warehouse {
            w_id,
            w_tax: make_tax(&mut self.random),
            w_ytd: Warehouse::INITIAL_YTD,
            w_name: self.random.astring(Warehouse::MIN_NAME, Warehouse::MAX_NAME, 26),
            w_street_1: self.random.street(),
            w_street_2: self.random.street(),
            w_city: self.random.city(),
            w_state: self.random.state(),
            w_zip: self.random.zip(),
        }
    }

    fn generate_district(&mut self, d_id: i32, w_id: i32) -> District {
        District {
            d_id,
            d_w_id: w_id,
            d_tax: make_tax(&mut self.random),
            d_ytd: District::INITIAL_YTD,
            // One order per customer is already loaded.
            d_next_o_id: self.customers_per_district + 1,
            d_name: self.random.astring(District::MIN_NAME, District::MAX_NAME, 26),
            d_street_1: self.random.street(),
            d_street_2: self.random.street(),
            d_city: self.random.city(),
            d_state: self.random.state(),
            d_zip: self.random.zip(),
        }
    }

    fn generate_stock(&mut self, s_id: i32, w_id: i32, original: bool) -> Stock {
        let mut stock = Stock {
            s_i_id: s_id,
            s_w_id: w_id,
            s_quantity: self.random.number(Stock::MIN_QUANTITY, Stock::MAX_QUANTITY),
            s_ytd: 0,
            s_order_cnt: 0,
            s_remote_cnt: 0,
            s_data: self.random.stock_data(Stock::MAX_DATA - 8),
            ..Default::default()
        };
        for d in 0..10 {
            stock.s_dist[d] = TpccRandom::dist_info(d as i32 + 1, w_id, s_id);
        }
        if original {
            set_original(&mut stock.s_data);
        }
        stock
    }

    fn generate_customer(&mut self, c_id: i32, d_id: i32, w_id: i32, bad_credit: bool) -> Customer {
        let c_last = if c_id <= 1000 {
            make_last_name(c_id - 1)
        } else {
            self.random.last_name(self.customers_per_district)
        };
        Customer {
            c_id,
            c_d_id: d_id,
            c_w_id: w_id,
            c_credit_lim: Customer::INITIAL_CREDIT_LIM,
            c_discount: self.random.fixed_point(4, Customer::MIN_DISCOUNT, Customer::MAX_DISCOUNT),
            c_balance: Customer::INITIAL_BALANCE,
            c_ytd_payment: Customer::INITIAL_YTD_PAYMENT,
            c_payment_cnt: Customer::INITIAL_PAYMENT_CNT,
            c_delivery_cnt: Customer::INITIAL_DELIVERY_CNT,
            c_first: self.random.first_name(),
            c_middle: "OE".to_owned(),
            c_last,
            c_street_1: self.random.street(),
            c_street_2: self.random.street(),
            c_city: self.random.city(),
            c_state: self.random.state(),
            c_zip: self.random.zip(),
            c_phone: self.random.nstring(Customer::PHONE, Customer::PHONE),
            c_since: self.now.clone(),
            c_credit: if bad_credit { Customer::BAD_CREDIT } else { Customer::GOOD_CREDIT }
                .to_owned(),
            c_data: self.random.astring(Customer::MIN_DATA, Customer::MAX_DATA, 26),
        }
    }

    fn generate_order(&mut self, o_id: i32, c_id: i32, d_id: i32, w_id: i32, new_order: bool) -> Order {
        Order {
            o_id,
            o_c_id: c_id,
            o_d_id: d_id,
            o_w_id: w_id,
            o_carrier_id: if new_order {
                Order::NULL_CARRIER_ID
            } else {
                self.random.number(Order::MIN_CARRIER_ID, Order::MAX_CARRIER_ID)
            },
            o_ol_cnt: self.random.number(Order::MIN_OL_CNT, Order::MAX_OL_CNT),
            o_all_local: Order::INITIAL_ALL_LOCAL,
            o_entry_d: self.now.clone(),
        }
    }

    fn generate_order_line(
        &mut self,
        number: i32,
        o_id: i32,
        d_id: i32,
        w_id: i32,
        new_order: bool,
    ) -> OrderLine {
        let i_id = self.random.number(OrderLine::MIN_I_ID, self.num_items);
        let mut line = OrderLine {
            ol_o_id: o_id,
            ol_d_id: d_id,
            ol_w_id: w_id,
            ol_number: number,
            ol_i_id: i_id,
            ol_supply_w_id: w_id,
            ol_quantity: self.random.number(1, Stock::MAX_QUANTITY),
            ol_dist_info: TpccRandom::dist_info(d_id, w_id, i_id),
            ..Default::default()
        };
        if new_order {
            line.ol_amount =
                self.random.fixed_point(2, OrderLine::MIN_AMOUNT, OrderLine::MAX_AMOUNT);
            // Undelivered: empty delivery date stands in for null.
            line.ol_delivery_d = String::new();
        } else {
            line.ol_amount = 0.00;
            line.ol_delivery_d = self.now.clone();
        }
        line
    }

    fn generate_history(&mut self, c_id: i32, d_id: i32, w_id: i32) -> History {
        History {
            h_c_id: c_id,
            h_c_d_id: d_id,
            h_c_w_id: w_id,
            h_d_id: d_id,
            h_w_id: w_id,
            h_amount: History::INITIAL_AMOUNT,
            h_date: self.now.clone(),
            h_data: self.random.astring(History::MIN_DATA, History::MAX_DATA, 26),
        }
    }

    /// One stock row per item; 10% are marked "original".
    fn make_stock(&mut self, tables: &mut TpccTables, w_id: i32) -> Result<()> {
        let original_rows = self.select_unique_ids(self.num_items / 10, 1, self.num_items);
        for s_id in 1..=self.num_items {
            let stock = self.generate_stock(s_id, w_id, original_rows.contains(&s_id));
            tables.insert_stock(stock)?;
        }
        Ok(())
    }

    fn make_warehouse_without_stock(&mut self, tables: &mut TpccTables, w_id: i32) -> Result<()> {
        tables.insert_warehouse(self.generate_warehouse(w_id))?;

        for d_id in 1..=self.districts_per_warehouse {
            tables.insert_district(self.generate_district(d_id, w_id))?;

            // 10% of the customers get bad credit.
            let bad_credit_rows =
                self.select_unique_ids(self.customers_per_district / 10, 1, self.customers_per_district);
            for c_id in 1..=self.customers_per_district {
                let customer =
                    self.generate_customer(c_id, d_id, w_id, bad_credit_rows.contains(&c_id));
                tables.insert_customer(customer)?;
                let history = self.generate_history(c_id, d_id, w_id);
                tables.insert_history(history);
            }

            // One initial order per customer, in a random customer order;
            // the last new_orders_per_district of them are undelivered.
            let permutation = self.random.permutation(1, self.customers_per_district);
            for o_id in 1..=self.customers_per_district {
                let new_order =
                    self.customers_per_district - self.new_orders_per_district < o_id;
                let order =
                    self.generate_order(o_id, permutation[o_id as usize - 1], d_id, w_id, new_order);
                let ol_cnt = order.o_ol_cnt;
                tables.insert_order(order)?;

                for number in 1..=ol_cnt {
                    let line = self.generate_order_line(number, o_id, d_id, w_id, new_order);
                    tables.insert_orderline(line)?;
                }

                if new_order {
                    tables.insert_neworder(w_id, d_id, o_id)?;
                }
            }
        }
        Ok(())
    }

    /// `count` distinct ids drawn uniformly from `[lower, upper]`.
    fn select_unique_ids(&mut self, count: i32, lower: i32, upper: i32) -> std::collections::HashSet<i32> {
        let mut rows = std::collections::HashSet::new();
        while (rows.len() as i32) < count {
            rows.insert(self.random.number(lower, upper));
        }
        rows
    }
}

/// Standard customers per district, TPC-C 4.3.3.1.
pub const CUSTOMERS_STANDARD: i32 = 3000;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::random::Corpus;
    use baler_core::types::TablesConfig;
    use tempfile::TempDir;

    fn tiny_tables() -> (TempDir, TpccTables, TpccGenerator) {
        let dir = TempDir::new().unwrap();
        let tables = TpccTables::new(TablesConfig::new(u64::MAX, dir.path())).unwrap();
        let random = TpccRandom::new(0, Corpus::builtin());
        let generator = TpccGenerator::new(random, &Clock::now_string(), 100, 3, 30, 9);
        (dir, tables, generator)
    }

    #[test]
    fn test_set_original() {
        let mut s = "alpha beta gamma".to_string();
        set_original(&mut s);
        assert_eq!(s, "alpha beta original");
        assert!(s.ends_with("original"));

        let mut no_space = "alphabet".to_string();
        set_original(&mut no_space);
        assert_eq!(no_space, "original");
    }

    #[test]
    fn test_tiny_load_has_expected_shape() {
        let (_dir, mut tables, mut generator) = tiny_tables();
        generator.make_items_table(&mut tables);
        generator.make_warehouse(&mut tables, 1).unwrap();

        assert!(tables.find_item(1).is_some());
        assert!(tables.find_item(100).is_some());
        assert!(tables.find_item(101).is_none());
        assert!(tables.find_warehouse(1).is_some());
        let d = tables.find_district(1, 3).unwrap();
        assert_eq!(d.d_next_o_id, 31);

        // Per district: 30 orders, the last 9 of them new.
        assert!(tables.find_order(1, 1, 30).is_some());
        assert!(tables.find_neworder(1, 1, 30).is_some());
        assert!(tables.find_neworder(1, 1, 21).is_none());
        assert!(tables.find_neworder(1, 1, 22).is_some());

        // 30 customers x 3 districts worth of history.
        assert_eq!(tables.history().len(), 90);
    }

    #[test]
    fn test_bad_credit_ratio() {
        let (_dir, mut tables, mut generator) = tiny_tables();
        generator.make_items_table(&mut tables);
        generator.make_warehouse(&mut tables, 1).unwrap();
        tables.mount_compressed(1).unwrap();

        let mut bad = 0;
        for c_id in 1..=30 {
            let c = tables.customer_row(1, 1, c_id).unwrap().unwrap();
            if c.c_credit == Customer::BAD_CREDIT {
                bad += 1;
            }
            assert_eq!(c.c_balance, Customer::INITIAL_BALANCE);
            assert_eq!(c.c_middle, "OE");
        }
        assert_eq!(bad, 3);
    }

    #[test]
    fn test_last_names_follow_syllable_rule() {
        let (_dir, mut tables, mut generator) = tiny_tables();
        generator.make_items_table(&mut tables);
        generator.make_warehouse(&mut tables, 1).unwrap();
        tables.mount_compressed(1).unwrap();

        let c = tables.customer_row(1, 1, 1).unwrap().unwrap();
        assert_eq!(c.c_last, "BARBARBAR");
        let c = tables.customer_row(1, 1, 11).unwrap().unwrap();
        assert_eq!(c.c_last, "BAROUGHTBAR");
    }
}
