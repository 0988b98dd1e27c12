//! The nine TPC-C relations as owned row values, with their TPC-C
//! constants.
//!
//! Warehouse, District, Item, Order, NewOrder and History only ever live
//! uncompressed in memory. Stock, Customer and OrderLine additionally
//! travel through the compressed tier; their attribute-vector and native
//! frame layouts live in `relation.rs`.

use crate::types::DATETIME_LEN;

fn digits(v: i64) -> u64 {
    let mut n = if v < 0 { 1 } else { 0 };
    let mut v = v.unsigned_abs();
    loop {
        n += 1;
        v /= 10;
        if v == 0 {
            return n;
        }
    }
}

fn real_digits(v: f64) -> u64 {
    format!("{v}").len() as u64
}

#[derive(Debug, Clone, Default)]
pub struct Item {
    pub i_id: i32,
    pub i_im_id: i32,
    pub i_price: f64,
    pub i_name: String,
    pub i_data: String,
}

impl Item {
    pub const MIN_IM: i32 = 1;
    pub const MAX_IM: i32 = 10_000;
    pub const MIN_PRICE: f64 = 1.00;
    pub const MAX_PRICE: f64 = 100.00;
    pub const MIN_NAME: usize = 14;
    pub const MAX_NAME: usize = 24;
    pub const MIN_DATA: usize = 26;
    pub const MAX_DATA: usize = 50;

    pub fn approx_size(&self) -> u64 {
        digits(self.i_id as i64)
            + digits(self.i_im_id as i64)
            + real_digits(self.i_price)
            + (self.i_name.len() + self.i_data.len()) as u64
    }
}

#[derive(Debug, Clone, Default)]
pub struct Warehouse {
    pub w_id: i32,
    pub w_tax: f64,
    pub w_ytd: f64,
    pub w_name: String,
    pub w_street_1: String,
    pub w_street_2: String,
    pub w_city: String,
    pub w_state: String,
    pub w_zip: String,
}

impl Warehouse {
    pub const MIN_TAX: f64 = 0.0;
    pub const MAX_TAX: f64 = 0.2;
    pub const INITIAL_YTD: f64 = 300_000.00;
    pub const MIN_NAME: usize = 6;
    pub const MAX_NAME: usize = 10;

    pub fn approx_size(&self) -> u64 {
        digits(self.w_id as i64)
            + real_digits(self.w_tax)
            + real_digits(self.w_ytd)
            + (self.w_name.len()
                + self.w_street_1.len()
                + self.w_street_2.len()
                + self.w_city.len()
                + self.w_state.len()
                + self.w_zip.len()) as u64
    }
}

#[derive(Debug, Clone, Default)]
pub struct District {
    pub d_id: i32,
    pub d_w_id: i32,
    pub d_tax: f64,
    pub d_ytd: f64,
    pub d_next_o_id: i32,
    pub d_name: String,
    pub d_street_1: String,
    pub d_street_2: String,
    pub d_city: String,
    pub d_state: String,
    pub d_zip: String,
}

impl District {
    pub const INITIAL_YTD: f64 = 30_000.00;
    pub const INITIAL_NEXT_O_ID: i32 = 3001;
    pub const MIN_NAME: usize = 6;
    pub const MAX_NAME: usize = 10;

    pub fn approx_size(&self) -> u64 {
        digits(self.d_id as i64)
            + digits(self.d_w_id as i64)
            + real_digits(self.d_tax)
            + real_digits(self.d_ytd)
            + digits(self.d_next_o_id as i64)
            + (self.d_name.len()
                + self.d_street_1.len()
                + self.d_street_2.len()
                + self.d_city.len()
                + self.d_state.len()
                + self.d_zip.len()) as u64
    }
}

#[derive(Debug, Clone, Default)]
pub struct Stock {
    pub s_i_id: i32,
    pub s_w_id: i32,
    pub s_quantity: i32,
    pub s_ytd: i32,
    pub s_order_cnt: i32,
    pub s_remote_cnt: i32,
    pub s_dist: [String; 10],
    pub s_data: String,
}

impl Stock {
    pub const MIN_QUANTITY: i32 = 10;
    pub const MAX_QUANTITY: i32 = 100;
    pub const DIST: usize = 24;
    pub const MIN_DATA: usize = 26;
    pub const MAX_DATA: usize = 50;

    pub fn approx_size(&self) -> u64 {
        6 * 4 + self.s_dist.iter().map(|d| d.len() as u64).sum::<u64>() + self.s_data.len() as u64
    }
}

#[derive(Debug, Clone, Default)]
pub struct Customer {
    pub c_id: i32,
    pub c_d_id: i32,
    pub c_w_id: i32,
    pub c_credit_lim: f64,
    pub c_discount: f64,
    pub c_balance: f64,
    pub c_ytd_payment: f64,
    pub c_payment_cnt: i32,
    pub c_delivery_cnt: i32,
    pub c_first: String,
    pub c_middle: String,
    pub c_last: String,
    pub c_street_1: String,
    pub c_street_2: String,
    pub c_city: String,
    pub c_state: String,
    pub c_zip: String,
    pub c_phone: String,
    pub c_since: String,
    pub c_credit: String,
    pub c_data: String,
}

impl Customer {
    pub const INITIAL_CREDIT_LIM: f64 = 50_000.00;
    pub const MIN_DISCOUNT: f64 = 0.0;
    pub const MAX_DISCOUNT: f64 = 0.5;
    pub const INITIAL_BALANCE: f64 = -10.00;
    pub const INITIAL_YTD_PAYMENT: f64 = 10.00;
    pub const INITIAL_PAYMENT_CNT: i32 = 1;
    pub const INITIAL_DELIVERY_CNT: i32 = 0;
    pub const MIN_FIRST: usize = 6;
    pub const MAX_FIRST: usize = 10;
    pub const MAX_LAST: usize = 17;
    pub const PHONE: usize = 16;
    pub const MIN_DATA: usize = 300;
    pub const MAX_DATA: usize = 500;
    pub const GOOD_CREDIT: &'static str = "GC";
    pub const BAD_CREDIT: &'static str = "BC";

    pub fn approx_size(&self) -> u64 {
        4 * 4
            + 4 * 8
            + (self.c_first.len()
                + self.c_middle.len()
                + self.c_last.len()
                + self.c_street_1.len()
                + self.c_street_2.len()
                + self.c_city.len()
                + self.c_state.len()
                + self.c_zip.len()
                + self.c_phone.len()
                + self.c_since.len()
                + self.c_credit.len()
                + self.c_data.len()) as u64
    }
}

#[derive(Debug, Clone, Default)]
pub struct Order {
    pub o_id: i32,
    pub o_c_id: i32,
    pub o_d_id: i32,
    pub o_w_id: i32,
    pub o_carrier_id: i32,
    pub o_ol_cnt: i32,
    pub o_all_local: i32,
    pub o_entry_d: String,
}

impl Order {
    pub const MIN_CARRIER_ID: i32 = 1;
    pub const MAX_CARRIER_ID: i32 = 10;
    /// Carrier id of an order delivery has not picked up yet.
    pub const NULL_CARRIER_ID: i32 = 0;
    /// Orders at or above this o_id load with a null carrier, TPC-C 4.3.3.1.
    pub const NULL_CARRIER_LOWER_BOUND: i32 = 2101;
    pub const MIN_OL_CNT: i32 = 5;
    pub const MAX_OL_CNT: i32 = 15;
    pub const INITIAL_ALL_LOCAL: i32 = 1;
    pub const INITIAL_ORDERS_PER_DISTRICT: i32 = 3000;

    pub fn approx_size(&self) -> u64 {
        digits(self.o_id as i64)
            + digits(self.o_c_id as i64)
            + digits(self.o_d_id as i64)
            + digits(self.o_w_id as i64)
            + digits(self.o_carrier_id as i64)
            + digits(self.o_ol_cnt as i64)
            + digits(self.o_all_local as i64)
            + self.o_entry_d.len() as u64
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrderLine {
    pub ol_o_id: i32,
    pub ol_d_id: i32,
    pub ol_w_id: i32,
    pub ol_number: i32,
    pub ol_i_id: i32,
    pub ol_supply_w_id: i32,
    pub ol_quantity: i32,
    pub ol_amount: f64,
    pub ol_delivery_d: String,
    pub ol_dist_info: String,
}

impl OrderLine {
    pub const MIN_I_ID: i32 = 1;
    pub const INITIAL_QUANTITY: i32 = 5;
    pub const MIN_AMOUNT: f64 = 0.01;
    pub const MAX_AMOUNT: f64 = 9999.99;
    /// New orders pick a remote supply warehouse with probability 1%.
    pub const REMOTE_PROBABILITY_MILLIS: i32 = 10;

    pub fn approx_size(&self) -> u64 {
        let base = 8 * 4 + self.ol_dist_info.len() as u64 + 1;
        if self.ol_delivery_d.is_empty() {
            base
        } else {
            base + DATETIME_LEN as u64 + 1
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewOrder {
    pub no_w_id: i32,
    pub no_d_id: i32,
    pub no_o_id: i32,
}

impl NewOrder {
    pub const INITIAL_NUM_PER_DISTRICT: i32 = 900;

    pub fn approx_size(&self) -> u64 {
        digits(self.no_w_id as i64) + digits(self.no_d_id as i64) + digits(self.no_o_id as i64)
    }
}

#[derive(Debug, Clone, Default)]
pub struct History {
    pub h_c_id: i32,
    pub h_c_d_id: i32,
    pub h_c_w_id: i32,
    pub h_d_id: i32,
    pub h_w_id: i32,
    pub h_amount: f64,
    pub h_date: String,
    pub h_data: String,
}

impl History {
    pub const MIN_DATA: usize = 12;
    pub const MAX_DATA: usize = 24;
    pub const INITIAL_AMOUNT: f64 = 10.00;

    pub fn approx_size(&self) -> u64 {
        digits(self.h_c_id as i64)
            + digits(self.h_c_d_id as i64)
            + digits(self.h_c_w_id as i64)
            + digits(self.h_d_id as i64)
            + digits(self.h_w_id as i64)
            + real_digits(self.h_amount)
            + (self.h_date.len() + self.h_data.len()) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digits() {
        assert_eq!(digits(0), 1);
        assert_eq!(digits(7), 1);
        assert_eq!(digits(10), 2);
        assert_eq!(digits(-3), 2);
        assert_eq!(digits(99_999), 5);
    }

    #[test]
    fn test_orderline_size_counts_delivery_date() {
        let mut ol = OrderLine { ol_dist_info: "x".repeat(24), ..Default::default() };
        let undelivered = ol.approx_size();
        ol.ol_delivery_d = "2024-01-01 00:00:00".to_string();
        assert_eq!(ol.approx_size(), undelivered + DATETIME_LEN as u64 + 1);
    }
}
