//! The seam between the tiered store and the three compressible
//! relations: per-relation schema, key derivation, attribute-vector
//! conversions, and the fixed native layout disk frames hold.
//!
//! Slot order in each schema is descending access frequency, so readers
//! that pass a short prefix length decode as little as possible.

use crate::enums::EnumCatalog;
use crate::error::Result;
use crate::rows::{Customer, OrderLine, Stock};
use crate::schema::{AttrVector, Schema, SlotDesc};
use crate::types::{customer_key, orderline_key, stock_key};

/// A relation that lives in a tiered store.
pub trait Relation {
    const TAG: &'static str;
    /// Bytes of one row in its native fixed layout (the disk-frame payload).
    const NATIVE_SIZE: usize;

    type Key: Copy + Ord + Into<u64> + std::fmt::Debug;
    type Row: Clone;

    fn schema() -> Schema;

    /// Derive the primary key from a full attribute vector.
    fn key_of(v: &AttrVector) -> Result<Self::Key>;

    fn to_attrs(row: &Self::Row, v: &mut AttrVector, enums: &mut EnumCatalog) -> Result<()>;

    fn to_row(v: &AttrVector, enums: &EnumCatalog) -> Result<Self::Row>;

    fn write_native(row: &Self::Row, buf: &mut [u8]);

    fn read_native(buf: &[u8]) -> Self::Row;
}

/// Money columns ride in enumerated slots as exact integer cents, which
/// keeps the payment arithmetic exact where a lossy real would drift.
pub fn to_cents(v: f64) -> i64 {
    (v * 100.0).round() as i64
}

pub fn from_cents(c: i64) -> f64 {
    c as f64 / 100.0
}

// ---- fixed-offset native layout helpers ----

struct NativeWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> NativeWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn put_i32(&mut self, v: i32) {
        self.buf[self.pos..self.pos + 4].copy_from_slice(&v.to_le_bytes());
        self.pos += 4;
    }

    fn put_f64(&mut self, v: f64) {
        self.buf[self.pos..self.pos + 8].copy_from_slice(&v.to_le_bytes());
        self.pos += 8;
    }

    /// NUL-padded fixed-width string field, truncated if oversized.
    fn put_str(&mut self, s: &str, width: usize) {
        let bytes = s.as_bytes();
        let n = bytes.len().min(width - 1);
        self.buf[self.pos..self.pos + n].copy_from_slice(&bytes[..n]);
        self.buf[self.pos + n..self.pos + width].fill(0);
        self.pos += width;
    }
}

struct NativeReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> NativeReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn get_i32(&mut self) -> i32 {
        let v = i32::from_le_bytes(self.buf[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        v
    }

    fn get_f64(&mut self) -> f64 {
        let v = f64::from_le_bytes(self.buf[self.pos..self.pos + 8].try_into().unwrap());
        self.pos += 8;
        v
    }

    fn get_str(&mut self, width: usize) -> String {
        let field = &self.buf[self.pos..self.pos + width];
        self.pos += width;
        let end = field.iter().position(|&b| b == 0).unwrap_or(width);
        String::from_utf8_lossy(&field[..end]).into_owned()
    }
}

// ---- OrderLine ----

pub struct OrderLineRel;

impl Relation for OrderLineRel {
    const TAG: &'static str = "orderline";
    // 7 i32, one f64 amount, delivery date, dist info.
    const NATIVE_SIZE: usize = 7 * 4 + 8 + 20 + 25;

    type Key = u64;
    type Row = OrderLine;

    fn schema() -> Schema {
        Schema::new(vec![
            SlotDesc::enumerated(100_000), // i_id
            SlotDesc::real(0.0025),        // amount
            SlotDesc::enumerated(15),      // number
            SlotDesc::enumerated(5),       // supply_w_id
            SlotDesc::enumerated(100),     // quantity
            SlotDesc::string(),            // delivery_d
            SlotDesc::string(),            // dist_info
            SlotDesc::int(0.5),            // o_id
            SlotDesc::enumerated(10),      // d_id
            SlotDesc::enumerated(5),       // w_id
        ])
    }

    fn key_of(v: &AttrVector) -> Result<u64> {
        Ok(orderline_key(
            v.get_int(9)? as i32,
            v.get_int(8)? as i32,
            v.get_int(7)? as i32,
            v.get_int(2)? as i32,
        ))
    }

    fn to_attrs(row: &OrderLine, v: &mut AttrVector, _enums: &mut EnumCatalog) -> Result<()> {
        v.set_int(0, row.ol_i_id as i64)?;
        v.set_real(1, row.ol_amount)?;
        v.set_int(2, row.ol_number as i64)?;
        v.set_int(3, row.ol_supply_w_id as i64)?;
        v.set_int(4, row.ol_quantity as i64)?;
        v.set_str(5, row.ol_delivery_d.as_str())?;
        v.set_str(6, row.ol_dist_info.as_str())?;
        v.set_int(7, row.ol_o_id as i64)?;
        v.set_int(8, row.ol_d_id as i64)?;
        v.set_int(9, row.ol_w_id as i64)?;
        Ok(())
    }

    fn to_row(v: &AttrVector, _enums: &EnumCatalog) -> Result<OrderLine> {
        Ok(OrderLine {
            ol_i_id: v.get_int(0)? as i32,
            ol_amount: v.get_real(1)?,
            ol_number: v.get_int(2)? as i32,
            ol_supply_w_id: v.get_int(3)? as i32,
            ol_quantity: v.get_int(4)? as i32,
            ol_delivery_d: v.get_str(5)?.to_owned(),
            ol_dist_info: v.get_str(6)?.to_owned(),
            ol_o_id: v.get_int(7)? as i32,
            ol_d_id: v.get_int(8)? as i32,
            ol_w_id: v.get_int(9)? as i32,
        })
    }

    fn write_native(row: &OrderLine, buf: &mut [u8]) {
        let mut w = NativeWriter::new(buf);
        w.put_i32(row.ol_o_id);
        w.put_i32(row.ol_d_id);
        w.put_i32(row.ol_w_id);
        w.put_i32(row.ol_number);
        w.put_i32(row.ol_i_id);
        w.put_i32(row.ol_supply_w_id);
        w.put_i32(row.ol_quantity);
        w.put_f64(row.ol_amount);
        w.put_str(&row.ol_delivery_d, 20);
        w.put_str(&row.ol_dist_info, 25);
    }

    fn read_native(buf: &[u8]) -> OrderLine {
        let mut r = NativeReader::new(buf);
        OrderLine {
            ol_o_id: r.get_i32(),
            ol_d_id: r.get_i32(),
            ol_w_id: r.get_i32(),
            ol_number: r.get_i32(),
            ol_i_id: r.get_i32(),
            ol_supply_w_id: r.get_i32(),
            ol_quantity: r.get_i32(),
            ol_amount: r.get_f64(),
            ol_delivery_d: r.get_str(20),
            ol_dist_info: r.get_str(25),
        }
    }
}

// ---- Stock ----

pub struct StockRel;

impl StockRel {
    const DATA_SLOT: usize = 4;
    const DATA_CAP: usize = 2000;
}

impl Relation for StockRel {
    const TAG: &'static str = "stock";
    // 6 i32, ten district info strings, the data string.
    const NATIVE_SIZE: usize = 6 * 4 + 10 * 25 + 51;

    type Key = u32;
    type Row = Stock;

    fn schema() -> Schema {
        let mut slots = vec![
            SlotDesc::int(0.5),            // quantity
            SlotDesc::enumerated(5),       // ytd
            SlotDesc::enumerated(100),     // order_cnt
            SlotDesc::int(0.5),            // remote_cnt
            SlotDesc::enumerated(Self::DATA_CAP), // data
        ];
        slots.extend(std::iter::repeat(SlotDesc::string()).take(10)); // dist 1..10
        slots.push(SlotDesc::enumerated(100_000)); // i_id
        slots.push(SlotDesc::enumerated(5)); // w_id
        Schema::new(slots)
    }

    fn key_of(v: &AttrVector) -> Result<u32> {
        Ok(stock_key(v.get_int(16)? as i32, v.get_int(15)? as i32))
    }

    fn to_attrs(row: &Stock, v: &mut AttrVector, enums: &mut EnumCatalog) -> Result<()> {
        v.set_int(0, row.s_quantity as i64)?;
        v.set_int(1, row.s_ytd as i64)?;
        v.set_int(2, row.s_order_cnt as i64)?;
        v.set_int(3, row.s_remote_cnt as i64)?;
        let data_id = enums.intern(Self::TAG, Self::DATA_SLOT, Self::DATA_CAP, &row.s_data)?;
        v.set_int(4, data_id)?;
        for (i, dist) in row.s_dist.iter().enumerate() {
            v.set_str(5 + i, dist.as_str())?;
        }
        v.set_int(15, row.s_i_id as i64)?;
        v.set_int(16, row.s_w_id as i64)?;
        Ok(())
    }

    fn to_row(v: &AttrVector, enums: &EnumCatalog) -> Result<Stock> {
        let mut row = Stock {
            s_quantity: v.get_int(0)? as i32,
            s_ytd: v.get_int(1)? as i32,
            s_order_cnt: v.get_int(2)? as i32,
            s_remote_cnt: v.get_int(3)? as i32,
            s_data: enums.reveal(Self::TAG, Self::DATA_SLOT, v.get_int(4)?)?.to_owned(),
            s_i_id: v.get_int(15)? as i32,
            s_w_id: v.get_int(16)? as i32,
            s_dist: Default::default(),
        };
        for i in 0..10 {
            row.s_dist[i] = v.get_str(5 + i)?.to_owned();
        }
        Ok(row)
    }

    fn write_native(row: &Stock, buf: &mut [u8]) {
        let mut w = NativeWriter::new(buf);
        w.put_i32(row.s_i_id);
        w.put_i32(row.s_w_id);
        w.put_i32(row.s_quantity);
        w.put_i32(row.s_ytd);
        w.put_i32(row.s_order_cnt);
        w.put_i32(row.s_remote_cnt);
        for dist in &row.s_dist {
            w.put_str(dist, 25);
        }
        w.put_str(&row.s_data, 51);
    }

    fn read_native(buf: &[u8]) -> Stock {
        let mut r = NativeReader::new(buf);
        let mut row = Stock {
            s_i_id: r.get_i32(),
            s_w_id: r.get_i32(),
            s_quantity: r.get_i32(),
            s_ytd: r.get_i32(),
            s_order_cnt: r.get_i32(),
            s_remote_cnt: r.get_i32(),
            ..Default::default()
        };
        for i in 0..10 {
            row.s_dist[i] = r.get_str(25);
        }
        row.s_data = r.get_str(51);
        row
    }
}

// ---- Customer ----

pub struct CustomerRel;

impl CustomerRel {
    pub const CREDIT_SLOT: usize = 9;
    pub const MIDDLE_SLOT: usize = 12;
    pub const STATE_SLOT: usize = 16;
    pub const CREDIT_CAP: usize = 2;
    pub const MIDDLE_CAP: usize = 1;
    pub const STATE_CAP: usize = 50;
}

impl Relation for CustomerRel {
    const TAG: &'static str = "customer";
    // 5 i32, 4 f64, twelve NUL-padded string fields.
    const NATIVE_SIZE: usize =
        5 * 4 + 4 * 8 + 11 + 3 + 18 + 21 + 21 + 21 + 3 + 10 + 17 + 20 + 3 + 501;

    type Key = u32;
    type Row = Customer;

    fn schema() -> Schema {
        Schema::new(vec![
            SlotDesc::enumerated(3000), // id
            SlotDesc::enumerated(10),   // d_id
            SlotDesc::enumerated(5),    // w_id
            SlotDesc::real(0.0025),     // discount
            SlotDesc::real(2.5e-5),     // credit_lim
            SlotDesc::enumerated(1),    // balance (integer cents)
            SlotDesc::real(0.0025),     // ytd_payment
            SlotDesc::real(0.0025),     // payment_cnt
            SlotDesc::enumerated(1),    // delivery_cnt
            SlotDesc::enumerated(Self::CREDIT_CAP), // credit
            SlotDesc::string(),         // last
            SlotDesc::string(),         // first
            SlotDesc::enumerated(Self::MIDDLE_CAP), // middle
            SlotDesc::string(),         // street_1
            SlotDesc::string(),         // street_2
            SlotDesc::string(),         // city
            SlotDesc::enumerated(Self::STATE_CAP), // state
            SlotDesc::string(),         // zip
            SlotDesc::string(),         // phone
            SlotDesc::string(),         // since
            SlotDesc::string(),         // data
        ])
    }

    fn key_of(v: &AttrVector) -> Result<u32> {
        Ok(customer_key(
            v.get_int(2)? as i32,
            v.get_int(1)? as i32,
            v.get_int(0)? as i32,
        ))
    }

    fn to_attrs(row: &Customer, v: &mut AttrVector, enums: &mut EnumCatalog) -> Result<()> {
        v.set_int(0, row.c_id as i64)?;
        v.set_int(1, row.c_d_id as i64)?;
        v.set_int(2, row.c_w_id as i64)?;
        v.set_real(3, row.c_discount)?;
        v.set_real(4, row.c_credit_lim)?;
        v.set_int(5, to_cents(row.c_balance))?;
        v.set_real(6, row.c_ytd_payment)?;
        v.set_real(7, row.c_payment_cnt as f64)?;
        v.set_int(8, row.c_delivery_cnt as i64)?;
        let credit = enums.intern(Self::TAG, Self::CREDIT_SLOT, Self::CREDIT_CAP, &row.c_credit)?;
        v.set_int(9, credit)?;
        v.set_str(10, row.c_last.as_str())?;
        v.set_str(11, row.c_first.as_str())?;
        let middle = enums.intern(Self::TAG, Self::MIDDLE_SLOT, Self::MIDDLE_CAP, &row.c_middle)?;
        v.set_int(12, middle)?;
        v.set_str(13, row.c_street_1.as_str())?;
        v.set_str(14, row.c_street_2.as_str())?;
        v.set_str(15, row.c_city.as_str())?;
        let state = enums.intern(Self::TAG, Self::STATE_SLOT, Self::STATE_CAP, &row.c_state)?;
        v.set_int(16, state)?;
        v.set_str(17, row.c_zip.as_str())?;
        v.set_str(18, row.c_phone.as_str())?;
        v.set_str(19, row.c_since.as_str())?;
        v.set_str(20, row.c_data.as_str())?;
        Ok(())
    }

    fn to_row(v: &AttrVector, enums: &EnumCatalog) -> Result<Customer> {
        Ok(Customer {
            c_id: v.get_int(0)? as i32,
            c_d_id: v.get_int(1)? as i32,
            c_w_id: v.get_int(2)? as i32,
            c_discount: v.get_real(3)?,
            c_credit_lim: v.get_real(4)?,
            c_balance: from_cents(v.get_int(5)?),
            c_ytd_payment: v.get_real(6)?,
            c_payment_cnt: v.get_real(7)? as i32,
            c_delivery_cnt: v.get_int(8)? as i32,
            c_credit: enums.reveal(Self::TAG, Self::CREDIT_SLOT, v.get_int(9)?)?.to_owned(),
            c_last: v.get_str(10)?.to_owned(),
            c_first: v.get_str(11)?.to_owned(),
            c_middle: enums.reveal(Self::TAG, Self::MIDDLE_SLOT, v.get_int(12)?)?.to_owned(),
            c_street_1: v.get_str(13)?.to_owned(),
            c_street_2: v.get_str(14)?.to_owned(),
            c_city: v.get_str(15)?.to_owned(),
            c_state: enums.reveal(Self::TAG, Self::STATE_SLOT, v.get_int(16)?)?.to_owned(),
            c_zip: v.get_str(17)?.to_owned(),
            c_phone: v.get_str(18)?.to_owned(),
            c_since: v.get_str(19)?.to_owned(),
            c_data: v.get_str(20)?.to_owned(),
        })
    }

    fn write_native(row: &Customer, buf: &mut [u8]) {
        let mut w = NativeWriter::new(buf);
        w.put_i32(row.c_id);
        w.put_i32(row.c_d_id);
        w.put_i32(row.c_w_id);
        w.put_i32(row.c_payment_cnt);
        w.put_i32(row.c_delivery_cnt);
        w.put_f64(row.c_credit_lim);
        w.put_f64(row.c_discount);
        w.put_f64(row.c_balance);
        w.put_f64(row.c_ytd_payment);
        w.put_str(&row.c_first, 11);
        w.put_str(&row.c_middle, 3);
        w.put_str(&row.c_last, 18);
        w.put_str(&row.c_street_1, 21);
        w.put_str(&row.c_street_2, 21);
        w.put_str(&row.c_city, 21);
        w.put_str(&row.c_state, 3);
        w.put_str(&row.c_zip, 10);
        w.put_str(&row.c_phone, 17);
        w.put_str(&row.c_since, 20);
        w.put_str(&row.c_credit, 3);
        w.put_str(&row.c_data, 501);
    }

    fn read_native(buf: &[u8]) -> Customer {
        let mut r = NativeReader::new(buf);
        Customer {
            c_id: r.get_i32(),
            c_d_id: r.get_i32(),
            c_w_id: r.get_i32(),
            c_payment_cnt: r.get_i32(),
            c_delivery_cnt: r.get_i32(),
            c_credit_lim: r.get_f64(),
            c_discount: r.get_f64(),
            c_balance: r.get_f64(),
            c_ytd_payment: r.get_f64(),
            c_first: r.get_str(11),
            c_middle: r.get_str(3),
            c_last: r.get_str(18),
            c_street_1: r.get_str(21),
            c_street_2: r.get_str(21),
            c_city: r.get_str(21),
            c_state: r.get_str(3),
            c_zip: r.get_str(10),
            c_phone: r.get_str(17),
            c_since: r.get_str(20),
            c_credit: r.get_str(3),
            c_data: r.get_str(501),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_orderline() -> OrderLine {
        OrderLine {
            ol_o_id: 2101,
            ol_d_id: 4,
            ol_w_id: 2,
            ol_number: 3,
            ol_i_id: 54_321,
            ol_supply_w_id: 2,
            ol_quantity: 5,
            ol_amount: 123.45,
            ol_delivery_d: "2024-06-01 12:00:00".to_string(),
            ol_dist_info: "dist-info-str#04#02#5432".to_string(),
        }
    }

    fn sample_customer() -> Customer {
        Customer {
            c_id: 17,
            c_d_id: 3,
            c_w_id: 1,
            c_credit_lim: 50_000.0,
            c_discount: 0.1234,
            c_balance: -10.0,
            c_ytd_payment: 10.0,
            c_payment_cnt: 1,
            c_delivery_cnt: 0,
            c_first: "ALICE".into(),
            c_middle: "OE".into(),
            c_last: "BARBARBAR".into(),
            c_street_1: "12 Main St".into(),
            c_street_2: "Apt 4".into(),
            c_city: "Springfield".into(),
            c_state: "MA".into(),
            c_zip: "123411111".into(),
            c_phone: "0123456789012345".into(),
            c_since: "2024-06-01 12:00:00".into(),
            c_credit: "BC".into(),
            c_data: "x".repeat(300),
        }
    }

    #[test]
    fn test_orderline_native_roundtrip() {
        let row = sample_orderline();
        let mut buf = vec![0u8; OrderLineRel::NATIVE_SIZE];
        OrderLineRel::write_native(&row, &mut buf);
        let back = OrderLineRel::read_native(&buf);
        assert_eq!(back.ol_i_id, row.ol_i_id);
        assert_eq!(back.ol_amount, row.ol_amount);
        assert_eq!(back.ol_delivery_d, row.ol_delivery_d);
        assert_eq!(back.ol_dist_info, row.ol_dist_info);
    }

    #[test]
    fn test_orderline_attr_roundtrip_is_identity() {
        let row = sample_orderline();
        let mut enums = EnumCatalog::new();
        let mut v = OrderLineRel::schema().new_vector();
        OrderLineRel::to_attrs(&row, &mut v, &mut enums).unwrap();
        let back = OrderLineRel::to_row(&v, &enums).unwrap();
        assert_eq!(back.ol_o_id, row.ol_o_id);
        assert_eq!(back.ol_amount, row.ol_amount);
        assert_eq!(back.ol_dist_info, row.ol_dist_info);
        assert_eq!(
            OrderLineRel::key_of(&v).unwrap(),
            orderline_key(row.ol_w_id, row.ol_d_id, row.ol_o_id, row.ol_number)
        );
    }

    #[test]
    fn test_stock_attr_roundtrip_interns_data() {
        let mut row = Stock {
            s_i_id: 99,
            s_w_id: 3,
            s_quantity: 55,
            s_ytd: 12,
            s_order_cnt: 4,
            s_remote_cnt: 1,
            s_data: "alpha beta gamma delta".into(),
            ..Default::default()
        };
        for i in 0..10 {
            row.s_dist[i] = format!("dist-info-str#{i:02}#03#0099");
        }

        let mut enums = EnumCatalog::new();
        let mut v = StockRel::schema().new_vector();
        StockRel::to_attrs(&row, &mut v, &mut enums).unwrap();
        // The data string travels as an id, not raw bytes.
        assert_eq!(v.get_int(4).unwrap(), 0);
        let back = StockRel::to_row(&v, &enums).unwrap();
        assert_eq!(back.s_data, row.s_data);
        assert_eq!(back.s_dist, row.s_dist);
        assert_eq!(StockRel::key_of(&v).unwrap(), stock_key(3, 99));
    }

    #[test]
    fn test_customer_native_roundtrip() {
        let row = sample_customer();
        let mut buf = vec![0u8; CustomerRel::NATIVE_SIZE];
        CustomerRel::write_native(&row, &mut buf);
        let back = CustomerRel::read_native(&buf);
        assert_eq!(back.c_last, row.c_last);
        assert_eq!(back.c_balance, row.c_balance);
        assert_eq!(back.c_data, row.c_data);
        assert_eq!(back.c_credit, row.c_credit);
    }

    #[test]
    fn test_customer_balance_is_exact_cents() {
        let mut row = sample_customer();
        row.c_balance = -123.45;
        let mut enums = EnumCatalog::new();
        let mut v = CustomerRel::schema().new_vector();
        CustomerRel::to_attrs(&row, &mut v, &mut enums).unwrap();
        assert_eq!(v.get_int(5).unwrap(), -12_345);
        let back = CustomerRel::to_row(&v, &enums).unwrap();
        assert_eq!(back.c_balance, -123.45);
    }
}
