//! Values returned to the driver by the five transactions, mirroring the
//! display requirements of TPC-C clause 2.

/// One requested item of a new-order transaction.
#[derive(Debug, Clone, Copy)]
pub struct NewOrderItem {
    pub i_id: i32,
    pub ol_supply_w_id: i32,
    pub ol_quantity: i32,
}

#[derive(Debug, Clone, Default)]
pub struct NewOrderOutput {
    pub w_tax: f64,
    pub d_tax: f64,
    pub o_id: i32,
    pub c_discount: f64,
    pub total: f64,
    pub items: Vec<ItemInfo>,
    pub c_last: String,
    pub c_credit: String,
    /// Empty on commit; `INVALID_ITEM_STATUS` when the order was rejected.
    pub status: String,
}

impl NewOrderOutput {
    pub const INVALID_ITEM_STATUS: &'static str = "Item number is not valid";

    pub fn committed(&self) -> bool {
        self.status.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ItemInfo {
    pub s_quantity: i32,
    pub i_price: f64,
    pub ol_amount: f64,
    pub brand_generic: char,
    pub i_name: String,
}

impl ItemInfo {
    pub const BRAND: char = 'B';
    pub const GENERIC: char = 'G';
}

/// TPC-C 2.5.3.4 output fields.
#[derive(Debug, Clone, Default)]
pub struct PaymentOutput {
    pub w_street_1: String,
    pub w_street_2: String,
    pub w_city: String,
    pub w_state: String,
    pub w_zip: String,

    pub d_street_1: String,
    pub d_street_2: String,
    pub d_city: String,
    pub d_state: String,
    pub d_zip: String,

    pub c_credit_lim: f64,
    pub c_discount: f64,
    pub c_balance: f64,
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

#[derive(Debug, Clone, Default)]
pub struct OrderStatusOutput {
    pub c_id: i32,
    pub c_balance: f64,
    pub o_id: i32,
    pub o_carrier_id: i32,
    pub lines: Vec<OrderLineSubset>,
    pub c_first: String,
    pub c_middle: String,
    pub c_last: String,
    pub o_entry_d: String,
}

#[derive(Debug, Clone, Default)]
pub struct OrderLineSubset {
    pub ol_i_id: i32,
    pub ol_supply_w_id: i32,
    pub ol_quantity: i32,
    pub ol_amount: f64,
    pub ol_delivery_d: String,
}

/// One district's delivered order, reported by the delivery transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryOrderInfo {
    pub d_id: i32,
    pub o_id: i32,
}
