//! The five TPC-C transactions.
//!
//! Each runs to completion on the calling thread; no intermediate state
//! is observable from outside. Inputs are validated before the first
//! mutation, so the only mid-flight failure left is a disk-tier I/O
//! error, which rolls the transaction back through its undo journal and
//! surfaces to the driver.
//!
//! Reads use the shortest prefix that covers the columns a transaction
//! touches; the slot orders in `relation.rs` exist for exactly these
//! access paths.

use crate::accountant::RelationId;
use crate::error::{Result, TxnError};
use crate::relation::{CustomerRel, Relation, StockRel, from_cents, to_cents};
use crate::rows::{Customer, District, History, Order, Warehouse};
use crate::schema::AttrValue;
use crate::types::{
    DATETIME_LEN, DISTRICTS_PER_WAREHOUSE, MAX_OL_CNT, customer_key, district_key, neworder_key,
    order_key, orderline_key, stock_key,
};

use super::outputs::{
    DeliveryOrderInfo, ItemInfo, NewOrderItem, NewOrderOutput, OrderLineSubset, OrderStatusOutput,
    PaymentOutput,
};
use super::undo::UndoJournal;
use super::{NOT_MOUNTED, TpccTables};

/// Orders examined by stock-level, TPC-C 2.8.
const STOCK_LEVEL_ORDERS: i32 = 20;

/// Reject ids outside the key-packing domain before any key derivation.
fn check_ids(w_id: i32, d_id: i32, c_id: i32) -> Result<()> {
    use crate::types::{CUSTOMERS_PER_DISTRICT, MAX_WAREHOUSES};
    if !(1..=MAX_WAREHOUSES).contains(&w_id) {
        return Err(TxnError::ArgumentOutOfRange(format!("warehouse id {w_id}")).into());
    }
    if !(1..=DISTRICTS_PER_WAREHOUSE).contains(&d_id) {
        return Err(TxnError::ArgumentOutOfRange(format!("district id {d_id}")).into());
    }
    if !(1..=CUSTOMERS_PER_DISTRICT).contains(&c_id) {
        return Err(TxnError::ArgumentOutOfRange(format!("customer id {c_id}")).into());
    }
    Ok(())
}

impl TpccTables {
    /// TPC-C 2.8: of the district's last twenty orders, count distinct
    /// items whose stock quantity sits below `threshold`.
    ///
    /// Touches only the first slot of OrderLine (`ol_i_id`) and of Stock
    /// (`s_quantity`).
    pub fn stock_level(&mut self, w_id: i32, d_id: i32, threshold: i32) -> Result<i32> {
        check_ids(w_id, d_id, 1)?;
        // TPC-C 2.8.1.2.
        if !(10..=20).contains(&threshold) {
            return Err(TxnError::ArgumentOutOfRange(format!("stock-level threshold {threshold}")).into());
        }
        let next_o_id = self
            .districts
            .get(&district_key(w_id, d_id))
            .ok_or_else(|| TxnError::ArgumentOutOfRange(format!("warehouse id {w_id}")))?
            .d_next_o_id;

        let mut s_i_ids = Vec::with_capacity(300);
        for o_id in (next_o_id - STOCK_LEVEL_ORDERS).max(1)..next_o_id {
            for number in 1..=MAX_OL_CNT {
                let ol_key = orderline_key(w_id, d_id, o_id, number);
                let line = self
                    .orderlines
                    .as_mut()
                    .expect(NOT_MOUNTED)
                    .find(&mut self.enums, ol_key, 1)?;
                let Some(line) = line else {
                    // Past the last line of this order.
                    break;
                };
                let ol_i_id = line.get_int(0)? as i32;

                let stock = self
                    .stock
                    .as_mut()
                    .expect(NOT_MOUNTED)
                    .find(&mut self.enums, stock_key(w_id, ol_i_id), 1)?
                    .ok_or(TxnError::KeyNotFound {
                        relation: "stock",
                        key: stock_key(w_id, ol_i_id) as u64,
                    })?;
                if (stock.get_int(0)? as i32) < threshold {
                    s_i_ids.push(ol_i_id);
                }
            }
        }

        s_i_ids.sort_unstable();
        s_i_ids.dedup();
        Ok(s_i_ids.len() as i32)
    }

    /// TPC-C 2.6: report the customer's newest order and its lines.
    /// Read-only; customer prefix 13, order-line prefix 6.
    pub fn order_status(&mut self, w_id: i32, d_id: i32, c_id: i32) -> Result<OrderStatusOutput> {
        check_ids(w_id, d_id, c_id)?;
        let c_key = customer_key(w_id, d_id, c_id);
        let customer = self
            .customers
            .as_mut()
            .expect(NOT_MOUNTED)
            .find(&mut self.enums, c_key, 13)?
            .ok_or(TxnError::KeyNotFound { relation: "customer", key: c_key as u64 })?;

        let mut output = OrderStatusOutput {
            c_id: customer.get_int(0)? as i32,
            c_balance: from_cents(customer.get_int(5)?),
            c_last: customer.get_str(10)?.to_owned(),
            c_first: customer.get_str(11)?.to_owned(),
            ..Default::default()
        };
        let middle_id = customer.get_int(12)?;
        output.c_middle = self
            .enums
            .reveal(CustomerRel::TAG, CustomerRel::MIDDLE_SLOT, middle_id)?
            .to_owned();

        self.fill_order_status(w_id, d_id, c_id, &mut output)?;
        Ok(output)
    }

    /// Order-status addressed by last name, TPC-C 2.6.2.
    pub fn order_status_by_name(
        &mut self,
        w_id: i32,
        d_id: i32,
        c_last: &str,
    ) -> Result<OrderStatusOutput> {
        let c_id = self.find_customer_by_name(w_id, d_id, c_last)?;
        self.order_status(w_id, d_id, c_id)
    }

    fn fill_order_status(
        &mut self,
        w_id: i32,
        d_id: i32,
        c_id: i32,
        output: &mut OrderStatusOutput,
    ) -> Result<()> {
        // One past the customer's largest possible secondary key.
        let probe = (customer_key(w_id, d_id, c_id) as u64 + 1) << 32;
        let (o_id, o_ol_cnt) = {
            let (&sec_key, &primary) = self
                .orders_by_customer
                .find_last_less_than(&probe)
                .ok_or(TxnError::KeyNotFound { relation: "order", key: probe })?;
            if sec_key >> 32 != customer_key(w_id, d_id, c_id) as u64 {
                // The customer has no orders at all.
                return Err(TxnError::KeyNotFound { relation: "order", key: probe }.into());
            }
            let order = self
                .orders
                .get(&primary)
                .ok_or(TxnError::KeyNotFound { relation: "order", key: primary })?;
            output.o_id = order.o_id;
            output.o_carrier_id = order.o_carrier_id;
            output.o_entry_d = order.o_entry_d.clone();
            (order.o_id, order.o_ol_cnt)
        };

        output.lines.clear();
        for number in 1..=o_ol_cnt {
            let ol_key = orderline_key(w_id, d_id, o_id, number);
            let line = self
                .orderlines
                .as_mut()
                .expect(NOT_MOUNTED)
                .find(&mut self.enums, ol_key, 6)?
                .ok_or(TxnError::KeyNotFound { relation: "orderline", key: ol_key })?;
            output.lines.push(OrderLineSubset {
                ol_i_id: line.get_int(0)? as i32,
                ol_amount: line.get_real(1)?,
                ol_supply_w_id: line.get_int(3)? as i32,
                ol_quantity: line.get_int(4)? as i32,
                ol_delivery_d: line.get_str(5)?.to_owned(),
            });
        }
        Ok(())
    }

    /// TPC-C 2.4. Validates every item id up front and rejects the whole
    /// order if any is unknown (the status field carries the rollback
    /// message and nothing is written). After validation the only
    /// possible failure is disk I/O, which undoes the transaction.
    pub fn new_order(
        &mut self,
        w_id: i32,
        d_id: i32,
        c_id: i32,
        items: &[NewOrderItem],
        now: &str,
    ) -> Result<NewOrderOutput> {
        debug_assert_eq!(now.len(), DATETIME_LEN);
        check_ids(w_id, d_id, c_id)?;
        for item in items {
            check_ids(item.ol_supply_w_id, d_id, 1)?;
        }
        let mut output = NewOrderOutput::default();

        // 2.4.3.4 wants c_last, c_credit and o_id reported even for a
        // rejected order, so read those first.
        let d_key = district_key(w_id, d_id);
        {
            let district = self
                .districts
                .get(&d_key)
                .ok_or_else(|| TxnError::ArgumentOutOfRange(format!("district ({w_id}, {d_id})")))?;
            output.d_tax = district.d_tax;
            output.o_id = district.d_next_o_id;
        }

        let c_key = customer_key(w_id, d_id, c_id);
        let customer = self
            .customers
            .as_mut()
            .expect(NOT_MOUNTED)
            .find(&mut self.enums, c_key, 11)?
            .ok_or(TxnError::KeyNotFound { relation: "customer", key: c_key as u64 })?;
        output.c_discount = customer.get_real(3)?;
        output.c_last = customer.get_str(10)?.to_owned();
        let credit_id = customer.get_int(9)?;
        output.c_credit = self
            .enums
            .reveal(CustomerRel::TAG, CustomerRel::CREDIT_SLOT, credit_id)?
            .to_owned();

        // Validate all items before mutating anything.
        let mut item_rows = Vec::with_capacity(items.len());
        for item in items {
            match self.find_item(item.i_id) {
                Some(row) => item_rows.push(row.clone()),
                None => {
                    output.status = NewOrderOutput::INVALID_ITEM_STATUS.to_owned();
                    return Ok(output);
                }
            }
        }

        let mut journal = UndoJournal::new();
        match self.new_order_commit(w_id, d_id, c_id, items, &item_rows, now, &mut journal, &mut output)
        {
            Ok(()) => Ok(output),
            Err(e) => {
                self.rollback(journal)?;
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn new_order_commit(
        &mut self,
        w_id: i32,
        d_id: i32,
        c_id: i32,
        items: &[NewOrderItem],
        item_rows: &[crate::rows::Item],
        now: &str,
        journal: &mut UndoJournal,
        output: &mut NewOrderOutput,
    ) -> Result<()> {
        let all_local = items.iter().all(|i| i.ol_supply_w_id == w_id);
        let o_id = output.o_id;

        let d_key = district_key(w_id, d_id);
        {
            let district = self.districts.get_mut(&d_key).expect("validated above");
            journal.save_district(d_key, district);
            district.d_next_o_id += 1;
        }
        output.w_tax = self
            .warehouses
            .get(&(w_id as u32))
            .ok_or_else(|| TxnError::ArgumentOutOfRange(format!("warehouse id {w_id}")))?
            .w_tax;

        self.insert_order_internal(
            Order {
                o_id,
                o_c_id: c_id,
                o_d_id: d_id,
                o_w_id: w_id,
                o_carrier_id: Order::NULL_CARRIER_ID,
                o_ol_cnt: items.len() as i32,
                o_all_local: all_local as i32,
                o_entry_d: now.to_owned(),
            },
            Some(journal),
        )?;
        self.insert_neworder_internal(w_id, d_id, o_id, Some(journal))?;

        output.items.resize(items.len(), ItemInfo::default());
        output.total = 0.0;
        for (i, item) in items.iter().enumerate() {
            let s_key = stock_key(item.ol_supply_w_id, item.i_id);
            let stock = self
                .stock
                .as_mut()
                .expect(NOT_MOUNTED)
                .find(&mut self.enums, s_key, 5)?
                .ok_or(TxnError::KeyNotFound { relation: "stock", key: s_key as u64 })?;
            let s_quantity = stock.get_int(0)? as i32;
            let s_ytd = stock.get_int(1)? as i32;
            let s_order_cnt = stock.get_int(2)? as i32;
            let s_remote_cnt = stock.get_int(3)? as i32;
            let s_data_id = stock.get_int(4)?;
            let stock_is_original = self
                .enums
                .reveal(StockRel::TAG, 4, s_data_id)?
                .ends_with("original");

            let info = &mut output.items[i];
            info.brand_generic = if stock_is_original && item_rows[i].i_data.contains("original") {
                ItemInfo::BRAND
            } else {
                ItemInfo::GENERIC
            };
            info.i_name = item_rows[i].i_name.clone();
            info.i_price = item_rows[i].i_price;
            info.ol_amount = item.ol_quantity as f64 * item_rows[i].i_price;
            output.total += info.ol_amount;

            // Stock mutation, TPC-C 2.4.2.2: quantity wraps below
            // ol_quantity + 10, the counters wrap at 100.
            let new_quantity = if s_quantity >= item.ol_quantity + 10 {
                s_quantity - item.ol_quantity
            } else {
                s_quantity - item.ol_quantity + 91
            };
            info.s_quantity = new_quantity;
            let new_ytd = s_ytd + item.ol_quantity;
            let mut new_order_cnt = s_order_cnt + 1;
            if new_order_cnt > 100 {
                new_order_cnt = 1;
            }
            let mut new_remote_cnt = s_remote_cnt;
            if item.ol_supply_w_id != w_id {
                new_remote_cnt += 1;
                if new_remote_cnt > 100 {
                    new_remote_cnt = 1;
                }
            }

            journal.save_stock_slots(
                s_key,
                vec![
                    (0, AttrValue::Int(s_quantity as i64)),
                    (1, AttrValue::Int(s_ytd as i64)),
                    (2, AttrValue::Int(s_order_cnt as i64)),
                    (3, AttrValue::Int(s_remote_cnt as i64)),
                ],
            );
            self.stock_buffer.set_int(0, new_quantity as i64)?;
            self.stock_buffer.set_int(1, new_ytd as i64)?;
            self.stock_buffer.set_int(2, new_order_cnt as i64)?;
            self.stock_buffer.set_int(3, new_remote_cnt as i64)?;
            self.stock.as_mut().expect(NOT_MOUNTED).update(
                &mut self.acct,
                &mut self.enums,
                s_key,
                &self.stock_buffer,
                &[0, 1, 2, 3],
            )?;

            // The order line itself.
            let number = i as i32 + 1;
            self.ol_buffer.set_int(0, item.i_id as i64)?;
            self.ol_buffer.set_real(1, info.ol_amount)?;
            self.ol_buffer.set_int(2, number as i64)?;
            self.ol_buffer.set_int(3, item.ol_supply_w_id as i64)?;
            self.ol_buffer.set_int(4, item.ol_quantity as i64)?;
            self.ol_buffer.set_str(5, "")?;
            // Same shape the generator uses; modulo keeps it at exactly
            // 24 bytes for any warehouse or item id.
            self.ol_buffer.set_str(
                6,
                format!(
                    "dist-info-str#{:02}#{:02}#{:04}",
                    d_id,
                    item.ol_supply_w_id % 100,
                    item.i_id % 10_000
                ),
            )?;
            self.ol_buffer.set_int(7, o_id as i64)?;
            self.ol_buffer.set_int(8, d_id as i64)?;
            self.ol_buffer.set_int(9, w_id as i64)?;
            let arity = self.ol_buffer.arity();
            self.orderlines.as_mut().expect(NOT_MOUNTED).insert(
                &mut self.acct,
                &self.enums,
                &self.ol_buffer,
                arity,
            )?;
            journal
                .inserted_orderlines
                .push(orderline_key(w_id, d_id, o_id, number));
        }

        Ok(())
    }

    /// TPC-C 2.5 addressed by customer id.
    pub fn payment(
        &mut self,
        w_id: i32,
        d_id: i32,
        c_w_id: i32,
        c_d_id: i32,
        c_id: i32,
        h_amount: f64,
        now: &str,
    ) -> Result<PaymentOutput> {
        check_ids(w_id, d_id, 1)?;
        check_ids(c_w_id, c_d_id, c_id)?;
        let mut journal = UndoJournal::new();
        let mut output = PaymentOutput::default();
        match self.payment_body(w_id, d_id, c_w_id, c_d_id, c_id, h_amount, now, &mut journal, &mut output)
        {
            Ok(()) => Ok(output),
            Err(e) => {
                self.rollback(journal)?;
                Err(e)
            }
        }
    }

    /// Payment addressed by last name.
    pub fn payment_by_name(
        &mut self,
        w_id: i32,
        d_id: i32,
        c_w_id: i32,
        c_d_id: i32,
        c_last: &str,
        h_amount: f64,
        now: &str,
    ) -> Result<PaymentOutput> {
        let c_id = self.find_customer_by_name(c_w_id, c_d_id, c_last)?;
        self.payment(w_id, d_id, c_w_id, c_d_id, c_id, h_amount, now)
    }

    #[allow(clippy::too_many_arguments)]
    fn payment_body(
        &mut self,
        w_id: i32,
        d_id: i32,
        c_w_id: i32,
        c_d_id: i32,
        c_id: i32,
        h_amount: f64,
        now: &str,
        journal: &mut UndoJournal,
        output: &mut PaymentOutput,
    ) -> Result<()> {
        // Home part: warehouse and district year-to-date, history row.
        let w_name = {
            let warehouse = self
                .warehouses
                .get_mut(&(w_id as u32))
                .ok_or_else(|| TxnError::ArgumentOutOfRange(format!("warehouse id {w_id}")))?;
            journal.save_warehouse(w_id as u32, warehouse);
            warehouse.w_ytd += h_amount;
            copy_warehouse_address(warehouse, output);
            warehouse.w_name.clone()
        };
        let d_key = district_key(w_id, d_id);
        let d_name = {
            let district = self
                .districts
                .get_mut(&d_key)
                .ok_or_else(|| TxnError::ArgumentOutOfRange(format!("district ({w_id}, {d_id})")))?;
            journal.save_district(d_key, district);
            district.d_ytd += h_amount;
            copy_district_address(district, output);
            district.d_name.clone()
        };
        self.insert_history_internal(
            History {
                h_c_id: c_id,
                h_c_d_id: c_d_id,
                h_c_w_id: c_w_id,
                h_d_id: d_id,
                h_w_id: w_id,
                h_amount,
                h_date: now.to_owned(),
                h_data: format!("{w_name}    {d_name}"),
            },
            Some(journal),
        );

        // Customer part: full row, since the output reports everything.
        let c_key = customer_key(c_w_id, c_d_id, c_id);
        let arity = self.customer_buffer.arity();
        let mut customer = self
            .customers
            .as_mut()
            .expect(NOT_MOUNTED)
            .find(&mut self.enums, c_key, arity)?
            .ok_or(TxnError::KeyNotFound { relation: "customer", key: c_key as u64 })?
            .clone();

        let old_balance = customer.get_int(5)?;
        let old_ytd_payment = customer.get_real(6)?;
        let old_payment_cnt = customer.get_real(7)?;
        customer.set_int(5, old_balance - to_cents(h_amount))?;
        customer.set_real(6, old_ytd_payment + h_amount)?;
        customer.set_real(7, old_payment_cnt + 1.0)?;

        let mut image = vec![
            (5, AttrValue::Int(old_balance)),
            (6, AttrValue::Real(old_ytd_payment)),
            (7, AttrValue::Real(old_payment_cnt)),
        ];
        let mut touched = vec![5, 6, 7];

        let credit =
            self.enums.reveal(CustomerRel::TAG, CustomerRel::CREDIT_SLOT, customer.get_int(9)?)?;
        if credit == Customer::BAD_CREDIT {
            // Bad credit: prepend the payment record to c_data, capped at
            // the column's 500 bytes.
            let old_data = customer.get_str(20)?.to_owned();
            let mut data = format!(
                " {:04}-{:02}-{:03}-{:02}-{:03}-{:04}",
                c_id, c_d_id, c_w_id, d_id, w_id, h_amount as i64
            );
            data.push_str(&old_data);
            data.truncate(Customer::MAX_DATA);
            image.push((20, AttrValue::Str(old_data)));
            customer.set_str(20, data)?;
            touched.push(20);
        }
        journal.save_customer_slots(c_key, image);

        self.customers.as_mut().expect(NOT_MOUNTED).update(
            &mut self.acct,
            &mut self.enums,
            c_key,
            &customer,
            &touched,
        )?;

        output.c_credit_lim = customer.get_real(4)?;
        output.c_discount = customer.get_real(3)?;
        output.c_balance = from_cents(customer.get_int(5)?);
        output.c_first = customer.get_str(11)?.to_owned();
        output.c_middle = self
            .enums
            .reveal(CustomerRel::TAG, CustomerRel::MIDDLE_SLOT, customer.get_int(12)?)?
            .to_owned();
        output.c_last = customer.get_str(10)?.to_owned();
        output.c_street_1 = customer.get_str(13)?.to_owned();
        output.c_street_2 = customer.get_str(14)?.to_owned();
        output.c_city = customer.get_str(15)?.to_owned();
        output.c_state = self
            .enums
            .reveal(CustomerRel::TAG, CustomerRel::STATE_SLOT, customer.get_int(16)?)?
            .to_owned();
        output.c_zip = customer.get_str(17)?.to_owned();
        output.c_phone = customer.get_str(18)?.to_owned();
        output.c_since = customer.get_str(19)?.to_owned();
        output.c_credit = self
            .enums
            .reveal(CustomerRel::TAG, CustomerRel::CREDIT_SLOT, customer.get_int(9)?)?
            .to_owned();
        output.c_data = customer.get_str(20)?.to_owned();
        Ok(())
    }

    /// TPC-C 2.7: for every district of the warehouse, deliver the oldest
    /// undelivered order. Removing the NewOrder entry and stamping the
    /// order's carrier are adjacent steps of the same sequential
    /// execution, so the pair is atomic as observed by any caller.
    pub fn delivery(
        &mut self,
        w_id: i32,
        carrier_id: i32,
        now: &str,
    ) -> Result<Vec<DeliveryOrderInfo>> {
        check_ids(w_id, 1, 1)?;
        let mut delivered = Vec::new();
        for d_id in 1..=DISTRICTS_PER_WAREHOUSE {
            // Smallest live o_id for this district.
            let probe = neworder_key(w_id, d_id, 1);
            let found = self
                .neworders
                .range(probe..)
                .next()
                .map(|(k, no)| (*k, no.clone()));
            let Some((no_key, neworder)) = found else {
                continue;
            };
            if neworder.no_d_id != d_id || neworder.no_w_id != w_id {
                // No undelivered orders for this district.
                continue;
            }
            self.neworders.remove(&no_key);
            self.acct.sub_mem(RelationId::NewOrder, neworder.approx_size());
            let o_id = neworder.no_o_id;
            delivered.push(DeliveryOrderInfo { d_id, o_id });

            let o_key = order_key(w_id, d_id, o_id);
            let (o_c_id, o_ol_cnt) = {
                let order = self
                    .orders
                    .get_mut(&o_key)
                    .ok_or(TxnError::KeyNotFound { relation: "order", key: o_key })?;
                debug_assert_eq!(order.o_carrier_id, Order::NULL_CARRIER_ID);
                order.o_carrier_id = carrier_id;
                (order.o_c_id, order.o_ol_cnt)
            };

            let mut total_cents = 0i64;
            for number in 1..=o_ol_cnt {
                let ol_key = orderline_key(w_id, d_id, o_id, number);
                let amount = {
                    let line = self
                        .orderlines
                        .as_mut()
                        .expect(NOT_MOUNTED)
                        .find(&mut self.enums, ol_key, 6)?
                        .ok_or(TxnError::KeyNotFound { relation: "orderline", key: ol_key })?;
                    line.get_real(1)?
                };
                total_cents += to_cents(amount);
                self.ol_buffer.set_str(5, now)?;
                self.orderlines.as_mut().expect(NOT_MOUNTED).update(
                    &mut self.acct,
                    &mut self.enums,
                    ol_key,
                    &self.ol_buffer,
                    &[5],
                )?;
            }

            let c_key = customer_key(w_id, d_id, o_c_id);
            let (balance, delivery_cnt) = {
                let customer = self
                    .customers
                    .as_mut()
                    .expect(NOT_MOUNTED)
                    .find(&mut self.enums, c_key, 9)?
                    .ok_or(TxnError::KeyNotFound { relation: "customer", key: c_key as u64 })?;
                (customer.get_int(5)?, customer.get_int(8)?)
            };
            self.customer_buffer.set_int(5, balance + total_cents)?;
            self.customer_buffer.set_int(8, delivery_cnt + 1)?;
            self.customers.as_mut().expect(NOT_MOUNTED).update(
                &mut self.acct,
                &mut self.enums,
                c_key,
                &self.customer_buffer,
                &[5, 8],
            )?;
        }
        Ok(delivered)
    }

    /// Revert a transaction using its journal: restore pre-images, drop
    /// inserted rows, resurrect consumed NewOrder entries.
    pub fn rollback(&mut self, journal: UndoJournal) -> Result<()> {
        for (key, row) in journal.warehouses {
            if let Some(warehouse) = self.warehouses.get_mut(&key) {
                *warehouse = row;
            }
        }
        for (key, row) in journal.districts {
            if let Some(district) = self.districts.get_mut(&key) {
                *district = row;
            }
        }

        for (key, image) in journal.stocks {
            let touched: Vec<usize> = image.iter().map(|(slot, _)| *slot).collect();
            for (slot, value) in image {
                self.stock_buffer.set(slot, value)?;
            }
            self.stock.as_mut().expect(NOT_MOUNTED).update(
                &mut self.acct,
                &mut self.enums,
                key,
                &self.stock_buffer,
                &touched,
            )?;
        }
        for (key, image) in journal.customers {
            let touched: Vec<usize> = image.iter().map(|(slot, _)| *slot).collect();
            for (slot, value) in image {
                self.customer_buffer.set(slot, value)?;
            }
            self.customers.as_mut().expect(NOT_MOUNTED).update(
                &mut self.acct,
                &mut self.enums,
                key,
                &self.customer_buffer,
                &touched,
            )?;
        }

        for key in journal.inserted_orderlines {
            self.orderlines.as_mut().expect(NOT_MOUNTED).erase(&mut self.acct, key)?;
        }
        for key in journal.inserted_order_secondaries {
            self.orders_by_customer.remove(&key);
        }
        for key in journal.inserted_orders {
            if let Some(order) = self.orders.remove(&key) {
                self.acct.sub_mem(RelationId::Order, order.approx_size());
            }
        }
        for key in journal.inserted_neworders {
            if let Some(neworder) = self.neworders.remove(&key) {
                self.acct.sub_mem(RelationId::NewOrder, neworder.approx_size());
            }
        }
        for _ in 0..journal.inserted_history {
            if let Some(h) = self.history.pop() {
                self.acct.sub_mem(RelationId::History, h.approx_size());
            }
        }
        for (key, neworder) in journal.deleted_neworders {
            self.acct.add_mem(RelationId::NewOrder, neworder.approx_size());
            self.neworders.insert(key, neworder);
        }
        Ok(())
    }
}

fn copy_warehouse_address(w: &Warehouse, output: &mut PaymentOutput) {
    output.w_street_1 = w.w_street_1.clone();
    output.w_street_2 = w.w_street_2.clone();
    output.w_city = w.w_city.clone();
    output.w_state = w.w_state.clone();
    output.w_zip = w.w_zip.clone();
}

fn copy_district_address(d: &District, output: &mut PaymentOutput) {
    output.d_street_1 = d.d_street_1.clone();
    output.d_street_2 = d.d_street_2.clone();
    output.d_city = d.d_city.clone();
    output.d_state = d.d_state.clone();
    output.d_zip = d.d_zip.clone();
}
