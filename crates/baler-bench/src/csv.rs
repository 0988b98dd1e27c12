//! CSV dumps of the four interesting relations (mode 1 of the driver).
//!
//! One row per tuple, comma separated, in exactly the slot order the
//! relation schemas declare; numerics in decimal, strings raw. TPC-C
//! string data never contains commas, so nothing is escaped.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use baler_core::db::TpccTables;
use baler_core::error::{Result, StorageError};
use tracing::info;

fn create(path: &Path) -> Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path).map_err(StorageError::Io)?))
}

fn io_err(e: std::io::Error) -> baler_core::error::Error {
    StorageError::Io(e).into()
}

pub fn dump_stock(tables: &mut TpccTables, out_dir: &Path) -> Result<()> {
    let mut f = create(&out_dir.join("stock.csv"))?;
    tables.for_each_stock(|s| {
        write!(
            f,
            "{},{},{},{},{}",
            s.s_quantity, s.s_ytd, s.s_order_cnt, s.s_remote_cnt, s.s_data
        )
        .map_err(io_err)?;
        for dist in &s.s_dist {
            write!(f, ",{dist}").map_err(io_err)?;
        }
        writeln!(f, ",{},{}", s.s_i_id, s.s_w_id).map_err(io_err)
    })?;
    f.flush().map_err(io_err)?;
    info!(file = "stock.csv", "dumped");
    Ok(())
}

pub fn dump_orderlines(tables: &mut TpccTables, out_dir: &Path) -> Result<()> {
    let mut f = create(&out_dir.join("orderline.csv"))?;
    tables.for_each_orderline(|ol| {
        writeln!(
            f,
            "{},{},{},{},{},{},{},{},{},{}",
            ol.ol_i_id,
            ol.ol_amount,
            ol.ol_number,
            ol.ol_supply_w_id,
            ol.ol_quantity,
            ol.ol_delivery_d,
            ol.ol_dist_info,
            ol.ol_o_id,
            ol.ol_d_id,
            ol.ol_w_id,
        )
        .map_err(io_err)
    })?;
    f.flush().map_err(io_err)?;
    info!(file = "orderline.csv", "dumped");
    Ok(())
}

pub fn dump_customers(tables: &mut TpccTables, out_dir: &Path) -> Result<()> {
    let mut f = create(&out_dir.join("customer.csv"))?;
    tables.for_each_customer(|c| {
        writeln!(
            f,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            c.c_id,
            c.c_d_id,
            c.c_w_id,
            c.c_discount,
            c.c_credit_lim,
            c.c_balance,
            c.c_ytd_payment,
            c.c_payment_cnt,
            c.c_delivery_cnt,
            c.c_credit,
            c.c_last,
            c.c_first,
            c.c_middle,
            c.c_street_1,
            c.c_street_2,
            c.c_city,
            c.c_state,
            c.c_zip,
            c.c_phone,
            c.c_since,
            c.c_data,
        )
        .map_err(io_err)
    })?;
    f.flush().map_err(io_err)?;
    info!(file = "customer.csv", "dumped");
    Ok(())
}

pub fn dump_history(tables: &TpccTables, out_dir: &Path) -> Result<()> {
    let mut f = create(&out_dir.join("history.csv"))?;
    for h in tables.history() {
        writeln!(
            f,
            "{},{},{},{},{},{},{},{}",
            h.h_c_id, h.h_c_d_id, h.h_c_w_id, h.h_d_id, h.h_w_id, h.h_amount, h.h_date, h.h_data,
        )
        .map_err(io_err)?;
    }
    f.flush().map_err(io_err)?;
    info!(file = "history.csv", "dumped");
    Ok(())
}

/// Everything mode 1 writes.
pub fn dump_all(tables: &mut TpccTables, out_dir: &Path) -> Result<()> {
    dump_stock(tables, out_dir)?;
    dump_orderlines(tables, out_dir)?;
    dump_customers(tables, out_dir)?;
    dump_history(tables, out_dir)
}
