//! Learned per-relation compression.
//!
//! A `Model` is fitted once over a sample of the bulk-loaded rows and is
//! immutable afterwards. It encodes an attribute vector slot by slot into
//! a self-delimiting stream: every slot's segment starts on a byte
//! boundary, so a reader can stop after any prefix `[0..k)` and a writer
//! can splice a replacement segment for a single mutated slot.

mod bits;
mod code;
mod fitter;

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ModelError, Result};
use crate::schema::{AttrVector, Schema, SlotKind};

use bits::{BitReader, BitWriter};
use code::CodeTable;
pub use fitter::{EST_SAMPLE, Fitter, NON_FULL_PASS_STOP};
use fitter::quantize;

/// One column's fitted encoder/decoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum SlotCodec {
    /// Category ids, coded directly.
    Sym { table: CodeTable },
    /// Integers, quantised by an odd step before coding.
    Int { step: i64, table: CodeTable },
    /// Reals, scaled to a fitted decimal exponent before coding.
    Real { scale: i64, table: CodeTable },
    /// Strings: varint length, then a character code.
    Str { chars: CodeTable },
}

impl SlotCodec {
    fn encode(&self, w: &mut BitWriter, v: &AttrVector, slot: usize) -> Result<()> {
        match self {
            SlotCodec::Sym { table } => table.encode(w, v.get_int(slot)?),
            SlotCodec::Int { step, table } => table.encode(w, quantize(v.get_int(slot)?, *step)),
            SlotCodec::Real { scale, table } => {
                let scaled = (v.get_real(slot)? * *scale as f64).round() as i64;
                table.encode(w, scaled);
            }
            SlotCodec::Str { chars } => {
                let s = v.get_str(slot)?;
                w.write_varint(s.len() as u64);
                for b in s.bytes() {
                    chars.encode(w, b as i64);
                }
            }
        }
        Ok(())
    }

    fn decode(&self, r: &mut BitReader<'_>, v: &mut AttrVector, slot: usize) -> Result<()> {
        match self {
            SlotCodec::Sym { table } => v.set_int(slot, table.decode(r)?),
            SlotCodec::Int { step, table } => v.set_int(slot, table.decode(r)? * step),
            SlotCodec::Real { scale, table } => {
                v.set_real(slot, table.decode(r)? as f64 / *scale as f64)
            }
            SlotCodec::Str { chars } => {
                let len = r.read_varint()? as usize;
                let mut bytes = Vec::with_capacity(len);
                for _ in 0..len {
                    bytes.push(chars.decode(r)? as u8);
                }
                v.set_str(slot, String::from_utf8_lossy(&bytes).into_owned())
            }
        }
    }

    /// Decode and discard, advancing the reader past this slot.
    fn skip(&self, r: &mut BitReader<'_>) -> Result<()> {
        match self {
            SlotCodec::Sym { table } | SlotCodec::Int { table, .. } | SlotCodec::Real { table, .. } => {
                table.decode(r)?;
            }
            SlotCodec::Str { chars } => {
                let len = r.read_varint()? as usize;
                for _ in 0..len {
                    chars.decode(r)?;
                }
            }
        }
        Ok(())
    }

    fn byte_size(&self) -> u64 {
        match self {
            SlotCodec::Sym { table }
            | SlotCodec::Int { table, .. }
            | SlotCodec::Real { table, .. } => table.byte_size(),
            SlotCodec::Str { chars } => chars.byte_size(),
        }
    }
}

/// Fitted compression parameters for one relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    schema: Schema,
    codecs: Vec<SlotCodec>,
}

impl Model {
    /// Fit a model over `rows`, deterministically for a given `(rows,
    /// seed)` pair.
    ///
    /// Mirrors the learning loop of the reference system: an estimate
    /// pass of `EST_SAMPLE` uniform random draws, sequential streaming
    /// with an early stop once every column has settled, then one full
    /// tuning pass only if some column still required it.
    pub fn fit(schema: &Schema, rows: &[AttrVector], seed: u64) -> Result<Model> {
        if rows.is_empty() {
            return Err(ModelError::EmptySample.into());
        }

        let mut fitter = Fitter::new(schema);
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..rows.len().min(EST_SAMPLE) {
            fitter.learn(&rows[rng.gen_range(0..rows.len())])?;
        }

        let mut streamed = 0usize;
        for row in rows {
            if streamed >= NON_FULL_PASS_STOP && !fitter.require_full_pass() {
                break;
            }
            fitter.learn(row)?;
            streamed += 1;
        }

        let tuning = fitter.require_full_pass();
        if tuning {
            for row in rows {
                fitter.learn(row)?;
            }
        }
        debug!(
            rows = rows.len(),
            feeds = fitter.feeds(),
            tuning_pass = tuning,
            "model fitted"
        );

        let codecs = schema
            .slots()
            .iter()
            .zip(&fitter.stats)
            .map(|(desc, stats)| {
                let (param, counts) = stats.finish();
                build_codec(desc.kind, param, &counts)
            })
            .collect();

        Ok(Model { schema: schema.clone(), codecs })
    }

    pub fn arity(&self) -> usize {
        self.codecs.len()
    }

    /// Encode slots `[0..prefix_len)` of `row`.
    pub fn compress(&self, row: &AttrVector, prefix_len: usize) -> Result<Vec<u8>> {
        let mut w = BitWriter::new();
        for slot in 0..prefix_len.min(self.codecs.len()) {
            self.codecs[slot].encode(&mut w, row, slot)?;
            w.align();
        }
        Ok(w.finish())
    }

    /// Fill slots `[0..prefix_len)` of the caller's buffer; the tail is
    /// left untouched.
    pub fn decompress(&self, bytes: &[u8], row: &mut AttrVector, prefix_len: usize) -> Result<()> {
        let mut r = BitReader::new(bytes);
        for slot in 0..prefix_len.min(self.codecs.len()) {
            self.codecs[slot].decode(&mut r, row, slot)?;
            r.align();
        }
        Ok(())
    }

    /// Encode slot `slot` in isolation, for splicing into an existing
    /// cell after a single-column mutation.
    pub fn update_single(&self, row: &AttrVector, slot: usize) -> Result<Vec<u8>> {
        let mut w = BitWriter::new();
        self.codecs[slot].encode(&mut w, row, slot)?;
        Ok(w.finish())
    }

    /// Replace slot `slot`'s segment inside `cell` with `segment`.
    pub fn splice_single(&self, cell: &[u8], slot: usize, segment: &[u8]) -> Result<Vec<u8>> {
        let mut r = BitReader::new(cell);
        for s in 0..slot {
            self.codecs[s].skip(&mut r)?;
            r.align();
        }
        let start = r.byte_pos();
        self.codecs[slot].skip(&mut r)?;
        r.align();
        let end = r.byte_pos();

        let mut out = Vec::with_capacity(cell.len() - (end - start) + segment.len());
        out.extend_from_slice(&cell[..start]);
        out.extend_from_slice(segment);
        out.extend_from_slice(&cell[end..]);
        Ok(out)
    }

    /// In-memory weight of the fitted tables, charged against the budget
    /// as model footprint.
    pub fn byte_size(&self) -> u64 {
        self.codecs.iter().map(SlotCodec::byte_size).sum()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .map_err(|e| ModelError::ModelFile(format!("{}: {e}", path.display())))?;
        serde_json::to_writer(BufWriter::new(file), self)
            .map_err(|e| ModelError::ModelFile(e.to_string()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Model> {
        let file = File::open(path)
            .map_err(|e| ModelError::ModelFile(format!("{}: {e}", path.display())))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| ModelError::ModelFile(e.to_string()).into())
    }
}

fn build_codec(kind: SlotKind, param: i64, counts: &HashMap<i64, u64>) -> SlotCodec {
    let table = CodeTable::build(counts);
    match kind {
        SlotKind::Enum { .. } => SlotCodec::Sym { table },
        SlotKind::Int => SlotCodec::Int { step: param, table },
        SlotKind::Real => SlotCodec::Real { scale: param, table },
        SlotKind::Str => SlotCodec::Str { chars: table },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SlotDesc;

    fn money_schema() -> Schema {
        Schema::new(vec![
            SlotDesc::enumerated(100),
            SlotDesc::real(0.0025),
            SlotDesc::string(),
            SlotDesc::int(0.5),
        ])
    }

    fn sample_rows(schema: &Schema, n: usize) -> Vec<AttrVector> {
        (0..n)
            .map(|i| {
                let mut v = schema.new_vector();
                v.set_int(0, (i % 7) as i64).unwrap();
                v.set_real(1, (i % 100) as f64 + 0.25).unwrap();
                v.set_str(2, format!("row-{}", i % 13)).unwrap();
                v.set_int(3, 1000 + (i % 50) as i64).unwrap();
                v
            })
            .collect()
    }

    #[test]
    fn test_full_roundtrip_within_tolerance() {
        let schema = money_schema();
        let rows = sample_rows(&schema, 500);
        let model = Model::fit(&schema, &rows, 0).unwrap();

        for row in &rows {
            let bytes = model.compress(row, schema.arity()).unwrap();
            let mut out = schema.new_vector();
            model.decompress(&bytes, &mut out, schema.arity()).unwrap();
            assert_eq!(out.get_int(0).unwrap(), row.get_int(0).unwrap());
            let orig = row.get_real(1).unwrap();
            assert!((out.get_real(1).unwrap() - orig).abs() <= 0.0025 * orig.abs() + 1e-9);
            assert_eq!(out.get_str(2).unwrap(), row.get_str(2).unwrap());
            assert_eq!(out.get_int(3).unwrap(), row.get_int(3).unwrap());
        }
    }

    #[test]
    fn test_prefix_decode_leaves_tail_untouched() {
        let schema = money_schema();
        let rows = sample_rows(&schema, 200);
        let model = Model::fit(&schema, &rows, 0).unwrap();

        let bytes = model.compress(&rows[17], 4).unwrap();
        let mut out = schema.new_vector();
        out.set_int(3, -777).unwrap();
        model.decompress(&bytes, &mut out, 2).unwrap();
        assert_eq!(out.get_int(0).unwrap(), rows[17].get_int(0).unwrap());
        // Slot 3 was not decoded.
        assert_eq!(out.get_int(3).unwrap(), -777);
    }

    #[test]
    fn test_prefix_compress_decodes_with_same_prefix() {
        let schema = money_schema();
        let rows = sample_rows(&schema, 200);
        let model = Model::fit(&schema, &rows, 0).unwrap();

        let bytes = model.compress(&rows[3], 2).unwrap();
        let mut out = schema.new_vector();
        model.decompress(&bytes, &mut out, 2).unwrap();
        assert_eq!(out.get_int(0).unwrap(), rows[3].get_int(0).unwrap());
    }

    #[test]
    fn test_update_single_splice() {
        let schema = money_schema();
        let rows = sample_rows(&schema, 200);
        let model = Model::fit(&schema, &rows, 0).unwrap();

        let mut row = rows[5].clone();
        let cell = model.compress(&row, schema.arity()).unwrap();

        // Mutate one string slot to a value of a different length.
        row.set_str(2, "a much longer replacement value").unwrap();
        let segment = model.update_single(&row, 2).unwrap();
        let new_cell = model.splice_single(&cell, 2, &segment).unwrap();

        let mut out = schema.new_vector();
        model.decompress(&new_cell, &mut out, schema.arity()).unwrap();
        assert_eq!(out.get_str(2).unwrap(), "a much longer replacement value");
        // Neighbours are untouched.
        assert_eq!(out.get_int(0).unwrap(), row.get_int(0).unwrap());
        assert_eq!(out.get_int(3).unwrap(), row.get_int(3).unwrap());
    }

    #[test]
    fn test_unseen_values_escape() {
        let schema = money_schema();
        let rows = sample_rows(&schema, 100);
        let model = Model::fit(&schema, &rows, 0).unwrap();

        let mut row = schema.new_vector();
        row.set_int(0, 9_999).unwrap();
        row.set_real(1, 8_888.25).unwrap();
        row.set_str(2, "~never seen chars\u{7f}").unwrap();
        row.set_int(3, -123_456).unwrap();

        let bytes = model.compress(&row, schema.arity()).unwrap();
        let mut out = schema.new_vector();
        model.decompress(&bytes, &mut out, schema.arity()).unwrap();
        assert_eq!(out.get_int(0).unwrap(), 9_999);
        assert!((out.get_real(1).unwrap() - 8_888.25).abs() <= 0.0025 * 8_888.25);
        assert_eq!(out.get_str(2).unwrap(), "~never seen chars\u{7f}");
        assert_eq!(out.get_int(3).unwrap(), -123_456);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let schema = money_schema();
        let rows = sample_rows(&schema, 300);
        let a = Model::fit(&schema, &rows, 42).unwrap();
        let b = Model::fit(&schema, &rows, 42).unwrap();
        let row = &rows[9];
        assert_eq!(
            a.compress(row, schema.arity()).unwrap(),
            b.compress(row, schema.arity()).unwrap()
        );
    }

    #[test]
    fn test_empty_sample_fails() {
        let schema = money_schema();
        assert!(Model::fit(&schema, &[], 0).is_err());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let schema = money_schema();
        let rows = sample_rows(&schema, 100);
        let model = Model::fit(&schema, &rows, 0).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orderline_model.json");
        model.save(&path).unwrap();
        let loaded = Model::load(&path).unwrap();

        let row = &rows[0];
        assert_eq!(
            model.compress(row, schema.arity()).unwrap(),
            loaded.compress(row, schema.arity()).unwrap()
        );
    }

    #[test]
    fn test_compression_beats_naive_layout() {
        // A skewed categorical column should land well under 8 bytes per
        // value once fitted.
        let schema = Schema::new(vec![SlotDesc::enumerated(10)]);
        let rows: Vec<AttrVector> = (0..1000)
            .map(|i| {
                let mut v = schema.new_vector();
                v.set_int(0, if i % 10 == 0 { 1 } else { 0 }).unwrap();
                v
            })
            .collect();
        let model = Model::fit(&schema, &rows, 0).unwrap();
        let bytes = model.compress(&rows[1], 1).unwrap();
        assert!(bytes.len() <= 1);
    }
}
