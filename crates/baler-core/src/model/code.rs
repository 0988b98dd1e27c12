//! Canonical Huffman codes over i64 symbols, with an escape path for
//! values the fitting sample never saw.

use std::collections::{BinaryHeap, HashMap};
use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

use super::bits::{BitReader, BitWriter};

/// Reserved symbol for the escape code. `i64::MIN` never occurs as a
/// category id, quantised integer or scaled real in any schema.
pub const ESCAPE: i64 = i64::MIN;

/// Codes longer than this fall back to a fixed-width code; keeps decode
/// accumulation inside a u64.
const MAX_CODE_LEN: u8 = 56;

/// Serialised form: canonical `(symbol, code length)` pairs. Code words
/// are reproducible from lengths alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeTableSpec {
    lens: Vec<(i64, u8)>,
}

/// A fitted, immutable prefix code for one column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "CodeTableSpec", into = "CodeTableSpec")]
pub struct CodeTable {
    spec: CodeTableSpec,
    encode_map: HashMap<i64, (u64, u8)>,
    /// Symbols in canonical order.
    symbols: Vec<i64>,
    /// Number of code words of each length, indexed by length.
    count_per_len: Vec<u32>,
    max_len: u8,
}

impl CodeTable {
    /// Build a code from observed symbol counts. The escape symbol is
    /// always part of the code so unseen values stay encodable.
    pub fn build(counts: &HashMap<i64, u64>) -> CodeTable {
        let mut entries: Vec<(i64, u64)> = counts
            .iter()
            .filter(|(&s, _)| s != ESCAPE)
            .map(|(&s, &c)| (s, c.max(1)))
            .collect();
        entries.sort_unstable();
        // Give the escape a believable weight so its code stays short
        // enough to be usable but does not crowd out real symbols.
        let escape_weight = (entries.iter().map(|e| e.1).sum::<u64>() / 64).max(1);
        entries.push((ESCAPE, escape_weight));

        let mut lens = huffman_lengths(&entries);
        if lens.iter().any(|&(_, l)| l > MAX_CODE_LEN) {
            // Pathological distribution; drop to a fixed-width code.
            let width = fixed_width(entries.len());
            lens = entries.iter().map(|&(s, _)| (s, width)).collect();
        }
        Self::from_spec(CodeTableSpec { lens })
    }

    fn from_spec(mut spec: CodeTableSpec) -> CodeTable {
        // Canonical order: by length, then by symbol.
        spec.lens.sort_unstable_by_key(|&(s, l)| (l, s));
        let max_len = spec.lens.last().map_or(0, |&(_, l)| l);

        let mut count_per_len = vec![0u32; max_len as usize + 1];
        for &(_, l) in &spec.lens {
            count_per_len[l as usize] += 1;
        }

        let mut encode_map = HashMap::with_capacity(spec.lens.len());
        let mut symbols = Vec::with_capacity(spec.lens.len());
        let mut code = 0u64;
        let mut prev_len = 0u8;
        for &(sym, len) in &spec.lens {
            code <<= len - prev_len;
            encode_map.insert(sym, (code, len));
            symbols.push(sym);
            code += 1;
            prev_len = len;
        }

        CodeTable { spec, encode_map, symbols, count_per_len, max_len }
    }

    pub fn encode(&self, w: &mut BitWriter, sym: i64) {
        match self.encode_map.get(&sym) {
            Some(&(code, len)) => w.write_bits(code, len),
            None => {
                let (code, len) = self.encode_map[&ESCAPE];
                w.write_bits(code, len);
                w.write_signed_varint(sym);
            }
        }
    }

    pub fn decode(&self, r: &mut BitReader<'_>) -> Result<i64> {
        let mut code = 0u64;
        let mut first = 0u64;
        let mut base = 0usize;
        for len in 1..=self.max_len {
            code = code << 1 | r.read_bit()? as u64;
            let cnt = self.count_per_len[len as usize] as u64;
            if code < first + cnt {
                let sym = self.symbols[base + (code - first) as usize];
                if sym == ESCAPE {
                    return r.read_signed_varint();
                }
                return Ok(sym);
            }
            base += cnt as usize;
            first = (first + cnt) << 1;
        }
        Err(ModelError::TruncatedStream { bit: 0 }.into())
    }

    /// Rough in-memory weight, charged to the model footprint.
    pub fn byte_size(&self) -> u64 {
        self.spec.lens.len() as u64 * 9 + 32
    }
}

impl From<CodeTableSpec> for CodeTable {
    fn from(spec: CodeTableSpec) -> Self {
        Self::from_spec(spec)
    }
}

impl From<CodeTable> for CodeTableSpec {
    fn from(t: CodeTable) -> Self {
        t.spec
    }
}

fn fixed_width(n: usize) -> u8 {
    let mut w = 1u8;
    while (1usize << w) < n {
        w += 1;
    }
    w
}

/// Huffman code lengths for `(symbol, count)` entries. Ties break on
/// insertion order, so the result is deterministic for a sorted input.
fn huffman_lengths(entries: &[(i64, u64)]) -> Vec<(i64, u8)> {
    if entries.len() == 1 {
        return vec![(entries[0].0, 1)];
    }

    let mut counts: Vec<u64> = entries.iter().map(|e| e.1).collect();
    let mut parent: Vec<usize> = vec![usize::MAX; entries.len()];

    let mut heap: BinaryHeap<Reverse<(u64, usize)>> = counts
        .iter()
        .enumerate()
        .map(|(i, &c)| Reverse((c, i)))
        .collect();

    while heap.len() > 1 {
        let Reverse((ca, a)) = heap.pop().unwrap();
        let Reverse((cb, b)) = heap.pop().unwrap();
        let merged = counts.len();
        counts.push(ca + cb);
        parent.push(usize::MAX);
        parent[a] = merged;
        parent[b] = merged;
        heap.push(Reverse((ca + cb, merged)));
    }

    entries
        .iter()
        .enumerate()
        .map(|(i, &(sym, _))| {
            let mut len = 0u8;
            let mut node = i;
            while parent[node] != usize::MAX {
                len = len.saturating_add(1);
                node = parent[node];
            }
            (sym, len.max(1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts_of(pairs: &[(i64, u64)]) -> HashMap<i64, u64> {
        pairs.iter().copied().collect()
    }

    fn roundtrip(table: &CodeTable, values: &[i64]) {
        let mut w = BitWriter::new();
        for &v in values {
            table.encode(&mut w, v);
        }
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        for &v in values {
            assert_eq!(table.decode(&mut r).unwrap(), v);
        }
    }

    #[test]
    fn test_roundtrip_known_symbols() {
        let table = CodeTable::build(&counts_of(&[(1, 1000), (2, 500), (3, 10), (40, 1)]));
        roundtrip(&table, &[1, 2, 3, 40, 1, 1, 2]);
    }

    #[test]
    fn test_escape_roundtrip() {
        let table = CodeTable::build(&counts_of(&[(1, 100), (2, 50)]));
        // Symbols the fit never saw, including negatives.
        roundtrip(&table, &[1, 999_999, -12_345, 2, i64::MAX]);
    }

    #[test]
    fn test_frequent_symbol_gets_shorter_code() {
        let table = CodeTable::build(&counts_of(&[(7, 1_000_000), (8, 1), (9, 1), (10, 1)]));
        let mut frequent = BitWriter::new();
        table.encode(&mut frequent, 7);
        let mut rare = BitWriter::new();
        table.encode(&mut rare, 10);
        assert!(frequent.finish().len() <= rare.finish().len());
    }

    #[test]
    fn test_single_symbol_table() {
        let table = CodeTable::build(&counts_of(&[(5, 42)]));
        roundtrip(&table, &[5, 5, 6]);
    }

    #[test]
    fn test_empty_counts_escape_only() {
        let table = CodeTable::build(&HashMap::new());
        roundtrip(&table, &[0, 17, -4]);
    }

    #[test]
    fn test_serde_roundtrip_preserves_codes() {
        let table = CodeTable::build(&counts_of(&[(1, 9), (2, 5), (3, 2), (4, 1)]));
        let json = serde_json::to_string(&table).unwrap();
        let back: CodeTable = serde_json::from_str(&json).unwrap();

        let mut w1 = BitWriter::new();
        let mut w2 = BitWriter::new();
        for v in [1i64, 2, 3, 4, 77] {
            table.encode(&mut w1, v);
            back.encode(&mut w2, v);
        }
        assert_eq!(w1.finish(), w2.finish());
    }

    #[test]
    fn test_large_alphabet() {
        let counts: HashMap<i64, u64> = (0..10_000).map(|i| (i, (i % 97 + 1) as u64)).collect();
        let table = CodeTable::build(&counts);
        roundtrip(&table, &[0, 5_000, 9_999, 10_001]);
    }
}
