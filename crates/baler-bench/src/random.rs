//! Seeded TPC-C random source: uniform draws, NURand, names, and the
//! corpus-backed string columns.

use std::fs;
use std::path::Path;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// TPC-C 4.3.2.3 last-name syllables.
const SYLLABLES: [&str; 10] =
    ["BAR", "OUGHT", "ABLE", "PRI", "PRES", "ESE", "ANTI", "CALLY", "ATION", "EING"];

/// Constant C values for the NURand function, TPC-C 2.1.6.
#[derive(Debug, Clone, Copy, Default)]
pub struct NuRandC {
    pub c_last: i32,
    pub c_id: i32,
    pub ol_i_id: i32,
}

impl NuRandC {
    pub fn make_random(random: &mut TpccRandom) -> Self {
        Self {
            c_last: random.number(0, 255),
            c_id: random.number(0, 1023),
            ol_i_id: random.number(0, 8191),
        }
    }

    /// Run-time constants constrained against the load-time ones,
    /// TPC-C 2.1.6.1: the c_last delta must land in [65, 119] and avoid
    /// 96 and 112.
    pub fn make_random_for_run(random: &mut TpccRandom, c_load: &NuRandC) -> Self {
        let mut c = Self::make_random(random);
        loop {
            let delta = (c_load.c_last - c.c_last).abs();
            if (65..=119).contains(&delta) && delta != 96 && delta != 112 {
                break;
            }
            c.c_last = random.number(0, 255);
        }
        c
    }
}

/// Line-delimited word lists for the data columns the generator cannot
/// synthesise uniformly. Files are read from a corpus directory when one
/// is given; otherwise small built-in lists stand in.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub stock_data: Vec<String>,
    pub first_names: Vec<String>,
    pub streets: Vec<String>,
    pub cities: Vec<String>,
    pub states: Vec<String>,
    pub zips: Vec<String>,
}

fn load_list(dir: &Path, file: &str) -> Option<Vec<String>> {
    let text = fs::read_to_string(dir.join(file)).ok()?;
    let lines: Vec<String> =
        text.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_owned).collect();
    if lines.is_empty() { None } else { Some(lines) }
}

fn builtin(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Corpus {
    pub fn load(dir: Option<&Path>) -> Self {
        let fallback = Self::builtin();
        let Some(dir) = dir else {
            return fallback;
        };
        debug!(dir = %dir.display(), "loading corpora");
        Self {
            stock_data: load_list(dir, "stock_data.txt").unwrap_or(fallback.stock_data),
            first_names: load_list(dir, "first_names.txt").unwrap_or(fallback.first_names),
            streets: load_list(dir, "streets.txt").unwrap_or(fallback.streets),
            cities: load_list(dir, "cities.txt").unwrap_or(fallback.cities),
            states: load_list(dir, "states.txt").unwrap_or(fallback.states),
            zips: load_list(dir, "zips.txt").unwrap_or(fallback.zips),
        }
    }

    pub fn builtin() -> Self {
        Self {
            stock_data: builtin(&[
                "assorted", "widgets", "fasteners", "premium", "surplus", "restock", "vintage",
                "bulk", "crated", "palletised", "fragile", "imported", "domestic", "seasonal",
                "clearance", "standard", "deluxe", "economy", "industrial", "household",
                "hardware", "textile", "ceramic", "plastic", "timber", "steel", "copper",
                "brass", "rubber", "glass", "paper", "foam", "painted", "coated", "polished",
                "rough", "fine", "heavy", "light", "compact",
            ]),
            first_names: builtin(&[
                "JAMES", "MARY", "ROBERT", "PATRICIA", "JOHN", "JENNIFER", "MICHAEL", "LINDA",
                "DAVID", "ELIZABETH", "WILLIAM", "BARBARA", "RICHARD", "SUSAN", "JOSEPH",
                "JESSICA", "THOMAS", "SARAH", "CHARLES", "KAREN", "CHRISTOPHER", "LISA",
                "DANIEL", "NANCY", "MATTHEW", "BETTY", "ANTHONY", "MARGARET", "MARK", "SANDRA",
            ]),
            streets: builtin(&[
                "Maple Street", "Oak Avenue", "Cedar Lane", "Pine Road", "Elm Drive",
                "Willow Way", "Birch Court", "Ash Boulevard", "Walnut Place", "Chestnut Row",
                "Spruce Terrace", "Poplar Close", "Hickory Path", "Magnolia Walk",
                "Juniper Street", "Sycamore Avenue", "Laurel Lane", "Hawthorn Road",
                "Alder Drive", "Hazel Way",
            ]),
            cities: builtin(&[
                "Springfield", "Riverside", "Franklin", "Greenville", "Bristol", "Clinton",
                "Fairview", "Salem", "Madison", "Georgetown", "Arlington", "Ashland",
                "Burlington", "Manchester", "Milton", "Newport", "Oxford", "Winchester",
                "Clayton", "Dayton",
            ]),
            states: builtin(&[
                "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL",
                "IN", "IA", "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT",
                "NE", "NV", "NH", "NJ", "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI",
                "SC", "SD", "TN", "TX", "UT", "VT", "VA", "WA", "WV", "WI", "WY",
            ]),
            zips: builtin(&[
                "123411111", "057811111", "902101111", "334490111", "601110111", "750010111",
                "981040111", "303030111", "100010111", "441130111", "852010111", "972010111",
            ]),
        }
    }
}

/// The TPC-C random generator, deterministic for a given seed.
pub struct TpccRandom {
    rng: SmallRng,
    c_values: NuRandC,
    corpus: Corpus,
}

impl TpccRandom {
    pub fn new(seed: u64, corpus: Corpus) -> Self {
        Self { rng: SmallRng::seed_from_u64(seed), c_values: NuRandC::default(), corpus }
    }

    pub fn set_c(&mut self, c: NuRandC) {
        self.c_values = c;
    }

    /// Uniform integer in `[lower, upper]`, inclusive on both ends.
    pub fn number(&mut self, lower: i32, upper: i32) -> i32 {
        self.rng.gen_range(lower..=upper)
    }

    pub fn number_excluding(&mut self, lower: i32, upper: i32, excluding: i32) -> i32 {
        // Draw from a range one smaller and shift to skip the excluded
        // value without rejection.
        let n = self.number(lower, upper - 1);
        if n >= excluding { n + 1 } else { n }
    }

    /// Non-uniform random, TPC-C 2.1.6.
    pub fn nurand(&mut self, a: i32, x: i32, y: i32) -> i32 {
        let c = match a {
            255 => self.c_values.c_last,
            1023 => self.c_values.c_id,
            8191 => self.c_values.ol_i_id,
            _ => 0,
        };
        (((self.number(0, a) | self.number(x, y)) + c) % (y - x + 1)) + x
    }

    /// Random alphabetic string of length `[lower, upper]` over the first
    /// `cardinality` lowercase letters.
    pub fn astring(&mut self, lower: usize, upper: usize, cardinality: u8) -> String {
        let len = self.number(lower as i32, upper as i32) as usize;
        (0..len)
            .map(|_| (b'a' + self.rng.gen_range(0..cardinality)) as char)
            .collect()
    }

    /// Random numeric string of length `[lower, upper]`.
    pub fn nstring(&mut self, lower: usize, upper: usize) -> String {
        let len = self.number(lower as i32, upper as i32) as usize;
        (0..len).map(|_| (b'0' + self.rng.gen_range(0..10u8)) as char).collect()
    }

    /// Fixed-point decimal with `digits` fractional digits.
    pub fn fixed_point(&mut self, digits: u32, lower: f64, upper: f64) -> f64 {
        let multiplier = 10f64.powi(digits as i32);
        let int_lower = (lower * multiplier).round() as i32;
        let int_upper = (upper * multiplier).round() as i32;
        self.number(int_lower, int_upper) as f64 / multiplier
    }

    /// Random last name bounded by the loaded customer count.
    pub fn last_name(&mut self, max_cid: i32) -> String {
        let num = self.nurand(255, 0, 999.min(max_cid - 1));
        make_last_name(num)
    }

    /// Uniform random permutation of `[lower, upper]`.
    pub fn permutation(&mut self, lower: i32, upper: i32) -> Vec<i32> {
        let mut values: Vec<i32> = (lower..=upper).collect();
        for i in (1..values.len()).rev() {
            let j = self.rng.gen_range(0..=i);
            values.swap(i, j);
        }
        values
    }

    /// The synthetic district-info string every stock and order line
    /// carries; always exactly 24 bytes.
    pub fn dist_info(d_id: i32, w_id: i32, i_id: i32) -> String {
        format!("dist-info-str#{:02}#{:02}#{:04}", d_id, w_id % 100, i_id % 10_000)
    }

    /// Four corpus words, at most `upper_length` bytes in total.
    pub fn stock_data(&mut self, upper_length: usize) -> String {
        loop {
            let words: Vec<&str> = (0..4)
                .map(|_| {
                    let i = self.rng.gen_range(0..self.corpus.stock_data.len());
                    self.corpus.stock_data[i].as_str()
                })
                .collect();
            let joined = words.join(" ");
            if joined.len() <= upper_length {
                return joined;
            }
        }
    }

    fn pick(rng: &mut SmallRng, list: &[String]) -> String {
        list[rng.gen_range(0..list.len())].clone()
    }

    pub fn first_name(&mut self) -> String {
        Self::pick(&mut self.rng, &self.corpus.first_names)
    }

    pub fn street(&mut self) -> String {
        Self::pick(&mut self.rng, &self.corpus.streets)
    }

    pub fn city(&mut self) -> String {
        Self::pick(&mut self.rng, &self.corpus.cities)
    }

    pub fn state(&mut self) -> String {
        Self::pick(&mut self.rng, &self.corpus.states)
    }

    pub fn zip(&mut self) -> String {
        let i = self.rng.gen_range(0..self.corpus.zips.len());
        self.corpus.zips[i].clone()
    }
}

/// Deterministic last name for a three-digit number, TPC-C 4.3.2.3.
pub fn make_last_name(num: i32) -> String {
    debug_assert!((0..=999).contains(&num));
    let mut name = String::new();
    name.push_str(SYLLABLES[(num / 100) as usize]);
    name.push_str(SYLLABLES[(num / 10 % 10) as usize]);
    name.push_str(SYLLABLES[(num % 10) as usize]);
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random() -> TpccRandom {
        TpccRandom::new(0, Corpus::builtin())
    }

    #[test]
    fn test_number_bounds() {
        let mut r = random();
        for _ in 0..1000 {
            let n = r.number(3, 7);
            assert!((3..=7).contains(&n));
        }
        assert_eq!(r.number(5, 5), 5);
    }

    #[test]
    fn test_number_excluding() {
        let mut r = random();
        for _ in 0..1000 {
            let n = r.number_excluding(1, 10, 4);
            assert!((1..=10).contains(&n));
            assert_ne!(n, 4);
        }
    }

    #[test]
    fn test_nurand_bounds() {
        let mut r = random();
        r.set_c(NuRandC { c_last: 123, c_id: 259, ol_i_id: 4070 });
        for _ in 0..1000 {
            let n = r.nurand(8191, 1, 100_000);
            assert!((1..=100_000).contains(&n));
            let c = r.nurand(1023, 1, 3000);
            assert!((1..=3000).contains(&c));
        }
    }

    #[test]
    fn test_make_last_name() {
        assert_eq!(make_last_name(0), "BARBARBAR");
        assert_eq!(make_last_name(371), "PRIANTIOUGHT");
        assert_eq!(make_last_name(999), "EINGEINGEING");
    }

    #[test]
    fn test_permutation_is_complete() {
        let mut r = random();
        let mut p = r.permutation(1, 100);
        p.sort_unstable();
        let expected: Vec<i32> = (1..=100).collect();
        assert_eq!(p, expected);
    }

    #[test]
    fn test_fixed_point_digits() {
        let mut r = random();
        for _ in 0..100 {
            let v = r.fixed_point(2, 1.00, 100.00);
            assert!((1.0..=100.0).contains(&v));
            let cents = (v * 100.0).round();
            assert!((v * 100.0 - cents).abs() < 1e-9);
        }
    }

    #[test]
    fn test_deterministic_for_seed() {
        let mut a = TpccRandom::new(42, Corpus::builtin());
        let mut b = TpccRandom::new(42, Corpus::builtin());
        for _ in 0..100 {
            assert_eq!(a.number(0, 1_000_000), b.number(0, 1_000_000));
        }
    }

    #[test]
    fn test_run_constants_constrained() {
        let mut r = random();
        let load = NuRandC::make_random(&mut r);
        let run = NuRandC::make_random_for_run(&mut r, &load);
        let delta = (load.c_last - run.c_last).abs();
        assert!((65..=119).contains(&delta));
        assert_ne!(delta, 96);
        assert_ne!(delta, 112);
    }

    #[test]
    fn test_dist_info_is_24_bytes() {
        assert_eq!(TpccRandom::dist_info(1, 1, 1).len(), 24);
        assert_eq!(TpccRandom::dist_info(10, 999, 99_999).len(), 24);
    }

    #[test]
    fn test_stock_data_bounded() {
        let mut r = random();
        for _ in 0..100 {
            assert!(r.stock_data(42).len() <= 42);
        }
    }
}
