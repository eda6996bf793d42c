//! Call generators for the block-fetch load tests.
//!
//! A generator only produces calls; [`generate_load_test`] sizes the pool from the rates and
//! durations and hands it to [`construct_load_test`].

use std::ops::RangeInclusive;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::json;

use crate::call::Call;
use crate::load_test::{
    AttackOptions, LoadTest, call_demand, construct_load_test, resolve_durations,
};
use crate::runner::{Error, Result};

pub const METHOD_GET_BLOCK_BY_NUMBER: &str = "eth_getBlockByNumber";
pub const METHOD_GET_BLOCK_BY_HASH: &str = "eth_getBlockByHash";

/// Produces a fixed number of call descriptors.
pub trait CallGenerator {
    fn generate(&mut self, count: usize) -> Vec<Call>;
}

/// Calls needed to feed attacks at `rates` for the matching `durations`.
pub fn estimate_call_count(rates: &[u64], durations: &[u64]) -> Result<u64> {
    if rates.len() != durations.len() {
        return Err(Error::config(format!(
            "`durations` has {} entries but `rates` has {}",
            durations.len(),
            rates.len()
        )));
    }
    call_demand(rates, durations)
}

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// `eth_getBlockByNumber` with block numbers drawn uniformly from `range`.
#[derive(Debug, Clone)]
pub struct BlockByNumberGenerator {
    range: RangeInclusive<u64>,
    full_transactions: bool,
    rng: StdRng,
}

impl BlockByNumberGenerator {
    pub fn new(range: RangeInclusive<u64>, seed: Option<u64>) -> Result<Self> {
        if range.is_empty() {
            return Err(Error::config(format!(
                "block range {}..={} is empty",
                range.start(),
                range.end()
            )));
        }
        Ok(Self {
            range,
            full_transactions: false,
            rng: rng_from(seed),
        })
    }

    #[must_use]
    pub fn with_full_transactions(mut self, full: bool) -> Self {
        self.full_transactions = full;
        self
    }
}

impl CallGenerator for BlockByNumberGenerator {
    fn generate(&mut self, count: usize) -> Vec<Call> {
        (0..count)
            .map(|_| {
                let block = self.rng.gen_range(self.range.clone());
                Call::new(
                    METHOD_GET_BLOCK_BY_NUMBER,
                    vec![json!(format!("0x{block:x}")), json!(self.full_transactions)],
                )
            })
            .collect()
    }
}

/// `eth_getBlockByHash` sampling (with replacement) from a fixed hash pool.
#[derive(Debug, Clone)]
pub struct BlockByHashGenerator {
    hashes: Vec<String>,
    full_transactions: bool,
    rng: StdRng,
}

impl BlockByHashGenerator {
    pub fn new(hashes: Vec<String>, seed: Option<u64>) -> Result<Self> {
        if hashes.is_empty() {
            return Err(Error::config("block hash pool must not be empty"));
        }
        Ok(Self {
            hashes,
            full_transactions: false,
            rng: rng_from(seed),
        })
    }

    #[must_use]
    pub fn with_full_transactions(mut self, full: bool) -> Self {
        self.full_transactions = full;
        self
    }
}

impl CallGenerator for BlockByHashGenerator {
    fn generate(&mut self, count: usize) -> Vec<Call> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            if let Some(hash) = self.hashes.choose(&mut self.rng) {
                out.push(Call::new(
                    METHOD_GET_BLOCK_BY_HASH,
                    vec![json!(hash), json!(self.full_transactions)],
                ));
            }
        }
        out
    }
}

/// Generate exactly as many calls as the attacks consume and build the load test.
pub fn generate_load_test(
    generator: &mut impl CallGenerator,
    rates: &[u64],
    duration: Option<u64>,
    durations: Option<&[u64]>,
    options: Option<AttackOptions>,
) -> Result<LoadTest> {
    let resolved = resolve_durations(rates, duration, durations)?;
    let count = estimate_call_count(rates, &resolved)?;
    let count = usize::try_from(count)
        .map_err(|_| Error::config("requested call count does not fit in memory"))?;

    let calls = generator.generate(count);
    construct_load_test(calls, rates, None, Some(&resolved), options)
}
