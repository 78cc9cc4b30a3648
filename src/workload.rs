//! Seeded LBA streams for driving a device.

use std::fmt;

use rand::prelude::*;
use rand::rngs::SmallRng;

use crate::config::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Workload {
    /// `0, 1, 2, ...` wrapping at the logical capacity.
    Sequential,
    Random,
    /// `hot_ratio` of writes land in the first `hot_fraction` of the LBA space.
    Hotspot { hot_ratio: f64, hot_fraction: f64 },
    /// Coin flip between the sequential cursor and a random LBA.
    Mixed,
}

impl Workload {
    pub fn hotspot_80_20() -> Self {
        Workload::Hotspot {
            hot_ratio: 0.8,
            hot_fraction: 0.2,
        }
    }

    pub fn stream(self, max_lba: Lba, seed: u64) -> LbaStream {
        LbaStream {
            workload: self,
            capacity: max_lba + 1,
            cursor: 0,
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Workload::Sequential => write!(f, "Sequential"),
            Workload::Random => write!(f, "Random"),
            Workload::Hotspot { hot_ratio, hot_fraction } => write!(
                f,
                "Hotspot ({:.0}/{:.0})",
                hot_ratio * 100.,
                hot_fraction * 100.
            ),
            Workload::Mixed => write!(f, "Mixed"),
        }
    }
}

/// Endless iterator of LBAs in `0..=max_lba`.
pub struct LbaStream {
    workload: Workload,
    capacity: Counter,
    cursor: Lba,
    rng: SmallRng,
}

impl LbaStream {
    fn next_sequential(&mut self) -> Lba {
        let lba = self.cursor % self.capacity;
        self.cursor += 1;
        lba
    }
}

impl Iterator for LbaStream {
    type Item = Lba;

    fn next(&mut self) -> Option<Lba> {
        let lba = match self.workload {
            Workload::Sequential => self.next_sequential(),
            Workload::Random => self.rng.gen_range(0..self.capacity),
            Workload::Hotspot { hot_ratio, hot_fraction } => {
                let hot = (self.capacity as f64 * hot_fraction) as Counter;
                if hot > 0 && self.rng.gen_bool(hot_ratio) {
                    self.rng.gen_range(0..hot)
                } else if hot < self.capacity {
                    self.rng.gen_range(hot..self.capacity)
                } else {
                    self.rng.gen_range(0..self.capacity)
                }
            }
            Workload::Mixed => {
                if self.rng.gen_bool(0.5) {
                    self.next_sequential()
                } else {
                    self.rng.gen_range(0..self.capacity)
                }
            }
        };
        Some(lba)
    }
}
