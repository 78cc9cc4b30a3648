//! Pure derivations over the device's counters. Nothing here mutates state, so a snapshot can be
//! taken at any point of a run.

use std::fmt;

use crate::config::*;
use crate::ftl::WriteCounters;
use crate::nand::FlashArray;

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub waf: f64,
    pub wear_variance: f64,
    /// Host writes the device is projected to absorb before its most worn block dies.
    pub lifetime_projection: f64,
    pub max_erase_count: Counter,
    pub min_erase_count: Counter,
    pub host_writes: Counter,
    pub physical_writes: Counter,
    pub gc_count: Counter,
    pub free_pages: Counter,
}

/// Physical writes per host write; 1.0 before the first host write.
pub fn waf(counters: &WriteCounters) -> f64 {
    if counters.host_writes == 0 {
        return 1.0;
    }
    counters.physical_writes as f64 / counters.host_writes as f64
}

/// Population variance of per-block erase counts.
pub fn wear_variance(flash: &FlashArray) -> f64 {
    let n = flash.block_count();
    if n == 0 {
        return 0.0;
    }
    let mean = flash.erase_counts().sum::<Counter>() as f64 / n as f64;
    flash
        .erase_counts()
        .map(|c| {
            let d = c as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n as f64
}

pub fn lifetime_projection(flash: &FlashArray, counters: &WriteCounters, erase_limit: Counter) -> f64 {
    let worst = flash.max_erase_count().max(1);
    (erase_limit as f64 / worst as f64) * counters.host_writes as f64
}

pub fn snapshot(flash: &FlashArray, counters: &WriteCounters) -> MetricsSnapshot {
    MetricsSnapshot {
        waf: waf(counters),
        wear_variance: wear_variance(flash),
        lifetime_projection: lifetime_projection(flash, counters, MAX_ERASE_LIMIT),
        max_erase_count: flash.max_erase_count(),
        min_erase_count: flash.min_erase_count(),
        host_writes: counters.host_writes,
        physical_writes: counters.physical_writes,
        gc_count: counters.gc_count,
        free_pages: flash.free_page_count(),
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "host={} nand={} WAF={:.3} wear_var={:.2} erase=[{}..{}] gc={} lifetime={:.0}",
            self.host_writes,
            self.physical_writes,
            self.waf,
            self.wear_variance,
            self.min_erase_count,
            self.max_erase_count,
            self.gc_count,
            self.lifetime_projection,
        )
    }
}
