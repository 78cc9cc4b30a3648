//! Garbage-collection victim selection.
//!
//! A device holds exactly one [`GcPolicy`], picked at construction from [`Policy`]. The policy
//! decides *which* block to reclaim and *when* the free-space trigger fires; the migration and
//! erase sequence itself ([`reclaim`]) is shared by every policy.

pub mod adaptive;
pub mod greedy;

use std::fmt;

use log::*;

use crate::config::*;
use crate::error::{FtlError, Result};
use crate::ftl::WriteCounters;
use crate::mapping::MappingTable;
use crate::nand::{Block, FlashArray};

pub use adaptive::{AdaptivePolicy, GcWeights, TuningController};
pub use greedy::GreedyPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Baseline,
    Adaptive,
}

impl Policy {
    pub fn build(self) -> Box<dyn GcPolicy> {
        match self {
            Policy::Baseline => Box::new(GreedyPolicy::default()),
            Policy::Adaptive => Box::new(AdaptivePolicy::default()),
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Baseline => write!(f, "Baseline FTL"),
            Policy::Adaptive => write!(f, "Adaptive FTL"),
        }
    }
}

pub trait GcPolicy {
    fn kind(&self) -> Policy;

    /// Block to reclaim next, or `None` when no block would yield any space.
    fn select_victim(&self, flash: &FlashArray) -> Option<BlockId>;

    /// Free-page ratio below which the device runs one GC cycle.
    fn gc_threshold(&self) -> f64;

    /// Called before every trigger check.
    fn maybe_adjust_threshold(&mut self) {}

    /// Called after every completed host write.
    fn on_host_write(&mut self, _flash: &FlashArray, _counters: &WriteCounters) {}

    fn reclaim(
        &self,
        victim: BlockId,
        flash: &mut FlashArray,
        l2p: &mut MappingTable,
        counters: &mut WriteCounters,
    ) -> Result<Counter> {
        reclaim(victim, flash, l2p, counters)
    }

    fn as_adaptive(&self) -> Option<&AdaptivePolicy> {
        None
    }

    #[cfg(test)]
    fn as_adaptive_mut(&mut self) -> Option<&mut AdaptivePolicy> {
        None
    }
}

/// Moves every valid page out of `victim`, then erases it. Returns the number of migrated pages.
///
/// Space is checked up front, so a `NoMigrationSpace` failure leaves the victim untouched.
pub fn reclaim(
    victim: BlockId,
    flash: &mut FlashArray,
    l2p: &mut MappingTable,
    counters: &mut WriteCounters,
) -> Result<Counter> {
    let valid = flash.block(victim).valid_pages();
    let room = flash.free_pages_outside(victim);
    if room < valid {
        warn!("GC stuck on block {}: {} valid pages, {} free elsewhere", victim, valid, room);
        return Err(FtlError::NoMigrationSpace {
            block: victim,
            valid,
            free: room,
        });
    }

    let mut migrated = 0;
    for page in 0..flash.pages_per_block() {
        let Some(lba) = flash.block(victim).page(page).lba() else {
            continue;
        };
        let dst = flash.find_free_page_outside(victim).ok_or(FtlError::NoMigrationSpace {
            block: victim,
            valid: valid - migrated,
            free: 0,
        })?;

        flash.write_page(dst.block, dst.page, lba)?;
        flash.invalidate_page(victim, page)?;
        let old = l2p.update(lba, dst);
        debug_assert_eq!(old.map(|o| (o.block, o.page)), Some((victim, page)));

        counters.physical_writes += 1;
        migrated += 1;
    }

    flash.erase_block(victim);
    counters.gc_count += 1;
    counters.migrated_pages += migrated;

    trace!("GC reclaimed block {} migrating {} pages", victim, migrated);
    Ok(migrated)
}

/// Blocks worth reclaiming: at least one invalid page.
pub(crate) fn candidates(flash: &FlashArray) -> impl Iterator<Item = (BlockId, &Block)> {
    flash
        .blocks()
        .iter()
        .enumerate()
        .filter(|(_, b)| b.invalid_pages() > 0)
}
