use byte_unit::Byte;
use log::*;

use crate::config::*;
use crate::error::{FtlError, Result};
use crate::gc::{AdaptivePolicy, GcPolicy, Policy};
use crate::mapping::MappingTable;
use crate::metrics::{self, MetricsSnapshot};
use crate::nand::{FlashArray, Page, PhysicalLocation};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteCounters {
    pub host_writes: Counter,
    /// Host writes plus GC migrations.
    pub physical_writes: Counter,
    pub gc_count: Counter,
    pub migrated_pages: Counter,
}

pub struct Ftl {
    flash: FlashArray,
    l2p: MappingTable,
    policy: Box<dyn GcPolicy>,
    counters: WriteCounters,
    logical_size: Counter,
}

impl Ftl {
    pub fn new(geometry: Geometry, policy: Policy) -> Result<Self> {
        validate(&geometry)?;

        let logical_size = geometry.host_pages();
        let total = geometry.total_pages();

        trace!("{}: {} blocks x {} pages, {} overprovisioned", policy, geometry.blocks, geometry.pages_per_block, geometry.overprovisioned_blocks());
        trace!("Physical Capacity: {} bytes, {}", total * PAGE_SIZE, Byte::from_bytes((total * PAGE_SIZE) as _).get_appropriate_unit(true).to_string());
        trace!("User Capacity: {} bytes, {}", logical_size * PAGE_SIZE, Byte::from_bytes((logical_size * PAGE_SIZE) as _).get_appropriate_unit(true).to_string());

        Ok(Ftl {
            flash: FlashArray::new(&geometry),
            l2p: MappingTable::new(logical_size),
            policy: policy.build(),
            counters: WriteCounters::default(),
            logical_size,
        })
    }

    /// Default geometry with `op` percent of blocks held back.
    pub fn new_with_op(op: f64, policy: Policy) -> Result<Self> {
        let geometry = Geometry {
            overprovision_ratio: op / 100.,
            ..Geometry::default()
        };
        Ftl::new(geometry, policy)
    }

    pub fn get_max_lba(&self) -> Lba {
        self.logical_size - 1
    }

    pub fn logical_capacity(&self) -> Counter {
        self.logical_size
    }

    pub fn read(&self, lba: Lba) -> Result<PhysicalLocation> {
        self.l2p.get(lba).ok_or(FtlError::NotMapped { lba })
    }

    pub fn write(&mut self, lba: Lba) -> Result<PhysicalLocation> {
        self.check_lba(lba)?;
        self.maybe_trigger_gc()?;

        // retire the old copy before allocating, so a failed allocation never leaves two
        if let Some(old) = self.l2p.get(lba) {
            self.flash.invalidate_page(old.block, old.page)?;
            self.l2p.unmap(lba);
        }

        let loc = self.allocate_host_page(lba)?;
        self.flash.write_page(loc.block, loc.page, lba)?;
        let prev = self.l2p.update(lba, loc);
        debug_assert!(prev.is_none(), "LBA {} mapped twice", lba);

        self.counters.host_writes += 1;
        self.counters.physical_writes += 1;
        self.policy.on_host_write(&self.flash, &self.counters);

        Ok(loc)
    }

    /// Drops the mapping for `lba` and retires its page.
    pub fn trim(&mut self, lba: Lba) -> Result<()> {
        self.check_lba(lba)?;
        let old = self.l2p.unmap(lba).ok_or(FtlError::NotMapped { lba })?;
        self.flash.invalidate_page(old.block, old.page)?;
        Ok(())
    }

    /// Runs one GC cycle when free space is under the policy's threshold, or when no more
    /// than one block's worth of free pages is left.
    pub fn maybe_trigger_gc(&mut self) -> Result<bool> {
        self.policy.maybe_adjust_threshold();
        if self.flash.free_ratio() >= self.policy.gc_threshold()
            && self.flash.free_page_count() > self.flash.pages_per_block()
        {
            return Ok(false);
        }
        self.gc()
    }

    // @TODO: track host-writable free pages separately so forced GC can skip OP-only victims
    fn allocate_host_page(&mut self, lba: Lba) -> Result<PhysicalLocation> {
        let mut attempts = 0;
        loop {
            if let Some(loc) = self.flash.find_free_page(true) {
                return Ok(loc);
            }
            if attempts >= self.flash.block_count() || !self.gc()? {
                warn!("device full writing LBA {} after {} GC cycles", lba, attempts);
                return Err(FtlError::DeviceFull {
                    lba,
                    gc_attempts: attempts,
                    free_pages: self.flash.free_page_count(),
                });
            }
            attempts += 1;
        }
    }

    fn gc(&mut self) -> Result<bool> {
        let Some(victim) = self.policy.select_victim(&self.flash) else {
            trace!("GC found no block with invalid pages");
            return Ok(false);
        };

        trace!(
            "GC victim block {}: {} invalid, {} valid, erased {} times",
            victim,
            self.flash.block(victim).invalid_pages(),
            self.flash.block(victim).valid_pages(),
            self.flash.block(victim).erase_count()
        );
        self.policy
            .reclaim(victim, &mut self.flash, &mut self.l2p, &mut self.counters)?;
        Ok(true)
    }

    fn check_lba(&self, lba: Lba) -> Result<()> {
        if lba >= self.logical_size {
            return Err(FtlError::LbaOutOfRange {
                lba,
                capacity: self.logical_size,
            });
        }
        Ok(())
    }

    pub fn snapshot_metrics(&self) -> MetricsSnapshot {
        metrics::snapshot(&self.flash, &self.counters)
    }

    pub fn flash(&self) -> &FlashArray {
        &self.flash
    }

    pub fn counters(&self) -> &WriteCounters {
        &self.counters
    }

    pub fn policy_kind(&self) -> Policy {
        self.policy.kind()
    }

    pub fn adaptive(&self) -> Option<&AdaptivePolicy> {
        self.policy.as_adaptive()
    }

    #[cfg(test)]
    pub(crate) fn adaptive_mut(&mut self) -> Option<&mut AdaptivePolicy> {
        self.policy.as_adaptive_mut()
    }

    pub fn gc_threshold(&self) -> f64 {
        self.policy.gc_threshold()
    }

    pub fn mapped_count(&self) -> Counter {
        self.l2p.mapped_count()
    }

    /// Audits L2P/page consistency; the error names the first broken invariant.
    pub fn verify(&self) -> Result<()> {
        for (lba, loc) in self.l2p.iter() {
            let page = self.flash.block(loc.block).page(loc.page);
            if page.lba() != Some(lba) {
                return Err(FtlError::MappingMismatch {
                    lba,
                    block: loc.block,
                    page: loc.page,
                    state: page.state(),
                    held: page.lba(),
                });
            }
        }

        let valid = self.flash.valid_page_count();
        if valid != self.l2p.mapped_count() {
            return Err(FtlError::ValidCountMismatch {
                valid,
                mapped: self.l2p.mapped_count(),
            });
        }

        let counted: Counter = self.flash.blocks().iter().map(|b| b.free_pages()).sum();
        let scanned = self
            .flash
            .blocks()
            .iter()
            .flat_map(|b| b.pages())
            .filter(|p| **p == Page::Free)
            .count();
        let cached = self.flash.free_page_count();
        if counted != scanned || counted != cached {
            return Err(FtlError::FreeCountDrift {
                cached,
                counted,
                scanned,
            });
        }
        Ok(())
    }
}

fn validate(geometry: &Geometry) -> Result<()> {
    if geometry.blocks == 0 || geometry.pages_per_block == 0 {
        return Err(FtlError::InvalidGeometry(format!(
            "{} blocks x {} pages",
            geometry.blocks, geometry.pages_per_block
        )));
    }
    if !(0.0..1.0).contains(&geometry.overprovision_ratio) {
        return Err(FtlError::InvalidGeometry(format!(
            "overprovision ratio {} outside [0, 1)",
            geometry.overprovision_ratio
        )));
    }
    if geometry.host_pages() == 0 {
        return Err(FtlError::InvalidGeometry(format!(
            "no host-addressable block left with {} of {} blocks overprovisioned",
            geometry.overprovisioned_blocks(),
            geometry.blocks
        )));
    }
    Ok(())
}
