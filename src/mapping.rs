use crate::config::*;
use crate::nand::PhysicalLocation;

#[derive(Clone, Copy, Debug, PartialEq, Eq)] // Copy for Vec resize
pub enum L2PValue {
    Unmapped,
    Mapped(PhysicalLocation),
}

/// Logical-to-physical table, indexed directly by LBA.
pub struct MappingTable {
    entries: Vec<L2PValue>,
    mapped: Counter,
}

impl MappingTable {
    pub fn new(logical_size: BaseType) -> Self {
        MappingTable {
            entries: vec![L2PValue::Unmapped; logical_size],
            mapped: 0,
        }
    }

    pub fn logical_size(&self) -> BaseType {
        self.entries.len()
    }

    pub fn get(&self, lba: Lba) -> Option<PhysicalLocation> {
        match self.entries.get(lba) {
            Some(L2PValue::Mapped(loc)) => Some(*loc),
            _ => None,
        }
    }

    /// Points `lba` at `loc`, returning the location it replaced.
    pub fn update(&mut self, lba: Lba, loc: PhysicalLocation) -> Option<PhysicalLocation> {
        let old = std::mem::replace(&mut self.entries[lba], L2PValue::Mapped(loc));
        match old {
            L2PValue::Mapped(prev) => Some(prev),
            L2PValue::Unmapped => {
                self.mapped += 1;
                None
            }
        }
    }

    pub fn unmap(&mut self, lba: Lba) -> Option<PhysicalLocation> {
        match std::mem::replace(&mut self.entries[lba], L2PValue::Unmapped) {
            L2PValue::Mapped(prev) => {
                self.mapped -= 1;
                Some(prev)
            }
            L2PValue::Unmapped => None,
        }
    }

    pub fn mapped_count(&self) -> Counter {
        self.mapped
    }

    pub fn iter(&self) -> impl Iterator<Item = (Lba, PhysicalLocation)> + '_ {
        self.entries.iter().enumerate().filter_map(|(lba, entry)| match entry {
            L2PValue::Mapped(loc) => Some((lba, *loc)),
            L2PValue::Unmapped => None,
        })
    }
}
