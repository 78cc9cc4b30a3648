use std::fmt;

use log::*;

use crate::config::*;
use crate::error::{FtlError, Result};

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum PageState {
    Free,
    Valid,
    Invalid,
}

/// A page carries its LBA only while it holds live data.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Page {
    Free,
    Valid(Lba),
    Invalid,
}

impl Page {
    pub fn state(&self) -> PageState {
        match self {
            Page::Free => PageState::Free,
            Page::Valid(_) => PageState::Valid,
            Page::Invalid => PageState::Invalid,
        }
    }

    pub fn lba(&self) -> Option<Lba> {
        match *self {
            Page::Valid(lba) => Some(lba),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysicalLocation {
    pub block: BlockId,
    pub page: PageId,
}

impl PhysicalLocation {
    pub fn new(block: BlockId, page: PageId) -> Self {
        PhysicalLocation { block, page }
    }
}

impl fmt::Display for PhysicalLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block {} page {}", self.block, self.page)
    }
}

#[derive(Clone, Debug)]
pub struct Block {
    pages: Vec<Page>,
    erase_count: Counter,
    is_overprovisioned: bool,
    valid_counter: Counter,
    invalid_counter: Counter,
}

impl Block {
    pub fn new(pages_per_block: BaseType, is_overprovisioned: bool) -> Self {
        Block {
            pages: vec![Page::Free; pages_per_block],
            erase_count: 0,
            is_overprovisioned,
            valid_counter: 0,
            invalid_counter: 0,
        }
    }

    pub fn page(&self, page: PageId) -> &Page {
        &self.pages[page]
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn erase_count(&self) -> Counter {
        self.erase_count
    }

    pub fn is_overprovisioned(&self) -> bool {
        self.is_overprovisioned
    }

    pub fn valid_pages(&self) -> Counter {
        self.valid_counter
    }

    pub fn invalid_pages(&self) -> Counter {
        self.invalid_counter
    }

    pub fn free_pages(&self) -> Counter {
        self.pages.len() - self.valid_counter - self.invalid_counter
    }

    fn first_free_page(&self) -> Option<PageId> {
        if self.free_pages() == 0 {
            return None;
        }
        self.pages.iter().position(|p| *p == Page::Free)
    }
}

/// The whole NAND array. Knows page and block states, nothing about what an LBA means.
pub struct FlashArray {
    blocks: Vec<Block>,
    pages_per_block: BaseType,
    free_counter: Counter,
}

impl FlashArray {
    pub fn new(geometry: &Geometry) -> Self {
        let op_blocks = geometry.overprovisioned_blocks();
        let first_op = geometry.blocks - op_blocks;
        let blocks = (0..geometry.blocks)
            .map(|idx| Block::new(geometry.pages_per_block, idx >= first_op))
            .collect();

        FlashArray {
            blocks,
            pages_per_block: geometry.pages_per_block,
            free_counter: geometry.total_pages(),
        }
    }

    pub fn write_page(&mut self, block_idx: BlockId, page_idx: PageId, lba: Lba) -> Result<()> {
        let block = &mut self.blocks[block_idx];
        let page = &mut block.pages[page_idx];
        if *page != Page::Free {
            return Err(FtlError::PageNotFree {
                block: block_idx,
                page: page_idx,
                state: page.state(),
            });
        }

        *page = Page::Valid(lba);
        block.valid_counter += 1;
        self.free_counter -= 1;
        Ok(())
    }

    /// Retires a live page and hands back the LBA it held.
    pub fn invalidate_page(&mut self, block_idx: BlockId, page_idx: PageId) -> Result<Lba> {
        let block = &mut self.blocks[block_idx];
        let page = &mut block.pages[page_idx];
        let Page::Valid(lba) = *page else {
            return Err(FtlError::PageNotValid {
                block: block_idx,
                page: page_idx,
                state: page.state(),
            });
        };

        *page = Page::Invalid;
        block.valid_counter -= 1;
        block.invalid_counter += 1;
        Ok(lba)
    }

    pub fn erase_block(&mut self, block_idx: BlockId) {
        let block = &mut self.blocks[block_idx];
        self.free_counter += block.valid_counter + block.invalid_counter;

        block.pages.iter_mut().for_each(|p| *p = Page::Free);
        block.valid_counter = 0;
        block.invalid_counter = 0;
        block.erase_count += 1;

        trace!("erased block {} (erase count {})", block_idx, block.erase_count);
    }

    /// First-fit scan. Host writes never land on overprovisioned blocks.
    pub fn find_free_page(&self, exclude_overprovisioned_for_host: bool) -> Option<PhysicalLocation> {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| !(exclude_overprovisioned_for_host && b.is_overprovisioned))
            .find_map(|(idx, b)| b.first_free_page().map(|page| PhysicalLocation::new(idx, page)))
    }

    /// Migration target scan: any block but the victim.
    pub fn find_free_page_outside(&self, victim: BlockId) -> Option<PhysicalLocation> {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != victim)
            .find_map(|(idx, b)| b.first_free_page().map(|page| PhysicalLocation::new(idx, page)))
    }

    pub fn free_pages_outside(&self, victim: BlockId) -> Counter {
        self.free_counter - self.blocks[victim].free_pages()
    }

    pub fn block(&self, block_idx: BlockId) -> &Block {
        &self.blocks[block_idx]
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block_count(&self) -> BaseType {
        self.blocks.len()
    }

    pub fn pages_per_block(&self) -> BaseType {
        self.pages_per_block
    }

    pub fn total_pages(&self) -> Counter {
        self.blocks.len() * self.pages_per_block
    }

    pub fn free_page_count(&self) -> Counter {
        self.free_counter
    }

    pub fn free_ratio(&self) -> f64 {
        self.free_counter as f64 / self.total_pages() as f64
    }

    pub fn valid_page_count(&self) -> Counter {
        self.blocks.iter().map(|b| b.valid_counter).sum()
    }

    pub fn erase_counts(&self) -> impl Iterator<Item = Counter> + '_ {
        self.blocks.iter().map(|b| b.erase_count)
    }

    pub fn max_erase_count(&self) -> Counter {
        self.erase_counts().max().unwrap_or(0)
    }

    pub fn min_erase_count(&self) -> Counter {
        self.erase_counts().min().unwrap_or(0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn small() -> FlashArray {
        FlashArray::new(&Geometry::new(4, 4, 0.25))
    }

    #[test]
    fn last_blocks_are_overprovisioned() {
        let flash = FlashArray::new(&Geometry::new(10, 8, 0.2));
        let op: Vec<bool> = flash.blocks().iter().map(|b| b.is_overprovisioned()).collect();
        assert_eq!(op.iter().filter(|o| **o).count(), 2);
        assert!(op[8] && op[9]);
        assert!(!op[7]);
    }

    #[test]
    fn program_requires_free_page() {
        let mut flash = small();
        flash.write_page(0, 0, 7).unwrap();
        assert_eq!(flash.block(0).page(0).lba(), Some(7));

        let err = flash.write_page(0, 0, 8).unwrap_err();
        assert_eq!(
            err,
            FtlError::PageNotFree { block: 0, page: 0, state: PageState::Valid }
        );

        flash.invalidate_page(0, 0).unwrap();
        assert!(matches!(
            flash.write_page(0, 0, 8),
            Err(FtlError::PageNotFree { state: PageState::Invalid, .. })
        ));
    }

    #[test]
    fn invalidate_requires_valid_page() {
        let mut flash = small();
        assert!(matches!(
            flash.invalidate_page(1, 2),
            Err(FtlError::PageNotValid { block: 1, page: 2, state: PageState::Free })
        ));

        flash.write_page(1, 2, 3).unwrap();
        assert_eq!(flash.invalidate_page(1, 2).unwrap(), 3);
        assert_eq!(*flash.block(1).page(2), Page::Invalid);
        assert!(flash.invalidate_page(1, 2).is_err());
    }

    #[test]
    fn erase_frees_every_page_and_counts_once() {
        let mut flash = small();
        flash.write_page(2, 0, 1).unwrap();
        flash.write_page(2, 1, 2).unwrap();
        flash.invalidate_page(2, 0).unwrap();
        assert_eq!(flash.free_page_count(), 14);

        flash.erase_block(2);
        assert!(flash.block(2).pages().iter().all(|p| *p == Page::Free));
        assert_eq!(flash.block(2).erase_count(), 1);
        assert_eq!(flash.block(2).valid_pages(), 0);
        assert_eq!(flash.block(2).invalid_pages(), 0);
        assert_eq!(flash.free_page_count(), 16);
    }

    #[test]
    fn erasing_free_block_only_bumps_erase_count() {
        let mut flash = small();
        flash.erase_block(0);
        flash.erase_block(0);
        assert_eq!(flash.block(0).erase_count(), 2);
        assert_eq!(flash.block(0).free_pages(), 4);
        assert_eq!(flash.free_page_count(), 16);
    }

    #[test]
    fn host_scan_skips_overprovisioned_blocks() {
        let mut flash = small();
        for block in 0..3 {
            for page in 0..4 {
                flash.write_page(block, page, block * 4 + page).unwrap();
            }
        }

        assert_eq!(flash.find_free_page(true), None);
        assert_eq!(flash.find_free_page(false), Some(PhysicalLocation::new(3, 0)));
    }

    #[test]
    fn migration_scan_skips_victim() {
        let mut flash = small();
        flash.write_page(0, 0, 0).unwrap();
        assert_eq!(flash.find_free_page_outside(0), Some(PhysicalLocation::new(1, 0)));
        assert_eq!(flash.free_pages_outside(0), 12);
    }
}
