use crate::config::*;
use crate::gc::{candidates, GcPolicy, Policy};
use crate::nand::FlashArray;

/// Baseline: reclaim whichever block has the most invalid pages, with a fixed trigger.
pub struct GreedyPolicy {
    threshold: f64,
}

impl GreedyPolicy {
    pub fn new(threshold: f64) -> Self {
        GreedyPolicy { threshold }
    }
}

impl Default for GreedyPolicy {
    fn default() -> Self {
        GreedyPolicy::new(STATIC_GC_THRESHOLD)
    }
}

impl GcPolicy for GreedyPolicy {
    fn kind(&self) -> Policy {
        Policy::Baseline
    }

    fn select_victim(&self, flash: &FlashArray) -> Option<BlockId> {
        let mut victim: Option<(BlockId, Counter)> = None;
        for (idx, block) in candidates(flash) {
            // strict > keeps the lowest index on ties
            if victim.map_or(true, |(_, best)| block.invalid_pages() > best) {
                victim = Some((idx, block.invalid_pages()));
            }
        }
        victim.map(|(idx, _)| idx)
    }

    fn gc_threshold(&self) -> f64 {
        self.threshold
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn fill(flash: &mut FlashArray, block: BlockId, invalid: usize) {
        for page in 0..flash.pages_per_block() {
            flash.write_page(block, page, block * 100 + page).unwrap();
        }
        for page in 0..invalid {
            flash.invalidate_page(block, page).unwrap();
        }
    }

    #[test]
    fn picks_most_invalid_block() {
        let mut flash = FlashArray::new(&Geometry::new(4, 4, 0.25));
        fill(&mut flash, 0, 1);
        fill(&mut flash, 1, 3);
        fill(&mut flash, 3, 2);
        assert_eq!(GreedyPolicy::default().select_victim(&flash), Some(1));
    }

    #[test]
    fn ties_go_to_lowest_index() {
        let mut flash = FlashArray::new(&Geometry::new(4, 4, 0.0));
        fill(&mut flash, 2, 2);
        fill(&mut flash, 1, 2);
        fill(&mut flash, 3, 2);
        assert_eq!(GreedyPolicy::default().select_victim(&flash), Some(1));
    }

    #[test]
    fn overprovisioned_blocks_are_eligible() {
        let mut flash = FlashArray::new(&Geometry::new(4, 4, 0.25));
        fill(&mut flash, 0, 1);
        fill(&mut flash, 3, 4);
        assert!(flash.block(3).is_overprovisioned());
        assert_eq!(GreedyPolicy::default().select_victim(&flash), Some(3));
    }

    #[test]
    fn no_victim_without_invalid_pages() {
        let mut flash = FlashArray::new(&Geometry::new(2, 4, 0.0));
        fill(&mut flash, 0, 0);
        assert_eq!(GreedyPolicy::default().select_victim(&flash), None);
    }
}
