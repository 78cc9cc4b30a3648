pub type BaseType = usize;

pub type Lba = BaseType;
pub type PageId = BaseType;
pub type BlockId = BaseType;
pub type Counter = BaseType;

pub const BLOCKS: BaseType = 50;
pub const PAGES_PER_BLOCK: BaseType = 64;
pub const OP_RATIO: f64 = 0.10;

pub const PAGE_SIZE: BaseType = 4096;

// P/E cycles a block survives before it is considered worn out
pub const MAX_ERASE_LIMIT: Counter = 10_000;

pub const STATIC_GC_THRESHOLD: f64 = 0.03;

pub const TUNING_WINDOW: Counter = 1000;
pub const BASE_GC_THRESHOLD: f64 = 0.02;
pub const K_WAF: f64 = 0.01;
pub const K_WEAR: f64 = 0.001;
pub const MIN_GC_THRESHOLD: f64 = 0.02;
pub const MAX_GC_THRESHOLD: f64 = 0.5;

pub const EMA_SMOOTHING: f64 = 0.2;
pub const TARGET_WAF: f64 = 4.0;
pub const TARGET_WEAR_VARIANCE: f64 = 20.0;
pub const WEIGHT_STEP: f64 = 0.05;
pub const WEIGHT_STEP_SMALL: f64 = 0.01;
pub const MIN_WEIGHT: f64 = 0.1;
pub const MAX_WEIGHT: f64 = 2.0;

pub const FAILSAFE_WAF: f64 = 6.0;
// (alpha, beta, gamma) forced when the failsafe trips
pub const FAILSAFE_WEIGHTS: (f64, f64, f64) = (1.5, 0.5, 1.5);

/// Physical shape of a simulated device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub blocks: BaseType,
    pub pages_per_block: BaseType,
    /// Fraction of blocks reserved as overprovisioning, in `[0, 1)`.
    pub overprovision_ratio: f64,
}

impl Geometry {
    pub fn new(blocks: BaseType, pages_per_block: BaseType, overprovision_ratio: f64) -> Self {
        Geometry {
            blocks,
            pages_per_block,
            overprovision_ratio,
        }
    }

    pub fn overprovisioned_blocks(&self) -> BaseType {
        (self.blocks as f64 * self.overprovision_ratio).floor() as BaseType
    }

    pub fn total_pages(&self) -> BaseType {
        self.blocks * self.pages_per_block
    }

    /// Pages reachable by host writes; this is also the logical capacity in LBAs.
    pub fn host_pages(&self) -> BaseType {
        (self.blocks - self.overprovisioned_blocks()) * self.pages_per_block
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Geometry::new(BLOCKS, PAGES_PER_BLOCK, OP_RATIO)
    }
}

/// Constants of the adaptive policy's threshold formula and tuning controller.
#[derive(Debug, Clone, PartialEq)]
pub struct TuningParams {
    pub window: Counter,
    pub base_threshold: f64,
    pub k_waf: f64,
    pub k_wear: f64,
    pub min_threshold: f64,
    pub max_threshold: f64,
    pub smoothing: f64,
    pub target_waf: f64,
    pub target_wear_variance: f64,
    pub step: f64,
    pub step_small: f64,
    pub min_weight: f64,
    pub max_weight: f64,
    pub failsafe_waf: f64,
}

impl Default for TuningParams {
    fn default() -> Self {
        TuningParams {
            window: TUNING_WINDOW,
            base_threshold: BASE_GC_THRESHOLD,
            k_waf: K_WAF,
            k_wear: K_WEAR,
            min_threshold: MIN_GC_THRESHOLD,
            max_threshold: MAX_GC_THRESHOLD,
            smoothing: EMA_SMOOTHING,
            target_waf: TARGET_WAF,
            target_wear_variance: TARGET_WEAR_VARIANCE,
            step: WEIGHT_STEP,
            step_small: WEIGHT_STEP_SMALL,
            min_weight: MIN_WEIGHT,
            max_weight: MAX_WEIGHT,
            failsafe_waf: FAILSAFE_WAF,
        }
    }
}
