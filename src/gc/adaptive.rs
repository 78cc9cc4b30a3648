//! Multi-objective victim selection with a self-tuning trigger.
//!
//! Every candidate block `b` is scored as
//!
//! ```text
//! efficiency(b) = invalid(b) / pages_per_block
//! migration(b)  = valid(b)   / pages_per_block
//! wear(b)       = 1 - erase_count(b) / max(max_erase_count, 1)
//! score(b)      = alpha * efficiency(b) - gamma * migration(b) + beta * wear(b)
//! ```
//!
//! and the highest score wins. The weights are owned by the policy and only the
//! [`TuningController`] touches them, once per tuning window of host writes. The same
//! controller's moving averages drive the GC trigger:
//!
//! ```text
//! threshold = clamp(base + k_waf * ema_waf - k_wear * ema_wear_variance)
//! ```

use log::*;
use num_integer::Integer;

use crate::config::*;
use crate::ftl::WriteCounters;
use crate::gc::{candidates, GcPolicy, Policy};
use crate::metrics::{self, MetricsSnapshot};
use crate::nand::FlashArray;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GcWeights {
    /// Efficiency (invalid pages) weight.
    pub alpha: f64,
    /// Wear-leveling weight.
    pub beta: f64,
    /// Migration-cost penalty weight.
    pub gamma: f64,
}

impl Default for GcWeights {
    fn default() -> Self {
        GcWeights {
            alpha: 1.0,
            beta: 1.0,
            gamma: 1.0,
        }
    }
}

impl GcWeights {
    fn clamp(&mut self, min: f64, max: f64) {
        self.alpha = self.alpha.clamp(min, max);
        self.beta = self.beta.clamp(min, max);
        self.gamma = self.gamma.clamp(min, max);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuningOutcome {
    Failsafe,
    Adjusted,
    Steady,
}

/// Feedback loop over smoothed WAF and wear variance.
#[derive(Debug, Clone)]
pub struct TuningController {
    params: TuningParams,
    ema_waf: f64,
    ema_wear_variance: f64,
    cycles: Counter,
    failsafe_trips: Counter,
}

impl TuningController {
    pub fn new(params: TuningParams) -> Self {
        TuningController {
            params,
            ema_waf: 1.0,
            ema_wear_variance: 0.0,
            cycles: 0,
            failsafe_trips: 0,
        }
    }

    pub fn params(&self) -> &TuningParams {
        &self.params
    }

    pub fn ema_waf(&self) -> f64 {
        self.ema_waf
    }

    pub fn ema_wear_variance(&self) -> f64 {
        self.ema_wear_variance
    }

    pub fn cycles(&self) -> Counter {
        self.cycles
    }

    pub fn failsafe_trips(&self) -> Counter {
        self.failsafe_trips
    }

    #[cfg(test)]
    pub(crate) fn set_averages(&mut self, ema_waf: f64, ema_wear_variance: f64) {
        self.ema_waf = ema_waf;
        self.ema_wear_variance = ema_wear_variance;
    }

    pub fn threshold(&self) -> f64 {
        let p = &self.params;
        let raw = p.base_threshold + p.k_waf * self.ema_waf - p.k_wear * self.ema_wear_variance;
        raw.clamp(p.min_threshold, p.max_threshold)
    }

    /// One control cycle: fold the readings into the averages, then adjust `weights`.
    pub fn tune(&mut self, weights: &mut GcWeights, reading: &MetricsSnapshot) -> TuningOutcome {
        let p = &self.params;
        self.ema_waf = (1.0 - p.smoothing) * self.ema_waf + p.smoothing * reading.waf;
        self.ema_wear_variance =
            (1.0 - p.smoothing) * self.ema_wear_variance + p.smoothing * reading.wear_variance;
        self.cycles += 1;

        if self.ema_waf > p.failsafe_waf {
            let (alpha, beta, gamma) = FAILSAFE_WEIGHTS;
            *weights = GcWeights { alpha, beta, gamma };
            self.failsafe_trips += 1;
            info!(
                "WAF failsafe tripped at cycle {} (ema_waf {:.3}), weights forced to {:?}",
                self.cycles, self.ema_waf, weights
            );
            return TuningOutcome::Failsafe;
        }

        let mut outcome = TuningOutcome::Steady;
        if self.ema_waf > p.target_waf {
            weights.alpha += p.step;
            weights.gamma += p.step;
            weights.beta -= p.step_small;
            outcome = TuningOutcome::Adjusted;
        }
        if self.ema_wear_variance > p.target_wear_variance {
            weights.beta += p.step;
            weights.alpha -= p.step_small;
            outcome = TuningOutcome::Adjusted;
        }
        weights.clamp(p.min_weight, p.max_weight);

        debug!(
            "tuning cycle {}: ema_waf {:.3} ema_wear_var {:.2} -> {:?}",
            self.cycles, self.ema_waf, self.ema_wear_variance, weights
        );
        outcome
    }
}

pub struct AdaptivePolicy {
    weights: GcWeights,
    tuner: TuningController,
    dynamic_threshold: f64,
}

impl AdaptivePolicy {
    pub fn new(params: TuningParams) -> Self {
        let tuner = TuningController::new(params);
        AdaptivePolicy {
            weights: GcWeights::default(),
            dynamic_threshold: tuner.threshold(),
            tuner,
        }
    }

    pub fn weights(&self) -> GcWeights {
        self.weights
    }

    pub fn tuner(&self) -> &TuningController {
        &self.tuner
    }

    #[cfg(test)]
    pub(crate) fn tuner_mut(&mut self) -> &mut TuningController {
        &mut self.tuner
    }

    pub fn score(&self, flash: &FlashArray, block: BlockId, max_erase: Counter) -> f64 {
        let b = flash.block(block);
        let ppb = flash.pages_per_block() as f64;
        let efficiency = b.invalid_pages() as f64 / ppb;
        let migration = b.valid_pages() as f64 / ppb;
        let wear = 1.0 - b.erase_count() as f64 / max_erase.max(1) as f64;

        let w = &self.weights;
        w.alpha * efficiency - w.gamma * migration + w.beta * wear
    }
}

impl Default for AdaptivePolicy {
    fn default() -> Self {
        AdaptivePolicy::new(TuningParams::default())
    }
}

impl GcPolicy for AdaptivePolicy {
    fn kind(&self) -> Policy {
        Policy::Adaptive
    }

    fn select_victim(&self, flash: &FlashArray) -> Option<BlockId> {
        let max_erase = flash.max_erase_count();
        let mut victim: Option<(BlockId, f64)> = None;
        for (idx, _) in candidates(flash) {
            let score = self.score(flash, idx, max_erase);
            if victim.map_or(true, |(_, best)| score > best) {
                victim = Some((idx, score));
            }
        }
        victim.map(|(idx, _)| idx)
    }

    fn gc_threshold(&self) -> f64 {
        self.dynamic_threshold
    }

    fn maybe_adjust_threshold(&mut self) {
        self.dynamic_threshold = self.tuner.threshold();
    }

    fn on_host_write(&mut self, flash: &FlashArray, counters: &WriteCounters) {
        let window = self.tuner.params().window;
        if counters.host_writes == 0 || !Integer::is_multiple_of(&counters.host_writes, &window) {
            return;
        }
        let reading = metrics::snapshot(flash, counters);
        self.tuner.tune(&mut self.weights, &reading);
    }

    fn as_adaptive(&self) -> Option<&AdaptivePolicy> {
        Some(self)
    }

    #[cfg(test)]
    fn as_adaptive_mut(&mut self) -> Option<&mut AdaptivePolicy> {
        Some(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn reading(waf: f64, wear_variance: f64) -> MetricsSnapshot {
        MetricsSnapshot {
            waf,
            wear_variance,
            lifetime_projection: 0.0,
            max_erase_count: 0,
            min_erase_count: 0,
            host_writes: 0,
            physical_writes: 0,
            gc_count: 0,
            free_pages: 0,
        }
    }

    #[test]
    fn failsafe_overrides_trend_rules() {
        let mut tuner = TuningController::new(TuningParams::default());
        let mut weights = GcWeights { alpha: 0.2, beta: 1.9, gamma: 0.3 };

        tuner.ema_waf = 40.0;
        tuner.ema_wear_variance = 500.0;
        assert_eq!(tuner.tune(&mut weights, &reading(1.0, 500.0)), TuningOutcome::Failsafe);
        assert_eq!(weights, GcWeights { alpha: 1.5, beta: 0.5, gamma: 1.5 });
        assert_eq!(tuner.failsafe_trips(), 1);
    }

    #[test]
    fn high_waf_raises_alpha_and_gamma() {
        let mut tuner = TuningController::new(TuningParams::default());
        let mut weights = GcWeights::default();
        tuner.ema_waf = 5.0;

        assert_eq!(tuner.tune(&mut weights, &reading(5.0, 0.0)), TuningOutcome::Adjusted);
        assert!((weights.alpha - 1.05).abs() < 1e-9);
        assert!((weights.gamma - 1.05).abs() < 1e-9);
        assert!((weights.beta - 0.99).abs() < 1e-9);
    }

    #[test]
    fn high_wear_variance_raises_beta() {
        let mut tuner = TuningController::new(TuningParams::default());
        let mut weights = GcWeights::default();

        // ema 0.8 * 0 + 0.2 * 200 = 40 > 20
        assert_eq!(tuner.tune(&mut weights, &reading(1.0, 200.0)), TuningOutcome::Adjusted);
        assert!((tuner.ema_wear_variance() - 40.0).abs() < 1e-9);
        assert!((weights.beta - 1.05).abs() < 1e-9);
        assert!((weights.alpha - 0.99).abs() < 1e-9);
        assert_eq!(weights.gamma, 1.0);
    }

    #[test]
    fn weights_stay_clamped() {
        let mut tuner = TuningController::new(TuningParams::default());
        let mut weights = GcWeights { alpha: 1.98, beta: 0.1, gamma: 1.99 };
        tuner.ema_waf = 5.5;

        for _ in 0..20 {
            tuner.tune(&mut weights, &reading(5.5, 0.0));
        }
        assert_eq!(weights.alpha, 2.0);
        assert_eq!(weights.gamma, 2.0);
        assert_eq!(weights.beta, 0.1);
    }

    #[test]
    fn calm_readings_leave_weights_alone() {
        let mut tuner = TuningController::new(TuningParams::default());
        let mut weights = GcWeights::default();
        assert_eq!(tuner.tune(&mut weights, &reading(1.0, 0.0)), TuningOutcome::Steady);
        assert_eq!(weights, GcWeights::default());
    }

    #[test]
    fn threshold_follows_formula_and_clamps() {
        let mut tuner = TuningController::new(TuningParams::default());
        assert!((tuner.threshold() - 0.03).abs() < 1e-12);

        tuner.ema_waf = 3.0;
        tuner.ema_wear_variance = 10.0;
        // 0.02 + 0.03 - 0.01
        assert!((tuner.threshold() - 0.04).abs() < 1e-12);

        tuner.ema_wear_variance = 1000.0;
        assert_eq!(tuner.threshold(), 0.02);

        tuner.ema_waf = 100.0;
        tuner.ema_wear_variance = 0.0;
        assert_eq!(tuner.threshold(), 0.5);
    }

    #[test]
    fn score_prefers_cheap_and_young_blocks() {
        let mut flash = FlashArray::new(&Geometry::new(3, 4, 0.0));
        for block in 0..2 {
            for page in 0..4 {
                flash.write_page(block, page, block * 4 + page).unwrap();
            }
        }
        flash.invalidate_page(0, 0).unwrap();
        flash.invalidate_page(1, 0).unwrap();
        flash.invalidate_page(1, 1).unwrap();
        flash.erase_block(2);

        let policy = AdaptivePolicy::default();
        // max erase 1, blocks 0 and 1 unworn
        assert!((policy.score(&flash, 0, 1) - (0.25 - 0.75 + 1.0)).abs() < 1e-12);
        assert!((policy.score(&flash, 1, 1) - (0.5 - 0.5 + 1.0)).abs() < 1e-12);
        assert_eq!(policy.select_victim(&flash), Some(1));
    }

    #[test]
    fn worn_block_loses_to_young_one() {
        let mut flash = FlashArray::new(&Geometry::new(2, 4, 0.0));
        for _ in 0..3 {
            flash.erase_block(0);
        }
        for block in 0..2 {
            for page in 0..4 {
                flash.write_page(block, page, block * 4 + page).unwrap();
            }
            flash.invalidate_page(block, 0).unwrap();
        }
        flash.invalidate_page(0, 1).unwrap();

        // block 0: 0.5 - 0.5 + 0 = 0; block 1: 0.25 - 0.75 + 1 = 0.5
        assert_eq!(AdaptivePolicy::default().select_victim(&flash), Some(1));
    }

    #[test]
    fn equal_scores_go_to_lowest_index() {
        let mut flash = FlashArray::new(&Geometry::new(3, 4, 0.0));
        for block in 0..3 {
            for page in 0..4 {
                flash.write_page(block, page, block * 4 + page).unwrap();
            }
            flash.invalidate_page(block, 0).unwrap();
        }
        // blocks 1 and 2 are identical and beat block 0
        flash.invalidate_page(1, 1).unwrap();
        flash.invalidate_page(2, 3).unwrap();

        let policy = AdaptivePolicy::default();
        assert_eq!(policy.score(&flash, 1, 0), policy.score(&flash, 2, 0));
        assert!(policy.score(&flash, 1, 0) > policy.score(&flash, 0, 0));
        assert_eq!(policy.select_victim(&flash), Some(1));
    }

    #[test]
    fn tunes_once_per_window() {
        let flash = FlashArray::new(&Geometry::new(2, 4, 0.0));
        let mut policy = AdaptivePolicy::default();
        let mut counters = WriteCounters::default();

        for n in 1..=2500 {
            counters.host_writes = n;
            counters.physical_writes = n;
            policy.on_host_write(&flash, &counters);
        }
        assert_eq!(policy.tuner().cycles(), 2);
    }
}
