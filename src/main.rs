#[macro_use]
extern crate log;
extern crate simplelog;

use adaptive_ftl::config::*;
use adaptive_ftl::{Ftl, MetricsSnapshot, Policy, Workload};
use simplelog::*;
use time::macros::format_description;

const NUM_WRITES: usize = 100_000;
const SEED: u64 = 7;

fn run(policy: Policy, workload: Workload) -> adaptive_ftl::Result<MetricsSnapshot> {
    let mut fw = Ftl::new_with_op(OP_RATIO * 100., policy)?;
    let max_lba = fw.get_max_lba();

    for (i, lba) in workload.stream(max_lba, SEED).take(NUM_WRITES).enumerate() {
        if let Err(e) = fw.write(lba) {
            error!("{} stopped at write {}: {}", policy, i, e);
            break;
        }
    }

    let summary = fw.snapshot_metrics();
    info!("{:<14} {}", fw.policy_kind().to_string(), summary);
    if let Some(adaptive) = fw.adaptive() {
        let w = adaptive.weights();
        info!(
            "{:<14} alpha={:.2} beta={:.2} gamma={:.2} threshold={:.3} failsafe_trips={}",
            "", w.alpha, w.beta, w.gamma, fw.gc_threshold(), adaptive.tuner().failsafe_trips()
        );
    }
    Ok(summary)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let log_cfg = ConfigBuilder::new()
        .set_time_format_custom(format_description!("[hour]:[minute]:[second].[subsecond]"))
        .build();

    SimpleLogger::init(LevelFilter::Info, log_cfg)?;

    info!("Blocks: {} | Pages/Block: {} | OP: {:.0}% | Writes: {}", BLOCKS, PAGES_PER_BLOCK, OP_RATIO * 100., NUM_WRITES);

    for workload in [Workload::Sequential, Workload::Random, Workload::hotspot_80_20()] {
        info!("Workload: {}", workload);
        let base = run(Policy::Baseline, workload)?;
        let adpt = run(Policy::Adaptive, workload)?;
        info!(
            "WAF delta {:+.1}%, wear variance {:.2} -> {:.2}",
            (adpt.waf - base.waf) / base.waf * 100.,
            base.wear_variance,
            adpt.wear_variance
        );
    }

    Ok(())
}
