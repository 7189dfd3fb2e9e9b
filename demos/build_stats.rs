//! Walkthrough: per-phase counter collections feeding a run-wide
//! aggregate, with stopwatch scopes timing the simulated work.
//!
//! Run with: `cargo run --example build_stats`

use std::thread;
use std::time::Duration;

use tallies::{counter_enum, CounterCollection};

counter_enum! {
    pub enum BuildStats {
        PipsExecuted,
        CacheHits,
        CacheMisses as "CacheMissCount",
        ExecuteDuration: stopwatch,
    }
}

fn main() -> tallies::Result<()> {
    let totals = CounterCollection::<BuildStats>::new(None)?;

    for phase_name in ["parse", "execute"] {
        let phase = CounterCollection::new(Some(&totals))?;

        thread::scope(|scope| {
            for worker in 0..4 {
                let phase = &phase;
                scope.spawn(move || {
                    for pip in 0..25 {
                        let _timing = phase.start(BuildStats::ExecuteDuration).unwrap();
                        phase.increment(BuildStats::PipsExecuted).unwrap();
                        if (worker + pip) % 3 == 0 {
                            phase.increment(BuildStats::CacheMisses).unwrap();
                        } else {
                            phase.increment(BuildStats::CacheHits).unwrap();
                        }
                        thread::sleep(Duration::from_micros(200));
                    }
                });
            }
        });

        println!("=== phase `{phase_name}` ===");
        print!("{phase}");
        println!();

        for (name, value) in phase.statistics(Some(phase_name)) {
            println!("{name} = {value}");
        }
        println!();
    }

    println!("=== run totals ===");
    print!("{totals}");

    let before = totals.snapshot();
    totals.add(BuildStats::PipsExecuted, 5)?;
    println!(
        "\npips executed since snapshot: {}",
        totals.difference(&before, BuildStats::PipsExecuted)
    );

    Ok(())
}
