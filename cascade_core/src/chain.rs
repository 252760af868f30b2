//! Multi-wave chain-reaction simulation.
//!
//! Waves run strictly in sequence because wave N+1 is seeded from wave N's
//! events. Inside one wave the triggers are independent and are analysed in
//! parallel, then merged back in trigger order so the output is deterministic.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use cascade_schema::{CascadeEvent, CascadeTrigger, CascadeWave, TerritoryId};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::classifier::sanitize_magnitude;
use crate::config::CascadeConfig;
use crate::metrics::CascadeMetrics;
use crate::network::TerritoryNetwork;
use crate::propagation::{analyze, CascadeRequest};

/// One pending trigger for the next wave.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainTrigger {
    pub territory: TerritoryId,
    pub trigger: CascadeTrigger,
    pub magnitude: f64,
}

pub struct ChainSimulator<'a> {
    network: &'a TerritoryNetwork,
    config: &'a CascadeConfig,
    metrics: Option<&'a CascadeMetrics>,
}

impl<'a> ChainSimulator<'a> {
    pub fn new(network: &'a TerritoryNetwork, config: &'a CascadeConfig) -> Self {
        Self {
            network,
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: &'a CascadeMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run up to `max_waves` waves from the initial trigger. Every territory
    /// triggers at most once per run, the initial source included.
    pub fn run(&self, initial: ChainTrigger, max_waves: usize, sequence: &AtomicU64) -> Vec<CascadeWave> {
        let started = Instant::now();
        let mut visited = BTreeSet::from([initial.territory]);
        let mut current_magnitude = sanitize_magnitude(initial.magnitude);
        let mut triggers = vec![ChainTrigger {
            magnitude: current_magnitude,
            ..initial
        }];
        let mut waves = Vec::new();
        let mut wave_index = 0u32;

        while !triggers.is_empty()
            && current_magnitude >= self.config.min_expansion_magnitude
            && (wave_index as usize) < max_waves
        {
            let events = self.run_wave(&triggers, sequence);

            let mut next = Vec::new();
            for event in &events {
                for entry in &event.affected {
                    if entry.strategic_value_delta > self.config.chain_delta_threshold
                        && visited.insert(entry.territory)
                    {
                        next.push(ChainTrigger {
                            territory: entry.territory,
                            trigger: CascadeTrigger::InfluenceThreshold,
                            magnitude: current_magnitude * self.config.chain_seed_decay,
                        });
                    }
                }
            }

            debug!(
                target: "cascade::chain",
                wave = wave_index,
                triggers = triggers.len(),
                events = events.len(),
                magnitude = current_magnitude,
                "chain.wave"
            );
            if !events.is_empty() {
                waves.push(CascadeWave {
                    index: wave_index,
                    magnitude: current_magnitude,
                    events,
                });
            }

            wave_index += 1;
            current_magnitude *= self.config.chain_wave_decay;
            triggers = next;
        }

        info!(
            target: "cascade::chain",
            source = %initial.territory,
            waves = waves.len(),
            events = waves.iter().map(|wave| wave.events.len()).sum::<usize>(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "chain.complete"
        );
        waves
    }

    fn run_wave(&self, triggers: &[ChainTrigger], sequence: &AtomicU64) -> Vec<CascadeEvent> {
        let first = sequence.fetch_add(triggers.len() as u64, Ordering::Relaxed);
        let analyses: Vec<_> = triggers
            .par_iter()
            .enumerate()
            .map(|(offset, trigger)| {
                analyze(
                    self.network,
                    self.config,
                    &CascadeRequest {
                        source: trigger.territory,
                        trigger: trigger.trigger,
                        magnitude: trigger.magnitude,
                        sequence: first + offset as u64,
                    },
                )
            })
            .collect();

        let mut events = Vec::new();
        for analysis in analyses {
            if let Some(metrics) = self.metrics {
                metrics.record_request(
                    analysis.elapsed,
                    analysis.events.len(),
                    analysis.budget_exceeded,
                );
            }
            events.extend(
                analysis
                    .events
                    .into_iter()
                    .filter(|event| event.probability > self.config.chain_probability_threshold),
            );
        }
        events
    }
}
