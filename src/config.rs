//! How a run is set up: which barrier it synchronizes with and where its workers are placed.

use crate::barrier::BarrierKind;
use crate::types::WorkerIndex;
use core_affinity::CoreId;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Selects the [BarrierKind]: `blocking` or `spin`.
pub const BARRIER_ENV: &str = "SUPERSTEP_BARRIER";

/// A whitespace- or comma-separated list of core ids, the i-th of which worker i is pinned to.
pub const PINNING_ENV: &str = "SUPERSTEP_PINNING";

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RunConfig {
    barrier: BarrierKind,
    pinning: Option<Vec<usize>>,
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read [BARRIER_ENV] and [PINNING_ENV]. Values which do not parse are reported and ignored.
    pub fn from_env() -> Self {
        let barrier: BarrierKind = std::env::var(BARRIER_ENV)
            .ok()
            .map(|value| parse_barrier(&value))
            .unwrap_or_default();
        let pinning: Option<Vec<usize>> = std::env::var(PINNING_ENV)
            .ok()
            .and_then(|value| parse_pinning(&value));
        Self { barrier, pinning }
    }

    pub fn with_barrier(mut self, barrier: BarrierKind) -> Self {
        self.barrier = barrier;
        self
    }

    /// Pin worker i to the core with id `pinning[i]`.
    pub fn with_pinning(mut self, pinning: Vec<usize>) -> Self {
        self.pinning = Some(pinning);
        self
    }

    pub fn barrier(&self) -> BarrierKind {
        self.barrier
    }

    pub fn pinning(&self) -> Option<&[usize]> {
        self.pinning.as_deref()
    }

    /// Turn the pinning map into one core per worker.
    ///
    /// Returns `None`, after logging why, if the map cannot be honoured; the run then proceeds
    /// without pinning.
    pub(crate) fn placement(&self, workers: usize) -> Option<Vec<CoreId>> {
        let available: Vec<CoreId> = core_affinity::get_core_ids().unwrap_or_default();
        if workers > available.len() {
            warn!(
                "{workers} workers were requested while only {} hardware contexts are available",
                available.len()
            );
        }

        let pinning: &[usize] = self.pinning.as_deref()?;
        resolve_placement(pinning, workers, &available)
    }
}

fn parse_barrier(value: &str) -> BarrierKind {
    value.parse().unwrap_or_else(|error| {
        warn!("{error} Falling back to the {:?} barrier", BarrierKind::default());
        BarrierKind::default()
    })
}

fn parse_pinning(value: &str) -> Option<Vec<usize>> {
    let parsed: Result<Vec<usize>, _> = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|entry| !entry.is_empty())
        .map(str::parse::<usize>)
        .collect();
    match parsed {
        Ok(pinning) if !pinning.is_empty() => Some(pinning),
        Ok(_) => None,
        Err(error) => {
            warn!("ignoring the malformed pinning map '{value}': {error}");
            None
        }
    }
}

fn resolve_placement(
    pinning: &[usize],
    workers: usize,
    available: &[CoreId],
) -> Option<Vec<CoreId>> {
    if pinning.len() < workers {
        warn!(
            "the pinning map has {} entries for {workers} workers; not pinning",
            pinning.len()
        );
        return None;
    }

    let mut seen: BTreeSet<usize> = BTreeSet::new();
    let mut placement: Vec<CoreId> = Vec::with_capacity(workers);
    for (worker, &core) in pinning.iter().take(workers).enumerate() {
        if !seen.insert(core) {
            warn!("core {core} appears more than once in the pinning map; not pinning");
            return None;
        }
        let Some(core_id) = available.iter().find(|core_id| core_id.id == core) else {
            warn!("worker {worker} is mapped to core {core}, which is not available; not pinning");
            return None;
        };
        placement.push(*core_id);
    }
    Some(placement)
}

/// Pin the calling thread as `worker`'s placement says.
pub(crate) fn pin(worker: WorkerIndex, placement: Option<&[CoreId]>) {
    let Some(core_id) = placement.and_then(|placement| placement.get(worker)) else {
        return;
    };
    if core_affinity::set_for_current(*core_id) {
        debug!("worker {worker}: pinned to core {}", core_id.id);
    } else {
        warn!("worker {worker}: could not pin to core {}", core_id.id);
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_barrier, parse_pinning, resolve_placement, RunConfig};
    use crate::barrier::BarrierKind;
    use core_affinity::CoreId;
    use test_log::test;

    fn cores(ids: &[usize]) -> Vec<CoreId> {
        ids.iter().map(|&id| CoreId { id }).collect()
    }

    #[test]
    fn test_builder() {
        let config: RunConfig = RunConfig::new()
            .with_barrier(BarrierKind::Spin)
            .with_pinning(vec![1, 0]);
        assert_eq!(config.barrier(), BarrierKind::Spin);
        assert_eq!(config.pinning(), Some(&[1, 0][..]));
        assert_eq!(RunConfig::default().barrier(), BarrierKind::Blocking);
    }

    #[test]
    fn test_malformed_values_fall_back_to_defaults() {
        assert_eq!(parse_barrier("spin"), BarrierKind::Spin);
        assert_eq!(parse_barrier("turbo"), BarrierKind::Blocking);

        assert_eq!(parse_pinning("0 2, 4"), Some(vec![0, 2, 4]));
        assert_eq!(parse_pinning("0 two 4"), None);
        assert_eq!(parse_pinning("  "), None);
    }

    #[test]
    fn test_placement_validation() {
        let available: Vec<CoreId> = cores(&[0, 1, 2, 3]);

        let placement: Option<Vec<CoreId>> = resolve_placement(&[3, 1, 2], 2, &available);
        assert_eq!(
            placement.map(|cores| cores.iter().map(|core| core.id).collect::<Vec<_>>()),
            Some(vec![3, 1])
        );

        assert!(resolve_placement(&[0], 2, &available).is_none());
        assert!(resolve_placement(&[1, 1], 2, &available).is_none());
        assert!(resolve_placement(&[0, 9], 2, &available).is_none());
    }
}
