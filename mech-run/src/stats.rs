use mech_core::{Serializer, Snapshot, SpaceVector};
use serde::Serialize;
use tracing::debug;

/// Aggregate figures of one snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct StepStats {
    pub step: u64,
    pub agents: usize,
    pub neighbor_edges: usize,
    pub springs: usize,
    pub mean_pressure: f64,
    pub max_speed: f64,
}

impl StepStats {
    pub fn from_snapshot<V: SpaceVector>(snapshot: &Snapshot<'_, V>) -> Self {
        let agents = snapshot.agents_count();
        let springs = snapshot.springs.iter().map(Vec::len).sum::<usize>() / 2;
        let mean_pressure = if snapshot.simple_pressure.is_empty() {
            0.0
        } else {
            snapshot.simple_pressure.iter().sum::<f64>() / snapshot.simple_pressure.len() as f64
        };
        let max_speed = snapshot
            .velocities
            .iter()
            .map(|v| v.length())
            .fold(0.0, f64::max);

        Self {
            step: snapshot.step,
            agents,
            neighbor_edges: snapshot.neighbor_edges().count(),
            springs,
            mean_pressure,
            max_speed,
        }
    }
}

/// Logs per-step statistics and keeps the latest ones.
#[derive(Debug, Default)]
pub struct StatsSerializer {
    last: Option<StepStats>,
}

impl StatsSerializer {
    pub fn last(&self) -> Option<&StepStats> {
        self.last.as_ref()
    }
}

impl<V: SpaceVector> Serializer<V> for StatsSerializer {
    fn serialize_one_timestep(&mut self, snapshot: &Snapshot<'_, V>) -> std::io::Result<()> {
        let stats = StepStats::from_snapshot(snapshot);
        debug!(
            step = stats.step,
            agents = stats.agents,
            neighbor_edges = stats.neighbor_edges,
            springs = stats.springs,
            mean_pressure = stats.mean_pressure,
            max_speed = stats.max_speed,
            "snapshot"
        );
        self.last = Some(stats);
        Ok(())
    }
}
