//! Persisting and replaying walker lineages.

use crate::agent::Walker;
use crate::chromosome::Chromosome;
use crate::config::SimParams;
use crate::error::{Error, Result};
use crate::snapshot::{AgentSnapshot, Lineage};
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_TRAJECTORY_FILE: &str = "trajectory.json";

/// A JSON file holding one lineage as an array of snapshots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrajectoryStore {
    path: PathBuf,
}

impl Default for TrajectoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_TRAJECTORY_FILE)
    }
}

impl TrajectoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `dir/trajectory-<n>.json` with a random `n`, so repeated runs do not
    /// overwrite each other.
    pub fn with_random_name<R: Rng>(rng: &mut R, dir: impl AsRef<Path>) -> Self {
        let n: u32 = rng.random();
        Self::new(dir.as_ref().join(format!("trajectory-{n}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, lineage: &[AgentSnapshot]) -> Result<()> {
        let json = to_json(lineage)?;
        fs::write(&self.path, json).map_err(|source| Error::Persistence {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), snapshots = lineage.len(), "saved trajectory");
        Ok(())
    }

    pub fn load(&self) -> Result<Lineage> {
        let json = fs::read_to_string(&self.path).map_err(|source| Error::Persistence {
            path: self.path.clone(),
            source,
        })?;
        from_json(&json)
    }
}

pub fn to_json(lineage: &[AgentSnapshot]) -> Result<String> {
    Ok(serde_json::to_string_pretty(lineage)?)
}

pub fn from_json(json: &str) -> Result<Lineage> {
    Ok(serde_json::from_str(json)?)
}

/// Re-simulates a lineage from its first snapshot.
///
/// Interval `i` is driven by the setpoints recorded in snapshot `i + 1`,
/// since a snapshot stores the motor targets that were in force when it was
/// captured. The returned walker carries the replayed lineage. Replay runs
/// without the rebuilds a bred lineage went through, so positions can drift
/// from the recording where a rebuild dropped linear velocity.
pub fn replay(lineage: &[AgentSnapshot], params: &SimParams) -> Result<Walker> {
    let Some(first) = lineage.first() else {
        return Err(Error::Configuration("cannot replay an empty lineage".into()));
    };
    let mut walker = Walker::from_lineage(std::slice::from_ref(first))?;
    for snapshot in &lineage[1..] {
        walker.set_motor_speeds(&Chromosome::new(snapshot.motor_setpoints))?;
        walker.advance(params)?;
    }
    Ok(walker)
}
