//! Mixer enumeration.
//!
//! Walks `/dev/mixer0 .. /dev/mixer{n-1}` one session at a time and returns
//! an owned snapshot of each mixer.

use tracing::{debug, warn};

use super::backend::{device_path, SoundSystem};
use super::device::{MixerError, MixerSnapshot};
use super::session::MixerSession;
use crate::platform::OssSystem;

/// Enumerates the mixers of a sound system.
#[derive(Debug, Clone, Default)]
pub struct MixerEnumerator<S> {
    system: S,
}

impl MixerEnumerator<OssSystem> {
    pub fn new() -> Self {
        Self { system: OssSystem }
    }
}

impl<S: SoundSystem + Clone> MixerEnumerator<S> {
    pub fn with_system(system: S) -> Self {
        Self { system }
    }

    /// Number of mixers in the system.
    pub fn count(&self) -> Result<u32, MixerError> {
        MixerSession::count_mixers_with(&self.system)
    }

    pub fn default_unit(&self) -> Result<u32, MixerError> {
        self.system.default_unit()
    }

    pub fn set_default_unit(&self, unit: u32) -> Result<(), MixerError> {
        self.system.set_default_unit(unit)
    }

    /// Open `unit`, copy its state and close it again.
    pub fn snapshot(&self, unit: u32) -> Result<MixerSnapshot, MixerError> {
        let path = device_path(unit);
        let session = MixerSession::open_with(self.system.clone(), Some(&path))?;
        let snapshot = session.snapshot();
        session.close()?;
        Ok(snapshot)
    }

    /// Snapshot every mixer in the system.
    ///
    /// Units that cannot be opened (detached cards leave gaps in the
    /// numbering) are skipped with a warning.
    pub fn get_mixers(&self) -> Result<Vec<MixerSnapshot>, MixerError> {
        let count = self.count()?;
        debug!(count, "enumerating mixers");

        let mut mixers = Vec::new();
        for unit in 0..count {
            match self.snapshot(unit) {
                Ok(snapshot) => mixers.push(snapshot),
                Err(err @ MixerError::Open { .. }) => {
                    warn!(unit, error = %err, "skipping mixer");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(mixers)
    }
}

/// Snapshot every OSS mixer in the system.
pub fn enumerate_mixers() -> Result<Vec<MixerSnapshot>, MixerError> {
    MixerEnumerator::new().get_mixers()
}
