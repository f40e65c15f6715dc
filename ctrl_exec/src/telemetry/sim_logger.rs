//! Simulation output log
//!
//! Samples the data store once per logger period and appends a tab-separated record.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::path::Path;

use log::warn;
use util::archive::{ArchiveError, Archiver};

use crate::data_store::DataStore;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Simulation output file, relative to the archive root.
pub const SIM_OUTPUT_FILE: &str = "simulation_output.txt";

/// Columns of the simulation output, `x` and `y` being the sensed output point.
pub const SIM_OUTPUT_HEADER: [&str; 6] = ["t", "x", "y", "theta", "xref", "yref"];

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct SimLogger {
    archiver: Option<Archiver>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimLogger {
    /// Create the simulation output file in the given archive root.
    pub fn new(arch_root: &Path) -> Result<Self, ArchiveError> {
        let archiver = Archiver::from_path(arch_root, SIM_OUTPUT_FILE, b'\t', &SIM_OUTPUT_HEADER)?;

        Ok(Self {
            archiver: Some(archiver),
        })
    }

    /// A logger which samples nothing, used when the output file is unavailable.
    pub fn disabled() -> Self {
        Self { archiver: None }
    }

    /// Build one record from the current contents of the store.
    pub fn sample(ds: &DataStore) -> [f64; 6] {
        let t = ds.sim_time_s.read();
        let output = ds.output.read();
        let heading = ds.state.read()[2];
        let reference = ds.reference.read();

        [t, output[0], output[1], heading, reference[0], reference[1]]
    }

    /// Append the current record. A write failure disables the log for the rest of the run.
    pub fn log(&mut self, ds: &DataStore) {
        let result = match self.archiver {
            Some(ref mut arch) => arch.write_values(&Self::sample(ds)),
            None => return,
        };

        if let Err(e) = result {
            warn!("Disabling simulation output log: {}", e);
            self.archiver = None;
        }
    }
}

impl Drop for SimLogger {
    fn drop(&mut self) {
        if let Some(ref mut arch) = self.archiver {
            if let Err(e) = arch.flush() {
                warn!("Could not flush the simulation output log: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data_store::Gains;
    use nalgebra::{Vector2, Vector3};

    #[test]
    fn test_log_records() {
        let root = std::env::temp_dir().join(format!("sim_logger_test_{}", std::process::id()));

        let ds = DataStore::new(Vector3::new(0.0, 0.0, 0.5), Gains::new(1.0, 1.0), 0.3);
        ds.reference.write(Vector2::new(1.0, 2.0));
        ds.sim_time_s.write(0.25);

        {
            let mut logger = SimLogger::new(&root).unwrap();
            logger.log(&ds);
            logger.log(&ds);
        }

        let contents = std::fs::read_to_string(root.join(SIM_OUTPUT_FILE)).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "t\tx\ty\ttheta\txref\tyref");

        let fields: Vec<f64> = lines[1].split('\t').map(|f| f.parse().unwrap()).collect();
        assert_eq!(fields.len(), 6);
        assert!((fields[0] - 0.25).abs() < 1e-6);
        assert!((fields[3] - 0.5).abs() < 1e-6);
        assert!((fields[5] - 2.0).abs() < 1e-6);

        std::fs::remove_dir_all(root).ok();
    }
}
