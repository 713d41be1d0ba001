//! GNSS fixes keyed by recording second

use log::{debug, trace};
use std::collections::btree_map::{self, BTreeMap};
use std::path::Path;

use super::parser::{TelemetryReader, TelemetryRecord};
use crate::algorithms::projection::ProjectionRegistry;
use crate::core::{GnssSample, Marker};
use crate::validation::AlignmentResult;

/// Projected GNSS samples, one per whole second of the recording
#[derive(Debug, Clone, Default)]
pub struct GnssTrack {
    samples: BTreeMap<u32, GnssSample>,
}

impl GnssTrack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a sample under its second.
    ///
    /// A later sample for the same second replaces the earlier one; the
    /// replaced sample is returned.
    pub fn insert(&mut self, sample: GnssSample) -> Option<GnssSample> {
        let replaced = self.samples.insert(sample.timestamp_s, sample);
        if let Some(old) = &replaced {
            trace!("GNSS second {} recorded twice, keeping the later fix", old.timestamp_s);
        }
        replaced
    }

    /// Project telemetry records into `projection` and key them by second
    pub fn from_records<I>(records: I, projection: &str, registry: &ProjectionRegistry) -> AlignmentResult<Self>
    where
        I: IntoIterator<Item = TelemetryRecord>,
    {
        let mut track = Self::new();
        for record in records {
            track.insert(project_record(&record, projection, registry)?);
        }
        Ok(track)
    }

    /// Read and project a DJI caption file
    pub fn load<P: AsRef<Path>>(path: P, projection: &str, registry: &ProjectionRegistry) -> AlignmentResult<Self> {
        let mut track = Self::new();
        let mut records = 0usize;
        for record in TelemetryReader::open(&path)? {
            track.insert(project_record(&record?, projection, registry)?);
            records += 1;
        }
        debug!(
            "loaded {} telemetry records ({} distinct seconds) from {}",
            records,
            track.len(),
            path.as_ref().display()
        );
        Ok(track)
    }

    /// Sample recorded during `second`
    pub fn get(&self, second: u32) -> Option<&GnssSample> {
        self.samples.get(&second)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples in ascending time order
    pub fn iter(&self) -> btree_map::Values<'_, u32, GnssSample> {
        self.samples.values()
    }

    /// Ground markers below every fix, named `"{second}: {position}"`
    pub fn markers(&self) -> Vec<Marker> {
        self.iter()
            .map(|sample| {
                let ground = sample.position.raised(-sample.relative_height);
                Marker::new(format!("{}: {}", sample.timestamp_s, ground), ground)
            })
            .collect()
    }
}

fn project_record(record: &TelemetryRecord, projection: &str, registry: &ProjectionRegistry) -> AlignmentResult<GnssSample> {
    let position = registry.project_from_geodetic(projection, record.longitude, record.latitude, record.altitude)?;
    Ok(GnssSample {
        timestamp_s: record.timestamp_ms / 1000,
        position,
        relative_height: record.relative_height,
    })
}
