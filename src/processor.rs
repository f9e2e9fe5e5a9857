use chrono::{DateTime, Utc};

use crate::{
    config::SensorConfig,
    model::{CellRecord, CellRecordBatch},
};

/// Turns the cells captured by a scan into the batch handed to consumers.
pub trait RadioProcessor: Send + Sync {
    fn process(
        &self,
        start_timestamp: DateTime<Utc>,
        records: Vec<CellRecord>,
        config: SensorConfig,
    ) -> CellRecordBatch;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PhoneRadioProcessor;

impl RadioProcessor for PhoneRadioProcessor {
    fn process(
        &self,
        start_timestamp: DateTime<Utc>,
        records: Vec<CellRecord>,
        config: SensorConfig,
    ) -> CellRecordBatch {
        let raw_data = config.raw_data;
        let mut batch = CellRecordBatch::new(start_timestamp, config);
        if raw_data {
            batch.cells = records;
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_data_flag() {
        let now = Utc::now();
        let records = vec![CellRecord::new("228", "01", 10, 20)];

        let kept = PhoneRadioProcessor.process(now, records.clone(), SensorConfig::default());
        assert_eq!(kept.cells, records);
        assert_eq!(kept.timestamp, now);

        let config = SensorConfig {
            raw_data: false,
            ..Default::default()
        };
        let dropped = PhoneRadioProcessor.process(now, records, config.clone());
        assert!(dropped.is_empty());
        assert_eq!(dropped.config, config);
    }
}
