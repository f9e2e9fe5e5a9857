//! Phone radio sensor: cell towers visible to the device.
//!
//! Each cycle runs one blocking scan on the runtime's blocking pool. Devices
//! that support the bulk "all visible cells" query are not translated into
//! records yet, and neither are legacy radios other than GSM; both show up as
//! [`ScanOutcome::Unsupported`] with an empty batch.

use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use chrono::Utc;
use once_cell::sync::OnceCell;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    error::{ScanError, SensorError},
    model::{CellLocation, CellRecord, CellRecordBatch, PhoneType, SensorType},
    platform::{PlatformContext, Telephony, PERMISSION_ACCESS_CELL_INFO},
    processor::{PhoneRadioProcessor, RadioProcessor},
    pull::{Cycle, PullSensor, PullSensorBase, SensorContext},
};

static PHONE_RADIO_SENSOR: OnceCell<Arc<PhoneRadioSensor>> = OnceCell::new();

/// Result of one scan task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Captured(Vec<CellRecord>),
    Unsupported(UnsupportedPath),
    Suppressed(ScanError),
}

impl ScanOutcome {
    pub fn records(&self) -> &[CellRecord] {
        match self {
            ScanOutcome::Captured(records) => records,
            _ => &[],
        }
    }
}

/// Platform answers the scan does not turn into records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedPath {
    /// The bulk query answered with this many cells.
    BulkCellInfo { cells: usize },
    /// No bulk query and a legacy radio other than GSM.
    PhoneType(PhoneType),
}

impl fmt::Display for UnsupportedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsupportedPath::BulkCellInfo { cells } => {
                write!(f, "bulk cell info is not translated ({cells} cells reported)")
            }
            UnsupportedPath::PhoneType(phone_type) => {
                write!(f, "phone type {phone_type} is not supported")
            }
        }
    }
}

pub struct PhoneRadioSensor {
    base: PullSensorBase,
    processor: Arc<dyn RadioProcessor>,
    // outcome of the newest finished scan and the cycle it belongs to
    last_scan: watch::Sender<Option<(Cycle, Arc<ScanOutcome>)>>,
    phone_radio_data: watch::Sender<Option<Arc<CellRecordBatch>>>,
}

impl PhoneRadioSensor {
    /// Returns the process-wide sensor, creating it on first use.
    pub fn get(context: &SensorContext) -> Result<Arc<Self>, SensorError> {
        Self::get_or_create(&PHONE_RADIO_SENSOR, context)
    }

    /// Creates the sensor in `slot` unless it already holds one. A denied
    /// permission leaves the slot empty.
    pub fn get_or_create(
        slot: &OnceCell<Arc<Self>>,
        context: &SensorContext,
    ) -> Result<Arc<Self>, SensorError> {
        Self::get_or_create_with(slot, context, Arc::new(PhoneRadioProcessor))
    }

    /// Like [`Self::get_or_create`], with a custom processor. The processor is
    /// ignored when the slot already holds a sensor.
    pub fn get_or_create_with(
        slot: &OnceCell<Arc<Self>>,
        context: &SensorContext,
        processor: Arc<dyn RadioProcessor>,
    ) -> Result<Arc<Self>, SensorError> {
        slot.get_or_try_init(|| {
            if !context.platform.permission_granted(PERMISSION_ACCESS_CELL_INFO) {
                warn!("{PERMISSION_ACCESS_CELL_INFO} not granted");
                return Err(SensorError::PermissionDenied {
                    sensor: SensorType::PhoneRadio,
                });
            }

            info!("creating phone radio sensor");
            Ok(Arc::new(Self {
                base: PullSensorBase::new(SensorType::PhoneRadio, context),
                processor,
                last_scan: watch::Sender::new(None),
                phone_radio_data: watch::Sender::new(None),
            }))
        })
        .cloned()
    }

    /// Outcome of the last finished scan.
    pub fn last_scan(&self) -> Option<Arc<ScanOutcome>> {
        self.last_scan.borrow().as_ref().map(|(_, x)| x.clone())
    }

    /// Stores `outcome` unless a scan of a later cycle already finished.
    fn publish(&self, cycle: Cycle, outcome: ScanOutcome) {
        let outcome = Arc::new(outcome);
        self.last_scan.send_if_modified(|slot| {
            if slot.as_ref().is_some_and(|(newest, _)| *newest > cycle) {
                return false;
            }
            *slot = Some((cycle, outcome));
            true
        });
    }

    /// Cells scanned during `cycle`, empty when that scan has not finished.
    fn records_for(&self, cycle: Cycle) -> Vec<CellRecord> {
        match &*self.last_scan.borrow() {
            Some((scanned, outcome)) if *scanned == cycle => outcome.records().to_vec(),
            Some((scanned, _)) => {
                debug!(cycle = cycle.0, "ignoring scan of cycle {}", scanned.0);
                Vec::new()
            }
            None => Vec::new(),
        }
    }
}

impl PullSensor for PhoneRadioSensor {
    type Data = CellRecordBatch;

    fn base(&self) -> &PullSensorBase {
        &self.base
    }

    fn start_sensing(self: &Arc<Self>, cycle: Cycle) -> bool {
        let this = Arc::clone(self);
        self.base.runtime().spawn_blocking(move || {
            let _complete = this.base.complete_on_drop(cycle);

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                scan(this.base.application_context())
            }))
            .unwrap_or(ScanOutcome::Suppressed(ScanError::Panicked));

            match &outcome {
                ScanOutcome::Captured(records) => {
                    debug!(cycle = cycle.0, "captured {} cells", records.len())
                }
                ScanOutcome::Unsupported(path) => warn!(cycle = cycle.0, "{path}"),
                ScanOutcome::Suppressed(err) => warn!(cycle = cycle.0, "scan failed: {err}"),
            }
            this.publish(cycle, outcome);
        });

        true
    }

    // a scan is a single query, there is nothing to tear down
    fn stop_sensing(&self) {}

    fn process_sensor_data(&self) -> Arc<CellRecordBatch> {
        let records = self.records_for(self.base.current_cycle());
        let timestamp = self.base.pull_sense_start_timestamp().unwrap_or_else(Utc::now);

        let batch = Arc::new(
            self.processor
                .process(timestamp, records, self.base.sensor_config()),
        );
        self.phone_radio_data.send_replace(Some(batch.clone()));
        batch
    }

    fn most_recent_raw_data(&self) -> Option<Arc<CellRecordBatch>> {
        self.phone_radio_data.borrow().clone()
    }
}

fn scan(context: &PlatformContext) -> ScanOutcome {
    match try_scan(context) {
        Ok(outcome) => outcome,
        Err(err) => ScanOutcome::Suppressed(err),
    }
}

fn try_scan(context: &PlatformContext) -> Result<ScanOutcome, ScanError> {
    let telephony = context.telephony().ok_or(ScanError::ServiceUnavailable)?;

    if let Some(cells) = telephony.all_cell_info()? {
        return Ok(ScanOutcome::Unsupported(UnsupportedPath::BulkCellInfo {
            cells: cells.len(),
        }));
    }

    match telephony.phone_type() {
        PhoneType::Gsm => {
            let record = legacy_gsm(&**telephony)?;
            Ok(ScanOutcome::Captured(vec![record]))
        }
        other => Ok(ScanOutcome::Unsupported(UnsupportedPath::PhoneType(other))),
    }
}

fn legacy_gsm(telephony: &dyn Telephony) -> Result<CellRecord, ScanError> {
    let (lac, cid) = match telephony.cell_location()? {
        Some(CellLocation::Gsm { lac, cid }) => (lac, cid),
        Some(_) => return Err(ScanError::UnexpectedCellLocation),
        None => return Err(ScanError::MissingCellLocation),
    };
    let operator = telephony.network_operator()?;
    let (mcc, mnc) = split_operator(&operator)?;
    Ok(CellRecord::new(mcc, mnc, lac, cid))
}

/// Splits a network operator into its 3 character MCC and the MNC.
fn split_operator(operator: &str) -> Result<(&str, &str), ScanError> {
    match operator.get(..3) {
        Some(mcc) => Ok((mcc, &operator[3..])),
        None => Err(ScanError::MalformedOperator(operator.to_string())),
    }
}
