//! Pull sensors: the caller triggers every sensing cycle explicitly.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, PoisonError, RwLock,
};

use chrono::{DateTime, Utc};
use tokio::{runtime::Handle, sync::watch, time::timeout};
use tracing::{debug, warn};

use crate::{config::SensorConfig, error::SensorError, model::SensorType, platform::PlatformContext};

/// Sequence number of a sensing cycle, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cycle(pub u64);

/// Everything a sensor needs from its environment on creation.
#[derive(Debug, Clone)]
pub struct SensorContext {
    pub platform: PlatformContext,
    pub config: SensorConfig,
    /// Runtime whose blocking pool runs the scans.
    pub runtime: Handle,
}

impl SensorContext {
    /// Context for the runtime the caller is running on.
    ///
    /// Panics outside of a tokio runtime.
    pub fn current(platform: PlatformContext, config: SensorConfig) -> Self {
        Self {
            platform,
            config,
            runtime: Handle::current(),
        }
    }
}

/// State shared by all pull sensors.
pub struct PullSensorBase {
    sensor: SensorType,
    application_context: PlatformContext,
    runtime: Handle,
    sensor_config: RwLock<SensorConfig>,
    pull_sense_start_timestamp: Mutex<Option<DateTime<Utc>>>,
    started: AtomicU64,
    notifications: AtomicU64,
    // highest cycle whose completion has fired
    completed: watch::Sender<u64>,
}

impl PullSensorBase {
    pub fn new(sensor: SensorType, context: &SensorContext) -> Self {
        Self {
            sensor,
            application_context: context.platform.clone(),
            runtime: context.runtime.clone(),
            sensor_config: RwLock::new(context.config.clone()),
            pull_sense_start_timestamp: Mutex::new(None),
            started: AtomicU64::new(0),
            notifications: AtomicU64::new(0),
            completed: watch::Sender::new(0),
        }
    }

    pub fn sensor(&self) -> SensorType {
        self.sensor
    }

    pub fn application_context(&self) -> &PlatformContext {
        &self.application_context
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Deep copy of the active configuration.
    pub fn sensor_config(&self) -> SensorConfig {
        self.sensor_config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_sensor_config(&self, config: SensorConfig) {
        *self.sensor_config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    pub fn pull_sense_start_timestamp(&self) -> Option<DateTime<Utc>> {
        *self
            .pull_sense_start_timestamp
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Stamps the start of a new cycle and returns its number.
    pub fn begin_cycle(&self) -> Cycle {
        *self
            .pull_sense_start_timestamp
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
        Cycle(self.started.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// The most recently begun cycle, `Cycle(0)` before the first one.
    pub fn current_cycle(&self) -> Cycle {
        Cycle(self.started.load(Ordering::SeqCst))
    }

    pub fn notify_sense_cycles_complete(&self, cycle: Cycle) {
        self.notifications.fetch_add(1, Ordering::SeqCst);
        self.completed.send_modify(|x| *x = (*x).max(cycle.0));
        debug!(sensor = %self.sensor, cycle = cycle.0, "sense cycle complete");
    }

    /// Fires the completion of `cycle` when dropped, including during a panic.
    pub fn complete_on_drop(&self, cycle: Cycle) -> CompletionGuard<'_> {
        CompletionGuard { base: self, cycle }
    }

    /// Number of completion notifications fired so far.
    pub fn completed_cycles(&self) -> u64 {
        self.notifications.load(Ordering::SeqCst)
    }

    pub async fn wait_for_cycle(&self, cycle: Cycle) {
        let mut rx = self.completed.subscribe();
        // the sender lives in `self`, so the channel cannot close while we wait
        let _ = rx.wait_for(|x| *x >= cycle.0).await;
    }
}

pub struct CompletionGuard<'a> {
    base: &'a PullSensorBase,
    cycle: Cycle,
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        self.base.notify_sense_cycles_complete(self.cycle);
    }
}

pub trait PullSensor: Send + Sync + 'static {
    type Data: Send + Sync;

    fn base(&self) -> &PullSensorBase;

    fn sensor_type(&self) -> SensorType {
        self.base().sensor()
    }

    /// Launches `cycle`, as returned by [`PullSensorBase::begin_cycle`], and
    /// fires its completion exactly once. Returns whether it was launched,
    /// not whether data was captured.
    fn start_sensing(self: &Arc<Self>, cycle: Cycle) -> bool;

    fn stop_sensing(&self);

    fn process_sensor_data(&self) -> Arc<Self::Data>;

    fn most_recent_raw_data(&self) -> Option<Arc<Self::Data>>;
}

/// Runs one full cycle: start, wait for completion within the sense window,
/// stop and process.
///
/// A cycle that outlives the window is abandoned and processed without data;
/// whatever it publishes later belongs to that cycle only.
pub async fn sense_once<S: PullSensor>(sensor: &Arc<S>) -> Result<Arc<S::Data>, SensorError> {
    let base = sensor.base();
    let window = base.sensor_config().sense_window_length();
    let cycle = base.begin_cycle();
    debug!(sensor = %base.sensor(), cycle = cycle.0, "starting sense cycle");

    if !sensor.start_sensing(cycle) {
        return Err(SensorError::StartFailed {
            sensor: base.sensor(),
        });
    }

    if timeout(window, base.wait_for_cycle(cycle)).await.is_err() {
        warn!(sensor = %base.sensor(), cycle = cycle.0, "sense cycle did not complete within {window:?}");
    }

    sensor.stop_sensing();
    Ok(sensor.process_sensor_data())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::platform::FixturePlatform;

    use super::*;

    struct Echo {
        base: PullSensorBase,
        // cycles are only completed when set
        respond: bool,
    }

    impl PullSensor for Echo {
        type Data = u64;

        fn base(&self) -> &PullSensorBase {
            &self.base
        }

        fn start_sensing(self: &Arc<Self>, cycle: Cycle) -> bool {
            if self.respond {
                let this = Arc::clone(self);
                self.base.runtime().spawn_blocking(move || {
                    let _complete = this.base.complete_on_drop(cycle);
                });
            }
            true
        }

        fn stop_sensing(&self) {}

        fn process_sensor_data(&self) -> Arc<u64> {
            Arc::new(self.base.completed_cycles())
        }

        fn most_recent_raw_data(&self) -> Option<Arc<u64>> {
            None
        }
    }

    fn echo(respond: bool, window: u64) -> Arc<Echo> {
        let config = SensorConfig {
            sense_window_length_millis: window,
            ..Default::default()
        };
        let context = SensorContext::current(FixturePlatform::default().into_context(), config);
        Arc::new(Echo {
            base: PullSensorBase::new(SensorType::PhoneRadio, &context),
            respond,
        })
    }

    #[tokio::test]
    async fn cycle_numbers() {
        let sensor = echo(true, 1_000);
        assert_eq!(sensor.base().current_cycle(), Cycle(0));
        assert!(sensor.base().pull_sense_start_timestamp().is_none());

        assert_eq!(*sense_once(&sensor).await.unwrap(), 1);
        assert_eq!(*sense_once(&sensor).await.unwrap(), 2);
        assert_eq!(sensor.base().current_cycle(), Cycle(2));
        assert!(sensor.base().pull_sense_start_timestamp().is_some());
    }

    #[tokio::test]
    async fn abandoned_cycle() {
        let sensor = echo(false, 20);
        assert_eq!(*sense_once(&sensor).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn late_completion_does_not_release_later_cycle() {
        let sensor = echo(false, 1_000);
        let base = sensor.base();
        let first = base.begin_cycle();
        let second = base.begin_cycle();
        base.notify_sense_cycles_complete(first);

        let waited = timeout(Duration::from_millis(20), base.wait_for_cycle(second)).await;
        assert!(waited.is_err());

        base.notify_sense_cycles_complete(second);
        base.wait_for_cycle(second).await;
        assert_eq!(base.completed_cycles(), 2);
    }

    #[tokio::test]
    async fn config_snapshot() {
        let sensor = echo(true, 1_000);
        let snapshot = sensor.base().sensor_config();
        sensor.base().set_sensor_config(SensorConfig {
            raw_data: false,
            ..snapshot.clone()
        });
        assert!(snapshot.raw_data);
        assert!(!sensor.base().sensor_config().raw_data);
    }
}
