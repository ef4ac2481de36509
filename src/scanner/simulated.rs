//! In-process engine backed by a virtual camera.
//!
//! The console front end feeds it typed codes, and tests use its failure
//! switches to script engine misbehaviour.

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::inventory::Symbology;

use super::{
    engine::{CameraPower, DecodeBatch, Decoded, EngineSetup, RecognitionEngine},
    error::EngineError,
};

struct CameraState {
    open: bool,
    power: CameraPower,
    setup: Option<EngineSetup>,
    sink: Option<mpsc::Sender<DecodeBatch>>,
    open_delay: Duration,
    power_off_delay: Duration,
    open_count: usize,
    close_count: usize,
    power_log: Vec<CameraPower>,
    fail_open: Option<String>,
    fail_power_on: Option<String>,
    fail_power_off: Option<String>,
    fail_close: Option<String>,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            open: false,
            power: CameraPower::Off,
            setup: None,
            sink: None,
            open_delay: Duration::ZERO,
            power_off_delay: Duration::ZERO,
            open_count: 0,
            close_count: 0,
            power_log: Vec::new(),
            fail_open: None,
            fail_power_on: None,
            fail_power_off: None,
            fail_close: None,
        }
    }
}

type Shared = Arc<Mutex<CameraState>>;

fn lock(state: &Shared) -> MutexGuard<'_, CameraState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub struct SimulatedEngine {
    state: Shared,
}

impl SimulatedEngine {
    /// Returns the engine and the camera that feeds it.
    pub fn new() -> (Self, VirtualCamera) {
        let state: Shared = Arc::new(Mutex::new(CameraState::default()));
        (
            Self {
                state: state.clone(),
            },
            VirtualCamera { state },
        )
    }
}

#[async_trait]
impl RecognitionEngine for SimulatedEngine {
    async fn open(
        &mut self,
        setup: &EngineSetup,
        decodes: mpsc::Sender<DecodeBatch>,
    ) -> Result<(), EngineError> {
        let delay = lock(&self.state).open_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = lock(&self.state);
        if let Some(reason) = state.fail_open.take() {
            return Err(EngineError::Load(reason));
        }

        state.open = true;
        state.open_count += 1;
        state.power = CameraPower::Off;
        state.setup = Some(setup.clone());
        state.sink = Some(decodes);
        Ok(())
    }

    async fn set_camera(&mut self, power: CameraPower) -> Result<(), EngineError> {
        let delay = lock(&self.state).power_off_delay;
        if power == CameraPower::Off && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = lock(&self.state);
        if !state.open {
            return Err(EngineError::NotOpen);
        }

        let failure = match power {
            CameraPower::On => state.fail_power_on.take(),
            CameraPower::Off => state.fail_power_off.take(),
        };
        if let Some(reason) = failure {
            return Err(EngineError::Camera(reason));
        }

        state.power = power;
        state.power_log.push(power);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), EngineError> {
        let mut state = lock(&self.state);
        if !state.open {
            return Ok(());
        }

        state.close_count += 1;
        if let Some(reason) = state.fail_close.take() {
            return Err(EngineError::Camera(reason));
        }

        state.open = false;
        state.power = CameraPower::Off;
        state.sink = None;
        Ok(())
    }
}

/// Handle for pointing the virtual camera at barcodes and scripting faults.
#[derive(Clone)]
pub struct VirtualCamera {
    state: Shared,
}

impl VirtualCamera {
    pub fn present(&self, data: impl Into<String>, symbology: Symbology) -> bool {
        self.present_batch(
            Utc::now(),
            vec![Decoded {
                data: data.into(),
                symbology,
            }],
        )
    }

    /// Delivers one frame's worth of codes. Returns false when nothing was
    /// recognized: engine closed, camera off, or no enabled symbology.
    pub fn present_batch(&self, captured_at: DateTime<Utc>, decodes: Vec<Decoded>) -> bool {
        let state = lock(&self.state);
        if !state.open || state.power == CameraPower::Off {
            return false;
        }
        let (Some(sink), Some(setup)) = (state.sink.as_ref(), state.setup.as_ref()) else {
            return false;
        };

        let decodes: Vec<_> = decodes
            .into_iter()
            .filter(|decoded| setup.symbologies.contains(&decoded.symbology))
            .collect();
        if decodes.is_empty() {
            return false;
        }

        sink.try_send(DecodeBatch {
            captured_at,
            decodes,
        })
        .is_ok()
    }

    pub fn set_open_delay(&self, delay: Duration) {
        lock(&self.state).open_delay = delay;
    }

    /// Makes powering the camera off take `delay`, like slow hardware.
    pub fn set_power_off_delay(&self, delay: Duration) {
        lock(&self.state).power_off_delay = delay;
    }

    pub fn fail_next_open(&self, reason: impl Into<String>) {
        lock(&self.state).fail_open = Some(reason.into());
    }

    pub fn fail_next_power_on(&self, reason: impl Into<String>) {
        lock(&self.state).fail_power_on = Some(reason.into());
    }

    pub fn fail_next_power_off(&self, reason: impl Into<String>) {
        lock(&self.state).fail_power_off = Some(reason.into());
    }

    pub fn fail_next_close(&self, reason: impl Into<String>) {
        lock(&self.state).fail_close = Some(reason.into());
    }

    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    pub fn power(&self) -> CameraPower {
        lock(&self.state).power
    }

    pub fn power_log(&self) -> Vec<CameraPower> {
        lock(&self.state).power_log.clone()
    }

    pub fn open_count(&self) -> usize {
        lock(&self.state).open_count
    }

    pub fn close_count(&self) -> usize {
        lock(&self.state).close_count
    }

    pub fn last_setup(&self) -> Option<EngineSetup> {
        lock(&self.state).setup.clone()
    }
}
