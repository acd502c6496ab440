// src/engine.rs
// 流水线主管：按顺序启动传感器线程、聚合线程和显示循环，关闭时倒序收尾。
use std::sync::mpsc::{Receiver, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::drivers::{
    bounded, spawn_source, AcquisitionError, Aggregator, ConfigState, DisplayLoop,
    EventSource, LoadCellSource, PipelineClock, PressureSource, Producer, Renderer,
    SensorSource, SerialBridge, SimulatedLoadCell, SimulatedPressureAdc, SourceHandle,
    StopSignal,
};
use crate::recorder::{CsvRecorder, Persister};
use crate::settings::{Backend, Settings};
use crate::types::{DisplayUpdate, UiEvent, CHANNEL_COUNT};

/// How long shutdown waits for a sensor thread that is still inside a read.
pub const RELEASE_TIMEOUT: Duration = Duration::from_secs(3);

pub type SensorInit =
    Box<dyn FnOnce() -> Result<Box<dyn SensorSource>, AcquisitionError> + Send>;

/// One sensor activity that has not been started yet.
pub struct SensorSetup {
    pub name: &'static str,
    pub init: SensorInit,
}

impl SensorSetup {
    pub fn new<S, F>(name: &'static str, init: F) -> Self
    where
        S: SensorSource + 'static,
        F: FnOnce() -> Result<S, AcquisitionError> + Send + 'static,
    {
        Self {
            name,
            init: Box::new(move || init().map(|s| Box::new(s) as Box<dyn SensorSource>)),
        }
    }
}

/// Load cell first, pressure second, backed by whatever the settings select.
pub fn hardware_sensors(settings: &Settings) -> [SensorSetup; CHANNEL_COUNT] {
    let reference_unit = settings.reference_unit;
    match settings.backend {
        Backend::Simulated => [
            SensorSetup::new("load cell", move || {
                LoadCellSource::init(SimulatedLoadCell::new(), reference_unit)
            }),
            SensorSetup::new("pressure", || PressureSource::init(SimulatedPressureAdc::new())),
        ],
        Backend::Serial => {
            let load_cell_port = settings.load_cell_port.clone();
            let pressure_port = settings.pressure_port.clone();
            let baud = settings.baud_rate;
            [
                SensorSetup::new("load cell", move || {
                    let bridge = SerialBridge::open("load cell", &load_cell_port, baud)?;
                    LoadCellSource::init(bridge, reference_unit)
                }),
                SensorSetup::new("pressure", move || {
                    let bridge = SerialBridge::open("pressure adc", &pressure_port, baud)?;
                    PressureSource::init(bridge)
                }),
            ]
        }
    }
}

/// The running pipeline, seen from the window.
pub struct PipelineHandle {
    stop: StopSignal,
    supervisor: JoinHandle<()>,
}

impl PipelineHandle {
    /// True once every activity stopped and the save file is closed.
    pub fn is_finished(&self) -> bool {
        self.supervisor.is_finished()
    }

    /// Ends the display loop without a close event.
    pub fn request_stop(&self) {
        self.stop.request();
    }

    pub fn join(self) {
        if self.supervisor.join().is_err() {
            log::error!("pipeline supervisor panicked");
        }
    }
}

/// Starts the pipeline for the window: configured hardware, CSV persistence.
pub fn start(
    settings: &Settings,
    ui_events: Receiver<UiEvent>,
    frames: SyncSender<DisplayUpdate>,
) -> Result<PipelineHandle> {
    spawn_pipeline(
        settings,
        hardware_sensors(settings),
        ui_events,
        frames,
        CsvRecorder::new(),
    )
}

/// Brings up both sensors, the aggregator and the display loop.
///
/// Returns once both sensors finished initializing. If either fails, the one
/// already running is released and the error is returned; nothing is left
/// behind. The display loop runs on its own thread and, when it exits, stops
/// the aggregator, waits for the sensors to let go of their hardware and
/// closes the persister, in that order.
pub fn spawn_pipeline<E, R, P>(
    settings: &Settings,
    sensors: [SensorSetup; CHANNEL_COUNT],
    events: E,
    renderer: R,
    persister: P,
) -> Result<PipelineHandle>
where
    E: EventSource + Send + 'static,
    R: Renderer + Send + 'static,
    P: Persister + Send + 'static,
{
    let [load_cell, pressure] = sensors;
    let (load_cell_tx, load_cell_rx) = bounded(settings.raw_queue_capacity);
    let (pressure_tx, pressure_rx) = bounded(settings.raw_queue_capacity);

    // 1. 传感器：任一初始化失败即中止启动
    let load_cell = start_sensor(load_cell, load_cell_tx)?;
    let pressure = match start_sensor(pressure, pressure_tx) {
        Ok(handle) => handle,
        Err(err) => {
            drop(load_cell_rx);
            load_cell.wait_released(RELEASE_TIMEOUT);
            return Err(err);
        }
    };

    // 2. 聚合线程，只拿到 tick 间隔的只读句柄
    let clock = PipelineClock::start();
    let config = ConfigState::from_settings(settings);
    let (records_tx, records_rx) = bounded(settings.display_points);
    let aggregator_stop = StopSignal::new();
    let aggregator = spawn_aggregator(
        Aggregator::new(
            [load_cell_rx, pressure_rx],
            records_tx,
            clock,
            config.tick_interval(),
        ),
        aggregator_stop.clone(),
    )?;

    // 3. 显示循环所在的主管线程
    let stop = StopSignal::new();
    let display = DisplayLoop::new(config, records_rx, events, renderer, persister);
    let supervisor = thread::Builder::new()
        .name("display".to_owned())
        .spawn({
            let stop = stop.clone();
            move || {
                let mut persister = display.run(stop);
                aggregator_stop.request();
                if aggregator.join().is_err() {
                    log::error!("aggregator thread panicked");
                }
                for source in [load_cell, pressure] {
                    source.wait_released(RELEASE_TIMEOUT);
                }
                persister.end();
                log::info!("pipeline shut down");
            }
        })
        .context("failed to spawn display loop")?;

    Ok(PipelineHandle { stop, supervisor })
}

fn start_sensor(setup: SensorSetup, samples: Producer<f64>) -> Result<SourceHandle> {
    let name = setup.name;
    spawn_source(name, setup.init, samples).with_context(|| format!("{name} did not start"))
}

fn spawn_aggregator(aggregator: Aggregator, stop: StopSignal) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("aggregator".to_owned())
        .spawn(move || aggregator.run(stop))
        .context("failed to spawn aggregator")
}
