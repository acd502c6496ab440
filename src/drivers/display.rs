use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::time::{Duration, Instant};
use crate::drivers::buffer::RollingBuffer;
use crate::drivers::channel::Consumer;
use crate::drivers::clock::{sleep_until_next_period, StopSignal};
use crate::drivers::config::{ConfigEffect, ConfigState};
use crate::recorder::{PersistedRow, PersistenceSession, Persister};
use crate::types::{
    AggregateRecord, ChannelId, ConfigEvent, DisplayUpdate, PlotFrame, UiEvent, CHANNEL_COUNT,
};
/// How long one iteration waits for a UI event.
pub const EVENT_POLL_TIMEOUT: Duration = Duration::from_millis(1);
/// Result of one event poll.
#[derive(Clone, Debug, PartialEq)]
pub enum Polled {
    Event(ConfigEvent),
    Idle,
    /// Window closed or cancelled; the loop ends.
    Closed,
}
/// Where configuration events and the close request come from.
pub trait EventSource {
    fn poll(&mut self, timeout: Duration) -> Polled;
}
impl EventSource for Receiver<UiEvent> {
    fn poll(&mut self, timeout: Duration) -> Polled {
        match self.recv_timeout(timeout) {
            Ok(UiEvent::Config(event)) => Polled::Event(event),
            Ok(UiEvent::Close) => Polled::Closed,
            Err(RecvTimeoutError::Timeout) => Polled::Idle,
            // window side is gone entirely
            Err(RecvTimeoutError::Disconnected) => Polled::Closed,
        }
    }
}
/// Draws frames and shows whether saving is really on.
pub trait Renderer {
    fn render(&mut self, frame: PlotFrame);
    /// Returns false if the status could not be delivered and should be retried.
    fn recording_status(&mut self, active: bool) -> bool;
}
impl Renderer for SyncSender<DisplayUpdate> {
    fn render(&mut self, frame: PlotFrame) {
        // a window that hasn't picked up the last frame just misses this one
        if let Err(TrySendError::Disconnected(_)) = self.try_send(DisplayUpdate::Frame(frame)) {
            log::debug!("plot receiver gone, dropping frame");
        }
    }
    fn recording_status(&mut self, active: bool) -> bool {
        match self.try_send(DisplayUpdate::RecordingStatus(active)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            // nobody left to tell
            Err(TrySendError::Disconnected(_)) => true,
        }
    }
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}
/// Paced consumer of aggregate records.
///
/// Owns the [`ConfigState`], the rolling history and the persistence session.
/// Each iteration polls one UI event, drains whatever the aggregator produced,
/// writes new rows, renders if monitoring, then sleeps out the display period.
pub struct DisplayLoop<E: EventSource, R: Renderer, P: Persister> {
    events: E,
    renderer: R,
    persister: P,
    records: Consumer<AggregateRecord>,
    config: ConfigState,
    buffers: [RollingBuffer; CHANNEL_COUNT],
    session: Option<PersistenceSession>,
    reported_saving: Option<bool>,
    aggregator_gone: bool,
}
impl<E: EventSource, R: Renderer, P: Persister> DisplayLoop<E, R, P> {
    pub fn new(
        config: ConfigState,
        records: Consumer<AggregateRecord>,
        events: E,
        renderer: R,
        persister: P,
    ) -> Self {
        let points = config.display_points();
        Self {
            events,
            renderer,
            persister,
            records,
            config,
            buffers: [
                RollingBuffer::with_capacity(points),
                RollingBuffer::with_capacity(points),
            ],
            session: None,
            reported_saving: None,
            aggregator_gone: false,
        }
    }
    pub fn config(&self) -> &ConfigState {
        &self.config
    }
    pub fn buffer(&self, channel: ChannelId) -> &RollingBuffer {
        &self.buffers[channel.index()]
    }
    pub fn session(&self) -> Option<&PersistenceSession> {
        self.session.as_ref()
    }
    /// Runs until the window closes or `stop` is requested. Hands back the
    /// persister so the caller can close it once the producers are down.
    pub fn run(mut self, stop: StopSignal) -> P {
        log::info!(
            "display loop running at {:.1} Hz",
            self.config.display_rate_hz()
        );
        while !stop.is_requested() {
            let iteration_start = Instant::now();
            if self.iterate() == Flow::Exit {
                log::info!("window closed, display loop exiting");
                break;
            }
            sleep_until_next_period(iteration_start, self.config.display_interval());
        }
        self.persister
    }
    /// One iteration without the trailing sleep.
    pub fn iterate(&mut self) -> Flow {
        match self.events.poll(EVENT_POLL_TIMEOUT) {
            Polled::Closed => return Flow::Exit,
            Polled::Event(event) => self.handle_event(event),
            Polled::Idle => {}
        }
        let drained = self.drain_records();
        self.persist(&drained);
        self.report_saving();
        if self.config.is_monitoring() {
            let frame = self.plot_frame();
            self.renderer.render(frame);
        }
        Flow::Continue
    }
    fn handle_event(&mut self, event: ConfigEvent) {
        match self.config.apply(event) {
            ConfigEffect::Unchanged | ConfigEffect::Updated => {}
            ConfigEffect::ResizeBuffers(points) => {
                for buffer in &mut self.buffers {
                    buffer.resize(points);
                }
            }
            ConfigEffect::StartSession(path) => match self.persister.begin(&path) {
                Ok(()) => self.session = Some(PersistenceSession::new(path)),
                Err(err) => {
                    log::error!("cannot start saving: {err}");
                    self.close_session();
                }
            },
            ConfigEffect::StopSession => self.close_session(),
        }
    }
    /// Tells the renderer whenever saving turned on or off, until it got through.
    fn report_saving(&mut self) {
        let saving = self.session.is_some();
        if self.reported_saving != Some(saving) && self.renderer.recording_status(saving) {
            self.reported_saving = Some(saving);
        }
    }
    fn close_session(&mut self) {
        self.persister.end();
        self.session = None;
        self.config.clear_saving();
    }
    fn drain_records(&mut self) -> Vec<AggregateRecord> {
        let drained = self.records.drain(self.config.display_points());
        for record in &drained {
            for (buffer, mean) in self.buffers.iter_mut().zip(record.means) {
                buffer.push(record.elapsed, mean);
            }
        }
        if self.records.is_disconnected() && !self.aggregator_gone {
            self.aggregator_gone = true;
            log::warn!("aggregator stopped publishing records");
        }
        drained
    }
    fn persist(&mut self, drained: &[AggregateRecord]) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let channels = self.config.channels();
        let mut failed = None;
        for record in drained {
            if !session.is_new(record.elapsed) {
                continue;
            }
            let row = PersistedRow {
                elapsed: record.elapsed,
                raw: record.means,
                scaled: [
                    channels[0].scale(record.means[0]),
                    channels[1].scale(record.means[1]),
                ],
            };
            if let Err(err) = self.persister.append(&row) {
                failed = Some(err);
                break;
            }
            session.last_written_time = Some(record.elapsed);
        }
        if let Some(err) = failed {
            log::error!("saving stopped: {err}");
            self.close_session();
        }
    }
    fn plot_frame(&self) -> PlotFrame {
        let reference = &self.buffers[0];
        let x_range = match (reference.first_time(), reference.last_time()) {
            (Some(first), Some(last)) => (first, last),
            _ => (0.0, 1.0),
        };
        let channels = self.config.channels();
        PlotFrame {
            series: [
                self.buffers[0].scaled_series(&channels[0]),
                self.buffers[1].scaled_series(&channels[1]),
            ],
            x_range,
            y_ranges: [
                (channels[0].axis_min, channels[0].axis_max),
                (channels[1].axis_min, channels[1].axis_max),
            ],
        }
    }
}
