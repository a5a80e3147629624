//! Calibration choreography.
//!
//! Two layers:
//! - [`CalibrationSession`] - pure state machine over user keys, device acks
//!   and heartbeat ticks, with an explicit `now` for testability
//! - [`CalibrationRunner`] - blocking heartbeat loop driving a session
//!   against a [`CalibrationHost`] and a [`CalibrationDevice`]
//!
//! ```text
//! AwaitingUserStart ──Space──► Autotuning ──ended ok──► Calibrating ──ended ok──► Done(Succeeded)
//!        │                         │                         │
//!      Escape                 failure ack/end           failure ack/end
//!        ▼                         ▼                         ▼
//!  Done(Cancelled)     Done(Failed | Cancelled)   Done(Failed | Cancelled)
//! ```
//!
//! Escape during a device phase arms a grace timeout. A failure ack after
//! the cancel request resolves as `Cancelled`; a silent device resolves as
//! `TimedOut` once the grace period expires.

use crossbeam_channel::RecvTimeoutError;
use mindlink_common::tracker::config::CalibrationSettings;
use mindlink_common::tracker::host::{CalibrationHost, ColorSpace, DisplayInfo, Key, Prompt};
use mindlink_common::tracker::types::AckCode;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Instruction shown until the user starts or skips calibration.
pub const INSTRUCTION_MSG: &str = "Press SPACE to start MindLink calibration; ESCAPE to exit.";

/// Phase of a calibration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    /// Instruction prompt shown, waiting for Space or Escape.
    AwaitingUserStart,
    /// Autotune GUI running on the device.
    Autotuning,
    /// Calibration GUI running on the device.
    Calibrating,
    /// Finished.
    Done(CalibrationOutcome),
}

/// Final result of a calibration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationOutcome {
    /// Autotune and calibration both succeeded.
    Succeeded,
    /// User skipped or cancelled.
    Cancelled,
    /// User cancelled and the device never answered.
    TimedOut,
    /// The device reported a failure.
    Failed,
}

impl CalibrationOutcome {
    /// Whether the tracker is calibrated.
    pub const fn is_success(self) -> bool {
        matches!(self, CalibrationOutcome::Succeeded)
    }
}

/// Input of the session state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Key pressed on the host keyboard.
    Key(Key),
    /// Device ack of the current procedure request.
    RequestAck(AckCode),
    /// Device procedure-ended event.
    ProcedureEnded(AckCode),
    /// Heartbeat.
    Tick,
}

/// Device request the session asks the caller to issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationCommand {
    /// Launch the autotune GUI.
    StartAutotune,
    /// Launch the calibration GUI.
    StartCalibration,
}

/// Pure calibration state machine.
#[derive(Debug, Clone)]
pub struct CalibrationSession {
    phase: CalibrationPhase,
    autotune_succeeded: bool,
    calibration_succeeded: bool,
    cancel_requested_at: Option<Instant>,
    cancel_timeout: Duration,
}

impl CalibrationSession {
    /// Create a session waiting for the user.
    pub const fn new(cancel_timeout: Duration) -> Self {
        Self {
            phase: CalibrationPhase::AwaitingUserStart,
            autotune_succeeded: false,
            calibration_succeeded: false,
            cancel_requested_at: None,
            cancel_timeout,
        }
    }

    /// Current phase.
    #[inline]
    pub const fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    /// Final outcome, once done.
    pub const fn outcome(&self) -> Option<CalibrationOutcome> {
        match self.phase {
            CalibrationPhase::Done(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Whether autotune finished successfully.
    pub const fn autotune_succeeded(&self) -> bool {
        self.autotune_succeeded
    }

    /// Whether calibration finished successfully.
    pub const fn calibration_succeeded(&self) -> bool {
        self.calibration_succeeded
    }

    /// Time the user asked to cancel the running device phase.
    pub const fn cancel_requested_at(&self) -> Option<Instant> {
        self.cancel_requested_at
    }

    /// Feed one event observed at `now`.
    pub fn handle_event(&mut self, event: SessionEvent, now: Instant) -> Option<CalibrationCommand> {
        use CalibrationPhase::*;

        match (self.phase, event) {
            (Done(_), _) => None,

            (AwaitingUserStart, SessionEvent::Key(Key::Space)) => {
                info!("Starting autotune");
                self.phase = Autotuning;
                Some(CalibrationCommand::StartAutotune)
            }
            (AwaitingUserStart, SessionEvent::Key(Key::Escape)) => {
                info!("Calibration skipped by user");
                self.phase = Done(CalibrationOutcome::Cancelled);
                None
            }
            (AwaitingUserStart, _) => None,

            (Autotuning | Calibrating, SessionEvent::Key(Key::Escape)) => {
                if self.cancel_requested_at.is_none() {
                    info!(
                        "Cancel requested, waiting up to {} ms for the device",
                        self.cancel_timeout.as_millis()
                    );
                    self.cancel_requested_at = Some(now);
                }
                None
            }
            (Autotuning | Calibrating, SessionEvent::Key(_)) => None,

            (phase @ (Autotuning | Calibrating), SessionEvent::RequestAck(code)) => {
                if !code.is_success() {
                    self.fail(phase, "Unable to start", code);
                }
                None
            }

            (Autotuning, SessionEvent::ProcedureEnded(code)) => {
                if !code.is_success() {
                    self.fail(Autotuning, "Autotune failed", code);
                    return None;
                }
                info!("Autotune succeeded, starting calibration");
                self.autotune_succeeded = true;
                self.cancel_requested_at = None;
                self.phase = Calibrating;
                Some(CalibrationCommand::StartCalibration)
            }
            (Calibrating, SessionEvent::ProcedureEnded(code)) => {
                if !code.is_success() {
                    self.fail(Calibrating, "Calibration failed", code);
                    return None;
                }
                info!("Calibration succeeded");
                self.calibration_succeeded = true;
                self.phase = Done(CalibrationOutcome::Succeeded);
                None
            }

            (Autotuning | Calibrating, SessionEvent::Tick) => {
                if let Some(requested) = self.cancel_requested_at {
                    if now.saturating_duration_since(requested) >= self.cancel_timeout {
                        warn!("Device did not acknowledge cancel, giving up");
                        self.phase = Done(CalibrationOutcome::TimedOut);
                    }
                }
                None
            }
        }
    }

    fn fail(&mut self, phase: CalibrationPhase, what: &str, code: AckCode) {
        if self.cancel_requested_at.is_some() {
            info!("{phase:?} cancelled ({code})");
            self.phase = CalibrationPhase::Done(CalibrationOutcome::Cancelled);
        } else {
            error!("{what}: {code}");
            self.phase = CalibrationPhase::Done(CalibrationOutcome::Failed);
        }
    }
}

/// Signal from the device relevant to the running procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureSignal {
    /// Ack of the autotune or calibration request.
    RequestAck(AckCode),
    /// Procedure-ended event.
    Ended(AckCode),
}

/// Device side of the calibration choreography.
pub trait CalibrationDevice {
    /// Enable procedure start/end events.
    fn enable_procedure_events(&mut self);

    /// Launch the autotune GUI.
    fn start_autotune(&mut self);

    /// Launch the calibration GUI.
    fn start_calibration(&mut self, n_points: u32, randomize: bool);

    /// Drain pending procedure signals, oldest first.
    fn poll_procedure(&mut self) -> Vec<ProcedureSignal>;

    /// Drop events already published to the host by this device.
    fn clear_events(&mut self);
}

/// Complement of an `[0, 255]` color. Gray maps to black or white.
pub fn complement_rgb255(color: [f64; 3]) -> [f64; 3] {
    let [r, g, b] = color;
    if r == g && g == b {
        return if r >= 128.0 {
            [0.0, 0.0, 0.0]
        } else {
            [255.0, 255.0, 255.0]
        };
    }
    let k = r.max(g).max(b) + r.min(g).min(b);
    [k - r, k - g, k - b]
}

/// Build the instruction prompt from calibration settings, falling back to
/// the display's unit type and color space.
pub fn instruction_prompt(settings: &CalibrationSettings, display: Option<&DisplayInfo>) -> Prompt {
    let color_space = settings
        .color_type
        .or(display.map(|d| d.color_space))
        .unwrap_or_default();
    let unit_type = settings
        .unit_type
        .clone()
        .or_else(|| display.map(|d| d.coord_type.clone()))
        .unwrap_or_else(|| "pix".to_string());
    // Host default window color: mid gray.
    let background = settings
        .screen_background_color
        .unwrap_or_else(|| color_space.from_rgb255(ColorSpace::Rgb.to_rgb255([0.0; 3])));
    let text_color = settings.text_color.unwrap_or_else(|| {
        color_space.from_rgb255(complement_rgb255(color_space.to_rgb255(background)))
    });

    Prompt {
        text: INSTRUCTION_MSG.to_string(),
        background,
        text_color,
        color_space,
        unit_type,
    }
}

/// Blocking heartbeat loop around a [`CalibrationSession`].
pub struct CalibrationRunner<'a> {
    host: &'a mut dyn CalibrationHost,
    prompt: Prompt,
    n_points: u32,
    randomize: bool,
    heartbeat: Duration,
    cancel_timeout: Duration,
}

impl<'a> CalibrationRunner<'a> {
    /// Create a runner.
    pub fn new(
        host: &'a mut dyn CalibrationHost,
        settings: &CalibrationSettings,
        display: Option<&DisplayInfo>,
        heartbeat: Duration,
        cancel_timeout: Duration,
    ) -> Self {
        Self {
            host,
            prompt: instruction_prompt(settings, display),
            n_points: settings.calibration_type.n_points(),
            randomize: settings.randomize,
            heartbeat,
            cancel_timeout,
        }
    }

    /// Run the full choreography and return its outcome.
    pub fn run(&mut self, device: &mut dyn CalibrationDevice) -> CalibrationOutcome {
        device.enable_procedure_events();

        let (keys_tx, keys_rx) = crossbeam_channel::unbounded();
        if !self.host.register_key_listener(keys_tx) {
            warn!("No keyboard available for calibration events");
        }
        self.clear_all_buffers(device);

        let mut session = CalibrationSession::new(self.cancel_timeout);
        let mut prompt_visible = false;

        let outcome = loop {
            self.host.pump();

            if session.phase() == CalibrationPhase::AwaitingUserStart {
                self.host.show_prompt(&self.prompt);
                prompt_visible = true;
            }

            for key in keys_rx.try_iter() {
                self.on_key(&mut session, device, key);
            }
            for signal in device.poll_procedure() {
                let event = match signal {
                    ProcedureSignal::RequestAck(code) => SessionEvent::RequestAck(code),
                    ProcedureSignal::Ended(code) => SessionEvent::ProcedureEnded(code),
                };
                self.dispatch(&mut session, device, event);
            }
            // Acks above take precedence over an expiring timeout.
            self.dispatch(&mut session, device, SessionEvent::Tick);

            if prompt_visible && session.phase() != CalibrationPhase::AwaitingUserStart {
                self.host.hide_prompt();
                prompt_visible = false;
            }
            if let Some(outcome) = session.outcome() {
                break outcome;
            }

            match keys_rx.recv_timeout(self.heartbeat) {
                Ok(key) => self.on_key(&mut session, device, key),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => std::thread::sleep(self.heartbeat),
            }
        };

        if prompt_visible {
            self.host.hide_prompt();
        }
        self.host.unregister_key_listener();
        self.clear_all_buffers(device);
        debug!(
            "Calibration finished: {outcome:?} (autotune={}, calibration={})",
            session.autotune_succeeded(),
            session.calibration_succeeded()
        );
        outcome
    }

    fn on_key(
        &mut self,
        session: &mut CalibrationSession,
        device: &mut dyn CalibrationDevice,
        key: Key,
    ) {
        if matches!(key, Key::Space | Key::Escape) {
            self.clear_all_buffers(device);
        }
        self.dispatch(session, device, SessionEvent::Key(key));
    }

    fn clear_all_buffers(&mut self, device: &mut dyn CalibrationDevice) {
        self.host.clear_event_buffers();
        device.clear_events();
    }

    fn dispatch(
        &self,
        session: &mut CalibrationSession,
        device: &mut dyn CalibrationDevice,
        event: SessionEvent,
    ) {
        match session.handle_event(event, Instant::now()) {
            Some(CalibrationCommand::StartAutotune) => device.start_autotune(),
            Some(CalibrationCommand::StartCalibration) => {
                device.start_calibration(self.n_points, self.randomize)
            }
            None => {}
        }
    }
}
