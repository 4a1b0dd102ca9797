//! The coordinator (§4.6): owns all authoritative state, merges intents from
//! Input, Hotkey, Practice, and the command surface, and publishes
//! [`state::RobotState`] snapshots.
//!
//! Grounded on the teacher's `ds.rs::DriverStation` facade-over-`Arc<DsState>`
//! shape (a thin public struct holding an `Arc` to the real state, with
//! `set_*`/`queue_*` methods locking into it) — but replacing its three
//! separate `tokio::sync::RwLock` sections (`send`/`recv`/`tcp` in
//! `ds/state.rs`) with the single `std::sync::Mutex` this spec's §5 shared
//! resource policy calls for, since slot reassignment and intent merging are
//! inherently cross-field operations that a split lock can't make atomic.

pub mod state;

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::codec::{
    Alliance, AllianceColor, ControlFlags, InboundDatagram, JoystickData, MatchInfo, MatchType,
    Mode, OutboundStreamMessage, OutboundTag, RequestFlags, StatusFlags, TcpMessage, TelemetryData,
};
use crate::config::StationConfig;
use crate::connection::{self, joystick_descriptors, ConnectionState, EngineHandle, OutboundSnapshot};
use crate::error::OpenStationError;
use crate::hotkey::{self, Action};
use crate::input::slots::SlotTable;
use crate::input::{self, JoystickSink};
use crate::practice::{PracticeSequencer, PracticeTiming};

pub use state::RobotState;

/// Practice advances and snapshots publish on the same 20ms quantum (§4.4, §4.6).
const QUANTUM: Duration = Duration::from_millis(20);

struct Inner {
    control: ControlFlags,
    request: RequestFlags,
    alliance: Alliance,
    team_number: u16,
    use_usb: bool,
    slots: SlotTable,
    practice: PracticeSequencer,
    /// Set by `disable()` while Practice is running, cleared by `enable()`;
    /// forces `enabled=false` even on a tick where Practice's own intent
    /// would enable (§4.6 merge rule 2: operator Disable beats Practice Enable).
    operator_override_disable: bool,
    send_date_tag: bool,
    connection_state: ConnectionState,
    status: StatusFlags,
    battery_voltage: f32,
    telemetry: TelemetryData,
    trip_time_ms: f32,
    lost_packets: u32,
    code_running: bool,
    sequence: u64,
    game_data: String,
    match_info: Option<MatchInfo>,
    stream_version: u64,
    practice_elapsed_secs: f32,
    practice_remaining_secs: Option<f32>,
}

impl Inner {
    fn new(config: &StationConfig) -> Inner {
        Inner {
            control: ControlFlags::default(),
            request: RequestFlags::empty(),
            alliance: Alliance::default(),
            team_number: config.team_number,
            use_usb: config.use_usb,
            slots: SlotTable::with_locks(config.joystick_locks.clone()),
            practice: PracticeSequencer::new(config.practice_timing.into()),
            operator_override_disable: false,
            send_date_tag: false,
            connection_state: ConnectionState::Disconnected,
            status: StatusFlags::default(),
            battery_voltage: 0.0,
            telemetry: TelemetryData::default(),
            trip_time_ms: 0.0,
            lost_packets: 0,
            code_running: false,
            sequence: 0,
            game_data: config.game_data.clone(),
            match_info: None,
            stream_version: 0,
            practice_elapsed_secs: 0.0,
            practice_remaining_secs: None,
        }
    }

    fn bump_stream_version(&mut self) {
        self.stream_version += 1;
    }

    fn stream_messages(&self) -> Vec<OutboundStreamMessage> {
        let mut out = Vec::new();
        if !self.game_data.is_empty() {
            out.push(OutboundStreamMessage::GameData(self.game_data.clone()));
        }
        if let Some(info) = &self.match_info {
            out.push(OutboundStreamMessage::MatchInfo(info.clone()));
        }
        for descriptor in joystick_descriptors(&self.slots.snapshot()) {
            out.push(OutboundStreamMessage::JoystickDescriptor(descriptor));
        }
        out
    }

    fn snapshot(&self) -> RobotState {
        RobotState {
            connection: self.connection_state,
            control: self.control,
            status: self.status,
            battery_voltage: self.battery_voltage,
            brownout: self.status.brownout,
            code_running: self.code_running,
            telemetry: self.telemetry.clone(),
            joysticks: self.slots.snapshot(),
            practice_phase: self.practice.phase(),
            practice_elapsed_secs: self.practice_elapsed_secs,
            practice_remaining_secs: self.practice_remaining_secs,
            trip_time_ms: self.trip_time_ms,
            lost_packets: self.lost_packets,
            team_number: self.team_number,
            alliance: self.alliance,
            sequence: self.sequence,
        }
    }
}

/// The engine's single authoritative owner. Cheap to clone (an `Arc` wrapper);
/// every command method takes `&self` and locks briefly, never across an
/// `.await` (§5).
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Mutex<Inner>>,
    snapshot_tx: watch::Sender<RobotState>,
    rescan: input::RescanFlag,
}

impl Coordinator {
    pub fn new(config: &StationConfig) -> Coordinator {
        let inner = Inner::new(config);
        let (snapshot_tx, _rx) = watch::channel(inner.snapshot());
        Coordinator { inner: Arc::new(Mutex::new(inner)), snapshot_tx, rescan: input::rescan_flag() }
    }

    pub fn subscribe(&self) -> watch::Receiver<RobotState> {
        self.snapshot_tx.subscribe()
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut guard = self.inner.lock().unwrap();
        f(&mut guard)
    }

    // ---- command surface (§6) ----

    pub fn enable(&self) {
        self.with_inner(|inner| {
            inner.operator_override_disable = false;
            if !inner.practice.is_running() {
                inner.control.set_enabled(true);
            }
        });
    }

    pub fn disable(&self) {
        self.with_inner(|inner| {
            inner.operator_override_disable = true;
            inner.control.set_enabled(false);
        });
    }

    pub fn estop(&self) {
        self.with_inner(|inner| inner.control.estop());
    }

    /// Clears the estop latch. Not named in the distilled command list but
    /// required by §3's invariant ("only an explicit external reset" clears
    /// it) — there is otherwise no way to recover a station once estopped.
    pub fn reset_estop(&self) {
        self.with_inner(|inner| inner.control.reset_estop());
    }

    pub fn set_mode(&self, mode: Mode) {
        self.with_inner(|inner| {
            if !inner.practice.is_running() {
                inner.control.set_mode(mode);
            }
        });
    }

    pub fn set_team(&self, team: u32) -> crate::Result<()> {
        if team > 9999 {
            return Err(OpenStationError::InvalidTeamNumber(team));
        }
        self.with_inner(|inner| inner.team_number = team as u16);
        Ok(())
    }

    pub fn set_alliance(&self, color: AllianceColor, station: u8) -> crate::Result<()> {
        let alliance = Alliance::new(color, station)?;
        self.with_inner(|inner| inner.alliance = alliance);
        Ok(())
    }

    pub fn set_game_data(&self, data: impl Into<String>) -> crate::Result<()> {
        let data = data.into();
        if data.len() > 3 {
            return Err(OpenStationError::InvalidGameData(data.len()));
        }
        self.with_inner(|inner| {
            inner.game_data = data;
            inner.bump_stream_version();
        });
        Ok(())
    }

    pub fn set_match_info(&self, competition: impl Into<String>, match_type: MatchType) {
        self.with_inner(|inner| {
            inner.match_info = Some(MatchInfo { competition: competition.into(), match_type });
            inner.bump_stream_version();
        });
    }

    pub fn set_usb_mode(&self, use_usb: bool) {
        self.with_inner(|inner| inner.use_usb = use_usb);
    }

    pub fn reboot_controller(&self) {
        self.with_inner(|inner| inner.request.insert(RequestFlags::REBOOT_CONTROLLER));
    }

    pub fn restart_user_code(&self) {
        self.with_inner(|inner| inner.request.insert(RequestFlags::RESTART_USER_CODE));
    }

    pub fn start_practice(&self) {
        self.with_inner(|inner| {
            inner.practice.start();
            inner.operator_override_disable = false;
        });
    }

    pub fn stop_practice(&self) {
        self.with_inner(|inner| {
            inner.practice.stop();
            inner.control.set_enabled(false);
        });
    }

    pub fn set_practice_timing(&self, timing: PracticeTiming) {
        self.with_inner(|inner| inner.practice = PracticeSequencer::new(timing));
    }

    pub fn a_stop(&self) {
        self.with_inner(|inner| inner.practice.a_stop());
    }

    pub fn reorder_joysticks(&self, order: &[Uuid]) {
        self.with_inner(|inner| {
            inner.slots.reorder(order);
            inner.bump_stream_version();
        });
    }

    pub fn lock_joystick(&self, uuid: Uuid, slot: usize) -> crate::Result<()> {
        self.with_inner(|inner| inner.slots.lock(uuid, slot))
    }

    pub fn unlock_joystick(&self, uuid: Uuid) {
        self.with_inner(|inner| inner.slots.unlock(uuid));
    }

    pub fn rescan_joysticks(&self) {
        self.rescan.store(true, Ordering::Relaxed);
    }

    pub fn joystick_locks(&self) -> HashMap<Uuid, usize> {
        self.with_inner(|inner| inner.slots.locked_slots())
    }

    pub fn team_number(&self) -> u16 {
        self.with_inner(|inner| inner.team_number)
    }

    pub fn use_usb(&self) -> bool {
        self.with_inner(|inner| inner.use_usb)
    }

    /// Applies a hotkey action, enforcing the extra Enable guard §4.5 names
    /// ("rejected if not-connected, no code running, or estopped") that the
    /// bare `enable()` command surface does not itself impose.
    fn apply_hotkey_action(&self, action: Action) {
        match action {
            Action::EStop => self.estop(),
            Action::Disable => self.disable(),
            Action::AStop => self.a_stop(),
            Action::RescanJoysticks => self.rescan_joysticks(),
            Action::Enable => {
                let allowed = self.with_inner(|inner| {
                    !inner.control.estopped()
                        && matches!(inner.connection_state, ConnectionState::CodeRunning)
                });
                if allowed {
                    self.enable();
                } else {
                    tracing::debug!("hotkey enable rejected: not connected, no code running, or estopped");
                }
            }
        }
    }

    /// Advances Practice by one quantum, merges its intent per §4.6, and
    /// publishes a fresh snapshot. Called once per 20ms by [`Coordinator::run`];
    /// exposed publicly so embedders and tests can step the engine without a
    /// live runtime clock.
    pub fn tick(&self) {
        let snapshot = self.with_inner(|inner| {
            if inner.practice.is_running() {
                let practice_tick = inner.practice.advance(QUANTUM);
                inner.control.set_mode(practice_tick.mode);
                inner.control.set_enabled(!inner.operator_override_disable && practice_tick.enabled);
                inner.practice_elapsed_secs = practice_tick.elapsed_in_phase.as_secs_f32();
                inner.practice_remaining_secs =
                    practice_tick.remaining_in_phase.map(|d| d.as_secs_f32());
            } else {
                inner.practice_elapsed_secs = 0.0;
                inner.practice_remaining_secs = None;
            }
            inner.sequence += 1;
            inner.snapshot()
        });
        let _ = self.snapshot_tx.send(snapshot);
    }

    /// Spawns every long-lived task (§5) and runs until `shutdown` fires.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let engine: Arc<dyn EngineHandle> = self.clone();
        let sink: Arc<dyn JoystickSink> = self.clone();

        let input_shutdown = shutdown.clone();
        let input_sink = sink.clone();
        let rescan = self.rescan.clone();
        let input_thread = std::thread::spawn(move || match input::Poller::new() {
            Ok(poller) => input::run(poller, input_sink, rescan, input_shutdown),
            Err(err) => tracing::error!(?err, "gamepad backend failed to start"),
        });

        let (hotkey_tx, mut hotkey_rx) = hotkey::channel();
        hotkey::backend::spawn(hotkey_tx);

        let hotkey_self = self.clone();
        let hotkey_shutdown = shutdown.clone();
        let hotkey_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = hotkey_shutdown.cancelled() => break,
                    action = hotkey_rx.recv() => {
                        match action {
                            Some(action) => hotkey_self.apply_hotkey_action(action),
                            None => break,
                        }
                    }
                }
            }
        });

        let connection_engine = engine.clone();
        let connection_self = self.clone();
        let connection_shutdown = shutdown.clone();
        let connection_task = tokio::spawn(async move {
            connection_self.run_connection(connection_engine, connection_shutdown).await;
        });

        let tick_shutdown = shutdown.clone();
        let tick_self = self.clone();
        let tick_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(QUANTUM);
            loop {
                tokio::select! {
                    _ = tick_shutdown.cancelled() => break,
                    _ = interval.tick() => tick_self.tick(),
                }
            }
        });

        shutdown.cancelled().await;
        let _ = tokio::join!(hotkey_task, connection_task, tick_task);
        let _ = input_thread.join();
    }

    /// Resolves the controller address and drives the datagram + stream
    /// tasks, re-resolving whenever liveness is lost (§4.2).
    async fn run_connection(self: Arc<Self>, engine: Arc<dyn EngineHandle>, shutdown: CancellationToken) {
        let mut backoff = crate::connection::backoff::Backoff::new();

        while !shutdown.is_cancelled() {
            let (team, use_usb) = self.with_inner(|inner| {
                inner.connection_state = ConnectionState::Resolving;
                (inner.team_number, inner.use_usb)
            });
            let _ = self.snapshot_tx.send(self.with_inner(|inner| inner.snapshot()));

            let host = crate::connection::resolve::resolve(team, use_usb).await;

            let control_socket = match bind_connected(connection::CONTROL_PORT, &host).await {
                Ok(socket) => socket,
                Err(err) => {
                    tracing::warn!(%err, "failed to prepare control socket");
                    tokio::time::sleep(backoff.next_delay()).await;
                    continue;
                }
            };
            let telemetry_socket = match bind_telemetry().await {
                Ok(socket) => socket,
                Err(err) => {
                    tracing::warn!(%err, "failed to bind telemetry socket");
                    tokio::time::sleep(backoff.next_delay()).await;
                    continue;
                }
            };
            backoff.reset();

            let sent_log = Arc::new(Mutex::new(crate::connection::datagram::SentLog::new()));
            let send_shutdown = shutdown.clone();
            let recv_shutdown = shutdown.clone();
            let send_task = tokio::spawn(crate::connection::datagram::send_loop(
                control_socket,
                engine.clone(),
                sent_log.clone(),
                send_shutdown,
            ));
            let recv_task = tokio::spawn(crate::connection::datagram::receive_loop(
                telemetry_socket,
                engine.clone(),
                sent_log,
                recv_shutdown,
            ));
            let stream_shutdown = shutdown.clone();
            let stream_task =
                tokio::spawn(crate::connection::stream::run(host.clone(), engine.clone(), stream_shutdown));

            // These loops run until shutdown or the process ends; in this
            // architecture only a full shutdown tears them down; re-resolution
            // on liveness loss happens in place (the loops keep emitting, per
            // §4.2's "send loop continues emitting in Disconnected").
            let _ = tokio::join!(send_task, recv_task, stream_task);
        }
    }
}

async fn bind_connected(port: u16, host: &str) -> std::io::Result<Arc<tokio::net::UdpSocket>> {
    let socket = tokio::net::UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect((host, port)).await?;
    Ok(Arc::new(socket))
}

async fn bind_telemetry() -> std::io::Result<Arc<tokio::net::UdpSocket>> {
    let socket = tokio::net::UdpSocket::bind(("0.0.0.0", connection::TELEMETRY_PORT)).await?;
    Ok(Arc::new(socket))
}

impl EngineHandle for Coordinator {
    fn take_outbound_snapshot(&self) -> OutboundSnapshot {
        self.with_inner(|inner| {
            let request = inner.request;
            inner.request = RequestFlags::empty();
            let send_date_tag = inner.send_date_tag;
            inner.send_date_tag = false;

            let mut joystick_tags = Vec::new();
            if inner.practice.is_running() {
                joystick_tags.push(OutboundTag::Countdown(inner.practice_remaining_secs.unwrap_or(0.0)));
            }
            for slot in inner.slots.connected_in_order() {
                joystick_tags.push(OutboundTag::Joystick(slot.data.clone()));
            }

            OutboundSnapshot { control: inner.control, request, alliance: inner.alliance, joystick_tags, send_date_tag }
        })
    }

    fn apply_inbound(&self, datagram: InboundDatagram) {
        self.with_inner(|inner| {
            inner.status = datagram.status;
            inner.battery_voltage = datagram.battery_voltage;
            inner.telemetry = datagram.telemetry;
            if datagram.request_date {
                inner.send_date_tag = true;
            }
        });
    }

    fn set_connection_state(&self, state: ConnectionState) {
        let changed = self.with_inner(|inner| {
            let changed = inner.connection_state != state;
            inner.connection_state = state;
            if state == ConnectionState::CodeRunning {
                inner.code_running = true;
            } else if state == ConnectionState::Disconnected {
                inner.code_running = false;
            }
            changed
        });
        if changed {
            tracing::info!(?state, "connection state changed");
        }
    }

    fn report_trip_time(&self, trip: Duration) {
        self.with_inner(|inner| inner.trip_time_ms = trip.as_secs_f32() * 1000.0);
    }

    fn report_lost_packets(&self, gap: u32) {
        self.with_inner(|inner| inner.lost_packets = inner.lost_packets.saturating_add(gap));
    }

    fn request_date_tag(&self) {
        self.with_inner(|inner| inner.send_date_tag = true);
    }

    fn apply_tcp_message(&self, message: TcpMessage) {
        match &message {
            TcpMessage::Error(report) => tracing::warn!(?report, "controller reported an error"),
            TcpMessage::Stdout(line) => tracing::debug!(%line, "controller stdout"),
            _ => {}
        }
        // Forwarded to the UI collaborator's event bus at the transport layer
        // this crate doesn't own (§1 scope); logging here is the library's
        // own observable side effect.
    }

    fn stream_snapshot(&self) -> (u64, Vec<OutboundStreamMessage>) {
        self.with_inner(|inner| (inner.stream_version, inner.stream_messages()))
    }
}

impl JoystickSink for Coordinator {
    fn device_connected(&self, uuid: Uuid, name: &str, axis_count: u8, button_count: u8, hat_count: u8) {
        self.with_inner(|inner| {
            inner.slots.device_connected(uuid, name, axis_count, button_count, hat_count);
            inner.bump_stream_version();
        });
    }

    fn device_disconnected(&self, uuid: Uuid) {
        let disable_intent = self.with_inner(|inner| {
            let enabled = inner.control.enabled();
            let intent = inner.slots.device_disconnected(uuid, enabled);
            inner.bump_stream_version();
            intent
        });
        if disable_intent {
            tracing::warn!(%uuid, "joystick disconnected while supplying input; disabling");
            self.disable();
        }
    }

    fn update_data(&self, uuid: Uuid, data: JoystickData) {
        self.with_inner(|inner| inner.slots.update_data(uuid, data));
    }
}
