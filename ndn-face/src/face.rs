//! The application face.
//!
//! All mutable state (the three record tables, the transport, the
//! controller) is owned by a single driver task; public methods post
//! commands onto it through an unbounded channel and return
//! immediately. Callbacks fire on the driver task, in FIFO order of
//! the events that queued them. Handles hold a weak reference to the
//! channel, so cancellation is thread-safe, idempotent, and a no-op
//! once the face is gone.
//!
//! Packet log lines start with a direction symbol ('<' outgoing,
//! '>' incoming) and a type symbol ('I' Interest, 'D' Data,
//! 'N' Nack); prefix registration is logged at INFO level.

use bytes::Bytes;
use log::{debug, info, warn};
use ndn_face_core::error::PacketKind;
use ndn_face_core::lp::{finish_encoding, LpPacket, NetPacket};
use ndn_face_core::{Data, Interest, InterestFilter, Nack, Name};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};

use crate::config::ClientConfig;
use crate::controller::{
    CommandOptions, Controller, ControlParameters, ControlResponse, PrefixAnnouncement,
    RibCommand, Signer, ERROR_NACK, ERROR_TIMEOUT,
};
use crate::error::Error;
use crate::metrics::FaceMetrics;
use crate::records::{
    DataCallback, InterestCallback, InterestFilterRecord, NackCallback, PendingInterest,
    PendingInterestOrigin, RegisteredPrefix, TimeoutCallback,
};
use crate::scheduler::Scheduler;
use crate::tables::{IdAllocator, RecordContainer, RecordId};
use crate::transport::{make_default_transport, Transport, TransportState};

/// Callback invoked when a prefix registration succeeds.
pub type RegisterPrefixSuccessCallback = Box<dyn FnOnce(&Name) + Send>;
/// Callback invoked when a prefix registration fails.
pub type RegisterPrefixFailureCallback = Box<dyn FnOnce(&Name, &str) + Send>;
/// Callback invoked when a prefix unregistration succeeds.
pub type UnregisterSuccessCallback = Box<dyn FnOnce() + Send>;
/// Callback invoked when a prefix unregistration fails.
pub type UnregisterFailureCallback = Box<dyn FnOnce(&str) + Send>;

/// Continuation of an in-flight management command.
type CommandCallback = Box<dyn FnOnce(ControlResponse) + Send>;

/// Failure text for handles whose registration no longer exists.
const UNRECOGNIZED_PREFIX_ID: &str = "Unrecognized registered prefix id";

/// Carry-over state of a registration awaiting its command response.
struct RegistrationState {
    id: RecordId,
    prefix: Name,
    options: CommandOptions,
    filter: Option<(InterestFilter, Option<InterestCallback>)>,
    on_success: Option<RegisterPrefixSuccessCallback>,
    on_failure: Option<RegisterPrefixFailureCallback>,
}

/// Messages processed by the driver task.
enum Command {
    EnsureConnected {
        want_resume: bool,
    },
    Express {
        id: RecordId,
        interest: Interest,
        wire: Bytes,
        on_data: Option<DataCallback>,
        on_nack: Option<NackCallback>,
        on_timeout: Option<TimeoutCallback>,
    },
    RemovePending(RecordId),
    RemoveAllPending,
    PutData {
        data: Data,
        wire: Bytes,
    },
    PutNack {
        nack: Nack,
    },
    SetFilter {
        id: RecordId,
        filter: InterestFilter,
        on_interest: Option<InterestCallback>,
    },
    UnsetFilter(RecordId),
    Register(RegistrationState, u64, Option<PrefixAnnouncement>),
    CompleteRegister(RegistrationState),
    Unregister {
        id: RecordId,
        on_success: Option<UnregisterSuccessCallback>,
        on_failure: Option<UnregisterFailureCallback>,
    },
    FinalizeUnregister {
        id: RecordId,
        on_success: Option<UnregisterSuccessCallback>,
    },
    Receive(Bytes),
    PendingTimeout(RecordId),
    CheckIdle,
    Shutdown,
}

/* ---------------------------------------------------------------- *
 * Public face
 * ---------------------------------------------------------------- */

/// The application-side endpoint of the NDN stack.
///
/// Cloning is cheap and yields another handle to the same face; the
/// driver shuts down when the last clone is dropped.
#[derive(Clone)]
pub struct Face {
    cmd: UnboundedSender<Command>,
    pit_ids: IdAllocator,
    ift_ids: IdAllocator,
    rpt_ids: IdAllocator,
    pit_len: Arc<AtomicUsize>,
    metrics: Arc<FaceMetrics>,
}

impl Face {
    /// Creates a face over the default transport, resolved from the
    /// environment and the client configuration. Must be called from
    /// within a tokio runtime.
    pub fn new(signer: Arc<dyn Signer>) -> Result<Self, Error> {
        let config = ClientConfig::load()?;
        let transport = make_default_transport(&config)?;
        Ok(Self::with_transport(transport, signer))
    }

    /// Creates a face over an explicit transport. Must be called from
    /// within a tokio runtime.
    pub fn with_transport(transport: Box<dyn Transport>, signer: Arc<dyn Signer>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let weak = cmd_tx.downgrade();

        let mut pit = RecordContainer::new();
        let mut ift = RecordContainer::new();
        let mut rpt = RecordContainer::new();

        // The pause-when-idle check must run on a later loop turn, never
        // from inside the erase that emptied the table: a pause/resume
        // flip inside a user callback would race the transport read loop.
        let check_tx = weak.clone();
        let post_check_idle = move || {
            if let Some(tx) = check_tx.upgrade() {
                let _ = tx.send(Command::CheckIdle);
            }
        };
        pit.set_on_empty(post_check_idle.clone());
        rpt.set_on_empty(post_check_idle);

        let pit_ids = pit.id_allocator();
        let ift_ids = ift.id_allocator();
        let rpt_ids = rpt.id_allocator();
        let pit_len = Arc::new(AtomicUsize::new(0));
        let metrics = Arc::new(FaceMetrics::new());

        let driver = FaceImpl {
            self_tx: weak.clone(),
            transport,
            scheduler: Scheduler::new(weak),
            controller: Controller::new(signer),
            pit,
            ift,
            rpt,
            pit_len: Arc::clone(&pit_len),
            metrics: Arc::clone(&metrics),
        };
        tokio::spawn(driver.run(cmd_rx));

        let face = Self {
            cmd: cmd_tx,
            pit_ids,
            ift_ids,
            rpt_ids,
            pit_len,
            metrics,
        };
        face.post(Command::EnsureConnected { want_resume: false });
        face
    }

    fn post(&self, command: Command) {
        let _ = self.cmd.send(command);
    }

    /// Expresses an Interest toward the forwarder.
    ///
    /// At most one of the three callbacks is ever invoked: `on_data`
    /// when matching Data arrives, `on_nack` when the Interest is
    /// nacked, `on_timeout` when its lifetime expires. Cancelling the
    /// returned handle suppresses all of them.
    pub fn express_interest(
        &self,
        mut interest: Interest,
        on_data: Option<DataCallback>,
        on_nack: Option<NackCallback>,
        on_timeout: Option<TimeoutCallback>,
    ) -> Result<PendingInterestHandle, Error> {
        interest.ensure_nonce();
        let lp = LpPacket::for_interest(&interest);
        let wire = finish_encoding(&lp, interest.encode(), PacketKind::Interest, interest.name())
            .map_err(Error::Core)?;

        let id = self.pit_ids.allocate();
        self.post(Command::Express {
            id,
            interest,
            wire,
            on_data,
            on_nack,
            on_timeout,
        });
        Ok(PendingInterestHandle {
            cmd: self.cmd.downgrade(),
            id,
        })
    }

    /// Removes every pending Interest without invoking callbacks.
    pub fn remove_all_pending_interests(&self) {
        self.post(Command::RemoveAllPending);
    }

    /// Number of currently pending Interests.
    pub fn n_pending_interests(&self) -> usize {
        self.pit_len.load(Ordering::Relaxed)
    }

    /// Publishes Data.
    ///
    /// Every matching pending Interest is consumed; the Data is
    /// transmitted unless it was satisfied locally only.
    pub fn put(&self, data: Data) -> Result<(), Error> {
        let lp = LpPacket::for_data(&data);
        let wire = finish_encoding(&lp, data.encode(), PacketKind::Data, data.name())
            .map_err(Error::Core)?;
        self.post(Command::PutData { data, wire });
        Ok(())
    }

    /// Publishes a Nack for a previously received Interest.
    ///
    /// The Nack is transmitted only once every destination of the
    /// Interest has nacked, carrying the least severe reason observed.
    pub fn put_nack(&self, nack: Nack) -> Result<(), Error> {
        // size check up front; the coalesced Nack differs only in header
        let lp = LpPacket::for_nack(&nack);
        finish_encoding(
            &lp,
            nack.interest().encode(),
            PacketKind::Nack,
            nack.interest().name(),
        )
        .map_err(Error::Core)?;
        self.post(Command::PutNack { nack });
        Ok(())
    }

    /// Installs an Interest filter without registering anything with
    /// the forwarder.
    pub fn set_interest_filter(
        &self,
        filter: impl Into<InterestFilter>,
        on_interest: Option<InterestCallback>,
    ) -> InterestFilterHandle {
        let id = self.ift_ids.allocate();
        self.post(Command::SetFilter {
            id,
            filter: filter.into(),
            on_interest,
        });
        InterestFilterHandle {
            cmd: self.cmd.downgrade(),
            id,
        }
    }

    /// Registers `prefix` with the forwarder, optionally coupling an
    /// Interest filter whose lifetime is bound to the registration.
    pub fn register_prefix(
        &self,
        prefix: Name,
        flags: u64,
        options: CommandOptions,
        filter: Option<(InterestFilter, Option<InterestCallback>)>,
        on_success: Option<RegisterPrefixSuccessCallback>,
        on_failure: Option<RegisterPrefixFailureCallback>,
    ) -> RegisteredPrefixHandle {
        let id = self.rpt_ids.allocate();
        self.post(Command::Register(
            RegistrationState {
                id,
                prefix,
                options,
                filter,
                on_success,
                on_failure,
            },
            flags,
            None,
        ));
        RegisteredPrefixHandle {
            cmd: self.cmd.downgrade(),
            id,
        }
    }

    /// Announces a prefix via a signed prefix announcement object.
    pub fn announce_prefix(
        &self,
        announcement: PrefixAnnouncement,
        options: CommandOptions,
        on_success: Option<RegisterPrefixSuccessCallback>,
        on_failure: Option<RegisterPrefixFailureCallback>,
    ) -> RegisteredPrefixHandle {
        let id = self.rpt_ids.allocate();
        let prefix = announcement.announced_name.clone();
        self.post(Command::Register(
            RegistrationState {
                id,
                prefix,
                options,
                filter: None,
                on_success,
                on_failure,
            },
            0,
            Some(announcement),
        ));
        RegisteredPrefixHandle {
            cmd: self.cmd.downgrade(),
            id,
        }
    }

    /// Clears all three tables (cancelling every timeout) and closes
    /// the transport.
    pub fn shutdown(&self) {
        self.post(Command::Shutdown);
    }

    /// Traffic counters of this face.
    pub fn metrics(&self) -> Arc<FaceMetrics> {
        Arc::clone(&self.metrics)
    }
}

/* ---------------------------------------------------------------- *
 * Handles
 * ---------------------------------------------------------------- */

/// Handle of an expressed Interest.
#[derive(Debug)]
pub struct PendingInterestHandle {
    cmd: WeakUnboundedSender<Command>,
    id: RecordId,
}

impl PendingInterestHandle {
    /// Cancels the pending Interest; no callback will fire. Idempotent
    /// and safe after the face is destroyed.
    pub fn cancel(&self) {
        if let Some(tx) = self.cmd.upgrade() {
            let _ = tx.send(Command::RemovePending(self.id));
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }
}

/// Handle of an installed Interest filter.
pub struct InterestFilterHandle {
    cmd: WeakUnboundedSender<Command>,
    id: RecordId,
}

impl InterestFilterHandle {
    /// Removes the filter. Idempotent and safe after the face is
    /// destroyed.
    pub fn cancel(&self) {
        if let Some(tx) = self.cmd.upgrade() {
            let _ = tx.send(Command::UnsetFilter(self.id));
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }
}

/// Handle of a prefix registration.
pub struct RegisteredPrefixHandle {
    cmd: WeakUnboundedSender<Command>,
    id: RecordId,
}

impl RegisteredPrefixHandle {
    /// Unregisters the prefix and erases its coupled filter, without
    /// completion callbacks. Idempotent and safe after the face is
    /// destroyed.
    pub fn cancel(&self) {
        if let Some(tx) = self.cmd.upgrade() {
            let _ = tx.send(Command::Unregister {
                id: self.id,
                on_success: None,
                on_failure: None,
            });
        }
    }

    /// Unregisters the prefix with completion callbacks. A handle
    /// whose registration no longer exists (already unregistered, or
    /// the face is gone) fails with an "Unrecognized" message and no
    /// network effect.
    pub fn unregister(
        &self,
        on_success: Option<UnregisterSuccessCallback>,
        on_failure: Option<UnregisterFailureCallback>,
    ) {
        match self.cmd.upgrade() {
            Some(tx) => {
                let _ = tx.send(Command::Unregister {
                    id: self.id,
                    on_success,
                    on_failure,
                });
            }
            None => {
                if let Some(on_failure) = on_failure {
                    on_failure(UNRECOGNIZED_PREFIX_ID);
                }
            }
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }
}

/* ---------------------------------------------------------------- *
 * Driver
 * ---------------------------------------------------------------- */

struct FaceImpl {
    self_tx: WeakUnboundedSender<Command>,
    transport: Box<dyn Transport>,
    scheduler: Scheduler<Command>,
    controller: Controller,
    pit: RecordContainer<PendingInterest>,
    ift: RecordContainer<InterestFilterRecord>,
    rpt: RecordContainer<RegisteredPrefix>,
    pit_len: Arc<AtomicUsize>,
    metrics: Arc<FaceMetrics>,
}

impl FaceImpl {
    async fn run(mut self, mut rx: UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            if let Err(e) = self.handle(command) {
                warn!("face loop error: {e}");
            }
        }
        self.shutdown();
    }

    fn handle(&mut self, command: Command) -> Result<(), Error> {
        match command {
            Command::EnsureConnected { want_resume } => self.ensure_connected(want_resume),
            Command::Express {
                id,
                interest,
                wire,
                on_data,
                on_nack,
                on_timeout,
            } => self.express(id, interest, wire, on_data, on_nack, on_timeout),
            Command::RemovePending(id) => {
                self.pit.erase(id);
                self.sync_pit_len();
                Ok(())
            }
            Command::RemoveAllPending => {
                self.pit.clear();
                self.sync_pit_len();
                Ok(())
            }
            Command::PutData { data, wire } => self.put_data(&data, wire),
            Command::PutNack { nack } => self.put_nack(&nack),
            Command::SetFilter {
                id,
                filter,
                on_interest,
            } => {
                info!("setting interest filter: {filter}");
                self.ift.put(id, InterestFilterRecord::new(filter, on_interest));
                Ok(())
            }
            Command::UnsetFilter(id) => {
                if let Some(record) = self.ift.erase(id) {
                    info!("unsetting interest filter: {}", record.filter());
                }
                Ok(())
            }
            Command::Register(state, flags, announcement) => {
                self.register(state, flags, announcement)
            }
            Command::CompleteRegister(state) => self.complete_register(state),
            Command::Unregister {
                id,
                on_success,
                on_failure,
            } => self.unregister(id, on_success, on_failure),
            Command::FinalizeUnregister { id, on_success } => {
                if let Some(record) = self.rpt.erase(id) {
                    info!("unregistered prefix: {}", record.prefix());
                    if let Some(on_success) = on_success {
                        on_success();
                    }
                }
                Ok(())
            }
            Command::Receive(block) => self.receive(block),
            Command::PendingTimeout(id) => {
                if let Some(entry) = self.pit.erase(id) {
                    debug!("   timeout {}", entry.interest());
                    self.sync_pit_len();
                    entry.timed_out();
                }
                Ok(())
            }
            Command::CheckIdle => {
                if self.pit.is_empty()
                    && self.rpt.is_empty()
                    && self.transport.state() == TransportState::Running
                {
                    debug!("pausing transport: no pending Interests and no registered prefixes");
                    self.transport.pause();
                }
                Ok(())
            }
            Command::Shutdown => {
                self.shutdown();
                Ok(())
            }
        }
    }

    fn sync_pit_len(&self) {
        self.pit_len.store(self.pit.len(), Ordering::Relaxed);
    }

    fn ensure_connected(&mut self, want_resume: bool) -> Result<(), Error> {
        if self.transport.state() == TransportState::Closed {
            let tx = self.self_tx.clone();
            self.transport.connect(Box::new(move |block| {
                if let Some(tx) = tx.upgrade() {
                    let _ = tx.send(Command::Receive(block));
                }
            }))?;
        }
        if want_resume && self.transport.state() == TransportState::Paused {
            self.transport.resume();
        }
        Ok(())
    }

    /* -------------------------------- consumer ------------------- */

    fn express(
        &mut self,
        id: RecordId,
        interest: Interest,
        wire: Bytes,
        on_data: Option<DataCallback>,
        on_nack: Option<NackCallback>,
        on_timeout: Option<TimeoutCallback>,
    ) -> Result<(), Error> {
        debug!("<I {interest}");
        self.ensure_connected(true)?;

        let mut entry = PendingInterest::new_app(interest, on_data, on_nack, on_timeout);
        let token = self
            .scheduler
            .schedule(entry.interest().lifetime, Command::PendingTimeout(id));
        entry.set_timeout_timer(token);
        entry.record_forwarding();
        let interest = entry.interest().clone();
        self.pit.put(id, entry);
        self.sync_pit_len();

        self.metrics.interests_sent.increment();
        self.metrics.bytes_sent.add(wire.len() as u64);
        self.transport.send(wire)?;

        self.dispatch_interest(id, PendingInterestOrigin::App, &interest)
    }

    /// Removes every pending Interest matching `data`, invoking the
    /// data callback of application-origin entries.
    ///
    /// Returns whether the Data should be sent to the forwarder: it is
    /// kept local only when an application match consumed it and no
    /// forwarder-origin entry was waiting for it.
    fn satisfy_pending_interests(&mut self, data: &Data) -> bool {
        let matching: Vec<RecordId> = self
            .pit
            .ids()
            .into_iter()
            .filter(|&id| {
                self.pit
                    .get(id)
                    .map_or(false, |entry| entry.interest().matches_data(data))
            })
            .collect();

        let mut has_app_match = false;
        let mut has_forwarder_match = false;
        for id in matching {
            let Some(entry) = self.pit.erase(id) else {
                continue;
            };
            self.sync_pit_len();
            debug!("   satisfying {} from {}", entry.interest(), entry.origin());
            match entry.origin() {
                PendingInterestOrigin::App => {
                    has_app_match = true;
                    entry.satisfy(data);
                }
                PendingInterestOrigin::Forwarder => has_forwarder_match = true,
            }
        }

        has_forwarder_match || !has_app_match
    }

    /// Records `nack` against every pending Interest it matches.
    ///
    /// Returns the coalesced Nack to send to the forwarder, if a
    /// forwarder-origin entry completed its aggregation.
    fn nack_pending_interests(&mut self, nack: &Nack) -> Option<Nack> {
        let matching: Vec<RecordId> = self
            .pit
            .ids()
            .into_iter()
            .filter(|&id| {
                self.pit
                    .get(id)
                    .map_or(false, |entry| nack.interest().matches_interest(entry.interest()))
            })
            .collect();

        let mut out_nack = None;
        for id in matching {
            let coalesced = match self.pit.get_mut(id) {
                Some(entry) => {
                    debug!("   nacking {} from {}", entry.interest(), entry.origin());
                    entry.record_nack(nack)
                }
                None => continue,
            };
            let Some(coalesced) = coalesced else {
                continue;
            };

            if let Some(entry) = self.pit.erase(id) {
                self.sync_pit_len();
                match entry.origin() {
                    PendingInterestOrigin::App => entry.nacked(&coalesced),
                    PendingInterestOrigin::Forwarder => out_nack = Some(coalesced),
                }
            }
        }
        out_nack
    }

    /* -------------------------------- producer ------------------- */

    fn put_data(&mut self, data: &Data, wire: Bytes) -> Result<(), Error> {
        debug!("<D {}", data.name());
        if !self.satisfy_pending_interests(data) {
            return Ok(());
        }

        self.ensure_connected(true)?;
        self.metrics.data_sent.increment();
        self.metrics.bytes_sent.add(wire.len() as u64);
        self.transport.send(wire)
    }

    fn put_nack(&mut self, nack: &Nack) -> Result<(), Error> {
        debug!("<N {}~{}", nack.interest(), nack.reason());
        let Some(out_nack) = self.nack_pending_interests(nack) else {
            return Ok(());
        };

        self.ensure_connected(true)?;
        let lp = LpPacket::for_nack(&out_nack);
        let wire = finish_encoding(
            &lp,
            out_nack.interest().encode(),
            PacketKind::Nack,
            out_nack.interest().name(),
        )
        .map_err(Error::Core)?;
        self.metrics.nacks_sent.increment();
        self.metrics.bytes_sent.add(wire.len() as u64);
        self.transport.send(wire)
    }

    /// Inserts a forwarder-origin entry for an incoming Interest and
    /// fans it out to the matching filters.
    fn process_incoming_interest(&mut self, interest: Interest) -> Result<(), Error> {
        let id = self.pit.allocate_id();
        let mut entry = PendingInterest::new_forwarder(interest);
        let token = self
            .scheduler
            .schedule(entry.interest().lifetime, Command::PendingTimeout(id));
        entry.set_timeout_timer(token);
        let interest = entry.interest().clone();
        self.pit.put(id, entry);
        self.sync_pit_len();

        self.dispatch_interest(id, PendingInterestOrigin::Forwarder, &interest)
    }

    /// Delivers `interest` to every filter accepting it, counting each
    /// delivery as one more destination of the pending entry.
    fn dispatch_interest(
        &mut self,
        pit_id: RecordId,
        origin: PendingInterestOrigin,
        interest: &Interest,
    ) -> Result<(), Error> {
        for filter_id in self.ift.ids() {
            let matched = match self.ift.get(filter_id) {
                Some(record) => record
                    .does_match(origin, interest.name())
                    .map_err(Error::Core)?,
                None => continue,
            };
            if !matched {
                continue;
            }

            if let Some(record) = self.ift.get(filter_id) {
                debug!("   matches {}", record.filter());
            }
            if let Some(entry) = self.pit.get_mut(pit_id) {
                entry.record_forwarding();
            }
            if let Some(record) = self.ift.get_mut(filter_id) {
                record.invoke(interest);
            }
        }
        Ok(())
    }

    /* -------------------------------- registration --------------- */

    fn register(
        &mut self,
        state: RegistrationState,
        flags: u64,
        announcement: Option<PrefixAnnouncement>,
    ) -> Result<(), Error> {
        info!("registering prefix: {}", state.prefix);

        let built = match &announcement {
            None => {
                let params = ControlParameters {
                    name: Some(state.prefix.clone()),
                    flags: Some(flags),
                    ..ControlParameters::default()
                };
                self.controller
                    .make_command(RibCommand::Register, &params, &state.options, None)
            }
            Some(announcement) => announcement
                .to_data(self.controller.signer())
                .map(|data| data.encode())
                .and_then(|payload| {
                    let params = ControlParameters::for_name(state.prefix.clone());
                    self.controller.make_command(
                        RibCommand::Announce,
                        &params,
                        &state.options,
                        Some(payload),
                    )
                }),
        };

        let interest = match built {
            Ok(interest) => interest,
            Err(e) => {
                info!("register prefix failed: {}", state.prefix);
                if let Some(on_failure) = state.on_failure {
                    on_failure(&state.prefix, &e.to_string());
                }
                return Ok(());
            }
        };

        let tx = self.self_tx.clone();
        let mut state = state;
        let on_response: CommandCallback = Box::new(move |response| {
            if response.is_success() {
                if let Some(tx) = tx.upgrade() {
                    let _ = tx.send(Command::CompleteRegister(state));
                }
            } else {
                info!("register prefix failed: {}", state.prefix);
                if let Some(on_failure) = state.on_failure.take() {
                    on_failure(&state.prefix, &response.text);
                }
            }
        });
        self.start_command(interest, on_response)
    }

    fn complete_register(&mut self, state: RegistrationState) -> Result<(), Error> {
        let RegistrationState {
            id,
            prefix,
            options,
            filter,
            on_success,
            ..
        } = state;

        let filter_id = match filter {
            Some((filter, on_interest)) => {
                info!("setting interest filter: {filter}");
                let filter_id = self.ift.allocate_id();
                self.ift
                    .put(filter_id, InterestFilterRecord::new(filter, on_interest));
                filter_id
            }
            None => 0,
        };

        self.rpt
            .put(id, RegisteredPrefix::new(prefix.clone(), options, filter_id));
        info!("registered prefix: {prefix}");

        // a registered producer must keep receiving even if the PIT
        // momentarily drained while the command was in flight
        self.ensure_connected(true)?;

        if let Some(on_success) = on_success {
            on_success(&prefix);
        }
        Ok(())
    }

    fn unregister(
        &mut self,
        id: RecordId,
        on_success: Option<UnregisterSuccessCallback>,
        on_failure: Option<UnregisterFailureCallback>,
    ) -> Result<(), Error> {
        let Some(record) = self.rpt.get(id) else {
            if let Some(on_failure) = on_failure {
                on_failure(UNRECOGNIZED_PREFIX_ID);
            }
            return Ok(());
        };
        let prefix = record.prefix().clone();
        let options = record.options().clone();
        let filter_id = record.filter_id();

        if filter_id != 0 {
            if let Some(filter_record) = self.ift.erase(filter_id) {
                info!("unsetting interest filter: {}", filter_record.filter());
            }
        }

        info!("unregistering prefix: {prefix}");
        let params = ControlParameters::for_name(prefix.clone());
        let interest =
            self.controller
                .make_command(RibCommand::Unregister, &params, &options, None)?;

        let tx = self.self_tx.clone();
        let on_response: CommandCallback = Box::new(move |response| {
            if response.is_success() {
                if let Some(tx) = tx.upgrade() {
                    let _ = tx.send(Command::FinalizeUnregister { id, on_success });
                }
            } else {
                info!("unregister prefix failed: {prefix}");
                if let Some(on_failure) = on_failure {
                    on_failure(&response.text);
                }
            }
        });
        self.start_command(interest, on_response)
    }

    /// Expresses a signed command Interest through this face's own
    /// pending Interest machinery, mapping the three-way outcome onto
    /// one `ControlResponse` continuation.
    fn start_command(
        &mut self,
        interest: Interest,
        on_response: CommandCallback,
    ) -> Result<(), Error> {
        let shared = Arc::new(Mutex::new(Some(on_response)));
        let fire = move |response: ControlResponse| {
            if let Ok(mut guard) = shared.lock() {
                if let Some(callback) = guard.take() {
                    callback(response);
                }
            }
        };

        let fire_data = fire.clone();
        let on_data: DataCallback = Box::new(move |_interest, data| {
            let response = Controller::parse_response(data).unwrap_or_else(|e| {
                ControlResponse::new(
                    crate::controller::ERROR_SERVER,
                    format!("ControlResponse decoding failure: {e}"),
                )
            });
            fire_data(response);
        });

        let fire_nack = fire.clone();
        let on_nack: NackCallback = Box::new(move |_interest, nack| {
            fire_nack(ControlResponse::new(
                ERROR_NACK,
                format!("received Nack: {}", nack.reason()),
            ));
        });

        let on_timeout: TimeoutCallback = Box::new(move |_interest| {
            fire(ControlResponse::new(ERROR_TIMEOUT, "request timed out"));
        });

        let mut interest = interest;
        interest.ensure_nonce();
        let lp = LpPacket::for_interest(&interest);
        let wire = finish_encoding(&lp, interest.encode(), PacketKind::Interest, interest.name())
            .map_err(Error::Core)?;
        let id = self.pit.allocate_id();
        self.express(id, interest, wire, Some(on_data), Some(on_nack), Some(on_timeout))
    }

    /* -------------------------------- incoming ------------------- */

    fn receive(&mut self, block: Bytes) -> Result<(), Error> {
        self.metrics.bytes_received.add(block.len() as u64);
        match NetPacket::decode(&block).map_err(Error::Core)? {
            NetPacket::Interest(interest) => {
                debug!(">I {interest}");
                self.metrics.interests_received.increment();
                self.process_incoming_interest(interest)
            }
            NetPacket::Data(data) => {
                debug!(">D {}", data.name());
                self.metrics.data_received.increment();
                self.satisfy_pending_interests(&data);
                Ok(())
            }
            NetPacket::Nack(nack) => {
                debug!(">N {}~{}", nack.interest(), nack.reason());
                self.metrics.nacks_received.increment();
                self.nack_pending_interests(&nack);
                Ok(())
            }
        }
    }

    fn shutdown(&mut self) {
        debug!("shutting down face");
        self.pit.clear();
        self.sync_pit_len();
        self.ift.clear();
        self.rpt.clear();
        if self.transport.state() != TransportState::Closed {
            self.transport.close();
        }
    }
}
