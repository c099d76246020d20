//! Record types stored in the three face tables.

use ndn_face_core::{Data, Interest, InterestFilter, Nack, Name};

use crate::controller::CommandOptions;
use crate::scheduler::TimerToken;
use crate::tables::RecordId;

/// Callback invoked when a pending Interest is satisfied.
pub type DataCallback = Box<dyn FnOnce(&Interest, &Data) + Send>;
/// Callback invoked when a pending Interest is nacked.
pub type NackCallback = Box<dyn FnOnce(&Interest, &Nack) + Send>;
/// Callback invoked when a pending Interest times out.
pub type TimeoutCallback = Box<dyn FnOnce(&Interest) + Send>;
/// Callback invoked for each Interest matching a filter.
pub type InterestCallback = Box<dyn FnMut(&InterestFilter, &Interest) + Send>;

/// Where a pending Interest record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingInterestOrigin {
    /// Expressed by the application.
    App,
    /// Received from the forwarder, awaiting a local response.
    Forwarder,
}

impl std::fmt::Display for PendingInterestOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PendingInterestOrigin::App => write!(f, "app"),
            PendingInterestOrigin::Forwarder => write!(f, "forwarder"),
        }
    }
}

/// One entry of the pending Interest table.
pub struct PendingInterest {
    interest: Interest,
    origin: PendingInterestOrigin,
    on_data: Option<DataCallback>,
    on_nack: Option<NackCallback>,
    on_timeout: Option<TimeoutCallback>,
    timeout_timer: Option<TimerToken>,
    least_severe_nack: Option<Nack>,
    n_not_nacked: usize,
}

impl PendingInterest {
    /// Creates an application-origin entry.
    pub fn new_app(
        interest: Interest,
        on_data: Option<DataCallback>,
        on_nack: Option<NackCallback>,
        on_timeout: Option<TimeoutCallback>,
    ) -> Self {
        Self {
            interest,
            origin: PendingInterestOrigin::App,
            on_data,
            on_nack,
            on_timeout,
            timeout_timer: None,
            least_severe_nack: None,
            n_not_nacked: 0,
        }
    }

    /// Creates a forwarder-origin entry for an incoming Interest.
    pub fn new_forwarder(interest: Interest) -> Self {
        Self {
            interest,
            origin: PendingInterestOrigin::Forwarder,
            on_data: None,
            on_nack: None,
            on_timeout: None,
            timeout_timer: None,
            least_severe_nack: None,
            n_not_nacked: 0,
        }
    }

    pub fn interest(&self) -> &Interest {
        &self.interest
    }

    pub fn origin(&self) -> PendingInterestOrigin {
        self.origin
    }

    /// Attaches the lifetime timer. The timer is cancelled when the
    /// entry is dropped, so removal and cancellation are atomic.
    pub fn set_timeout_timer(&mut self, token: TimerToken) {
        self.timeout_timer = Some(token);
    }

    /// Records that the Interest was handed to one more destination
    /// (the forwarder, or one matching local filter).
    pub fn record_forwarding(&mut self) {
        self.n_not_nacked += 1;
    }

    /// Records one incoming Nack against this entry.
    ///
    /// Keeps the least severe Nack seen so far. Returns it once every
    /// destination has answered with a Nack; an entry that was never
    /// forwarded anywhere ignores Nacks entirely.
    pub fn record_nack(&mut self, nack: &Nack) -> Option<Nack> {
        let keep_incoming = match &self.least_severe_nack {
            Some(current) => nack.reason().is_less_severe(current.reason()),
            None => true,
        };
        if keep_incoming {
            self.least_severe_nack = Some(nack.clone());
        }

        match self.n_not_nacked.checked_sub(1) {
            Some(remaining) => {
                self.n_not_nacked = remaining;
                if remaining == 0 {
                    self.least_severe_nack.clone()
                } else {
                    None
                }
            }
            None => None,
        }
    }

    /// Consumes the entry after matching Data arrived.
    pub fn satisfy(mut self, data: &Data) {
        if let Some(on_data) = self.on_data.take() {
            on_data(&self.interest, data);
        }
    }

    /// Consumes the entry after the coalesced Nack was produced.
    pub fn nacked(mut self, nack: &Nack) {
        if let Some(on_nack) = self.on_nack.take() {
            on_nack(&self.interest, nack);
        }
    }

    /// Consumes the entry after its lifetime expired.
    pub fn timed_out(mut self) {
        if let Some(on_timeout) = self.on_timeout.take() {
            on_timeout(&self.interest);
        }
    }
}

/// One entry of the interest filter table.
pub struct InterestFilterRecord {
    filter: InterestFilter,
    on_interest: Option<InterestCallback>,
}

impl InterestFilterRecord {
    pub fn new(filter: InterestFilter, on_interest: Option<InterestCallback>) -> Self {
        Self {
            filter,
            on_interest,
        }
    }

    pub fn filter(&self) -> &InterestFilter {
        &self.filter
    }

    /// Checks whether this record accepts an Interest of the given
    /// origin and name. Loopback-disallowing filters only see
    /// Interests that arrived from the transport.
    pub fn does_match(
        &self,
        origin: PendingInterestOrigin,
        name: &Name,
    ) -> Result<bool, ndn_face_core::Error> {
        if origin == PendingInterestOrigin::App && !self.filter.loopback_allowed() {
            return Ok(false);
        }
        self.filter.matches(name)
    }

    /// Delivers `interest` to the filter callback, if one is set.
    pub fn invoke(&mut self, interest: &Interest) {
        if let Some(on_interest) = &mut self.on_interest {
            on_interest(&self.filter, interest);
        }
    }
}

/// One entry of the registered prefix table.
pub struct RegisteredPrefix {
    prefix: Name,
    options: CommandOptions,
    filter_id: RecordId,
}

impl RegisteredPrefix {
    /// `filter_id` is 0 when no interest filter is coupled to this
    /// registration; otherwise the filter record lives and dies with
    /// this entry.
    pub fn new(prefix: Name, options: CommandOptions, filter_id: RecordId) -> Self {
        Self {
            prefix,
            options,
            filter_id,
        }
    }

    pub fn prefix(&self) -> &Name {
        &self.prefix
    }

    pub fn options(&self) -> &CommandOptions {
        &self.options
    }

    pub fn filter_id(&self) -> RecordId {
        self.filter_id
    }
}
