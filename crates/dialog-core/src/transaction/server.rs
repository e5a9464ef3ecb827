//! Server transaction state machines (RFC 3261 Section 17.2).

use std::time::Duration;

use bytes::Bytes;
use sipflow_sip_core::{Request, Response, StatusCode};
use tracing::{debug, trace};

use super::action::{Actions, TransactionAction};
use super::client::outcome_for;
use super::state::{validate_transition, TransactionKind, TransactionOutcome, TransactionState};
use super::timer::{TimerSettings, TimerType};
use super::utils::create_response;
use super::TransactionKey;
use crate::errors::DialogResult;

/// An INVITE or non-INVITE server transaction
#[derive(Debug, Clone)]
pub struct ServerTransaction {
    key: TransactionKey,
    kind: TransactionKind,
    state: TransactionState,
    request: Request,
    last_response: Option<Response>,
    last_response_bytes: Option<Bytes>,
    reliable: bool,
    timers: TimerSettings,
    retransmit_interval: Duration,
    history: Vec<TransactionState>,
}

impl ServerTransaction {
    pub fn new(
        key: TransactionKey,
        request: Request,
        reliable: bool,
        timers: TimerSettings,
    ) -> Self {
        let kind = TransactionKind::server_for(&request.method);
        let state = kind.initial_state();
        ServerTransaction {
            key,
            kind,
            state,
            request,
            last_response: None,
            last_response_bytes: None,
            reliable,
            timers,
            retransmit_interval: timers.t1,
            history: vec![state],
        }
    }

    pub fn key(&self) -> &TransactionKey {
        &self.key
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn last_response(&self) -> Option<&Response> {
        self.last_response.as_ref()
    }

    pub fn history(&self) -> &[TransactionState] {
        &self.history
    }

    /// INVITE server transactions answer 100 Trying straight away
    pub fn start(&mut self) -> Actions {
        match self.kind {
            TransactionKind::InviteServer => {
                let trying = create_response(&self.request, StatusCode::Trying, None);
                let bytes = trying.to_bytes();
                self.last_response = Some(trying);
                self.last_response_bytes = Some(bytes.clone());
                vec![TransactionAction::Transmit(bytes)]
            }
            _ => Vec::new(),
        }
    }

    /// Sends a response from the transaction user
    ///
    /// A response the current state cannot send (a second final response, or
    /// any response after termination) fails with `IllegalStateTransition`
    /// and leaves the transaction untouched.
    pub fn send_response(&mut self, response: Response) -> DialogResult<Actions> {
        use TransactionState::*;

        let status = response.status;
        let target = match (self.kind, status.is_provisional(), status.is_success()) {
            (TransactionKind::InviteServer, true, _) => Proceeding,
            (TransactionKind::InviteServer, false, true) => Accepted,
            (TransactionKind::InviteServer, false, false) => Completed,
            (_, true, _) => Proceeding,
            (_, false, _) => Completed,
        };
        // repeated provisionals keep the transaction in Proceeding
        let repeat_provisional = self.state == Proceeding && target == Proceeding;
        if !repeat_provisional {
            validate_transition(self.kind, self.state, target)?;
        }

        let bytes = response.to_bytes();
        let mut actions = vec![TransactionAction::Transmit(bytes.clone())];

        if target != self.state {
            self.transition(target)?;
        }

        match target {
            Accepted => {
                actions.push(TransactionAction::Schedule(
                    TimerType::L,
                    self.timers.initial(TimerType::L),
                ));
            }
            Completed if self.kind == TransactionKind::InviteServer => {
                if !self.reliable {
                    actions.push(TransactionAction::Schedule(TimerType::G, self.retransmit_interval));
                }
                actions.push(TransactionAction::Schedule(
                    TimerType::H,
                    self.timers.initial(TimerType::H),
                ));
            }
            Completed => {
                if self.reliable {
                    self.transition(Terminated)?;
                    actions.push(TransactionAction::Terminated(outcome_for(&response)));
                } else {
                    actions.push(TransactionAction::Schedule(
                        TimerType::J,
                        self.timers.initial(TimerType::J),
                    ));
                }
            }
            _ => {}
        }

        self.last_response = Some(response);
        self.last_response_bytes = Some(bytes);
        Ok(actions)
    }

    /// A retransmission of the request that created this transaction
    pub fn on_request(&mut self, request: &Request) -> Actions {
        use TransactionState::*;

        if request.method != self.request.method {
            trace!(id = %self.key, method = %request.method, "unexpected method absorbed");
            return Vec::new();
        }

        match (self.state, &self.last_response_bytes) {
            (Proceeding | Completed | Accepted, Some(bytes)) => {
                debug!(id = %self.key, state = %self.state, "retransmitting last response");
                vec![TransactionAction::Transmit(bytes.clone())]
            }
            _ => Vec::new(),
        }
    }

    /// ACK sharing this INVITE transaction's branch (non-2xx ACK)
    pub fn on_ack(&mut self) -> DialogResult<Actions> {
        if self.kind != TransactionKind::InviteServer || self.state != TransactionState::Completed {
            trace!(id = %self.key, state = %self.state, "ACK absorbed");
            return Ok(Vec::new());
        }

        self.transition(TransactionState::Confirmed)?;
        let mut actions = vec![
            TransactionAction::CancelTimer(TimerType::G),
            TransactionAction::CancelTimer(TimerType::H),
        ];
        if self.reliable {
            self.transition(TransactionState::Terminated)?;
            actions.push(TransactionAction::Terminated(TransactionOutcome::Rejected));
        } else {
            actions.push(TransactionAction::Schedule(
                TimerType::I,
                self.timers.initial(TimerType::I),
            ));
        }
        Ok(actions)
    }

    /// ACK for the 2xx sent from Accepted, routed here through the dialog
    pub fn on_2xx_ack(&mut self) -> DialogResult<Actions> {
        if self.state != TransactionState::Accepted {
            return Ok(Vec::new());
        }
        self.transition(TransactionState::Terminated)?;
        Ok(vec![
            TransactionAction::CancelTimer(TimerType::L),
            TransactionAction::Terminated(TransactionOutcome::Accepted),
        ])
    }

    pub fn on_timer(&mut self, timer: TimerType) -> DialogResult<Actions> {
        use TransactionState::*;

        let mut actions = Vec::new();
        match (timer, self.state) {
            (TimerType::G, Completed) => {
                self.retransmit_interval = self.timers.backoff(self.retransmit_interval);
                if let Some(bytes) = &self.last_response_bytes {
                    actions.push(TransactionAction::Transmit(bytes.clone()));
                }
                actions.push(TransactionAction::Schedule(TimerType::G, self.retransmit_interval));
            }
            (TimerType::H, Completed) => {
                debug!(id = %self.key, "no ACK before timer H");
                self.transition(Terminated)?;
                actions.push(TransactionAction::CancelTimer(TimerType::G));
                actions.push(TransactionAction::Terminated(TransactionOutcome::Timeout));
            }
            (TimerType::I, Confirmed) | (TimerType::J, Completed) | (TimerType::L, Accepted) => {
                self.transition(Terminated)?;
                let outcome = self
                    .last_response
                    .as_ref()
                    .map(outcome_for)
                    .unwrap_or(TransactionOutcome::Rejected);
                actions.push(TransactionAction::Terminated(outcome));
            }
            (timer, state) => {
                trace!(id = %self.key, %timer, %state, "timer ignored in this state");
            }
        }
        Ok(actions)
    }

    pub fn on_transport_error(&mut self) -> DialogResult<Actions> {
        if self.state == TransactionState::Terminated {
            return Ok(Vec::new());
        }
        self.transition(TransactionState::Terminated)?;
        Ok(vec![TransactionAction::Terminated(
            TransactionOutcome::TransportError,
        )])
    }

    fn transition(&mut self, to: TransactionState) -> DialogResult<()> {
        validate_transition(self.kind, self.state, to)?;
        debug!(id = %self.key, from = %self.state, %to, "server transaction transition");
        self.state = to;
        self.history.push(to);
        Ok(())
    }
}
