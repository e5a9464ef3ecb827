//! Client transaction state machines (RFC 3261 Section 17.1).

use std::time::Duration;

use bytes::Bytes;
use sipflow_sip_core::{Request, Response};
use tracing::{debug, trace};

use super::action::{Actions, TransactionAction};
use super::state::{validate_transition, TransactionKind, TransactionOutcome, TransactionState};
use super::timer::{TimerSettings, TimerType};
use super::utils::create_ack_for_non_2xx;
use super::TransactionKey;
use crate::errors::DialogResult;

/// An INVITE or non-INVITE client transaction
#[derive(Debug, Clone)]
pub struct ClientTransaction {
    key: TransactionKey,
    kind: TransactionKind,
    state: TransactionState,
    request: Request,
    request_bytes: Bytes,
    last_response: Option<Response>,
    /// ACK for a non-2xx, resent on every retransmitted final response
    ack: Option<Bytes>,
    reliable: bool,
    timers: TimerSettings,
    retransmit_interval: Duration,
    history: Vec<TransactionState>,
}

impl ClientTransaction {
    pub fn new(
        key: TransactionKey,
        request: Request,
        reliable: bool,
        timers: TimerSettings,
    ) -> Self {
        let kind = TransactionKind::client_for(&request.method);
        let state = kind.initial_state();
        ClientTransaction {
            key,
            kind,
            state,
            request_bytes: request.to_bytes(),
            request,
            last_response: None,
            ack: None,
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

    /// Every state entered so far, starting with the initial one
    pub fn history(&self) -> &[TransactionState] {
        &self.history
    }

    /// Sends the request and arms the initial timers
    pub fn start(&mut self) -> Actions {
        let mut actions = vec![TransactionAction::Transmit(self.request_bytes.clone())];
        let (retransmit, timeout) = match self.kind {
            TransactionKind::InviteClient => (TimerType::A, TimerType::B),
            _ => (TimerType::E, TimerType::F),
        };
        if !self.reliable {
            actions.push(TransactionAction::Schedule(retransmit, self.retransmit_interval));
        }
        actions.push(TransactionAction::Schedule(timeout, self.timers.initial(timeout)));
        actions
    }

    pub fn on_response(&mut self, response: Response) -> DialogResult<Actions> {
        match self.kind {
            TransactionKind::InviteClient => self.invite_response(response),
            _ => self.non_invite_response(response),
        }
    }

    fn invite_response(&mut self, response: Response) -> DialogResult<Actions> {
        use TransactionState::*;

        let status = response.status;
        let mut actions = Vec::new();

        match (self.state, status.is_provisional(), status.is_success()) {
            (Calling, true, _) => {
                self.transition(Proceeding)?;
                actions.push(TransactionAction::CancelTimer(TimerType::A));
                actions.push(TransactionAction::CancelTimer(TimerType::B));
                actions.push(TransactionAction::Deliver(response.clone()));
            }
            (Proceeding, true, _) => {
                actions.push(TransactionAction::Deliver(response.clone()));
            }
            (Calling | Proceeding, false, true) => {
                self.transition(Accepted)?;
                actions.push(TransactionAction::CancelTimer(TimerType::A));
                actions.push(TransactionAction::CancelTimer(TimerType::B));
                actions.push(TransactionAction::Schedule(
                    TimerType::M,
                    self.timers.initial(TimerType::M),
                ));
                actions.push(TransactionAction::Deliver(response.clone()));
            }
            (Calling | Proceeding, false, false) => {
                self.transition(Completed)?;
                let ack = create_ack_for_non_2xx(&self.request, &response)?.to_bytes();
                self.ack = Some(ack.clone());
                actions.push(TransactionAction::CancelTimer(TimerType::A));
                actions.push(TransactionAction::CancelTimer(TimerType::B));
                actions.push(TransactionAction::Transmit(ack));
                actions.push(TransactionAction::Deliver(response.clone()));
                if self.reliable {
                    self.transition(Terminated)?;
                    actions.push(TransactionAction::Terminated(TransactionOutcome::Rejected));
                } else {
                    actions.push(TransactionAction::Schedule(
                        TimerType::D,
                        self.timers.initial(TimerType::D),
                    ));
                }
            }
            (Completed, false, false) => {
                // retransmitted final response: resend the ACK only
                if let Some(ack) = &self.ack {
                    actions.push(TransactionAction::Transmit(ack.clone()));
                }
                return Ok(actions);
            }
            (Accepted, false, true) => {
                actions.push(TransactionAction::Deliver(response.clone()));
            }
            (state, _, _) => {
                trace!(id = %self.key, %state, status = status.as_u16(), "response absorbed");
                return Ok(actions);
            }
        }

        self.last_response = Some(response);
        Ok(actions)
    }

    fn non_invite_response(&mut self, response: Response) -> DialogResult<Actions> {
        use TransactionState::*;

        let status = response.status;
        let mut actions = Vec::new();

        match (self.state, status.is_provisional()) {
            (Trying, true) => {
                self.transition(Proceeding)?;
                actions.push(TransactionAction::Deliver(response.clone()));
            }
            (Proceeding, true) => {
                actions.push(TransactionAction::Deliver(response.clone()));
            }
            (Trying | Proceeding, false) => {
                self.transition(Completed)?;
                actions.push(TransactionAction::CancelTimer(TimerType::E));
                actions.push(TransactionAction::CancelTimer(TimerType::F));
                actions.push(TransactionAction::Deliver(response.clone()));
                if self.reliable {
                    self.transition(Terminated)?;
                    actions.push(TransactionAction::Terminated(outcome_for(&response)));
                } else {
                    actions.push(TransactionAction::Schedule(
                        TimerType::K,
                        self.timers.initial(TimerType::K),
                    ));
                }
            }
            (state, _) => {
                trace!(id = %self.key, %state, status = status.as_u16(), "response absorbed");
                return Ok(actions);
            }
        }

        self.last_response = Some(response);
        Ok(actions)
    }

    pub fn on_timer(&mut self, timer: TimerType) -> DialogResult<Actions> {
        use TransactionState::*;

        let mut actions = Vec::new();
        match (timer, self.state) {
            (TimerType::A, Calling) => {
                self.retransmit_interval *= 2;
                actions.push(TransactionAction::Transmit(self.request_bytes.clone()));
                actions.push(TransactionAction::Schedule(TimerType::A, self.retransmit_interval));
            }
            (TimerType::E, Trying) => {
                self.retransmit_interval = self.timers.backoff(self.retransmit_interval);
                actions.push(TransactionAction::Transmit(self.request_bytes.clone()));
                actions.push(TransactionAction::Schedule(TimerType::E, self.retransmit_interval));
            }
            (TimerType::E, Proceeding) => {
                self.retransmit_interval = self.timers.t2;
                actions.push(TransactionAction::Transmit(self.request_bytes.clone()));
                actions.push(TransactionAction::Schedule(TimerType::E, self.retransmit_interval));
            }
            (TimerType::B, Calling) | (TimerType::F, Trying | Proceeding) => {
                debug!(id = %self.key, %timer, "client transaction timed out");
                self.transition(Terminated)?;
                actions.push(TransactionAction::CancelTimer(TimerType::A));
                actions.push(TransactionAction::CancelTimer(TimerType::E));
                actions.push(TransactionAction::Terminated(TransactionOutcome::Timeout));
            }
            (TimerType::D, Completed) | (TimerType::K, Completed) | (TimerType::M, Accepted) => {
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

    /// A send for this transaction failed
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
        debug!(id = %self.key, from = %self.state, %to, "client transaction transition");
        self.state = to;
        self.history.push(to);
        Ok(())
    }
}

pub(crate) fn outcome_for(response: &Response) -> TransactionOutcome {
    if response.status.is_success() {
        TransactionOutcome::Accepted
    } else {
        TransactionOutcome::Rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::utils::request_builders::create_test_request;
    use crate::transaction::utils::create_response;
    use sipflow_sip_core::{Method, StatusCode};

    fn transaction(method: Method, reliable: bool) -> ClientTransaction {
        let request = create_test_request(method.clone());
        let key = TransactionKey::client("z9hG4bK776asdhds", method);
        ClientTransaction::new(key, request, reliable, TimerSettings::default())
    }

    fn respond(tx: &ClientTransaction, status: StatusCode) -> Response {
        create_response(tx.request(), status, Some("a6c85cf"))
    }

    fn scheduled(actions: &Actions) -> Vec<TimerType> {
        actions
            .iter()
            .filter_map(|a| match a {
                TransactionAction::Schedule(t, _) => Some(*t),
                _ => None,
            })
            .collect()
    }

    fn transmits(actions: &Actions) -> usize {
        actions
            .iter()
            .filter(|a| matches!(a, TransactionAction::Transmit(_)))
            .count()
    }

    #[test]
    fn test_start_arms_timers_by_reliability() {
        let mut udp = transaction(Method::Invite, false);
        let actions = udp.start();
        assert_eq!(transmits(&actions), 1);
        assert_eq!(scheduled(&actions), vec![TimerType::A, TimerType::B]);

        let mut tcp = transaction(Method::Options, true);
        assert_eq!(scheduled(&tcp.start()), vec![TimerType::F]);
    }

    #[test]
    fn test_invite_rejected_on_unreliable_transport() {
        let mut tx = transaction(Method::Invite, false);
        tx.start();

        let ringing = respond(&tx, StatusCode::Ringing);
        tx.on_response(ringing).unwrap();
        assert_eq!(tx.state(), TransactionState::Proceeding);

        let busy = respond(&tx, StatusCode::BusyHere);
        let actions = tx.on_response(busy.clone()).unwrap();
        assert_eq!(tx.state(), TransactionState::Completed);
        assert_eq!(transmits(&actions), 1);
        assert_eq!(scheduled(&actions), vec![TimerType::D]);

        // retransmitted 486 only resends the ACK
        let again = tx.on_response(busy).unwrap();
        assert_eq!(again.len(), 1);
        assert!(matches!(again[0], TransactionAction::Transmit(_)));

        let done = tx.on_timer(TimerType::D).unwrap();
        assert_eq!(done, vec![TransactionAction::Terminated(TransactionOutcome::Rejected)]);
        assert_eq!(
            tx.history(),
            &[
                TransactionState::Calling,
                TransactionState::Proceeding,
                TransactionState::Completed,
                TransactionState::Terminated
            ]
        );
    }

    #[test]
    fn test_invite_rejected_on_reliable_transport_terminates_at_once() {
        let mut tx = transaction(Method::Invite, true);
        tx.start();
        let actions = tx.on_response(respond(&tx, StatusCode::NotFound)).unwrap();
        assert_eq!(tx.state(), TransactionState::Terminated);
        assert!(actions.contains(&TransactionAction::Terminated(TransactionOutcome::Rejected)));
        assert!(scheduled(&actions).is_empty());
    }

    #[test]
    fn test_invite_accepted_absorbs_2xx_retransmissions() {
        let mut tx = transaction(Method::Invite, false);
        tx.start();
        let ok = respond(&tx, StatusCode::Ok);
        let actions = tx.on_response(ok.clone()).unwrap();
        assert_eq!(tx.state(), TransactionState::Accepted);
        assert_eq!(scheduled(&actions), vec![TimerType::M]);
        assert_eq!(transmits(&actions), 0);

        let again = tx.on_response(ok).unwrap();
        assert!(matches!(again.as_slice(), [TransactionAction::Deliver(_)]));

        let done = tx.on_timer(TimerType::M).unwrap();
        assert_eq!(done, vec![TransactionAction::Terminated(TransactionOutcome::Accepted)]);
    }

    #[test]
    fn test_timer_a_doubles_and_b_times_out() {
        let mut tx = transaction(Method::Invite, false);
        tx.start();
        let first = tx.on_timer(TimerType::A).unwrap();
        assert!(first.contains(&TransactionAction::Schedule(TimerType::A, Duration::from_secs(1))));
        let second = tx.on_timer(TimerType::A).unwrap();
        assert!(second.contains(&TransactionAction::Schedule(TimerType::A, Duration::from_secs(2))));

        let timeout = tx.on_timer(TimerType::B).unwrap();
        assert!(timeout.contains(&TransactionAction::Terminated(TransactionOutcome::Timeout)));
        assert_eq!(tx.state(), TransactionState::Terminated);

        // late timers are ignored
        assert!(tx.on_timer(TimerType::A).unwrap().is_empty());
    }

    #[test]
    fn test_timer_e_switches_to_t2_after_provisional() {
        let mut tx = transaction(Method::Bye, false);
        tx.start();
        tx.on_response(respond(&tx, StatusCode::Trying)).unwrap();
        assert_eq!(tx.state(), TransactionState::Proceeding);

        let actions = tx.on_timer(TimerType::E).unwrap();
        assert!(actions.contains(&TransactionAction::Schedule(TimerType::E, Duration::from_secs(4))));
    }

    #[test]
    fn test_non_invite_final_then_timer_k() {
        let mut tx = transaction(Method::Options, false);
        tx.start();
        let actions = tx.on_response(respond(&tx, StatusCode::Ok)).unwrap();
        assert_eq!(tx.state(), TransactionState::Completed);
        assert_eq!(scheduled(&actions), vec![TimerType::K]);

        // duplicates are absorbed in Completed
        assert!(tx.on_response(respond(&tx, StatusCode::Ok)).unwrap().is_empty());

        let done = tx.on_timer(TimerType::K).unwrap();
        assert_eq!(done, vec![TransactionAction::Terminated(TransactionOutcome::Accepted)]);
    }

    #[test]
    fn test_transport_error_terminates() {
        let mut tx = transaction(Method::Options, false);
        tx.start();
        let actions = tx.on_transport_error().unwrap();
        assert_eq!(
            actions,
            vec![TransactionAction::Terminated(TransactionOutcome::TransportError)]
        );
        assert!(tx.on_transport_error().unwrap().is_empty());
    }
}
