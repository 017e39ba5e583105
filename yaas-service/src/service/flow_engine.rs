//! # Flow Engine
//!
//! Owns mutation of [`Flow`] records (spec §3, §4.1). Encodes the legal
//! transitions as an explicit table keyed by `(FlowType, FlowState)` rather
//! than nested conditionals, per spec §9 - this is what makes property 1
//! ("every observed transition is in the edge set") testable by
//! enumeration instead of by reading branches.

use shared::errors::ApiError;
use uuid::Uuid;

use crate::domain::{Flow, FlowFieldError, FlowState, FlowType, NewFlow};
use crate::repository::FlowRepository;

/// The legal `(from, to)` edges per flow type (spec §4.1). `ChooseMethod`
/// and `RedirectToProvider` both fork from `Initiated`/one another so the
/// table lists every edge individually rather than compressing branches.
const LOGIN_EDGES: &[(FlowState, FlowState)] = &[
    (FlowState::Initiated, FlowState::ChooseMethod),
    (FlowState::ChooseMethod, FlowState::EnterCredentials),
    (FlowState::EnterCredentials, FlowState::Success),
    (FlowState::EnterCredentials, FlowState::Failed),
    (FlowState::ChooseMethod, FlowState::RedirectToProvider),
    (FlowState::RedirectToProvider, FlowState::AwaitingCallback),
    (FlowState::AwaitingCallback, FlowState::ProcessingCallback),
    (FlowState::ProcessingCallback, FlowState::Success),
    (FlowState::ProcessingCallback, FlowState::Failed),
];

const REGISTRATION_EDGES: &[(FlowState, FlowState)] = &[
    (FlowState::Initiated, FlowState::EnterDetails),
    (FlowState::EnterDetails, FlowState::VerifyEmail),
    (FlowState::EnterDetails, FlowState::Success),
    (FlowState::EnterDetails, FlowState::Failed),
    (FlowState::VerifyEmail, FlowState::Success),
    (FlowState::VerifyEmail, FlowState::Failed),
];

const LOGOUT_EDGES: &[(FlowState, FlowState)] = &[
    (FlowState::Initiated, FlowState::ConfirmLogout),
    (FlowState::ConfirmLogout, FlowState::LogoutComplete),
    (FlowState::ConfirmLogout, FlowState::Failed),
];

/// `OAuth2Login` rides the same redirect branch as `Login` (spec §4.1:
/// "embedded in Login"), so it shares the login edge set rather than
/// duplicating it.
fn edges_for(flow_type: FlowType) -> &'static [(FlowState, FlowState)] {
    match flow_type {
        FlowType::Login | FlowType::OAuth2Login => LOGIN_EDGES,
        FlowType::Registration => REGISTRATION_EDGES,
        FlowType::Logout => LOGOUT_EDGES,
    }
}

/// The initial state a freshly initiated flow of each type starts in.
fn initial_state(flow_type: FlowType) -> FlowState {
    match flow_type {
        FlowType::Login | FlowType::OAuth2Login | FlowType::Logout => FlowState::Initiated,
        FlowType::Registration => FlowState::EnterDetails,
    }
}

fn is_legal_transition(flow_type: FlowType, from: FlowState, to: FlowState) -> bool {
    edges_for(flow_type).contains(&(from, to))
}

/// The outcome of asking the engine to move a flow to a state it may or
/// may not be allowed to reach.
#[derive(Debug, Clone)]
pub struct FlowTransitionOutcome {
    pub flow: Flow,
}

/// Wraps [`FlowRepository`] with the transition table; the repository
/// itself enforces nothing (spec §3: "intentionally dumb").
#[derive(Debug, Clone)]
pub struct FlowEngine {
    repository: FlowRepository,
}

impl FlowEngine {
    pub fn new(repository: FlowRepository) -> Self {
        Self { repository }
    }

    /// Starts a new flow of `flow_type` at its initial state.
    pub async fn initiate(&self, flow_type: FlowType, request_url: String) -> Result<Flow, ApiError> {
        self.repository
            .create(NewFlow { flow_type, state: initial_state(flow_type), request_url })
            .await
    }

    /// Loads a flow fresh, rejecting it outright if missing or expired
    /// (spec §3: "an expired flow is immutable... returns a gone error").
    /// Callers that need to advance the flow should use [`Self::transition`]
    /// instead, which performs this same load internally.
    pub async fn load(&self, flow_id: Uuid) -> Result<Flow, ApiError> {
        let flow = self.repository.find_by_id(flow_id).await?.ok_or(ApiError::FlowNotFound)?;
        if flow.is_expired() {
            return Err(ApiError::FlowExpired);
        }
        Ok(flow)
    }

    /// Attempts to move `flow_id` from its current persisted state to
    /// `target`. Returns `InvalidFlowState` if the edge isn't in the table,
    /// `FlowExpired`/`FlowNotFound` per the usual load rules, and refuses
    /// to move a terminal flow at all (spec §3: "terminal states accept no
    /// further proceed").
    pub async fn transition(
        &self,
        flow_id: Uuid,
        target: FlowState,
        errors: Vec<FlowFieldError>,
    ) -> Result<FlowTransitionOutcome, ApiError> {
        let flow = self.load(flow_id).await?;

        if flow.is_terminal() {
            return Err(ApiError::InvalidFlowState);
        }
        if !is_legal_transition(flow.flow_type, flow.state, target) {
            return Err(ApiError::InvalidFlowState);
        }

        let updated = self.repository.update_state(flow_id, target, errors).await?;
        Ok(FlowTransitionOutcome { flow: updated })
    }

    /// Records a recoverable failure without leaving the current state
    /// (spec §4.1: "the flow remains in the prior state when a transition
    /// produces a recoverable error"). Used for e.g. a wrong password,
    /// where the flow should stay at `EnterCredentials` with an attached
    /// field error rather than move to `Failed`.
    pub async fn attach_recoverable_error(
        &self,
        flow_id: Uuid,
        current_state: FlowState,
        errors: Vec<FlowFieldError>,
    ) -> Result<Flow, ApiError> {
        self.repository.update_state(flow_id, current_state, errors).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_password_branch_is_legal() {
        assert!(is_legal_transition(FlowType::Login, FlowState::Initiated, FlowState::ChooseMethod));
        assert!(is_legal_transition(FlowType::Login, FlowState::ChooseMethod, FlowState::EnterCredentials));
        assert!(is_legal_transition(FlowType::Login, FlowState::EnterCredentials, FlowState::Success));
        assert!(is_legal_transition(FlowType::Login, FlowState::EnterCredentials, FlowState::Failed));
    }

    #[test]
    fn login_oauth_branch_is_legal() {
        assert!(is_legal_transition(FlowType::Login, FlowState::ChooseMethod, FlowState::RedirectToProvider));
        assert!(is_legal_transition(FlowType::Login, FlowState::RedirectToProvider, FlowState::AwaitingCallback));
        assert!(is_legal_transition(FlowType::Login, FlowState::AwaitingCallback, FlowState::ProcessingCallback));
        assert!(is_legal_transition(FlowType::Login, FlowState::ProcessingCallback, FlowState::Success));
    }

    #[test]
    fn oauth2_login_type_shares_login_edges() {
        assert!(is_legal_transition(FlowType::OAuth2Login, FlowState::ChooseMethod, FlowState::RedirectToProvider));
    }

    #[test]
    fn registration_edges_include_optional_verify_email() {
        assert!(is_legal_transition(FlowType::Registration, FlowState::Initiated, FlowState::EnterDetails));
        assert!(is_legal_transition(FlowType::Registration, FlowState::EnterDetails, FlowState::Success));
        assert!(is_legal_transition(FlowType::Registration, FlowState::EnterDetails, FlowState::VerifyEmail));
        assert!(is_legal_transition(FlowType::Registration, FlowState::VerifyEmail, FlowState::Success));
    }

    #[test]
    fn logout_edges_are_linear() {
        assert!(is_legal_transition(FlowType::Logout, FlowState::Initiated, FlowState::ConfirmLogout));
        assert!(is_legal_transition(FlowType::Logout, FlowState::ConfirmLogout, FlowState::LogoutComplete));
    }

    #[test]
    fn cross_type_and_reversed_edges_are_illegal() {
        assert!(!is_legal_transition(FlowType::Login, FlowState::Initiated, FlowState::EnterDetails));
        assert!(!is_legal_transition(FlowType::Login, FlowState::Success, FlowState::EnterCredentials));
        assert!(!is_legal_transition(FlowType::Logout, FlowState::Initiated, FlowState::LogoutComplete));
        assert!(!is_legal_transition(FlowType::Registration, FlowState::VerifyEmail, FlowState::EnterDetails));
    }

    #[test]
    fn initial_states_match_spec() {
        assert_eq!(initial_state(FlowType::Login), FlowState::Initiated);
        assert_eq!(initial_state(FlowType::Logout), FlowState::Initiated);
        assert_eq!(initial_state(FlowType::Registration), FlowState::EnterDetails);
    }

    #[test]
    fn every_edge_table_is_free_of_self_loops() {
        for table in [LOGIN_EDGES, REGISTRATION_EDGES, LOGOUT_EDGES] {
            for (from, to) in table {
                assert_ne!(from, to, "self-loop found in transition table");
            }
        }
    }
}
