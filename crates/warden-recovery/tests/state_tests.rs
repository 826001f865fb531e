//! Backfill state machine legality, including a property check that session
//! transitions agree with the allowed-transition table.

use proptest::prelude::*;
use warden_core::CommandFailure;
use warden_recovery::{allowed_transitions, BackfillSession, BackfillState};
use warden_test_utils::{greet_command, guild_ctx};

#[test]
fn collecting_transitions() {
    let mut session = BackfillSession::bind(guild_ctx(1, 2), greet_command());
    assert!(session.transition(BackfillState::Abandoned).is_ok());

    let mut session = BackfillSession::bind(guild_ctx(1, 2), greet_command());
    assert!(session.transition(BackfillState::Complete).is_ok());

    // Collecting never loops back onto itself.
    let mut session = BackfillSession::bind(guild_ctx(1, 2), greet_command());
    assert!(session.transition(BackfillState::Collecting).is_err());
}

#[test]
fn terminal_states_are_sticky() {
    let mut session = BackfillSession::bind(guild_ctx(1, 2), greet_command());
    session.transition(BackfillState::Abandoned).unwrap();

    assert!(session.transition(BackfillState::Collecting).is_err());
    assert!(session.transition(BackfillState::Complete).is_err());
    assert_eq!(session.state, BackfillState::Abandoned);
}

#[test]
fn illegal_transition_reports_both_states() {
    let mut session = BackfillSession::bind(guild_ctx(1, 2), greet_command());
    session.transition(BackfillState::Complete).unwrap();
    let err = session.transition(BackfillState::Abandoned).unwrap_err();
    assert_eq!(err.from, BackfillState::Complete);
    assert_eq!(err.to, BackfillState::Abandoned);
    // The error renders both ends of the attempted move.
    let rendered = err.to_string();
    assert!(rendered.contains("Complete"));
    assert!(rendered.contains("Abandoned"));
}

#[test]
fn conversion_error_is_user_input_not_internal() {
    // The failure a rejected prompt submission re-routes as must classify as
    // an expected user-input condition, never as a new incident.
    let failure = CommandFailure::BadArgument("could not interpret `x`".to_string());
    assert_eq!(
        warden_core::classify(&failure),
        warden_core::FailureKind::Expected
    );
}

fn any_state() -> impl Strategy<Value = BackfillState> {
    prop_oneof![
        Just(BackfillState::Collecting),
        Just(BackfillState::Complete),
        Just(BackfillState::Abandoned),
    ]
}

proptest! {
    #[test]
    fn prop_transitions_agree_with_allowed_table(from in any_state(), to in any_state()) {
        let mut session = BackfillSession::bind(guild_ctx(1, 2), greet_command());
        session.state = from;

        let result = session.transition(to);
        let allowed = allowed_transitions(from);

        if result.is_ok() {
            prop_assert!(allowed.contains(&to));
            prop_assert_eq!(session.state, to);
        } else {
            prop_assert!(!allowed.contains(&to));
            prop_assert_eq!(session.state, from, "failed transition mutates nothing");
        }
    }

    #[test]
    fn prop_suggestions_never_fall_below_threshold(attempted in "[a-z]{1,8}") {
        let names = ["greet", "ping", "purge", "help"];
        if let Some(suggested) =
            warden_recovery::closest_command(&attempted, names.iter().copied(), 0.7)
        {
            let score = strsim::jaro_winkler(&attempted, suggested);
            prop_assert!(score >= 0.7);
        }
    }
}
