#![cfg(test)]

use crate::module_system::lifecycle::{FailurePolicy, LifecycleStage, ModuleState};

#[test]
fn forward_chain_is_legal() {
    let chain = [
        ModuleState::Discovered,
        ModuleState::Validated,
        ModuleState::Loaded,
        ModuleState::Initialized,
        ModuleState::Configured,
        ModuleState::Started,
        ModuleState::Stopped,
        ModuleState::Unloaded,
    ];
    for pair in chain.windows(2) {
        assert!(
            pair[0].can_transition_to(&pair[1]),
            "{} -> {} should be legal",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn skipping_stages_is_illegal() {
    assert!(!ModuleState::Loaded.can_transition_to(&ModuleState::Started));
    assert!(!ModuleState::Discovered.can_transition_to(&ModuleState::Loaded));
}

#[test]
fn going_backwards_is_illegal() {
    assert!(!ModuleState::Started.can_transition_to(&ModuleState::Configured));
    // A stopped module cannot restart without a fresh load.
    assert!(!ModuleState::Stopped.can_transition_to(&ModuleState::Started));
}

#[test]
fn failed_is_reachable_from_any_live_state() {
    let failed = ModuleState::failed(LifecycleStage::Start, "boom");
    assert!(ModuleState::Discovered.can_transition_to(&failed));
    assert!(ModuleState::Started.can_transition_to(&failed));
    assert!(ModuleState::Stopped.can_transition_to(&failed));
}

#[test]
fn terminal_states_admit_nothing() {
    let failed = ModuleState::failed(LifecycleStage::Start, "boom");
    assert!(!failed.can_transition_to(&ModuleState::Stopped));
    assert!(!failed.can_transition_to(&ModuleState::failed(LifecycleStage::Stop, "again")));
    assert!(!ModuleState::Unloaded.can_transition_to(&failed));
}

#[test]
fn failure_policy_parses_config_values() {
    assert_eq!(
        "fail-fast".parse::<FailurePolicy>().unwrap(),
        FailurePolicy::FailFast
    );
    assert_eq!(
        "continue".parse::<FailurePolicy>().unwrap(),
        FailurePolicy::Continue
    );
    assert!("abort".parse::<FailurePolicy>().is_err());
}

#[test]
fn failed_state_displays_stage_and_error() {
    let failed = ModuleState::failed(LifecycleStage::StopTimeout, "ignored cancellation");
    assert_eq!(failed.to_string(), "failed(stop-timeout: ignored cancellation)");
}
