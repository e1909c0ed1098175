//! The connection state machine.
//!
//! Pure data and a pure `transition` function; all side effects are returned
//! as [`Action`]s for the orchestrator to execute. This keeps the
//! disconnect-old/connect-new sequencing testable without a manager or a
//! sound server.

use serde::{Deserialize, Serialize};

/// Which audio role a device is being bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Output,
    Input,
}

/// Target of a user-initiated connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Manager object path of the device.
    pub path: String,
    /// The role the device should become default for.
    pub role: Role,
    /// Display alias, used for progress reporting.
    pub label: String,
}

/// Machine states. At most one connection intent is in flight; terminal
/// success and failure both fold back to `Idle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    /// Waiting for the displaced device to disconnect before connecting the
    /// target. Any outcome proceeds to the connect.
    AwaitingDisconnect { target: Target },
    /// Waiting for the manager to resolve the connect call.
    AwaitingConnect { target: Target },
    /// Connected; waiting for the sound server to realize the card.
    AwaitingProfile { target: Target },
    /// Presence-driven reconnect chain of one or two previously-default
    /// devices. No defaults are touched; the sound server still holds them.
    Reconnecting {
        current: String,
        queued: Option<String>,
    },
}

/// Inputs to the machine. Completions of dispatched calls carry the
/// manager's error message when they failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// User picked a device. `current` and `other` are the device paths the
    /// sound server's defaults translate to for the requested role and the
    /// opposite role respectively (None when not a Bluetooth device).
    Request {
        target: Target,
        current: Option<String>,
        other: Option<String>,
    },
    /// The manager reappeared and these previously-default devices should be
    /// reconnected.
    Reconnect {
        primary: String,
        secondary: Option<String>,
    },
    /// A dispatched disconnect resolved. Failure never blocks the intent.
    DisconnectResolved { error: Option<String> },
    /// A dispatched connect resolved.
    ConnectResolved { error: Option<String> },
    /// The profile poll finished; `None` means the schedule was exhausted.
    ProfileResolved { profile: Option<String> },
    /// The manager service vanished; all in-flight intent state is void.
    ManagerLost,
    /// A user request arrived during a reconnect chain; the queued
    /// continuation is dropped in its favor.
    Superseded,
}

/// Side effects requested by a transition, executed in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Disconnect a device. Completion feeds `DisconnectResolved`; when the
    /// machine is already `Idle` the completion is a no-op (fire-and-forget
    /// disconnect of a displaced device).
    Disconnect { path: String },
    /// Dispatch trust and connect together. Only the connect outcome drives
    /// the machine; a trust failure is logged and swallowed.
    TrustAndConnect { path: String },
    /// Start the bounded profile poll for the device's card.
    PollProfile { path: String },
    /// The device is already physically connected for the other role: apply
    /// profile and default for `role` without touching the link.
    AdoptExisting { path: String, role: Role },
    /// Set the default sink to the device's sink under the discovered profile.
    ApplyOutput { path: String, profile: String },
    /// Force the head-unit profile and set the default source to the device.
    ApplyInput { path: String },
    NotifyStarted { label: String },
    NotifyFailed { reason: String },
    NotifySucceeded,
    RefreshDisplay,
}

/// Advances the machine. Events that do not apply in the current state (stale
/// completions, duplicate requests) leave it unchanged.
pub fn transition(
    state: ConnectionState,
    event: ConnectionEvent,
) -> (ConnectionState, Vec<Action>) {
    use ConnectionEvent as E;
    use ConnectionState as S;

    match (state, event) {
        (
            S::Idle,
            E::Request {
                target,
                current,
                other,
            },
        ) => request_from_idle(target, current, other),

        (S::AwaitingDisconnect { target }, E::DisconnectResolved { .. }) => {
            let connect = Action::TrustAndConnect {
                path: target.path.clone(),
            };
            (S::AwaitingConnect { target }, vec![connect])
        }

        (S::AwaitingConnect { .. }, E::ConnectResolved { error: Some(reason) }) => (
            S::Idle,
            vec![Action::NotifyFailed { reason }, Action::RefreshDisplay],
        ),

        (S::AwaitingConnect { target }, E::ConnectResolved { error: None }) => {
            let poll = Action::PollProfile {
                path: target.path.clone(),
            };
            (S::AwaitingProfile { target }, vec![poll])
        }

        (S::AwaitingProfile { target }, E::ProfileResolved { profile: Some(profile) }) => {
            let apply = match target.role {
                Role::Output => Action::ApplyOutput {
                    path: target.path,
                    profile,
                },
                Role::Input => Action::ApplyInput { path: target.path },
            };
            (
                S::Idle,
                vec![apply, Action::NotifySucceeded, Action::RefreshDisplay],
            )
        }

        (S::AwaitingProfile { .. }, E::ProfileResolved { profile: None }) => (
            S::Idle,
            vec![
                Action::NotifyFailed {
                    reason: "audio profile never became ready".to_owned(),
                },
                Action::RefreshDisplay,
            ],
        ),

        (S::Idle, E::Reconnect { primary, secondary }) => {
            let connect = Action::TrustAndConnect {
                path: primary.clone(),
            };
            (
                S::Reconnecting {
                    current: primary,
                    queued: secondary,
                },
                vec![connect],
            )
        }

        // The chain advances on any outcome; errors are logged by the
        // orchestrator and a missing device simply is not present yet.
        (S::Reconnecting { queued, .. }, E::ConnectResolved { .. }) => match queued {
            Some(next) => {
                let connect = Action::TrustAndConnect { path: next.clone() };
                (
                    S::Reconnecting {
                        current: next,
                        queued: None,
                    },
                    vec![connect],
                )
            }
            None => (S::Idle, vec![Action::RefreshDisplay]),
        },

        (S::Reconnecting { current, .. }, E::Superseded) => (
            S::Reconnecting {
                current,
                queued: None,
            },
            vec![],
        ),

        (_, E::ManagerLost) => (S::Idle, vec![]),

        (state, _) => (state, vec![]),
    }
}

fn request_from_idle(
    target: Target,
    current: Option<String>,
    other: Option<String>,
) -> (ConnectionState, Vec<Action>) {
    use ConnectionState as S;

    // Selecting the device that is already default for this role forces a
    // full disconnect/reconnect cycle rather than a no-op.
    if current.as_deref() == Some(target.path.as_str()) {
        let actions = vec![
            Action::NotifyStarted {
                label: target.label.clone(),
            },
            Action::Disconnect {
                path: target.path.clone(),
            },
        ];
        return (S::AwaitingDisconnect { target }, actions);
    }

    // The device is already connected as the other role's default: bind it to
    // this role too without touching the physical link, then drop the
    // displaced device.
    if other.as_deref() == Some(target.path.as_str()) {
        let mut actions = vec![Action::AdoptExisting {
            path: target.path,
            role: target.role,
        }];
        if let Some(old) = current {
            actions.push(Action::Disconnect { path: old });
        }
        actions.push(Action::RefreshDisplay);
        return (S::Idle, actions);
    }

    let started = Action::NotifyStarted {
        label: target.label.clone(),
    };

    // Disconnect the displaced device first, unless it is also bound to the
    // other role and must stay connected.
    match current {
        Some(old) if other.as_deref() != Some(old.as_str()) => {
            let actions = vec![started, Action::Disconnect { path: old }];
            (S::AwaitingDisconnect { target }, actions)
        }
        _ => {
            let actions = vec![
                started,
                Action::TrustAndConnect {
                    path: target.path.clone(),
                },
            ];
            (S::AwaitingConnect { target }, actions)
        }
    }
}
