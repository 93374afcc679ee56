//! Notification and exact-alarm permission gate.
//!
//! # Responsibility
//! - Model the authorization flow preceding a user-initiated scheduling
//!   attempt as an explicit state machine.
//! - Drive the machine against a platform `PermissionProbe`.
//!
//! # Invariants
//! - Every attempt starts at `Checking`; `AllGranted`, `Denied` and
//!   `Cancelled` are terminal for that attempt.
//! - Entering `Denied` performs exactly one remedial navigation action, for
//!   the first missing capability (notification before exact alarm).
//! - `transition` is pure; side effects are returned, never performed.

use log::{info, warn};
use std::sync::mpsc::{self, Receiver, TryRecvError};

/// Gate state for one scheduling attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Checking,
    AllGranted,
    NeedsExplanation,
    Requesting,
    Denied,
    /// The user dismissed the explanation.
    Cancelled,
}

impl PermissionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::AllGranted => "all_granted",
            Self::NeedsExplanation => "needs_explanation",
            Self::Requesting => "requesting",
            Self::Denied => "denied",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::AllGranted | Self::Denied | Self::Cancelled)
    }

    pub fn allows_scheduling(self) -> bool {
        self == Self::AllGranted
    }
}

/// Inputs that move the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionEvent {
    /// Current capability snapshot read while `Checking`.
    Probed { notification: bool, exact_alarm: bool },
    UserConfirmed,
    UserDismissed,
    /// Outcome of the notification request plus the exact-alarm capability
    /// read right after it.
    RequestResolved { notification: bool, exact_alarm: bool },
}

/// OS settings surface opened when a capability is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemedialAction {
    OpenNotificationSettings,
    OpenExactAlarmSettings,
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionEffect {
    RequestNotificationCapability,
    Remedial(RemedialAction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: PermissionState,
    pub effect: Option<PermissionEffect>,
}

impl Transition {
    fn to(next: PermissionState) -> Self {
        Self { next, effect: None }
    }

    fn with(next: PermissionState, effect: PermissionEffect) -> Self {
        Self {
            next,
            effect: Some(effect),
        }
    }
}

/// Computes the next gate state. Events that do not apply to `state` leave
/// it unchanged with no effect.
pub fn transition(state: PermissionState, event: PermissionEvent) -> Transition {
    use PermissionEvent as E;
    use PermissionState as S;

    match (state, event) {
        (
            S::Checking,
            E::Probed {
                notification: true,
                exact_alarm: true,
            },
        ) => Transition::to(S::AllGranted),
        (S::Checking, E::Probed { .. }) => Transition::to(S::NeedsExplanation),
        (S::NeedsExplanation, E::UserConfirmed) => Transition::with(
            S::Requesting,
            PermissionEffect::RequestNotificationCapability,
        ),
        (S::NeedsExplanation, E::UserDismissed) => Transition::to(S::Cancelled),
        (
            S::Requesting,
            E::RequestResolved {
                notification: false,
                ..
            },
        ) => Transition::with(
            S::Denied,
            PermissionEffect::Remedial(RemedialAction::OpenNotificationSettings),
        ),
        (
            S::Requesting,
            E::RequestResolved {
                notification: true,
                exact_alarm: false,
            },
        ) => Transition::with(
            S::Denied,
            PermissionEffect::Remedial(RemedialAction::OpenExactAlarmSettings),
        ),
        (
            S::Requesting,
            E::RequestResolved {
                notification: true,
                exact_alarm: true,
            },
        ) => Transition::to(S::AllGranted),
        (unchanged, _) => Transition::to(unchanged),
    }
}

/// Platform authorization probe.
pub trait PermissionProbe {
    fn has_notification_capability(&self) -> bool;
    fn has_exact_alarm_capability(&self) -> bool;
    /// Prompts the user. `callback` receives whether notifications were
    /// granted and may run on any thread, before or after this returns.
    fn request_notification_capability(&self, callback: Box<dyn FnOnce(bool) + Send>);
    fn open_notification_settings(&self);
    fn open_exact_alarm_settings(&self);
}

/// Drives one permission attempt against a probe.
pub struct PermissionFlow<'p, P: PermissionProbe + ?Sized> {
    probe: &'p P,
    state: PermissionState,
    pending_request: Option<Receiver<bool>>,
    remedial: Option<RemedialAction>,
}

impl<'p, P: PermissionProbe + ?Sized> PermissionFlow<'p, P> {
    /// Starts a fresh attempt in `Checking`.
    pub fn new(probe: &'p P) -> Self {
        Self {
            probe,
            state: PermissionState::Checking,
            pending_request: None,
            remedial: None,
        }
    }

    pub fn state(&self) -> PermissionState {
        self.state
    }

    /// Remedial action performed by this attempt, if any.
    pub fn remedial_action(&self) -> Option<RemedialAction> {
        self.remedial
    }

    /// Reads current capabilities and leaves `Checking`.
    pub fn check(&mut self) -> PermissionState {
        let event = PermissionEvent::Probed {
            notification: self.probe.has_notification_capability(),
            exact_alarm: self.probe.has_exact_alarm_capability(),
        };
        self.apply(event)
    }

    /// User accepted the explanation; issues the notification request.
    pub fn confirm(&mut self) -> PermissionState {
        self.apply(PermissionEvent::UserConfirmed)
    }

    /// User dismissed the explanation.
    pub fn dismiss(&mut self) -> PermissionState {
        self.apply(PermissionEvent::UserDismissed)
    }

    /// Resolves the outstanding request if its callback already ran.
    pub fn poll_request(&mut self) -> PermissionState {
        let Some(receiver) = self.pending_request.as_ref() else {
            return self.state;
        };
        match receiver.try_recv() {
            Ok(granted) => self.resolve_request(granted),
            Err(TryRecvError::Empty) => self.state,
            Err(TryRecvError::Disconnected) => self.resolve_request(false),
        }
    }

    /// Blocks until the outstanding request resolves.
    ///
    /// A callback dropped without being invoked counts as a denial.
    pub fn wait_request(&mut self) -> PermissionState {
        let Some(receiver) = self.pending_request.as_ref() else {
            return self.state;
        };
        let granted = receiver.recv().unwrap_or(false);
        self.resolve_request(granted)
    }

    fn resolve_request(&mut self, notification: bool) -> PermissionState {
        self.pending_request = None;
        let event = PermissionEvent::RequestResolved {
            notification,
            exact_alarm: notification && self.probe.has_exact_alarm_capability(),
        };
        self.apply(event)
    }

    fn apply(&mut self, event: PermissionEvent) -> PermissionState {
        let step = transition(self.state, event);
        let previous = self.state;
        self.state = step.next;

        match step.effect {
            Some(PermissionEffect::RequestNotificationCapability) => {
                let (sender, receiver) = mpsc::channel();
                self.pending_request = Some(receiver);
                self.probe
                    .request_notification_capability(Box::new(move |granted| {
                        let _ = sender.send(granted);
                    }));
                // Probes that answer inline resolve without a second call.
                return self.poll_request();
            }
            Some(PermissionEffect::Remedial(action)) => self.perform_remedial(action),
            None => {}
        }

        if previous != self.state && self.state.is_terminal() {
            info!(
                "event=permission_gate module=reminder status=ok state={} remedial={}",
                self.state.as_str(),
                self.remedial.map_or("none", remedial_label)
            );
        }
        self.state
    }

    fn perform_remedial(&mut self, action: RemedialAction) {
        if let Some(existing) = self.remedial {
            warn!(
                "event=permission_gate module=reminder status=skipped reason=remedial_already_performed existing={}",
                remedial_label(existing)
            );
            return;
        }
        match action {
            RemedialAction::OpenNotificationSettings => self.probe.open_notification_settings(),
            RemedialAction::OpenExactAlarmSettings => self.probe.open_exact_alarm_settings(),
        }
        self.remedial = Some(action);
    }
}

fn remedial_label(action: RemedialAction) -> &'static str {
    match action {
        RemedialAction::OpenNotificationSettings => "notification_settings",
        RemedialAction::OpenExactAlarmSettings => "exact_alarm_settings",
    }
}
