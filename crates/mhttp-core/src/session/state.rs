//! Connection lifecycle states and their transition table.

/// Where a session's connection stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// No link held.
    Idle,
    /// Link being acquired and a request in flight.
    Connecting,
    /// Answering a 401 challenge.
    Authenticating,
    /// Following a 3xx `Location`.
    FollowingRedirect,
    /// Response head parsed, body readable.
    Ready,
    /// Link being released or destroyed.
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Open,
    Challenged,
    Redirected,
    Established,
    /// A reused link died before answering; retried on a fresh one.
    LinkDropped,
    Close,
    Released,
    /// A failed reconnect fell back to the link held before it.
    Restored,
}

/// Pure transition function. `None` means the event is not valid in `state`.
pub fn transition(state: ConnState, event: Event) -> Option<ConnState> {
    use ConnState::*;
    use Event::*;
    match (state, event) {
        (Idle | Ready | Authenticating | FollowingRedirect, Open) => Some(Connecting),
        (Connecting, Challenged) => Some(Authenticating),
        (Connecting, Redirected) => Some(FollowingRedirect),
        (Connecting, Established) => Some(Ready),
        (Connecting, LinkDropped) => Some(Connecting),
        (Closing, Close) => None,
        (_, Close) => Some(Closing),
        (Closing, Released) => Some(Idle),
        (Idle, Restored) => Some(Ready),
        _ => None,
    }
}
