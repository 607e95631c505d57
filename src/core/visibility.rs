use super::types::ConnectionState;

/// Page/tab visibility as reported by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Whether a visibility transition should force a reconnect attempt.
///
/// Only a transition to `Visible` counts, and only when the channel has no socket or the socket
/// is not open. Manually closed channels stay closed.
pub fn needs_reconnect(visibility: Visibility, state: ConnectionState, has_socket: bool) -> bool {
    if visibility != Visibility::Visible || state == ConnectionState::ManuallyClosed {
        return false;
    }
    !has_socket || !state.is_open()
}
