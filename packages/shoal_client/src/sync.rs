//! Identity Sync
//!
//! Keeps the relay informed of display-name changes without user-visible
//! chatter. Each tick of the client event loop re-resolves the local
//! identity and emits a rename frame only when the clipped name actually
//! changed. Renames are fire-and-forget: no ack is awaited and a frame
//! dropped while disconnected is simply re-sent the next time the name
//! differs.

use crate::identity::clip_name;

/// Decide what rename, if any, a sync tick should emit.
///
/// An empty resolution means "no update this cycle"; it never clears the
/// last-sent name.
pub(crate) fn rename_for_tick(resolved: &str, last_sent: &str) -> Option<String> {
    let name = clip_name(resolved.trim());
    if name.is_empty() || name == last_sent {
        return None;
    }
    Some(name)
}
