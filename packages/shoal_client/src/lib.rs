//! Embeddable chat and skin-sync client.
//!
//! Connects to a relay over a persistent WebSocket, exchanges typed JSON
//! frames (chat, presence renames, skin-reference sync), and keeps a local
//! registry of per-identity asset references consistent with server pushes.
//!
//! Delivery is best-effort end to end: frames sent while the connection is
//! down are dropped, malformed inbound frames are discarded, and the
//! connection heals itself with capped backoff. The client is designed to be
//! embedded in a host it does not own, so nothing in here panics the process
//! or blocks the caller.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod protocol;
pub mod registry;
mod sync;
pub mod transport;

pub use client::ShoalClient;
pub use config::{ClientConfig, FileConfig, Profile};
pub use dispatch::RenderSink;
pub use error::ClientError;
pub use identity::{EnvName, FixedName, IdentityResolver, guest_name, name_hash};
pub use registry::{AssetPrefetch, NullPrefetch, SkinRecord, SkinRegistry};
pub use transport::ConnState;
