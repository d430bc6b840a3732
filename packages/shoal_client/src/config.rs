//! Client configuration
//!
//! figment-layered: compiled defaults, then `shoal.toml`, then `SHOAL_*` env
//! vars (double underscore = nesting). The relay endpoint is chosen once at
//! startup from the active profile and never re-evaluated.
//!
//!   shoal.toml:   [relay]
//!                 room = "reef"
//!
//!   env var:      SHOAL_RELAY__ROOM=reef

use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Named endpoint presets.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Loopback relay for development.
    Local,
    /// The deployed relay.
    Remote,
}

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub profile: Option<Profile>,
    #[serde(default)]
    pub relay: RelayFileConfig,
    #[serde(default)]
    pub sync: SyncFileConfig,
}

/// Relay endpoint tunables (lives under `[relay]` in shoal.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayFileConfig {
    #[serde(default = "default_local_base")]
    pub local_base: String,
    #[serde(default = "default_remote_base")]
    pub remote_base: String,
    /// Room identifier, read once at startup and used only for scoping.
    #[serde(default = "default_room")]
    pub room: String,
}

impl Default for RelayFileConfig {
    fn default() -> Self {
        Self {
            local_base: default_local_base(),
            remote_base: default_remote_base(),
            room: default_room(),
        }
    }
}

/// Identity-sync tunables (lives under `[sync]` in shoal.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncFileConfig {
    #[serde(default = "default_sync_interval_ms")]
    pub interval_ms: u64,
}

impl Default for SyncFileConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_sync_interval_ms(),
        }
    }
}

fn default_local_base() -> String {
    "ws://127.0.0.1:8080".to_string()
}

fn default_remote_base() -> String {
    "wss://shoal-relay.onrender.com".to_string()
}

fn default_room() -> String {
    "global".to_string()
}

fn default_sync_interval_ms() -> u64 {
    1500
}

impl FileConfig {
    /// Load with figment layering. `path` overrides the default `shoal.toml`
    /// lookup in the working directory.
    pub fn load(path: Option<&Path>) -> Result<Self, ClientError> {
        let toml = match path {
            Some(p) => Toml::file(p),
            None => Toml::file("shoal.toml"),
        };
        let config = Figment::from(Serialized::defaults(Self::default()))
            .merge(toml)
            .merge(Env::prefixed("SHOAL_").split("__"))
            .extract()?;
        Ok(config)
    }
}

/// Resolved runtime settings: endpoint frozen at startup.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    base: String,
    room: String,
    sync_interval: Duration,
}

impl ClientConfig {
    /// Pick the endpoint for the active profile (default: local) and freeze
    /// the rest. CLI values override the file.
    pub fn resolve(
        file: &FileConfig,
        profile: Option<Profile>,
        room: Option<String>,
    ) -> Result<Self, ClientError> {
        let profile = profile.or(file.profile).unwrap_or(Profile::Local);
        let base = match profile {
            Profile::Local => file.relay.local_base.clone(),
            Profile::Remote => file.relay.remote_base.clone(),
        };
        if !base.starts_with("ws://") && !base.starts_with("wss://") {
            return Err(ClientError::BadEndpoint(base));
        }
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            room: room.unwrap_or_else(|| file.relay.room.clone()),
            sync_interval: Duration::from_millis(file.sync.interval_ms),
        })
    }

    /// Point at an explicit base URL (tests, embedded hosts).
    pub fn with_base(
        base: impl Into<String>,
        room: impl Into<String>,
        sync_interval: Duration,
    ) -> Self {
        Self {
            base: base.into(),
            room: room.into(),
            sync_interval,
        }
    }

    /// Full `/chat` endpoint with room scoping.
    pub fn endpoint(&self) -> String {
        format!("{}/chat?room={}", self.base, self.room)
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn sync_interval(&self) -> Duration {
        self.sync_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_point_at_the_loopback_relay() {
        let file = FileConfig::default();
        let config = ClientConfig::resolve(&file, None, None).unwrap();
        assert_eq!(config.endpoint(), "ws://127.0.0.1:8080/chat?room=global");
        assert_eq!(config.sync_interval(), Duration::from_millis(1500));
    }

    #[test]
    fn remote_profile_switches_the_base() {
        let file = FileConfig::default();
        let config = ClientConfig::resolve(&file, Some(Profile::Remote), None).unwrap();
        assert!(config.endpoint().starts_with("wss://"));
    }

    #[test]
    fn cli_room_overrides_the_file() {
        let mut file = FileConfig::default();
        file.relay.room = "reef".to_string();
        let config = ClientConfig::resolve(&file, None, Some("lobby".to_string())).unwrap();
        assert_eq!(config.room(), "lobby");
    }

    #[test]
    fn trailing_slash_is_trimmed_from_the_base() {
        let mut file = FileConfig::default();
        file.relay.local_base = "ws://127.0.0.1:9000/".to_string();
        let config = ClientConfig::resolve(&file, None, None).unwrap();
        assert_eq!(config.endpoint(), "ws://127.0.0.1:9000/chat?room=global");
    }

    #[test]
    fn non_websocket_base_is_rejected() {
        let mut file = FileConfig::default();
        file.relay.local_base = "https://example.com".to_string();
        let err = ClientConfig::resolve(&file, None, None).unwrap_err();
        assert!(matches!(err, ClientError::BadEndpoint(_)));
    }

    #[test]
    fn toml_file_layers_over_defaults() {
        let mut tmp = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(tmp, "profile = \"remote\"\n\n[relay]\nroom = \"reef\"").unwrap();
        let file = FileConfig::load(Some(tmp.path())).unwrap();
        assert_eq!(file.profile, Some(Profile::Remote));
        assert_eq!(file.relay.room, "reef");
        // Untouched sections keep their defaults.
        assert_eq!(file.sync.interval_ms, 1500);
    }
}
