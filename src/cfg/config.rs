// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::cfg::{
    defaults,
    enums::{MungeCipher, MungeMac, MungeZip},
};

/// `munged`'s on-disk configuration (§4.6 startup, §6 paths).
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct DaemonConfig {
    /// Policy defaults applied when a client leaves a field unset.
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Filesystem paths the daemon reads/writes at startup.
    #[serde(default)]
    pub paths: PathsConfig,
    /// Socket and worker-pool tuning.
    #[serde(default)]
    pub listener: ListenerConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyConfig {
    #[serde(default = "default_cipher", rename = "DefaultCipher")]
    pub default_cipher: MungeCipher,
    #[serde(default = "default_mac", rename = "DefaultMac")]
    pub default_mac: MungeMac,
    #[serde(default = "default_zip", rename = "DefaultZip")]
    pub default_zip: MungeZip,
    #[serde(default = "default_ttl", rename = "DefaultTtl", with = "serde_secs_u32")]
    pub default_ttl: u32,
    #[serde(default = "default_max_ttl", rename = "MaximumTtl", with = "serde_secs_u32")]
    pub maximum_ttl: u32,
    /// Mirrors `MUNGE_AUTH_ROOT_ALLOW_FLAG`: whether UID 0 bypasses
    /// uid/gid restrictions on decode.
    #[serde(default, rename = "AuthRootAllow")]
    pub auth_root_allow: bool,
    #[serde(default = "default_clock_skew", rename = "ClockSkewToleranceSecs")]
    pub clock_skew_tolerance_secs: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            default_cipher: default_cipher(),
            default_mac: default_mac(),
            default_zip: default_zip(),
            default_ttl: default_ttl(),
            maximum_ttl: default_max_ttl(),
            auth_root_allow: defaults::AUTH_ROOT_ALLOW_FLAG,
            clock_skew_tolerance_secs: default_clock_skew(),
        }
    }
}

fn default_cipher() -> MungeCipher {
    MungeCipher::Default
}
fn default_mac() -> MungeMac {
    MungeMac::Default
}
fn default_zip() -> MungeZip {
    MungeZip::Default
}
fn default_ttl() -> u32 {
    defaults::DEFAULT_TTL_SECS
}
fn default_max_ttl() -> u32 {
    defaults::MAXIMUM_TTL_SECS
}
fn default_clock_skew() -> u32 {
    defaults::CLOCK_SKEW_TOLERANCE_SECS
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct PathsConfig {
    #[serde(default = "default_key_file", rename = "KeyFile")]
    pub key_file: String,
    #[serde(default = "default_seed_file", rename = "SeedFile")]
    pub seed_file: String,
    #[serde(default = "default_pidfile", rename = "PidFile")]
    pub pid_file: String,
    #[serde(default = "default_logfile", rename = "LogFile")]
    pub log_file: String,
    #[serde(default = "default_socket_name", rename = "SocketName")]
    pub socket_name: String,
    #[serde(default = "default_auth_server_dir", rename = "AuthServerDir")]
    pub auth_server_dir: String,
    #[serde(default = "default_auth_client_dir", rename = "AuthClientDir")]
    pub auth_client_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            key_file: default_key_file(),
            seed_file: default_seed_file(),
            pid_file: default_pidfile(),
            log_file: default_logfile(),
            socket_name: default_socket_name(),
            auth_server_dir: default_auth_server_dir(),
            auth_client_dir: default_auth_client_dir(),
        }
    }
}

fn default_key_file() -> String {
    defaults::DEFAULT_KEY_FILE.to_string()
}
fn default_seed_file() -> String {
    defaults::DEFAULT_SEED_FILE.to_string()
}
fn default_pidfile() -> String {
    defaults::DEFAULT_PIDFILE.to_string()
}
fn default_logfile() -> String {
    defaults::DEFAULT_LOGFILE.to_string()
}
fn default_socket_name() -> String {
    defaults::SOCKET_NAME.to_string()
}
fn default_auth_server_dir() -> String {
    defaults::AUTH_SERVER_DIR.to_string()
}
fn default_auth_client_dir() -> String {
    defaults::AUTH_CLIENT_DIR.to_string()
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct ListenerConfig {
    #[serde(default = "default_threads", rename = "Threads")]
    pub threads: usize,
    #[serde(default = "default_backlog", rename = "Backlog")]
    pub backlog: u32,
    #[serde(default = "default_request_deadline", rename = "RequestDeadline", with = "serde_secs")]
    pub request_deadline: Duration,
    #[serde(default = "default_group_parse_timer", rename = "GroupRefreshInterval", with = "serde_secs")]
    pub group_refresh_interval: Duration,
    #[serde(default = "default_replay_purge_timer", rename = "ReplayPurgeInterval", with = "serde_secs")]
    pub replay_purge_interval: Duration,
    #[serde(default = "default_replay_soft_ceiling", rename = "ReplaySoftCeiling")]
    pub replay_soft_ceiling: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            backlog: default_backlog(),
            request_deadline: default_request_deadline(),
            group_refresh_interval: default_group_parse_timer(),
            replay_purge_interval: default_replay_purge_timer(),
            replay_soft_ceiling: default_replay_soft_ceiling(),
        }
    }
}

fn default_threads() -> usize {
    defaults::DEFAULT_THREADS
}
fn default_backlog() -> u32 {
    defaults::SOCKET_BACKLOG
}
fn default_request_deadline() -> Duration {
    defaults::REQUEST_DEADLINE
}
fn default_group_parse_timer() -> Duration {
    defaults::GROUP_PARSE_TIMER
}
fn default_replay_purge_timer() -> Duration {
    defaults::REPLAY_PURGE_TIMER
}
fn default_replay_soft_ceiling() -> usize {
    0
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            policy: PolicyConfig::default(),
            paths: PathsConfig::default(),
            listener: ListenerConfig::default(),
        }
    }
}

impl DaemonConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: DaemonConfig =
            serde_yaml::from_str(&s).context("failed to parse munged config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(self.listener.threads >= 1, "listener Threads must be >= 1");
        ensure!(
            self.policy.default_ttl > 0,
            "policy DefaultTtl must be > 0"
        );
        ensure!(
            self.policy.maximum_ttl >= self.policy.default_ttl,
            "policy MaximumTtl must be >= DefaultTtl"
        );
        ensure!(
            self.policy.default_ttl
                .checked_add(self.policy.clock_skew_tolerance_secs)
                .is_some(),
            "policy DefaultTtl + ClockSkewToleranceSecs must not overflow"
        );
        Ok(())
    }
}

/// Client-side library/CLI configuration: just the socket to talk to.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub socket_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_path: std::env::var(defaults::SOCKET_ENV_VAR)
                .unwrap_or_else(|_| defaults::SOCKET_NAME.to_string()),
        }
    }
}

mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

mod serde_secs_u32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &u32, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u32(*v)
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        u32::deserialize(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let mut cfg = DaemonConfig::default();
        cfg.validate_and_normalize().unwrap();
    }

    #[test]
    fn maximum_ttl_below_default_ttl_is_rejected() {
        let mut cfg = DaemonConfig::default();
        cfg.policy.maximum_ttl = cfg.policy.default_ttl - 1;
        assert!(cfg.validate_and_normalize().is_err());
    }

    #[test]
    fn zero_threads_is_rejected() {
        let mut cfg = DaemonConfig::default();
        cfg.listener.threads = 0;
        assert!(cfg.validate_and_normalize().is_err());
    }
}
