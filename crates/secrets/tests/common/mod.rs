//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use keyward_secrets::prelude::*;

pub const IDENTITY: &str = "test";

/// Install a test-writer subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Manager with the default test identity over `store`.
pub fn manager(store: &Arc<MemorySecretStore>) -> SecretsManager {
    manager_with(store, ManagerConfig::new(IDENTITY))
}

/// Manager with `config` over `store`.
pub fn manager_with(store: &Arc<MemorySecretStore>, config: ManagerConfig) -> SecretsManager {
    init_tracing();
    SecretsManager::builder()
        .store(store.clone())
        .config(config)
        .build()
        .expect("valid manager config")
}

/// Manager that sees a rotation of `base` initiated at `unix_seconds`.
pub fn manager_rotating(store: &Arc<MemorySecretStore>, base: &str, unix_seconds: i64) -> SecretsManager {
    let time = Utc.timestamp_opt(unix_seconds, 0).unwrap();
    manager_with(
        store,
        ManagerConfig::new(IDENTITY).with_last_rotation_initiation_time(base, time),
    )
}

pub fn basic_auth(name: &str) -> SecretConfig {
    SecretConfig::BasicAuth(BasicAuthConfig::new(name, BasicAuthFormat::Normal))
}

pub fn basic_auth_with_length(name: &str, password_length: usize) -> SecretConfig {
    let mut config = BasicAuthConfig::new(name, BasicAuthFormat::Normal);
    config.password_length = password_length;
    SecretConfig::BasicAuth(config)
}

pub fn ca(name: &str) -> SecretConfig {
    SecretConfig::CaCert(CaCertificateConfig::new(name, "kubernetes"))
}

/// Records in the store of class `class` whose base name is `base`.
pub fn count_class(store: &MemorySecretStore, base: &str, class: GenerationClass) -> usize {
    store
        .names()
        .iter()
        .filter_map(|name| store.peek(name))
        .filter(|record| record.class == class && record.base_name() == base)
        .count()
}

pub fn utf8(bytes: &[u8]) -> &str {
    std::str::from_utf8(bytes).expect("utf-8 payload")
}
