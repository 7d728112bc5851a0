//! Variable bag handed to the configuration run

use serde_json::Value;
use std::collections::BTreeMap;
use vmflow_core::RunConfiguration;

/// Sorted so rendered artifacts are deterministic
pub type VarBag = BTreeMap<String, Value>;

pub const LETSENCRYPT_PRODUCTION: &str = "https://acme-v02.api.letsencrypt.org/directory";
pub const LETSENCRYPT_STAGING: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

/// Variables every run carries
pub fn base_vars(cfg: &RunConfiguration) -> VarBag {
    let mut vars = VarBag::new();
    vars.insert("network_mode".into(), cfg.network_mode.as_str().into());
    vars.insert("main_network".into(), cfg.main_network.as_str().into());
    vars.insert("gateway_mode".into(), cfg.gateway_mode.as_str().into());
    vars.insert("monitoring_enabled".into(), cfg.monitoring_enabled.into());
    vars.insert("ssl_enabled".into(), cfg.ssl_active().into());
    if let Some(domain) = &cfg.domain_name {
        vars.insert("domain_name".into(), domain.as_str().into());
    }
    vars.insert("db_password".into(), cfg.secrets.db_password.as_str().into());
    vars.insert(
        "storage_secret_key".into(),
        cfg.secrets.storage_secret_key.as_str().into(),
    );
    vars.insert(
        "app_secret_key".into(),
        cfg.secrets.app_secret_key.as_str().into(),
    );
    vars
}

/// Certificate variables; empty unless SSL is active
pub fn ssl_vars(cfg: &RunConfiguration) -> VarBag {
    let mut vars = VarBag::new();
    if !cfg.ssl_active() {
        return vars;
    }

    if let Some(email) = &cfg.ssl_email {
        vars.insert("ssl_email".into(), email.as_str().into());
    }
    vars.insert("ssl_staging".into(), cfg.ssl_staging.into());
    let acme = if cfg.ssl_staging {
        LETSENCRYPT_STAGING
    } else {
        LETSENCRYPT_PRODUCTION
    };
    vars.insert("acme_server".into(), acme.into());
    vars
}

/// base < ssl < overrides
pub fn merge(cfg: &RunConfiguration, overrides: &VarBag) -> VarBag {
    let mut vars = base_vars(cfg);
    vars.extend(ssl_vars(cfg));
    vars.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    vars
}
