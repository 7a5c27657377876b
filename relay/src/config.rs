//! Configuration resolution.
//!
//! A [`RelayConfig`] is the raw shape shared by the command line defaults and
//! any caller supplied override. [`resolve`] merges the two, applies the
//! process environment on top and compiles the filter rules into an immutable
//! [`Snapshot`]. Nothing in a snapshot changes after it is built.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::filter::{parse_domain_list, AddressFilter};

pub const DEFAULT_MAX_MESSAGE_BYTES: u32 = 10 * 1024 * 1024;

pub const ENV_BCRYPT_HASH: &str = "BCRYPT_HASH";
pub const ENV_PASSWORD: &str = "PASSWORD";
pub const ENV_ALLOW_TO: &str = "ALLOW_TO";
pub const ENV_ALLOW_TO_DOMAINS: &str = "ALLOW_TO_DOMAINS";

/// Raw relay settings. `None`, empty strings, zero and `false` all mean "not set".
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub addr: Option<String>,
    pub name: Option<String>,
    pub host: Option<String>,
    pub read_timeout: Option<u64>,
    pub write_timeout: Option<u64>,
    pub max_message_bytes: Option<u32>,
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
    pub start_tls: Option<bool>,
    pub only_tls: Option<bool>,
    pub relay_api: Option<String>,
    pub set_name: Option<String>,
    pub ips: Option<String>,
    pub user: Option<String>,
    pub log_level: Option<String>,
    pub log_json: Option<bool>,

    pub allow_from: Option<String>,
    pub deny_to: Option<String>,
    pub allow_to: Option<String>,
    pub allow_to_domains: Option<String>,

    pub source_arn: Option<String>,
    pub from_arn: Option<String>,
    pub return_path_arn: Option<String>,

    #[serde(skip_serializing)]
    pub bcrypt_hash: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("addr", &self.addr)
            .field("name", &self.name)
            .field("host", &self.host)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .field("max_message_bytes", &self.max_message_bytes)
            .field("cert_file", &self.cert_file)
            .field("key_file", &self.key_file)
            .field("start_tls", &self.start_tls)
            .field("only_tls", &self.only_tls)
            .field("relay_api", &self.relay_api)
            .field("set_name", &self.set_name)
            .field("ips", &self.ips)
            .field("user", &self.user)
            .field("log_level", &self.log_level)
            .field("log_json", &self.log_json)
            .field("allow_from", &self.allow_from)
            .field("deny_to", &self.deny_to)
            .field("allow_to", &self.allow_to)
            .field("allow_to_domains", &self.allow_to_domains)
            .field("source_arn", &self.source_arn)
            .field("from_arn", &self.from_arn)
            .field("return_path_arn", &self.return_path_arn)
            .field("bcrypt_hash", &self.bcrypt_hash.as_ref().map(|_| "<redacted>"))
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Zero values that count as "not set" during a merge.
trait Unset {
    fn is_unset(&self) -> bool;
}

impl Unset for String {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

impl Unset for u32 {
    fn is_unset(&self) -> bool {
        *self == 0
    }
}

impl Unset for u64 {
    fn is_unset(&self) -> bool {
        *self == 0
    }
}

impl Unset for bool {
    fn is_unset(&self) -> bool {
        !*self
    }
}

fn present<T: Unset>(value: Option<T>) -> Option<T> {
    value.filter(|v| !v.is_unset())
}

fn pick<T: Unset + Clone>(over: &Option<T>, base: &Option<T>) -> Option<T> {
    present(over.clone()).or_else(|| base.clone())
}

impl RelayConfig {
    /// Field-wise merge where every set field of `over` replaces the one in `self`.
    pub fn merge(&self, over: &RelayConfig) -> RelayConfig {
        RelayConfig {
            addr: pick(&over.addr, &self.addr),
            name: pick(&over.name, &self.name),
            host: pick(&over.host, &self.host),
            read_timeout: pick(&over.read_timeout, &self.read_timeout),
            write_timeout: pick(&over.write_timeout, &self.write_timeout),
            max_message_bytes: pick(&over.max_message_bytes, &self.max_message_bytes),
            cert_file: pick(&over.cert_file, &self.cert_file),
            key_file: pick(&over.key_file, &self.key_file),
            start_tls: pick(&over.start_tls, &self.start_tls),
            only_tls: pick(&over.only_tls, &self.only_tls),
            relay_api: pick(&over.relay_api, &self.relay_api),
            set_name: pick(&over.set_name, &self.set_name),
            ips: pick(&over.ips, &self.ips),
            user: pick(&over.user, &self.user),
            log_level: pick(&over.log_level, &self.log_level),
            log_json: pick(&over.log_json, &self.log_json),
            allow_from: pick(&over.allow_from, &self.allow_from),
            deny_to: pick(&over.deny_to, &self.deny_to),
            allow_to: pick(&over.allow_to, &self.allow_to),
            allow_to_domains: pick(&over.allow_to_domains, &self.allow_to_domains),
            source_arn: pick(&over.source_arn, &self.source_arn),
            from_arn: pick(&over.from_arn, &self.from_arn),
            return_path_arn: pick(&over.return_path_arn, &self.return_path_arn),
            bcrypt_hash: pick(&over.bcrypt_hash, &self.bcrypt_hash),
            password: pick(&over.password, &self.password),
        }
    }

    /// Applies environment provided secrets and recipient policy on top of the merged settings.
    fn apply_env(&mut self, env: &dyn Environment) {
        if let Some(hash) = env.var(ENV_BCRYPT_HASH) {
            self.bcrypt_hash = Some(hash);
        }
        if let Some(password) = env.var(ENV_PASSWORD) {
            self.password = Some(password);
        }
        if let Some(allow_to) = present(env.var(ENV_ALLOW_TO)) {
            self.allow_to = Some(allow_to);
        }
        if let Some(domains) = present(env.var(ENV_ALLOW_TO_DOMAINS)) {
            self.allow_to_domains = Some(domains);
        }
    }
}

/// Source of environment variables consulted during resolution.
pub trait Environment {
    fn var(&self, key: &str) -> Option<String>;
}

/// The environment of the running process.
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Supported cloud sending APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Ses,
    Pinpoint,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Ses => "ses",
            BackendKind::Pinpoint => "pinpoint",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ses" => Ok(BackendKind::Ses),
            "pinpoint" => Ok(BackendKind::Pinpoint),
            _ => Err(ConfigError::UnknownBackend(s.to_string())),
        }
    }
}

/// Which filter rule a pattern belongs to, used to classify compile failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternField {
    SenderAllow,
    RecipientDeny,
    RecipientAllow,
}

impl fmt::Display for PatternField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PatternField::SenderAllow => "sender-allow-pattern",
            PatternField::RecipientDeny => "recipient-deny-pattern",
            PatternField::RecipientAllow => "recipient-allow-pattern",
        })
    }
}

/// Cross-account authorization identifiers for the sending service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Arns {
    pub source: Option<String>,
    pub from: Option<String>,
    pub return_path: Option<String>,
}

impl Arns {
    /// Builds the triple, filling a missing from or return-path ARN with the source ARN.
    pub fn resolve(
        source: Option<String>,
        from: Option<String>,
        return_path: Option<String>,
    ) -> Self {
        let source = present(source);
        let from = present(from).or_else(|| source.clone());
        let return_path = present(return_path).or_else(|| source.clone());
        Arns {
            source,
            from,
            return_path,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.from.is_none() && self.return_path.is_none()
    }
}

/// Credentials for client authentication, never serialised.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user: Option<String>,
    pub password: Option<Vec<u8>>,
    pub bcrypt_hash: Option<Vec<u8>>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("bcrypt_hash", &self.bcrypt_hash.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    settings: RelayConfig,
    backend: BackendKind,
    set_name: Option<String>,
    arns: Arns,
    max_message_bytes: usize,
    allowed_ips: HashSet<String>,
    #[serde(skip)]
    credentials: Credentials,
    #[serde(skip)]
    filter: Arc<AddressFilter>,
}

impl Snapshot {
    /// The merged settings the snapshot was compiled from.
    pub fn settings(&self) -> &RelayConfig {
        &self.settings
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn set_name(&self) -> Option<&str> {
        self.set_name.as_deref()
    }

    pub fn arns(&self) -> &Arns {
        &self.arns
    }

    pub fn max_message_bytes(&self) -> usize {
        self.max_message_bytes
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn filter(&self) -> Arc<AddressFilter> {
        Arc::clone(&self.filter)
    }

    pub fn allowed_ips(&self) -> &HashSet<String> {
        &self.allowed_ips
    }

    /// An empty allow-set places no restriction on client addresses.
    pub fn is_ip_allowed(&self, ip: &str) -> bool {
        self.allowed_ips.is_empty() || self.allowed_ips.contains(ip)
    }

    pub fn start_tls(&self) -> bool {
        self.settings.start_tls.unwrap_or(false)
    }

    pub fn only_tls(&self) -> bool {
        self.settings.only_tls.unwrap_or(false)
    }
}

fn compile(
    field: PatternField,
    pattern: &Option<String>,
    errors: &mut Vec<ConfigError>,
) -> Option<Regex> {
    let pattern = present(pattern.clone())?;
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(source) => {
            errors.push(ConfigError::InvalidPattern {
                field,
                pattern,
                source,
            });
            None
        }
    }
}

/// Splits a comma separated address list into a set, collapsing duplicates.
pub fn parse_ip_set(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolves `base` merged with `over` against the given environment.
///
/// Every problem found is reported: a single error is returned as is and
/// several are wrapped in [`ConfigError::Multiple`].
pub fn resolve(
    base: &RelayConfig,
    over: Option<&RelayConfig>,
    env: &dyn Environment,
) -> Result<Snapshot, ConfigError> {
    let mut settings = match over {
        Some(over) => base.merge(over),
        None => base.clone(),
    };

    let mut errors = Vec::new();

    let allow_from = compile(PatternField::SenderAllow, &settings.allow_from, &mut errors);
    let deny_to = compile(PatternField::RecipientDeny, &settings.deny_to, &mut errors);
    let merged_allow_to = compile(PatternField::RecipientAllow, &settings.allow_to, &mut errors);

    // The merged pattern must compile even when the environment replaces it.
    let merged = settings.allow_to.clone();
    settings.apply_env(env);
    let allow_to = if settings.allow_to == merged {
        merged_allow_to
    } else {
        compile(PatternField::RecipientAllow, &settings.allow_to, &mut errors)
    };
    let domains = settings
        .allow_to_domains
        .as_deref()
        .map(parse_domain_list)
        .unwrap_or_default();

    let api = present(settings.relay_api.clone()).unwrap_or_else(|| BackendKind::Ses.to_string());
    let backend = match api.parse::<BackendKind>() {
        Ok(backend) => Some(backend),
        Err(e) => {
            errors.push(e);
            None
        }
    };

    let backend = match (backend, errors.len()) {
        (Some(backend), 0) => backend,
        (_, 1) => return Err(errors.remove(0)),
        _ => return Err(ConfigError::Multiple(errors)),
    };

    let arns = Arns::resolve(
        settings.source_arn.clone(),
        settings.from_arn.clone(),
        settings.return_path_arn.clone(),
    );

    let max_message_bytes = present(settings.max_message_bytes).unwrap_or(DEFAULT_MAX_MESSAGE_BYTES);

    let credentials = Credentials {
        user: present(settings.user.clone()),
        password: settings.password.clone().map(String::into_bytes),
        bcrypt_hash: settings.bcrypt_hash.clone().map(String::into_bytes),
    };

    Ok(Snapshot {
        backend,
        set_name: present(settings.set_name.clone()),
        arns,
        max_message_bytes: max_message_bytes as usize,
        allowed_ips: settings.ips.as_deref().map(parse_ip_set).unwrap_or_default(),
        credentials,
        filter: Arc::new(AddressFilter::new(allow_from, deny_to, allow_to, domains)),
        settings,
    })
}
