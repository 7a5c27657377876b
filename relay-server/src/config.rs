use clap::Args;
use ::config::{Config, File};
use relay::config::DEFAULT_MAX_MESSAGE_BYTES;
use relay::{ConfigError, RelayConfig};

/// Relay settings taken from the command line. These form the base that a
/// configuration file and the environment are layered on.
#[derive(Args, Debug, Clone)]
pub struct CfgArgs {
    /// TCP listen address
    #[arg(short = 'a', long, default_value = ":1025")]
    pub addr: String,

    /// SMTP service name
    #[arg(short = 'n', long, default_value = "AWS SMTP Relay")]
    pub name: String,

    /// Server hostname
    #[arg(long)]
    pub host: Option<String>,

    /// TLS cert file
    #[arg(short = 'c', long)]
    pub cert_file: Option<String>,

    /// TLS key file
    #[arg(short = 'k', long)]
    pub key_file: Option<String>,

    /// Require TLS via STARTTLS extension
    #[arg(short = 's', long)]
    pub start_tls: bool,

    /// Listen for incoming TLS connections only
    #[arg(short = 't', long)]
    pub only_tls: bool,

    /// Relay API to use (ses|pinpoint)
    #[arg(short = 'r', long, default_value = "ses")]
    pub relay_api: String,

    /// Configuration set name
    #[arg(short = 'e', long)]
    pub set_name: Option<String>,

    /// Allowed client IPs (comma-separated)
    #[arg(short = 'i', long)]
    pub ips: Option<String>,

    /// Authentication username
    #[arg(short = 'u', long)]
    pub user: Option<String>,

    /// Allowed sender emails regular expression
    #[arg(short = 'l', long)]
    pub allow_from: Option<String>,

    /// Denied recipient emails regular expression
    #[arg(short = 'd', long)]
    pub deny_to: Option<String>,

    /// Allowed recipient emails regular expression
    #[arg(short = 'w', long)]
    pub allow_to: Option<String>,

    /// Allowed recipient domains (comma-separated)
    #[arg(short = 'm', long)]
    pub allow_to_domains: Option<String>,

    /// SES source identity ARN
    #[arg(short = 'o', long)]
    pub source_arn: Option<String>,

    /// SES from identity ARN
    #[arg(short = 'f', long)]
    pub from_arn: Option<String>,

    /// SES return path identity ARN
    #[arg(short = 'p', long)]
    pub return_path_arn: Option<String>,

    /// Read timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub read_timeout: u64,

    /// Write timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub write_timeout: u64,

    /// Maximum message size in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_MESSAGE_BYTES)]
    pub max_message_bytes: u32,

    /// Log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,
}

impl From<CfgArgs> for RelayConfig {
    fn from(args: CfgArgs) -> Self {
        RelayConfig {
            addr: Some(args.addr),
            name: Some(args.name),
            host: args.host,
            read_timeout: Some(args.read_timeout),
            write_timeout: Some(args.write_timeout),
            max_message_bytes: Some(args.max_message_bytes),
            cert_file: args.cert_file,
            key_file: args.key_file,
            start_tls: Some(args.start_tls),
            only_tls: Some(args.only_tls),
            relay_api: Some(args.relay_api),
            set_name: args.set_name,
            ips: args.ips,
            user: args.user,
            log_level: Some(args.log_level),
            log_json: Some(args.log_json),
            allow_from: args.allow_from,
            deny_to: args.deny_to,
            allow_to: args.allow_to,
            allow_to_domains: args.allow_to_domains,
            source_arn: args.source_arn,
            from_arn: args.from_arn,
            return_path_arn: args.return_path_arn,
            bcrypt_hash: None,
            password: None,
        }
    }
}

/// Loads relay settings from a configuration file.
pub fn load(cfg_path: &str) -> Result<RelayConfig, ConfigError> {
    let settings = Config::builder()
        .add_source(File::with_name(cfg_path))
        .build()
        .map_err(|e| ConfigError::File(e.to_string()))?;

    settings
        .try_deserialize()
        .map_err(|e| ConfigError::File(e.to_string()))
}
