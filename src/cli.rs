use std::{net::SocketAddr, path::PathBuf, time::Duration};

use apns::{
    CertificateMaterial, PushClientConfig, FEEDBACK_ADDR, GATEWAY_ADDR, SANDBOX_FEEDBACK_ADDR,
    SANDBOX_GATEWAY_ADDR,
};
use clap::Parser;

use crate::{
    config::{ServerConfig, DEFAULT_BIND_ADDR},
    error::ServerError,
    feedback::MAX_FEEDBACK_LIMIT,
};

#[derive(Parser, Debug)]
#[command(version, about = "HTTP front-end for APNs push and feedback", long_about = None)]
pub struct Args {
    /// Address the HTTP listener binds to
    #[arg(long, env = "APNS_BIND_ADDR", default_value = DEFAULT_BIND_ADDR)]
    pub bind_addr: SocketAddr,

    /// PEM client certificate for the APNs gateway
    #[arg(long, env = "APNS_CERT_PATH", default_value = "cert.pem")]
    pub cert_path: PathBuf,

    /// PEM private key matching the certificate
    #[arg(long, env = "APNS_KEY_PATH", default_value = "key.pem")]
    pub key_path: PathBuf,

    /// Push gateway address (host:port)
    #[arg(long, env = "APNS_PUSH_ADDR")]
    pub push_addr: Option<String>,

    /// Feedback service address (host:port)
    #[arg(long, env = "APNS_FEEDBACK_ADDR")]
    pub feedback_addr: Option<String>,

    /// Use the sandbox gateway and feedback hosts unless overridden
    #[arg(long)]
    pub sandbox: bool,

    /// Seconds a queued push stays valid
    #[arg(long, env = "APNS_EXPIRY_SECS", default_value_t = 3600)]
    pub expiry_secs: u32,

    /// Feedback batch size when a request has no `limit`
    #[arg(long, env = "APNS_FEEDBACK_LIMIT", default_value_t = MAX_FEEDBACK_LIMIT)]
    pub feedback_limit: usize,

    /// How long a feedback request waits for its batch
    #[arg(long, env = "APNS_FEEDBACK_TIMEOUT_MS", default_value_t = 5000)]
    pub feedback_timeout_ms: u64,

    /// Largest accepted notification payload, in bytes of compact JSON
    #[arg(long, env = "APNS_MAX_PAYLOAD_BYTES", default_value_t = 256)]
    pub max_payload_bytes: usize,
}

impl Args {
    pub fn into_config(self) -> Result<ServerConfig, ServerError> {
        if self.feedback_limit > MAX_FEEDBACK_LIMIT {
            return Err(ServerError::Config(format!(
                "feedback limit {} exceeds {MAX_FEEDBACK_LIMIT}",
                self.feedback_limit
            )));
        }
        if self.feedback_timeout_ms == 0 {
            return Err(ServerError::Config(
                "feedback timeout must be positive".to_string(),
            ));
        }
        let (push_default, feedback_default) = if self.sandbox {
            (SANDBOX_GATEWAY_ADDR, SANDBOX_FEEDBACK_ADDR)
        } else {
            (GATEWAY_ADDR, FEEDBACK_ADDR)
        };
        Ok(ServerConfig {
            bind_addr: self.bind_addr,
            client: PushClientConfig {
                cert: CertificateMaterial {
                    cert_path: self.cert_path,
                    key_path: self.key_path,
                },
                push_addr: self
                    .push_addr
                    .unwrap_or_else(|| push_default.to_string()),
                feedback_addr: self
                    .feedback_addr
                    .unwrap_or_else(|| feedback_default.to_string()),
            },
            expiry_secs: self.expiry_secs,
            default_feedback_limit: self.feedback_limit,
            feedback_timeout: Duration::from_millis(self.feedback_timeout_ms),
            max_payload_bytes: self.max_payload_bytes,
        })
    }
}
