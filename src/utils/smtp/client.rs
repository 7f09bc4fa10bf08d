//! Provides the lettre-backed SMTP prober used to test mailbox existence.

use super::error::{code_from_error, code_value, greeting_failure};
use super::result::ProbeCode;
use crate::core::config::Config;
use crate::core::error::{AppError, Result};

use async_trait::async_trait;
use lettre::transport::smtp::client::SmtpConnection;
use lettre::transport::smtp::commands::{Mail, Rcpt};
use lettre::transport::smtp::extension::ClientId;
use lettre::Address;
use std::net::ToSocketAddrs;
use std::str::FromStr;
use std::time::Duration;

/// Opens one SMTP session and issues a single `RCPT TO`.
#[async_trait]
pub trait SmtpProber: Send + Sync {
    /// Connects to `mail_server`, greets, sends `MAIL FROM` and `RCPT TO:<recipient>`,
    /// then quits. Returns the RCPT reply code, or `None` when the session
    /// failed before the RCPT reply was read.
    async fn rcpt_probe(&self, mail_server: &str, recipient: &str) -> ProbeCode;
}

/// Session parameters copied out of [`Config`] so the blocking session can own them.
#[derive(Debug, Clone)]
struct ConnectionParams {
    port: u16,
    timeout: Duration,
    helo_name: String,
    sender: String,
}

/// [`SmtpProber`] speaking plaintext SMTP through lettre's low-level connection.
#[derive(Clone)]
pub struct SmtpVerifier {
    params: ConnectionParams,
}

impl SmtpVerifier {
    /// Creates a new SmtpVerifier with the given configuration.
    pub fn new(config: &Config) -> Result<Self> {
        Address::from_str(&config.smtp_sender_email)
            .map_err(|e| AppError::Config(format!("Invalid sender email in config: {}", e)))?;
        Ok(Self {
            params: ConnectionParams {
                port: config.smtp_port,
                timeout: config.smtp_timeout,
                helo_name: config.smtp_helo_name.clone(),
                sender: config.smtp_sender_email.clone(),
            },
        })
    }
}

#[async_trait]
impl SmtpProber for SmtpVerifier {
    async fn rcpt_probe(&self, mail_server: &str, recipient: &str) -> ProbeCode {
        let params = self.params.clone();
        let server = mail_server.to_string();
        let rcpt = recipient.to_string();

        // lettre's SmtpConnection is synchronous; keep it off the async workers.
        match tokio::task::spawn_blocking(move || blocking_rcpt_probe(&params, &server, &rcpt))
            .await
        {
            Ok(code) => code,
            Err(e) => {
                tracing::error!(target: "smtp_task", "SMTP probe task for <{}> failed to join: {}", recipient, e);
                None
            }
        }
    }
}

fn blocking_rcpt_probe(params: &ConnectionParams, mail_server: &str, recipient: &str) -> ProbeCode {
    let recipient_address = match Address::from_str(recipient) {
        Ok(addr) => addr,
        Err(e) => {
            tracing::warn!(target: "smtp_task", "Cannot form RCPT for '{}': {}", recipient, e);
            return None;
        }
    };
    let sender_address = match Address::from_str(&params.sender) {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(target: "smtp_task", "Invalid sender '{}': {}", params.sender, e);
            return None;
        }
    };

    let helo_name = ClientId::Domain(params.helo_name.clone());
    tracing::debug!(target: "smtp_task",
        "Connecting to {}:{} to probe <{}>", mail_server, params.port, recipient);

    // connect() reads the banner and sends EHLO. lettre has no HELO fallback,
    // so a refused greeting leaves no session to use.
    let mut smtp_conn = match SmtpConnection::connect(
        (mail_server, params.port),
        Some(params.timeout),
        &helo_name,
        None,
        None,
    ) {
        Ok(conn) => conn,
        Err(e) => return greeting_failure(&e, mail_server),
    };

    // The RCPT reply is what gets classified, so a negative MAIL reply is only
    // logged. A broken session ends here.
    if let Err(e) = smtp_conn.command(Mail::new(Some(sender_address), vec![])) {
        if e.status().is_none() {
            smtp_conn.abort();
            return code_from_error(&e, mail_server);
        }
        tracing::warn!(target: "smtp_task",
            "MAIL FROM rejected by {}: {}; sending RCPT anyway", mail_server, e);
    }

    let code = match smtp_conn.command(Rcpt::new(recipient_address, vec![])) {
        Ok(response) => {
            tracing::debug!(target: "smtp_task",
                "RCPT TO:<{}> accepted by {}: {}", recipient, mail_server, response.code());
            code_value(response.code())
        }
        Err(e) => code_from_error(&e, mail_server),
    };

    if let Err(e) = smtp_conn.quit() {
        tracing::debug!(target: "smtp_task", "Error during SMTP QUIT on {}: {}", mail_server, e);
    }

    code
}

/// Tests basic SMTP connectivity to a known reliable server (Google).
/// This helps diagnose if outbound port 25 is generally blocked.
pub async fn test_smtp_connectivity(config: &Config) -> Result<()> {
    tracing::info!("Testing outbound SMTP (port {}) connectivity...", config.smtp_port);

    let test_server = "gmail-smtp-in.l.google.com";
    let port = config.smtp_port;
    let timeout = config.smtp_timeout;
    let helo_name = ClientId::Domain(config.smtp_helo_name.clone());

    let socket_addr = (test_server, port)
        .to_socket_addrs()
        .map_err(|e| AppError::Config(format!("DNS resolution failed for {}: {}", test_server, e)))?
        .next()
        .ok_or_else(|| {
            AppError::Config(format!("Could not resolve any IP address for {}", test_server))
        })?;

    let attempt = tokio::task::spawn_blocking(move || {
        SmtpConnection::connect(socket_addr, Some(timeout), &helo_name, None, None)
    });

    match tokio::time::timeout(timeout, attempt).await {
        Ok(Ok(Ok(mut conn))) => {
            tracing::info!("SMTP connectivity test successful (connected to {}).", test_server);
            conn.quit().ok();
            Ok(())
        }
        Ok(Ok(Err(e))) => {
            tracing::error!("SMTP connectivity test failed connecting to {}: {}", test_server, e);
            let err_str = e.to_string().to_lowercase();
            if err_str.contains("connection refused") || err_str.contains("network is unreachable")
            {
                Err(AppError::SmtpInconclusive(format!(
                    "Connection to {} refused or network unreachable. Check firewall or network settings.",
                    test_server
                )))
            } else {
                Err(AppError::Smtp(e))
            }
        }
        Ok(Err(e)) => Err(AppError::Task(format!("Connectivity test task failed: {}", e))),
        Err(_) => Err(AppError::SmtpInconclusive(format!(
            "SMTP connection timed out - port {} is likely blocked.",
            port
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serves one scripted SMTP session on loopback. The handle yields the
    /// command verbs the client sent.
    fn scripted_server(
        ehlo: &'static str,
        mail: &'static str,
        rcpt: &'static str,
    ) -> (u16, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut writer = stream.try_clone().unwrap();
            writer.write_all(b"220 fake.test ESMTP\r\n").unwrap();

            let mut verbs = Vec::new();
            for line in BufReader::new(stream).lines() {
                let Ok(line) = line else { break };
                let verb: String = line
                    .chars()
                    .take_while(|c| c.is_ascii_alphabetic())
                    .collect::<String>()
                    .to_ascii_uppercase();
                let reply = match verb.as_str() {
                    "EHLO" => ehlo,
                    "MAIL" => mail,
                    "RCPT" => rcpt,
                    "QUIT" => "221 2.0.0 Bye",
                    _ => "502 5.5.2 Unknown command",
                };
                verbs.push(verb);
                if writer.write_all(format!("{}\r\n", reply).as_bytes()).is_err()
                    || verbs.last().map(String::as_str) == Some("QUIT")
                {
                    break;
                }
            }
            verbs
        });
        (port, handle)
    }

    fn loopback_verifier(port: u16) -> SmtpVerifier {
        let config = Config {
            smtp_port: port,
            smtp_timeout: Duration::from_secs(2),
            ..Config::default()
        };
        SmtpVerifier::new(&config).unwrap()
    }

    #[test]
    fn test_new_rejects_unparseable_sender() {
        let config = Config {
            smtp_sender_email: "bad sender@@example.com".to_string(),
            ..Config::default()
        };
        assert!(SmtpVerifier::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_refused_connection_is_no_response() {
        // Bind then drop to get a port that is almost certainly closed.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = Config {
            smtp_port: port,
            smtp_timeout: Duration::from_secs(2),
            ..Config::default()
        };
        let prober = SmtpVerifier::new(&config).unwrap();
        assert_eq!(prober.rcpt_probe("127.0.0.1", "john@example.com").await, None);
    }

    #[tokio::test]
    async fn test_rejected_mail_from_still_reports_rcpt_reply() {
        let (port, server) = scripted_server(
            "250 fake.test",
            "550 5.1.8 Sender address domain rejected",
            "503 5.5.1 Need MAIL command first",
        );
        let code = loopback_verifier(port)
            .rcpt_probe("127.0.0.1", "john@example.com")
            .await;
        assert_eq!(code, Some(503));

        let verbs = server.join().unwrap();
        assert_eq!(verbs, vec!["EHLO", "MAIL", "RCPT", "QUIT"]);
    }

    #[tokio::test]
    async fn test_accepted_rcpt_returns_250() {
        let (port, server) = scripted_server("250 fake.test", "250 2.1.0 Ok", "250 2.1.5 Ok");
        let code = loopback_verifier(port)
            .rcpt_probe("127.0.0.1", "john@example.com")
            .await;
        assert_eq!(code, Some(250));
        server.join().unwrap();
    }

    #[tokio::test]
    async fn test_refused_ehlo_is_no_response() {
        let (port, server) = scripted_server(
            "502 5.5.2 EHLO not supported",
            "250 2.1.0 Ok",
            "250 2.1.5 Ok",
        );
        let code = loopback_verifier(port)
            .rcpt_probe("127.0.0.1", "john@example.com")
            .await;
        assert_eq!(code, None);

        let verbs = server.join().unwrap();
        assert!(!verbs.iter().any(|v| v == "MAIL" || v == "RCPT"), "{:?}", verbs);
    }
}
