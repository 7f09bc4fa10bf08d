//! Interprets lettre SMTP errors into probe codes.

use super::result::ProbeCode;
use lettre::transport::smtp::response::Code;
use lettre::transport::smtp::Error as SmtpError;

pub(crate) fn code_value(code: Code) -> Option<u16> {
    code.to_string().parse().ok()
}

/// Extracts the server's reply code from a lettre error.
///
/// lettre reports negative replies (4xx/5xx) as errors carrying the code;
/// those are real answers and keep their code. Connection, timeout, TLS and
/// parse failures carry no code and become the "no response" sentinel.
pub(crate) fn code_from_error(error: &SmtpError, server: &str) -> ProbeCode {
    match error.status() {
        Some(code) => {
            let value = code_value(code);
            tracing::debug!(target: "smtp_task", "{} answered with negative reply {}: {}", server, code, error);
            value
        }
        None => {
            let err_string = error.to_string().to_lowercase();
            if error.is_timeout() || err_string.contains("timed out") {
                tracing::warn!(target: "smtp_task", "SMTP session with {} timed out: {}", server, error);
            } else if err_string.contains("connection refused")
                || err_string.contains("network is unreachable")
            {
                tracing::warn!(target: "smtp_task",
                    "SMTP connection to {} failed: {}. Port 25 may be blocked.", server, error);
            } else {
                tracing::warn!(target: "smtp_task", "Unhandled SMTP error for {}: {}", server, error);
            }
            None
        }
    }
}

/// Failure while connecting or greeting. A negative reply here (banner or
/// EHLO) is not an answer about the mailbox, so it becomes the "no response"
/// sentinel like a transport failure.
pub(crate) fn greeting_failure(error: &SmtpError, server: &str) -> ProbeCode {
    match error.status() {
        Some(code) => {
            tracing::warn!(target: "smtp_task", "{} refused the SMTP greeting with {}: {}", server, code, error);
            None
        }
        None => code_from_error(error, server),
    }
}
