//! SMS submission over the modem link
//!
//! Phone-number normalization, message templating, and the prompt-gated
//! `AT+CMGS` transaction. One call is one attempt: every outcome is
//! terminal and retry policy belongs to the caller.

use super::{ModemConfig, ModemLink};
use crate::core::sensor::SoilMeasurement;
use crate::core::transport::{LinkTransport, TransportError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};

/// Message terminator (Ctrl+Z)
const SUBMIT: u8 = 0x1A;
/// Submission cancel (Esc)
const CANCEL: u8 = 0x1B;

/// Precondition failures, surfaced before the transaction starts
#[derive(Error, Debug)]
pub enum SmsError {
    /// Bring-up never completed
    #[error("Modem not ready")]
    ModemNotReady,

    /// Fresh registration query came back negative
    #[error("Not registered on the network")]
    NotRegistered,

    /// Underlying transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Terminal outcome of one send attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Submission confirmed by the network (`+CMGS:` report)
    Sent,
    /// Module reported an error after the body was submitted
    Rejected,
    /// No `>` prompt arrived; the body was never written
    PromptTimeout,
    /// Neither confirmation nor error before the delivery deadline
    DeliveryTimeout,
}

/// Values substituted into an SMS template
#[derive(Debug, Clone, Copy)]
pub struct MessageValues<'a> {
    /// Farmer identifier, inserted verbatim
    pub farmer_id: &'a str,
    /// Averaged measurement backing the numeric placeholders
    pub measurement: &'a SoilMeasurement,
    /// Timestamp string, inserted verbatim
    pub timestamp: &'a str,
}

/// Normalize a phone number to international form.
///
/// Pure string work, no I/O: `+`-prefixed input passes through, a trunk
/// `0` on a full-length number is swapped for the country code, and
/// anything else gets the country code prepended as-is.
pub fn format_phone_number(raw: &str, country_code: &str) -> String {
    if raw.starts_with('+') {
        raw.to_string()
    } else if raw.starts_with('0') && raw.len() >= 10 {
        format!("+{country_code}{}", &raw[1..])
    } else {
        format!("+{country_code}{raw}")
    }
}

/// Fill an SMS template.
///
/// Recognized placeholders are replaced wherever they appear; anything
/// else in braces is left untouched. Humidity, temperature, and pH print
/// with one decimal, EC and N/P/K as truncated integers. After
/// substitution, literal `\n` escape pairs become real line breaks;
/// line breaks already present are kept as-is.
pub fn build_message(template: &str, values: &MessageValues<'_>) -> String {
    let m = values.measurement;
    template
        .replace("{farmer_id}", values.farmer_id)
        .replace("{humidity}", &format!("{:.1}", m.humidity))
        .replace("{temperature}", &format!("{:.1}", m.temperature))
        .replace("{ec}", &format!("{}", m.ec as i64))
        .replace("{ph}", &format!("{:.1}", m.ph))
        .replace("{nitrogen}", &format!("{}", m.nitrogen as i64))
        .replace("{phosphorus}", &format!("{}", m.phosphorus as i64))
        .replace("{potassium}", &format!("{}", m.potassium as i64))
        .replace("{timestamp}", values.timestamp)
        .replace("\\n", "\n")
}

/// Drives the modem link through the multi-step SMS submission protocol.
pub struct SmsSender<T: LinkTransport> {
    modem: ModemLink<T>,
}

impl<T: LinkTransport> SmsSender<T> {
    /// Take exclusive ownership of a modem link
    pub fn new(modem: ModemLink<T>) -> Self {
        Self { modem }
    }

    /// Borrow the wrapped modem link
    pub fn modem(&self) -> &ModemLink<T> {
        &self.modem
    }

    /// Mutably borrow the wrapped modem link (e.g. for bring-up)
    pub fn modem_mut(&mut self) -> &mut ModemLink<T> {
        &mut self.modem
    }

    /// Submit one SMS.
    ///
    /// Preconditions: the modem must be ready and registration is
    /// re-queried here rather than trusted from cache; either failure
    /// aborts before any submission byte is written. After the `>`
    /// prompt the body goes out verbatim followed by a single Ctrl+Z;
    /// a missing prompt is cancelled with Esc and the body is never
    /// written. No retry happens inside this call.
    pub async fn send(&mut self, phone: &str, body: &str) -> Result<SendOutcome, SmsError> {
        if !self.modem.ready() {
            return Err(SmsError::ModemNotReady);
        }
        if !self.modem.check_registration().await? {
            return Err(SmsError::NotRegistered);
        }

        let number = format_phone_number(phone, &self.modem.config().country_code);
        tracing::info!(number = %number, bytes = body.len(), "sending SMS");

        self.modem.send_command("AT+CMGF=1").await?;

        let config: ModemConfig = self.modem.config().clone();
        let transport = self.modem.transport_mut();
        transport.discard_input().await?;
        transport
            .send(format!("AT+CMGS=\"{number}\"\r\n").as_bytes())
            .await?;
        transport.flush().await?;

        // AwaitingPrompt
        let deadline = Instant::now() + Duration::from_millis(config.prompt_timeout_ms);
        let mut prompt = false;
        let mut seen: Vec<u8> = Vec::new();
        loop {
            let chunk = transport.receive().await?;
            if !chunk.is_empty() {
                seen.extend_from_slice(&chunk);
                if seen.contains(&b'>') {
                    prompt = true;
                    break;
                }
                continue;
            }
            if Instant::now() >= deadline {
                break;
            }
            sleep(Duration::from_millis(config.poll_interval_ms)).await;
        }

        if !prompt {
            transport.send(&[CANCEL]).await?;
            transport.flush().await?;
            tracing::warn!("no SMS prompt, submission cancelled");
            return Ok(SendOutcome::PromptTimeout);
        }

        // SubmittingBody
        transport.send(body.as_bytes()).await?;
        transport.send(&[SUBMIT]).await?;
        transport.flush().await?;

        // AwaitingDeliveryResult
        let deadline = Instant::now() + Duration::from_millis(config.delivery_timeout_ms);
        let mut text = String::new();
        loop {
            let chunk = transport.receive().await?;
            if !chunk.is_empty() {
                text.push_str(&String::from_utf8_lossy(&chunk));
                if text.contains("+CMGS:") {
                    tracing::info!("SMS submitted");
                    return Ok(SendOutcome::Sent);
                }
                if text.contains("ERROR") {
                    tracing::warn!(response = %text.trim(), "SMS rejected");
                    return Ok(SendOutcome::Rejected);
                }
                continue;
            }
            if Instant::now() >= deadline {
                break;
            }
            sleep(Duration::from_millis(config.poll_interval_ms)).await;
        }

        tracing::warn!("no delivery report before deadline");
        Ok(SendOutcome::DeliveryTimeout)
    }
}
