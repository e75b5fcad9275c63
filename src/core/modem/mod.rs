//! GSM modem link driver
//!
//! AT-command exchange with a SIM800-class module over its own UART:
//! bring-up, SIM and network-registration checks, signal diagnostics.
//! Response classification works on accumulated text with early exit on
//! the `OK` / `ERROR` / `>` markers; a timed-out exchange still returns
//! whatever text arrived, because the absence of a marker is itself
//! meaningful to callers.

pub mod sms;

pub use sms::{build_message, format_phone_number, MessageValues, SendOutcome, SmsError, SmsSender};

use crate::core::transport::{LinkTransport, TransportError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};

/// Modem bring-up errors
#[derive(Error, Debug)]
pub enum ModemError {
    /// Module did not answer `AT` after a retry
    #[error("Modem not responding")]
    NotResponding,

    /// SIM card absent, locked, or faulted
    #[error("SIM not ready: {response}")]
    SimNotReady {
        /// Raw `AT+CPIN?` response text
        response: String,
    },

    /// Underlying transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Parsed `AT+CSQ` signal report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalQuality {
    /// RSSI index 0-31, 99 = unknown
    pub rssi: u8,
    /// Bit error rate index
    pub ber: u8,
}

impl SignalQuality {
    /// Extract the report from accumulated response text
    pub fn parse(text: &str) -> Option<Self> {
        let rest = text.split("+CSQ:").nth(1)?;
        let mut fields = rest.trim().split(',');
        let rssi = fields.next()?.trim().parse().ok()?;
        let ber = fields
            .next()?
            .split_whitespace()
            .next()?
            .parse()
            .ok()?;
        Some(Self { rssi, ber })
    }

    /// RSSI as dBm, `None` when the module reports unknown (99)
    pub fn dbm(&self) -> Option<i16> {
        if self.rssi == 99 {
            None
        } else {
            Some(-113 + 2 * self.rssi as i16)
        }
    }
}

/// Modem driver configuration.
///
/// The boot delay is a hard lower bound: the module ignores commands for
/// about three seconds after power-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModemConfig {
    /// Country calling code prepended during phone normalization
    pub country_code: String,
    /// Delay before the first command after power-up, in ms
    pub boot_delay_ms: u64,
    /// Default command/response deadline in ms
    pub command_timeout_ms: u64,
    /// Post-marker grace read window in ms
    pub grace_period_ms: u64,
    /// Sleep between receive polls in ms
    pub poll_interval_ms: u64,
    /// Registration query attempts during bring-up
    pub registration_attempts: usize,
    /// Pause between registration attempts, in ms
    pub registration_retry_delay_ms: u64,
    /// Deadline for the SMS `>` prompt, in ms
    pub prompt_timeout_ms: u64,
    /// Deadline for the SMS delivery report, in ms
    pub delivery_timeout_ms: u64,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            country_code: "63".to_string(),
            boot_delay_ms: 3000,
            command_timeout_ms: 2000,
            grace_period_ms: 50,
            poll_interval_ms: 10,
            registration_attempts: 15,
            registration_retry_delay_ms: 2000,
            prompt_timeout_ms: 5000,
            delivery_timeout_ms: 30000,
        }
    }
}

/// AT-command driver owning the modem UART.
///
/// `ready` and `registered` are independent: a module can answer commands
/// with no network, and registration is re-queried at send time rather
/// than inferred from readiness.
pub struct ModemLink<T: LinkTransport> {
    transport: T,
    config: ModemConfig,
    ready: bool,
    registered: bool,
    signal: Option<SignalQuality>,
}

impl<T: LinkTransport> ModemLink<T> {
    /// Create a driver over an opened transport.
    pub fn new(transport: T, config: ModemConfig) -> Self {
        Self {
            transport,
            config,
            ready: false,
            registered: false,
            signal: None,
        }
    }

    /// Driver configuration
    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Module responded to `AT` and the SIM is present
    pub fn ready(&self) -> bool {
        self.ready
    }

    /// Outcome of the last registration query
    pub fn registered(&self) -> bool {
        self.registered
    }

    /// Last parsed signal report, if any
    pub fn signal_quality(&self) -> Option<SignalQuality> {
        self.signal
    }

    /// Underlying transport (for stats/info)
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub(crate) fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    #[cfg(test)]
    pub(crate) fn force_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    #[cfg(test)]
    pub(crate) fn force_registered(&mut self, registered: bool) {
        self.registered = registered;
    }

    fn has_marker(text: &str) -> bool {
        text.contains("OK") || text.contains("ERROR") || text.contains('>')
    }

    /// Send one command and collect the response with the default deadline.
    pub async fn send_command(&mut self, cmd: &str) -> Result<String, TransportError> {
        let timeout = Duration::from_millis(self.config.command_timeout_ms);
        self.send_command_with_timeout(cmd, timeout).await
    }

    /// Send one command and collect the response.
    ///
    /// Stale input is dropped first. Accumulation stops early on `OK`,
    /// `ERROR`, or `>`, followed by one short grace read for trailing
    /// bytes. A deadline with no marker is not an error; the accumulated
    /// text (possibly empty) is returned as-is for the caller to classify.
    pub async fn send_command_with_timeout(
        &mut self,
        cmd: &str,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        self.transport.discard_input().await?;
        self.transport.send(format!("{cmd}\r\n").as_bytes()).await?;
        self.transport.flush().await?;

        let deadline = Instant::now() + timeout;
        let mut text = String::new();

        loop {
            let chunk = self.transport.receive().await?;
            if !chunk.is_empty() {
                text.push_str(&String::from_utf8_lossy(&chunk));
                if Self::has_marker(&text) {
                    sleep(Duration::from_millis(self.config.grace_period_ms)).await;
                    let tail = self.transport.receive().await?;
                    text.push_str(&String::from_utf8_lossy(&tail));
                    break;
                }
                continue;
            }
            if Instant::now() >= deadline {
                break;
            }
            sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
        }

        let text = text.trim().to_string();
        tracing::debug!(cmd, response = %text, "AT exchange");
        Ok(text)
    }

    /// Bring the module up: probe, configure, check SIM, poll registration.
    ///
    /// Registration failure is a warning, not a bring-up failure: the
    /// module stays usable for diagnostics and a later send re-checks
    /// registration anyway. A missing SIM stops bring-up before any
    /// registration attempt.
    pub async fn init(&mut self) -> Result<(), ModemError> {
        self.ready = false;
        self.registered = false;

        tracing::info!(delay_ms = self.config.boot_delay_ms, "waiting for modem boot");
        sleep(Duration::from_millis(self.config.boot_delay_ms)).await;

        let mut resp = self.send_command("AT").await?;
        if !resp.contains("OK") {
            tracing::warn!("modem not answering, retrying");
            sleep(Duration::from_millis(2000)).await;
            resp = self.send_command("AT").await?;
        }
        if !resp.contains("OK") {
            tracing::warn!("modem not found");
            return Err(ModemError::NotResponding);
        }

        self.send_command("ATE0").await?; // echo off
        self.send_command("AT+CMGF=1").await?; // text mode
        self.send_command("AT+CSCS=\"GSM\"").await?;

        let sim = self.send_command("AT+CPIN?").await?;
        if !sim.contains("READY") {
            tracing::warn!(response = %sim, "SIM not ready");
            return Err(ModemError::SimNotReady { response: sim });
        }

        for attempt in 1..=self.config.registration_attempts {
            if self.check_registration().await? {
                tracing::info!(attempt, "network registered");
                break;
            }
            if attempt < self.config.registration_attempts {
                sleep(Duration::from_millis(self.config.registration_retry_delay_ms)).await;
            }
        }
        if !self.registered {
            tracing::warn!("network registration not confirmed");
        }

        let sig = self.send_command("AT+CSQ").await?;
        self.signal = SignalQuality::parse(&sig);
        match self.signal {
            Some(s) => tracing::info!(rssi = s.rssi, dbm = ?s.dbm(), "signal quality"),
            None => tracing::warn!(response = %sig, "unparseable signal report"),
        }

        self.ready = true;
        Ok(())
    }

    /// Query network registration and update the cached state.
    ///
    /// Status 1 (home) and 5 (roaming) count as registered; unregistered,
    /// searching, and denied do not.
    pub async fn check_registration(&mut self) -> Result<bool, TransportError> {
        let resp = self.send_command("AT+CREG?").await?;
        self.registered = resp.contains(",1") || resp.contains(",5");
        Ok(self.registered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::fake::FakeLink;

    fn modem(fake: FakeLink) -> ModemLink<FakeLink> {
        ModemLink::new(fake, ModemConfig::default())
    }

    fn command_log(link: &ModemLink<FakeLink>) -> Vec<String> {
        link.transport()
            .writes
            .iter()
            .map(|w| String::from_utf8_lossy(w).trim().to_string())
            .collect()
    }

    #[test]
    fn test_signal_quality_parse() {
        let s = SignalQuality::parse("+CSQ: 17,0\r\n\r\nOK").unwrap();
        assert_eq!(s, SignalQuality { rssi: 17, ber: 0 });
        assert_eq!(s.dbm(), Some(-79));

        let unknown = SignalQuality::parse("+CSQ: 99,99\r\nOK").unwrap();
        assert_eq!(unknown.dbm(), None);

        assert!(SignalQuality::parse("ERROR").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_command_early_exit_and_grace_read() {
        let mut fake = FakeLink::new();
        fake.chunk = 6;
        fake.reply(b"\r\nOK\r\n+tail");

        let started = Instant::now();
        let mut link = modem(fake);
        let resp = link.send_command("AT").await.unwrap();

        assert!(resp.contains("OK"));
        // trailing bytes captured by the grace read
        assert!(resp.contains("+tail"));
        // marker match exits well before the 2 s deadline
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_command_timeout_returns_accumulated_text() {
        let mut fake = FakeLink::new();
        fake.reply(b"garbled partial");

        let started = Instant::now();
        let mut link = modem(fake);
        let resp = link.send_command("AT+CREG?").await.unwrap();

        assert_eq!(resp, "garbled partial");
        assert!(started.elapsed() >= Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_happy_path() {
        let mut fake = FakeLink::new();
        fake.reply(b"AT\r\nOK\r\n"); // AT (echo still on)
        fake.reply(b"OK\r\n"); // ATE0
        fake.reply(b"OK\r\n"); // AT+CMGF=1
        fake.reply(b"OK\r\n"); // AT+CSCS
        fake.reply(b"+CPIN: READY\r\n\r\nOK\r\n");
        fake.reply(b"+CREG: 0,1\r\n\r\nOK\r\n");
        fake.reply(b"+CSQ: 17,0\r\n\r\nOK\r\n");

        let mut link = modem(fake);
        link.init().await.unwrap();

        assert!(link.ready());
        assert!(link.registered());
        assert_eq!(link.signal_quality().and_then(|s| s.dbm()), Some(-79));
        assert_eq!(
            command_log(&link),
            vec![
                "AT",
                "ATE0",
                "AT+CMGF=1",
                "AT+CSCS=\"GSM\"",
                "AT+CPIN?",
                "AT+CREG?",
                "AT+CSQ"
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_retries_at_probe_once() {
        let mut fake = FakeLink::new();
        fake.reply(b""); // first AT unanswered
        fake.reply(b"OK\r\n"); // retry succeeds
        fake.reply(b"OK\r\n"); // ATE0
        fake.reply(b"OK\r\n"); // AT+CMGF=1
        fake.reply(b"OK\r\n"); // AT+CSCS
        fake.reply(b"+CPIN: READY\r\nOK\r\n");
        fake.reply(b"+CREG: 0,1\r\nOK\r\n");
        fake.reply(b"+CSQ: 20,0\r\nOK\r\n");

        let mut link = modem(fake);
        link.init().await.unwrap();
        assert!(link.ready());
        assert_eq!(command_log(&link)[..2], ["AT", "AT"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_not_responding() {
        let fake = FakeLink::new(); // never answers
        let mut link = modem(fake);

        assert!(matches!(link.init().await, Err(ModemError::NotResponding)));
        assert!(!link.ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_stops_on_sim_not_ready() {
        let mut fake = FakeLink::new();
        fake.reply(b"OK\r\n");
        fake.reply(b"OK\r\n");
        fake.reply(b"OK\r\n");
        fake.reply(b"OK\r\n");
        fake.reply(b"+CPIN: SIM PIN\r\n\r\nOK\r\n");

        let mut link = modem(fake);
        assert!(matches!(
            link.init().await,
            Err(ModemError::SimNotReady { .. })
        ));
        assert!(!link.ready());
        // registration must not have been attempted
        assert!(!command_log(&link).iter().any(|c| c.contains("CREG")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_polls_registration_until_home() {
        let mut fake = FakeLink::new();
        let replies: [&[u8]; 9] = [
            b"OK\r\n",
            b"OK\r\n",
            b"OK\r\n",
            b"OK\r\n",
            b"+CPIN: READY\r\nOK\r\n",
            b"+CREG: 0,2\r\nOK\r\n",
            b"+CREG: 0,2\r\nOK\r\n",
            b"+CREG: 0,1\r\nOK\r\n",
            b"+CSQ: 12,0\r\nOK\r\n",
        ];
        for reply in replies {
            fake.reply(reply);
        }

        let mut link = modem(fake);
        link.init().await.unwrap();

        assert!(link.registered());
        let creg_queries = command_log(&link)
            .iter()
            .filter(|c| c.as_str() == "AT+CREG?")
            .count();
        assert_eq!(creg_queries, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_ready_despite_registration_failure() {
        let mut fake = FakeLink::new();
        fake.reply(b"OK\r\n");
        fake.reply(b"OK\r\n");
        fake.reply(b"OK\r\n");
        fake.reply(b"OK\r\n");
        fake.reply(b"+CPIN: READY\r\nOK\r\n");
        for _ in 0..15 {
            fake.reply(b"+CREG: 0,2\r\nOK\r\n"); // searching, never registers
        }
        fake.reply(b"+CSQ: 8,0\r\nOK\r\n");

        let mut link = modem(fake);
        link.init().await.unwrap();

        assert!(link.ready());
        assert!(!link.registered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_registration_classification() {
        let cases: [(&[u8], bool); 4] = [
            (b"+CREG: 0,1\r\nOK\r\n", true),
            (b"+CREG: 0,5\r\nOK\r\n", true),
            (b"+CREG: 0,0\r\nOK\r\n", false),
            (b"+CREG: 0,2\r\nOK\r\n", false),
        ];
        for (reply, expected) in cases {
            let mut fake = FakeLink::new();
            fake.reply(reply);
            let mut link = modem(fake);
            assert_eq!(link.check_registration().await.unwrap(), expected);
            assert_eq!(link.registered(), expected);
        }
    }
}
