//! Scripted in-memory transport for driver tests.
//!
//! Each observed write shifts the next queued reply into the receive buffer,
//! so a test scripts one reply per protocol write and then asserts against
//! the write and direction logs.

use super::{BusDirection, LinkTransport, TransportError, TransportStats};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;

pub struct FakeLink {
    replies: VecDeque<Vec<u8>>,
    rx: VecDeque<u8>,
    /// Max bytes returned per `receive` call (0 = unlimited)
    pub chunk: usize,
    pub writes: Vec<Vec<u8>>,
    pub directions: Vec<BusDirection>,
    pub discarded: Vec<u8>,
}

impl FakeLink {
    pub fn new() -> Self {
        Self {
            replies: VecDeque::new(),
            rx: VecDeque::new(),
            chunk: 0,
            writes: Vec::new(),
            directions: Vec::new(),
            discarded: Vec::new(),
        }
    }

    /// Queue the reply delivered after the next unanswered write.
    pub fn reply(&mut self, data: &[u8]) -> &mut Self {
        self.replies.push_back(data.to_vec());
        self
    }

    /// Preload bytes as if they were already sitting in the receive buffer.
    pub fn preload(&mut self, data: &[u8]) -> &mut Self {
        self.rx.extend(data);
        self
    }

    /// Concatenated write log.
    pub fn written(&self) -> Vec<u8> {
        self.writes.iter().flatten().copied().collect()
    }
}

#[async_trait]
impl LinkTransport for FakeLink {
    async fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        self.writes.push(data.to_vec());
        if let Some(reply) = self.replies.pop_front() {
            self.rx.extend(reply);
        }
        Ok(data.len())
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn receive(&mut self) -> Result<Bytes, TransportError> {
        let take = if self.chunk == 0 {
            self.rx.len()
        } else {
            self.chunk.min(self.rx.len())
        };
        let out: Vec<u8> = self.rx.drain(..take).collect();
        Ok(Bytes::from(out))
    }

    async fn discard_input(&mut self) -> Result<(), TransportError> {
        self.discarded.extend(self.rx.drain(..));
        Ok(())
    }

    async fn set_direction(&mut self, direction: BusDirection) -> Result<(), TransportError> {
        self.directions.push(direction);
        Ok(())
    }

    fn connection_info(&self) -> String {
        "fake".to_string()
    }

    fn stats(&self) -> TransportStats {
        TransportStats::default()
    }
}
