//! Delivery targets for completion envelopes.

use std::io::{self, Write};

use cnc_common::program::event::CompletionEnvelope;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("serialize completion envelope: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("write completion envelope: {0}")]
    Io(#[from] std::io::Error),

    /// Receiver reachable but refused the envelope.
    #[error("completion envelope rejected: {0}")]
    Rejected(String),
}

/// Receives envelopes on the delivery thread.
///
/// `deliver` may be called more than once for the same envelope when an
/// earlier attempt failed after the receiver already applied it.
pub trait CompletionSink: Send + 'static {
    fn deliver(&mut self, envelope: &CompletionEnvelope) -> Result<(), DeliveryError>;
}

/// Writes one JSON object per line and flushes after each envelope.
///
/// A write that fails part way leaves a fragment; the next record starts
/// on a fresh line so readers that skip unparseable lines lose nothing.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
    /// Output currently ends mid-line.
    torn: bool,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            torn: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send + 'static> CompletionSink for JsonLinesSink<W> {
    fn deliver(&mut self, envelope: &CompletionEnvelope) -> Result<(), DeliveryError> {
        let mut record = Vec::with_capacity(96);
        if self.torn {
            record.push(b'\n');
        }
        serde_json::to_writer(&mut record, envelope)?;
        record.push(b'\n');

        let mut written = 0;
        while written < record.len() {
            let err = match self.writer.write(&record[written..]) {
                Ok(0) => io::Error::from(io::ErrorKind::WriteZero),
                Ok(n) => {
                    written += n;
                    continue;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => e,
            };
            if written > 0 {
                self.torn = record[written - 1] != b'\n';
            }
            return Err(err.into());
        }
        self.torn = false;
        self.writer.flush()?;
        Ok(())
    }
}
