//! Null-delimited argument-block collection from the command channel.

use crate::error::{BridgeError, ProtocolError};
use crate::observability::events;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tracing::{debug, warn};

const COMPONENT: &str = "argument_collector";

const DELIMITER: u8 = 0;

/// One key/value pair read from the command channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Argument {
    pub(crate) key: String,
    pub(crate) value: String,
}

/// One completed argument block, in the order it was read. Keys are unique;
/// semantics never depend on entry order.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ArgumentBlock {
    entries: Vec<Argument>,
}

impl ArgumentBlock {
    pub(crate) fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value.as_str())
    }

    /// Field value, with a fixed default for absent keys.
    pub(crate) fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.key.as_str())
    }
}

/// Outcome of one collection attempt.
#[derive(Debug)]
pub(crate) enum Collected {
    Block(ArgumentBlock),
    /// End of stream where a key would start: the command channel is done.
    EndOfInput,
}

/// Failure out of [`ArgumentCollector::collect`]: either a malformation of
/// the current block (the loop continues) or a failing channel (fatal).
#[derive(Debug)]
pub(crate) enum CollectError {
    Protocol(ProtocolError),
    Fatal(BridgeError),
}

pub(crate) struct ArgumentCollector<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> ArgumentCollector<R> {
    pub(crate) fn new(channel: R) -> Self {
        Self {
            reader: BufReader::new(channel),
        }
    }

    /// Waits until at least one command byte is buffered, or end of stream.
    ///
    /// Cancellation-safe, unlike [`ArgumentCollector::collect`]: a dropped
    /// wait leaves any read bytes in the internal buffer. This is the arm
    /// the event loop races against the messaging channel; the actual
    /// collection then runs uninterrupted.
    pub(crate) async fn readiness(&mut self) -> Result<(), BridgeError> {
        self.reader
            .fill_buf()
            .await
            .map(|_| ())
            .map_err(BridgeError::CommandIo)
    }

    /// Collects one argument block, stopping at the empty-key terminator.
    ///
    /// On a duplicate key the remainder of the block is drained to its
    /// terminator, so the next collection starts aligned on a block
    /// boundary; no field of the rejected block is surfaced.
    pub(crate) async fn collect(&mut self) -> Result<Collected, CollectError> {
        let mut entries: Vec<Argument> = Vec::new();
        loop {
            let key = match self.token().await? {
                Some(key) => key,
                None if entries.is_empty() => return Ok(Collected::EndOfInput),
                None => {
                    warn!(
                        event = events::COMMAND_CHANNEL_CLOSED,
                        component = COMPONENT,
                        discarded_entries = entries.len(),
                        "command channel ended between entries, discarding partial block"
                    );
                    return Ok(Collected::EndOfInput);
                }
            };

            if key.is_empty() {
                debug!(
                    event = events::COMMAND_BLOCK_COLLECTED,
                    component = COMPONENT,
                    entries = entries.len(),
                    "collected argument block"
                );
                return Ok(Collected::Block(ArgumentBlock { entries }));
            }

            if entries.iter().any(|entry| entry.key == key) {
                // The repeated key's own value is still unread; consume it
                // before draining the remaining pairs.
                if let Err(CollectError::Fatal(fatal)) = self.raw_token().await {
                    return Err(CollectError::Fatal(fatal));
                }
                self.drain_block().await?;
                return Err(CollectError::Protocol(ProtocolError::DuplicateKey(key)));
            }

            let Some(value) = self.token().await? else {
                return Err(CollectError::Protocol(ProtocolError::TruncatedArgument));
            };
            entries.push(Argument { key, value });
        }
    }

    /// Reads exactly `len` raw payload bytes.
    ///
    /// Payloads may contain the delimiter byte, so this is a fixed-length
    /// read with its own short-read failure mode, not a delimited one.
    pub(crate) async fn read_payload(&mut self, len: usize) -> Result<Vec<u8>, CollectError> {
        let mut payload = vec![0u8; len];
        let mut read = 0;
        while read < len {
            let n = self
                .reader
                .read(&mut payload[read..])
                .await
                .map_err(|error| CollectError::Fatal(BridgeError::CommandIo(error)))?;
            if n == 0 {
                return Err(CollectError::Protocol(ProtocolError::TruncatedPayload {
                    expected: len,
                    read,
                }));
            }
            read += n;
        }
        Ok(payload)
    }

    /// One delimited token, without its delimiter; `None` on clean end of
    /// stream.
    async fn token(&mut self) -> Result<Option<String>, CollectError> {
        let Some(raw) = self.raw_token().await? else {
            return Ok(None);
        };
        let token = String::from_utf8(raw)
            .map_err(|_| CollectError::Protocol(ProtocolError::MalformedUtf8))?;
        Ok(Some(token))
    }

    async fn raw_token(&mut self) -> Result<Option<Vec<u8>>, CollectError> {
        let mut raw = Vec::new();
        let n = self
            .reader
            .read_until(DELIMITER, &mut raw)
            .await
            .map_err(|error| CollectError::Fatal(BridgeError::CommandIo(error)))?;
        if n == 0 {
            return Ok(None);
        }
        if raw.pop() != Some(DELIMITER) {
            // The stream ended inside the token, before its delimiter.
            return Err(CollectError::Protocol(ProtocolError::TruncatedArgument));
        }
        Ok(Some(raw))
    }

    /// Consumes the remainder of a malformed block through its terminator.
    async fn drain_block(&mut self) -> Result<(), CollectError> {
        loop {
            match self.raw_token().await {
                Ok(None) => return Ok(()),
                Ok(Some(key)) if key.is_empty() => return Ok(()),
                Ok(Some(_)) => match self.raw_token().await {
                    Ok(_) => {}
                    Err(CollectError::Fatal(fatal)) => return Err(CollectError::Fatal(fatal)),
                    Err(CollectError::Protocol(_)) => return Ok(()),
                },
                Err(CollectError::Fatal(fatal)) => return Err(CollectError::Fatal(fatal)),
                Err(CollectError::Protocol(_)) => return Ok(()),
            }
        }
    }
}
