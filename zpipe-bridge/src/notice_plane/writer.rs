//! Record writer with a flush-per-record discipline.

use crate::error::BridgeError;
use crate::notice_plane::encoder;
use crate::observability::{events, fields};
use crate::transport::InboundNotice;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

const COMPONENT: &str = "record_writer";

pub(crate) struct RecordWriter<W> {
    channel: W,
}

impl<W: AsyncWrite + Unpin> RecordWriter<W> {
    pub(crate) fn new(channel: W) -> Self {
        Self { channel }
    }

    pub(crate) async fn notice(&mut self, notice: &InboundNotice) -> Result<(), BridgeError> {
        let record = encoder::encode_notice(notice);
        self.write_record(&record).await?;
        debug!(
            event = events::NOTICE_EMITTED,
            component = COMPONENT,
            origin = %fields::format_notice_origin(notice),
            record_len = record.len(),
            "emitted notice record"
        );
        Ok(())
    }

    pub(crate) async fn error(
        &mut self,
        operation: Option<&str>,
        message: &str,
    ) -> Result<(), BridgeError> {
        let record = encoder::encode_error(operation, message);
        self.write_record(&record).await?;
        debug!(
            event = events::ERROR_EMITTED,
            component = COMPONENT,
            operation = operation.unwrap_or(""),
            detail = message,
            "emitted error record"
        );
        Ok(())
    }

    async fn write_record(&mut self, record: &[u8]) -> Result<(), BridgeError> {
        self.channel
            .write_all(record)
            .await
            .map_err(BridgeError::OutputIo)?;
        // A reader must never observe a partially written record.
        self.channel.flush().await.map_err(BridgeError::OutputIo)
    }
}
