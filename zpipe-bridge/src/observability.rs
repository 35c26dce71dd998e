//! Structured logging vocabulary shared by the bridge's tracing statements.

pub(crate) mod events {
    pub const BRIDGE_STARTED: &str = "bridge_started";
    pub const BRIDGE_TERMINATED: &str = "bridge_terminated";

    pub const COMMAND_BLOCK_COLLECTED: &str = "command_block_collected";
    pub const COMMAND_BLOCK_REJECTED: &str = "command_block_rejected";
    pub const COMMAND_CHANNEL_CLOSED: &str = "command_channel_closed";
    pub const COMMAND_REJECTED: &str = "command_rejected";

    pub const ZWRITE_SENT: &str = "zwrite_sent";
    pub const ZWRITE_SEND_FAILED: &str = "zwrite_send_failed";

    pub const SUBSCRIPTION_APPLIED: &str = "subscription_applied";
    pub const SUBSCRIPTION_MISMATCH: &str = "subscription_mismatch";
    pub const SUBSCRIPTION_REQUEST_FAILED: &str = "subscription_request_failed";
    pub const SUBSCRIPTION_SET_DUMP: &str = "subscription_set_dump";
    pub const CANCEL_SUBSCRIPTIONS_FAILED: &str = "cancel_subscriptions_failed";

    pub const ZEPHYR_CHANNEL_CLOSED: &str = "zephyr_channel_closed";
    pub const NOTICE_RECEIVED: &str = "notice_received";
    pub const NOTICE_EMITTED: &str = "notice_emitted";
    pub const ERROR_EMITTED: &str = "error_emitted";
}

pub(crate) mod fields {
    use crate::transport::InboundNotice;

    /// Compact class/instance/sender origin label for inbound notices.
    pub fn format_notice_origin(notice: &InboundNotice) -> String {
        format!("{}/{}/{}", notice.class, notice.instance, notice.sender)
    }
}
