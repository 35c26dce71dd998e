//! Command dispatch and field-default policy for collected argument blocks.

use crate::command_plane::collector::{ArgumentBlock, ArgumentCollector, CollectError};
use crate::error::{BridgeError, ProtocolError};
use crate::notice_plane::writer::RecordWriter;
use crate::observability::events;
use crate::subscription::reconciler;
use crate::transport::{Notice, Subscription, ZephyrTransport, WILDCARD};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

const COMPONENT: &str = "command_dispatcher";

const COMMAND_ZWRITE: &str = "zwrite";
const COMMAND_SUBSCRIBE: &str = "subscribe";
const COMMAND_UNSUBSCRIBE: &str = "unsubscribe";
const COMMAND_CLOSE_ZEPHYR: &str = "close_zephyr";

const DEFAULT_CHARSET: &str = "UTF-8";
const DEFAULT_CLASS: &str = "MESSAGE";
const DEFAULT_INSTANCE: &str = "personal";

const ZWRITE_KEYS: &[&str] = &[
    "command",
    "charset",
    "sender",
    "class",
    "instance",
    "recipient",
    "opcode",
    "auth",
    "message_length",
];
const SUBSCRIPTION_KEYS: &[&str] = &["command", "class", "instance", "recipient"];
const CLOSE_ZEPHYR_KEYS: &[&str] = &["command"];

/// Operation tags carried by error records, naming the activity that failed.
pub(crate) mod operations {
    pub(crate) const READING: &str = "reading command";
    pub(crate) const DISPATCHING: &str = "dispatching";
    pub(crate) const ZWRITING: &str = "zwriting";
    pub(crate) const SUBSCRIBING: &str = "subscribing";
    pub(crate) const UNSUBSCRIBING: &str = "unsubscribing";
    pub(crate) const CANCELING: &str = "canceling subscriptions";
}

/// What the event loop should do after one dispatched block.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Dispatch {
    Continue,
    /// The block carried no `command` field: clean end of command input.
    CommandChannelDone,
    /// `close_zephyr`: cancel subscriptions and retire the messaging channel.
    CloseZephyr,
}

/// Dispatches one completed argument block.
///
/// Failed commands are reported on the output channel and resolve to
/// [`Dispatch::Continue`]; only channel-level failures return `Err`.
pub(crate) async fn dispatch<R, W>(
    block: &ArgumentBlock,
    collector: &mut ArgumentCollector<R>,
    writer: &mut RecordWriter<W>,
    transport: &dyn ZephyrTransport,
) -> Result<Dispatch, BridgeError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let Some(command) = block.get("command") else {
        return Ok(Dispatch::CommandChannelDone);
    };

    match command {
        COMMAND_ZWRITE => zwrite(block, collector, writer, transport).await,
        COMMAND_SUBSCRIBE => subscription_change(block, writer, transport, true).await,
        COMMAND_UNSUBSCRIBE => subscription_change(block, writer, transport, false).await,
        COMMAND_CLOSE_ZEPHYR => {
            if let Err(protocol) = check_keys(COMMAND_CLOSE_ZEPHYR, block, CLOSE_ZEPHYR_KEYS) {
                writer
                    .error(Some(operations::DISPATCHING), &protocol.to_string())
                    .await?;
                return Ok(Dispatch::Continue);
            }
            Ok(Dispatch::CloseZephyr)
        }
        other => {
            warn!(
                event = events::COMMAND_REJECTED,
                component = COMPONENT,
                command = other,
                "rejecting unknown command"
            );
            let protocol = ProtocolError::UnknownCommand(other.to_string());
            writer
                .error(Some(operations::DISPATCHING), &protocol.to_string())
                .await?;
            Ok(Dispatch::Continue)
        }
    }
}

async fn zwrite<R, W>(
    block: &ArgumentBlock,
    collector: &mut ArgumentCollector<R>,
    writer: &mut RecordWriter<W>,
    transport: &dyn ZephyrTransport,
) -> Result<Dispatch, BridgeError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    // Resolve message_length before anything else: even a rejected zwrite
    // must consume its declared payload to keep the channel aligned on the
    // next block.
    let declared_len = match message_length(block) {
        Ok(len) => len,
        Err(protocol) => {
            writer
                .error(Some(operations::ZWRITING), &protocol.to_string())
                .await?;
            return Ok(Dispatch::Continue);
        }
    };

    let resolved = resolve_notice(block, transport.sender_identity());
    let payload = match collector.read_payload(declared_len).await {
        Ok(payload) => payload,
        Err(CollectError::Protocol(protocol)) => {
            writer
                .error(Some(operations::ZWRITING), &protocol.to_string())
                .await?;
            return Ok(Dispatch::Continue);
        }
        Err(CollectError::Fatal(fatal)) => return Err(fatal),
    };

    let mut notice = match resolved {
        Ok(notice) => notice,
        Err(protocol) => {
            writer
                .error(Some(operations::ZWRITING), &protocol.to_string())
                .await?;
            return Ok(Dispatch::Continue);
        }
    };
    notice.payload = payload;

    match transport.send(notice).await {
        Ok(()) => {
            debug!(
                event = events::ZWRITE_SENT,
                component = COMPONENT,
                payload_len = declared_len,
                "zwrite handed to the messaging service"
            );
        }
        Err(error) => {
            warn!(
                event = events::ZWRITE_SEND_FAILED,
                component = COMPONENT,
                err = %error,
                "zwrite send failed"
            );
            writer
                .error(Some(operations::ZWRITING), &error.to_string())
                .await?;
        }
    }
    Ok(Dispatch::Continue)
}

async fn subscription_change<W>(
    block: &ArgumentBlock,
    writer: &mut RecordWriter<W>,
    transport: &dyn ZephyrTransport,
    want_subscribed: bool,
) -> Result<Dispatch, BridgeError>
where
    W: AsyncWrite + Unpin,
{
    let (command, operation) = if want_subscribed {
        (COMMAND_SUBSCRIBE, operations::SUBSCRIBING)
    } else {
        (COMMAND_UNSUBSCRIBE, operations::UNSUBSCRIBING)
    };

    let subscription = match resolve_subscription(command, block) {
        Ok(subscription) => subscription,
        Err(protocol) => {
            writer.error(Some(operation), &protocol.to_string()).await?;
            return Ok(Dispatch::Continue);
        }
    };

    match reconciler::apply(transport, &subscription, want_subscribed).await {
        Ok(true) => {
            debug!(
                event = events::SUBSCRIPTION_APPLIED,
                component = COMPONENT,
                subscription = %subscription,
                want_subscribed,
                "subscription change verified"
            );
        }
        Ok(false) => {
            warn!(
                event = events::SUBSCRIPTION_MISMATCH,
                component = COMPONENT,
                subscription = %subscription,
                want_subscribed,
                "accepted request did not reach the desired subscription state"
            );
            let state = if want_subscribed {
                "missing"
            } else {
                "still present"
            };
            writer
                .error(
                    Some(operation),
                    &format!(
                        "subscription {subscription} is {state} despite an accepted {command} request"
                    ),
                )
                .await?;
        }
        Err(error) => {
            warn!(
                event = events::SUBSCRIPTION_REQUEST_FAILED,
                component = COMPONENT,
                subscription = %subscription,
                err = %error,
                "subscription request failed"
            );
            writer.error(Some(operation), &error.to_string()).await?;
        }
    }
    Ok(Dispatch::Continue)
}

/// Applies the documented zwrite defaults to a block.
///
/// An empty sender falls back to the service identity the same way an absent
/// one does.
fn resolve_notice(block: &ArgumentBlock, identity: String) -> Result<Notice, ProtocolError> {
    check_keys(COMMAND_ZWRITE, block, ZWRITE_KEYS)?;

    let auth = match block.get("auth") {
        None | Some("1") => true,
        Some("0") => false,
        Some(other) => {
            return Err(ProtocolError::InvalidField {
                field: "auth",
                value: other.to_string(),
            })
        }
    };
    let sender = match block.get("sender") {
        None | Some("") => identity,
        Some(sender) => sender.to_string(),
    };

    Ok(Notice {
        charset: block.get_or("charset", DEFAULT_CHARSET).to_string(),
        sender,
        class: block.get_or("class", DEFAULT_CLASS).to_string(),
        instance: block.get_or("instance", DEFAULT_INSTANCE).to_string(),
        recipient: block.get_or("recipient", "").to_string(),
        opcode: block.get_or("opcode", "").to_string(),
        auth,
        payload: Vec::new(),
    })
}

fn resolve_subscription(
    command: &str,
    block: &ArgumentBlock,
) -> Result<Subscription, ProtocolError> {
    check_keys(command, block, SUBSCRIPTION_KEYS)?;

    let Some(class) = block.get("class") else {
        // There is no safe default topic to fall back to.
        return Err(ProtocolError::MissingField {
            command: command.to_string(),
            field: "class",
        });
    };
    Ok(Subscription::new(
        class,
        block.get_or("instance", WILDCARD),
        block.get_or("recipient", WILDCARD),
    ))
}

fn message_length(block: &ArgumentBlock) -> Result<usize, ProtocolError> {
    match block.get("message_length") {
        None => Ok(0),
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| ProtocolError::InvalidField {
                field: "message_length",
                value: raw.to_string(),
            }),
    }
}

fn check_keys(
    command: &str,
    block: &ArgumentBlock,
    allowed: &[&str],
) -> Result<(), ProtocolError> {
    for key in block.keys() {
        if !allowed.contains(&key) {
            return Err(ProtocolError::UnknownKey {
                command: command.to_string(),
                key: key.to_string(),
            });
        }
    }
    Ok(())
}
