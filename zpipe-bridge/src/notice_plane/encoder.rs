//! Two-pass encoding of length-prefixed output records.

use crate::transport::InboundNotice;

pub(crate) const RECORD_TYPE_NOTICE: &str = "notice";
pub(crate) const RECORD_TYPE_ERROR: &str = "error";

const DELIMITER: u8 = 0;

/// Encodes one inbound notice as a record: preamble, the fixed field order
/// (charset, timestamp, sender, class, instance, recipient, opcode, auth,
/// message_length), a lone delimiter, then the raw payload.
pub(crate) fn encode_notice(notice: &InboundNotice) -> Vec<u8> {
    let timestamp = notice.timestamp.to_string();
    let message_length = notice.payload.len().to_string();
    let auth: &[u8] = if notice.authenticated { b"1" } else { b"0" };

    let fields: [(&str, &[u8]); 9] = [
        ("charset", notice.charset.as_bytes()),
        ("timestamp", timestamp.as_bytes()),
        ("sender", notice.sender.as_bytes()),
        ("class", notice.class.as_bytes()),
        ("instance", notice.instance.as_bytes()),
        ("recipient", notice.recipient.as_bytes()),
        ("opcode", notice.opcode.as_bytes()),
        ("auth", auth),
        ("message_length", message_length.as_bytes()),
    ];
    encode_record(RECORD_TYPE_NOTICE, &fields, &notice.payload)
}

/// Encodes one error record: an optional operation field naming the failed
/// activity, then the message.
pub(crate) fn encode_error(operation: Option<&str>, message: &str) -> Vec<u8> {
    let mut fields: Vec<(&str, &[u8])> = Vec::with_capacity(2);
    if let Some(operation) = operation {
        fields.push(("operation", operation.as_bytes()));
    }
    fields.push(("message", message.as_bytes()));
    encode_record(RECORD_TYPE_ERROR, &fields, &[])
}

/// Exact byte count of the field records, their terminating lone delimiter,
/// and the payload. Shared by the measuring pass and the writing pass so the
/// emitted `length` can never drift from the bytes that follow it.
fn body_len(fields: &[(&str, &[u8])], payload_len: usize) -> usize {
    let field_records: usize = fields
        .iter()
        .map(|(name, value)| name.len() + value.len() + 2)
        .sum();
    field_records + 1 + payload_len
}

fn encode_record(record_type: &str, fields: &[(&str, &[u8])], payload: &[u8]) -> Vec<u8> {
    let length = body_len(fields, payload.len()).to_string();

    let mut record = Vec::new();
    push_field(&mut record, "type", record_type.as_bytes());
    push_field(&mut record, "length", length.as_bytes());
    record.push(DELIMITER);
    for (name, value) in fields {
        push_field(&mut record, name, value);
    }
    record.push(DELIMITER);
    record.extend_from_slice(payload);
    record
}

fn push_field(record: &mut Vec<u8>, name: &str, value: &[u8]) {
    record.extend_from_slice(name.as_bytes());
    record.push(DELIMITER);
    record.extend_from_slice(value);
    record.push(DELIMITER);
}
