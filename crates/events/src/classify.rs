//! Event classification: source kind and routing key of a raw record.
//!
//! Pure transformation, no IO. The source field (`eventSource`) selects the
//! dispatch path:
//!
//! - contains `dynamodb` -> change-feed, routed by the snake-cased table name
//! - contains `sqs` -> queue, routed by the queue name
//! - any other value -> [`ClassificationError::UnknownSource`]
//! - field absent -> ad-hoc, routed by the record's `type`

use core::str::FromStr;

use outpost_core::SourceKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::arn;
use crate::attribute::decode_image;
use crate::error::ClassificationError;
use crate::record::Record;

const SOURCE_FIELDS: [&str; 2] = ["eventSource", "EventSource"];
const SOURCE_ARN_FIELD: &str = "eventSourceARN";

/// Routing key used for ad-hoc records that carry no `type`.
///
/// Nothing should be registered under it, so resolution fails loudly.
pub const MISSING_ADHOC_TYPE: &str = "<missing type>";

/// Row-level mutation kind of a change-feed record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Insert,
    Modify,
    Remove,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::Modify => "modify",
            Operation::Remove => "remove",
        }
    }
}

impl core::fmt::Display for Operation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ClassificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "insert" => Ok(Operation::Insert),
            "modify" => Ok(Operation::Modify),
            "remove" => Ok(Operation::Remove),
            _ => Err(ClassificationError::UnknownOperation(s.to_string())),
        }
    }
}

/// Deserialized change-feed record handed to change-feed entry points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub table_name: String,
    pub routing_key: String,
    pub operation: Operation,
    pub keys: Map<String, Value>,
    pub new_image: Map<String, Value>,
    pub old_image: Map<String, Value>,
    /// Removal performed by the table's TTL sweeper rather than a caller.
    pub expired_by_ttl: bool,
    pub event_id: Option<String>,
}

/// Queue message with its body deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub queue_name: String,
    pub message_id: Option<String>,
    pub body: Value,
    pub attributes: Value,
    pub message_attributes: Value,
}

/// Direct invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdhocEvent {
    pub event_type: Option<String>,
}

impl AdhocEvent {
    pub fn routing_key(&self) -> &str {
        self.event_type.as_deref().unwrap_or(MISSING_ADHOC_TYPE)
    }
}

/// A record mapped onto exactly one dispatch path.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    ChangeFeed(ChangeRecord),
    Queue(QueueMessage),
    Adhoc(AdhocEvent),
}

impl Classified {
    pub fn kind(&self) -> SourceKind {
        match self {
            Classified::ChangeFeed(_) => SourceKind::ChangeFeed,
            Classified::Queue(_) => SourceKind::Queue,
            Classified::Adhoc(_) => SourceKind::Adhoc,
        }
    }

    pub fn routing_key(&self) -> &str {
        match self {
            Classified::ChangeFeed(c) => &c.routing_key,
            Classified::Queue(q) => &q.queue_name,
            Classified::Adhoc(a) => a.routing_key(),
        }
    }
}

/// Source kind of a record, from its source field alone.
pub fn source_kind(record: &Record) -> Result<SourceKind, ClassificationError> {
    if record.as_object().is_none() {
        return Err(ClassificationError::NotAnObject);
    }

    let Some(source) = SOURCE_FIELDS.iter().find_map(|f| record.get(*f)) else {
        return Ok(SourceKind::Adhoc);
    };
    let source = source.as_str().unwrap_or_default();

    if source.contains("dynamodb") {
        Ok(SourceKind::ChangeFeed)
    } else if source.contains("sqs") {
        Ok(SourceKind::Queue)
    } else {
        Err(ClassificationError::UnknownSource(source.to_string()))
    }
}

/// Classify a record and derive everything its handler needs.
pub fn classify(record: &Record) -> Result<Classified, ClassificationError> {
    match source_kind(record)? {
        SourceKind::ChangeFeed => classify_change_feed(record).map(Classified::ChangeFeed),
        SourceKind::Queue => classify_queue(record).map(Classified::Queue),
        SourceKind::Adhoc => Ok(Classified::Adhoc(AdhocEvent {
            event_type: record.str_field("type").map(str::to_string),
        })),
    }
}

fn source_arn(record: &Record) -> Result<&str, ClassificationError> {
    record
        .str_field(SOURCE_ARN_FIELD)
        .ok_or(ClassificationError::MissingField(SOURCE_ARN_FIELD))
}

fn classify_change_feed(record: &Record) -> Result<ChangeRecord, ClassificationError> {
    let arn = source_arn(record)?;
    let table_name = arn::table_name_from_stream_arn(arn)?.to_string();
    let routing_key = arn::snake_case(&table_name);

    let operation: Operation = record
        .str_field("eventName")
        .ok_or(ClassificationError::MissingField("eventName"))?
        .parse()?;

    let stream = record
        .get("dynamodb")
        .ok_or(ClassificationError::MissingField("dynamodb"))?;
    let keys = stream
        .get("Keys")
        .ok_or(ClassificationError::MissingField("dynamodb.Keys"))?;

    let image = |name: &'static str| -> Result<Map<String, Value>, ClassificationError> {
        match stream.get(name) {
            Some(value) => decode_image(value)
                .map_err(|source| ClassificationError::Attribute { image: name, source }),
            None => Ok(Map::new()),
        }
    };

    let expired_by_ttl = record
        .get("userIdentity")
        .and_then(|u| u.get("type"))
        .and_then(Value::as_str)
        == Some("Service");

    Ok(ChangeRecord {
        table_name,
        routing_key,
        operation,
        keys: decode_image(keys)
            .map_err(|source| ClassificationError::Attribute { image: "Keys", source })?,
        new_image: image("NewImage")?,
        old_image: image("OldImage")?,
        expired_by_ttl,
        event_id: record.str_field("eventID").map(str::to_string),
    })
}

fn classify_queue(record: &Record) -> Result<QueueMessage, ClassificationError> {
    let arn = source_arn(record)?;
    let queue_name = arn::queue_name_from_arn(arn)?.to_string();

    let body = match record.get("body") {
        Some(Value::String(raw)) => serde_json::from_str(raw)
            .map_err(|e| ClassificationError::InvalidBody(e.to_string()))?,
        Some(other) => other.clone(),
        None => return Err(ClassificationError::MissingField("body")),
    };

    Ok(QueueMessage {
        queue_name,
        message_id: record.str_field("messageId").map(str::to_string),
        body,
        attributes: record.get("attributes").cloned().unwrap_or(Value::Null),
        message_attributes: record.get("messageAttributes").cloned().unwrap_or(Value::Null),
    })
}
