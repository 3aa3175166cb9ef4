//! Schedule records and the codec that maps them to stored values.
//!
//! A record is an opaque field map. Only the `id` field is interpreted: its
//! string form is the record's key in the schedule store.

use serde_json::{Map, Value};
use tidings_state::Record;

/// Field holding the schedule identifier.
pub const ID_FIELD: &str = "id";

/// One persisted notification schedule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleRecord {
    fields: Map<String, Value>,
}

impl ScheduleRecord {
    /// A record carrying only an id.
    pub fn new(id: i64) -> Self {
        let mut record = Self::default();
        record.set_id(id);
        record
    }

    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// The schedule id, if the record carries an integer one.
    pub fn id(&self) -> Option<i64> {
        self.fields.get(ID_FIELD).and_then(Value::as_i64)
    }

    pub fn set_id(&mut self, id: i64) {
        self.fields.insert(ID_FIELD.to_string(), Value::from(id));
    }

    /// Store key for this record. Records without an id share key `"0"`.
    pub fn key(&self) -> String {
        self.id().unwrap_or(0).to_string()
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

/// Converts between schedule records and their stored representation.
pub trait ScheduleCodec: Send + Sync {
    /// Decode a stored value. Returns `None` for malformed entries.
    fn decode(&self, value: &Value) -> Option<ScheduleRecord>;

    fn encode(&self, record: &ScheduleRecord) -> Value;
}

/// Default codec: any JSON object whose `id` (when present) is an integer.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonScheduleCodec;

impl ScheduleCodec for JsonScheduleCodec {
    fn decode(&self, value: &Value) -> Option<ScheduleRecord> {
        let fields = value.as_object()?;
        if let Some(id) = fields.get(ID_FIELD) {
            id.as_i64()?;
        }
        Some(ScheduleRecord::from_fields(fields.clone()))
    }

    fn encode(&self, record: &ScheduleRecord) -> Value {
        Value::Object(record.fields.clone())
    }
}

/// Decode a keyed-store record through `codec`.
pub(crate) fn decode_record(codec: &dyn ScheduleCodec, record: Record) -> Option<ScheduleRecord> {
    codec.decode(&Value::Object(record))
}

/// Encode through `codec`, keeping only object encodings.
pub(crate) fn encode_record(codec: &dyn ScheduleCodec, record: &ScheduleRecord) -> Option<Record> {
    match codec.encode(record) {
        Value::Object(fields) => Some(fields),
        _ => None,
    }
}
