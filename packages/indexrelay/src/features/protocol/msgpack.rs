//! MessagePack serialization provider
//!
//! Bodies are written with `rmp_serde::to_vec_named`, so every record is a
//! map keyed by field name. Decoding runs in three passes over the body:
//!
//! 1. probe: read only the `kind` tags and reject unknown ones by name
//! 2. typed decode into `Message`, then attribute-code validation
//! 3. replay into the caller's `WorkBuilder`
//!
//! Nothing reaches the builder unless passes 1 and 2 succeed.

use serde::Deserialize;

use super::error::ProtocolError;
use super::framing::{read_frame, write_frame};
use super::model::{
    index_from_wire, index_to_wire, store_from_wire, store_to_wire, term_vector_from_wire,
    term_vector_to_wire, DeleteByQueryOperation, DeleteOperation, DocumentOperation, Message,
    NumericAttrs, Operation, ProtocolVersion, PurgeAllOperation, ScopedOperation, WireAttribute,
    WireDocument, WireField, WireId, WireToken, ATTRIBUTE_KINDS, FIELD_KINDS, ID_KINDS,
    OPERATION_KINDS,
};
use super::ports::{Deserializer, ProtocolResult, SerializationProvider, Serializer, WorkBuilder};
use crate::features::work::domain::{
    BinaryField, CustomField, FieldAnalyzers, NumericField, NumericValue, ReaderField, TextField,
    TokenAttribute, TokenStreamField,
};

// ═══════════════════════════════════════════════════════════════════════════
// Serializer
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct MsgpackSerializer {
    operations: Vec<Operation>,
    id: Option<WireId>,
    id_in_string: Option<String>,
    document: Option<WireDocument>,
    analyzers: Option<FieldAnalyzers>,
}

impl MsgpackSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_field(&mut self, field: WireField) -> ProtocolResult<()> {
        self.document
            .as_mut()
            .ok_or_else(|| ProtocolError::malformed("field added before define_document"))?
            .fields
            .push(field);
        Ok(())
    }

    fn take_id(&mut self, op: &str) -> ProtocolResult<WireId> {
        self.id
            .take()
            .ok_or_else(|| ProtocolError::malformed(format!("{} work without an id", op)))
    }

    fn take_document(&mut self, op: &str) -> ProtocolResult<DocumentOperation> {
        let id = self.take_id(op)?;
        let document = self
            .document
            .take()
            .ok_or_else(|| ProtocolError::malformed(format!("{} work without a document", op)))?;
        Ok(DocumentOperation {
            entity_type: String::new(),
            tenant_id: None,
            id,
            id_in_string: self.id_in_string.take(),
            document,
            field_analyzers: self.analyzers.take(),
        })
    }

    fn reset_pending(&mut self) {
        self.id = None;
        self.id_in_string = None;
        self.document = None;
        self.analyzers = None;
    }
}

impl Serializer for MsgpackSerializer {
    fn add_id_as_int(&mut self, id: i32) {
        self.id = Some(WireId::Int(id));
    }

    fn add_id_as_long(&mut self, id: i64) {
        self.id = Some(WireId::Long(id));
    }

    fn add_id_as_float(&mut self, id: f32) {
        self.id = Some(WireId::Float(id));
    }

    fn add_id_as_double(&mut self, id: f64) {
        self.id = Some(WireId::Double(id));
    }

    fn add_id_as_string(&mut self, id: &str) {
        self.id = Some(WireId::String(id.to_string()));
    }

    fn add_id_as_opaque_bytes(&mut self, id: &[u8]) {
        self.id = Some(WireId::Bytes(id.to_vec()));
    }

    fn add_id_in_string(&mut self, id_in_string: &str) {
        self.id_in_string = Some(id_in_string.to_string());
    }

    fn define_document(&mut self, boost: f32) {
        self.document = Some(WireDocument {
            boost,
            fields: Vec::new(),
        });
    }

    fn add_binary_field(&mut self, field: &BinaryField) -> ProtocolResult<()> {
        let to_u32 = |v: usize| {
            u32::try_from(v).map_err(|_| ProtocolError::Encode(format!("{} exceeds u32", v)))
        };
        self.push_field(WireField::Binary {
            name: field.name.clone(),
            value: field.value.clone(),
            offset: to_u32(field.offset)?,
            length: to_u32(field.length)?,
        })
    }

    fn add_string_field(&mut self, field: &TextField) -> ProtocolResult<()> {
        self.push_field(WireField::String {
            name: field.name.clone(),
            value: field.value.clone(),
            store: store_to_wire(field.store).to_string(),
            index: index_to_wire(field.index).to_string(),
            term_vector: term_vector_to_wire(field.term_vector).to_string(),
            boost: field.boost,
            omit_norms: field.omit_norms,
            omit_term_freq_and_positions: field.omit_term_freq_and_positions,
        })
    }

    fn add_numeric_field(&mut self, field: &NumericField) -> ProtocolResult<()> {
        let name = field.name.clone();
        let attrs = NumericAttrs {
            precision_step: field.precision_step,
            store: field.store,
            indexed: field.indexed,
            boost: field.boost,
            omit_norms: field.omit_norms,
            omit_term_freq_and_positions: field.omit_term_freq_and_positions,
        };
        self.push_field(match field.value {
            NumericValue::Int(value) => WireField::Int { name, value, attrs },
            NumericValue::Long(value) => WireField::Long { name, value, attrs },
            NumericValue::Float(value) => WireField::Float { name, value, attrs },
            NumericValue::Double(value) => WireField::Double { name, value, attrs },
        })
    }

    fn add_reader_field(&mut self, field: &ReaderField) -> ProtocolResult<()> {
        self.push_field(WireField::Reader {
            name: field.name.clone(),
            value: field.content.clone(),
            term_vector: term_vector_to_wire(field.term_vector).to_string(),
        })
    }

    fn add_token_stream_field(&mut self, field: &TokenStreamField) -> ProtocolResult<()> {
        let tokens = field
            .tokens
            .iter()
            .map(|token| WireToken {
                attributes: token.attributes.iter().map(attribute_to_wire).collect(),
            })
            .collect();
        self.push_field(WireField::TokenStream {
            name: field.name.clone(),
            tokens,
            term_vector: term_vector_to_wire(field.term_vector).to_string(),
        })
    }

    fn add_custom_field(&mut self, field: &CustomField) -> ProtocolResult<()> {
        self.push_field(WireField::Custom {
            name: field.name.clone(),
            type_name: field.type_name.clone(),
            data: field.data.clone(),
        })
    }

    fn add_field_analyzers(&mut self, analyzers: &FieldAnalyzers) {
        self.analyzers = Some(analyzers.clone());
    }

    fn add_add_work(&mut self, entity_type: &str, tenant_id: Option<&str>) -> ProtocolResult<()> {
        let mut op = self.take_document("add")?;
        op.entity_type = entity_type.to_string();
        op.tenant_id = tenant_id.map(str::to_string);
        self.operations.push(Operation::Add(op));
        Ok(())
    }

    fn add_update_work(&mut self, entity_type: &str, tenant_id: Option<&str>) -> ProtocolResult<()> {
        let mut op = self.take_document("update")?;
        op.entity_type = entity_type.to_string();
        op.tenant_id = tenant_id.map(str::to_string);
        self.operations.push(Operation::Update(op));
        Ok(())
    }

    fn add_delete_work(&mut self, entity_type: &str, tenant_id: Option<&str>) -> ProtocolResult<()> {
        let id = self.take_id("delete")?;
        self.operations.push(Operation::Delete(DeleteOperation {
            entity_type: entity_type.to_string(),
            tenant_id: tenant_id.map(str::to_string),
            id,
            id_in_string: self.id_in_string.take(),
        }));
        Ok(())
    }

    fn add_delete_by_query_work(
        &mut self,
        entity_type: &str,
        tenant_id: Option<&str>,
        query_key: u8,
        query: &[String],
    ) -> ProtocolResult<()> {
        self.operations
            .push(Operation::DeleteByQuery(DeleteByQueryOperation {
                entity_type: entity_type.to_string(),
                tenant_id: tenant_id.map(str::to_string),
                query_key,
                query: query.to_vec(),
            }));
        Ok(())
    }

    fn add_purge_all_work(&mut self, entity_type: Option<&str>, tenant_id: Option<&str>) -> ProtocolResult<()> {
        self.operations.push(Operation::PurgeAll(PurgeAllOperation {
            entity_type: entity_type.map(str::to_string),
            tenant_id: tenant_id.map(str::to_string),
        }));
        Ok(())
    }

    fn add_flush_work(&mut self, entity_type: Option<&str>) -> ProtocolResult<()> {
        self.operations.push(Operation::Flush(ScopedOperation {
            entity_type: entity_type.map(str::to_string),
        }));
        Ok(())
    }

    fn add_optimize_all_work(&mut self, entity_type: Option<&str>) -> ProtocolResult<()> {
        self.operations.push(Operation::OptimizeAll(ScopedOperation {
            entity_type: entity_type.map(str::to_string),
        }));
        Ok(())
    }

    fn serialize(&mut self) -> ProtocolResult<Vec<u8>> {
        self.reset_pending();
        let message = Message {
            operations: std::mem::take(&mut self.operations),
        };
        let body =
            rmp_serde::to_vec_named(&message).map_err(|e| ProtocolError::Encode(e.to_string()))?;
        write_frame(ProtocolVersion::CURRENT, &body)
    }
}

fn attribute_to_wire(attribute: &TokenAttribute) -> WireAttribute {
    match attribute {
        TokenAttribute::CharTerm(term) => WireAttribute::CharTerm { term: term.clone() },
        TokenAttribute::Payload(data) => WireAttribute::Payload { data: data.clone() },
        TokenAttribute::Keyword(keyword) => WireAttribute::Keyword { keyword: *keyword },
        TokenAttribute::PositionIncrement(increment) => WireAttribute::PositionIncrement {
            increment: *increment,
        },
        TokenAttribute::Flags(flags) => WireAttribute::Flags { flags: *flags },
        TokenAttribute::Type(token_type) => WireAttribute::Type {
            token_type: token_type.clone(),
        },
        TokenAttribute::Offset { start, end } => WireAttribute::Offset {
            start: *start,
            end: *end,
        },
        TokenAttribute::Custom { type_name, data } => WireAttribute::Custom {
            type_name: type_name.clone(),
            data: data.clone(),
        },
    }
}

fn attribute_from_wire(attribute: WireAttribute) -> TokenAttribute {
    match attribute {
        WireAttribute::CharTerm { term } => TokenAttribute::CharTerm(term),
        WireAttribute::Payload { data } => TokenAttribute::Payload(data),
        WireAttribute::Keyword { keyword } => TokenAttribute::Keyword(keyword),
        WireAttribute::PositionIncrement { increment } => TokenAttribute::PositionIncrement(increment),
        WireAttribute::Flags { flags } => TokenAttribute::Flags(flags),
        WireAttribute::Type { token_type } => TokenAttribute::Type(token_type),
        WireAttribute::Offset { start, end } => TokenAttribute::Offset { start, end },
        WireAttribute::Custom { type_name, data } => TokenAttribute::Custom { type_name, data },
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Deserializer
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Deserialize)]
struct ProbeMessage {
    #[serde(default)]
    operations: Vec<ProbeOperation>,
}

#[derive(Deserialize)]
struct ProbeOperation {
    kind: String,
    #[serde(default)]
    id: Option<ProbeId>,
    #[serde(default)]
    document: Option<ProbeDocument>,
}

#[derive(Deserialize)]
struct ProbeId {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct ProbeDocument {
    #[serde(default)]
    fields: Vec<ProbeField>,
}

#[derive(Deserialize)]
struct ProbeField {
    kind: String,
    #[serde(default)]
    tokens: Vec<ProbeToken>,
}

#[derive(Deserialize)]
struct ProbeToken {
    #[serde(default)]
    attributes: Vec<ProbeKind>,
}

#[derive(Deserialize)]
struct ProbeKind {
    kind: String,
}

fn known(kind: &str, known: &[&str], what: &str) -> ProtocolResult<()> {
    if known.contains(&kind) {
        Ok(())
    } else {
        Err(ProtocolError::UnknownKind(format!("{} {}", what, kind)))
    }
}

fn probe_kinds(body: &[u8]) -> ProtocolResult<()> {
    let probe: ProbeMessage =
        rmp_serde::from_slice(body).map_err(|e| ProtocolError::malformed(e.to_string()))?;

    for op in &probe.operations {
        known(&op.kind, OPERATION_KINDS, "operation")?;
        if let Some(id) = &op.id {
            known(&id.kind, ID_KINDS, "id type")?;
        }
        for field in op.document.iter().flat_map(|d| d.fields.iter()) {
            known(&field.kind, FIELD_KINDS, "field")?;
            for attr in field.tokens.iter().flat_map(|t| t.attributes.iter()) {
                known(&attr.kind, ATTRIBUTE_KINDS, "token attribute")?;
            }
        }
    }
    Ok(())
}

/// Attribute codes are plain strings on the wire; check them all up front
fn validate_codes(message: &Message) -> ProtocolResult<()> {
    let documents = message.operations.iter().filter_map(|op| match op {
        Operation::Add(d) | Operation::Update(d) => Some(&d.document),
        _ => None,
    });
    for document in documents {
        for field in &document.fields {
            match field {
                WireField::String {
                    store,
                    index,
                    term_vector,
                    ..
                } => {
                    store_from_wire(store)?;
                    index_from_wire(index)?;
                    term_vector_from_wire(term_vector)?;
                }
                WireField::Reader { term_vector, .. } | WireField::TokenStream { term_vector, .. } => {
                    term_vector_from_wire(term_vector)?;
                }
                _ => {}
            }
        }
    }
    Ok(())
}

fn replay_id(id: WireId, builder: &mut dyn WorkBuilder) -> ProtocolResult<()> {
    match id {
        WireId::Int(v) => builder.add_id_as_int(v),
        WireId::Long(v) => builder.add_id_as_long(v),
        WireId::Float(v) => builder.add_id_as_float(v),
        WireId::Double(v) => builder.add_id_as_double(v),
        WireId::String(v) => builder.add_id_as_string(v),
        WireId::Bytes(v) => builder.add_id_as_opaque_bytes(v),
    }
}

fn numeric(name: String, value: NumericValue, attrs: NumericAttrs) -> NumericField {
    NumericField {
        name,
        value,
        precision_step: attrs.precision_step,
        store: attrs.store,
        indexed: attrs.indexed,
        boost: attrs.boost,
        omit_norms: attrs.omit_norms,
        omit_term_freq_and_positions: attrs.omit_term_freq_and_positions,
    }
}

fn replay_field(field: WireField, builder: &mut dyn WorkBuilder) -> ProtocolResult<()> {
    match field {
        WireField::Binary {
            name,
            value,
            offset,
            length,
        } => builder.add_binary_field(BinaryField {
            name,
            value,
            offset: offset as usize,
            length: length as usize,
        }),
        WireField::String {
            name,
            value,
            store,
            index,
            term_vector,
            boost,
            omit_norms,
            omit_term_freq_and_positions,
        } => builder.add_string_field(TextField {
            name,
            value,
            store: store_from_wire(&store)?,
            index: index_from_wire(&index)?,
            term_vector: term_vector_from_wire(&term_vector)?,
            boost,
            omit_norms,
            omit_term_freq_and_positions,
        }),
        WireField::Int { name, value, attrs } => {
            builder.add_numeric_field(numeric(name, NumericValue::Int(value), attrs))
        }
        WireField::Long { name, value, attrs } => {
            builder.add_numeric_field(numeric(name, NumericValue::Long(value), attrs))
        }
        WireField::Float { name, value, attrs } => {
            builder.add_numeric_field(numeric(name, NumericValue::Float(value), attrs))
        }
        WireField::Double { name, value, attrs } => {
            builder.add_numeric_field(numeric(name, NumericValue::Double(value), attrs))
        }
        WireField::Reader {
            name,
            value,
            term_vector,
        } => builder.add_reader_field(ReaderField {
            name,
            content: value,
            term_vector: term_vector_from_wire(&term_vector)?,
        }),
        WireField::TokenStream {
            name,
            tokens,
            term_vector,
        } => {
            for token in tokens {
                builder.add_token()?;
                for attribute in token.attributes {
                    builder.add_attribute_instance(attribute_from_wire(attribute))?;
                }
            }
            builder.add_token_stream_field(name, term_vector_from_wire(&term_vector)?)
        }
        WireField::Custom {
            name,
            type_name,
            data,
        } => builder.add_custom_field(CustomField {
            name,
            type_name,
            data,
        }),
    }
}

fn replay_document_operation(op: DocumentOperation, builder: &mut dyn WorkBuilder) -> ProtocolResult<()> {
    replay_id(op.id, builder)?;
    if let Some(id_in_string) = op.id_in_string {
        builder.add_id_in_string(id_in_string)?;
    }
    builder.define_document(op.document.boost)?;
    for field in op.document.fields {
        replay_field(field, builder)?;
    }
    if let Some(analyzers) = op.field_analyzers {
        builder.add_field_analyzers(analyzers)?;
    }
    Ok(())
}

fn replay(operation: Operation, builder: &mut dyn WorkBuilder) -> ProtocolResult<()> {
    match operation {
        Operation::Add(op) => {
            let (entity_type, tenant_id) = (op.entity_type.clone(), op.tenant_id.clone());
            replay_document_operation(op, builder)?;
            builder.add_add_work(entity_type, tenant_id)
        }
        Operation::Update(op) => {
            let (entity_type, tenant_id) = (op.entity_type.clone(), op.tenant_id.clone());
            replay_document_operation(op, builder)?;
            builder.add_update_work(entity_type, tenant_id)
        }
        Operation::Delete(op) => {
            replay_id(op.id, builder)?;
            if let Some(id_in_string) = op.id_in_string {
                builder.add_id_in_string(id_in_string)?;
            }
            builder.add_delete_work(op.entity_type, op.tenant_id)
        }
        Operation::DeleteByQuery(op) => {
            builder.add_delete_by_query_work(op.entity_type, op.tenant_id, op.query_key, &op.query)
        }
        Operation::PurgeAll(op) => builder.add_purge_all_work(op.entity_type, op.tenant_id),
        Operation::Flush(op) => builder.add_flush_work(op.entity_type),
        Operation::OptimizeAll(op) => builder.add_optimize_all_work(op.entity_type),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MsgpackDeserializer;

impl Deserializer for MsgpackDeserializer {
    fn deserialize(&self, data: &[u8], builder: &mut dyn WorkBuilder) -> ProtocolResult<()> {
        let (version, body) = read_frame(data)?;
        probe_kinds(body)?;
        let message: Message =
            rmp_serde::from_slice(body).map_err(|e| ProtocolError::malformed(e.to_string()))?;
        validate_codes(&message)?;

        tracing::trace!(
            version = %version,
            operations = message.operations.len(),
            "decoded message"
        );

        for operation in message.operations {
            replay(operation, builder)?;
        }
        Ok(())
    }
}

/// Default provider: MessagePack bodies in version-tagged frames
#[derive(Debug, Default, Clone, Copy)]
pub struct MsgpackSerializationProvider;

impl SerializationProvider for MsgpackSerializationProvider {
    fn name(&self) -> &str {
        "msgpack"
    }

    fn serializer(&self) -> Box<dyn Serializer> {
        Box::new(MsgpackSerializer::new())
    }

    fn deserializer(&self) -> Box<dyn Deserializer> {
        Box::new(MsgpackDeserializer)
    }
}
