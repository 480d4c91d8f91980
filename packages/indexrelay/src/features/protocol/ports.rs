// Ports: serialization provider, write-side serializer and read-side builder

use super::error::ProtocolError;
use crate::features::work::domain::{
    BinaryField, CustomField, FieldAnalyzers, NumericField, ReaderField, TermVector, TextField,
    TokenAttribute, TokenStreamField,
};

pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Write side: accumulates one message
///
/// Identifier, document and analyzer calls describe the next work; the
/// following `add_*_work` call consumes them.
pub trait Serializer: Send {
    fn add_id_as_int(&mut self, id: i32);
    fn add_id_as_long(&mut self, id: i64);
    fn add_id_as_float(&mut self, id: f32);
    fn add_id_as_double(&mut self, id: f64);
    fn add_id_as_string(&mut self, id: &str);
    fn add_id_as_opaque_bytes(&mut self, id: &[u8]);
    /// String form of the identifier, when it differs from the default rendering
    fn add_id_in_string(&mut self, id_in_string: &str);

    fn define_document(&mut self, boost: f32);
    fn add_binary_field(&mut self, field: &BinaryField) -> ProtocolResult<()>;
    fn add_string_field(&mut self, field: &TextField) -> ProtocolResult<()>;
    fn add_numeric_field(&mut self, field: &NumericField) -> ProtocolResult<()>;
    fn add_reader_field(&mut self, field: &ReaderField) -> ProtocolResult<()>;
    fn add_token_stream_field(&mut self, field: &TokenStreamField) -> ProtocolResult<()>;
    fn add_custom_field(&mut self, field: &CustomField) -> ProtocolResult<()>;
    fn add_field_analyzers(&mut self, analyzers: &FieldAnalyzers);

    fn add_add_work(&mut self, entity_type: &str, tenant_id: Option<&str>) -> ProtocolResult<()>;
    fn add_update_work(&mut self, entity_type: &str, tenant_id: Option<&str>) -> ProtocolResult<()>;
    fn add_delete_work(&mut self, entity_type: &str, tenant_id: Option<&str>) -> ProtocolResult<()>;
    fn add_delete_by_query_work(
        &mut self,
        entity_type: &str,
        tenant_id: Option<&str>,
        query_key: u8,
        query: &[String],
    ) -> ProtocolResult<()>;
    fn add_purge_all_work(&mut self, entity_type: Option<&str>, tenant_id: Option<&str>) -> ProtocolResult<()>;
    fn add_flush_work(&mut self, entity_type: Option<&str>) -> ProtocolResult<()>;
    fn add_optimize_all_work(&mut self, entity_type: Option<&str>) -> ProtocolResult<()>;

    /// Encode every operation added so far and reset
    fn serialize(&mut self) -> ProtocolResult<Vec<u8>>;
}

/// Read side: receives a decoded message step by step
///
/// Mirrors `Serializer`. Token-stream fields arrive as `add_token` /
/// `add_attribute_instance` calls followed by `add_token_stream_field`.
pub trait WorkBuilder {
    fn add_id_as_int(&mut self, id: i32) -> ProtocolResult<()>;
    fn add_id_as_long(&mut self, id: i64) -> ProtocolResult<()>;
    fn add_id_as_float(&mut self, id: f32) -> ProtocolResult<()>;
    fn add_id_as_double(&mut self, id: f64) -> ProtocolResult<()>;
    fn add_id_as_string(&mut self, id: String) -> ProtocolResult<()>;
    fn add_id_as_opaque_bytes(&mut self, id: Vec<u8>) -> ProtocolResult<()>;
    fn add_id_in_string(&mut self, id_in_string: String) -> ProtocolResult<()>;

    fn define_document(&mut self, boost: f32) -> ProtocolResult<()>;
    fn add_binary_field(&mut self, field: BinaryField) -> ProtocolResult<()>;
    fn add_string_field(&mut self, field: TextField) -> ProtocolResult<()>;
    fn add_numeric_field(&mut self, field: NumericField) -> ProtocolResult<()>;
    fn add_reader_field(&mut self, field: ReaderField) -> ProtocolResult<()>;
    fn add_token(&mut self) -> ProtocolResult<()>;
    fn add_attribute_instance(&mut self, attribute: TokenAttribute) -> ProtocolResult<()>;
    fn add_token_stream_field(&mut self, name: String, term_vector: TermVector) -> ProtocolResult<()>;
    fn add_custom_field(&mut self, field: CustomField) -> ProtocolResult<()>;
    fn add_field_analyzers(&mut self, analyzers: FieldAnalyzers) -> ProtocolResult<()>;

    fn add_add_work(&mut self, entity_type: String, tenant_id: Option<String>) -> ProtocolResult<()>;
    fn add_update_work(&mut self, entity_type: String, tenant_id: Option<String>) -> ProtocolResult<()>;
    fn add_delete_work(&mut self, entity_type: String, tenant_id: Option<String>) -> ProtocolResult<()>;
    fn add_delete_by_query_work(
        &mut self,
        entity_type: String,
        tenant_id: Option<String>,
        query_key: u8,
        query: &[String],
    ) -> ProtocolResult<()>;
    fn add_purge_all_work(&mut self, entity_type: Option<String>, tenant_id: Option<String>) -> ProtocolResult<()>;
    fn add_flush_work(&mut self, entity_type: Option<String>) -> ProtocolResult<()>;
    fn add_optimize_all_work(&mut self, entity_type: Option<String>) -> ProtocolResult<()>;
}

pub trait Deserializer: Send + Sync {
    /// Decode `data` and replay it into `builder`
    ///
    /// The whole message is decoded and validated before the first callback.
    fn deserialize(&self, data: &[u8], builder: &mut dyn WorkBuilder) -> ProtocolResult<()>;
}

/// Supplies matched serializer/deserializer pairs
pub trait SerializationProvider: Send + Sync {
    fn name(&self) -> &str;
    fn serializer(&self) -> Box<dyn Serializer>;
    fn deserializer(&self) -> Box<dyn Deserializer>;
}
