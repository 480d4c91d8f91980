//! Work ⇄ bytes
//!
//! Outbound: a `WorkVisitor` drives the provider's `Serializer` one work at
//! a time. Inbound: the provider's `Deserializer` replays the message into a
//! `WorkHydrator`. A message that fails anywhere yields no work at all.

use std::sync::Arc;

use super::hydrator::WorkHydrator;
use super::ports::{ProtocolResult, SerializationProvider, Serializer};
use crate::features::deletion_query::DeletionQueryRegistry;
use crate::features::work::domain::{
    AddWork, DeleteByQueryWork, DeleteWork, Document, EntityId, Field, FieldAnalyzers, FlushWork,
    OptimizeWork, PurgeAllWork, UpdateWork, Work,
};
use crate::features::work::WorkVisitor;

#[derive(Clone)]
pub struct WorkSerializer {
    provider: Arc<dyn SerializationProvider>,
    registry: Arc<DeletionQueryRegistry>,
}

impl WorkSerializer {
    pub fn new(provider: Arc<dyn SerializationProvider>, registry: Arc<DeletionQueryRegistry>) -> Self {
        Self { provider, registry }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn registry(&self) -> &Arc<DeletionQueryRegistry> {
        &self.registry
    }

    /// Encode a batch as one message
    pub fn to_serialized_model(&self, works: &[Work]) -> ProtocolResult<Vec<u8>> {
        let mut serializer = self.provider.serializer();
        let mut visitor = SerializingVisitor {
            registry: &self.registry,
        };
        for work in works {
            work.accept_visitor(&mut visitor, serializer.as_mut())?;
        }
        let bytes = serializer.serialize()?;
        tracing::trace!(works = works.len(), bytes = bytes.len(), "serialized batch");
        Ok(bytes)
    }

    /// Decode one message back into work, in serialization order
    pub fn to_works(&self, data: &[u8]) -> ProtocolResult<Vec<Work>> {
        let deserializer = self.provider.deserializer();
        let mut hydrator = WorkHydrator::new(&self.registry);
        deserializer.deserialize(data, &mut hydrator)?;
        Ok(hydrator.into_works())
    }
}

impl std::fmt::Debug for WorkSerializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkSerializer")
            .field("provider", &self.provider.name())
            .finish()
    }
}

struct SerializingVisitor<'r> {
    registry: &'r DeletionQueryRegistry,
}

fn write_id(serializer: &mut dyn Serializer, id: &EntityId, id_in_string: &str) {
    match id {
        EntityId::Int(v) => serializer.add_id_as_int(*v),
        EntityId::Long(v) => serializer.add_id_as_long(*v),
        EntityId::Float(v) => serializer.add_id_as_float(*v),
        EntityId::Double(v) => serializer.add_id_as_double(*v),
        EntityId::String(v) => serializer.add_id_as_string(v),
        EntityId::Opaque(v) => serializer.add_id_as_opaque_bytes(v),
    }
    if id.to_string() != id_in_string {
        serializer.add_id_in_string(id_in_string);
    }
}

fn write_document(
    serializer: &mut dyn Serializer,
    document: &Document,
    analyzers: Option<&FieldAnalyzers>,
) -> ProtocolResult<()> {
    serializer.define_document(document.boost);
    for field in &document.fields {
        match field {
            Field::Binary(f) => serializer.add_binary_field(f)?,
            Field::Text(f) => serializer.add_string_field(f)?,
            Field::Numeric(f) => serializer.add_numeric_field(f)?,
            Field::Reader(f) => serializer.add_reader_field(f)?,
            Field::TokenStream(f) => serializer.add_token_stream_field(f)?,
            Field::Custom(f) => serializer.add_custom_field(f)?,
        }
    }
    if let Some(analyzers) = analyzers {
        serializer.add_field_analyzers(analyzers);
    }
    Ok(())
}

impl<'s> WorkVisitor<&'s mut dyn Serializer, ProtocolResult<()>> for SerializingVisitor<'_> {
    fn visit_add_work(&mut self, work: &AddWork, s: &'s mut dyn Serializer) -> ProtocolResult<()> {
        write_id(s, &work.id, &work.id_in_string);
        write_document(s, &work.document, work.field_to_analyzer_map.as_ref())?;
        s.add_add_work(&work.entity_type, work.tenant_id.as_deref())
    }

    fn visit_update_work(&mut self, work: &UpdateWork, s: &'s mut dyn Serializer) -> ProtocolResult<()> {
        write_id(s, &work.id, &work.id_in_string);
        write_document(s, &work.document, work.field_to_analyzer_map.as_ref())?;
        s.add_update_work(&work.entity_type, work.tenant_id.as_deref())
    }

    fn visit_delete_work(&mut self, work: &DeleteWork, s: &'s mut dyn Serializer) -> ProtocolResult<()> {
        write_id(s, &work.id, &work.id_in_string);
        s.add_delete_work(&work.entity_type, work.tenant_id.as_deref())
    }

    fn visit_delete_by_query_work(
        &mut self,
        work: &DeleteByQueryWork,
        s: &'s mut dyn Serializer,
    ) -> ProtocolResult<()> {
        let parts = self.registry.to_string_array(&work.query)?;
        s.add_delete_by_query_work(
            &work.entity_type,
            work.tenant_id.as_deref(),
            work.query.query_key(),
            &parts,
        )
    }

    fn visit_purge_all_work(&mut self, work: &PurgeAllWork, s: &'s mut dyn Serializer) -> ProtocolResult<()> {
        s.add_purge_all_work(work.entity_type.as_deref(), work.tenant_id.as_deref())
    }

    fn visit_optimize_work(&mut self, work: &OptimizeWork, s: &'s mut dyn Serializer) -> ProtocolResult<()> {
        s.add_optimize_all_work(work.entity_type.as_deref())
    }

    fn visit_flush_work(&mut self, work: &FlushWork, s: &'s mut dyn Serializer) -> ProtocolResult<()> {
        s.add_flush_work(work.entity_type.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::deletion_query::DeletionQuery;
    use crate::features::protocol::{MsgpackSerializationProvider, ProtocolError};
    use crate::features::work::domain::{NumericKind, NumericValue, Token};

    fn serializer() -> WorkSerializer {
        WorkSerializer::new(
            Arc::new(MsgpackSerializationProvider),
            Arc::new(DeletionQueryRegistry::standard()),
        )
    }

    #[test]
    fn test_batch_survives_round_trip() {
        let doc = Document::new()
            .field(Field::text("title", "Dune"))
            .field(Field::numeric("year", NumericValue::Int(1965)))
            .field(Field::token_stream("tags", vec![Token::term("sf"), Token::term("desert")]));
        let range = DeletionQuery::numeric_range(
            "year",
            NumericKind::Int,
            Some(NumericValue::Int(1900)),
            None,
            true,
            false,
        )
        .unwrap();
        let batch = vec![
            Work::add("Book", 1, doc).with_tenant("acme"),
            Work::delete("Book", EntityId::Opaque(vec![0xde, 0xad])).with_id_string("dead-key"),
            Work::delete_by_query("Book", range),
            Work::purge_all(None),
            Work::flush(Some("Book".to_string())),
            Work::optimize(None),
        ];

        let s = serializer();
        let bytes = s.to_serialized_model(&batch).unwrap();
        assert_eq!(s.to_works(&bytes).unwrap(), batch);
    }

    #[test]
    fn test_empty_batch_round_trips() {
        let s = serializer();
        let bytes = s.to_serialized_model(&[]).unwrap();
        assert!(s.to_works(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_message_yields_nothing() {
        let s = serializer();
        let mut bytes = s
            .to_serialized_model(&[Work::delete("Book", 1), Work::delete("Book", 2)])
            .unwrap();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(s.to_works(&bytes), Err(ProtocolError::Truncated { .. })));
    }
}
