//! Rebuilds `Work` values from deserializer callbacks

use super::error::ProtocolError;
use super::ports::{ProtocolResult, WorkBuilder};
use crate::features::deletion_query::DeletionQueryRegistry;
use crate::features::work::domain::{
    AddWork, BinaryField, CustomField, DeleteByQueryWork, DeleteWork, Document, EntityId, Field,
    FieldAnalyzers, FlushWork, NumericField, OptimizeWork, PurgeAllWork, ReaderField, TermVector,
    TextField, Token, TokenAttribute, TokenStreamField, UpdateWork, Work,
};

/// `WorkBuilder` that collects finished work in arrival order
///
/// Pending identifier, document and analyzer state is consumed by the next
/// `add_*_work` call. Token-stream tokens accumulate until their field is
/// closed by `add_token_stream_field`.
pub struct WorkHydrator<'a> {
    registry: &'a DeletionQueryRegistry,
    works: Vec<Work>,
    id: Option<EntityId>,
    id_in_string: Option<String>,
    document: Option<Document>,
    analyzers: Option<FieldAnalyzers>,
    tokens: Vec<Token>,
    current_token: Option<Token>,
}

impl<'a> WorkHydrator<'a> {
    pub fn new(registry: &'a DeletionQueryRegistry) -> Self {
        Self {
            registry,
            works: Vec::new(),
            id: None,
            id_in_string: None,
            document: None,
            analyzers: None,
            tokens: Vec::new(),
            current_token: None,
        }
    }

    pub fn into_works(self) -> Vec<Work> {
        self.works
    }

    fn set_id(&mut self, id: EntityId) -> ProtocolResult<()> {
        self.id = Some(id);
        Ok(())
    }

    fn add_field(&mut self, field: Field) -> ProtocolResult<()> {
        self.document
            .as_mut()
            .ok_or_else(|| ProtocolError::malformed("field before document"))?
            .add(field);
        Ok(())
    }

    /// Take the pending id and its string form (defaulting to the id's rendering)
    fn take_id(&mut self, op: &str) -> ProtocolResult<(EntityId, String)> {
        let id = self
            .id
            .take()
            .ok_or_else(|| ProtocolError::malformed(format!("{} work without an id", op)))?;
        let id_in_string = self.id_in_string.take().unwrap_or_else(|| id.to_string());
        Ok((id, id_in_string))
    }

    fn take_document(&mut self, op: &str) -> ProtocolResult<Document> {
        self.document
            .take()
            .ok_or_else(|| ProtocolError::malformed(format!("{} work without a document", op)))
    }
}

impl WorkBuilder for WorkHydrator<'_> {
    fn add_id_as_int(&mut self, id: i32) -> ProtocolResult<()> {
        self.set_id(EntityId::Int(id))
    }

    fn add_id_as_long(&mut self, id: i64) -> ProtocolResult<()> {
        self.set_id(EntityId::Long(id))
    }

    fn add_id_as_float(&mut self, id: f32) -> ProtocolResult<()> {
        self.set_id(EntityId::Float(id))
    }

    fn add_id_as_double(&mut self, id: f64) -> ProtocolResult<()> {
        self.set_id(EntityId::Double(id))
    }

    fn add_id_as_string(&mut self, id: String) -> ProtocolResult<()> {
        self.set_id(EntityId::String(id))
    }

    fn add_id_as_opaque_bytes(&mut self, id: Vec<u8>) -> ProtocolResult<()> {
        self.set_id(EntityId::Opaque(id))
    }

    fn add_id_in_string(&mut self, id_in_string: String) -> ProtocolResult<()> {
        self.id_in_string = Some(id_in_string);
        Ok(())
    }

    fn define_document(&mut self, boost: f32) -> ProtocolResult<()> {
        self.document = Some(Document::with_boost(boost));
        Ok(())
    }

    fn add_binary_field(&mut self, field: BinaryField) -> ProtocolResult<()> {
        self.add_field(Field::Binary(field))
    }

    fn add_string_field(&mut self, field: TextField) -> ProtocolResult<()> {
        self.add_field(Field::Text(field))
    }

    fn add_numeric_field(&mut self, field: NumericField) -> ProtocolResult<()> {
        self.add_field(Field::Numeric(field))
    }

    fn add_reader_field(&mut self, field: ReaderField) -> ProtocolResult<()> {
        self.add_field(Field::Reader(field))
    }

    fn add_token(&mut self) -> ProtocolResult<()> {
        if let Some(done) = self.current_token.replace(Token::default()) {
            self.tokens.push(done);
        }
        Ok(())
    }

    fn add_attribute_instance(&mut self, attribute: TokenAttribute) -> ProtocolResult<()> {
        self.current_token
            .as_mut()
            .ok_or_else(|| ProtocolError::malformed("token attribute before add_token"))?
            .attributes
            .push(attribute);
        Ok(())
    }

    fn add_token_stream_field(&mut self, name: String, term_vector: TermVector) -> ProtocolResult<()> {
        if let Some(done) = self.current_token.take() {
            self.tokens.push(done);
        }
        let tokens = std::mem::take(&mut self.tokens);
        self.add_field(Field::TokenStream(TokenStreamField {
            name,
            tokens,
            term_vector,
        }))
    }

    fn add_custom_field(&mut self, field: CustomField) -> ProtocolResult<()> {
        self.add_field(Field::Custom(field))
    }

    fn add_field_analyzers(&mut self, analyzers: FieldAnalyzers) -> ProtocolResult<()> {
        self.analyzers = Some(analyzers);
        Ok(())
    }

    fn add_add_work(&mut self, entity_type: String, tenant_id: Option<String>) -> ProtocolResult<()> {
        let (id, id_in_string) = self.take_id("add")?;
        let document = self.take_document("add")?;
        self.works.push(Work::Add(AddWork {
            tenant_id,
            id,
            id_in_string,
            entity_type,
            document,
            field_to_analyzer_map: self.analyzers.take(),
        }));
        Ok(())
    }

    fn add_update_work(&mut self, entity_type: String, tenant_id: Option<String>) -> ProtocolResult<()> {
        let (id, id_in_string) = self.take_id("update")?;
        let document = self.take_document("update")?;
        self.works.push(Work::Update(UpdateWork {
            tenant_id,
            id,
            id_in_string,
            entity_type,
            document,
            field_to_analyzer_map: self.analyzers.take(),
        }));
        Ok(())
    }

    fn add_delete_work(&mut self, entity_type: String, tenant_id: Option<String>) -> ProtocolResult<()> {
        let (id, id_in_string) = self.take_id("delete")?;
        self.works.push(Work::Delete(DeleteWork {
            tenant_id,
            id,
            id_in_string,
            entity_type,
        }));
        Ok(())
    }

    fn add_delete_by_query_work(
        &mut self,
        entity_type: String,
        tenant_id: Option<String>,
        query_key: u8,
        query: &[String],
    ) -> ProtocolResult<()> {
        let query = self.registry.from_string_array(query_key, query)?;
        self.works.push(Work::DeleteByQuery(DeleteByQueryWork {
            tenant_id,
            entity_type,
            query,
        }));
        Ok(())
    }

    fn add_purge_all_work(&mut self, entity_type: Option<String>, tenant_id: Option<String>) -> ProtocolResult<()> {
        self.works.push(Work::PurgeAll(PurgeAllWork {
            tenant_id,
            entity_type,
        }));
        Ok(())
    }

    fn add_flush_work(&mut self, entity_type: Option<String>) -> ProtocolResult<()> {
        self.works.push(Work::Flush(FlushWork { entity_type }));
        Ok(())
    }

    fn add_optimize_all_work(&mut self, entity_type: Option<String>) -> ProtocolResult<()> {
        self.works.push(Work::Optimize(OptimizeWork { entity_type }));
        Ok(())
    }
}
