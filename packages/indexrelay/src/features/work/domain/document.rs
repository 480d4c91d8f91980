//! Engine-facing document model
//!
//! The document a producer attaches to Add/Update work. Fields keep the full
//! attribute set an engine needs to rebuild an index-compatible field on the
//! receiving side, not just the raw value.
//!
//! # Field kinds
//!
//! | Kind | Carries |
//! |------|---------|
//! | Binary | bytes + offset/length window |
//! | Text | string + store/index/term-vector flags |
//! | Numeric | int/long/float/double + precision step and index flags |
//! | Reader | text drained from a reader |
//! | TokenStream | pre-analyzed tokens with their attributes |
//! | Custom | opaque bytes tagged with a type name |

use std::fmt;
use std::io::Read;

/// Lucene-compatible default precision step for numeric fields
pub const DEFAULT_PRECISION_STEP: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Store {
    No,
    Yes,
    Compress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexMode {
    No,
    Analyzed,
    NotAnalyzed,
    AnalyzedNoNorms,
    NotAnalyzedNoNorms,
}

impl IndexMode {
    pub fn is_indexed(&self) -> bool {
        !matches!(self, IndexMode::No)
    }

    pub fn is_analyzed(&self) -> bool {
        matches!(self, IndexMode::Analyzed | IndexMode::AnalyzedNoNorms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermVector {
    No,
    Yes,
    WithOffsets,
    WithPositions,
    WithPositionsOffsets,
}

/// Declared type of a numeric value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NumericKind {
    Int,
    Long,
    Float,
    Double,
}

impl NumericKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumericKind::Int => "int",
            NumericKind::Long => "long",
            NumericKind::Float => "float",
            NumericKind::Double => "double",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "int" => Some(NumericKind::Int),
            "long" => Some(NumericKind::Long),
            "float" => Some(NumericKind::Float),
            "double" => Some(NumericKind::Double),
            _ => None,
        }
    }
}

impl fmt::Display for NumericKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed numeric value
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub enum NumericValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl NumericValue {
    pub fn kind(&self) -> NumericKind {
        match self {
            NumericValue::Int(_) => NumericKind::Int,
            NumericValue::Long(_) => NumericKind::Long,
            NumericValue::Float(_) => NumericKind::Float,
            NumericValue::Double(_) => NumericKind::Double,
        }
    }

    /// Widened value used for cross-kind comparisons
    pub fn as_f64(&self) -> f64 {
        match *self {
            NumericValue::Int(v) => v as f64,
            NumericValue::Long(v) => v as f64,
            NumericValue::Float(v) => v as f64,
            NumericValue::Double(v) => v,
        }
    }

    /// Parse `raw` as a value of `kind`
    pub fn parse(kind: NumericKind, raw: &str) -> Result<Self, String> {
        let err = |e: &dyn fmt::Display| format!("'{}' is not a valid {}: {}", raw, kind, e);
        match kind {
            NumericKind::Int => raw.parse().map(NumericValue::Int).map_err(|e| err(&e)),
            NumericKind::Long => raw.parse().map(NumericValue::Long).map_err(|e| err(&e)),
            NumericKind::Float => raw.parse().map(NumericValue::Float).map_err(|e| err(&e)),
            NumericKind::Double => raw.parse().map(NumericValue::Double).map_err(|e| err(&e)),
        }
    }

    /// Bit pattern used for hashing; floats hash by representation with
    /// both zeros folded together, since `0.0 == -0.0`
    pub(crate) fn hash_bits(&self) -> u64 {
        match *self {
            NumericValue::Int(v) => v as u64,
            NumericValue::Long(v) => v as u64,
            NumericValue::Float(v) if v == 0.0 => 0,
            NumericValue::Float(v) => v.to_bits() as u64,
            NumericValue::Double(v) if v == 0.0 => 0,
            NumericValue::Double(v) => v.to_bits(),
        }
    }
}

impl fmt::Display for NumericValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericValue::Int(v) => write!(f, "{}", v),
            NumericValue::Long(v) => write!(f, "{}", v),
            NumericValue::Float(v) => write!(f, "{}", v),
            NumericValue::Double(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryField {
    pub name: String,
    pub value: Vec<u8>,
    pub offset: usize,
    pub length: usize,
}

impl BinaryField {
    /// The `offset..offset + length` window, clamped to the buffer
    pub fn window(&self) -> &[u8] {
        let start = self.offset.min(self.value.len());
        let end = (self.offset + self.length).min(self.value.len());
        &self.value[start..end]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextField {
    pub name: String,
    pub value: String,
    pub store: Store,
    pub index: IndexMode,
    pub term_vector: TermVector,
    pub boost: f32,
    pub omit_norms: bool,
    pub omit_term_freq_and_positions: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumericField {
    pub name: String,
    pub value: NumericValue,
    pub precision_step: u32,
    pub store: bool,
    pub indexed: bool,
    pub boost: f32,
    pub omit_norms: bool,
    pub omit_term_freq_and_positions: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReaderField {
    pub name: String,
    pub content: String,
    pub term_vector: TermVector,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenStreamField {
    pub name: String,
    pub tokens: Vec<Token>,
    pub term_vector: TermVector,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomField {
    pub name: String,
    pub type_name: String,
    pub data: Vec<u8>,
}

/// One attribute of an analyzed token
#[derive(Debug, Clone, PartialEq)]
pub enum TokenAttribute {
    CharTerm(String),
    Payload(Vec<u8>),
    Keyword(bool),
    PositionIncrement(u32),
    Flags(u32),
    Type(String),
    Offset { start: u32, end: u32 },
    Custom { type_name: String, data: Vec<u8> },
}

/// A pre-analyzed token
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Token {
    pub attributes: Vec<TokenAttribute>,
}

impl Token {
    pub fn new(attributes: Vec<TokenAttribute>) -> Self {
        Self { attributes }
    }

    /// Token with a single char-term attribute
    pub fn term(text: impl Into<String>) -> Self {
        Self::new(vec![TokenAttribute::CharTerm(text.into())])
    }

    pub fn char_term(&self) -> Option<&str> {
        self.attributes.iter().find_map(|a| match a {
            TokenAttribute::CharTerm(t) => Some(t.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Binary(BinaryField),
    Text(TextField),
    Numeric(NumericField),
    Reader(ReaderField),
    TokenStream(TokenStreamField),
    Custom(CustomField),
}

impl Field {
    pub fn name(&self) -> &str {
        match self {
            Field::Binary(f) => &f.name,
            Field::Text(f) => &f.name,
            Field::Numeric(f) => &f.name,
            Field::Reader(f) => &f.name,
            Field::TokenStream(f) => &f.name,
            Field::Custom(f) => &f.name,
        }
    }

    /// Analyzed, stored text field
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Field::Text(TextField {
            name: name.into(),
            value: value.into(),
            store: Store::Yes,
            index: IndexMode::Analyzed,
            term_vector: TermVector::No,
            boost: 1.0,
            omit_norms: false,
            omit_term_freq_and_positions: false,
        })
    }

    /// Stored, non-analyzed text field (exact match)
    pub fn keyword(name: impl Into<String>, value: impl Into<String>) -> Self {
        Field::Text(TextField {
            name: name.into(),
            value: value.into(),
            store: Store::Yes,
            index: IndexMode::NotAnalyzed,
            term_vector: TermVector::No,
            boost: 1.0,
            omit_norms: true,
            omit_term_freq_and_positions: false,
        })
    }

    /// Stored and indexed numeric field with engine defaults
    pub fn numeric(name: impl Into<String>, value: NumericValue) -> Self {
        Field::Numeric(NumericField {
            name: name.into(),
            value,
            precision_step: DEFAULT_PRECISION_STEP,
            store: true,
            indexed: true,
            boost: 1.0,
            omit_norms: true,
            omit_term_freq_and_positions: true,
        })
    }

    pub fn binary(name: impl Into<String>, value: Vec<u8>) -> Self {
        let length = value.len();
        Field::Binary(BinaryField {
            name: name.into(),
            value,
            offset: 0,
            length,
        })
    }

    /// Drain `reader` into a reader-backed field
    pub fn from_reader(name: impl Into<String>, mut reader: impl Read) -> std::io::Result<Self> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Ok(Field::Reader(ReaderField {
            name: name.into(),
            content,
            term_vector: TermVector::No,
        }))
    }

    pub fn token_stream(name: impl Into<String>, tokens: Vec<Token>) -> Self {
        Field::TokenStream(TokenStreamField {
            name: name.into(),
            tokens,
            term_vector: TermVector::No,
        })
    }

    pub fn custom(name: impl Into<String>, type_name: impl Into<String>, data: Vec<u8>) -> Self {
        Field::Custom(CustomField {
            name: name.into(),
            type_name: type_name.into(),
            data,
        })
    }
}

/// Engine document attached to Add/Update work
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub boost: f32,
    pub fields: Vec<Field>,
}

impl Document {
    pub fn new() -> Self {
        Self {
            boost: 1.0,
            fields: Vec::new(),
        }
    }

    pub fn with_boost(boost: f32) -> Self {
        Self {
            boost,
            fields: Vec::new(),
        }
    }

    /// Builder-style field append
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn add(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Field> + 'a {
        self.fields.iter().filter(move |f| f.name() == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
