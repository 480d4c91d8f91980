//! Entity identifiers carried by work

use std::fmt;

/// Identifier value of an indexed entity
///
/// Each supported primitive has an explicit variant so the wire protocol can
/// encode it without a host-specific object format. `Opaque` is the single
/// escape hatch for identifiers the mapping layer encodes itself (composite
/// keys, embedded ids); the bytes travel untouched.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum EntityId {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Opaque(Vec<u8>),
}

impl EntityId {
    pub fn kind(&self) -> &'static str {
        match self {
            EntityId::Int(_) => "int",
            EntityId::Long(_) => "long",
            EntityId::Float(_) => "float",
            EntityId::Double(_) => "double",
            EntityId::String(_) => "string",
            EntityId::Opaque(_) => "opaque",
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Int(v) => write!(f, "{}", v),
            EntityId::Long(v) => write!(f, "{}", v),
            EntityId::Float(v) => write!(f, "{}", v),
            EntityId::Double(v) => write!(f, "{}", v),
            EntityId::String(v) => write!(f, "{}", v),
            EntityId::Opaque(bytes) => {
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}

impl From<i32> for EntityId {
    fn from(v: i32) -> Self {
        EntityId::Int(v)
    }
}

impl From<i64> for EntityId {
    fn from(v: i64) -> Self {
        EntityId::Long(v)
    }
}

impl From<f32> for EntityId {
    fn from(v: f32) -> Self {
        EntityId::Float(v)
    }
}

impl From<f64> for EntityId {
    fn from(v: f64) -> Self {
        EntityId::Double(v)
    }
}

impl From<String> for EntityId {
    fn from(v: String) -> Self {
        EntityId::String(v)
    }
}

impl From<&str> for EntityId {
    fn from(v: &str) -> Self {
        EntityId::String(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_string_form() {
        assert_eq!(EntityId::from(42i64).to_string(), "42");
        assert_eq!(EntityId::from("isbn-1").to_string(), "isbn-1");
        assert_eq!(EntityId::Opaque(vec![0x0a, 0xff]).to_string(), "0aff");
    }

    #[test]
    fn test_ids_of_different_kinds_differ() {
        assert_ne!(EntityId::Int(1), EntityId::Long(1));
        assert!(EntityId::Long(1) < EntityId::Long(2));
    }
}
