// SPDX-License-Identifier: Apache-2.0
// Copyright © 2026, Exodus team.

//! ABI-driven row serialization.
//!
//! Output rows are encoded against a registry of named struct schemas, the
//! same shape the target chain's storage layer consumes. Encoding is strict:
//! an unknown schema, a missing field, an extra field, or a value of the
//! wrong type is fatal, never silently coerced. A row that encodes at all is
//! a row the target chain can decode.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use exodus_common::{Asset, NewName, Symbol, Timestamp};

/// Field types the target chain's ABI understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiType {
    Name,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int64,
    VarUint32,
    Bool,
    TimePointSec,
    Str,
    Asset,
    Symbol,
    Checksum256,
    Bytes,
    Array(Box<AbiType>),
    Optional(Box<AbiType>),
}

impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiType::Name => write!(f, "name"),
            AbiType::Uint8 => write!(f, "uint8"),
            AbiType::Uint16 => write!(f, "uint16"),
            AbiType::Uint32 => write!(f, "uint32"),
            AbiType::Uint64 => write!(f, "uint64"),
            AbiType::Int64 => write!(f, "int64"),
            AbiType::VarUint32 => write!(f, "varuint32"),
            AbiType::Bool => write!(f, "bool"),
            AbiType::TimePointSec => write!(f, "time_point_sec"),
            AbiType::Str => write!(f, "string"),
            AbiType::Asset => write!(f, "asset"),
            AbiType::Symbol => write!(f, "symbol"),
            AbiType::Checksum256 => write!(f, "checksum256"),
            AbiType::Bytes => write!(f, "bytes"),
            AbiType::Array(inner) => write!(f, "{inner}[]"),
            AbiType::Optional(inner) => write!(f, "{inner}?"),
        }
    }
}

/// A value to encode into a row field
#[derive(Debug, Clone)]
pub enum AbiValue {
    Name(NewName),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I64(i64),
    VarU32(u32),
    Bool(bool),
    Time(Timestamp),
    Str(String),
    Asset(Asset),
    Symbol(Symbol),
    Checksum256([u8; 32]),
    Bytes(Vec<u8>),
    Array(Vec<AbiValue>),
    Optional(Option<Box<AbiValue>>),
    /// A whole row: named fields, matched against the schema by name
    Object(Vec<(String, AbiValue)>),
}

impl AbiValue {
    /// Build a row from named fields
    pub fn object(fields: Vec<(&str, AbiValue)>) -> AbiValue {
        AbiValue::Object(
            fields
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        )
    }

    pub fn optional(value: Option<AbiValue>) -> AbiValue {
        AbiValue::Optional(value.map(Box::new))
    }

    /// Kind name for error reports
    pub fn kind_name(&self) -> &'static str {
        match self {
            AbiValue::Name(_) => "name",
            AbiValue::U8(_) => "uint8",
            AbiValue::U16(_) => "uint16",
            AbiValue::U32(_) => "uint32",
            AbiValue::U64(_) => "uint64",
            AbiValue::I64(_) => "int64",
            AbiValue::VarU32(_) => "varuint32",
            AbiValue::Bool(_) => "bool",
            AbiValue::Time(_) => "time_point_sec",
            AbiValue::Str(_) => "string",
            AbiValue::Asset(_) => "asset",
            AbiValue::Symbol(_) => "symbol",
            AbiValue::Checksum256(_) => "checksum256",
            AbiValue::Bytes(_) => "bytes",
            AbiValue::Array(_) => "array",
            AbiValue::Optional(_) => "optional",
            AbiValue::Object(_) => "object",
        }
    }
}

/// Row encoding failures. All fatal: a row the registry cannot encode means
/// a builder bug, not a data problem.
#[derive(Debug, Error)]
pub enum AbiError {
    #[error("unknown ABI schema '{schema}'")]
    UnknownSchema { schema: String },

    #[error("row for schema '{schema}' is not an object")]
    NotAnObject { schema: String },

    #[error("row for schema '{schema}' is missing field '{field}'")]
    MissingField { schema: String, field: String },

    #[error("row for schema '{schema}' carries unknown field '{field}'")]
    ExtraField { schema: String, field: String },

    #[error(
        "field '{field}' of schema '{schema}' expects {expected}, got {found}"
    )]
    TypeMismatch {
        schema: String,
        field: String,
        expected: String,
        found: String,
    },
}

#[derive(Debug, Clone)]
struct AbiField {
    name: &'static str,
    ty: AbiType,
}

#[derive(Debug, Clone)]
struct AbiStruct {
    fields: Vec<AbiField>,
}

/// Registry of row schemas, keyed by schema name
#[derive(Debug, Default, Clone)]
pub struct AbiDef {
    structs: BTreeMap<String, AbiStruct>,
}

impl AbiDef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one schema with its ordered field list
    pub fn with_struct(mut self, name: &str, fields: Vec<(&'static str, AbiType)>) -> Self {
        let fields = fields
            .into_iter()
            .map(|(name, ty)| AbiField { name, ty })
            .collect();
        self.structs.insert(name.to_string(), AbiStruct { fields });
        self
    }

    pub fn contains(&self, schema: &str) -> bool {
        self.structs.contains_key(schema)
    }

    /// Encode one row against a schema. Fields are matched by name; the
    /// encoded order is the schema's declaration order.
    pub fn encode(&self, schema: &str, row: &AbiValue) -> Result<Vec<u8>, AbiError> {
        let def = self.structs.get(schema).ok_or_else(|| AbiError::UnknownSchema {
            schema: schema.to_string(),
        })?;
        let AbiValue::Object(fields) = row else {
            return Err(AbiError::NotAnObject {
                schema: schema.to_string(),
            });
        };

        for (name, _) in fields {
            if !def.fields.iter().any(|f| f.name == name.as_str()) {
                return Err(AbiError::ExtraField {
                    schema: schema.to_string(),
                    field: name.clone(),
                });
            }
        }

        let mut out = Vec::new();
        for field in &def.fields {
            let value = fields
                .iter()
                .find(|(name, _)| name.as_str() == field.name)
                .map(|(_, value)| value)
                .ok_or_else(|| AbiError::MissingField {
                    schema: schema.to_string(),
                    field: field.name.to_string(),
                })?;
            encode_value(schema, field.name, &field.ty, value, &mut out)?;
        }
        Ok(out)
    }
}

/// LEB128, low groups first
fn write_varuint32(out: &mut Vec<u8>, mut value: u32) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

fn encode_value(
    schema: &str,
    field: &str,
    ty: &AbiType,
    value: &AbiValue,
    out: &mut Vec<u8>,
) -> Result<(), AbiError> {
    match (ty, value) {
        (AbiType::Name, AbiValue::Name(name)) => {
            out.extend_from_slice(&name.as_u64().to_le_bytes())
        }
        (AbiType::Uint8, AbiValue::U8(v)) => out.push(*v),
        (AbiType::Uint16, AbiValue::U16(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (AbiType::Uint32, AbiValue::U32(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (AbiType::Uint64, AbiValue::U64(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (AbiType::Int64, AbiValue::I64(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (AbiType::VarUint32, AbiValue::VarU32(v)) => write_varuint32(out, *v),
        (AbiType::Bool, AbiValue::Bool(v)) => out.push(*v as u8),
        (AbiType::TimePointSec, AbiValue::Time(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (AbiType::Str, AbiValue::Str(s)) => {
            write_varuint32(out, s.len() as u32);
            out.extend_from_slice(s.as_bytes());
        }
        (AbiType::Asset, AbiValue::Asset(a)) => {
            out.extend_from_slice(&a.amount.to_le_bytes());
            out.extend_from_slice(&a.symbol.0.to_le_bytes());
        }
        (AbiType::Symbol, AbiValue::Symbol(s)) => out.extend_from_slice(&s.0.to_le_bytes()),
        (AbiType::Checksum256, AbiValue::Checksum256(bytes)) => out.extend_from_slice(bytes),
        (AbiType::Bytes, AbiValue::Bytes(bytes)) => {
            write_varuint32(out, bytes.len() as u32);
            out.extend_from_slice(bytes);
        }
        (AbiType::Array(inner), AbiValue::Array(values)) => {
            write_varuint32(out, values.len() as u32);
            for value in values {
                encode_value(schema, field, inner, value, out)?;
            }
        }
        (AbiType::Optional(inner), AbiValue::Optional(value)) => match value {
            Some(value) => {
                out.push(1);
                encode_value(schema, field, inner, value, out)?;
            }
            None => out.push(0),
        },
        (expected, found) => {
            return Err(AbiError::TypeMismatch {
                schema: schema.to_string(),
                field: field.to_string(),
                expected: expected.to_string(),
                found: found.kind_name().to_string(),
            })
        }
    }
    Ok(())
}
