use std::fmt;

use crate::inspect::ColumnDescriptor;
use crate::model::Cast;

/// What a column means to generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Identifier,
    Timestamp,
    Boolean,
    Integer,
    Float,
    Json,
    Date,
    DateTime,
    Email,
    Password,
    Url,
    ShortString,
    Text,
}

impl FieldKind {
    /// Identifier and bookkeeping timestamps are never mass assigned.
    pub fn is_fillable(&self) -> bool {
        !matches!(self, FieldKind::Identifier | FieldKind::Timestamp)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, FieldKind::Timestamp | FieldKind::Date | FieldKind::DateTime)
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, FieldKind::ShortString | FieldKind::Text)
    }

    pub fn cast(&self) -> Option<Cast> {
        match self {
            FieldKind::Identifier | FieldKind::Integer => Some(Cast::Int),
            FieldKind::Float => Some(Cast::Float),
            FieldKind::Boolean => Some(Cast::Bool),
            FieldKind::Json => Some(Cast::Json),
            FieldKind::Timestamp | FieldKind::Date | FieldKind::DateTime => Some(Cast::DateTime),
            FieldKind::Email | FieldKind::Password | FieldKind::Url | FieldKind::ShortString | FieldKind::Text => None,
        }
    }

    /// The `type` attribute of the form input, for kinds rendered as `<input>`.
    pub fn input_type(&self) -> &'static str {
        match self {
            FieldKind::Email => "email",
            FieldKind::Password => "password",
            FieldKind::Integer | FieldKind::Identifier | FieldKind::Float => "number",
            FieldKind::Date => "date",
            FieldKind::DateTime | FieldKind::Timestamp => "datetime-local",
            _ => "text",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldKind::Identifier => "identifier",
            FieldKind::Timestamp => "timestamp",
            FieldKind::Boolean => "boolean",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Json => "json",
            FieldKind::Date => "date",
            FieldKind::DateTime => "datetime",
            FieldKind::Email => "email",
            FieldKind::Password => "password",
            FieldKind::Url => "url",
            FieldKind::ShortString => "string",
            FieldKind::Text => "text",
        };
        f.write_str(s)
    }
}

/// Infer the kind of a column. First match wins: key, bookkeeping timestamps, declared type,
/// column name, then string length.
pub fn classify(column: &ColumnDescriptor) -> FieldKind {
    if column.is_primary_key && column.is_auto_increment {
        return FieldKind::Identifier;
    }
    if column.name == "created_at" || column.name == "updated_at" {
        return FieldKind::Timestamp;
    }
    let ty = column.type_lower();
    if let Some(kind) = classify_type(&ty) {
        return kind;
    }
    let name = column.name.to_ascii_lowercase();
    if name.contains("email") {
        return FieldKind::Email;
    }
    if name.contains("password") {
        return FieldKind::Password;
    }
    if ["url", "website", "link"].iter().any(|n| name.contains(n)) {
        return FieldKind::Url;
    }
    let short = ty.contains("char") && column.declared_length().map_or(true, |len| len <= 255);
    if short {
        FieldKind::ShortString
    } else {
        FieldKind::Text
    }
}

fn classify_type(ty: &str) -> Option<FieldKind> {
    let kind = if ty.contains("bool") || ty.contains("tinyint(1)") {
        FieldKind::Boolean
    } else if ["decimal", "float", "double"].iter().any(|t| ty.contains(t)) {
        FieldKind::Float
    } else if ty.contains("int") {
        FieldKind::Integer
    } else if ty.contains("json") {
        FieldKind::Json
    } else if ty.contains("datetime") || ty.contains("timestamp") {
        FieldKind::DateTime
    } else if ty.contains("date") {
        FieldKind::Date
    } else {
        return None;
    };
    Some(kind)
}
