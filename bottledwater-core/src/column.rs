//! Column and row descriptors.
//!
//! A [`RowDescriptor`] is the ordered column catalog of a relation or a
//! composite type. Its order is the output field order of every encoder.
//! Dropped columns keep their ordinal slot so that row values line up with
//! attribute numbers, but no encoder ever emits them.

use std::fmt;
use std::sync::Arc;

// ============================================================================
// TYPE TAGS
// ============================================================================

/// The encoding category of a column type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeTag {
    Bool,
    /// int2/int4 and friends, emitted as bare JSON numbers.
    SmallInt,
    /// int8, always emitted as a JSON string.
    BigInt,
    /// float8.
    Float,
    /// float4. Carried as `f64` but rendered at single precision.
    Real,
    /// Arbitrary-precision numeric, always emitted as a JSON string.
    Decimal,
    Date,
    Timestamp,
    TimestampTz,
    /// Array whose elements are described by the boxed descriptor.
    Array(Box<TypeDescriptor>),
    /// Nested row with its own shape.
    Composite(Arc<RowDescriptor>),
    /// Anything else. Encoded through a registered JSON cast or its text form.
    Opaque,
}

impl TypeTag {
    /// Short lowercase label used in error messages and logs.
    pub fn label(&self) -> &'static str {
        match self {
            TypeTag::Bool => "bool",
            TypeTag::SmallInt => "small-int",
            TypeTag::BigInt => "big-int",
            TypeTag::Float => "float",
            TypeTag::Real => "real",
            TypeTag::Decimal => "decimal",
            TypeTag::Date => "date",
            TypeTag::Timestamp => "timestamp",
            TypeTag::TimestampTz => "timestamptz",
            TypeTag::Array(_) => "array",
            TypeTag::Composite(_) => "composite",
            TypeTag::Opaque => "opaque",
        }
    }
}

/// A column type: its catalog name plus its encoding category.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    pub name: String,
    pub tag: TypeTag,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>, tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            tag,
        }
    }

    pub fn boolean() -> Self {
        Self::new("boolean", TypeTag::Bool)
    }

    pub fn int2() -> Self {
        Self::new("smallint", TypeTag::SmallInt)
    }

    pub fn int4() -> Self {
        Self::new("integer", TypeTag::SmallInt)
    }

    pub fn int8() -> Self {
        Self::new("bigint", TypeTag::BigInt)
    }

    pub fn float4() -> Self {
        Self::new("real", TypeTag::Real)
    }

    pub fn float8() -> Self {
        Self::new("double precision", TypeTag::Float)
    }

    pub fn numeric() -> Self {
        Self::new("numeric", TypeTag::Decimal)
    }

    pub fn date() -> Self {
        Self::new("date", TypeTag::Date)
    }

    pub fn timestamp() -> Self {
        Self::new("timestamp without time zone", TypeTag::Timestamp)
    }

    pub fn timestamptz() -> Self {
        Self::new("timestamp with time zone", TypeTag::TimestampTz)
    }

    pub fn text() -> Self {
        Self::opaque("text")
    }

    pub fn varchar() -> Self {
        Self::opaque("character varying")
    }

    pub fn json() -> Self {
        Self::opaque("json")
    }

    pub fn jsonb() -> Self {
        Self::opaque("jsonb")
    }

    pub fn opaque(name: impl Into<String>) -> Self {
        Self::new(name, TypeTag::Opaque)
    }

    /// Array type over `element`, named the way the catalog names it (`integer[]`).
    pub fn array_of(element: TypeDescriptor) -> Self {
        Self {
            name: format!("{}[]", element.name),
            tag: TypeTag::Array(Box::new(element)),
        }
    }

    pub fn composite(name: impl Into<String>, shape: Arc<RowDescriptor>) -> Self {
        Self::new(name, TypeTag::Composite(shape))
    }

    /// Render the type name with a declared modifier, the way the catalog
    /// prints it: `numeric(10,2)`, `timestamp(3) without time zone`,
    /// `character varying(20)[]`.
    pub fn display_name(&self, modifier: Option<&TypeModifier>) -> String {
        let Some(modifier) = modifier else {
            return self.name.clone();
        };
        let args = modifier.to_string();

        if let Some(base) = self.name.strip_suffix("[]") {
            return format!("{}{}[]", base, args);
        }
        for suffix in [" with time zone", " without time zone"] {
            if let Some(base) = self.name.strip_suffix(suffix) {
                return format!("{}{}{}", base, args, suffix);
            }
        }
        format!("{}{}", self.name, args)
    }
}

/// A declared type modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeModifier {
    /// Character length or fractional-second precision.
    Length(u32),
    /// Numeric precision with optional scale.
    Precision { precision: u32, scale: Option<u32> },
}

impl fmt::Display for TypeModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeModifier::Length(len) => write!(f, "({})", len),
            TypeModifier::Precision {
                precision,
                scale: Some(scale),
            } => write!(f, "({},{})", precision, scale),
            TypeModifier::Precision {
                precision,
                scale: None,
            } => write!(f, "({})", precision),
        }
    }
}

// ============================================================================
// COLUMN DESCRIPTOR
// ============================================================================

/// One column of a row descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub type_desc: TypeDescriptor,
    pub modifier: Option<TypeModifier>,
    pub nullable: bool,
    pub dropped: bool,
    /// The catalog claims a default expression exists for this column.
    pub has_default: bool,
}

impl ColumnDescriptor {
    /// A nullable, live column without modifier or default.
    pub fn new(name: impl Into<String>, type_desc: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            type_desc,
            modifier: None,
            nullable: true,
            dropped: false,
            has_default: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_modifier(mut self, modifier: TypeModifier) -> Self {
        self.modifier = Some(modifier);
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    /// Mark the column dropped. Its slot is retained.
    pub fn dropped(mut self) -> Self {
        self.dropped = true;
        self
    }

    /// Type name including the declared modifier.
    pub fn type_display(&self) -> String {
        self.type_desc.display_name(self.modifier.as_ref())
    }
}

// ============================================================================
// ROW DESCRIPTOR
// ============================================================================

/// Ordered column catalog. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowDescriptor {
    columns: Vec<ColumnDescriptor>,
}

impl RowDescriptor {
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self { columns }
    }

    /// All columns, dropped ones included.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Number of slots, dropped ones included.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Non-dropped columns with their zero-based slot index, in declared order.
    pub fn visible(&self) -> impl Iterator<Item = (usize, &ColumnDescriptor)> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, column)| !column.dropped)
    }

    /// Look up a column by its 1-based attribute number.
    pub fn attribute(&self, attnum: i16) -> Option<&ColumnDescriptor> {
        if attnum < 1 {
            return None;
        }
        self.columns.get(attnum as usize - 1)
    }
}

impl FromIterator<ColumnDescriptor> for RowDescriptor {
    fn from_iter<I: IntoIterator<Item = ColumnDescriptor>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_skips_dropped_but_keeps_slots() {
        let desc = RowDescriptor::new(vec![
            ColumnDescriptor::new("a", TypeDescriptor::int4()),
            ColumnDescriptor::new("gone", TypeDescriptor::text()).dropped(),
            ColumnDescriptor::new("b", TypeDescriptor::text()),
        ]);

        let visible: Vec<_> = desc.visible().map(|(i, c)| (i, c.name.as_str())).collect();
        assert_eq!(visible, vec![(0, "a"), (2, "b")]);
        assert_eq!(desc.len(), 3);
    }

    #[test]
    fn test_attribute_lookup_is_one_based() {
        let desc = RowDescriptor::new(vec![
            ColumnDescriptor::new("a", TypeDescriptor::int4()),
            ColumnDescriptor::new("b", TypeDescriptor::text()),
        ]);
        assert_eq!(desc.attribute(2).map(|c| c.name.as_str()), Some("b"));
        assert!(desc.attribute(0).is_none());
        assert!(desc.attribute(3).is_none());
    }

    #[test]
    fn test_display_name_with_modifiers() {
        let numeric = TypeModifier::Precision {
            precision: 10,
            scale: Some(2),
        };
        assert_eq!(
            TypeDescriptor::numeric().display_name(Some(&numeric)),
            "numeric(10,2)"
        );
        assert_eq!(
            TypeDescriptor::timestamp().display_name(Some(&TypeModifier::Length(3))),
            "timestamp(3) without time zone"
        );
        assert_eq!(
            TypeDescriptor::array_of(TypeDescriptor::varchar())
                .display_name(Some(&TypeModifier::Length(20))),
            "character varying(20)[]"
        );
        assert_eq!(TypeDescriptor::int8().display_name(None), "bigint");
    }

    #[test]
    fn test_array_name_follows_element() {
        let ty = TypeDescriptor::array_of(TypeDescriptor::int4());
        assert_eq!(ty.name, "integer[]");
        assert_eq!(ty.tag.label(), "array");
    }
}
