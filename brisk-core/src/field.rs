use crate::shape::ShapeRef;

/// Describes one struct field.
#[derive(Clone, Copy)]
pub struct Field {
    /// The field identifier as written in source.
    pub name: &'static str,
    /// Key override from `#[json(rename = "...")]`. The planner validates
    /// the override against the key charset and falls back to `name` when
    /// it is not acceptable.
    pub rename: Option<&'static str>,
    /// Shape of the field type.
    pub shape: ShapeRef,
    /// Byte offset from the struct base, from `core::mem::offset_of!`.
    pub offset: usize,
    /// Option flags parsed from the field attribute.
    pub flags: FieldFlags,
}

impl Field {
    #[inline]
    pub fn shape(&self) -> &'static crate::shape::Shape {
        self.shape.get()
    }
}

impl core::fmt::Debug for Field {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

/// Field option flags.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct FieldFlags(u8);

impl FieldFlags {
    pub const EMPTY: Self = FieldFlags(0);
    /// `#[json(omitempty)]` — skip the field on encode when empty.
    pub const OMITEMPTY: Self = FieldFlags(1 << 0);
    /// `#[json(string)]` — quote the field's primitive JSON form.
    pub const STRING: Self = FieldFlags(1 << 1);
    /// `#[json(skip)]` — the field never participates.
    pub const SKIP: Self = FieldFlags(1 << 2);
    /// `#[json(embed)]` — promote the inner struct's fields.
    pub const EMBED: Self = FieldFlags(1 << 3);

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        FieldFlags(self.0 | other.0)
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl core::ops::BitOr for FieldFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl core::fmt::Debug for FieldFlags {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "FieldFlags({:#06b})", self.0)
    }
}
