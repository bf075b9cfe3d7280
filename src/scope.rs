pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_STATIC: u16 = 0x0008;

/// Visibility and nesting facts for the class currently being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Scope {
    public: bool,
    nested: bool,
    is_static: bool,
}

impl Scope {
    /// Seeded from the header; assumed top-level until an `InnerClasses`
    /// entry names the class itself.
    pub fn from_header(access: u16) -> Self {
        Self {
            public: access & ACC_PUBLIC != 0,
            nested: false,
            is_static: false,
        }
    }

    /// Apply an `InnerClasses` entry describing this class. Each call
    /// overwrites the previous one, so the last entry in the file wins.
    pub fn apply_inner_fact(&mut self, access: u16) {
        self.public = access & ACC_PUBLIC != 0;
        self.nested = true;
        self.is_static = access & ACC_STATIC != 0;
    }

    pub fn is_eligible(&self) -> bool {
        self.public && (!self.nested || self.is_static)
    }
}
