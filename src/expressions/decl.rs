use crate::location::SourceLocation;
use crate::types::{FactoryId, Type};

/// Declaration of one bound identifier.
///
/// Binders hold their declarations in source order; inside the binder the rightmost
/// declaration is referenced by index 0. The name is only kept for printing, two declarations
/// with different names but the same type are equal.
#[derive(Clone, Debug)]
pub struct BoundIdentDecl {
    name: String,
    ty: Option<Type>,
    location: Option<SourceLocation>,
    factory: FactoryId,
}

impl BoundIdentDecl {
    pub(crate) fn from_parts(
        name: String,
        ty: Option<Type>,
        location: Option<SourceLocation>,
        factory: FactoryId,
    ) -> Self {
        BoundIdentDecl {
            name,
            ty,
            location,
            factory,
        }
    }

    pub(crate) fn factory_id(&self) -> FactoryId {
        self.factory
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> Option<&Type> {
        self.ty.as_ref()
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.location.as_ref()
    }

    pub fn is_type_checked(&self) -> bool {
        self.ty.is_some()
    }
}

impl PartialEq for BoundIdentDecl {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty
    }
}
