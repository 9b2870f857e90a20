//! Managed-side type model
//!
//! A `TypeDescriptor` is the bridge's view of one managed type:
//! - its owning load unit and base type
//! - whether it is a script type or a host-supplied native wrapper
//! - attributes (tool, static wrapper), stable path and constructors
//! - the generated metadata table for its own level
//!
//! Descriptors are immutable once built and shared as `ManagedType`.

mod object;
mod unit;

pub use object::{ManagedObject, SignalCallback};
pub use unit::{LoadUnit, LoadUnitId, UnitCatalog, UnitState};

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use bitflags::bitflags;
use hostbridge_sdk::{GeneratedMetadata, InteropResult, NoMetadata, Variant};

/// Shared handle to an immutable type descriptor
pub type ManagedType = Arc<TypeDescriptor>;

/// Process-unique identifier of a managed type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u64);

impl TypeId {
    /// Allocate a new unique id
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        TypeId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TypeId {
    fn default() -> Self {
        Self::new()
    }
}

bitflags! {
    /// Declared attributes of a managed type
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeAttributes: u32 {
        /// Runs inside the editor
        const TOOL = 1 << 0;
        /// Cannot be instantiated directly
        const ABSTRACT = 1 << 1;
        /// Cannot be derived from
        const SEALED = 1 << 2;
        /// Abstract and sealed: a static class
        const STATIC = Self::ABSTRACT.bits() | Self::SEALED.bits();
    }
}

/// Kind of managed type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    /// User script type
    Script,
    /// Host-supplied wrapper for a native class
    Native {
        /// Native class name wrapped by this type
        native_name: String,
    },
}

/// Constructor body: initializes a freshly created object
pub type ConstructorFn = Arc<dyn Fn(&ManagedObject, &[Variant]) -> InteropResult<()> + Send + Sync>;

/// Constructor with a fixed parameter count
#[derive(Clone)]
pub struct Constructor {
    arity: usize,
    body: ConstructorFn,
}

impl Constructor {
    /// Number of parameters
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Run the constructor body on `object`
    pub fn invoke(&self, object: &ManagedObject, args: &[Variant]) -> InteropResult<()> {
        (self.body)(object, args)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor").field("arity", &self.arity).finish()
    }
}

/// Immutable description of a managed type
pub struct TypeDescriptor {
    id: TypeId,
    name: String,
    namespace: Option<String>,
    kind: TypeKind,
    attributes: TypeAttributes,
    base: Option<ManagedType>,
    declaring: Option<ManagedType>,
    unit: Weak<LoadUnit>,
    unit_name: Option<String>,
    script_path: Option<String>,
    constructors: Vec<Constructor>,
    metadata: Arc<dyn GeneratedMetadata>,
}

impl TypeDescriptor {
    /// Unique id
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Simple name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace, if any
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Qualified name. Nested types are `Declaring+Nested`.
    pub fn full_name(&self) -> String {
        match (&self.declaring, &self.namespace) {
            (Some(declaring), _) => format!("{}+{}", declaring.full_name(), self.name),
            (None, Some(ns)) => format!("{}.{}", ns, self.name),
            (None, None) => self.name.clone(),
        }
    }

    /// Type kind
    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    /// Check for a host-supplied native wrapper
    pub fn is_native(&self) -> bool {
        matches!(self.kind, TypeKind::Native { .. })
    }

    /// Native class name for native wrappers
    pub fn native_name(&self) -> Option<&str> {
        match &self.kind {
            TypeKind::Native { native_name } => Some(native_name),
            TypeKind::Script => None,
        }
    }

    /// Declared attributes
    pub fn attributes(&self) -> TypeAttributes {
        self.attributes
    }

    /// Check for the tool attribute on this type itself
    pub fn has_tool_attribute(&self) -> bool {
        self.attributes.contains(TypeAttributes::TOOL)
    }

    /// Static classes are abstract and sealed
    pub fn is_static(&self) -> bool {
        self.attributes.contains(TypeAttributes::STATIC)
    }

    /// Direct base type
    pub fn base(&self) -> Option<&ManagedType> {
        self.base.as_ref()
    }

    /// Enclosing type of a nested type
    pub fn declaring_type(&self) -> Option<&ManagedType> {
        self.declaring.as_ref()
    }

    /// Base types, nearest first
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors {
            next: self.base.as_ref(),
        }
    }

    /// Nearest ancestor that is a native wrapper
    pub fn native_base(&self) -> Option<&ManagedType> {
        self.ancestors().find(|ty| ty.is_native())
    }

    /// Check whether instances wrap a native object
    pub fn derives_from_native_object(&self) -> bool {
        self.is_native() || self.native_base().is_some()
    }

    /// Check whether `self` is `other` or derives from it
    pub fn is_assignable_to(&self, other: &TypeDescriptor) -> bool {
        self.id == other.id || self.ancestors().any(|ty| ty.id == other.id)
    }

    /// Owning load unit, if it is still alive
    pub fn unit(&self) -> Option<Arc<LoadUnit>> {
        self.unit.upgrade()
    }

    /// Name of the owning load unit
    pub fn unit_name(&self) -> Option<&str> {
        self.unit_name.as_deref()
    }

    /// Stable path declared by the type
    pub fn script_path(&self) -> Option<&str> {
        self.script_path.as_deref()
    }

    /// Generated metadata for this level only
    pub fn metadata(&self) -> &dyn GeneratedMetadata {
        self.metadata.as_ref()
    }

    /// All constructors
    pub fn constructors(&self) -> &[Constructor] {
        &self.constructors
    }

    /// Constructor taking exactly `arity` parameters
    pub fn find_constructor(&self, arity: usize) -> Option<&Constructor> {
        self.constructors.iter().find(|ctor| ctor.arity == arity)
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeDescriptor {}

impl Hash for TypeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("id", &self.id)
            .field("name", &self.full_name())
            .field("kind", &self.kind)
            .field("unit", &self.unit_name)
            .field("script_path", &self.script_path)
            .finish()
    }
}

/// Iterator over base types
pub struct Ancestors<'a> {
    next: Option<&'a ManagedType>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a ManagedType;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.base.as_ref();
        Some(current)
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for `TypeDescriptor`
pub struct TypeBuilder {
    name: String,
    namespace: Option<String>,
    kind: TypeKind,
    attributes: TypeAttributes,
    base: Option<ManagedType>,
    declaring: Option<ManagedType>,
    unit: Option<Arc<LoadUnit>>,
    script_path: Option<String>,
    constructors: Vec<Constructor>,
    metadata: Arc<dyn GeneratedMetadata>,
}

impl TypeBuilder {
    /// Start a script type
    pub fn script(name: &str) -> Self {
        Self::with_kind(name, TypeKind::Script)
    }

    /// Start a native wrapper for `native_name`
    pub fn native(name: &str, native_name: &str) -> Self {
        Self::with_kind(
            name,
            TypeKind::Native {
                native_name: native_name.to_string(),
            },
        )
    }

    fn with_kind(name: &str, kind: TypeKind) -> Self {
        Self {
            name: name.to_string(),
            namespace: None,
            kind,
            attributes: TypeAttributes::empty(),
            base: None,
            declaring: None,
            unit: None,
            script_path: None,
            constructors: Vec::new(),
            metadata: Arc::new(NoMetadata),
        }
    }

    /// Set the namespace
    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    /// Set the direct base type
    pub fn base(mut self, base: &ManagedType) -> Self {
        self.base = Some(base.clone());
        self
    }

    /// Nest inside `declaring`
    pub fn declaring(mut self, declaring: &ManagedType) -> Self {
        self.declaring = Some(declaring.clone());
        self
    }

    /// Place the type in a load unit
    pub fn unit(mut self, unit: &Arc<LoadUnit>) -> Self {
        self.unit = Some(unit.clone());
        self
    }

    /// Declare a stable path
    pub fn script_path(mut self, path: &str) -> Self {
        self.script_path = Some(path.to_string());
        self
    }

    /// Add attributes
    pub fn attributes(mut self, attributes: TypeAttributes) -> Self {
        self.attributes |= attributes;
        self
    }

    /// Mark as a tool type
    pub fn tool(self) -> Self {
        self.attributes(TypeAttributes::TOOL)
    }

    /// Add a constructor
    pub fn constructor<F>(mut self, arity: usize, body: F) -> Self
    where
        F: Fn(&ManagedObject, &[Variant]) -> InteropResult<()> + Send + Sync + 'static,
    {
        self.constructors.push(Constructor {
            arity,
            body: Arc::new(body),
        });
        self
    }

    /// Add a parameterless constructor that does nothing
    pub fn default_constructor(self) -> Self {
        self.constructor(0, |_, _| Ok(()))
    }

    /// Attach the generated metadata table
    pub fn metadata<M: GeneratedMetadata + 'static>(mut self, metadata: M) -> Self {
        self.metadata = Arc::new(metadata);
        self
    }

    /// Attach a shared metadata table
    pub fn shared_metadata(mut self, metadata: Arc<dyn GeneratedMetadata>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Finish the descriptor, adding it to its load unit
    pub fn build(self) -> ManagedType {
        let ty = Arc::new(TypeDescriptor {
            id: TypeId::new(),
            name: self.name,
            namespace: self.namespace,
            kind: self.kind,
            attributes: self.attributes,
            base: self.base,
            declaring: self.declaring,
            unit: self.unit.as_ref().map(Arc::downgrade).unwrap_or_default(),
            unit_name: self.unit.as_ref().map(|unit| unit.name().to_string()),
            script_path: self.script_path,
            constructors: self.constructors,
            metadata: self.metadata,
        });
        if let Some(unit) = &self.unit {
            unit.add_type(ty.clone());
        }
        ty
    }
}
