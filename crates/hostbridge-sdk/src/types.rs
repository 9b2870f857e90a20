//! Property, signal and method descriptors
//!
//! Tags use the host's numbering so they can be passed through the boundary
//! unchanged.

use bitflags::bitflags;

use crate::string::StringName;

// ============================================================================
// Tags
// ============================================================================

/// Value-kind tag of a property, parameter or variant
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VariantType {
    /// No type, or "any variant"
    #[default]
    Nil = 0,
    /// Boolean
    Bool = 1,
    /// 64-bit integer
    Int = 2,
    /// 64-bit float
    Float = 3,
    /// String
    String = 4,
    /// 2D vector
    Vector2 = 5,
    /// 2D integer vector
    Vector2i = 6,
    /// 2D rectangle
    Rect2 = 7,
    /// 3D vector
    Vector3 = 9,
    /// 2D transform
    Transform2D = 11,
    /// Color
    Color = 20,
    /// Interned name
    StringName = 21,
    /// Node path
    NodePath = 22,
    /// Object reference
    Object = 24,
    /// Callable
    Callable = 25,
    /// Signal
    Signal = 26,
    /// Dictionary
    Dictionary = 27,
    /// Array
    Array = 28,
}

impl VariantType {
    /// Human readable name, used in conversion errors
    pub fn name(self) -> &'static str {
        match self {
            VariantType::Nil => "Nil",
            VariantType::Bool => "bool",
            VariantType::Int => "int",
            VariantType::Float => "float",
            VariantType::String => "String",
            VariantType::Vector2 => "Vector2",
            VariantType::Vector2i => "Vector2i",
            VariantType::Rect2 => "Rect2",
            VariantType::Vector3 => "Vector3",
            VariantType::Transform2D => "Transform2D",
            VariantType::Color => "Color",
            VariantType::StringName => "StringName",
            VariantType::NodePath => "NodePath",
            VariantType::Object => "Object",
            VariantType::Callable => "Callable",
            VariantType::Signal => "Signal",
            VariantType::Dictionary => "Dictionary",
            VariantType::Array => "Array",
        }
    }
}

/// Editor hint attached to a property
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PropertyHint {
    /// No hint
    #[default]
    None = 0,
    /// Numeric range, hint string "min,max,step"
    Range = 1,
    /// Enumeration, hint string "A,B,C"
    Enum = 2,
    /// Suggested enumeration values
    EnumSuggestion = 3,
    /// Easing curve
    ExpEasing = 4,
    /// Linked values
    Link = 5,
    /// Bit flags, hint string "A,B,C"
    Flags = 6,
    /// File path
    File = 13,
    /// Directory path
    Dir = 14,
    /// Resource type
    ResourceType = 17,
    /// Multiline text
    MultilineText = 18,
    /// Placeholder text
    PlaceholderText = 20,
    /// Typed array element hint
    ArrayType = 31,
}

bitflags! {
    /// Usage bitmask of a property or parameter
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PropertyUsageFlags: u32 {
        /// Saved with the owning resource
        const STORAGE = 1 << 1;
        /// Shown in the editor
        const EDITOR = 1 << 2;
        /// Grouping marker
        const GROUP = 1 << 6;
        /// Category marker
        const CATEGORY = 1 << 7;
        /// Declared by a script
        const SCRIPT_VARIABLE = 1 << 12;
        /// Nil type means "any variant"
        const NIL_IS_VARIANT = 1 << 17;
        /// Storage and editor
        const DEFAULT = Self::STORAGE.bits() | Self::EDITOR.bits();
    }
}

/// Remote-call mode of a method
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RpcMode {
    /// Not callable remotely
    #[default]
    Disabled = 0,
    /// Any peer may call
    AnyPeer = 1,
    /// Only the multiplayer authority may call
    Authority = 2,
}

/// Remote-call transfer mode
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransferMode {
    /// Unreliable, unordered
    Unreliable = 0,
    /// Unreliable, ordered
    UnreliableOrdered = 1,
    /// Reliable, ordered
    #[default]
    Reliable = 2,
}

// ============================================================================
// Descriptors
// ============================================================================

/// Property declared by one level of a script type
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyInfo {
    /// Property name
    pub name: StringName,
    /// Value-kind tag
    pub ty: VariantType,
    /// Editor hint
    pub hint: PropertyHint,
    /// Hint string, meaning depends on `hint`
    pub hint_string: Option<String>,
    /// Usage bitmask
    pub usage: PropertyUsageFlags,
    /// Whether the member is exported to the editor
    pub exported: bool,
}

impl PropertyInfo {
    /// Plain script member, not exported
    pub fn script_variable(name: &str, ty: VariantType) -> Self {
        Self {
            name: StringName::new(name),
            ty,
            hint: PropertyHint::None,
            hint_string: None,
            usage: PropertyUsageFlags::SCRIPT_VARIABLE,
            exported: false,
        }
    }

    /// Exported member with default usage
    pub fn exported(name: &str, ty: VariantType) -> Self {
        let mut usage = PropertyUsageFlags::DEFAULT | PropertyUsageFlags::SCRIPT_VARIABLE;
        if ty == VariantType::Nil {
            usage |= PropertyUsageFlags::NIL_IS_VARIANT;
        }
        Self {
            name: StringName::new(name),
            ty,
            hint: PropertyHint::None,
            hint_string: None,
            usage,
            exported: true,
        }
    }

    /// Attach an editor hint
    pub fn with_hint(mut self, hint: PropertyHint, hint_string: &str) -> Self {
        self.hint = hint;
        self.hint_string = Some(hint_string.to_string());
        self
    }
}

/// Parameter of a signal
#[derive(Debug, Clone, PartialEq)]
pub struct SignalParam {
    /// Parameter name
    pub name: StringName,
    /// Value-kind tag
    pub ty: VariantType,
    /// Usage bitmask
    pub usage: PropertyUsageFlags,
}

impl SignalParam {
    /// Parameter with default usage
    pub fn new(name: &str, ty: VariantType) -> Self {
        Self {
            name: StringName::new(name),
            ty,
            usage: PropertyUsageFlags::DEFAULT,
        }
    }
}

/// Signal declared by one level of a script type
#[derive(Debug, Clone, PartialEq)]
pub struct SignalInfo {
    /// Signal name
    pub name: StringName,
    /// Ordered parameters
    pub params: Vec<SignalParam>,
}

impl SignalInfo {
    /// Signal without parameters
    pub fn new(name: &str) -> Self {
        Self {
            name: StringName::new(name),
            params: Vec::new(),
        }
    }

    /// Append a parameter
    pub fn with_param(mut self, name: &str, ty: VariantType) -> Self {
        self.params.push(SignalParam::new(name, ty));
        self
    }
}

/// Method declared by one level of a script type
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    /// Method name
    pub name: StringName,
    /// Static methods are never remotely callable
    pub is_static: bool,
    /// Remote-call mode
    pub rpc_mode: RpcMode,
    /// Remote-call transfer mode
    pub transfer_mode: TransferMode,
    /// Remote-call channel
    pub channel: i32,
}

impl MethodInfo {
    /// Instance method without rpc configuration
    pub fn new(name: &str) -> Self {
        Self {
            name: StringName::new(name),
            is_static: false,
            rpc_mode: RpcMode::Disabled,
            transfer_mode: TransferMode::Reliable,
            channel: 0,
        }
    }

    /// Static method
    pub fn new_static(name: &str) -> Self {
        Self {
            is_static: true,
            ..Self::new(name)
        }
    }

    /// Mark as remotely callable
    pub fn with_rpc(mut self, mode: RpcMode) -> Self {
        self.rpc_mode = mode;
        self
    }
}

/// Remote-call configuration of one method, as reported to the native side
#[derive(Debug, Clone, PartialEq)]
pub struct RpcConfig {
    /// Method name
    pub method: StringName,
    /// Remote-call mode
    pub mode: RpcMode,
    /// Transfer mode
    pub transfer_mode: TransferMode,
    /// Channel index
    pub channel: i32,
}

impl RpcConfig {
    /// Configuration for an rpc-eligible method, `None` when disabled
    pub fn from_method(method: &MethodInfo) -> Option<Self> {
        if method.is_static || method.rpc_mode == RpcMode::Disabled {
            return None;
        }
        Some(Self {
            method: method.name.clone(),
            mode: method.rpc_mode,
            transfer_mode: method.transfer_mode,
            channel: method.channel,
        })
    }
}
