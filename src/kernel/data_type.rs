//! Data type descriptors for typed connectors.
//!
//! Each payload kind declares a static [`DataType`] with an optional parent,
//! forming a single-inheritance chain. An input requiring `T` accepts any
//! output whose produced type is `T` or one of its descendants.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Static descriptor for a kind of payload.
pub struct DataType {
    name: &'static str,
    parent: Option<&'static DataType>,
}

impl DataType {
    /// A descriptor with no supertype.
    pub const fn root(name: &'static str) -> Self {
        Self { name, parent: None }
    }

    /// A descriptor refining `parent`.
    pub const fn derived(name: &'static str, parent: &'static DataType) -> Self {
        Self {
            name,
            parent: Some(parent),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parent(&self) -> Option<&'static DataType> {
        self.parent
    }

    /// True if `self` is `other` or a descendant of it.
    pub fn is_a(&self, other: &DataType) -> bool {
        let mut current = Some(self);
        while let Some(ty) = current {
            if std::ptr::eq(ty, other) || ty.name == other.name {
                return true;
            }
            current = ty.parent;
        }
        false
    }
}

impl PartialEq for DataType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for DataType {}

impl fmt::Debug for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parent {
            Some(parent) => write!(f, "DataType({} : {})", self.name, parent.name),
            None => write!(f, "DataType({})", self.name),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A payload that can travel over a typed connector.
pub trait Transferable: Any + Send + Sync {
    /// Descriptor of the concrete type.
    fn data_type() -> &'static DataType;
}

/// A published payload: shared, immutable, tagged with its concrete type.
#[derive(Clone)]
pub struct Packet {
    data_type: &'static DataType,
    value: Arc<dyn Any + Send + Sync>,
}

impl Packet {
    pub fn new<T: Transferable>(value: Arc<T>) -> Self {
        Self {
            data_type: T::data_type(),
            value,
        }
    }

    pub fn data_type(&self) -> &'static DataType {
        self.data_type
    }

    /// The payload as `T`, if that is its concrete type.
    pub fn downcast<T: Transferable>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("data_type", &self.data_type.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static BASE: DataType = DataType::root("Base");
    static CHILD: DataType = DataType::derived("Child", &BASE);
    static GRANDCHILD: DataType = DataType::derived("Grandchild", &CHILD);
    static OTHER: DataType = DataType::root("Other");

    struct Payload(u32);

    impl Transferable for Payload {
        fn data_type() -> &'static DataType {
            &CHILD
        }
    }

    #[test]
    fn test_subtype_chain() {
        assert!(GRANDCHILD.is_a(&BASE));
        assert!(GRANDCHILD.is_a(&CHILD));
        assert!(CHILD.is_a(&CHILD));
        assert!(!BASE.is_a(&CHILD));
        assert!(!OTHER.is_a(&BASE));
    }

    #[test]
    fn test_packet_downcast() {
        let packet = Packet::new(Arc::new(Payload(3)));
        assert_eq!(packet.data_type(), &CHILD);
        assert_eq!(packet.downcast::<Payload>().map(|p| p.0), Some(3));
    }

    #[test]
    fn test_debug_shows_parent() {
        assert_eq!(format!("{:?}", CHILD), "DataType(Child : Base)");
    }
}
