//! Identity types for the kernel.
//!
//! Ids are process-unique newtypes over `u32`, handed out from monotonically
//! increasing counters. They key the connection table and label events.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_MODULE_ID: AtomicU32 = AtomicU32::new(0);
static NEXT_CONNECTOR_ID: AtomicU32 = AtomicU32::new(0);

/// Identity of a module instance (prototypes included).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ModuleId(pub u32);

impl ModuleId {
    pub const INVALID: ModuleId = ModuleId(u32::MAX);

    pub(crate) fn next() -> Self {
        ModuleId(NEXT_MODULE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Debug for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "ModuleId(INVALID)")
        } else {
            write!(f, "ModuleId({})", self.0)
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Identity of a connector. Key into the connection table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectorId(pub u32);

impl ConnectorId {
    pub const INVALID: ConnectorId = ConnectorId(u32::MAX);

    pub(crate) fn next() -> Self {
        ConnectorId(NEXT_CONNECTOR_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Debug for ConnectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "ConnectorId(INVALID)")
        } else {
            write!(f, "ConnectorId({})", self.0)
        }
    }
}

impl fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = ConnectorId::next();
        let b = ConnectorId::next();
        assert_ne!(a, b);
        assert!(a.is_valid());
        assert!(!ConnectorId::INVALID.is_valid());
    }

    #[test]
    fn test_debug_format() {
        assert_eq!(format!("{:?}", ModuleId(7)), "ModuleId(7)");
        assert_eq!(format!("{}", ModuleId::INVALID), "ModuleId(INVALID)");
    }
}
