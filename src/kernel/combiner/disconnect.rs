//! DisconnectCombiner: tears down a single edge.

use crate::error::Result;
use crate::kernel::connector::Connector;
use std::fmt;

pub struct DisconnectCombiner {
    first: Connector,
    second: Connector,
}

impl DisconnectCombiner {
    pub fn new(first: Connector, second: Connector) -> Self {
        Self { first, second }
    }

    pub fn first(&self) -> &Connector {
        &self.first
    }

    pub fn second(&self) -> &Connector {
        &self.second
    }

    pub fn apply(&self) -> Result<()> {
        self.first.disconnect(&self.second)
    }
}

impl fmt::Debug for DisconnectCombiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DisconnectCombiner({} - {})",
            self.first.canonical_name(),
            self.second.canonical_name()
        )
    }
}
