//! Tip state machine.

use shared_types::{BlockHeader, Height};

/// Current and previous tip.
///
/// `previous` is always the value `current` held immediately before the last
/// advance, or `None` before any advance.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TipState {
    current: Option<BlockHeader>,
    previous: Option<BlockHeader>,
}

/// Result of offering a header to the tip state machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TipTransition {
    /// The header became the new tip.
    Advanced {
        current: BlockHeader,
        previous: Option<BlockHeader>,
    },
    /// Equal or lower height; tip unchanged.
    Unchanged,
}

impl TipState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&BlockHeader> {
        self.current.as_ref()
    }

    pub fn previous(&self) -> Option<&BlockHeader> {
        self.previous.as_ref()
    }

    /// Height of the current tip, or 0 before any advance.
    pub fn tip_height(&self) -> Height {
        self.current.as_ref().map_or(0, BlockHeader::height)
    }

    /// Offer `header`; it becomes the tip only if strictly higher.
    pub fn observe(&mut self, header: BlockHeader) -> TipTransition {
        if header.height() <= self.tip_height() {
            return TipTransition::Unchanged;
        }
        self.previous = self.current.replace(header.clone());
        TipTransition::Advanced {
            current: header,
            previous: self.previous.clone(),
        }
    }
}
