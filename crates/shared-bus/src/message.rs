//! Gossip message envelope.

use shared_types::PeerId;
use uuid::Uuid;

/// Unique id assigned at publish time; relays keep it unchanged.
pub type MessageId = Uuid;

/// How many more times a message may be re-forwarded after its first send.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HopBudget {
    /// No limit; relaying stops only where hooks or the seen cache stop it.
    Unlimited,
    /// At most this many further relays.
    Hops(u32),
}

impl HopBudget {
    /// Budget carried by a message relayed one more hop, or `None` when the
    /// budget is exhausted.
    #[must_use]
    pub fn next_hop(self) -> Option<Self> {
        match self {
            HopBudget::Unlimited => Some(HopBudget::Unlimited),
            HopBudget::Hops(0) => None,
            HopBudget::Hops(n) => Some(HopBudget::Hops(n - 1)),
        }
    }
}

impl From<i64> for HopBudget {
    /// Negative values mean unlimited.
    fn from(hops: i64) -> Self {
        if hops < 0 {
            HopBudget::Unlimited
        } else {
            HopBudget::Hops(u32::try_from(hops).unwrap_or(u32::MAX))
        }
    }
}

/// A message travelling through the mesh.
#[derive(Clone, Debug)]
pub struct GossipMessage {
    pub id: MessageId,
    pub topic: String,
    pub payload: Vec<u8>,
    /// Remaining relay budget.
    pub hops: HopBudget,
    /// Node that originally published the message.
    pub origin: PeerId,
}

impl GossipMessage {
    pub fn new(topic: impl Into<String>, payload: Vec<u8>, hops: HopBudget, origin: PeerId) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            payload,
            hops,
            origin,
        }
    }
}
