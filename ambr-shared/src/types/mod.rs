pub mod event;
pub mod matching;
pub mod messaging;
pub mod profile;

pub use event::{CoreEvent, EventBus};
pub use matching::{DiscoveryFilters, Match, SwipeAck, SwipeDecision, Verdict};
pub use messaging::{Message, MessageBody, OutgoingMessage};
pub use profile::Profile;
