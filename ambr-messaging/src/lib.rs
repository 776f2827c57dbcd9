pub mod inbox;
pub mod sync;

pub use inbox::{ConversationPreview, Inbox};
pub use sync::{ConversationSync, Delivery, TimelineItem};
