pub mod gate;
pub mod quota;
pub mod store;

pub use gate::{evaluate, DenyReason, EntitlementState, Feature, Gate, Tier};
pub use quota::{ConsumeOutcome, SwipeQuotaLedger};
pub use store::EntitlementStore;
