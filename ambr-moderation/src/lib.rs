pub mod safety;

pub use safety::SafetyDesk;
