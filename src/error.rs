/// Errors from operations that need a live managed object.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    /// The handle was default-constructed and owns nothing.
    #[error("handle does not own an object")]
    Empty,
    /// Every strong reference is gone, so a weak reference cannot be promoted.
    #[error("managed object has already been released")]
    Expired,
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
