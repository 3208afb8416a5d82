/// Error type for this crate.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum EvenpaceError {
    /// The configured rate cannot produce a valid spacing interval.
    ///
    /// Raised at construction/validation time; an instance is never built
    /// from an invalid rate.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),
}
