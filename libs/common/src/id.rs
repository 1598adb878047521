use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = flowdesk_common::id::prefixed_ulid("conv");
/// assert!(id.starts_with("conv_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// Well-known ID prefixes.
pub mod prefix {
    pub const CONVERSATION: &str = "conv";
    pub const CONNECTION: &str = "conn";
}
