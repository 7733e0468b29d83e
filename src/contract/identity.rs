use std::fmt::{Display, Formatter};

/// Supplies the identity of whoever is calling into the contract.
///
/// Authorization is someone else's job; the identity is only recorded.
pub trait IdentityContext: Send + Sync {
    fn caller_id(&self) -> &str;
}

/// A caller identified by a plain string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(String);

impl Caller {
    /// Identity used when the caller did not say who they are.
    pub const ANONYMOUS: &'static str = "anonymous";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn anonymous() -> Self {
        Self::new(Self::ANONYMOUS)
    }
}

impl IdentityContext for Caller {
    fn caller_id(&self) -> &str {
        &self.0
    }
}

impl Display for Caller {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
