/// Caller-supplied policy for one window's SDK instance.
#[derive(Debug, Clone, Default)]
pub struct SdkConfig {
    /// Origin prefixes (beyond the window's own origin) whose messages the
    /// bus accepts. Empty means same-origin only.
    pub allowed_origins: Vec<String>,
}

impl SdkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_origin(mut self, prefix: impl Into<String>) -> Self {
        self.allowed_origins.push(prefix.into());
        self
    }
}
