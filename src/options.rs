//! Runtime configuration.

/// Compiler and diagnostics settings for one [`Vm`](crate::Vm).
///
/// ```ignore
/// let options = Options::default().prefix("x-").delimiters("[[", "]]");
/// let vm = Vm::with_options(document, root, model, options)?;
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    /// Attribute prefix marking a directive.
    pub prefix: String,
    /// Opening interpolation delimiter.
    pub open: String,
    /// Closing interpolation delimiter.
    pub close: String,
    /// Also emit warnings through `log::warn!`.
    pub log_warnings: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            prefix: "v-".to_string(),
            open: "{{".to_string(),
            close: "}}".to_string(),
            log_warnings: true,
        }
    }
}

impl Options {
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn delimiters(mut self, open: impl Into<String>, close: impl Into<String>) -> Self {
        self.open = open.into();
        self.close = close.into();
        self
    }

    pub fn log_warnings(mut self, enabled: bool) -> Self {
        self.log_warnings = enabled;
        self
    }
}
