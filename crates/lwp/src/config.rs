use derive_builder::Builder;

/// Fallback stack size when the stack rlimit is unlimited or unset.
pub const DEFAULT_STACK_SIZE: usize = 8 * 1024 * 1024;

/// Runtime settings, read each time a thread is created.
#[derive(Clone, Debug, PartialEq, Eq, Builder)]
#[builder(default, build_fn(validate = "Self::validate"))]
pub struct LwpConfig {
    /// Fixed size for every new stack. `None` follows the soft stack rlimit.
    #[builder(setter(strip_option))]
    pub stack_size: Option<usize>,
    /// Used when the rlimit gives no usable answer.
    pub default_stack_size: usize,
}

impl Default for LwpConfig {
    fn default() -> Self {
        Self {
            stack_size: None,
            default_stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl LwpConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(Some(0)) = self.stack_size {
            return Err("stack_size must be non-zero".into());
        }
        if let Some(0) = self.default_stack_size {
            return Err("default_stack_size must be non-zero".into());
        }
        Ok(())
    }
}
