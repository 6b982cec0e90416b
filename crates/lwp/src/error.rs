use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LwpError {
    #[error("failed to map a {size} byte thread stack")]
    StackAllocation {
        size: usize,
        #[source]
        source: io::Error,
    },

    #[error("invalid stack size {0}")]
    InvalidStackSize(usize),
}

pub type Result<T> = std::result::Result<T, LwpError>;
