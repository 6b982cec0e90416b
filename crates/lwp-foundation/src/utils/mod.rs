pub mod stack;

pub use stack::{DownwardStack, FRAME_ALIGN};
