//! 流处理：增量累加（还原完整内容）与多路复用（合成单条输出流）

pub mod accumulator;
pub mod multiplexer;

pub use accumulator::{Accumulated, DeltaAccumulator};
pub use multiplexer::{Multiplexer, SEARCH_STATUS_MARKER, THINK_CLOSE, THINK_OPEN};
