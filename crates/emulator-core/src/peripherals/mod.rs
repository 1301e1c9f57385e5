//! Memory-mapped peripheral devices.

mod stdio;
mod ticks;

pub use stdio::StdioDevice;
pub use ticks::TicksDevice;
