pub mod assembler;
pub mod decoder;
pub mod event;
pub mod pump;

pub use assembler::{AssemblyState, DeltaAssembler, EndOfStreamPolicy, RecoveryLimits};
pub use decoder::StreamFrameDecoder;
pub use event::{AssembledMessage, ChatEvent};
pub use pump::{ChatSubscription, pump};
