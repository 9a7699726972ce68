// # Notification Sink Implementations
//
// - `TracingSink`: writes each notification to the log
// - `ChannelSink`: forwards notifications to an in-process consumer

pub mod channel;
pub mod tracing_sink;

pub use channel::ChannelSink;
pub use tracing_sink::TracingSink;
