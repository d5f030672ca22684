//! MessagePusher implementations.

mod channel;

pub use channel::ChannelMessagePusher;
