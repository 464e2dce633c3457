// HTSP 协议边界：消息模型、传输接口、编解码器查表、订阅事件解码

pub mod message;
pub mod transport;
pub mod codec;
pub mod events;
pub mod scripted;

pub use message::{Binary, HtsField, HtsMsg};
pub use scripted::ScriptedTransport;
pub use transport::{ConnectionListener, Transport};
pub use codec::{CodecLookup, DefaultCodecTable};
pub use events::SubscriptionEvent;
