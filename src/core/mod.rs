pub mod backoff;
pub mod classifier;
pub mod endpoint;
pub mod frame;
pub mod heartbeat;
pub mod machine;
pub mod notification_buffer;
pub mod toast;
pub mod types;
pub mod unread;
pub mod visibility;

pub use backoff::*;
pub use classifier::*;
pub use endpoint::*;
pub use frame::*;
pub use heartbeat::*;
pub use machine::*;
pub use notification_buffer::*;
pub use toast::*;
pub use types::*;
pub use unread::*;
pub use visibility::*;
