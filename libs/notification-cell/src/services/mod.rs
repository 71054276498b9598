pub mod dispatch;
pub mod email;
pub mod notification;
pub mod sms;

pub use dispatch::{spawn_dispatcher, DispatchHandle};
pub use notification::NotificationService;
