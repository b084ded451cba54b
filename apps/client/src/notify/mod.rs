pub mod alerts;
pub mod dispatcher;

pub use alerts::{Alert, AlertCenter, ACTIVITY_ALERT_DURATION, MESSAGE_ALERT_DURATION};
pub use dispatcher::{DeleteTarget, NotificationDispatcher, NotificationSnapshot, ReadTarget};
