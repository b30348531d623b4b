//! Background [`Task`]s definitions.

mod background;
pub mod dispatch_notifications;
pub mod expire_agreements;

pub use common::Handler as Task;

pub use self::{
    background::Background, dispatch_notifications::DispatchNotifications,
    expire_agreements::ExpireAgreements,
};
