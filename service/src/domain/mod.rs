//! Domain definitions.

pub mod agreement;
pub mod audit;
pub mod lease;
pub mod notification;
pub mod user;

pub use self::{
    agreement::Agreement, lease::Lease, notification::Notification, user::User,
};
