pub mod ai;
pub mod booking;
pub mod conversation;
pub mod messaging;
pub mod scheduling;
pub mod session;
