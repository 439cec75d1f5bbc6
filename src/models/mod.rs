pub mod appointment;
pub mod conversation;
pub mod customer;
pub mod intent;
pub mod slot;

pub use appointment::{Appointment, AppointmentStatus};
pub use conversation::{ConversationState, ConversationTurn, PendingAction};
pub use customer::{ChatIdentity, Customer};
pub use intent::{Intent, IntentAction, IntentKind};
pub use slot::Slot;
