use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// One candidate booking interval within business hours, with
/// availability computed against active appointments on that date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub time: NaiveTime,
    pub available: bool,
}
