use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::Connection;

use crate::config::AppConfig;
use crate::db::queries;
use crate::models::{
    Appointment, AppointmentStatus, ChatIdentity, ConversationState, Customer, Intent, IntentKind,
    PendingAction,
};
use crate::services::scheduling::{self, BusinessHours};

/// At most this many alternative slots are suggested when the
/// requested one is taken.
const MAX_ALTERNATIVES: usize = 5;

/// Knobs the state machine consults on every turn. The office-hours
/// check is one flag applied uniformly to booking, rescheduling and
/// availability.
pub struct BookingPolicy {
    pub hours: BusinessHours,
    pub enforce_hours: bool,
    pub confidence_threshold: f64,
}

impl BookingPolicy {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self {
            hours: BusinessHours::from_config(config)?,
            enforce_hours: config.enforce_business_hours,
            confidence_threshold: config.confidence_threshold,
        })
    }
}

/// Why a turn was refused. Carried on [`TurnOutcome::Rejected`] so
/// callers and tests can branch on the cause without parsing reply
/// text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    InvalidFormat,
    PastDateTime,
    PastDate,
    ClosedDay,
    OutsideHours,
    SlotUnavailable,
    AlreadyCancelled,
    AlreadyFinalized,
    Unauthorized,
    CustomerNotFound,
    AppointmentNotFound,
    LowConfidence,
}

#[derive(Debug)]
pub enum TurnOutcome {
    Booked(Appointment),
    Rescheduled { old_id: i64, new: Appointment },
    Cancelled(i64),
    SlotsListed { free: usize },
    AppointmentsListed(usize),
    Clarification,
    Rejected(Rejection),
    Smalltalk,
}

/// One user-facing message plus what happened. Every branch of the
/// state machine produces exactly one of these; clarification and
/// rejection branches never mutate the store.
#[derive(Debug)]
pub struct TurnReply {
    pub text: String,
    pub outcome: TurnOutcome,
}

impl TurnReply {
    fn new(text: impl Into<String>, outcome: TurnOutcome) -> Self {
        Self {
            text: text.into(),
            outcome,
        }
    }
}

/// Drives one normalized intent through the conversation state
/// machine. `now` is injected so the future/past checks are
/// deterministic under test.
///
/// All session mutations are staged on a scratch copy and committed
/// only once the store work has succeeded, so a failed turn leaves
/// the conversation state exactly as it was before the turn.
pub fn handle_intent(
    conn: &mut Connection,
    policy: &BookingPolicy,
    sender: &ChatIdentity,
    state: &mut ConversationState,
    intent: &Intent,
    now: NaiveDateTime,
) -> anyhow::Result<TurnReply> {
    let mut staged = state.clone();
    let reply = dispatch(conn, policy, sender, &mut staged, intent, now)?;
    staged.last_intent = Some(intent.kind);
    *state = staged;
    Ok(reply)
}

fn dispatch(
    conn: &mut Connection,
    policy: &BookingPolicy,
    sender: &ChatIdentity,
    state: &mut ConversationState,
    intent: &Intent,
    now: NaiveDateTime,
) -> anyhow::Result<TurnReply> {
    // The oracle's hint is advisory; confidence gating is ours.
    if intent.confidence < policy.confidence_threshold {
        let text = intent.user_message.clone().unwrap_or_else(|| {
            "I'm not quite sure what you'd like to do. Could you please rephrase? \
             I can help you book, check availability, reschedule, or cancel appointments."
                .to_string()
        });
        return Ok(TurnReply::new(text, TurnOutcome::Rejected(Rejection::LowConfidence)));
    }

    // A pending clarification consumes the turn when the awaited
    // datum finally arrived, whatever kind the oracle guessed.
    if let Some(reply) = continue_pending(conn, policy, sender, state, intent, now)? {
        return Ok(reply);
    }

    match intent.kind {
        IntentKind::BookAppointment => handle_book(conn, policy, sender, state, intent, now),
        IntentKind::CheckAvailability => handle_check_availability(conn, policy, intent, now),
        IntentKind::RescheduleAppointment => {
            handle_reschedule(conn, policy, sender, state, intent, now)
        }
        IntentKind::CancelAppointment => handle_cancel(conn, sender, state, intent),
        IntentKind::Smalltalk => Ok(handle_smalltalk(intent)),
    }
}

fn continue_pending(
    conn: &mut Connection,
    policy: &BookingPolicy,
    sender: &ChatIdentity,
    state: &mut ConversationState,
    intent: &Intent,
    now: NaiveDateTime,
) -> anyhow::Result<Option<TurnReply>> {
    let Some(pending) = state.pending_action.clone() else {
        return Ok(None);
    };

    match pending {
        PendingAction::AwaitingRescheduleSelection => {
            if let Some(id) = intent.appointment_id {
                return reschedule_with_id(conn, policy, sender, state, intent, id, now).map(Some);
            }
        }
        PendingAction::AwaitingCancelSelection => {
            if let Some(id) = intent.appointment_id {
                return cancel_with_id(conn, sender, state, id).map(Some);
            }
        }
        PendingAction::AwaitingNewDateTime { appointment_id } => {
            if intent.requested_date.is_some() || intent.requested_time.is_some() {
                return reschedule_with_id(conn, policy, sender, state, intent, appointment_id, now)
                    .map(Some);
            }
        }
    }

    Ok(None)
}

// ── Booking ──

fn handle_book(
    conn: &mut Connection,
    policy: &BookingPolicy,
    sender: &ChatIdentity,
    state: &mut ConversationState,
    intent: &Intent,
    now: NaiveDateTime,
) -> anyhow::Result<TurnReply> {
    // A fresh booking replaces whatever operation was in flight.
    state.clear_pending();

    let mut missing = vec![];
    if intent.requested_date.is_none() {
        missing.push("date");
    }
    if intent.requested_time.is_none() {
        missing.push("time");
    }
    if !missing.is_empty() {
        let hint = intent
            .user_message
            .as_deref()
            .unwrap_or("Please provide the missing details.");
        let text = format!(
            "To book your appointment, I need the following information: {}. {hint}",
            missing.join(", ")
        );
        return Ok(TurnReply::new(text, TurnOutcome::Clarification));
    }

    let (date, time) = match validate_datetime(
        policy,
        intent.requested_date.as_deref().unwrap_or_default(),
        intent.requested_time.as_deref().unwrap_or_default(),
        now,
    ) {
        Ok(parsed) => parsed,
        Err(reply) => return Ok(reply),
    };

    let customer = resolve_or_create_customer(conn, sender, state)?;
    let notes = effective_notes(intent);

    match book_slot(conn, policy, customer.id, date, time, notes.as_deref())? {
        BookingAttempt::Booked(appointment) => {
            let text = format!(
                "✅ Your appointment has been booked!\n\n{}\n\n\
                 If you need to reschedule or cancel, just let me know!",
                confirmation_block(&appointment)
            );
            Ok(TurnReply::new(text, TurnOutcome::Booked(appointment)))
        }
        BookingAttempt::Unavailable { alternatives } => {
            Ok(slot_unavailable_reply(date, time, &alternatives))
        }
    }
}

enum BookingAttempt {
    Booked(Appointment),
    Unavailable { alternatives: Vec<NaiveTime> },
}

/// Availability check, then creation. The check is UX; the store's
/// uniqueness index settles races, surfacing as a conflict that we
/// report exactly like an unavailable slot.
fn book_slot(
    conn: &Connection,
    policy: &BookingPolicy,
    customer_id: i64,
    date: NaiveDate,
    time: NaiveTime,
    notes: Option<&str>,
) -> anyhow::Result<BookingAttempt> {
    if !scheduling::is_available(conn, &policy.hours, date, time)? {
        return Ok(BookingAttempt::Unavailable {
            alternatives: free_times(conn, policy, date)?,
        });
    }

    match queries::create_appointment(conn, customer_id, date, time, notes)? {
        Some(appointment) => Ok(BookingAttempt::Booked(appointment)),
        None => Ok(BookingAttempt::Unavailable {
            alternatives: free_times(conn, policy, date)?,
        }),
    }
}

fn free_times(
    conn: &Connection,
    policy: &BookingPolicy,
    date: NaiveDate,
) -> anyhow::Result<Vec<NaiveTime>> {
    Ok(scheduling::available_slots(conn, &policy.hours, date)?
        .into_iter()
        .filter(|s| s.available)
        .map(|s| s.time)
        .take(MAX_ALTERNATIVES)
        .collect())
}

fn slot_unavailable_reply(date: NaiveDate, time: NaiveTime, alternatives: &[NaiveTime]) -> TurnReply {
    let slots_text = if alternatives.is_empty() {
        "  No slots available".to_string()
    } else {
        alternatives
            .iter()
            .map(|t| format!("  • {}", t.format("%H:%M")))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let text = format!(
        "Unfortunately, {} on {} is not available.\n\n\
         Available times on that day:\n{slots_text}\n\n\
         Would you like to book one of these times instead?",
        time.format("%H:%M"),
        date.format("%B %d, %Y"),
    );
    TurnReply::new(text, TurnOutcome::Rejected(Rejection::SlotUnavailable))
}

// ── Availability ──

fn handle_check_availability(
    conn: &mut Connection,
    policy: &BookingPolicy,
    intent: &Intent,
    now: NaiveDateTime,
) -> anyhow::Result<TurnReply> {
    let Some(date_str) = intent.requested_date.as_deref() else {
        return Ok(TurnReply::new(
            "Which date would you like to check availability for? \
             You can say something like 'tomorrow', 'next Monday', or 'December 15th'.",
            TurnOutcome::Clarification,
        ));
    };

    let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") else {
        return Ok(TurnReply::new(
            "I couldn't understand that date. \
             Please provide a valid date like 'tomorrow' or 'December 15th'.",
            TurnOutcome::Rejected(Rejection::InvalidFormat),
        ));
    };

    if date < now.date() {
        return Ok(TurnReply::new(
            "That date has already passed. Please choose a future date.",
            TurnOutcome::Rejected(Rejection::PastDate),
        ));
    }

    if policy.enforce_hours && !policy.hours.is_open_day(date) {
        let text = format!(
            "{} is outside our working days. We're open {}. \
             Would you like to check another day?",
            date.format("%A, %B %d"),
            policy.hours.describe_days(),
        );
        return Ok(TurnReply::new(text, TurnOutcome::Rejected(Rejection::ClosedDay)));
    }

    let free: Vec<NaiveTime> = scheduling::available_slots(conn, &policy.hours, date)?
        .into_iter()
        .filter(|s| s.available)
        .map(|s| s.time)
        .collect();

    if free.is_empty() {
        let text = format!(
            "Unfortunately, there are no available slots on {}.\n\n\
             Would you like to check a different date?",
            date.format("%A, %B %d, %Y"),
        );
        return Ok(TurnReply::new(text, TurnOutcome::SlotsListed { free: 0 }));
    }

    let (morning, afternoon, late) = partition_slots(&free);
    let mut parts = vec![format!(
        "📅 Available times for {}:\n",
        date.format("%A, %B %d, %Y")
    )];
    if !morning.is_empty() {
        parts.push(format!("🌅 Morning: {}", join_times(&morning)));
    }
    if !afternoon.is_empty() {
        parts.push(format!("☀️ Afternoon: {}", join_times(&afternoon)));
    }
    if !late.is_empty() {
        parts.push(format!("🌆 Late Afternoon: {}", join_times(&late)));
    }
    parts.push("\nWould you like to book one of these times?".to_string());

    Ok(TurnReply::new(
        parts.join("\n"),
        TurnOutcome::SlotsListed { free: free.len() },
    ))
}

/// Display grouping only; availability itself ignores these bounds.
fn partition_slots(times: &[NaiveTime]) -> (Vec<NaiveTime>, Vec<NaiveTime>, Vec<NaiveTime>) {
    let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
    let mid_afternoon = NaiveTime::from_hms_opt(15, 0, 0).unwrap();

    let mut morning = vec![];
    let mut afternoon = vec![];
    let mut late = vec![];
    for &t in times {
        if t < noon {
            morning.push(t);
        } else if t < mid_afternoon {
            afternoon.push(t);
        } else {
            late.push(t);
        }
    }
    (morning, afternoon, late)
}

fn join_times(times: &[NaiveTime]) -> String {
    times
        .iter()
        .map(|t| t.format("%H:%M").to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Rescheduling ──

fn handle_reschedule(
    conn: &mut Connection,
    policy: &BookingPolicy,
    sender: &ChatIdentity,
    state: &mut ConversationState,
    intent: &Intent,
    now: NaiveDateTime,
) -> anyhow::Result<TurnReply> {
    let Some(customer) = resolve_customer(conn, sender, state)? else {
        return Ok(customer_not_found_reply());
    };

    let Some(id) = intent.appointment_id else {
        let appointments = queries::list_active_appointments(conn, customer.id)?;
        if appointments.is_empty() {
            state.clear_pending();
            return Ok(TurnReply::new(
                "You don't have any upcoming appointments to reschedule. \
                 Would you like to book a new appointment instead?",
                TurnOutcome::AppointmentsListed(0),
            ));
        }

        // Remember any date/time already given so the user only has
        // to pick the appointment next turn.
        state.clear_pending();
        if let Some(d) = &intent.requested_date {
            state.set_context("pending_date", serde_json::json!(d));
        }
        if let Some(t) = &intent.requested_time {
            state.set_context("pending_time", serde_json::json!(t));
        }
        state.pending_action = Some(PendingAction::AwaitingRescheduleSelection);

        let text = format!(
            "Which appointment would you like to reschedule?\n\n{}\n\n\
             Please reply with the confirmation number (e.g., #123).",
            numbered_list(&appointments),
        );
        return Ok(TurnReply::new(text, TurnOutcome::AppointmentsListed(appointments.len())));
    };

    reschedule_with_id(conn, policy, sender, state, intent, id, now)
}

fn reschedule_with_id(
    conn: &mut Connection,
    policy: &BookingPolicy,
    sender: &ChatIdentity,
    state: &mut ConversationState,
    intent: &Intent,
    id: i64,
    now: NaiveDateTime,
) -> anyhow::Result<TurnReply> {
    let Some(customer) = resolve_customer(conn, sender, state)? else {
        return Ok(customer_not_found_reply());
    };

    let Some(appointment) = load_owned_appointment(conn, &customer, id)? else {
        return Ok(appointment_refusal(conn, &customer, id)?);
    };

    if !appointment.status.is_active() {
        state.clear_pending();
        let text = format!(
            "Appointment #{id} is already {} and can't be rescheduled. \
             Would you like to book a new appointment instead?",
            appointment.status.as_str(),
        );
        return Ok(TurnReply::new(text, TurnOutcome::Rejected(Rejection::AlreadyFinalized)));
    }

    let date_str = intent
        .requested_date
        .clone()
        .or_else(|| state.context_str("pending_date").map(str::to_string));
    let time_str = intent
        .requested_time
        .clone()
        .or_else(|| state.context_str("pending_time").map(str::to_string));

    let (date, time) = match (date_str, time_str) {
        (Some(date_str), Some(time_str)) => {
            match validate_datetime(policy, &date_str, &time_str, now) {
                Ok(parsed) => parsed,
                Err(reply) => return Ok(reply),
            }
        }
        (date_str, time_str) => {
            // Surface the current booking and wait for the new slot.
            state.pending_action = Some(PendingAction::AwaitingNewDateTime { appointment_id: id });
            if let Some(d) = date_str {
                state.set_context("pending_date", serde_json::json!(d));
            }
            if let Some(t) = time_str {
                state.set_context("pending_time", serde_json::json!(t));
            }
            let text = format!(
                "I found your appointment on {} at {}.\n\n\
                 What date and time would you like to reschedule it to?",
                appointment.date.format("%A, %B %d, %Y"),
                appointment.time.format("%H:%M"),
            );
            return Ok(TurnReply::new(text, TurnOutcome::Clarification));
        }
    };

    if !scheduling::is_available(conn, &policy.hours, date, time)? {
        state.pending_action = Some(PendingAction::AwaitingNewDateTime { appointment_id: id });
        return Ok(slot_unavailable_reply(date, time, &free_times(conn, policy, date)?));
    }

    let notes = effective_notes(intent).or_else(|| appointment.notes.clone());
    match queries::reschedule_appointment(conn, id, customer.id, date, time, notes.as_deref())? {
        Some(new) => {
            state.clear_pending();
            let text = format!(
                "✅ Your appointment has been rescheduled!\n\n\
                 Old appointment (#{id}) has been cancelled.\n{}",
                confirmation_block(&new),
            );
            Ok(TurnReply::new(text, TurnOutcome::Rescheduled { old_id: id, new }))
        }
        None => {
            // Lost the slot between check and write; the old booking
            // is still active.
            state.pending_action = Some(PendingAction::AwaitingNewDateTime { appointment_id: id });
            Ok(slot_unavailable_reply(date, time, &free_times(conn, policy, date)?))
        }
    }
}

// ── Cancellation ──

fn handle_cancel(
    conn: &mut Connection,
    sender: &ChatIdentity,
    state: &mut ConversationState,
    intent: &Intent,
) -> anyhow::Result<TurnReply> {
    let Some(customer) = resolve_customer(conn, sender, state)? else {
        return Ok(customer_not_found_reply());
    };

    let Some(id) = intent.appointment_id else {
        let appointments = queries::list_active_appointments(conn, customer.id)?;
        if appointments.is_empty() {
            state.clear_pending();
            return Ok(TurnReply::new(
                "You don't have any upcoming appointments to cancel.",
                TurnOutcome::AppointmentsListed(0),
            ));
        }

        state.clear_pending();
        state.pending_action = Some(PendingAction::AwaitingCancelSelection);
        let text = format!(
            "Which appointment would you like to cancel?\n\n{}\n\n\
             Please reply with the confirmation number (e.g., #123).",
            numbered_list(&appointments),
        );
        return Ok(TurnReply::new(text, TurnOutcome::AppointmentsListed(appointments.len())));
    };

    cancel_with_id(conn, sender, state, id)
}

fn cancel_with_id(
    conn: &mut Connection,
    sender: &ChatIdentity,
    state: &mut ConversationState,
    id: i64,
) -> anyhow::Result<TurnReply> {
    let Some(customer) = resolve_customer(conn, sender, state)? else {
        return Ok(customer_not_found_reply());
    };

    let Some(appointment) = load_owned_appointment(conn, &customer, id)? else {
        return Ok(appointment_refusal(conn, &customer, id)?);
    };

    match appointment.status {
        AppointmentStatus::Cancelled => {
            state.clear_pending();
            Ok(TurnReply::new(
                format!("Appointment #{id} has already been cancelled."),
                TurnOutcome::Rejected(Rejection::AlreadyCancelled),
            ))
        }
        AppointmentStatus::Completed => {
            state.clear_pending();
            Ok(TurnReply::new(
                format!("Appointment #{id} is already completed and can no longer be cancelled."),
                TurnOutcome::Rejected(Rejection::AlreadyFinalized),
            ))
        }
        _ => {
            queries::set_appointment_status(conn, id, AppointmentStatus::Cancelled)?;
            state.clear_pending();
            let text = format!(
                "✅ Your appointment has been cancelled.\n\n\
                 Cancelled appointment:\n📅 Date: {}\n🕒 Time: {}\n📝 Confirmation ID: #{id}\n\n\
                 If you'd like to book a new appointment, just let me know!",
                appointment.date.format("%A, %B %d, %Y"),
                appointment.time.format("%H:%M"),
            );
            Ok(TurnReply::new(text, TurnOutcome::Cancelled(id)))
        }
    }
}

// ── Smalltalk ──

fn handle_smalltalk(intent: &Intent) -> TurnReply {
    let text = intent.user_message.clone().unwrap_or_else(|| {
        "I'm here to help you with appointments! You can book, check availability, \
         reschedule, or cancel appointments."
            .to_string()
    });
    TurnReply::new(text, TurnOutcome::Smalltalk)
}

// ── Shared helpers ──

fn validate_datetime(
    policy: &BookingPolicy,
    date_str: &str,
    time_str: &str,
    now: NaiveDateTime,
) -> Result<(NaiveDate, NaiveTime), TurnReply> {
    let parsed_date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d");
    let parsed_time = NaiveTime::parse_from_str(time_str, "%H:%M");

    let (Ok(date), Ok(time)) = (parsed_date, parsed_time) else {
        return Err(TurnReply::new(
            "The date or time format appears to be invalid. \
             Please provide the date (e.g., 'December 15' or '2025-12-15') \
             and time (e.g., '2:00 PM' or '14:00').",
            TurnOutcome::Rejected(Rejection::InvalidFormat),
        ));
    };

    if date.and_time(time) <= now {
        return Err(TurnReply::new(
            "The requested time has already passed. Please choose a future date and time.",
            TurnOutcome::Rejected(Rejection::PastDateTime),
        ));
    }

    if policy.enforce_hours {
        if !policy.hours.is_open_day(date) {
            return Err(TurnReply::new(
                format!(
                    "We're only open {}. Please choose one of those days for your appointment.",
                    policy.hours.describe_days(),
                ),
                TurnOutcome::Rejected(Rejection::ClosedDay),
            ));
        }
        if !policy.hours.contains(time) {
            return Err(TurnReply::new(
                format!(
                    "Our business hours are {} to {}. Please choose a time within these hours.",
                    policy.hours.open.format("%H:%M"),
                    policy.hours.close.format("%H:%M"),
                ),
                TurnOutcome::Rejected(Rejection::OutsideHours),
            ));
        }
    }

    Ok((date, time))
}

fn resolve_or_create_customer(
    conn: &Connection,
    sender: &ChatIdentity,
    state: &mut ConversationState,
) -> anyhow::Result<Customer> {
    let customer = queries::get_or_create_customer(conn, sender)?;
    state.customer_id = Some(customer.id);
    Ok(customer)
}

/// Resolution without creation, for operations on existing bookings.
fn resolve_customer(
    conn: &Connection,
    sender: &ChatIdentity,
    state: &mut ConversationState,
) -> anyhow::Result<Option<Customer>> {
    let customer = queries::get_customer_by_chat_id(conn, &sender.chat_id)?;
    if let Some(c) = &customer {
        state.customer_id = Some(c.id);
    }
    Ok(customer)
}

fn customer_not_found_reply() -> TurnReply {
    TurnReply::new(
        "I couldn't find your customer record. \
         Have you booked with us before? You can book a new appointment any time.",
        TurnOutcome::Rejected(Rejection::CustomerNotFound),
    )
}

/// Loads the appointment only when it exists and belongs to the
/// requesting customer; `None` means the caller must refuse.
fn load_owned_appointment(
    conn: &Connection,
    customer: &Customer,
    id: i64,
) -> anyhow::Result<Option<Appointment>> {
    Ok(queries::get_appointment(conn, id)?.filter(|a| a.customer_id == customer.id))
}

/// Chooses between not-found and unauthorized without leaking the
/// other customer's booking. The distinction is logged, not told.
fn appointment_refusal(
    conn: &Connection,
    customer: &Customer,
    id: i64,
) -> anyhow::Result<TurnReply> {
    if let Some(foreign) = queries::get_appointment(conn, id)? {
        tracing::warn!(
            customer_id = customer.id,
            appointment_id = id,
            owner_id = foreign.customer_id,
            "refused access to another customer's appointment"
        );
        return Ok(TurnReply::new(
            "That appointment doesn't belong to you. \
             Please provide your own appointment details.",
            TurnOutcome::Rejected(Rejection::Unauthorized),
        ));
    }

    Ok(TurnReply::new(
        format!(
            "I couldn't find appointment #{id}. \
             Please check the confirmation number and try again."
        ),
        TurnOutcome::Rejected(Rejection::AppointmentNotFound),
    ))
}

fn numbered_list(appointments: &[Appointment]) -> String {
    appointments
        .iter()
        .enumerate()
        .map(|(i, a)| format!("  {}. {}", i + 1, a.summary_line()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn confirmation_block(appointment: &Appointment) -> String {
    format!(
        "📅 Date: {}\n🕒 Time: {}\n📝 Confirmation ID: #{}",
        appointment.date.format("%A, %B %d, %Y"),
        appointment.time.format("%H:%M"),
        appointment.id,
    )
}

fn effective_notes(intent: &Intent) -> Option<String> {
    intent
        .notes
        .clone()
        .or_else(|| intent.service_type.as_ref().map(|s| format!("Service: {s}")))
}
