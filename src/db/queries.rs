use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{Appointment, AppointmentStatus, ChatIdentity, Customer};

fn now_str() -> String {
    Utc::now().naive_utc().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ── Customers ──

pub fn get_customer_by_chat_id(
    conn: &Connection,
    chat_id: &str,
) -> anyhow::Result<Option<Customer>> {
    let result = conn.query_row(
        "SELECT id, chat_id, username, first_name, last_name, created_at, updated_at
         FROM customers WHERE chat_id = ?1",
        params![chat_id],
        |row| Ok(parse_customer_row(row)),
    );

    match result {
        Ok(customer) => Ok(Some(customer?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn create_customer(conn: &Connection, identity: &ChatIdentity) -> anyhow::Result<Customer> {
    conn.execute(
        "INSERT INTO customers (chat_id, username, first_name, last_name)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            identity.chat_id,
            identity.username,
            identity.first_name,
            identity.last_name,
        ],
    )?;

    let id = conn.last_insert_rowid();
    tracing::info!(chat_id = %identity.chat_id, customer_id = id, "created customer");

    get_customer_by_chat_id(conn, &identity.chat_id)?
        .ok_or_else(|| anyhow::anyhow!("customer vanished after insert"))
}

pub fn get_or_create_customer(
    conn: &Connection,
    identity: &ChatIdentity,
) -> anyhow::Result<Customer> {
    match get_customer_by_chat_id(conn, &identity.chat_id)? {
        Some(customer) => Ok(customer),
        None => create_customer(conn, identity),
    }
}

fn parse_customer_row(row: &rusqlite::Row) -> anyhow::Result<Customer> {
    let created_at_str: String = row.get(5)?;
    let updated_at_str: String = row.get(6)?;

    Ok(Customer {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        username: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        created_at: parse_timestamp(&created_at_str),
        updated_at: parse_timestamp(&updated_at_str),
    })
}

// ── Appointments ──

/// Inserts a new pending appointment. Returns `None` when the active
/// slot uniqueness index rejects the `(date, time)` pair, i.e. a
/// concurrent booking won the slot between check and write.
pub fn create_appointment(
    conn: &Connection,
    customer_id: i64,
    date: NaiveDate,
    time: NaiveTime,
    notes: Option<&str>,
) -> anyhow::Result<Option<Appointment>> {
    let result = conn.execute(
        "INSERT INTO appointments (customer_id, date, time, notes, status)
         VALUES (?1, ?2, ?3, ?4, 'pending')",
        params![
            customer_id,
            date.format("%Y-%m-%d").to_string(),
            time.format("%H:%M").to_string(),
            notes,
        ],
    );

    match result {
        Ok(_) => {
            let id = conn.last_insert_rowid();
            Ok(get_appointment(conn, id)?)
        }
        Err(e) if is_constraint_violation(&e) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_appointment(conn: &Connection, id: i64) -> anyhow::Result<Option<Appointment>> {
    let result = conn.query_row(
        "SELECT id, customer_id, date, time, notes, status, created_at, updated_at
         FROM appointments WHERE id = ?1",
        params![id],
        |row| Ok(parse_appointment_row(row)),
    );

    match result {
        Ok(appointment) => Ok(Some(appointment?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Pending or confirmed appointments for one customer, soonest first.
pub fn list_active_appointments(
    conn: &Connection,
    customer_id: i64,
) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(
        "SELECT id, customer_id, date, time, notes, status, created_at, updated_at
         FROM appointments
         WHERE customer_id = ?1 AND status IN ('pending', 'confirmed')
         ORDER BY date ASC, time ASC",
    )?;

    let rows = stmt.query_map(params![customer_id], |row| Ok(parse_appointment_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

pub fn set_appointment_status(
    conn: &Connection,
    id: i64,
    status: AppointmentStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now_str(), id],
    )?;
    Ok(count > 0)
}

/// Start times of active appointments on a date, for the slot resolver.
pub fn active_times_on_date(conn: &Connection, date: NaiveDate) -> anyhow::Result<Vec<NaiveTime>> {
    let mut stmt = conn.prepare(
        "SELECT time FROM appointments
         WHERE date = ?1 AND status IN ('pending', 'confirmed')
         ORDER BY time ASC",
    )?;

    let rows = stmt.query_map(params![date.format("%Y-%m-%d").to_string()], |row| {
        row.get::<_, String>(0)
    })?;

    let mut times = vec![];
    for row in rows {
        let s = row?;
        if let Ok(t) = NaiveTime::parse_from_str(&s, "%H:%M") {
            times.push(t);
        }
    }
    Ok(times)
}

/// Moves an appointment to a new slot in one transaction: the new
/// pending appointment is created first, the old one is cancelled,
/// and both commit together. If the new slot is taken (`None`) or the
/// cancel fails, the transaction rolls back and the old appointment
/// stays active — the customer is never left without a booking.
pub fn reschedule_appointment(
    conn: &mut Connection,
    old_id: i64,
    customer_id: i64,
    date: NaiveDate,
    time: NaiveTime,
    notes: Option<&str>,
) -> anyhow::Result<Option<Appointment>> {
    let tx = conn.transaction()?;

    let inserted = tx.execute(
        "INSERT INTO appointments (customer_id, date, time, notes, status)
         VALUES (?1, ?2, ?3, ?4, 'pending')",
        params![
            customer_id,
            date.format("%Y-%m-%d").to_string(),
            time.format("%H:%M").to_string(),
            notes,
        ],
    );

    let new_id = match inserted {
        Ok(_) => tx.last_insert_rowid(),
        Err(e) if is_constraint_violation(&e) => {
            tx.rollback()?;
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    tx.execute(
        "UPDATE appointments SET status = 'cancelled', updated_at = ?1 WHERE id = ?2",
        params![now_str(), old_id],
    )?;

    let new_appointment = tx
        .query_row(
            "SELECT id, customer_id, date, time, notes, status, created_at, updated_at
             FROM appointments WHERE id = ?1",
            params![new_id],
            |row| Ok(parse_appointment_row(row)),
        )
        .map_err(anyhow::Error::from)??;

    tx.commit()?;
    Ok(Some(new_appointment))
}

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let date_str: String = row.get(2)?;
    let time_str: String = row.get(3)?;
    let status_str: String = row.get(5)?;
    let created_at_str: String = row.get(6)?;
    let updated_at_str: String = row.get(7)?;

    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
        .unwrap_or_else(|_| Utc::now().date_naive());
    let time = NaiveTime::parse_from_str(&time_str, "%H:%M")
        .unwrap_or_else(|_| NaiveTime::from_hms_opt(0, 0, 0).unwrap());

    Ok(Appointment {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        date,
        time,
        notes: row.get(4)?,
        status: AppointmentStatus::parse(&status_str),
        created_at: parse_timestamp(&created_at_str),
        updated_at: parse_timestamp(&updated_at_str),
    })
}

fn parse_timestamp(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .unwrap_or_else(|_| Utc::now().naive_utc())
}

// ── Message log ──

/// Best-effort conversation log. Callers are expected to tolerate
/// failure; a lost log line never aborts a turn.
pub fn record_message(
    conn: &Connection,
    customer_id: Option<i64>,
    role: &str,
    content: &str,
    metadata: Option<&serde_json::Value>,
) -> anyhow::Result<()> {
    let metadata_json = metadata.map(|m| m.to_string());
    conn.execute(
        "INSERT INTO messages (customer_id, role, content, metadata) VALUES (?1, ?2, ?3, ?4)",
        params![customer_id, role, content, metadata_json],
    )?;
    Ok(())
}
