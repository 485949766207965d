// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message and recipient builders for tests.

use chrono::{DateTime, TimeZone, Utc};
use civica_core::{Message, MessageId, MessageStatus, Recipient};

/// A fixed instant so assertions on timestamps stay deterministic.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0)
        .single()
        .unwrap_or_default()
}

/// A message in `status` with only the required fields filled.
pub fn message(id: &str, status: MessageStatus) -> Message {
    Message {
        id: MessageId::from(id),
        name: format!("Nombre {id}"),
        surname: "Prueba".to_string(),
        phone: "+5491100000000".to_string(),
        age: Some(70),
        program: Some("adultos_mayores".to_string()),
        entity: None,
        status,
        status_message: None,
        created_at: Some(base_time()),
        sent_at: None,
        delivered_at: None,
        read_at: None,
        replied_at: None,
        reply_content: None,
    }
}

pub fn recipient(person_id: &str, phone: &str) -> Recipient {
    Recipient {
        person_id: person_id.to_string(),
        name: format!("Nombre {person_id}"),
        surname: "Prueba".to_string(),
        phone: phone.to_string(),
        age: 70,
        program: "adultos_mayores".to_string(),
        entity: Some("Centro Norte".to_string()),
    }
}
