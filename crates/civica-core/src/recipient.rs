// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Birthday recipients and send batches.
//!
//! A [`Person`] comes from one of the program registries. When a send dialog
//! is composed, each selected person becomes a transient [`Recipient`] with
//! an age computed at the send date.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Minimum number of digits for a phone number WhatsApp can route.
const MIN_PHONE_DIGITS: usize = 8;

/// A beneficiary registered in one of the social programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "apellido")]
    pub surname: String,
    #[serde(rename = "telefono", default)]
    pub phone: Option<String>,
    #[serde(rename = "fechaNacimiento")]
    pub birth_date: NaiveDate,
    #[serde(rename = "modulo")]
    pub program: String,
    #[serde(rename = "entidad", default)]
    pub entity: Option<String>,
}

impl Person {
    /// Whole years completed on `on`.
    pub fn age_on(&self, on: NaiveDate) -> u32 {
        age_on(self.birth_date, on)
    }

    pub fn has_birthday_on(&self, on: NaiveDate) -> bool {
        is_birthday_on(self.birth_date, on)
    }
}

/// Recipient entry in a `POST /whatsapp/messages/send` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(rename = "personaId")]
    pub person_id: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "apellido")]
    pub surname: String,
    #[serde(rename = "telefono")]
    pub phone: String,
    #[serde(rename = "edad")]
    pub age: u32,
    #[serde(rename = "modulo")]
    pub program: String,
    #[serde(rename = "entidad", default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl Recipient {
    /// Build a recipient, or `None` when the person has no usable phone number.
    pub fn from_person(person: &Person, on: NaiveDate) -> Option<Self> {
        let phone = normalize_phone(person.phone.as_deref()?)?;
        Some(Self {
            person_id: person.id.clone(),
            name: person.name.clone(),
            surname: person.surname.clone(),
            phone,
            age: person.age_on(on),
            program: person.program.clone(),
            entity: person.entity.clone(),
        })
    }
}

/// Recipients ready to send plus the people left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientBatch {
    pub recipients: Vec<Recipient>,
    /// Ids of people skipped for lack of a usable phone number.
    pub skipped: Vec<String>,
}

impl RecipientBatch {
    pub fn from_people<'a>(people: impl IntoIterator<Item = &'a Person>, on: NaiveDate) -> Self {
        let mut batch = RecipientBatch::default();
        for person in people {
            match Recipient::from_person(person, on) {
                Some(recipient) => batch.recipients.push(recipient),
                None => batch.skipped.push(person.id.clone()),
            }
        }
        batch
    }

    /// People whose birthday falls on `on`.
    pub fn birthdays_on<'a>(people: impl IntoIterator<Item = &'a Person>, on: NaiveDate) -> Self {
        Self::from_people(people.into_iter().filter(|p| p.has_birthday_on(on)), on)
    }

    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }

    pub fn len(&self) -> usize {
        self.recipients.len()
    }
}

pub fn age_on(birth: NaiveDate, on: NaiveDate) -> u32 {
    if on < birth {
        return 0;
    }
    let mut years = on.year() - birth.year();
    if (on.month(), on.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

/// Feb 29 birthdays are celebrated on Feb 28 in non-leap years.
pub fn is_birthday_on(birth: NaiveDate, on: NaiveDate) -> bool {
    if birth.month() == 2 && birth.day() == 29 && !is_leap_year(on.year()) {
        return on.month() == 2 && on.day() == 28;
    }
    birth.month() == on.month() && birth.day() == on.day()
}

fn is_leap_year(year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

/// Strip separators, keeping a leading `+`. Returns `None` for too few digits.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < MIN_PHONE_DIGITS {
        return None;
    }
    if trimmed.starts_with('+') {
        Some(format!("+{digits}"))
    } else {
        Some(digits)
    }
}
