use crate::hl7::timestamp::compact_date;
use crate::hl7::{Hl7Error, Message, Segment, COMPONENT_SEPARATOR, ENCODING_CHARACTERS};
use serde::Deserialize;
use crate::types::Gender;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// LOINC code of a consultation note.
pub const CONSULT_NOTE_CODE: &str = "11488-4^Consult note";
/// LOINC code of the body temperature.
pub const BODY_TEMPERATURE_CODE: &str = "8310-5^";
/// LOINC code of the body weight.
pub const BODY_WEIGHT_CODE: &str = "3141-9^";

/// MSH-3 to MSH-6.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageRouting {
	pub sending_application: String,
	pub sending_facility: String,
	pub receiving_application: String,
	pub receiving_facility: String,
}

impl Default for MessageRouting {
	fn default() -> Self {
		Self {
			sending_application: String::from("LINFO2381"),
			sending_facility: String::from("JavaScript"),
			receiving_application: String::from("STUDENT"),
			receiving_facility: String::from("Python"),
		}
	}
}

/// Patient registration (`ADT^A04`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
	pub custom_id: String,
	pub family_name: String,
	pub given_name: String,
	/// `YYYY-MM-DD`
	pub birth_date: String,
	pub gender: Gender,
}

/// Free-text consultation note (`ORU^R01`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClinicalNote {
	pub custom_id: String,
	pub text: String,
}

/// Vital signs (`ORU^R01`). Values are sent as typed, at least one must be present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vitals {
	pub custom_id: String,
	pub temperature: Option<String>,
	pub weight: Option<String>,
}

/// Builds the messages of one session. Every message gets the next message control id,
/// starting at `MSG_ID_1`.
#[derive(Debug, Default)]
pub struct Composer {
	routing: MessageRouting,
	sequence: AtomicU64,
}

impl Composer {
	pub const fn new(routing: MessageRouting) -> Self {
		Self {
			routing,
			sequence: AtomicU64::new(0),
		}
	}

	/// Number of messages composed so far.
	pub fn composed(&self) -> u64 {
		self.sequence.load(Ordering::SeqCst)
	}

	fn next_message_id(&self) -> u64 {
		self.sequence.fetch_add(1, Ordering::SeqCst) + 1
	}

	/// The MSH segment. Consumes one message id.
	pub fn header(&self, message_type: &str, now: &str) -> Segment {
		let message_id = self.next_message_id();
		debug!(message_type, message_id, "Composing HL7 message");

		Segment::new("MSH")
			.field(ENCODING_CHARACTERS)
			.field(self.routing.sending_application.as_str())
			.field(self.routing.sending_facility.as_str())
			.field(self.routing.receiving_application.as_str())
			.field(self.routing.receiving_facility.as_str())
			.field(now)
			.field("")
			.field(message_type)
			.field(format!("MSG_ID_{message_id}"))
			.field("P")
			.field("2.1")
	}

	pub fn admit(&self, admission: &Admission, now: &str) -> Message {
		Message::new()
			.segment(self.header("ADT^A04", now))
			.segment(Segment::new("EVN").field("A04").field(now))
			.segment(
				Segment::new("PID")
					.field("1")
					.field("")
					.field(format!("{}{COMPONENT_SEPARATOR}", admission.custom_id))
					.field("")
					.field(format!("{}^{}", admission.family_name, admission.given_name))
					.field("")
					.field(compact_date(&admission.birth_date))
					.field(admission.gender.as_str()),
			)
			// PV1-44 is the admit date/time
			.segment(Segment::new("PV1").field("1").empty_fields(42).field(now))
	}

	pub fn note(&self, note: &ClinicalNote, now: &str) -> Message {
		Message::new()
			.segment(self.header("ORU^R01", now))
			.segment(patient_identification(&note.custom_id))
			.segment(Segment::new("ORC").field(""))
			.segment(observation_request("Visit Note", now))
			.segment(
				Segment::new("OBX")
					.field("1")
					.field("TX")
					.field(CONSULT_NOTE_CODE)
					.field("")
					.field(note.text.as_str()),
			)
	}

	/// Fails without consuming a message id when neither temperature nor weight is given.
	pub fn vitals(&self, vitals: &Vitals, now: &str) -> Result<Message, Hl7Error> {
		let observations: Vec<(&str, &str)> = [
			(BODY_TEMPERATURE_CODE, vitals.temperature.as_deref()),
			(BODY_WEIGHT_CODE, vitals.weight.as_deref()),
		]
		.into_iter()
		.filter_map(|(code, value)| value.filter(|v| !v.is_empty()).map(|v| (code, v)))
		.collect();

		if observations.is_empty() {
			return Err(Hl7Error::EmptyVitals);
		}

		let mut message = Message::new()
			.segment(self.header("ORU^R01", now))
			.segment(patient_identification(&vitals.custom_id))
			.segment(Segment::new("ORC").field(""))
			.segment(observation_request("Vitals", now));

		for (set_id, (code, value)) in (1..).zip(observations) {
			message = message.segment(
				Segment::new("OBX")
					.field(set_id.to_string())
					.field("NM")
					.field(code)
					.field("")
					.field(value),
			);
		}
		Ok(message)
	}
}

fn patient_identification(custom_id: &str) -> Segment {
	Segment::new("PID")
		.field("1")
		.field("")
		.field(format!("{custom_id}{COMPONENT_SEPARATOR}"))
}

fn observation_request(service: &str, now: &str) -> Segment {
	Segment::new("OBR")
		.field("1")
		.field("")
		.field("")
		.field(service)
		.field("")
		.field("")
		.field(now)
}
