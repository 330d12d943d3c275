//! Minimal HL7v2 (pipe-delimited) message model.
//!
//! Messages are composed client-side and sent as raw text; parsing only exists so that composed
//! or echoed messages can be inspected.

mod composer;
pub mod timestamp;

pub use composer::*;

use std::fmt::{Display, Formatter};
use thiserror::Error;

pub const SEGMENT_TERMINATOR: char = '\r';
pub const FIELD_SEPARATOR: char = '|';
pub const COMPONENT_SEPARATOR: char = '^';
/// MSH-2: component, repetition, escape and subcomponent characters.
pub const ENCODING_CHARACTERS: &str = "^~\\&";

#[derive(Debug, Error)]
pub enum Hl7Error {
	#[error("Temperature and weight cannot be both empty")]
	EmptyVitals,
	#[error("malformed segment `{0}`")]
	MalformedSegment(String),
	#[error("message contains no segment")]
	EmptyMessage,
	#[error("unsupported date time format: `{0}`")]
	UnsupportedDateTime(String),
	#[error(transparent)]
	DateTime(#[from] chrono::ParseError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
	id: String,
	fields: Vec<String>,
}

impl Segment {
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			fields: Vec::new(),
		}
	}

	#[must_use]
	pub fn field(mut self, value: impl Into<String>) -> Self {
		self.fields.push(value.into());
		self
	}

	#[must_use]
	pub fn empty_fields(mut self, count: usize) -> Self {
		self.fields
			.extend(std::iter::repeat_with(String::new).take(count));
		self
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	/// Returns the field at the given HL7 position (1-based).
	///
	/// In MSH the field separator itself is MSH-1, so MSH-2 is the first stored field.
	pub fn get(&self, position: usize) -> Option<&str> {
		if self.id == "MSH" {
			match position {
				0 => None,
				1 => Some("|"),
				n => self.fields.get(n - 2).map(String::as_str),
			}
		} else {
			position
				.checked_sub(1)
				.and_then(|index| self.fields.get(index))
				.map(String::as_str)
		}
	}

	fn parse(raw: &str) -> Result<Self, Hl7Error> {
		let mut parts = raw.split(FIELD_SEPARATOR);
		let id = parts.next().unwrap_or_default();
		if id.len() != 3 || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
			return Err(Hl7Error::MalformedSegment(raw.to_owned()));
		}
		Ok(Self {
			id: id.to_owned(),
			fields: parts.map(str::to_owned).collect(),
		})
	}
}

impl Display for Segment {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.id)?;
		for field in &self.fields {
			write!(f, "{FIELD_SEPARATOR}{field}")?;
		}
		Ok(())
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
	segments: Vec<Segment>,
}

impl Message {
	pub const fn new() -> Self {
		Self {
			segments: Vec::new(),
		}
	}

	#[must_use]
	pub fn segment(mut self, segment: Segment) -> Self {
		self.segments.push(segment);
		self
	}

	pub fn segments(&self) -> &[Segment] {
		&self.segments
	}

	pub fn find<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Segment> + 'a {
		self.segments.iter().filter(move |segment| segment.id() == id)
	}

	/// MSH-9, e.g. `ORU^R01`.
	pub fn message_type(&self) -> Option<&str> {
		self.find("MSH").next().and_then(|msh| msh.get(9))
	}

	/// MSH-10.
	pub fn control_id(&self) -> Option<&str> {
		self.find("MSH").next().and_then(|msh| msh.get(10))
	}

	/// Wire form: every segment is terminated by a carriage return.
	pub fn encode(&self) -> String {
		self.to_string()
	}

	/// Parses a message, accepting `\r`, `\n` or `\r\n` as segment terminators.
	pub fn parse(data: &str) -> Result<Self, Hl7Error> {
		let normalized = data.replace("\r\n", "\n").replace('\n', "\r");
		let segments = normalized
			.split(SEGMENT_TERMINATOR)
			.filter(|raw| !raw.is_empty())
			.map(Segment::parse)
			.collect::<Result<Vec<_>, _>>()?;

		if segments.is_empty() {
			return Err(Hl7Error::EmptyMessage);
		}
		Ok(Self { segments })
	}
}

impl Display for Message {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		for segment in &self.segments {
			write!(f, "{segment}{SEGMENT_TERMINATOR}")?;
		}
		Ok(())
	}
}
