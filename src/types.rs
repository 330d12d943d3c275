use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// UI (Unique Identifier) value representation.
pub type UI = String;

/// Identifier of an EHR in the openEHR registry.
pub type EhrId = String;

/// UUID of an OpenMRS resource (patient, visit, encounter).
pub type ResourceUuid = String;

/// Patient and visit created or found by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PatientVisit {
	pub patient_uuid: ResourceUuid,
	#[serde(default)]
	pub visit_uuid: Option<ResourceUuid>,
}

/// Administrative gender as entered in the patient forms.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Gender {
	Female,
	Male,
	Other,
}

impl Gender {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Female => "F",
			Self::Male => "M",
			Self::Other => "X",
		}
	}
}

impl Display for Gender {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

#[derive(Debug, Error)]
#[error("`{0}` is not a supported gender code")]
pub struct ParseGenderError(String);

impl FromStr for Gender {
	type Err = ParseGenderError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"F" => Ok(Self::Female),
			"M" => Ok(Self::Male),
			"X" => Ok(Self::Other),
			_ => Err(ParseGenderError(s.to_owned())),
		}
	}
}

impl TryFrom<String> for Gender {
	type Error = ParseGenderError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

impl From<Gender> for String {
	fn from(gender: Gender) -> Self {
		gender.as_str().to_owned()
	}
}
