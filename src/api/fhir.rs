use crate::api::{ClientError, HttpBackend};
use crate::types::{Gender, PatientVisit, ResourceUuid};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

/// Patient search, registration and clinical notes, backed by an OpenMRS FHIR server.
#[async_trait]
pub trait FhirGateway: Send + Sync {
	async fn notes(&self, patient_uuid: &str) -> Result<PatientNotes, ClientError>;

	async fn create_patient(&self, patient: &NewPatient) -> Result<PatientVisit, ClientError>;

	async fn find_patients(&self, query: &str) -> Result<Vec<PatientMatch>, ClientError>;

	async fn record_note(&self, patient_uuid: &str, text: &str) -> Result<(), ClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct NewPatient {
	pub given_name: String,
	pub family_name: String,
	pub gender: Gender,
	/// `YYYY-MM-DD`
	pub birth_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PatientNotes {
	pub patient: PatientDetails,
	#[serde(default)]
	pub notes: Vec<Note>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PatientDetails {
	/// Hospital identifier.
	pub id: String,
	pub name: String,
	pub gender: String,
	pub birth_date: String,
	#[serde(default)]
	pub visit_uuid: Option<ResourceUuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Note {
	pub time: String,
	pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PatientMatch {
	pub patient_uuid: ResourceUuid,
	pub patient_id: String,
	pub name: String,
	pub gender: String,
	#[serde(default)]
	pub age: Option<u32>,
	pub birth_date: String,
}

#[async_trait]
impl FhirGateway for HttpBackend {
	#[instrument(skip(self))]
	async fn notes(&self, patient_uuid: &str) -> Result<PatientNotes, ClientError> {
		const ENDPOINT: &str = "notes";
		let request = self.get(ENDPOINT)?.query(&[("patient-uuid", patient_uuid)]);
		let response = Self::execute(ENDPOINT, request).await?;
		Self::read_json(ENDPOINT, response).await
	}

	#[instrument(skip_all)]
	async fn create_patient(&self, patient: &NewPatient) -> Result<PatientVisit, ClientError> {
		self.post_json("create-patient", patient).await
	}

	#[instrument(skip(self))]
	async fn find_patients(&self, query: &str) -> Result<Vec<PatientMatch>, ClientError> {
		self.post_json("find-patients", &json!({ "query": query }))
			.await
	}

	#[instrument(skip(self, text))]
	async fn record_note(&self, patient_uuid: &str, text: &str) -> Result<(), ClientError> {
		self.post_json_discard(
			"record-note",
			&json!({ "patient-uuid": patient_uuid, "text": text }),
		)
		.await
	}
}
