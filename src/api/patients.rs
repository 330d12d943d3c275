use crate::api::{ClientError, HttpBackend};
use crate::types::EhrId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

/// The patient registry with its temperature records (openEHR exercise).
#[async_trait]
pub trait PatientRegistry: Send + Sync {
	async fn list_patients(&self) -> Result<Vec<PatientSummary>, ClientError>;

	async fn list_temperatures(&self, ehr_id: &str) -> Result<Vec<TemperatureSample>, ClientError>;

	async fn create_patient(&self, patient_name: &str) -> Result<(), ClientError>;

	async fn record_temperature(&self, record: &TemperatureRecord) -> Result<(), ClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PatientSummary {
	pub ehr_id: EhrId,
	pub patient_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TemperatureSample {
	pub time: String,
	pub temperature: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TemperatureRecord {
	pub ehr_id: EhrId,
	pub temperature: f64,
	/// ISO-8601 instant of the measurement.
	pub time: String,
}

#[async_trait]
impl PatientRegistry for HttpBackend {
	#[instrument(skip_all)]
	async fn list_patients(&self) -> Result<Vec<PatientSummary>, ClientError> {
		const ENDPOINT: &str = "list-patients";
		let response = Self::execute(ENDPOINT, self.post(ENDPOINT)?).await?;
		Self::read_json(ENDPOINT, response).await
	}

	#[instrument(skip(self))]
	async fn list_temperatures(&self, ehr_id: &str) -> Result<Vec<TemperatureSample>, ClientError> {
		self.post_json("list-temperatures", &json!({ "ehr-id": ehr_id }))
			.await
	}

	#[instrument(skip(self))]
	async fn create_patient(&self, patient_name: &str) -> Result<(), ClientError> {
		self.post_json_discard("create-patient", &json!({ "patient-name": patient_name }))
			.await
	}

	#[instrument(skip_all, fields(ehr_id = %record.ehr_id))]
	async fn record_temperature(&self, record: &TemperatureRecord) -> Result<(), ClientError> {
		self.post_json_discard("record-temperature", record).await
	}
}
