use crate::api::{ClientError, HttpBackend};
use crate::hl7::Message;
use crate::types::PatientVisit;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::{info, instrument};

/// Media type under which raw HL7v2 messages are posted.
pub const HL7_V2_MEDIA_TYPE: &str = "text/hl7v2";

/// Receives HL7v2 messages and resolves patients by their hospital identifier.
#[async_trait]
pub trait Hl7Gateway: Send + Sync {
	async fn send(&self, message: &Message) -> Result<(), ClientError>;

	async fn find_patient(&self, custom_id: &str) -> Result<PatientVisit, ClientError>;
}

#[async_trait]
impl Hl7Gateway for HttpBackend {
	#[instrument(
		skip_all,
		fields(message_type = message.message_type(), control_id = message.control_id())
	)]
	async fn send(&self, message: &Message) -> Result<(), ClientError> {
		const ENDPOINT: &str = "hl7";
		let request = self
			.post(ENDPOINT)?
			.header(CONTENT_TYPE, HL7_V2_MEDIA_TYPE)
			.body(message.encode());
		Self::execute(ENDPOINT, request).await?;
		info!("HL7 message accepted");
		Ok(())
	}

	#[instrument(skip(self))]
	async fn find_patient(&self, custom_id: &str) -> Result<PatientVisit, ClientError> {
		const ENDPOINT: &str = "find-patient";
		let request = self.get(ENDPOINT)?.query(&[("custom-id", custom_id)]);
		let response = Self::execute(ENDPOINT, request).await?;
		Self::read_json(ENDPOINT, response).await
	}
}
