use crate::api::hl7::Hl7Gateway;
use crate::hl7::{timestamp, Admission, ClinicalNote, Composer, Message, Vitals};
use crate::openmrs;
use crate::types::Gender;
use crate::views::ActionError;
use std::sync::Arc;
use tracing::{info, instrument};
use url::Url;

const SEND_FAILED: &str = "Cannot handle HL7 message";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdmitForm {
	pub custom_id: String,
	pub family_name: String,
	pub given_name: String,
	/// `YYYY-MM-DD`
	pub birth_date: String,
	pub gender: Option<Gender>,
}

/// The HL7 page: one form per message type plus a patient lookup.
pub struct Hl7View {
	gateway: Arc<dyn Hl7Gateway>,
	composer: Composer,
	openmrs: Url,
	pub admit: AdmitForm,
	pub find_custom_id: String,
	pub note_custom_id: String,
	pub note_content: String,
	pub vitals_custom_id: String,
	pub temperature: String,
	pub weight: String,
}

/// Sent as typed; only an empty field counts as missing.
fn non_empty(value: &str) -> Option<String> {
	(!value.is_empty()).then(|| value.to_owned())
}

impl Hl7View {
	pub fn new(gateway: Arc<dyn Hl7Gateway>, composer: Composer, openmrs: Url) -> Self {
		Self {
			gateway,
			composer,
			openmrs,
			admit: AdmitForm::default(),
			find_custom_id: String::new(),
			note_custom_id: String::new(),
			note_content: String::new(),
			vitals_custom_id: String::new(),
			temperature: String::new(),
			weight: String::new(),
		}
	}

	pub const fn composer(&self) -> &Composer {
		&self.composer
	}

	async fn send(&self, message: Message) -> Result<Message, ActionError> {
		self.gateway
			.send(&message)
			.await
			.map_err(ActionError::failed(SEND_FAILED))?;
		Ok(message)
	}

	/// Sends `ADT^A04` and, once accepted, reuses the identifier in the other forms.
	#[instrument(skip(self))]
	pub async fn create_patient(&mut self) -> Result<Message, ActionError> {
		let Some(gender) = self.admit.gender else {
			return Err(ActionError::Invalid("Error in the gender"));
		};
		let admission = Admission {
			custom_id: self.admit.custom_id.clone(),
			family_name: self.admit.family_name.clone(),
			given_name: self.admit.given_name.clone(),
			birth_date: self.admit.birth_date.clone(),
			gender,
		};
		let message = self.composer.admit(&admission, &timestamp::now());
		let message = self.send(message).await?;

		info!(custom_id = %admission.custom_id, "Patient admitted");
		self.find_custom_id.clone_from(&admission.custom_id);
		self.note_custom_id.clone_from(&admission.custom_id);
		self.vitals_custom_id = admission.custom_id;
		Ok(message)
	}

	#[instrument(skip(self))]
	pub async fn record_note(&mut self) -> Result<Message, ActionError> {
		let note = ClinicalNote {
			custom_id: self.note_custom_id.clone(),
			text: self.note_content.clone(),
		};
		let message = self.composer.note(&note, &timestamp::now());
		self.send(message).await
	}

	#[instrument(skip(self))]
	pub async fn record_vitals(&mut self) -> Result<Message, ActionError> {
		let vitals = Vitals {
			custom_id: self.vitals_custom_id.clone(),
			temperature: non_empty(&self.temperature),
			weight: non_empty(&self.weight),
		};
		let message = self
			.composer
			.vitals(&vitals, &timestamp::now())
			.map_err(|_| ActionError::Invalid("Temperature and weight cannot be both empty"))?;
		self.send(message).await
	}

	/// Resolves the patient and returns the link to their dashboard.
	#[instrument(skip(self))]
	pub async fn find_patient(&self) -> Result<Url, ActionError> {
		let visit = self
			.gateway
			.find_patient(&self.find_custom_id)
			.await
			.map_err(ActionError::failed("Unknown patient"))?;
		openmrs::patient_dashboard(&self.openmrs, &visit.patient_uuid, visit.visit_uuid.as_deref())
			.map_err(ActionError::failed("Unknown patient"))
	}
}
