use crate::api::fhir::{FhirGateway, NewPatient, Note, PatientDetails, PatientMatch};
use crate::api::ClientError;
use crate::openmrs;
use crate::types::{Gender, ResourceUuid};
use crate::views::ActionError;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use url::Url;

/// The patient the page is working on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
	pub patient_uuid: ResourceUuid,
	pub visit_uuid: Option<ResourceUuid>,
}

/// Inputs of the "new patient" form, as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientForm {
	pub given_name: String,
	pub family_name: String,
	pub gender: String,
	/// `YYYY-MM-DD`
	pub birth_date: String,
}

impl PatientForm {
	/// Checks the form in display order and reports the first problem.
	pub fn validate(&self) -> Result<NewPatient, ActionError> {
		if self.given_name.chars().count() < 2 {
			return Err(ActionError::Invalid("Given name must have at least 2 characters"));
		}
		if self.family_name.chars().count() < 2 {
			return Err(ActionError::Invalid("Family name must have at least 2 characters"));
		}
		let gender: Gender = self
			.gender
			.parse()
			.map_err(|_| ActionError::Invalid("Error in the gender"))?;
		if self.birth_date.chars().count() != 10 {
			return Err(ActionError::Invalid("Error in the birth date"));
		}
		Ok(NewPatient {
			given_name: self.given_name.clone(),
			family_name: self.family_name.clone(),
			gender,
			birth_date: self.birth_date.clone(),
		})
	}
}

/// One line of the search results with its two actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRow {
	pub patient: PatientMatch,
	/// Target of the "open externally" action.
	pub external: Url,
}

pub struct FhirView {
	gateway: Arc<dyn FhirGateway>,
	openmrs: Url,
	selection: Option<Selection>,
	patient: Option<PatientDetails>,
	notes: Vec<Note>,
	results: Vec<SearchRow>,
	pub form: PatientForm,
	pub query: String,
	pub note_input: String,
}

impl FhirView {
	pub fn new(gateway: Arc<dyn FhirGateway>, openmrs: Url) -> Self {
		Self {
			gateway,
			openmrs,
			selection: None,
			patient: None,
			notes: Vec::new(),
			results: Vec::new(),
			form: PatientForm::default(),
			query: String::new(),
			note_input: String::new(),
		}
	}

	pub const fn selection(&self) -> Option<&Selection> {
		self.selection.as_ref()
	}

	pub const fn patient(&self) -> Option<&PatientDetails> {
		self.patient.as_ref()
	}

	pub fn notes(&self) -> &[Note] {
		&self.notes
	}

	pub fn results(&self) -> &[SearchRow] {
		&self.results
	}

	/// Loads a patient with their notes and makes them the selection.
	#[instrument(skip(self))]
	pub async fn refresh_patient(&mut self, patient_uuid: &str) -> Result<(), ActionError> {
		let loaded = self
			.gateway
			.notes(patient_uuid)
			.await
			.map_err(ActionError::failed("Error while reading notes for patient"))?;

		self.selection = Some(Selection {
			patient_uuid: patient_uuid.to_owned(),
			visit_uuid: loaded.patient.visit_uuid.clone(),
		});
		self.patient = Some(loaded.patient);
		self.notes = loaded.notes;
		self.note_input.clear();
		Ok(())
	}

	#[instrument(skip(self))]
	pub async fn create_patient(&mut self) -> Result<(), ActionError> {
		let patient = self.form.validate()?;
		let visit = self
			.gateway
			.create_patient(&patient)
			.await
			.map_err(ActionError::failed("Cannot create patient"))?;

		info!(patient_uuid = %visit.patient_uuid, "Patient created");
		self.refresh_patient(&visit.patient_uuid).await
	}

	#[instrument(skip(self))]
	pub async fn search(&mut self) -> Result<(), ActionError> {
		if self.query.chars().count() < 2 {
			return Err(ActionError::Invalid("Search criteria must have at least 2 characters"));
		}
		let matches = self
			.gateway
			.find_patients(&self.query)
			.await
			.map_err(ActionError::failed("Cannot search patients"))?;

		self.results = matches
			.into_iter()
			.map(|patient| -> Result<_, ClientError> {
				let external = openmrs::clinician_patient_page(&self.openmrs, &patient.patient_uuid)?;
				Ok(SearchRow { patient, external })
			})
			.collect::<Result<_, _>>()
			.map_err(ActionError::failed("Cannot search patients"))?;
		debug!(results = self.results.len(), "Search done");
		Ok(())
	}

	/// The "select" action of a search result.
	pub async fn select_result(&mut self, index: usize) -> Result<bool, ActionError> {
		let Some(row) = self.results.get(index) else {
			return Ok(false);
		};
		let patient_uuid = row.patient.patient_uuid.clone();
		self.refresh_patient(&patient_uuid).await?;
		Ok(true)
	}

	#[instrument(skip(self))]
	pub async fn record_note(&mut self) -> Result<(), ActionError> {
		let Some(patient_uuid) = self.selection.as_ref().map(|s| s.patient_uuid.clone()) else {
			return Err(ActionError::Invalid("No patient is selected"));
		};
		self.gateway
			.record_note(&patient_uuid, &self.note_input)
			.await
			.map_err(ActionError::failed("Cannot record new note"))?;

		self.refresh_patient(&patient_uuid).await
	}

	/// Dashboard of the selected patient on their current visit.
	pub fn open_visit(&self) -> Result<Url, ActionError> {
		let Some(selection) = &self.selection else {
			return Err(ActionError::Invalid("No patient is selected"));
		};
		openmrs::patient_dashboard(
			&self.openmrs,
			&selection.patient_uuid,
			selection.visit_uuid.as_deref(),
		)
		.map_err(ActionError::failed("Unknown patient"))
	}
}
