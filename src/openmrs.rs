//! Links into the OpenMRS web UI.

use crate::api::ClientError;
use url::Url;

const PATIENT_DASHBOARD: &str = "coreapps/patientdashboard/patientDashboard.page";
const CLINICIAN_PATIENT_PAGE: &str = "coreapps/clinicianfacing/patient.page";

fn page(base: &Url, endpoint: &'static str) -> Result<Url, ClientError> {
	base.join(endpoint)
		.map_err(|source| ClientError::Endpoint { endpoint, source })
}

/// Dashboard of a patient, opened on the given visit if any.
pub fn patient_dashboard(
	base: &Url,
	patient_uuid: &str,
	visit_uuid: Option<&str>,
) -> Result<Url, ClientError> {
	let mut url = page(base, PATIENT_DASHBOARD)?;
	{
		let mut query = url.query_pairs_mut();
		query.append_pair("patientId", patient_uuid);
		if let Some(visit_uuid) = visit_uuid {
			query.append_pair("visitId", visit_uuid);
		}
	}
	Ok(url)
}

/// Clinician-facing summary of a patient.
pub fn clinician_patient_page(base: &Url, patient_uuid: &str) -> Result<Url, ClientError> {
	let mut url = page(base, CLINICIAN_PATIENT_PAGE)?;
	url.query_pairs_mut().append_pair("patientId", patient_uuid);
	Ok(url)
}
