use crate::api::patients::{PatientRegistry, PatientSummary, TemperatureRecord};
use crate::hl7::timestamp::iso_now;
use crate::views::{ActionError, Selector};
use std::sync::Arc;
use tracing::{debug, info, instrument};

fn not_implemented(resource: &str) -> String {
	format!("Resource /{resource} not properly implemented in Flask")
}

/// Line chart of the temperatures of one patient. Labels and values are parallel arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemperatureChart {
	pub visible: bool,
	pub labels: Vec<String>,
	pub values: Vec<f64>,
}

pub struct TemperatureView {
	registry: Arc<dyn PatientRegistry>,
	patients: Selector<PatientSummary>,
	chart: TemperatureChart,
	/// Name typed in the "new patient" field.
	pub patient_input: String,
	/// Value typed in the "record temperature" field.
	pub temperature_input: String,
}

impl TemperatureView {
	pub fn new(registry: Arc<dyn PatientRegistry>) -> Self {
		Self {
			registry,
			patients: Selector::default(),
			chart: TemperatureChart::default(),
			patient_input: String::new(),
			temperature_input: String::new(),
		}
	}

	pub const fn patients(&self) -> &Selector<PatientSummary> {
		&self.patients
	}

	pub const fn chart(&self) -> &TemperatureChart {
		&self.chart
	}

	/// Reloads the patient list, selects the first patient and shows their temperatures.
	#[instrument(skip(self))]
	pub async fn refresh_patients(&mut self) -> Result<(), ActionError> {
		let ticket = self.patients.begin();
		let (outcome, failure) = match self.registry.list_patients().await {
			Ok(patients) => (Ok(patients), None),
			Err(err) => (Err(err.to_string()), Some(err)),
		};
		if !self.patients.complete(ticket, outcome) {
			return Ok(());
		}
		if let Some(err) = failure {
			self.chart.visible = false;
			return Err(ActionError::failed(not_implemented("list-patients"))(err));
		}
		info!(patients = self.patients.options().len(), "Patients loaded");
		self.refresh_temperatures().await
	}

	/// Selects another patient and shows their temperatures.
	pub async fn select_patient(&mut self, index: usize) -> Result<bool, ActionError> {
		if !self.patients.select(index) {
			return Ok(false);
		}
		self.refresh_temperatures().await?;
		Ok(true)
	}

	/// Replaces the chart with the temperatures of the selected patient, or hides it when no
	/// patient is selected.
	#[instrument(skip(self))]
	pub async fn refresh_temperatures(&mut self) -> Result<(), ActionError> {
		let Some(ehr_id) = self.patients.selected().map(|patient| patient.ehr_id.clone()) else {
			debug!("No patient");
			self.chart.visible = false;
			return Ok(());
		};
		self.chart.visible = true;

		let samples = self
			.registry
			.list_temperatures(&ehr_id)
			.await
			.map_err(ActionError::failed(not_implemented("temperatures")))?;

		let (labels, values) = samples
			.into_iter()
			.map(|sample| (sample.time, sample.temperature))
			.unzip();
		self.chart.labels = labels;
		self.chart.values = values;
		Ok(())
	}

	#[instrument(skip(self))]
	pub async fn create_patient(&mut self) -> Result<(), ActionError> {
		if self.patient_input.is_empty() {
			return Err(ActionError::Invalid("No name was provided"));
		}
		self.registry
			.create_patient(&self.patient_input)
			.await
			.map_err(ActionError::failed(not_implemented("create-patient")))?;

		self.patient_input.clear();
		self.refresh_patients().await
	}

	#[instrument(skip(self))]
	pub async fn record_temperature(&mut self) -> Result<(), ActionError> {
		let temperature = match self.temperature_input.trim().parse::<f64>() {
			Ok(value) if value.is_finite() => value,
			_ => return Err(ActionError::Invalid("Not a valid number")),
		};
		let Some(ehr_id) = self.patients.selected().map(|patient| patient.ehr_id.clone()) else {
			return Err(ActionError::Invalid("No patient is selected"));
		};

		let record = TemperatureRecord {
			ehr_id,
			temperature,
			time: iso_now(),
		};
		self.registry
			.record_temperature(&record)
			.await
			.map_err(ActionError::failed(not_implemented("record-temperature")))?;

		self.temperature_input.clear();
		self.refresh_temperatures().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::api::patients::TemperatureSample;
	use crate::api::ClientError;
	use async_trait::async_trait;
	use reqwest::StatusCode;
	use std::collections::HashMap;
	use std::sync::Mutex;

	#[derive(Default)]
	struct FakeRegistry {
		patients: Mutex<Vec<PatientSummary>>,
		temperatures: Mutex<HashMap<String, Vec<TemperatureSample>>>,
		requests: Mutex<usize>,
		broken: bool,
	}

	impl FakeRegistry {
		fn requests(&self) -> usize {
			*self.requests.lock().unwrap()
		}

		fn check(&self, endpoint: &'static str) -> Result<(), ClientError> {
			*self.requests.lock().unwrap() += 1;
			if self.broken {
				Err(ClientError::Status {
					endpoint,
					status: StatusCode::NOT_IMPLEMENTED,
				})
			} else {
				Ok(())
			}
		}
	}

	#[async_trait]
	impl PatientRegistry for FakeRegistry {
		async fn list_patients(&self) -> Result<Vec<PatientSummary>, ClientError> {
			self.check("list-patients")?;
			Ok(self.patients.lock().unwrap().clone())
		}

		async fn list_temperatures(&self, ehr_id: &str) -> Result<Vec<TemperatureSample>, ClientError> {
			self.check("list-temperatures")?;
			Ok(self
				.temperatures
				.lock()
				.unwrap()
				.get(ehr_id)
				.cloned()
				.unwrap_or_default())
		}

		async fn create_patient(&self, patient_name: &str) -> Result<(), ClientError> {
			self.check("create-patient")?;
			let mut patients = self.patients.lock().unwrap();
			let ehr_id = format!("ehr-{}", patients.len() + 1);
			patients.push(PatientSummary {
				ehr_id,
				patient_name: patient_name.to_owned(),
			});
			Ok(())
		}

		async fn record_temperature(&self, record: &TemperatureRecord) -> Result<(), ClientError> {
			self.check("record-temperature")?;
			self.temperatures
				.lock()
				.unwrap()
				.entry(record.ehr_id.clone())
				.or_default()
				.push(TemperatureSample {
					time: record.time.clone(),
					temperature: record.temperature,
				});
			Ok(())
		}
	}

	#[tokio::test]
	async fn no_patient_hides_chart() {
		let registry = Arc::new(FakeRegistry::default());
		let mut view = TemperatureView::new(registry.clone());

		view.refresh_patients().await.unwrap();
		assert!(view.patients().options().is_empty());
		assert!(!view.chart().visible);
		// Only the patient list was requested
		assert_eq!(registry.requests(), 1);
	}

	#[tokio::test]
	async fn create_then_record() {
		let registry = Arc::new(FakeRegistry::default());
		let mut view = TemperatureView::new(registry.clone());

		view.patient_input = String::from("Alice");
		view.create_patient().await.unwrap();
		assert!(view.patient_input.is_empty());
		assert_eq!(view.patients().selected().unwrap().patient_name, "Alice");
		assert!(view.chart().visible);
		assert!(view.chart().values.is_empty());

		view.temperature_input = String::from("37.5");
		view.record_temperature().await.unwrap();
		view.temperature_input = String::from(" 38 ");
		view.record_temperature().await.unwrap();

		assert!(view.temperature_input.is_empty());
		assert_eq!(view.chart().values, vec![37.5, 38.0]);
		assert_eq!(view.chart().labels.len(), 2);
		assert!(view.chart().labels[0].ends_with('Z'));
	}

	#[tokio::test]
	async fn chart_follows_selected_patient() {
		let registry = Arc::new(FakeRegistry::default());
		registry.patients.lock().unwrap().extend([
			PatientSummary {
				ehr_id: String::from("a"),
				patient_name: String::from("Alice"),
			},
			PatientSummary {
				ehr_id: String::from("b"),
				patient_name: String::from("Bob"),
			},
		]);
		registry.temperatures.lock().unwrap().insert(
			String::from("b"),
			vec![TemperatureSample {
				time: String::from("t0"),
				temperature: 39.1,
			}],
		);
		let mut view = TemperatureView::new(registry);

		view.refresh_patients().await.unwrap();
		assert!(view.chart().values.is_empty());

		assert!(view.select_patient(1).await.unwrap());
		assert_eq!(view.chart().labels, vec!["t0"]);
		assert_eq!(view.chart().values, vec![39.1]);

		assert!(!view.select_patient(2).await.unwrap());
	}

	#[tokio::test]
	async fn validation_happens_before_any_request() {
		let registry = Arc::new(FakeRegistry::default());
		let mut view = TemperatureView::new(registry.clone());

		let err = view.create_patient().await.unwrap_err();
		assert_eq!(err.to_string(), "No name was provided");

		for input in ["", "abc", "NaN", "inf", "Infinity", "-INF", "1e400"] {
			view.temperature_input = String::from(input);
			let err = view.record_temperature().await.unwrap_err();
			assert_eq!(err.to_string(), "Not a valid number");
		}
		assert_eq!(registry.requests(), 0);
	}

	#[tokio::test]
	async fn failure_names_the_resource() {
		let registry = Arc::new(FakeRegistry {
			broken: true,
			..FakeRegistry::default()
		});
		let mut view = TemperatureView::new(registry);

		let err = view.refresh_patients().await.unwrap_err();
		assert_eq!(
			err.to_string(),
			"Resource /list-patients not properly implemented in Flask"
		);
		assert!(matches!(err, ActionError::Failed { .. }));

		view.patient_input = String::from("Alice");
		let err = view.create_patient().await.unwrap_err();
		assert_eq!(
			err.to_string(),
			"Resource /create-patient not properly implemented in Flask"
		);
		assert_eq!(view.patient_input, "Alice");
	}
}
