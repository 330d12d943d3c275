use crate::api::dicomweb::StudyFilter;
use crate::api::{build_client, HttpBackend};
use crate::config::AppConfig;
use crate::hl7::{timestamp, Composer, Message};
use crate::types::Gender;
use crate::views::dicomweb::{DicomBrowser, WheelEvent};
use crate::views::fhir::{FhirView, PatientForm};
use crate::views::hl7::{AdmitForm, Hl7View};
use crate::views::temperature::TemperatureView;
use crate::views::{LoadState, Selector};
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

#[derive(Parser)]
#[command(name = "interop-desk", version)]
#[command(about = "Clients for the healthcare interoperability exercises")]
pub struct Cli {
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
	/// Patients and their temperature chart
	#[command(subcommand)]
	Temperatures(TemperaturesCommand),
	/// Compose and send HL7v2 messages
	#[command(subcommand)]
	Hl7(Hl7Command),
	/// Browse studies of a DICOMweb archive
	#[command(subcommand)]
	Dicom(DicomCommand),
	/// Search, register and annotate patients on the FHIR server
	#[command(subcommand)]
	Fhir(FhirCommand),
}

#[derive(Subcommand)]
pub enum TemperaturesCommand {
	/// List patients and the chart of one of them (the first by default)
	List {
		#[arg(long)]
		patient: Option<usize>,
	},
	/// Register a patient
	Create { name: String },
	/// Record a temperature for a patient (the first by default)
	Record {
		#[arg(long, default_value_t = 0)]
		patient: usize,
		temperature: String,
	},
}

#[derive(Subcommand)]
pub enum Hl7Command {
	/// Send ADT^A04 for a new patient
	Admit {
		custom_id: String,
		family_name: String,
		given_name: String,
		/// YYYY-MM-DD
		birth_date: String,
		/// F, M or X
		gender: Gender,
	},
	/// Send a consult note (ORU^R01)
	Note { custom_id: String, text: String },
	/// Send temperature and/or weight (ORU^R01)
	Vitals {
		custom_id: String,
		#[arg(long)]
		temperature: Option<String>,
		#[arg(long)]
		weight: Option<String>,
	},
	/// Print the OpenMRS dashboard of a patient
	Find { custom_id: String },
	/// Print the segments of a message read from a file
	Inspect { path: PathBuf },
}

#[derive(Subcommand)]
pub enum DicomCommand {
	/// Cascade from a study search down to one rendered instance
	Browse(BrowseArgs),
}

#[derive(Args)]
pub struct BrowseArgs {
	#[arg(long, default_value = "")]
	patient_id: String,
	#[arg(long, default_value = "")]
	patient_name: String,
	#[arg(long, default_value = "")]
	study_description: String,
	/// Position of the study in the result list
	#[arg(long)]
	study: Option<usize>,
	/// Position of the series in the study
	#[arg(long)]
	series: Option<usize>,
	/// Slice to render, the middle one by default
	#[arg(long)]
	index: Option<usize>,
	/// Wheel notches applied after positioning, negative to go backwards
	#[arg(long, allow_negative_numbers = true, default_value_t = 0)]
	scroll: i32,
	/// Where to write the rendered image
	#[arg(long, short)]
	output: PathBuf,
}

#[derive(Subcommand)]
pub enum FhirCommand {
	/// Search patients by name or identifier
	Search {
		query: String,
		/// Open the result at this position with its notes
		#[arg(long)]
		select: Option<usize>,
	},
	/// Register a patient and show it
	Create {
		given_name: String,
		family_name: String,
		gender: String,
		/// YYYY-MM-DD
		birth_date: String,
	},
	/// Show a patient with their notes
	Show { patient_uuid: String },
	/// Add a note to a patient
	Note { patient_uuid: String, text: String },
}

/// One HTTP backend per configured base URL, sharing a single connection pool.
struct Backends {
	client: reqwest::Client,
}

impl Backends {
	fn new(config: &AppConfig) -> anyhow::Result<Self> {
		let client = build_client(&config.http).context("Cannot build the HTTP client")?;
		Ok(Self { client })
	}

	fn at(&self, base_url: &Url) -> Arc<HttpBackend> {
		let backend = HttpBackend::new(self.client.clone(), base_url.clone());
		debug!(base_url = %backend.base_url(), "Using backend");
		Arc::new(backend)
	}
}

pub async fn run(command: Command, config: AppConfig) -> anyhow::Result<()> {
	let backends = Backends::new(&config)?;
	let urls = &config.backends;
	match command {
		Command::Temperatures(command) => {
			temperatures(TemperatureView::new(backends.at(&urls.patients)), command).await
		}
		Command::Hl7(command) => {
			let view = Hl7View::new(
				backends.at(&urls.hl7),
				Composer::new(config.hl7.clone()),
				urls.openmrs.clone(),
			);
			hl7(view, command).await
		}
		Command::Dicom(DicomCommand::Browse(args)) => {
			let browser = DicomBrowser::new(backends.at(&urls.dicomweb));
			browse(browser, args, &config.http.user_agent).await
		}
		Command::Fhir(command) => {
			fhir(FhirView::new(backends.at(&urls.fhir), urls.openmrs.clone()), command).await
		}
	}
}

fn print_chart(view: &TemperatureView) {
	let chart = view.chart();
	if !chart.visible {
		return;
	}
	for (time, value) in chart.labels.iter().zip(&chart.values) {
		println!("  {time}  {value:.1}");
	}
}

async fn select_patient(view: &mut TemperatureView, index: usize) -> anyhow::Result<()> {
	if !view.select_patient(index).await? {
		anyhow::bail!("No patient at position {index}");
	}
	Ok(())
}

async fn temperatures(
	mut view: TemperatureView,
	command: TemperaturesCommand,
) -> anyhow::Result<()> {
	match command {
		TemperaturesCommand::List { patient } => {
			view.refresh_patients().await?;
			if let Some(index) = patient {
				select_patient(&mut view, index).await?;
			}
			let selected = view.patients().selected_index();
			for (index, patient) in view.patients().options().iter().enumerate() {
				let marker = if Some(index) == selected { '*' } else { ' ' };
				println!("{marker} {index}  {}  {}", patient.ehr_id, patient.patient_name);
			}
			print_chart(&view);
		}
		TemperaturesCommand::Create { name } => {
			view.patient_input = name;
			view.create_patient().await?;
			info!(patients = view.patients().options().len(), "Patient created");
		}
		TemperaturesCommand::Record { patient, temperature } => {
			view.refresh_patients().await?;
			select_patient(&mut view, patient).await?;
			view.temperature_input = temperature;
			view.record_temperature().await?;
			print_chart(&view);
		}
	}
	Ok(())
}

async fn hl7(mut view: Hl7View, command: Hl7Command) -> anyhow::Result<()> {
	let message = match command {
		Hl7Command::Admit {
			custom_id,
			family_name,
			given_name,
			birth_date,
			gender,
		} => {
			view.admit = AdmitForm {
				custom_id,
				family_name,
				given_name,
				birth_date,
				gender: Some(gender),
			};
			view.create_patient().await?
		}
		Hl7Command::Note { custom_id, text } => {
			view.note_custom_id = custom_id;
			view.note_content = text;
			view.record_note().await?
		}
		Hl7Command::Vitals {
			custom_id,
			temperature,
			weight,
		} => {
			view.vitals_custom_id = custom_id;
			view.temperature = temperature.unwrap_or_default();
			view.weight = weight.unwrap_or_default();
			view.record_vitals().await?
		}
		Hl7Command::Find { custom_id } => {
			view.find_custom_id = custom_id;
			println!("{}", view.find_patient().await?);
			return Ok(());
		}
		Hl7Command::Inspect { path } => {
			let data = tokio::fs::read_to_string(&path)
				.await
				.with_context(|| format!("Cannot read {}", path.display()))?;
			return inspect(&Message::parse(&data)?);
		}
	};
	info!(
		message_type = message.message_type(),
		control_id = message.control_id(),
		session_messages = view.composer().composed(),
		"HL7 message accepted"
	);
	print!("{}", message.encode().replace('\r', "\n"));
	Ok(())
}

fn inspect(message: &Message) -> anyhow::Result<()> {
	if let Some(sent) = message
		.find("MSH")
		.next()
		.and_then(|msh| msh.get(7))
		.filter(|value| !value.is_empty())
	{
		println!("Sent at {}", timestamp::parse_date_time(sent)?);
	}
	for segment in message.segments() {
		println!("{segment}");
	}
	Ok(())
}

/// Fails with the reason of a lookup that did not succeed.
fn ensure_loaded<T>(selector: &Selector<T>, level: &str) -> anyhow::Result<()> {
	if let LoadState::Failed(reason) = selector.state() {
		anyhow::bail!("{level} lookup failed: {reason}");
	}
	Ok(())
}

async fn browse(
	mut browser: DicomBrowser,
	args: BrowseArgs,
	user_agent: &str,
) -> anyhow::Result<()> {
	let filter = StudyFilter {
		patient_id: args.patient_id,
		patient_name: args.patient_name,
		study_description: args.study_description,
	};
	browser.lookup_studies(&filter).await;
	if let Some(index) = args.study {
		if !browser.select_study(index).await {
			anyhow::bail!("No study at position {index}");
		}
	}
	if let Some(index) = args.series {
		if !browser.select_series(index).await {
			anyhow::bail!("No series at position {index}");
		}
	}
	if let Some(index) = args.index {
		if !browser.set_index(index).await {
			anyhow::bail!("No instance at position {index}");
		}
	}
	let notch = args.scroll.signum();
	for _ in 0..args.scroll.unsigned_abs() {
		let event = WheelEvent::from_engine(user_agent, notch, f64::from(notch));
		if !browser.scroll(event).await {
			debug!(index = browser.slider().index(), "End of the series reached");
			break;
		}
	}

	ensure_loaded(browser.studies(), "Study")?;
	let study = browser.studies().selected().context("No study found")?;
	ensure_loaded(browser.series(), "Series")?;
	let series = browser.series().selected().context("No renderable series found")?;
	ensure_loaded(browser.slider().selector(), "Instance")?;
	if browser.slider().is_empty() {
		anyhow::bail!("The series has no instance");
	}
	let last = browser.slider().max().unwrap_or_default();
	println!("{}", study.label());
	println!("{}", series.label());
	println!(
		"Instance {}/{last}: {}",
		browser.slider().index(),
		browser.slider().current().map_or("", String::as_str)
	);

	let image = browser
		.viewport()
		.current_image()
		.context("No instance could be rendered")?;
	tokio::fs::write(&args.output, &image.data)
		.await
		.with_context(|| format!("Cannot write {}", args.output.display()))?;
	info!(
		output = %args.output.display(),
		media_type = image.media_type.as_str(),
		object_urls = browser.viewport().live_urls(),
		"Image saved"
	);
	Ok(())
}

fn print_patient(view: &FhirView) {
	if let Some(patient) = view.patient() {
		println!(
			"{}  {}  {}  {}",
			patient.id, patient.name, patient.gender, patient.birth_date
		);
	}
	for note in view.notes() {
		println!("  {}  {}", note.time, note.text);
	}
}

async fn fhir(mut view: FhirView, command: FhirCommand) -> anyhow::Result<()> {
	match command {
		FhirCommand::Search { query, select } => {
			view.query = query;
			view.search().await?;
			if let Some(index) = select {
				if !view.select_result(index).await? {
					anyhow::bail!("No result at position {index}");
				}
				print_patient(&view);
				if let Some(selection) = view.selection() {
					println!("{}", selection.patient_uuid);
				}
				println!("{}", view.open_visit()?);
				return Ok(());
			}
			for row in view.results() {
				let patient = &row.patient;
				let age = patient.age.map(|age| age.to_string()).unwrap_or_default();
				println!(
					"{}  {}  {}  {}  {}  {}",
					patient.patient_id,
					patient.name,
					patient.gender,
					age,
					patient.birth_date,
					row.external
				);
			}
		}
		FhirCommand::Create {
			given_name,
			family_name,
			gender,
			birth_date,
		} => {
			view.form = PatientForm {
				given_name,
				family_name,
				gender,
				birth_date,
			};
			view.create_patient().await?;
			print_patient(&view);
			println!("{}", view.open_visit()?);
		}
		FhirCommand::Show { patient_uuid } => {
			view.refresh_patient(&patient_uuid).await?;
			print_patient(&view);
		}
		FhirCommand::Note { patient_uuid, text } => {
			view.refresh_patient(&patient_uuid).await?;
			view.note_input = text;
			view.record_note().await?;
			print_patient(&view);
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::api::patients::{PatientRegistry, PatientSummary, TemperatureRecord, TemperatureSample};
	use crate::api::ClientError;
	use async_trait::async_trait;
	use clap::CommandFactory;
	use std::sync::Mutex;

	#[derive(Default)]
	struct OnePatient {
		recorded: Mutex<Vec<TemperatureRecord>>,
	}

	#[async_trait]
	impl PatientRegistry for OnePatient {
		async fn list_patients(&self) -> Result<Vec<PatientSummary>, ClientError> {
			Ok(vec![PatientSummary {
				ehr_id: String::from("ehr-1"),
				patient_name: String::from("Alice"),
			}])
		}

		async fn list_temperatures(&self, _: &str) -> Result<Vec<TemperatureSample>, ClientError> {
			Ok(Vec::new())
		}

		async fn create_patient(&self, _: &str) -> Result<(), ClientError> {
			Ok(())
		}

		async fn record_temperature(&self, record: &TemperatureRecord) -> Result<(), ClientError> {
			self.recorded.lock().unwrap().push(record.clone());
			Ok(())
		}
	}

	#[test]
	fn command_line_is_consistent() {
		Cli::command().debug_assert();
	}

	#[test]
	fn browse_accepts_negative_scroll() {
		let cli = Cli::try_parse_from([
			"interop-desk",
			"dicom",
			"browse",
			"--patient-name",
			"DOE",
			"--scroll",
			"-3",
			"-o",
			"out.png",
		])
		.unwrap();
		let Command::Dicom(DicomCommand::Browse(args)) = cli.command else {
			panic!("expected dicom browse");
		};
		assert_eq!(args.patient_name, "DOE");
		assert_eq!(args.scroll, -3);
		assert_eq!(args.output, PathBuf::from("out.png"));
	}

	#[tokio::test]
	async fn record_needs_an_existing_patient() {
		let registry = Arc::new(OnePatient::default());
		let record = |patient| TemperaturesCommand::Record {
			patient,
			temperature: String::from("37.5"),
		};

		let err = temperatures(TemperatureView::new(registry.clone()), record(3))
			.await
			.unwrap_err();
		assert_eq!(err.to_string(), "No patient at position 3");
		assert!(registry.recorded.lock().unwrap().is_empty());

		temperatures(TemperatureView::new(registry.clone()), record(0))
			.await
			.unwrap();
		let recorded = registry.recorded.lock().unwrap();
		assert_eq!(recorded.len(), 1);
		assert_eq!(recorded[0].ehr_id, "ehr-1");
		assert_eq!(recorded[0].temperature, 37.5);
	}

	#[test]
	fn failed_lookup_is_reported() {
		let mut selector = Selector::<String>::default();
		assert!(ensure_loaded(&selector, "Series").is_ok());

		let ticket = selector.begin();
		selector.complete(ticket, Err::<Vec<String>, _>("connection refused"));
		let err = ensure_loaded(&selector, "Series").unwrap_err();
		assert_eq!(err.to_string(), "Series lookup failed: connection refused");
	}

	#[test]
	fn search_can_open_a_result() {
		let cli = Cli::try_parse_from(["interop-desk", "fhir", "search", "Doe", "--select", "1"])
			.unwrap();
		let Command::Fhir(FhirCommand::Search { query, select }) = cli.command else {
			panic!("expected fhir search");
		};
		assert_eq!(query, "Doe");
		assert_eq!(select, Some(1));
	}

	#[test]
	fn gender_is_parsed() {
		let cli = Cli::try_parse_from([
			"interop-desk",
			"hl7",
			"admit",
			"P42",
			"Doe",
			"Jane",
			"1990-12-31",
			"F",
		])
		.unwrap();
		assert!(matches!(
			cli.command,
			Command::Hl7(Hl7Command::Admit {
				gender: Gender::Female,
				..
			})
		));
		let unknown = ["interop-desk", "hl7", "admit", "P42", "Doe", "Jane", "1990-12-31", "Q"];
		assert!(Cli::try_parse_from(unknown).is_err());
	}

	#[test]
	fn inspect_reads_send_time() {
		let message = Message::parse(
			"MSH|^~\\&|LINFO2381|JavaScript|STUDENT|Python|20250401185134||ORU^R01|MSG_ID_1|P|2.1\r",
		)
		.unwrap();
		assert!(inspect(&message).is_ok());

		let broken = Message::parse("MSH|^~\\&|A|B|C|D|2025||ORU^R01|MSG_ID_1|P|2.1").unwrap();
		assert!(inspect(&broken).is_err());
	}
}
