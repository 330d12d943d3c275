//! Study → series → instance drill-down with a slice viewer.

use crate::api::dicomweb::{DicomwebService, InstanceKey, SeriesSummary, StudyFilter, StudySummary};
use crate::types::UI;
use crate::views::viewport::Viewport;
use crate::views::Selector;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A mouse wheel notch over the image, as reported by the browser engine.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum WheelEvent {
	/// Legacy Gecko `DOMMouseScroll`: the movement is in `detail`.
	LegacyGecko { detail: i32 },
	/// `mousewheel` / `wheel`: the movement is in `deltaY`.
	Standard { delta_y: f64 },
}

impl WheelEvent {
	/// Builds the event the way the page listens to it: Firefox gets `DOMMouseScroll`.
	pub fn from_engine(user_agent: &str, detail: i32, delta_y: f64) -> Self {
		if user_agent.to_lowercase().contains("firefox") {
			Self::LegacyGecko { detail }
		} else {
			Self::Standard { delta_y }
		}
	}

	/// `-1` towards the first slice, `+1` towards the last one, `0` for no movement.
	pub fn direction(self) -> i8 {
		match self {
			Self::LegacyGecko { detail } => match detail.cmp(&0) {
				Ordering::Less => -1,
				Ordering::Equal => 0,
				Ordering::Greater => 1,
			},
			Self::Standard { delta_y } if delta_y < 0.0 => -1,
			Self::Standard { delta_y } if delta_y > 0.0 => 1,
			Self::Standard { .. } => 0,
		}
	}
}

/// The instances of the selected series and the slider position over them.
#[derive(Debug, Default)]
pub struct InstanceSlider {
	instances: Selector<UI>,
	index: usize,
}

impl InstanceSlider {
	pub fn len(&self) -> usize {
		self.instances.options().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub const fn index(&self) -> usize {
		self.index
	}

	/// Highest valid index, `None` when there is nothing to show.
	pub fn max(&self) -> Option<usize> {
		self.len().checked_sub(1)
	}

	pub fn current(&self) -> Option<&UI> {
		self.instances.options().get(self.index)
	}

	pub const fn selector(&self) -> &Selector<UI> {
		&self.instances
	}

	fn clear(&mut self) {
		self.instances.clear();
		self.index = 0;
	}
}

pub struct DicomBrowser {
	service: Arc<dyn DicomwebService>,
	studies: Selector<StudySummary>,
	series: Selector<SeriesSummary>,
	slider: InstanceSlider,
	viewport: Viewport,
}

impl DicomBrowser {
	pub fn new(service: Arc<dyn DicomwebService>) -> Self {
		Self {
			service,
			studies: Selector::default(),
			series: Selector::default(),
			slider: InstanceSlider::default(),
			viewport: Viewport::default(),
		}
	}

	pub const fn studies(&self) -> &Selector<StudySummary> {
		&self.studies
	}

	pub const fn series(&self) -> &Selector<SeriesSummary> {
		&self.series
	}

	pub const fn slider(&self) -> &InstanceSlider {
		&self.slider
	}

	pub const fn viewport(&self) -> &Viewport {
		&self.viewport
	}

	/// Searches studies, then cascades into the series of the previously selected study if it
	/// is still listed, or of the first one.
	#[instrument(skip(self))]
	pub async fn lookup_studies(&mut self, filter: &StudyFilter) {
		let previous = self
			.studies
			.selected()
			.map(|study| study.study_instance_uid.clone());

		let ticket = self.studies.begin();
		self.series.clear();
		self.slider.clear();
		self.viewport.clear();

		let outcome = self.service.lookup_studies(filter).await;
		if let Err(err) = &outcome {
			warn!("Study lookup failed: {err}");
		}
		if !self.studies.complete(ticket, outcome) {
			return;
		}
		info!(studies = self.studies.options().len(), "Studies loaded");

		if let Some(previous) = previous {
			self.studies
				.select_where(|study| study.study_instance_uid == previous);
		}
		self.lookup_series().await;
	}

	/// Selects another study and reloads everything below it.
	pub async fn select_study(&mut self, index: usize) -> bool {
		if !self.studies.select(index) {
			return false;
		}
		self.lookup_series().await;
		true
	}

	/// Selects another series and reloads its instances.
	pub async fn select_series(&mut self, index: usize) -> bool {
		if !self.series.select(index) {
			return false;
		}
		self.lookup_instances().await;
		true
	}

	#[instrument(skip(self))]
	pub async fn lookup_series(&mut self) {
		let Some(study) = self
			.studies
			.selected()
			.map(|study| study.study_instance_uid.clone())
		else {
			debug!("No study selected");
			return;
		};

		let ticket = self.series.begin();
		self.slider.clear();
		self.viewport.clear();

		let outcome = self.service.lookup_series(&study).await.map(|series| {
			series
				.into_iter()
				.filter(SeriesSummary::is_renderable)
				.collect::<Vec<_>>()
		});
		if let Err(err) = &outcome {
			warn!(study, "Series lookup failed: {err}");
		}
		if !self.series.complete(ticket, outcome) {
			return;
		}
		self.lookup_instances().await;
	}

	#[instrument(skip(self))]
	pub async fn lookup_instances(&mut self) {
		let (Some(study), Some(series)) = (
			self.studies
				.selected()
				.map(|study| study.study_instance_uid.clone()),
			self.series
				.selected()
				.map(|series| series.series_instance_uid.clone()),
		) else {
			debug!("No series selected");
			return;
		};

		self.slider.index = 0;
		let ticket = self.slider.instances.begin();
		self.viewport.clear();

		let outcome = self.service.lookup_instances(&study, &series).await;
		if let Err(err) = &outcome {
			warn!(study, series, "Instance lookup failed: {err}");
		}
		if !self.slider.instances.complete(ticket, outcome) {
			return;
		}

		// Open mid-series rather than at the first slice
		self.slider.index = self.slider.len() / 2;
		info!(instances = self.slider.len(), index = self.slider.index, "Instances loaded");
		self.render_instance(self.slider.index).await;
	}

	/// Fetches and displays the instance at `index`. Out-of-range indices are ignored.
	#[instrument(skip(self))]
	pub async fn render_instance(&mut self, index: usize) {
		let (Some(study), Some(series), Some(instance)) = (
			self.studies.selected(),
			self.series.selected(),
			self.slider.instances.options().get(index),
		) else {
			return;
		};
		let key = InstanceKey {
			study_instance_uid: study.study_instance_uid.clone(),
			series_instance_uid: series.series_instance_uid.clone(),
			sop_instance_uid: instance.clone(),
		};

		let ticket = self.viewport.begin();
		match self.service.render_instance(&key).await {
			Ok(image) => {
				if let Err(err) = self.viewport.show(ticket, image) {
					warn!(
						sop_instance_uid = key.sop_instance_uid,
						"Cannot display rendered instance: {err}"
					);
				}
			}
			Err(err) => warn!(sop_instance_uid = key.sop_instance_uid, "Rendering failed: {err}"),
		}
	}

	/// Moves the slider to `index` and renders. Returns `false` (no-op) when out of range.
	pub async fn set_index(&mut self, index: usize) -> bool {
		if index >= self.slider.len() {
			return false;
		}
		self.slider.index = index;
		self.render_instance(index).await;
		true
	}

	/// Moves one slice backwards (`direction < 0`) or forwards (`direction > 0`).
	/// Movement past either end is a no-op.
	pub async fn step(&mut self, direction: i8) -> bool {
		let target = match direction {
			d if d < 0 => self.slider.index.checked_sub(1),
			d if d > 0 => Some(self.slider.index + 1),
			_ => None,
		};
		match target {
			Some(index) => self.set_index(index).await,
			None => false,
		}
	}

	pub async fn scroll(&mut self, event: WheelEvent) -> bool {
		self.step(event.direction()).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::api::ClientError;
	use crate::rendering::{sample_png, RenderedImage, RenderedMediaType};
	use crate::views::LoadState;
	use async_trait::async_trait;
	use reqwest::StatusCode;
	use std::collections::HashMap;
	use std::sync::Mutex;

	#[derive(Default)]
	struct FakeArchive {
		studies: Vec<StudySummary>,
		series: HashMap<String, Vec<SeriesSummary>>,
		instances: HashMap<String, Vec<UI>>,
		calls: Mutex<Vec<String>>,
	}

	impl FakeArchive {
		fn with_study(mut self, uid: &str, series: &[(&str, &str, usize)]) -> Self {
			self.studies.push(StudySummary {
				study_instance_uid: uid.to_owned(),
				patient_id: String::from("P1"),
				patient_name: String::from("DOE^JOHN"),
				study_description: String::from("CT"),
			});
			let mut listed = Vec::new();
			for (series_uid, modality, count) in series {
				listed.push(SeriesSummary {
					series_instance_uid: (*series_uid).to_owned(),
					modality: (*modality).to_owned(),
					series_description: String::new(),
				});
				self.instances.insert(
					(*series_uid).to_owned(),
					(0..*count).map(|i| format!("{series_uid}.{i}")).collect(),
				);
			}
			self.series.insert(uid.to_owned(), listed);
			self
		}

		fn calls(&self) -> Vec<String> {
			self.calls.lock().unwrap().clone()
		}

		fn log(&self, call: String) {
			self.calls.lock().unwrap().push(call);
		}
	}

	fn not_found(endpoint: &'static str) -> ClientError {
		ClientError::Status {
			endpoint,
			status: StatusCode::NOT_FOUND,
		}
	}

	#[async_trait]
	impl DicomwebService for FakeArchive {
		async fn lookup_studies(&self, _filter: &StudyFilter) -> Result<Vec<StudySummary>, ClientError> {
			self.log(String::from("studies"));
			Ok(self.studies.clone())
		}

		async fn lookup_series(&self, study: &str) -> Result<Vec<SeriesSummary>, ClientError> {
			self.log(format!("series {study}"));
			self.series
				.get(study)
				.cloned()
				.ok_or_else(|| not_found("lookup-series"))
		}

		async fn lookup_instances(&self, _study: &str, series: &str) -> Result<Vec<UI>, ClientError> {
			self.log(format!("instances {series}"));
			self.instances
				.get(series)
				.cloned()
				.ok_or_else(|| not_found("lookup-instances"))
		}

		async fn render_instance(&self, instance: &InstanceKey) -> Result<RenderedImage, ClientError> {
			self.log(format!("render {}", instance.sop_instance_uid));
			Ok(RenderedImage::new(RenderedMediaType::Png, sample_png(1, 1)))
		}
	}

	fn archive() -> Arc<FakeArchive> {
		Arc::new(
			FakeArchive::default()
				.with_study("1", &[("1.1", "RTDOSE", 1), ("1.2", "CT", 5), ("1.3", "RTSTRUCT", 1)])
				.with_study("2", &[("2.1", "MR", 4), ("2.2", "CT", 1)]),
		)
	}

	fn rendered(archive: &FakeArchive) -> Vec<String> {
		archive
			.calls()
			.into_iter()
			.filter(|call| call.starts_with("render"))
			.collect()
	}

	#[tokio::test]
	async fn lookup_cascades_to_middle_slice() {
		let archive = archive();
		let mut browser = DicomBrowser::new(archive.clone());

		browser.lookup_studies(&StudyFilter::default()).await;

		assert_eq!(browser.studies().options().len(), 2);
		assert_eq!(browser.studies().selected().unwrap().study_instance_uid, "1");
		// RT dose and structure sets are filtered out
		let series: Vec<&str> = browser
			.series()
			.options()
			.iter()
			.map(|series| series.series_instance_uid.as_str())
			.collect();
		assert_eq!(series, vec!["1.2"]);
		assert_eq!(browser.slider().len(), 5);
		assert_eq!(browser.slider().index(), 2);
		assert_eq!(browser.slider().max(), Some(4));
		assert_eq!(
			archive.calls(),
			vec!["studies", "series 1", "instances 1.2", "render 1.2.2"]
		);
		assert!(browser.viewport().current().is_some());
	}

	#[tokio::test]
	async fn initial_index_is_half_the_count() {
		for count in 1..=9 {
			let archive = Arc::new(FakeArchive::default().with_study("1", &[("1.1", "CT", count)]));
			let mut browser = DicomBrowser::new(archive);
			browser.lookup_studies(&StudyFilter::default()).await;
			assert_eq!(browser.slider().index(), count / 2, "count = {count}");
		}
	}

	#[tokio::test]
	async fn navigation_stays_in_bounds() {
		let archive = archive();
		let mut browser = DicomBrowser::new(archive.clone());
		browser.lookup_studies(&StudyFilter::default()).await;

		for _ in 0..10 {
			browser.step(1).await;
			assert!(browser.slider().index() <= 4);
		}
		assert_eq!(browser.slider().index(), 4);
		assert!(!browser.step(1).await);

		for _ in 0..10 {
			browser.step(-1).await;
		}
		assert_eq!(browser.slider().index(), 0);
		assert!(!browser.step(-1).await);
		assert!(!browser.set_index(5).await);
		assert!(browser.set_index(3).await);
		assert_eq!(browser.slider().current().map(String::as_str), Some("1.2.3"));

		// Out-of-range moves never hit the backend
		assert_eq!(rendered(&archive).len(), 1 + 2 + 4 + 1);
		assert_eq!(browser.viewport().live_urls(), 1);
	}

	#[tokio::test]
	async fn selecting_study_clears_downstream() {
		let archive = archive();
		let mut browser = DicomBrowser::new(archive.clone());
		browser.lookup_studies(&StudyFilter::default()).await;

		assert!(browser.select_study(1).await);
		let series: Vec<&str> = browser
			.series()
			.options()
			.iter()
			.map(|series| series.series_instance_uid.as_str())
			.collect();
		assert_eq!(series, vec!["2.1", "2.2"]);
		assert_eq!(browser.slider().len(), 4);
		assert_eq!(browser.slider().current().map(String::as_str), Some("2.1.2"));

		assert!(browser.select_series(1).await);
		assert_eq!(browser.slider().len(), 1);
		assert_eq!(browser.slider().index(), 0);

		assert!(!browser.select_study(7).await);
		assert_eq!(browser.viewport().live_urls(), 1);
	}

	#[tokio::test]
	async fn new_search_keeps_selected_study() {
		let archive = archive();
		let mut browser = DicomBrowser::new(archive.clone());
		browser.lookup_studies(&StudyFilter::default()).await;
		browser.select_study(1).await;

		browser.lookup_studies(&StudyFilter::default()).await;
		assert_eq!(browser.studies().selected().unwrap().study_instance_uid, "2");
		assert_eq!(archive.calls().last().unwrap(), "render 2.1.2");
	}

	#[tokio::test]
	async fn failed_lookup_leaves_levels_empty() {
		let archive = Arc::new(FakeArchive {
			studies: vec![StudySummary {
				study_instance_uid: String::from("orphan"),
				patient_id: String::new(),
				patient_name: String::new(),
				study_description: String::new(),
			}],
			..FakeArchive::default()
		});
		let mut browser = DicomBrowser::new(archive);
		browser.lookup_studies(&StudyFilter::default()).await;

		assert!(matches!(browser.series().state(), LoadState::Failed(_)));
		assert!(browser.series().options().is_empty());
		assert!(browser.slider().is_empty());
		assert_eq!(browser.slider().max(), None);
		assert!(browser.viewport().current().is_none());
		assert!(!browser.step(1).await);
	}

	#[test]
	fn wheel_normalization() {
		let firefox = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";
		let chrome = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 Chrome/126.0 Safari/537.36";

		assert_eq!(WheelEvent::from_engine(firefox, -3, 0.0).direction(), -1);
		assert_eq!(WheelEvent::from_engine(firefox, 3, -100.0).direction(), 1);
		assert_eq!(WheelEvent::from_engine(chrome, 3, -100.0).direction(), -1);
		assert_eq!(WheelEvent::from_engine(chrome, 0, 53.0).direction(), 1);
		assert_eq!(WheelEvent::from_engine(chrome, 0, 0.0).direction(), 0);
	}

	#[tokio::test]
	async fn scroll_moves_one_slice() {
		let mut browser = DicomBrowser::new(archive());
		browser.lookup_studies(&StudyFilter::default()).await;

		assert!(browser.scroll(WheelEvent::Standard { delta_y: 120.0 }).await);
		assert_eq!(browser.slider().index(), 3);
		assert!(browser.scroll(WheelEvent::LegacyGecko { detail: -3 }).await);
		assert_eq!(browser.slider().index(), 2);
		assert!(!browser.scroll(WheelEvent::Standard { delta_y: 0.0 }).await);
	}
}
