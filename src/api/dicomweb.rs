use crate::api::{ClientError, HttpBackend};
use crate::rendering::{RenderedImage, RenderedMediaType};
use crate::types::UI;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{instrument, trace};

/// Modalities that cannot be rendered as an image (dose grids, structure sets).
pub const NON_RENDERABLE_MODALITIES: &[&str] = &["RTDOSE", "RTSTRUCT"];

/// Study, series and instance lookups plus instance rendering, proxied by the backend to a
/// DICOMweb server (QIDO-RS and WADO-RS).
#[async_trait]
pub trait DicomwebService: Send + Sync {
	async fn lookup_studies(&self, filter: &StudyFilter) -> Result<Vec<StudySummary>, ClientError>;

	async fn lookup_series(&self, study_instance_uid: &str) -> Result<Vec<SeriesSummary>, ClientError>;

	/// SOP Instance UIDs of the series, in display order.
	async fn lookup_instances(
		&self,
		study_instance_uid: &str,
		series_instance_uid: &str,
	) -> Result<Vec<UI>, ClientError>;

	async fn render_instance(&self, instance: &InstanceKey) -> Result<RenderedImage, ClientError>;
}

/// Study search criteria. Empty strings match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct StudyFilter {
	pub patient_id: String,
	pub patient_name: String,
	pub study_description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StudySummary {
	pub study_instance_uid: UI,
	#[serde(default)]
	pub patient_id: String,
	#[serde(default)]
	pub patient_name: String,
	#[serde(default)]
	pub study_description: String,
}

impl StudySummary {
	pub fn label(&self) -> String {
		format!(
			"{} - {} - {}",
			self.patient_id, self.patient_name, self.study_description
		)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SeriesSummary {
	pub series_instance_uid: UI,
	#[serde(default)]
	pub modality: String,
	#[serde(default)]
	pub series_description: String,
}

impl SeriesSummary {
	pub fn label(&self) -> String {
		format!("{} - {}", self.modality, self.series_description)
	}

	pub fn is_renderable(&self) -> bool {
		!NON_RENDERABLE_MODALITIES.contains(&self.modality.as_str())
	}
}

/// Fully qualified reference to one SOP instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct InstanceKey {
	pub study_instance_uid: UI,
	pub series_instance_uid: UI,
	pub sop_instance_uid: UI,
}

#[async_trait]
impl DicomwebService for HttpBackend {
	#[instrument(skip(self))]
	async fn lookup_studies(&self, filter: &StudyFilter) -> Result<Vec<StudySummary>, ClientError> {
		self.post_json("lookup-studies", filter).await
	}

	#[instrument(skip(self))]
	async fn lookup_series(&self, study_instance_uid: &str) -> Result<Vec<SeriesSummary>, ClientError> {
		self.post_json(
			"lookup-series",
			&json!({ "study-instance-uid": study_instance_uid }),
		)
		.await
	}

	#[instrument(skip(self))]
	async fn lookup_instances(
		&self,
		study_instance_uid: &str,
		series_instance_uid: &str,
	) -> Result<Vec<UI>, ClientError> {
		self.post_json(
			"lookup-instances",
			&json!({
				"study-instance-uid": study_instance_uid,
				"series-instance-uid": series_instance_uid,
			}),
		)
		.await
	}

	#[instrument(skip(self))]
	async fn render_instance(&self, instance: &InstanceKey) -> Result<RenderedImage, ClientError> {
		const ENDPOINT: &str = "render-instance";
		let response = Self::execute(ENDPOINT, self.post(ENDPOINT)?.json(instance)).await?;
		let media_type = RenderedMediaType::from_content_type(
			response
				.headers()
				.get(CONTENT_TYPE)
				.and_then(|value| value.to_str().ok()),
		);
		let data = response
			.bytes()
			.await
			.map_err(|source| ClientError::Transport {
				endpoint: ENDPOINT,
				source,
			})?;
		trace!(bytes = data.len(), %media_type, "Received rendered instance");
		Ok(RenderedImage::new(media_type, data))
	}
}
