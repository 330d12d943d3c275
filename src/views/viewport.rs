use crate::rendering::{RenderedImage, RenderingError};
use crate::views::{RequestGate, Ticket};
use std::collections::HashMap;
use tracing::{debug, trace};
use uuid::Uuid;

/// Rendered images addressable by object URL (`blob:<uuid>`) until revoked.
#[derive(Debug, Default)]
pub struct BlobStore {
	blobs: HashMap<String, RenderedImage>,
}

impl BlobStore {
	pub fn create_object_url(&mut self, image: RenderedImage) -> String {
		let url = format!("blob:{}", Uuid::new_v4());
		self.blobs.insert(url.clone(), image);
		trace!(url, "Created object URL");
		url
	}

	/// Releases the image behind `url`. Returns `false` if it was unknown or already revoked.
	pub fn revoke_object_url(&mut self, url: &str) -> bool {
		let revoked = self.blobs.remove(url).is_some();
		if revoked {
			trace!(url, "Revoked object URL");
		}
		revoked
	}

	pub fn get(&self, url: &str) -> Option<&RenderedImage> {
		self.blobs.get(url)
	}

	fn len(&self) -> usize {
		self.blobs.len()
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayedImage {
	pub url: String,
	pub width: u32,
	pub height: u32,
}

/// The image element of the viewer. At most one object URL is alive at any time.
#[derive(Debug, Default)]
pub struct Viewport {
	blobs: BlobStore,
	current: Option<DisplayedImage>,
	gate: RequestGate,
}

impl Viewport {
	pub const fn current(&self) -> Option<&DisplayedImage> {
		self.current.as_ref()
	}

	pub fn current_image(&self) -> Option<&RenderedImage> {
		self.current
			.as_ref()
			.and_then(|displayed| self.blobs.get(&displayed.url))
	}

	/// Number of object URLs that have not been revoked.
	pub fn live_urls(&self) -> usize {
		self.blobs.len()
	}

	/// Starts a render; a render started later supersedes this one.
	pub fn begin(&mut self) -> Ticket {
		self.gate.issue()
	}

	/// Displays `image` and revokes the URL of the image it replaces.
	///
	/// Returns `Ok(false)` without touching the viewport if the render was superseded. Images
	/// that cannot be decoded leave the previous image in place.
	pub fn show(&mut self, ticket: Ticket, image: RenderedImage) -> Result<bool, RenderingError> {
		if !self.gate.is_current(ticket) {
			debug!("Discarding superseded render");
			return Ok(false);
		}
		let (width, height) = image.dimensions()?;
		let url = self.blobs.create_object_url(image);

		if let Some(previous) = self.current.replace(DisplayedImage { url, width, height }) {
			self.blobs.revoke_object_url(&previous.url);
		}
		Ok(true)
	}

	/// Removes the image and drops any render in flight.
	pub fn clear(&mut self) {
		self.gate.invalidate();
		if let Some(previous) = self.current.take() {
			self.blobs.revoke_object_url(&previous.url);
		}
	}
}
