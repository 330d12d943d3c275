use bytes::Bytes;
use image::ImageFormat;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;
use tracing::{instrument, trace};

#[derive(Debug, Error)]
pub enum RenderingError {
	#[error(transparent)]
	Image(#[from] image::ImageError),
}

/// An instance rendered by the backend, as received over the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
	pub media_type: RenderedMediaType,
	pub data: Bytes,
}

impl RenderedImage {
	pub const fn new(media_type: RenderedMediaType, data: Bytes) -> Self {
		Self { media_type, data }
	}

	/// Decodes the image to make sure it can be displayed and returns its size.
	#[instrument(skip_all)]
	pub fn dimensions(&self) -> Result<(u32, u32), RenderingError> {
		let image = image::load_from_memory_with_format(&self.data, self.media_type.format())?;
		trace!(
			width = image.width(),
			height = image.height(),
			media_type = %self.media_type,
			"Decoded rendered image"
		);
		Ok((image.width(), image.height()))
	}
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum RenderedMediaType {
	Jpeg,
	#[default]
	Png,
	Gif,
}

impl Display for RenderedMediaType {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

impl RenderedMediaType {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Jpeg => "image/jpeg",
			Self::Png => "image/png",
			Self::Gif => "image/gif",
		}
	}

	pub const fn format(self) -> ImageFormat {
		match self {
			Self::Jpeg => ImageFormat::Jpeg,
			Self::Png => ImageFormat::Png,
			Self::Gif => ImageFormat::Gif,
		}
	}

	/// Picks the media type from a `Content-Type` header value, ignoring parameters.
	/// Backends that omit the header (or send something else) are assumed to return PNG.
	pub fn from_content_type(content_type: Option<&str>) -> Self {
		content_type
			.and_then(|value| value.parse::<mime::Mime>().ok())
			.and_then(|mime| mime.essence_str().parse().ok())
			.unwrap_or_default()
	}
}

#[derive(Debug, Error)]
#[error("`{0}` is not a supported rendered media type")]
pub struct ParseRenderedMediaTypeError(String);

impl FromStr for RenderedMediaType {
	type Err = ParseRenderedMediaTypeError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"image/png" => Ok(Self::Png),
			"image/jpeg" => Ok(Self::Jpeg),
			"image/gif" => Ok(Self::Gif),
			_ => Err(ParseRenderedMediaTypeError(s.to_owned())),
		}
	}
}

#[cfg(test)]
pub(crate) fn sample_png(width: u32, height: u32) -> Bytes {
	let image = image::DynamicImage::new_luma8(width, height);
	let mut buffer = std::io::Cursor::new(Vec::new());
	image.write_to(&mut buffer, ImageFormat::Png).unwrap();
	Bytes::from(buffer.into_inner())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn media_type_from_header() {
		assert_eq!(
			RenderedMediaType::from_content_type(Some("image/jpeg")),
			RenderedMediaType::Jpeg
		);
		assert_eq!(
			RenderedMediaType::from_content_type(Some("image/gif; charset=binary")),
			RenderedMediaType::Gif
		);
		assert_eq!(
			RenderedMediaType::from_content_type(Some("application/octet-stream")),
			RenderedMediaType::Png
		);
		assert_eq!(RenderedMediaType::from_content_type(None), RenderedMediaType::Png);
	}

	#[test]
	fn decode_png_dimensions() {
		let image = RenderedImage::new(RenderedMediaType::Png, sample_png(4, 3));
		assert_eq!(image.dimensions().unwrap(), (4, 3));
	}

	#[test]
	fn reject_garbage() {
		let image = RenderedImage::new(RenderedMediaType::Png, Bytes::from_static(b"not a png"));
		assert!(image.dimensions().is_err());
	}
}
