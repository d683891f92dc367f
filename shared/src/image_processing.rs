//! Image intake: validation of user selections and base64 encoding.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::ImageFormat;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::MAX_IMAGE_BYTES;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("The selected file is empty.")]
    EmptyInput,

    #[error("The photo is too large ({size} bytes). Please use one smaller than {max_size} bytes.")]
    InputTooLarge { size: usize, max_size: usize },

    #[error("'{0}' is not an image type. Please select a photo.")]
    NotAnImage(String),

    #[error("The file claims to be {declared} but its contents look like {detected}.")]
    MediaTypeMismatch { declared: String, detected: String },
}

/// A photo chosen by the user, validated against its declared media type.
#[derive(Clone, PartialEq, Eq)]
pub struct SelectedImage {
    bytes: Vec<u8>,
    media_type: String,
}

impl SelectedImage {
    #[instrument(skip(bytes, media_type), fields(input_size = bytes.len()))]
    pub fn new(bytes: Vec<u8>, media_type: impl AsRef<str>) -> Result<Self, ImageError> {
        let media_type = normalize_media_type(media_type.as_ref());
        validate(&bytes, &media_type)?;
        debug!(media_type = %media_type, "image accepted");
        Ok(Self { bytes, media_type })
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn encode(&self) -> EncodedImage {
        EncodedImage {
            mime_type: self.media_type.clone(),
            data: STANDARD.encode(&self.bytes),
        }
    }
}

// Never dump raw image bytes into logs.
impl fmt::Debug for SelectedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedImage")
            .field("media_type", &self.media_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

/// Text-safe form of a [`SelectedImage`], ready for a JSON body.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    mime_type: String,
    data: String,
}

impl EncodedImage {
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    #[must_use]
    pub fn data(&self) -> &str {
        &self.data
    }

    /// `data:` URL suitable for an `<img src>` preview.
    #[must_use]
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("mime_type", &self.mime_type)
            .field("encoded_len", &self.data.len())
            .finish()
    }
}

fn normalize_media_type(raw: &str) -> String {
    let essence = raw.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    match essence.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        _ => essence,
    }
}

fn validate(bytes: &[u8], media_type: &str) -> Result<(), ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::EmptyInput);
    }

    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ImageError::InputTooLarge {
            size: bytes.len(),
            max_size: MAX_IMAGE_BYTES,
        });
    }

    if !media_type.starts_with("image/") || media_type.len() == "image/".len() {
        return Err(ImageError::NotAnImage(media_type.to_string()));
    }

    // Types the image crate does not know (HEIC, SVG, ...) are passed through
    // unchecked; the service decides whether it can read them.
    let Some(declared) = ImageFormat::from_mime_type(media_type) else {
        return Ok(());
    };

    match image::guess_format(bytes) {
        Ok(detected) if detected == declared => Ok(()),
        Ok(detected) => Err(ImageError::MediaTypeMismatch {
            declared: media_type.to_string(),
            detected: detected.to_mime_type().to_string(),
        }),
        Err(_) => Err(ImageError::MediaTypeMismatch {
            declared: media_type.to_string(),
            detected: "unrecognized data".to_string(),
        }),
    }
}
