// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Image decoding and encoding at the pipeline boundary

use crate::error::{Error, Result};
use crate::types::ClassMap;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};
use std::fs;
use std::io::Cursor;
use std::path::Path;

/// JPEG quality used for composite output
pub const JPEG_QUALITY: u8 = 95;

/// Load a room or texture image from disk as 8-bit RGB
pub fn load_rgb(path: &Path) -> Result<RgbImage> {
    let img = image::open(path).map_err(|source| Error::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(img.into_rgb8())
}

/// Load a class map stored as an 8-bit grayscale image of label indices
pub fn load_class_map(path: &Path) -> Result<ClassMap> {
    let img = image::open(path).map_err(|source| Error::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(img.into_luma8())
}

/// Output encodings for composites
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg,
}

impl OutputFormat {
    /// Pick the format from the file extension; anything but `.jpg`/`.jpeg` is PNG
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("jpg") | Some("jpeg") => OutputFormat::Jpeg,
            _ => OutputFormat::Png,
        }
    }
}

/// Encode an image to bytes
pub fn encode(image: &RgbImage, format: OutputFormat) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    match format {
        OutputFormat::Png => {
            image
                .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
                .map_err(Error::ImageEncode)?;
        }
        OutputFormat::Jpeg => {
            let mut encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
            encoder.encode_image(image).map_err(Error::ImageEncode)?;
        }
    }
    Ok(bytes)
}

/// Encode and write an image, choosing the format from the extension.
///
/// Missing parent directories are created.
pub fn save(image: &RgbImage, path: &Path) -> Result<()> {
    let bytes = encode(image, OutputFormat::from_path(path))?;

    let write_err = |source| Error::ImageWrite {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
    }
    fs::write(path, bytes).map_err(write_err)
}
