use crate::models::{AdDefinition, MediaFile, ResourceKind};
use log::debug;
use serde::Serialize;

/// MIME type of script-executed creatives
pub const SCRIPT_MIME_TYPE: &str = "application/javascript";

/// The creative the driver will load for an ad, with its init parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreativeSelection {
    pub media_file: MediaFile,

    /// `AdParameters` blob passed to `initAd` as creative data
    pub ad_parameters: String,

    /// Creative size, taken from the parent element when the media node has none
    pub dimensions: Option<(u32, u32)>,

    pub linear: bool,
}

/// Pick the first media file targeting `required_framework` with the script MIME type
pub fn select_media_file<'a>(
    candidates: &'a [MediaFile],
    required_framework: &str,
) -> Option<&'a MediaFile> {
    candidates.iter().find(|media| {
        media.api_framework.as_deref() == Some(required_framework)
            && media.mime_type == SCRIPT_MIME_TYPE
    })
}

/// Width and height of a media node, falling back to its wrapping element
pub fn resolve_dimensions(media: &MediaFile, parent: Option<(u32, u32)>) -> Option<(u32, u32)> {
    match (media.width, media.height) {
        (Some(width), Some(height)) if width > 0 && height > 0 => Some((width, height)),
        _ => parent.filter(|(width, height)| *width > 0 && *height > 0),
    }
}

/// Select the playable creative of an ad for the given framework.
///
/// Linear creatives are chosen from `MediaFiles`; a non-linear creative is
/// playable when its static resource is a script targeting the framework.
/// `None` means this driver cannot play the ad.
pub fn select_creative(ad: &AdDefinition, required_framework: &str) -> Option<CreativeSelection> {
    if let Some(linear) = &ad.linear {
        let media_file = select_media_file(&linear.media_files, required_framework)?;
        return Some(CreativeSelection {
            media_file: media_file.clone(),
            ad_parameters: linear.ad_parameters.clone().unwrap_or_default(),
            dimensions: resolve_dimensions(media_file, None),
            linear: true,
        });
    }

    let non_linear = ad.non_linear.as_ref()?;
    if non_linear.resource_kind != ResourceKind::Static {
        debug!("Ad {:?} has a {:?} overlay, not a script", ad.id, non_linear.resource_kind);
        return None;
    }

    let candidate = MediaFile {
        url: non_linear.resource_data.clone(),
        mime_type: non_linear.creative_type.clone().unwrap_or_default(),
        api_framework: non_linear.api_framework.clone(),
        width: None,
        height: None,
        bitrate: None,
        delivery: None,
    };
    let media_file = select_media_file(std::slice::from_ref(&candidate), required_framework)?;

    Some(CreativeSelection {
        media_file: media_file.clone(),
        ad_parameters: non_linear.ad_parameters.clone().unwrap_or_default(),
        dimensions: resolve_dimensions(media_file, Some((non_linear.width, non_linear.height))),
        linear: false,
    })
}
