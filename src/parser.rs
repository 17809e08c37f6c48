use crate::error::{Result, VastError};
use crate::models::*;
use crate::version::VastVersion;
use log::{debug, warn};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;
use std::str::from_utf8;

/// Parse a VAST XML response into its normalized ads.
///
/// Fails for the whole response when the root element is not `VAST` or its
/// version is missing or unsupported. A single malformed `<Ad>` is dropped
/// without affecting the rest of the batch.
pub fn parse_vast(xml: &str) -> Result<VastResponse> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();

    // Look for the VAST element
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"VAST" => {
                let version = attribute(e, b"version")
                    .ok_or_else(|| VastError::MissingField("VAST version".to_string()))?;

                if VastVersion::parse(&version).is_none() {
                    return Err(VastError::InvalidVersion(version));
                }

                return parse_vast_body(&mut reader, version);
            }
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"VAST" => {
                let version = attribute(e, b"version")
                    .ok_or_else(|| VastError::MissingField("VAST version".to_string()))?;
                if VastVersion::parse(&version).is_none() {
                    return Err(VastError::InvalidVersion(version));
                }
                return Ok(VastResponse {
                    version,
                    ads: Vec::new(),
                    error_urls: Vec::new(),
                });
            }
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                return Err(VastError::Other(format!("Unexpected root element: {}", name)));
            }
            Ok(Event::Eof) => return Err(VastError::MissingField("VAST".to_string())),
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }
}

/// Parse the children of the VAST element: Ad elements and root-level Error URLs
fn parse_vast_body(reader: &mut Reader<&[u8]>, version: String) -> Result<VastResponse> {
    let mut response = VastResponse {
        version,
        ads: Vec::new(),
        error_urls: Vec::new(),
    };
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"Ad" => {
                    if let Some(ad) = parse_ad_element(reader, e, &response.version)? {
                        response.ads.push(ad);
                    }
                }
                b"Error" => push_url(&mut response.error_urls, read_text_element(reader)?),
                _ => skip_element(reader, e.name().as_ref())?,
            },
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"Ad" => {
                warn!("Dropping empty Ad element {:?}", attribute(e, b"id"));
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"VAST" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    debug!(
        "Parsed VAST {} response with {} usable ads",
        response.version,
        response.ads.len()
    );

    Ok(response)
}

/// Everything an InLine or Wrapper element contributes to an ad
#[derive(Default)]
struct AdBody {
    title: String,
    impressions: Vec<String>,
    error_urls: Vec<String>,
    redirect_url: Option<String>,
    linear: Option<LinearPayload>,
    non_linear: Option<NonLinearPayload>,
    companions: Vec<CompanionAd>,
}

/// Normalize a single Ad element.
///
/// Returns `Ok(None)` when the ad has neither an InLine nor a Wrapper child.
fn parse_ad_element(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart,
    version: &str,
) -> Result<Option<AdDefinition>> {
    let id = attribute(start, b"id");
    let sequence = match attribute(start, b"sequence") {
        Some(raw) => match raw.trim().parse::<u32>() {
            Ok(seq) if seq > 0 => Some(seq),
            _ => {
                warn!("Ignoring invalid sequence {:?} on ad {:?}", raw, id);
                None
            }
        },
        None => None,
    };

    let mut body = None;
    let mut buf = Vec::new();

    // Parse InLine or Wrapper
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"InLine" if body.is_none() => {
                    body = Some((AdKind::Inline, parse_ad_body(reader, b"InLine")?));
                }
                b"Wrapper" if body.is_none() => {
                    body = Some((AdKind::Wrapper, parse_ad_body(reader, b"Wrapper")?));
                }
                _ => skip_element(reader, e.name().as_ref())?,
            },
            Ok(Event::Empty(ref e)) if body.is_none() => match e.name().as_ref() {
                b"InLine" => body = Some((AdKind::Inline, AdBody::default())),
                b"Wrapper" => body = Some((AdKind::Wrapper, AdBody::default())),
                _ => (),
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Ad" => break,
            Ok(Event::Eof) => {
                return Err(VastError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    let Some((kind, body)) = body else {
        warn!("Dropping ad {:?}: no InLine or Wrapper element", id);
        return Ok(None);
    };

    Ok(Some(AdDefinition {
        id,
        sequence,
        version: version.to_string(),
        kind,
        linear: body.linear,
        non_linear: body.non_linear,
        companions: body.companions,
        impressions: body.impressions,
        error_urls: body.error_urls,
        title: body.title,
        wrapper_redirect_url: body.redirect_url,
    }))
}

/// Parse an InLine or Wrapper element; both share the same child layout
fn parse_ad_body(reader: &mut Reader<&[u8]>, end: &[u8]) -> Result<AdBody> {
    let mut body = AdBody::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"AdTitle" => body.title = read_text_element(reader)?,
                b"Impression" => push_url(&mut body.impressions, read_text_element(reader)?),
                b"Error" => push_url(&mut body.error_urls, read_text_element(reader)?),
                b"VASTAdTagURI" => {
                    let url = read_text_element(reader)?;
                    if !url.is_empty() {
                        body.redirect_url = Some(url);
                    }
                }
                b"Creatives" => parse_creatives(reader, &mut body)?,
                _ => skip_element(reader, e.name().as_ref())?,
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == end => break,
            Ok(Event::Eof) => {
                return Err(VastError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(body)
}

/// Parse Creatives element, keeping the first Linear and NonLinearAds found
fn parse_creatives(reader: &mut Reader<&[u8]>, body: &mut AdBody) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"Creative" => {
                parse_creative(reader, body)?;
            }
            Ok(Event::Start(ref e)) => skip_element(reader, e.name().as_ref())?,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Creatives" => break,
            Ok(Event::Eof) => {
                return Err(VastError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(())
}

/// Parse Creative element
fn parse_creative(reader: &mut Reader<&[u8]>, body: &mut AdBody) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"Linear" => {
                    let linear = parse_linear(reader, e)?;
                    if body.linear.is_none() {
                        body.linear = Some(linear);
                    }
                }
                b"NonLinearAds" => {
                    let non_linear = parse_non_linear_ads(reader)?;
                    if body.non_linear.is_none() {
                        body.non_linear = non_linear;
                    }
                }
                b"CompanionAds" => body.companions.extend(parse_companion_ads(reader)?),
                _ => skip_element(reader, e.name().as_ref())?,
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Creative" => break,
            Ok(Event::Eof) => {
                return Err(VastError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(())
}

/// Parse Linear element
fn parse_linear(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<LinearPayload> {
    let mut linear = LinearPayload {
        skip_offset_raw: attribute(start, b"skipoffset"),
        ..LinearPayload::default()
    };
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"Duration" => {
                    let raw = read_text_element(reader)?;
                    linear.duration_seconds = parse_timecode(&raw).unwrap_or_else(|| {
                        warn!("Unparseable Duration {:?}, assuming 0", raw);
                        0.0
                    });
                }
                b"MediaFiles" => linear.media_files = parse_media_files(reader)?,
                b"VideoClicks" => parse_video_clicks(reader, &mut linear)?,
                b"TrackingEvents" => parse_tracking_events(reader, &mut linear.tracking)?,
                b"AdParameters" => linear.ad_parameters = Some(read_text_element(reader)?),
                _ => skip_element(reader, e.name().as_ref())?,
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Linear" => break,
            Ok(Event::Eof) => {
                return Err(VastError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(linear)
}

/// Parse MediaFiles element
fn parse_media_files(reader: &mut Reader<&[u8]>) -> Result<Vec<MediaFile>> {
    let mut media_files = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"MediaFile" => {
                let media_file = parse_media_file(reader, e)?;
                if media_file.url.is_empty() {
                    warn!("Skipping MediaFile without a URL");
                } else {
                    media_files.push(media_file);
                }
            }
            Ok(Event::Start(ref e)) => skip_element(reader, e.name().as_ref())?,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"MediaFiles" => break,
            Ok(Event::Eof) => {
                return Err(VastError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(media_files)
}

/// Parse MediaFile element
fn parse_media_file(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<MediaFile> {
    let media_file = MediaFile {
        mime_type: attribute(start, b"type").unwrap_or_default(),
        api_framework: attribute(start, b"apiFramework"),
        width: attribute_u32(start, b"width"),
        height: attribute_u32(start, b"height"),
        bitrate: attribute_u32(start, b"bitrate"),
        delivery: attribute(start, b"delivery"),
        // Read the MediaFile URL
        url: read_text_element(reader)?,
    };

    Ok(media_file)
}

/// Parse VideoClicks element
fn parse_video_clicks(reader: &mut Reader<&[u8]>, linear: &mut LinearPayload) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"ClickThrough" => {
                    let url = read_text_element(reader)?;
                    if !url.is_empty() {
                        linear.click_through = Some(url);
                    }
                }
                b"ClickTracking" => push_url(&mut linear.click_tracking, read_text_element(reader)?),
                b"CustomClick" => push_url(&mut linear.custom_click, read_text_element(reader)?),
                _ => skip_element(reader, e.name().as_ref())?,
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"VideoClicks" => break,
            Ok(Event::Eof) => {
                return Err(VastError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(())
}

/// Parse TrackingEvents element into a table keyed by `Tracking@event`
fn parse_tracking_events(
    reader: &mut Reader<&[u8]>,
    tracking: &mut HashMap<EventKind, Vec<String>>,
) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"Tracking" => {
                let event = attribute(e, b"event");
                let url = read_text_element(reader)?;
                match event {
                    Some(event) if !url.is_empty() => {
                        tracking.entry(EventKind::parse(&event)).or_default().push(url);
                    }
                    _ => warn!("Skipping Tracking element without event or URL"),
                }
            }
            Ok(Event::Start(ref e)) => skip_element(reader, e.name().as_ref())?,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"TrackingEvents" => break,
            Ok(Event::Eof) => {
                return Err(VastError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(())
}

/// The resources found under a NonLinear or Companion element
#[derive(Default)]
struct ResourceCandidates {
    static_resource: Option<(String, Option<String>)>,
    iframe: Option<String>,
    html: Option<String>,
}

impl ResourceCandidates {
    /// Try to consume a resource element; returns false for any other element
    fn read(&mut self, reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<bool> {
        match start.name().as_ref() {
            b"StaticResource" => {
                let creative_type = attribute(start, b"creativeType");
                let data = read_text_element(reader)?;
                if self.static_resource.is_none() && !data.is_empty() {
                    self.static_resource = Some((data, creative_type));
                }
            }
            b"IFrameResource" => {
                let data = read_text_element(reader)?;
                if self.iframe.is_none() && !data.is_empty() {
                    self.iframe = Some(data);
                }
            }
            b"HTMLResource" => {
                let data = read_text_element(reader)?;
                if self.html.is_none() && !data.is_empty() {
                    self.html = Some(data);
                }
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Pick one resource: static, then iframe, then html
    fn select(self) -> Option<(ResourceKind, String, Option<String>)> {
        if let Some((data, creative_type)) = self.static_resource {
            return Some((ResourceKind::Static, data, creative_type));
        }
        if let Some(data) = self.iframe {
            return Some((ResourceKind::IFrame, data, None));
        }
        self.html.map(|data| (ResourceKind::Html, data, None))
    }
}

/// Parse NonLinearAds element, keeping the first NonLinear with a usable resource
fn parse_non_linear_ads(reader: &mut Reader<&[u8]>) -> Result<Option<NonLinearPayload>> {
    let mut non_linear: Option<NonLinearPayload> = None;
    let mut tracking = HashMap::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"NonLinear" => {
                    let parsed = parse_non_linear(reader, e)?;
                    if non_linear.is_none() {
                        non_linear = parsed;
                    }
                }
                b"TrackingEvents" => parse_tracking_events(reader, &mut tracking)?,
                _ => skip_element(reader, e.name().as_ref())?,
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"NonLinearAds" => break,
            Ok(Event::Eof) => {
                return Err(VastError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(non_linear.map(|mut payload| {
        payload.tracking = tracking;
        payload
    }))
}

/// Parse NonLinear element
fn parse_non_linear(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart,
) -> Result<Option<NonLinearPayload>> {
    let width = attribute_u32(start, b"width").unwrap_or(0);
    let height = attribute_u32(start, b"height").unwrap_or(0);
    let expanded_width = attribute_u32(start, b"expandedWidth");
    let expanded_height = attribute_u32(start, b"expandedHeight");
    let api_framework = attribute(start, b"apiFramework");
    let min_suggested_duration =
        attribute(start, b"minSuggestedDuration").and_then(|raw| parse_timecode(&raw));

    let mut resources = ResourceCandidates::default();
    let mut click_through = None;
    let mut click_tracking = Vec::new();
    let mut ad_parameters = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if !resources.read(reader, e)? {
                    match e.name().as_ref() {
                        b"NonLinearClickThrough" => {
                            let url = read_text_element(reader)?;
                            if !url.is_empty() {
                                click_through = Some(url);
                            }
                        }
                        b"NonLinearClickTracking" => {
                            push_url(&mut click_tracking, read_text_element(reader)?)
                        }
                        b"AdParameters" => ad_parameters = Some(read_text_element(reader)?),
                        _ => skip_element(reader, e.name().as_ref())?,
                    }
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"NonLinear" => break,
            Ok(Event::Eof) => {
                return Err(VastError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    let Some((resource_kind, resource_data, creative_type)) = resources.select() else {
        warn!("Skipping NonLinear without a resource");
        return Ok(None);
    };

    Ok(Some(NonLinearPayload {
        resource_kind,
        resource_data,
        creative_type,
        api_framework,
        width,
        height,
        expanded_width,
        expanded_height,
        min_suggested_duration,
        click_through,
        click_tracking,
        tracking: HashMap::new(),
        ad_parameters,
    }))
}

/// Parse CompanionAds element
fn parse_companion_ads(reader: &mut Reader<&[u8]>) -> Result<Vec<CompanionAd>> {
    let mut companions = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"Companion" => {
                if let Some(companion) = parse_companion(reader, e)? {
                    companions.push(companion);
                }
            }
            Ok(Event::Start(ref e)) => skip_element(reader, e.name().as_ref())?,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"CompanionAds" => break,
            Ok(Event::Eof) => {
                return Err(VastError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(companions)
}

/// Parse Companion element
fn parse_companion(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<Option<CompanionAd>> {
    let width = attribute_u32(start, b"width").unwrap_or(0);
    let height = attribute_u32(start, b"height").unwrap_or(0);
    let mut resources = ResourceCandidates::default();
    let mut click_through = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if !resources.read(reader, e)? {
                    match e.name().as_ref() {
                        b"CompanionClickThrough" => {
                            let url = read_text_element(reader)?;
                            if !url.is_empty() {
                                click_through = Some(url);
                            }
                        }
                        _ => skip_element(reader, e.name().as_ref())?,
                    }
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Companion" => break,
            Ok(Event::Eof) => {
                return Err(VastError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(resources
        .select()
        .map(|(resource_kind, data, _)| CompanionAd {
            resource_kind,
            data,
            width,
            height,
            click_through,
        }))
}

/// Convert a `HH:MM:SS[.mmm]` timecode to seconds
pub fn parse_timecode(raw: &str) -> Option<f64> {
    let mut parts = raw.trim().split(':');
    let hours = parts.next()?.parse::<u32>().ok()?;
    let minutes = parts.next()?.parse::<u32>().ok()?;
    let seconds = parts.next()?.parse::<f64>().ok()?;
    if parts.next().is_some() || minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return None;
    }
    Some(f64::from(hours) * 3600.0 + f64::from(minutes) * 60.0 + seconds)
}

/// Helper function to read the trimmed text content of an XML element
fn read_text_element(reader: &mut Reader<&[u8]>) -> Result<String> {
    let mut text = String::new();
    let mut buf = Vec::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Text(e)) => text.push_str(&e.unescape()?),
            Ok(Event::CData(e)) => {
                if let Ok(value) = from_utf8(&e) {
                    text.push_str(value);
                }
            }
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(_)) => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            Ok(Event::Eof) => {
                return Err(VastError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(text.trim().to_string())
}

/// Helper function to skip the rest of an element whose start tag was just read
fn skip_element(reader: &mut Reader<&[u8]>, name: &[u8]) -> Result<()> {
    let mut buf = Vec::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(ref e)) => {
                if depth == 0 {
                    if e.name().as_ref() != name {
                        return Err(VastError::Other(format!(
                            "Mismatched end tag while skipping {}",
                            String::from_utf8_lossy(name)
                        )));
                    }
                    break;
                }
                depth -= 1;
            }
            Ok(Event::Eof) => {
                return Err(VastError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(())
}

/// Read an attribute value, unescaped and trimmed
fn attribute(start: &BytesStart, name: &[u8]) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == name)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.trim().to_string()))
}

fn attribute_u32(start: &BytesStart, name: &[u8]) -> Option<u32> {
    attribute(start, name).and_then(|value| value.parse::<u32>().ok())
}

fn push_url(urls: &mut Vec<String>, url: String) {
    if !url.is_empty() {
        urls.push(url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINEAR_AD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<VAST version="3.0">
  <Ad id="preroll-1" sequence="1">
    <InLine>
      <AdSystem>Test</AdSystem>
      <AdTitle>Spring Sale</AdTitle>
      <Impression><![CDATA[ https://t.example/imp1 ]]></Impression>
      <Impression><![CDATA[]]></Impression>
      <Impression>https://t.example/imp2</Impression>
      <Error><![CDATA[https://t.example/err?code=[ERRORCODE]]]></Error>
      <Creatives>
        <Creative>
          <Linear skipoffset="00:00:05.000">
            <Duration>00:00:20.500</Duration>
            <AdParameters><![CDATA[{"clip":"a"}]]></AdParameters>
            <TrackingEvents>
              <Tracking event="midpoint">https://t.example/mid-a</Tracking>
              <Tracking event="midpoint">https://t.example/mid-b</Tracking>
              <Tracking event="complete">https://t.example/complete</Tracking>
            </TrackingEvents>
            <VideoClicks>
              <ClickThrough>https://advertiser.example</ClickThrough>
              <ClickTracking>https://t.example/click</ClickTracking>
              <CustomClick>https://t.example/custom</CustomClick>
            </VideoClicks>
            <MediaFiles>
              <MediaFile type="video/mp4" bitrate="800" width="640" height="360" delivery="progressive">
                https://cdn.example/ad.mp4
              </MediaFile>
              <MediaFile type="application/javascript" apiFramework="VPAID" width="640" height="360">
                <![CDATA[https://cdn.example/unit.js]]>
              </MediaFile>
            </MediaFiles>
          </Linear>
        </Creative>
        <Creative>
          <CompanionAds>
            <Companion width="300" height="250">
              <HTMLResource><![CDATA[<b>hi</b>]]></HTMLResource>
              <StaticResource creativeType="image/png">https://cdn.example/c.png</StaticResource>
              <CompanionClickThrough>https://advertiser.example/c</CompanionClickThrough>
            </Companion>
          </CompanionAds>
        </Creative>
      </Creatives>
    </InLine>
  </Ad>
</VAST>"#;

    #[test]
    fn normalizes_a_linear_inline_ad() {
        let response = parse_vast(LINEAR_AD).unwrap();
        assert_eq!(response.version, "3.0");
        assert_eq!(response.ads.len(), 1);

        let ad = &response.ads[0];
        assert_eq!(ad.id.as_deref(), Some("preroll-1"));
        assert_eq!(ad.sequence, Some(1));
        assert_eq!(ad.kind, AdKind::Inline);
        assert_eq!(ad.title, "Spring Sale");
        assert_eq!(
            ad.impressions,
            vec!["https://t.example/imp1", "https://t.example/imp2"]
        );
        assert_eq!(ad.error_urls, vec!["https://t.example/err?code=[ERRORCODE]"]);

        let linear = ad.linear.as_ref().unwrap();
        assert_eq!(linear.duration_seconds, 20.5);
        assert_eq!(linear.skip_offset_raw.as_deref(), Some("00:00:05.000"));
        assert_eq!(linear.ad_parameters.as_deref(), Some(r#"{"clip":"a"}"#));
        assert_eq!(linear.click_through.as_deref(), Some("https://advertiser.example"));
        assert_eq!(linear.click_tracking, vec!["https://t.example/click"]);
        assert_eq!(linear.custom_click, vec!["https://t.example/custom"]);
        assert_eq!(linear.tracking[&EventKind::Midpoint].len(), 2);
        assert_eq!(linear.media_files.len(), 2);
        assert_eq!(linear.media_files[0].url, "https://cdn.example/ad.mp4");
        assert_eq!(linear.media_files[0].bitrate, Some(800));
        assert_eq!(linear.media_files[1].api_framework.as_deref(), Some("VPAID"));
        assert_eq!(linear.media_files[1].url, "https://cdn.example/unit.js");
    }

    #[test]
    fn companions_prefer_static_resources() {
        let response = parse_vast(LINEAR_AD).unwrap();
        let companions = &response.ads[0].companions;
        assert_eq!(companions.len(), 1);
        assert_eq!(companions[0].resource_kind, ResourceKind::Static);
        assert_eq!(companions[0].data, "https://cdn.example/c.png");
        assert_eq!((companions[0].width, companions[0].height), (300, 250));
    }

    #[test]
    fn non_linear_resource_priority_is_static_iframe_html() {
        let xml = r#"<VAST version="3.0"><Ad id="overlay"><InLine><AdTitle>o</AdTitle>
            <Creatives><Creative><NonLinearAds>
              <TrackingEvents><Tracking event="creativeView">https://t.example/cv</Tracking></TrackingEvents>
              <NonLinear width="480" height="70" expandedWidth="640" minSuggestedDuration="00:00:10" apiFramework="VPAID">
                <HTMLResource>&lt;p&gt;x&lt;/p&gt;</HTMLResource>
                <IFrameResource>https://cdn.example/frame.html</IFrameResource>
                <NonLinearClickThrough>https://advertiser.example/o</NonLinearClickThrough>
                <NonLinearClickTracking>https://t.example/oc</NonLinearClickTracking>
              </NonLinear>
            </NonLinearAds></Creative></Creatives></InLine></Ad></VAST>"#;
        let response = parse_vast(xml).unwrap();
        let non_linear = response.ads[0].non_linear.as_ref().unwrap();
        assert_eq!(non_linear.resource_kind, ResourceKind::IFrame);
        assert_eq!(non_linear.resource_data, "https://cdn.example/frame.html");
        assert_eq!((non_linear.width, non_linear.height), (480, 70));
        assert_eq!(non_linear.expanded_width, Some(640));
        assert_eq!(non_linear.expanded_height, None);
        assert_eq!(non_linear.min_suggested_duration, Some(10.0));
        assert_eq!(non_linear.click_tracking, vec!["https://t.example/oc"]);
        assert!(non_linear.tracking.contains_key(&EventKind::CreativeView));
        assert!(response.ads[0].linear.is_none());
    }

    #[test]
    fn ad_without_inline_or_wrapper_is_dropped_alone() {
        let xml = r#"<VAST version="3.0">
            <Ad id="broken"><Extensions/></Ad>
            <Ad id="ok"><InLine><AdTitle>fine</AdTitle></InLine></Ad>
        </VAST>"#;
        let response = parse_vast(xml).unwrap();
        assert_eq!(response.ads.len(), 1);
        assert_eq!(response.ads[0].id.as_deref(), Some("ok"));
    }

    #[test]
    fn wrapper_keeps_its_redirect() {
        let xml = r#"<VAST version="2.0"><Ad id="w"><Wrapper>
            <AdSystem>x</AdSystem>
            <VASTAdTagURI><![CDATA[https://ads.example/next.xml]]></VASTAdTagURI>
            <Impression>https://t.example/w</Impression>
        </Wrapper></Ad></VAST>"#;
        let ad = &parse_vast(xml).unwrap().ads[0];
        assert_eq!(ad.kind, AdKind::Wrapper);
        assert_eq!(ad.wrapper_redirect_url.as_deref(), Some("https://ads.example/next.xml"));
        assert!(ad.linear.is_none() && ad.non_linear.is_none());
    }

    #[test]
    fn response_level_failures_reject_the_batch() {
        assert!(matches!(
            parse_vast(r#"<VAST version="4.0"></VAST>"#),
            Err(VastError::InvalidVersion(v)) if v == "4.0"
        ));
        assert!(matches!(parse_vast("<VAST></VAST>"), Err(VastError::MissingField(_))));
        assert!(matches!(parse_vast("<VMAP/>"), Err(VastError::Other(_))));
        assert!(matches!(parse_vast(""), Err(VastError::MissingField(_))));
    }

    #[test]
    fn zero_or_garbage_sequence_means_not_podded() {
        let xml = r#"<VAST version="3.0">
            <Ad id="a" sequence="0"><InLine/></Ad>
            <Ad id="b" sequence="two"><InLine/></Ad>
        </VAST>"#;
        let response = parse_vast(xml).unwrap();
        assert!(response.ads.iter().all(|ad| ad.sequence.is_none()));
    }

    #[test]
    fn root_errors_are_collected_for_empty_responses() {
        let xml = r#"<VAST version="3.0"><Error>https://t.example/noad</Error></VAST>"#;
        let response = parse_vast(xml).unwrap();
        assert!(response.ads.is_empty());
        assert_eq!(response.error_urls, vec!["https://t.example/noad"]);
    }

    #[test]
    fn timecodes() {
        assert_eq!(parse_timecode("00:00:05"), Some(5.0));
        assert_eq!(parse_timecode("01:02:03.250"), Some(3723.25));
        assert_eq!(parse_timecode(" 00:00:30.000 "), Some(30.0));
        assert_eq!(parse_timecode("50%"), None);
        assert_eq!(parse_timecode("00:61:00"), None);
        assert_eq!(parse_timecode("5"), None);
    }
}
