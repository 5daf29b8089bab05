use std::collections::BTreeMap;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::engine::RawMetadata;

/// Canonical field and the raw-key aliases that feed it, in priority order
struct AliasSpec {
    field: &'static str,
    aliases: &'static [&'static str],
}

macro_rules! alias {
    ($field:literal => $($key:literal),+ $(,)?) => {
        AliasSpec { field: $field, aliases: &[$($key),+] }
    };
}

lazy_static! {
    /// Maps canonical fields onto the heterogeneous raw keys engines emit.
    /// Per field, the first alias present in the raw map wins; evaluation
    /// order across fields is the insertion order of this table.
    static ref ALIAS_TABLE: Vec<AliasSpec> = vec![
        // Processing metadata
        alias!("parse_time_millis" => "X-TIKA:parse_time_millis"),
        alias!("encoding" => "Content-Encoding", "X-TIKA:detectedEncoding", "Encoding", "encoding", "charset"),
        alias!("compression" => "Compression CompressionTypeName", "Compression", "xmpDM:audioCompressor", "xmpDM:videoCompressor", "Compressor ID"),
        // Document counts
        alias!("paragraph_count" => "meta:paragraph-count"),
        alias!("revision" => "cp:revision"),
        alias!("word_count" => "meta:word-count"),
        alias!("line_count" => "meta:line-count"),
        alias!("character_count" => "meta:character-count"),
        alias!("character_count_with_spaces" => "meta:character-count-with-spaces"),
        alias!("page_count" => "meta:page-count", "xmpTPg:NPages", "exif:PageCount"),
        alias!("chars_per_page" => "pdf:charsPerPage"),
        alias!("table_count" => "meta:table-count"),
        alias!("component_count" => "Number of Components"),
        alias!("image_count" => "meta:image-count"),
        alias!("hidden_slides" => "extended-properties:HiddenSlides"),
        // Resource information
        alias!("resource_name" => "resourceName", "File Name"),
        alias!("embedded_resource_path" => "X-TIKA:embedded_resource_path"),
        alias!("embedded_resource_type" => "embeddedResourceType"),
        alias!("embedded_relationship_id" => "embeddedRelationshipId"),
        alias!("embedded_depth" => "X-TIKA:embedded_depth"),
        // Dates (kept as engine-formatted strings)
        alias!("created" => "dcterms:created", "pdf:docinfo:created", "fs:created"),
        alias!("modified" => "dcterms:modified", "pdf:docinfo:modified", "fs:modified", "fs:created", "File Modification Date/Time", "File Inode Change Date/Time"),
        alias!("accessed" => "dc:date", "fs:accessed", "File Access Date/Time"),
        // Content information
        alias!("content_type" => "Content-Type"),
        alias!("content_type_override" => "Content-Type-Override"),
        alias!("content_length" => "Content-Length"),
        // Document content
        alias!("title" => "dc:title", "pdf:docinfo:title", "dc:subject", "pdf:docinfo:subject", "Title"),
        alias!("description" => "dc:description"),
        alias!("type" => "dc:type"),
        alias!("keywords" => "meta:keyword", "IPTC:Keywords", "pdf:docinfo:keywords"),
        alias!("notes" => "extended-properties:Notes"),
        // Author information
        alias!("company" => "extended-properties:Company"),
        alias!("creator" => "dc:creator", "meta:last-author", "pdf:docinfo:creator", "pdf:docinfo:producer", "Artist"),
        alias!("publisher" => "dc:publisher"),
        alias!("contributor" => "dc:contributor"),
        // Language
        alias!("language" => "dc:language"),
        // Application metadata
        alias!("identifier" => "dc:identifier"),
        alias!("application" => "extended-properties:Application", "pdf:docinfo:creator_tool", "tiff:Software", "xmpMM:History:SoftwareAgent", "Software", "vendor"),
        alias!("application_version" => "extended-properties:AppVersion", "version"),
        alias!("producer" => "pdf:producer"),
        alias!("version" => "pdf:PDFVersion", "epub:version"),
        alias!("template" => "extended-properties:Template"),
        alias!("is_encrypted" => "pdf:encrypted", "extended-properties:security:password-protected"),
        // Security metadata
        alias!("security" => "extended-properties:security:none", "extended-properties:security:password-protected", "extended-properties:security:read-only-enforced", "extended-properties:security:read-only-recommended", "extended-properties:security:locked-for-annotations", "extended-properties:security:unknown", "extended-properties:DocSecurity", "extended-properties:DocSecurityString"),
        // Generic multimedia
        alias!("height" => "height", "Image Height", "tiff:ImageLength", "Source Image Height"),
        alias!("width" => "width", "Image Width", "tiff:ImageWidth", "Source Image Width"),
        alias!("duration" => "xmpDM:duration", "Duration"),
        alias!("stream_count" => "Stream Count"),
        // Image
        alias!("image_pixel_aspect_ratio" => "xmpDM:videoPixelAspectRatio"),
        alias!("image_color_space" => "xmpDM:videoColorSpace"),
        // Audio
        alias!("audio_channels" => "xmpDM:audioChannelType", "channels"),
        alias!("audio_bits" => "bits"),
        alias!("audio_sample_type" => "xmpDM:audioSampleType"),
        alias!("audio_sample_rate" => "xmpDM:audioSampleRate", "Audio Sample Rate", "Sample Rate", "samplerate"),
        // Video
        alias!("video_frame_rate" => "xmpDM:videoFrameRate"),
        alias!("video_codec" => "Video Codec"),
        alias!("video_frame_count" => "Frame Count"),
        alias!("video_sample_rate" => "Sample Rate"),
        // Message information
        alias!("from" => "Message-From", "Message:From-Email", "Message:From-Name"),
        alias!("to" => "Message-To", "Message:To-Email", "Message:To-Name", "Message:To-Display-Name", "Message:Recipient-Address"),
        alias!("cc" => "Message-Cc", "Message:CC-Email", "Message:CC-Name", "Message:CC-Display-Name"),
        alias!("bcc" => "Message-Bcc", "Message:BCC-Email", "Message:BCC-Name", "Message:BCC-Display-Name"),
        alias!("multipart_subtypes" => "Multipart-Subtype"),
        alias!("multipart_boundary" => "Multipart-Boundary"),
    ];
}

/// Canonical document metadata with stable field names and types.
///
/// Every canonical field is optional: it is set only when one of its raw-key
/// aliases is present and convertible. The complete untouched raw map is kept
/// in `raw` for lossless access to anything the canonical schema drops.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMetadata {
    // Processing metadata
    pub parse_time_millis: Option<i64>,
    pub encoding: Option<String>,
    pub compression: Option<String>,
    // Document counts
    pub paragraph_count: Option<i64>,
    pub revision: Option<String>,
    pub word_count: Option<i64>,
    pub line_count: Option<i64>,
    pub character_count: Option<i64>,
    pub character_count_with_spaces: Option<i64>,
    pub page_count: Option<i64>,
    pub chars_per_page: Option<Vec<i64>>,
    pub table_count: Option<String>,
    pub component_count: Option<i64>,
    pub image_count: Option<i64>,
    pub hidden_slides: Option<String>,
    // Resource information
    pub resource_name: Option<String>,
    pub embedded_resource_path: Option<String>,
    pub embedded_resource_type: Option<String>,
    pub embedded_relationship_id: Option<String>,
    pub embedded_depth: Option<i64>,
    // Dates
    pub created: Option<String>,
    pub modified: Option<String>,
    pub accessed: Option<String>,
    // Content information
    pub content_type: Option<String>,
    pub content_type_override: Option<String>,
    pub content_length: Option<i64>,
    // Document content
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub notes: Option<String>,
    // Author information
    pub company: Option<String>,
    pub creator: Option<String>,
    pub publisher: Option<String>,
    pub contributor: Option<String>,
    // Language
    pub language: Option<String>,
    // Application metadata
    pub identifier: Option<String>,
    pub application: Option<String>,
    pub application_version: Option<String>,
    pub producer: Option<String>,
    pub version: Option<String>,
    pub template: Option<String>,
    pub is_encrypted: Option<bool>,
    // Security metadata
    pub security: Option<String>,
    // Generic multimedia
    pub height: Option<i64>,
    pub width: Option<i64>,
    pub duration: Option<f64>,
    pub stream_count: Option<i64>,
    // Image
    pub image_pixel_aspect_ratio: Option<f64>,
    pub image_color_space: Option<String>,
    // Audio
    pub audio_channels: Option<i64>,
    pub audio_bits: Option<i64>,
    pub audio_sample_type: Option<String>,
    pub audio_sample_rate: Option<i64>,
    // Video
    pub video_frame_rate: Option<f64>,
    pub video_codec: Option<String>,
    pub video_frame_count: Option<i64>,
    pub video_sample_rate: Option<i64>,
    // Message information
    pub from: Option<String>,
    pub to: Option<String>,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub multipart_subtypes: Option<String>,
    pub multipart_boundary: Option<String>,
    /// Untouched raw key/value pairs from the engine
    pub raw: BTreeMap<String, String>,
}

impl NormalizedMetadata {
    /// Normalize the raw engine metadata onto the canonical schema.
    ///
    /// Per canonical field, aliases are tried in fixed priority order and the
    /// first one present wins; its value is converted to the field's declared
    /// type. A conversion failure leaves that field unset and moves on to the
    /// remaining fields rather than aborting the normalization.
    pub fn from_raw(raw: &RawMetadata) -> Self {
        let mut meta = NormalizedMetadata {
            raw: raw.to_map(),
            ..Default::default()
        };

        for entry in ALIAS_TABLE.iter() {
            let Some(value) = entry.aliases.iter().find_map(|alias| raw.get(alias)) else {
                continue;
            };
            if value.is_empty() {
                log::warn!("empty value for metadata field {}; skipping", entry.field);
                continue;
            }
            meta.assign(entry.field, value);
        }

        meta
    }

    fn assign(&mut self, field: &'static str, value: &str) {
        match field {
            "parse_time_millis" => self.parse_time_millis = as_int(field, value),
            "encoding" => self.encoding = Some(value.to_string()),
            "compression" => self.compression = Some(value.to_string()),
            "paragraph_count" => self.paragraph_count = as_int(field, value),
            "revision" => self.revision = Some(value.to_string()),
            "word_count" => self.word_count = as_int(field, value),
            "line_count" => self.line_count = as_int(field, value),
            "character_count" => self.character_count = as_int(field, value),
            "character_count_with_spaces" => self.character_count_with_spaces = as_int(field, value),
            "page_count" => self.page_count = as_int(field, value),
            "chars_per_page" => self.chars_per_page = as_int_list(field, value),
            "table_count" => self.table_count = Some(value.to_string()),
            "component_count" => self.component_count = as_int(field, value),
            "image_count" => self.image_count = as_int(field, value),
            "hidden_slides" => self.hidden_slides = Some(value.to_string()),
            "resource_name" => self.resource_name = Some(value.to_string()),
            "embedded_resource_path" => self.embedded_resource_path = Some(value.to_string()),
            "embedded_resource_type" => self.embedded_resource_type = Some(value.to_string()),
            "embedded_relationship_id" => self.embedded_relationship_id = Some(value.to_string()),
            "embedded_depth" => self.embedded_depth = as_int(field, value),
            "created" => self.created = Some(value.to_string()),
            "modified" => self.modified = Some(value.to_string()),
            "accessed" => self.accessed = Some(value.to_string()),
            "content_type" => self.content_type = Some(value.to_string()),
            "content_type_override" => self.content_type_override = Some(value.to_string()),
            "content_length" => self.content_length = as_int(field, value),
            "title" => self.title = Some(value.to_string()),
            "description" => self.description = Some(value.to_string()),
            "type" => self.doc_type = Some(value.to_string()),
            "keywords" => self.keywords = Some(as_str_list(value)),
            "notes" => self.notes = Some(value.to_string()),
            "company" => self.company = Some(value.to_string()),
            "creator" => self.creator = Some(value.to_string()),
            "publisher" => self.publisher = Some(value.to_string()),
            "contributor" => self.contributor = Some(value.to_string()),
            "language" => self.language = Some(value.to_string()),
            "identifier" => self.identifier = Some(value.to_string()),
            "application" => self.application = Some(value.to_string()),
            "application_version" => self.application_version = Some(value.to_string()),
            "producer" => self.producer = Some(value.to_string()),
            "version" => self.version = Some(value.to_string()),
            "template" => self.template = Some(value.to_string()),
            "is_encrypted" => self.is_encrypted = as_bool(field, value),
            "security" => self.security = Some(value.to_string()),
            "height" => self.height = as_int(field, value),
            "width" => self.width = as_int(field, value),
            "duration" => self.duration = as_float(field, value),
            "stream_count" => self.stream_count = as_int(field, value),
            "image_pixel_aspect_ratio" => self.image_pixel_aspect_ratio = as_float(field, value),
            "image_color_space" => self.image_color_space = Some(value.to_string()),
            "audio_channels" => self.audio_channels = as_int(field, value),
            "audio_bits" => self.audio_bits = as_int(field, value),
            "audio_sample_type" => self.audio_sample_type = Some(value.to_string()),
            "audio_sample_rate" => self.audio_sample_rate = as_int(field, value),
            "video_frame_rate" => self.video_frame_rate = as_float(field, value),
            "video_codec" => self.video_codec = Some(value.to_string()),
            "video_frame_count" => self.video_frame_count = as_int(field, value),
            "video_sample_rate" => self.video_sample_rate = as_int(field, value),
            "from" => self.from = Some(value.to_string()),
            "to" => self.to = Some(value.to_string()),
            "cc" => self.cc = Some(value.to_string()),
            "bcc" => self.bcc = Some(value.to_string()),
            "multipart_subtypes" => self.multipart_subtypes = Some(value.to_string()),
            "multipart_boundary" => self.multipart_boundary = Some(value.to_string()),
            other => unreachable!("alias table names unknown field {other}"),
        }
    }
}

fn as_int(field: &str, value: &str) -> Option<i64> {
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            log::warn!("unable to convert {field} value {value:?} to integer: {err}");
            None
        }
    }
}

fn as_float(field: &str, value: &str) -> Option<f64> {
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            log::warn!("unable to convert {field} value {value:?} to float: {err}");
            None
        }
    }
}

fn as_bool(field: &str, value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => {
            log::warn!("unable to convert {field} value {value:?} to bool");
            None
        }
    }
}

fn as_int_list(field: &str, value: &str) -> Option<Vec<i64>> {
    let parsed: Result<Vec<i64>, _> = value.split(',').map(|part| part.trim().parse()).collect();
    match parsed {
        Ok(list) => Some(list),
        Err(err) => {
            log::warn!("unable to convert {field} value {value:?} to integer list: {err}");
            None
        }
    }
}

fn as_str_list(value: &str) -> Vec<String> {
    value.split(',').map(|part| part.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(entries: &[(&str, &str)]) -> RawMetadata {
        let mut raw = RawMetadata::new();
        for (key, value) in entries {
            raw.set(*key, *value);
        }
        raw
    }

    #[test]
    fn test_basic_normalization() {
        let meta = NormalizedMetadata::from_raw(&raw(&[
            ("Content-Type", "application/pdf"),
            ("dc:title", "Quarterly Report"),
            ("meta:word-count", "4213"),
            ("xmpTPg:NPages", "12"),
        ]));

        assert_eq!(meta.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(meta.title.as_deref(), Some("Quarterly Report"));
        assert_eq!(meta.word_count, Some(4213));
        assert_eq!(meta.page_count, Some(12));
    }

    #[test]
    fn test_alias_priority_first_match_wins() {
        // dc:title outranks the PDF docinfo title
        let meta = NormalizedMetadata::from_raw(&raw(&[
            ("pdf:docinfo:title", "from pdf"),
            ("dc:title", "from dublin core"),
        ]));
        assert_eq!(meta.title.as_deref(), Some("from dublin core"));

        // Lower-priority alias still feeds the field when the first is absent
        let meta = NormalizedMetadata::from_raw(&raw(&[("dc:subject", "subject as title")]));
        assert_eq!(meta.title.as_deref(), Some("subject as title"));
    }

    #[test]
    fn test_coercion_failure_leaves_field_unset_and_continues() {
        let meta = NormalizedMetadata::from_raw(&raw(&[
            ("meta:word-count", "not a number"),
            ("dc:title", "still processed"),
        ]));
        assert_eq!(meta.word_count, None);
        assert_eq!(meta.title.as_deref(), Some("still processed"));
        // The unconvertible value is still available in the raw passthrough
        assert_eq!(meta.raw.get("meta:word-count").map(String::as_str), Some("not a number"));
    }

    #[test]
    fn test_int_list_and_str_list_coercion() {
        let meta = NormalizedMetadata::from_raw(&raw(&[
            ("pdf:charsPerPage", "1400, 1with2"),
            ("meta:keyword", "alpha, beta ,gamma"),
        ]));
        assert_eq!(meta.chars_per_page, None); // one bad element spoils the list
        assert_eq!(
            meta.keywords,
            Some(vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()])
        );

        let meta = NormalizedMetadata::from_raw(&raw(&[("pdf:charsPerPage", "1400,1392, 88")]));
        assert_eq!(meta.chars_per_page, Some(vec![1400, 1392, 88]));
    }

    #[test]
    fn test_float_and_bool_coercion() {
        let meta = NormalizedMetadata::from_raw(&raw(&[
            ("xmpDM:duration", "12.5"),
            ("pdf:encrypted", "true"),
        ]));
        assert_eq!(meta.duration, Some(12.5));
        assert_eq!(meta.is_encrypted, Some(true));
    }

    #[test]
    fn test_empty_value_is_unset() {
        let meta = NormalizedMetadata::from_raw(&raw(&[("dc:title", "")]));
        assert_eq!(meta.title, None);
    }

    #[test]
    fn test_raw_passthrough_is_lossless() {
        let meta = NormalizedMetadata::from_raw(&raw(&[
            ("dc:title", "t"),
            ("X-Custom-Header", "anything"),
        ]));
        assert_eq!(meta.raw.len(), 2);
        assert_eq!(meta.raw.get("X-Custom-Header").map(String::as_str), Some("anything"));
    }

    #[test]
    fn test_absent_aliases_leave_defaults() {
        let meta = NormalizedMetadata::from_raw(&RawMetadata::new());
        assert_eq!(meta, NormalizedMetadata::default());
    }

    #[test]
    fn test_serde_round_trip() {
        let meta = NormalizedMetadata::from_raw(&raw(&[
            ("dc:type", "report"),
            ("Content-Type", "text/plain"),
        ]));
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("\"type\":\"report\""));
        let back: NormalizedMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }
}
