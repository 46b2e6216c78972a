use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for the externally-authenticated submitting user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Identifier wrapper for a photo hunt target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HuntId(pub String);

/// Identifier wrapper for a durable completion record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompletionId(pub String);

/// Identifier wrapper for a single validation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidationId(pub String);

/// Opaque object-storage key for a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectKey(pub String);

/// Read-only snapshot of a hunt as published by the catalog layer.
///
/// The catalog owns hunt lifecycle; the workflow only resolves a hunt to its
/// reference image and the hints the oracle may use to calibrate judgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoHunt {
    pub id: HuntId,
    pub name: String,
    pub description: String,
    pub reference_image: ObjectKey,
    /// Difficulty out of 5, when the hunt author set one.
    pub difficulty: Option<f32>,
    pub hint: String,
    pub is_active: bool,
}

/// Durable record that a user matched a hunt. At most one exists per
/// `(user, hunt)` pair; a later valid submission overwrites it in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoHuntCompletion {
    pub id: CompletionId,
    pub user_id: UserId,
    pub hunt_id: HuntId,
    pub submitted_image: ObjectKey,
    pub validation_score: f64,
    pub is_valid: bool,
    pub validation_notes: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit row for one scored comparison attempt.
///
/// Only validations tied to a valid outcome carry a completion reference;
/// rejected attempts stay as orphan audit records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoValidation {
    pub id: ValidationId,
    pub completion_id: Option<CompletionId>,
    pub reference_image: ObjectKey,
    pub submitted_image: ObjectKey,
    pub similarity_score: f64,
    pub confidence_score: f64,
    pub notes: String,
    pub validation_prompt: String,
    pub oracle_response: String,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

/// Raster formats the workflow accepts, sniffed from the payload itself
/// rather than trusted from a client-supplied content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl ImageFormat {
    /// Identify the format from leading magic bytes, or `None` for anything
    /// the workflow does not support.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }
        if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }
        if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            return Some(Self::Gif);
        }
        if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }
        None
    }

    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::WebP => "webp",
        }
    }

    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }
}

/// Terminal result of one submission pass through the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    /// The oracle approved the match and the ledger was upserted.
    Committed {
        completion: PhotoHuntCompletion,
        validation: PhotoValidation,
    },
    /// The oracle rejected the match; no ledger row was created or touched.
    Rejected { validation: PhotoValidation },
}

impl SubmissionOutcome {
    pub fn validation(&self) -> &PhotoValidation {
        match self {
            Self::Committed { validation, .. } | Self::Rejected { validation } => validation,
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Committed { .. } => "committed",
            Self::Rejected { .. } => "rejected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniff_recognizes_supported_formats() {
        assert_eq!(
            ImageFormat::sniff(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::sniff(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00]),
            Some(ImageFormat::Png)
        );
        assert_eq!(ImageFormat::sniff(b"GIF89a...."), Some(ImageFormat::Gif));

        let mut webp = b"RIFF".to_vec();
        webp.extend_from_slice(&[0x10, 0x00, 0x00, 0x00]);
        webp.extend_from_slice(b"WEBPVP8 ");
        assert_eq!(ImageFormat::sniff(&webp), Some(ImageFormat::WebP));
    }

    #[test]
    fn sniff_rejects_unknown_payloads() {
        assert_eq!(ImageFormat::sniff(b""), None);
        assert_eq!(ImageFormat::sniff(b"<svg xmlns=...>"), None);
        assert_eq!(ImageFormat::sniff(b"RIFF1234WAVE"), None);
        assert_eq!(ImageFormat::sniff(&[0xFF, 0xD8]), None);
    }

    #[test]
    fn extension_matches_content_type() {
        assert_eq!(ImageFormat::Jpeg.extension(), "jpg");
        assert_eq!(ImageFormat::Jpeg.content_type(), "image/jpeg");
        assert_eq!(ImageFormat::WebP.extension(), "webp");
        assert_eq!(ImageFormat::WebP.content_type(), "image/webp");
    }
}
