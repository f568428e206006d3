use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Pan,
    Aadhaar,
    Passport,
    DrivingLicense,
}

string_enum!(DocumentType, "document type", {
    Pan => "pan",
    Aadhaar => "aadhaar",
    Passport => "passport",
    DrivingLicense => "driving_license",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    Pending,
    Verified,
    Rejected,
}

string_enum!(KycStatus, "kyc status", {
    Pending => "pending",
    Verified => "verified",
    Rejected => "rejected",
});

/// Identity verification record. Only a digest and the last four characters
/// of the document number are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserKyc {
    pub user_id: String,
    pub document_type: DocumentType,
    pub document_last4: String,
    #[serde(skip_serializing, default)]
    pub document_hash: String,
    pub legal_name: String,
    pub status: KycStatus,
    pub rejection_reason: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}
