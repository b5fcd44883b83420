//! Scan attributes and clinical prompt construction

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Placeholder used when no inference summary is available
pub const NO_FINDINGS: &str = "None computed (automated image analysis unavailable)";

const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "You are a radiology assistant. Draft a concise, structured clinical note from the scan details provided. Do not invent measurements that are not given.";

/// Acquisition attributes taken from the decoder.
///
/// Values are opaque strings. Missing values are empty, never omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanAttributes {
    #[serde(rename = "patient")]
    pub patient_label: String,
    #[serde(rename = "modality")]
    pub modality_code: String,
    #[serde(rename = "scan_date")]
    pub study_date: String,
}

impl ScanAttributes {
    pub fn new(
        patient_label: Option<&str>,
        modality_code: Option<&str>,
        study_date: Option<&str>,
    ) -> Self {
        Self {
            patient_label: patient_label.unwrap_or_default().to_string(),
            modality_code: modality_code.unwrap_or_default().to_string(),
            study_date: study_date.unwrap_or_default().to_string(),
        }
    }

    /// Build from decoder keywords (`PatientName`, `Modality`, `StudyDate`).
    ///
    /// A missing or blank `StudyDate` falls back to `AcquisitionDate`.
    pub fn from_keywords(tags: &HashMap<String, String>) -> Self {
        let get = |key: &str| tags.get(key).map(String::as_str);

        let study_date = get("StudyDate")
            .filter(|d| !d.trim().is_empty())
            .or_else(|| get("AcquisitionDate"));

        Self::new(get("PatientName"), get("Modality"), study_date)
    }
}

/// Speaker of a prompt segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
}

impl PromptRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptRole::System => "system",
            PromptRole::User => "user",
        }
    }
}

/// One role-tagged piece of a prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSegment {
    pub role: PromptRole,
    pub content: String,
}

/// Ordered prompt segments for the note backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalPrompt {
    segments: Vec<PromptSegment>,
}

impl ClinicalPrompt {
    pub fn new(segments: Vec<PromptSegment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[PromptSegment] {
        &self.segments
    }

    /// Content of the first user segment
    pub fn user_content(&self) -> Option<&str> {
        self.segments
            .iter()
            .find(|s| s.role == PromptRole::User)
            .map(|s| s.content.as_str())
    }

    /// Single text block for completion-style backends
    pub fn flatten(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Renders scan attributes and findings into a clinical prompt
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_instruction: String,
    include_patient_label: bool,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            include_patient_label: false,
        }
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    /// Add a `Patient:` line. Off by default.
    pub fn with_patient_label(mut self, include: bool) -> Self {
        self.include_patient_label = include;
        self
    }

    pub fn build(&self, attributes: &ScanAttributes, findings: Option<&str>) -> ClinicalPrompt {
        let findings = findings
            .map(single_line)
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| NO_FINDINGS.to_string());

        let mut user = String::from("Generate a clinical radiology note based on:\n");
        if self.include_patient_label {
            user.push_str(&format!("Patient: {}\n", single_line(&attributes.patient_label)));
        }
        user.push_str(&format!("Modality: {}\n", single_line(&attributes.modality_code)));
        user.push_str(&format!("Scan Date: {}\n", single_line(&attributes.study_date)));
        user.push_str(&format!("Detected Abnormalities: {}\n", findings));
        user.push_str("Suggest any relevant follow-up steps.");

        ClinicalPrompt::new(vec![
            PromptSegment {
                role: PromptRole::System,
                content: self.system_instruction.clone(),
            },
            PromptSegment {
                role: PromptRole::User,
                content: user,
            },
        ])
    }
}

/// Collapse line breaks to single spaces and trim
fn single_line(value: &str) -> String {
    value
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_attributes_keep_fields() {
        let prompt = PromptBuilder::new().build(&ScanAttributes::default(), None);
        let user = prompt.user_content().unwrap();

        assert!(user.contains("Modality: \n"));
        assert!(user.contains("Scan Date: \n"));
        assert!(user.contains(&format!("Detected Abnormalities: {}", NO_FINDINGS)));
    }

    #[test]
    fn test_findings_rendered() {
        let attributes = ScanAttributes::new(Some("DOE^JANE"), Some("CT"), Some("20240115"));
        let prompt = PromptBuilder::new().build(&attributes, Some("lesion covers 2.0% of the image"));
        let user = prompt.user_content().unwrap();

        assert!(user.contains("Modality: CT\n"));
        assert!(user.contains("Scan Date: 20240115\n"));
        assert!(user.contains("Detected Abnormalities: lesion covers 2.0% of the image"));
        assert!(!user.contains("DOE^JANE"));
        assert!(user.ends_with("Suggest any relevant follow-up steps."));
    }

    #[test]
    fn test_blank_findings_treated_as_absent() {
        let prompt = PromptBuilder::new().build(&ScanAttributes::default(), Some(" \n "));
        assert!(prompt.user_content().unwrap().contains(NO_FINDINGS));
    }

    #[test]
    fn test_newlines_in_attributes_normalized() {
        let attributes = ScanAttributes::new(None, Some("MR\nScan Date: forged"), Some("2024\r\n0115"));
        let prompt = PromptBuilder::new().build(&attributes, Some("a\nb"));
        let user = prompt.user_content().unwrap();

        assert!(user.contains("Modality: MR Scan Date: forged\n"));
        assert!(user.contains("Scan Date: 2024 0115\n"));
        assert!(user.contains("Detected Abnormalities: a b\n"));
        assert_eq!(user.lines().count(), 5);
    }

    #[test]
    fn test_patient_label_opt_in() {
        let attributes = ScanAttributes::new(Some("DOE^JANE"), Some("CT"), None);
        let prompt = PromptBuilder::new().with_patient_label(true).build(&attributes, None);
        assert!(prompt.user_content().unwrap().contains("Patient: DOE^JANE\n"));
    }

    #[test]
    fn test_flatten_joins_segments() {
        let prompt = PromptBuilder::new()
            .with_system_instruction("SYS")
            .build(&ScanAttributes::default(), None);
        let flat = prompt.flatten();

        assert!(flat.starts_with("SYS\n\nGenerate a clinical radiology note based on:\n"));
        assert_eq!(prompt.segments().len(), 2);
    }

    #[test]
    fn test_study_date_falls_back_to_acquisition_date() {
        let mut tags = HashMap::new();
        tags.insert("Modality".to_string(), "CR".to_string());
        tags.insert("StudyDate".to_string(), "  ".to_string());
        tags.insert("AcquisitionDate".to_string(), "20230301".to_string());

        let attributes = ScanAttributes::from_keywords(&tags);
        assert_eq!(attributes.modality_code, "CR");
        assert_eq!(attributes.study_date, "20230301");
        assert_eq!(attributes.patient_label, "");
    }

    #[test]
    fn test_attributes_serialize_with_wire_names() {
        let attributes = ScanAttributes::new(Some("P"), Some("CT"), Some("20240101"));
        let json = serde_json::to_value(&attributes).unwrap();
        assert_eq!(json["modality"], "CT");
        assert_eq!(json["scan_date"], "20240101");
        assert_eq!(json["patient"], "P");
    }
}
