use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LitError;

pub const NOT_FOUND: &str = "Not found";
pub const NOT_AVAILABLE: &str = "Not available";

/// A gene or metabolite name as it appears in the input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity(String);

impl Entity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Entity {
    type Err = LitError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        if normalized.is_empty() {
            return Err(LitError::InvalidEntity(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pathway {
    ImmuneResponseRegulation,
    CellCycleControl,
    ApoptosisSignaling,
    TranscriptionalRegulation,
    DnaRepairMechanisms,
    ProteinFoldingAndStability,
    CellularStressResponse,
    NeurotransmitterSignaling,
    LipidMetabolism,
    ExtracellularMatrixOrganization,
}

impl Pathway {
    pub const ALL: [Pathway; 10] = [
        Pathway::ImmuneResponseRegulation,
        Pathway::CellCycleControl,
        Pathway::ApoptosisSignaling,
        Pathway::TranscriptionalRegulation,
        Pathway::DnaRepairMechanisms,
        Pathway::ProteinFoldingAndStability,
        Pathway::CellularStressResponse,
        Pathway::NeurotransmitterSignaling,
        Pathway::LipidMetabolism,
        Pathway::ExtracellularMatrixOrganization,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Pathway::ImmuneResponseRegulation => "Immune Response Regulation",
            Pathway::CellCycleControl => "Cell Cycle Control",
            Pathway::ApoptosisSignaling => "Apoptosis Signaling",
            Pathway::TranscriptionalRegulation => "Transcriptional Regulation",
            Pathway::DnaRepairMechanisms => "DNA Repair Mechanisms",
            Pathway::ProteinFoldingAndStability => "Protein Folding and Stability",
            Pathway::CellularStressResponse => "Cellular Stress Response",
            Pathway::NeurotransmitterSignaling => "Neurotransmitter Signaling",
            Pathway::LipidMetabolism => "Lipid Metabolism",
            Pathway::ExtracellularMatrixOrganization => "Extracellular Matrix Organization",
        }
    }
}

impl fmt::Display for Pathway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvidenceType {
    Direct,
    Indirect,
    None,
}

impl fmt::Display for EvidenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvidenceType::Direct => write!(f, "Direct"),
            EvidenceType::Indirect => write!(f, "Indirect"),
            EvidenceType::None => write!(f, "None"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrequencyTag {
    High,
    Medium,
    Low,
}

impl fmt::Display for FrequencyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrequencyTag::High => write!(f, "High"),
            FrequencyTag::Medium => write!(f, "Medium"),
            FrequencyTag::Low => write!(f, "Low"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MentionKind {
    Gene,
    Metabolite,
}

/// One output spreadsheet row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRecord {
    pub entity: String,
    pub pubmed_doi: String,
    pub pubmed_link: String,
    pub europe_pmc_doi: String,
    pub scholar_link: String,
    pub pathway: String,
    pub evidence_type: EvidenceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_document: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mention_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_tag: Option<FrequencyTag>,
}

impl AnalysisRecord {
    const BASE_HEADERS: [&'static str; 7] = [
        "Entity",
        "PubMed_DOI",
        "PubMed_Link",
        "EuropePMC_DOI",
        "Scholar_Link",
        "Pathway",
        "Evidence_Type",
    ];
    const PROVENANCE_HEADERS: [&'static str; 3] = ["Source_Document", "Mention_Count", "Frequency"];

    pub fn headers(with_provenance: bool) -> Vec<&'static str> {
        let mut headers = Self::BASE_HEADERS.to_vec();
        if with_provenance {
            headers.extend(Self::PROVENANCE_HEADERS);
        }
        headers
    }

    pub fn cells(&self, with_provenance: bool) -> Vec<String> {
        let mut cells = vec![
            self.entity.clone(),
            self.pubmed_doi.clone(),
            self.pubmed_link.clone(),
            self.europe_pmc_doi.clone(),
            self.scholar_link.clone(),
            self.pathway.clone(),
            self.evidence_type.to_string(),
        ];
        if with_provenance {
            cells.push(self.source_document.clone().unwrap_or_default());
            cells.push(
                self.mention_count
                    .map(|count| count.to_string())
                    .unwrap_or_default(),
            );
            cells.push(
                self.frequency_tag
                    .map(|tag| tag.to_string())
                    .unwrap_or_default(),
            );
        }
        cells
    }
}
