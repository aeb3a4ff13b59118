//! Keyword heuristics: placenta context, pathway guess and evidence type.

use crate::domain::{Entity, EvidenceType, NOT_AVAILABLE, Pathway};

/// Ordered rule table. The first rule with a matching substring wins, so the
/// order matters for names like "lipid matrix". The remaining `Pathway`
/// labels are never guessed from a name.
const PATHWAY_RULES: &[(&[&str], Pathway)] = &[
    (&["lipid", "fatty", "cholesterol"], Pathway::LipidMetabolism),
    (
        &["neuro", "dopamine", "serotonin"],
        Pathway::NeurotransmitterSignaling,
    ),
    (
        &["collagen", "matrix", "integrin"],
        Pathway::ExtracellularMatrixOrganization,
    ),
    (&["dna", "repair", "p53"], Pathway::DnaRepairMechanisms),
    (&["apoptosis", "caspase"], Pathway::ApoptosisSignaling),
    (
        &["immune", "interleukin", "tnf"],
        Pathway::ImmuneResponseRegulation,
    ),
];

pub fn contains_placenta_context(text: &str, keywords: &[String]) -> bool {
    let text = text.to_lowercase();
    keywords
        .iter()
        .any(|keyword| text.contains(&keyword.to_lowercase()))
}

pub fn infer_pathway(entity: &Entity) -> Option<Pathway> {
    let name = entity.as_str().to_lowercase();
    PATHWAY_RULES
        .iter()
        .find(|(needles, _)| needles.iter().any(|needle| name.contains(needle)))
        .map(|(_, pathway)| *pathway)
}

pub fn pathway_label(entity: &Entity) -> String {
    infer_pathway(entity)
        .map(|pathway| pathway.label().to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

pub fn classify_evidence(entity: &Entity, texts: &[String], keywords: &[String]) -> EvidenceType {
    let needle = entity.as_str().to_lowercase();
    let mut partial = false;
    for text in texts {
        let mentions_entity = text.to_lowercase().contains(&needle);
        let mentions_placenta = contains_placenta_context(text, keywords);
        if mentions_entity && mentions_placenta {
            return EvidenceType::Direct;
        }
        partial |= mentions_entity || mentions_placenta;
    }
    if partial {
        EvidenceType::Indirect
    } else {
        EvidenceType::None
    }
}
