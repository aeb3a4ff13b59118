//! Gene and metabolite mentions in free text (PDF body or OCR output).

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::domain::{FrequencyTag, MentionKind};

static GENE_SYMBOL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z][A-Z0-9]{1,9}(?:-[A-Z0-9]{1,4})?\b").expect("valid gene symbol regex")
});

/// Uppercase tokens that look like symbols but are not genes.
const STOP_SYMBOLS: &[&str] = &[
    "AND", "THE", "FOR", "WITH", "NOT", "WAS", "ARE", "BUT", "ALL", "ANY", "FIG", "FIGS", "TABLE",
    "DNA", "RNA", "MRNA", "CDNA", "PCR", "QPCR", "RT-PCR", "ELISA", "PBS", "BSA", "SD", "SEM",
    "USA", "UK", "EU", "NIH", "WHO", "ANOVA", "CI", "OR", "HR", "BMI", "GA", "IQR", "ROC", "AUC",
    "PE", "IUGR", "FGR", "GDM", "ID", "NA", "ND", "NS", "II", "III", "IV", "VI", "VII", "VIII",
    "IX", "XI", "XII", "ATP", "ADP", "NADH", "HPLC", "LC-MS", "MS", "NMR", "KO", "WT", "DAPI",
    "HE", "IHC", "IF", "CT", "MRI", "OK", "AM", "PM", "DOI", "PMID", "PMC", "ISSN", "ET", "AL",
];

/// Metabolites matched by name, case-insensitively, on word boundaries.
const METABOLITES: &[&str] = &[
    "glucose",
    "lactate",
    "pyruvate",
    "glutamine",
    "glutamate",
    "cholesterol",
    "triglyceride",
    "palmitate",
    "arachidonic acid",
    "docosahexaenoic acid",
    "folate",
    "homocysteine",
    "serotonin",
    "dopamine",
    "melatonin",
    "cortisol",
    "progesterone",
    "estradiol",
    "kynurenine",
    "tryptophan",
    "choline",
    "carnitine",
    "creatinine",
    "urea",
    "citrate",
    "succinate",
    "glycine",
    "taurine",
];

static METABOLITE_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    METABOLITES
        .iter()
        .filter_map(|name| {
            Regex::new(&format!(r"(?i)\b{}s?\b", regex::escape(name)))
                .ok()
                .map(|re| (*name, re))
        })
        .collect()
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mention {
    pub name: String,
    pub kind: MentionKind,
    pub count: usize,
    pub tag: FrequencyTag,
}

pub fn frequency_tag(count: usize) -> FrequencyTag {
    match count {
        c if c >= 10 => FrequencyTag::High,
        c if c >= 3 => FrequencyTag::Medium,
        _ => FrequencyTag::Low,
    }
}

pub fn is_gene_candidate(token: &str) -> bool {
    let has_digit = token.chars().any(|ch| ch.is_ascii_digit());
    let letters = token.chars().filter(|ch| ch.is_ascii_alphabetic()).count();
    if letters == 0 || (!has_digit && token.len() < 3) {
        return false;
    }
    !STOP_SYMBOLS.contains(&token)
}

/// Counts gene-like symbols and dictionary metabolites. Output is sorted by
/// name so repeated runs over the same text are identical.
pub fn extract_mentions(text: &str) -> Vec<Mention> {
    let mut genes = BTreeMap::<String, usize>::new();
    for found in GENE_SYMBOL.find_iter(text) {
        let token = found.as_str();
        if is_gene_candidate(token) {
            *genes.entry(token.to_string()).or_default() += 1;
        }
    }

    let mut metabolites = BTreeMap::<String, usize>::new();
    for (name, pattern) in METABOLITE_PATTERNS.iter() {
        let count = pattern.find_iter(text).count();
        if count > 0 {
            metabolites.insert(name.to_string(), count);
        }
    }

    // "DOPAMINE" in a heading is the metabolite, not a gene symbol
    let metabolite_keys = metabolites
        .keys()
        .map(|name| name.to_uppercase())
        .collect::<HashSet<_>>();
    genes.retain(|name, _| !metabolite_keys.contains(name));

    let mut out = genes
        .into_iter()
        .map(|(name, count)| Mention {
            name,
            kind: MentionKind::Gene,
            count,
            tag: frequency_tag(count),
        })
        .chain(metabolites.into_iter().map(|(name, count)| Mention {
            name,
            kind: MentionKind::Metabolite,
            count,
            tag: frequency_tag(count),
        }))
        .collect::<Vec<_>>();
    out.sort_by(|a, b| a.name.cmp(&b.name));
    out
}

pub fn top_mentions(mut mentions: Vec<Mention>, min_count: usize, limit: usize) -> Vec<Mention> {
    mentions.retain(|mention| mention.count >= min_count);
    mentions.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    mentions.truncate(limit);
    mentions
}
