use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::Utc;
use rayon::prelude::*;
use serde::Serialize;

use crate::classify::{classify_evidence, contains_placenta_context, pathway_label};
use crate::config::ResolvedConfig;
use crate::domain::{AnalysisRecord, Entity, NOT_FOUND};
use crate::error::LitError;
use crate::extract::{TextExtractor, find_exts};
use crate::mentions::{Mention, extract_mentions, top_mentions};
use crate::providers::europe_pmc::{EuropePmcClient, EuropePmcHttpClient};
use crate::providers::pubmed::{PubmedClient, PubmedHttpClient};
use crate::providers::scholar::scholar_link;
use crate::sheet;

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub input: String,
    pub output: String,
    pub column: String,
    pub entity_count: usize,
    pub records: Vec<AnalysisRecord>,
    pub generated_at: String,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub path: String,
    pub file_name: String,
    pub embedded_chars: usize,
    pub ocr_pages: usize,
    pub placenta_context: bool,
    pub mentions: Vec<Mention>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub directory: String,
    pub output: String,
    pub documents: Vec<DocumentReport>,
    pub records: Vec<AnalysisRecord>,
    pub generated_at: String,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifyResult {
    pub entity: String,
    pub pathway: String,
    pub scholar_link: String,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

/// Receives progress from worker threads, hence `Sync`.
pub trait ProgressSink: Sync {
    fn event(&self, event: ProgressEvent);
}

pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn event(&self, _event: ProgressEvent) {}
}

/// Offline classification; no provider is contacted.
pub fn classify_entities(entities: &[Entity], query_terms: &str) -> Vec<ClassifyResult> {
    entities
        .iter()
        .map(|entity| ClassifyResult {
            entity: entity.to_string(),
            pathway: pathway_label(entity),
            scholar_link: scholar_link(entity.as_str(), query_terms),
        })
        .collect()
}

pub struct App<P: PubmedClient, E: EuropePmcClient> {
    pubmed: P,
    europe_pmc: E,
    config: ResolvedConfig,
}

impl<P: PubmedClient, E: EuropePmcClient> App<P, E> {
    pub fn new(pubmed: P, europe_pmc: E, config: ResolvedConfig) -> Self {
        Self {
            pubmed,
            europe_pmc,
            config,
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn query_for(&self, entity: &Entity) -> String {
        format!("{} {}", entity.as_str(), self.config.query_terms)
    }

    /// Lookup failures are logged and rendered as "Not found"; they never fail
    /// the row.
    pub fn analyze_entity(&self, entity: &Entity) -> AnalysisRecord {
        let query = self.query_for(entity);

        let pubmed = self.pubmed.search(&query).unwrap_or_else(|err| {
            tracing::warn!(entity = %entity, error = %err, "PubMed lookup failed");
            None
        });
        let europe_pmc = self.europe_pmc.search(&query).unwrap_or_else(|err| {
            tracing::warn!(entity = %entity, error = %err, "Europe PMC lookup failed");
            None
        });

        let mut texts = Vec::new();
        if let Some(article) = &pubmed {
            texts.extend(article.title.iter().cloned());
            texts.extend(article.abstract_text.iter().cloned());
        }
        if let Some(hit) = &europe_pmc {
            texts.extend(hit.title.iter().cloned());
            texts.extend(hit.abstract_text.iter().cloned());
        }

        AnalysisRecord {
            entity: entity.to_string(),
            pubmed_doi: pubmed
                .as_ref()
                .and_then(|article| article.doi.clone())
                .unwrap_or_else(|| NOT_FOUND.to_string()),
            pubmed_link: pubmed
                .as_ref()
                .map(|article| article.link.clone())
                .unwrap_or_else(|| NOT_FOUND.to_string()),
            europe_pmc_doi: europe_pmc
                .as_ref()
                .and_then(|hit| hit.doi.clone())
                .unwrap_or_else(|| NOT_FOUND.to_string()),
            scholar_link: scholar_link(entity.as_str(), &self.config.query_terms),
            pathway: pathway_label(entity),
            evidence_type: classify_evidence(entity, &texts, &self.config.placenta_keywords),
            source_document: None,
            mention_count: None,
            frequency_tag: None,
        }
    }

    /// Output order follows `entities`, not completion order.
    pub fn analyze_all(
        &self,
        entities: &[Entity],
        sink: &dyn ProgressSink,
    ) -> Result<Vec<AnalysisRecord>, LitError> {
        let pool = self.worker_pool()?;
        let started = Instant::now();
        let records = pool.install(|| {
            entities
                .par_iter()
                .map(|entity| {
                    let record = self.analyze_entity(entity);
                    sink.event(ProgressEvent {
                        message: format!("Processed: {entity}"),
                        elapsed: Some(started.elapsed()),
                    });
                    record
                })
                .collect::<Vec<_>>()
        });
        Ok(records)
    }

    pub fn run_spreadsheet(
        &self,
        input: &Path,
        column: &str,
        output: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, LitError> {
        let started = Instant::now();
        sink.event(ProgressEvent {
            message: format!("phase=Read; {}", input.display()),
            elapsed: None,
        });
        let entities = sheet::read_entities(input, column)?;
        if entities.is_empty() {
            return Err(LitError::EmptyInput {
                column: column.to_string(),
                path: input.display().to_string(),
            });
        }

        tracing::info!(count = entities.len(), column, "analyzing entities");
        let records = self.analyze_all(&entities, sink)?;

        sink.event(ProgressEvent {
            message: format!("phase=Write; {}", output.display()),
            elapsed: Some(started.elapsed()),
        });
        sheet::write_records(output, &records, false)?;

        Ok(RunSummary {
            input: input.display().to_string(),
            output: output.display().to_string(),
            column: column.to_string(),
            entity_count: entities.len(),
            records,
            generated_at: Utc::now().to_rfc3339(),
            elapsed_ms: started.elapsed().as_millis(),
        })
    }

    pub fn scan_documents(
        &self,
        dir: &Path,
        extractor: &dyn TextExtractor,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<DocumentReport>, LitError> {
        let mut pdfs = find_exts(dir, "pdf");
        pdfs.sort();
        if pdfs.is_empty() {
            return Err(LitError::NoDocuments(dir.display().to_string()));
        }

        tracing::info!(count = pdfs.len(), dir = %dir.display(), "scanning documents");
        let pool = self.worker_pool()?;
        let started = Instant::now();
        let reports = pool.install(|| {
            pdfs.par_iter()
                .map(|path| {
                    let report = self.scan_document(path, extractor);
                    sink.event(ProgressEvent {
                        message: format!("Scanned: {}", report.file_name),
                        elapsed: Some(started.elapsed()),
                    });
                    report
                })
                .collect::<Vec<_>>()
        });
        Ok(reports)
    }

    fn scan_document(&self, path: &Path, extractor: &dyn TextExtractor) -> DocumentReport {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        match extractor.extract(path) {
            Ok(extracted) => {
                let mentions = top_mentions(
                    extract_mentions(&extracted.text),
                    self.config.min_mention_count,
                    self.config.max_mentions_per_document,
                );
                DocumentReport {
                    path: path.display().to_string(),
                    file_name,
                    embedded_chars: extracted.embedded_chars,
                    ocr_pages: extracted.ocr_pages,
                    placenta_context: contains_placenta_context(
                        &extracted.text,
                        &self.config.placenta_keywords,
                    ),
                    mentions,
                    warnings: extracted.warnings,
                    error: None,
                }
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping document");
                DocumentReport {
                    path: path.display().to_string(),
                    file_name,
                    embedded_chars: 0,
                    ocr_pages: 0,
                    placenta_context: false,
                    mentions: Vec::new(),
                    warnings: Vec::new(),
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Each distinct mention is looked up once; rows are emitted per
    /// (document, mention) pair.
    pub fn run_pdf_folder(
        &self,
        dir: &Path,
        extractor: &dyn TextExtractor,
        output: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<ScanSummary, LitError> {
        let started = Instant::now();
        let documents = self.scan_documents(dir, extractor, sink)?;

        let names = documents
            .iter()
            .flat_map(|doc| doc.mentions.iter().map(|mention| mention.name.clone()))
            .collect::<BTreeSet<_>>();
        let entities = names
            .iter()
            .filter_map(|name| name.parse::<Entity>().ok())
            .collect::<Vec<_>>();

        tracing::info!(count = entities.len(), "analyzing extracted entities");
        let analyzed = self
            .analyze_all(&entities, sink)?
            .into_iter()
            .map(|record| (record.entity.clone(), record))
            .collect::<HashMap<_, _>>();

        let mut records = Vec::new();
        for doc in &documents {
            for mention in &doc.mentions {
                let Some(base) = analyzed.get(&mention.name) else {
                    continue;
                };
                let mut record = base.clone();
                record.source_document = Some(doc.file_name.clone());
                record.mention_count = Some(mention.count);
                record.frequency_tag = Some(mention.tag);
                records.push(record);
            }
        }

        sheet::write_records(output, &records, true)?;

        Ok(ScanSummary {
            directory: dir.display().to_string(),
            output: output.display().to_string(),
            documents,
            records,
            generated_at: Utc::now().to_rfc3339(),
            elapsed_ms: started.elapsed().as_millis(),
        })
    }

    fn worker_pool(&self) -> Result<rayon::ThreadPool, LitError> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_threads)
            .build()
            .map_err(|err| LitError::WorkerPool(err.to_string()))
    }
}

pub type HttpApp = App<PubmedHttpClient, EuropePmcHttpClient>;

/// Builds the blocking HTTP clients; call it outside of an async runtime.
pub fn http_app(config: ResolvedConfig) -> Result<HttpApp, LitError> {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let pubmed = PubmedHttpClient::new(timeout)?;
    let europe_pmc = EuropePmcHttpClient::new(timeout)?;
    Ok(App::new(pubmed, europe_pmc, config))
}
