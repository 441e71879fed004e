//! Classification Pipeline and Batch Store
//!
//! An upload goes through validation, CSV reading, cleaning, classification
//! and KPI aggregation and becomes a [`Batch`]. Batches are kept in memory
//! only, up to a fixed number.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::classify::{Backend, Classification, ClassifierRegistry};
use crate::ingest::columns::metadata_value;
use crate::ingest::{
    clean_records, detect_date_column, parse_date, validate_upload, Annotations, CleaningStats,
    CsvReader, IngestError, Record, TextCleaner,
};
use crate::kpi::{self, KpiReport};
use crate::labels::claim_str;

/// Errors raised by the pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

/// An uploaded file waiting to be classified
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Registry default when `None`
    pub backend: Option<Backend>,
    pub text_column: Option<String>,
}

/// A classified upload
#[derive(Debug, Clone)]
pub struct Batch {
    pub id: Uuid,
    pub file_name: String,
    pub backend: Backend,
    pub created_at: DateTime<Utc>,
    pub text_column: String,
    /// Column the daily volume is computed from
    pub date_column: Option<String>,
    pub records: Vec<Record>,
    /// Index-aligned with `records`
    pub classifications: Vec<Classification>,
    pub cleaning: CleaningStats,
    pub kpis: KpiReport,
    pub fallback_count: usize,
    /// Rows whose uploaded label columns replaced classifier labels
    pub annotated_rows: usize,
    pub rows_failed: usize,
    pub errors: Vec<String>,
}

/// Compact view of a batch for listings
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub id: Uuid,
    pub file_name: String,
    pub backend: Backend,
    pub created_at: DateTime<Utc>,
    pub text_column: String,
    pub date_column: Option<String>,
    pub total: usize,
    pub claims: usize,
    pub negatives: usize,
    pub urgent: usize,
    pub fallback_count: usize,
    pub rows_failed: usize,
}

/// One exported row
#[derive(Debug, Serialize)]
pub struct ExportRow<'a> {
    pub row: usize,
    pub text: &'a str,
    pub cleaned: &'a str,
    #[serde(flatten)]
    pub classification: &'a Classification,
    pub metadata: BTreeMap<&'a str, &'a str>,
}

const EXPORT_COLUMNS: &[&str] = &[
    "row",
    "text",
    "cleaned",
    "sentiment",
    "is_claim",
    "urgency",
    "topic",
    "incident",
    "category",
    "confidence",
    "backend",
];

impl Batch {
    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            id: self.id,
            file_name: self.file_name.clone(),
            backend: self.backend,
            created_at: self.created_at,
            text_column: self.text_column.clone(),
            date_column: self.date_column.clone(),
            total: self.kpis.total,
            claims: self.kpis.claims,
            negatives: self.kpis.negatives,
            urgent: self.kpis.urgent,
            fallback_count: self.fallback_count,
            rows_failed: self.rows_failed,
        }
    }

    /// Records paired with their classification
    pub fn rows(&self) -> impl Iterator<Item = (&Record, &Classification)> {
        self.records.iter().zip(self.classifications.iter())
    }

    pub fn export_rows(&self) -> Vec<ExportRow<'_>> {
        self.rows()
            .map(|(record, classification)| ExportRow {
                row: record.row,
                text: &record.text,
                cleaned: &record.cleaned,
                classification,
                metadata: record
                    .metadata
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect(),
            })
            .collect()
    }

    /// Export as CSV: classification columns followed by the original metadata
    ///
    /// Uploaded columns named like an export column are left out, so an
    /// export can be uploaded again.
    pub fn to_csv(&self) -> Result<String, csv::Error> {
        let metadata_idx: Vec<usize> = self
            .records
            .first()
            .map(|r| {
                r.metadata
                    .iter()
                    .enumerate()
                    .filter(|(_, (k, _))| !EXPORT_COLUMNS.iter().any(|c| c.eq_ignore_ascii_case(k)))
                    .map(|(i, _)| i)
                    .collect()
            })
            .unwrap_or_default();
        let metadata_columns: Vec<&str> = metadata_idx
            .iter()
            .filter_map(|&i| self.records.first()?.metadata.get(i))
            .map(|(k, _)| k.as_str())
            .collect();

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(EXPORT_COLUMNS.iter().chain(metadata_columns.iter()))?;

        for (record, c) in self.rows() {
            let confidence = format!("{:.2}", c.confidence);
            let mut fields: Vec<&str> = Vec::with_capacity(EXPORT_COLUMNS.len() + metadata_columns.len());
            let row = record.row.to_string();
            fields.extend([
                row.as_str(),
                record.text.as_str(),
                record.cleaned.as_str(),
                c.sentiment.as_str(),
                claim_str(c.is_claim),
                c.urgency.as_str(),
                c.topic.as_str(),
                c.incident.as_str(),
                c.category.as_str(),
                confidence.as_str(),
                c.backend.as_str(),
            ]);
            fields.extend(
                metadata_idx
                    .iter()
                    .filter_map(|&i| record.metadata.get(i))
                    .map(|(_, v)| v.as_str()),
            );
            writer.write_record(&fields)?;
        }

        let bytes = writer.into_inner().map_err(|e| csv::Error::from(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Runs uploads through cleaning and classification
pub struct Pipeline {
    registry: Arc<ClassifierRegistry>,
    cleaner: TextCleaner,
    max_upload_bytes: usize,
}

impl Pipeline {
    pub fn new(registry: Arc<ClassifierRegistry>, cleaner: TextCleaner, max_upload_bytes: usize) -> Self {
        Self {
            registry,
            cleaner,
            max_upload_bytes,
        }
    }

    pub fn registry(&self) -> &ClassifierRegistry {
        &self.registry
    }

    pub async fn run(&self, upload: Upload) -> Result<Batch, PipelineError> {
        validate_upload(&upload.file_name, &upload.bytes, self.max_upload_bytes)?;

        let read = CsvReader::new()
            .with_text_column(upload.text_column.as_deref())
            .read_bytes(&upload.bytes)?;

        if read.records.is_empty() && read.rows_failed > 0 {
            return Err(IngestError::NoRecords.into());
        }

        let (records, cleaning) = clean_records(&self.cleaner, read.records);
        let texts: Vec<String> = records.iter().map(|r| r.cleaned.clone()).collect();

        let mut outcome = self.registry.classify(upload.backend, &texts).await;

        let mut annotated_rows = 0;
        for (record, classification) in records.iter().zip(outcome.results.iter_mut()) {
            let annotations = Annotations::from_metadata(&record.metadata);
            if !annotations.is_empty() {
                annotations.apply(classification);
                annotated_rows += 1;
            }
        }

        let date_column = detect_date_column(&read.headers, &read.text_column);
        let dates: Vec<_> = match &date_column {
            Some(column) => records
                .iter()
                .map(|r| metadata_value(&r.metadata, column).and_then(parse_date))
                .collect(),
            None => Vec::new(),
        };
        let kpis = kpi::compute_with_dates(&outcome.results, &dates);

        let batch = Batch {
            id: Uuid::new_v4(),
            file_name: upload.file_name,
            backend: outcome.requested,
            created_at: Utc::now(),
            text_column: read.text_column,
            date_column,
            records,
            classifications: outcome.results,
            cleaning,
            kpis,
            fallback_count: outcome.fallback_count,
            annotated_rows,
            rows_failed: read.rows_failed,
            errors: read.errors,
        };

        tracing::info!(
            batch_id = %batch.id,
            file = %batch.file_name,
            backend = %batch.backend,
            rows = batch.records.len(),
            fallback = batch.fallback_count,
            annotated = batch.annotated_rows,
            "Batch classified"
        );

        Ok(batch)
    }
}

/// Bounded in-memory batch store
pub struct BatchStore {
    batches: RwLock<VecDeque<Arc<Batch>>>,
    capacity: usize,
}

impl BatchStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            batches: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Store a batch, evicting the oldest ones beyond capacity
    pub async fn insert(&self, batch: Batch) -> Arc<Batch> {
        let batch = Arc::new(batch);
        let mut batches = self.batches.write().await;
        batches.push_back(Arc::clone(&batch));
        while batches.len() > self.capacity {
            if let Some(evicted) = batches.pop_front() {
                tracing::debug!(batch_id = %evicted.id, "Evicted batch");
            }
        }
        batch
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<Batch>> {
        self.batches
            .read()
            .await
            .iter()
            .find(|b| b.id == id)
            .cloned()
    }

    pub async fn latest(&self) -> Option<Arc<Batch>> {
        self.batches.read().await.back().cloned()
    }

    /// All batches, newest first
    pub async fn list(&self) -> Vec<Arc<Batch>> {
        self.batches.read().await.iter().rev().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.batches.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::Sentiment;

    fn pipeline() -> Pipeline {
        Pipeline::new(
            Arc::new(ClassifierRegistry::rules_only()),
            TextCleaner::new(),
            1024 * 1024,
        )
    }

    fn upload(csv: &str) -> Upload {
        Upload {
            file_name: "tweets.csv".to_string(),
            bytes: csv.as_bytes().to_vec(),
            backend: None,
            text_column: None,
        }
    }

    const SAMPLE: &str = "id,text\n\
        1,Panne de connexion depuis 3 jours !\n\
        2,Merci Free pour la fibre\n\
        3,Panne de connexion depuis 3 jours !\n\
        4,\n\
        5,Ma facture est trop élevée\n";

    #[tokio::test]
    async fn test_pipeline_run() {
        let batch = pipeline().run(upload(SAMPLE)).await.unwrap();

        assert_eq!(batch.backend, Backend::Rules);
        assert_eq!(batch.text_column, "text");
        assert_eq!(batch.records.len(), 3);
        assert_eq!(batch.classifications.len(), 3);
        assert_eq!(batch.cleaning.duplicates_removed, 1);
        assert_eq!(batch.cleaning.empty_removed, 1);
        assert_eq!(batch.kpis.total, 3);
        assert_eq!(batch.fallback_count, 0);
        assert!(batch.classifications[0].is_claim);
        assert_eq!(batch.classifications[1].sentiment, Sentiment::Positif);
    }

    #[tokio::test]
    async fn test_missing_llm_counts_fallback() {
        let mut up = upload(SAMPLE);
        up.backend = Some(Backend::Llm);
        let batch = pipeline().run(up).await.unwrap();
        assert_eq!(batch.backend, Backend::Llm);
        assert_eq!(batch.fallback_count, 3);
    }

    #[tokio::test]
    async fn test_rejects_bad_upload() {
        let mut up = upload(SAMPLE);
        up.file_name = "tweets.json".to_string();
        assert!(matches!(
            pipeline().run(up).await,
            Err(PipelineError::Ingest(IngestError::UnsupportedExtension(_)))
        ));
    }

    #[tokio::test]
    async fn test_all_rows_unreadable_is_rejected() {
        let mut up = upload("id,text\n");
        up.bytes.extend_from_slice(&[b'1', b',', 0xff, b'\n', b'2', b',', 0xfe, b'\n']);
        assert!(matches!(
            pipeline().run(up).await,
            Err(PipelineError::Ingest(IngestError::NoRecords))
        ));
    }

    #[tokio::test]
    async fn test_unreadable_rows_are_skipped() {
        let mut up = upload("id,text\n1,Merci Free\n");
        up.bytes.extend_from_slice(&[b'2', b',', 0xff, b'\n']);
        let batch = pipeline().run(up).await.unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.rows_failed, 1);
        assert!(batch.errors[0].starts_with("Line 3:"));
    }

    #[tokio::test]
    async fn test_headers_only_gives_empty_batch() {
        let batch = pipeline().run(upload("text\n")).await.unwrap();
        assert_eq!(batch.kpis.total, 0);
        assert_eq!(batch.kpis.claim_percent, 0.0);
    }

    #[tokio::test]
    async fn test_date_column_feeds_daily_volume() {
        let csv = "created_at,text\n\
            2024-05-01 09:00:00,Panne fibre\n\
            2024-05-01 18:00:00,Merci Free\n\
            2024-05-03 10:00:00,Facture trop élevée\n\
            pas une date,Réseau lent\n";
        let batch = pipeline().run(upload(csv)).await.unwrap();

        assert_eq!(batch.date_column.as_deref(), Some("created_at"));
        assert_eq!(batch.kpis.daily.len(), 2);
        assert_eq!(batch.kpis.daily[0].total, 2);
        assert_eq!(batch.kpis.daily[1].date.to_string(), "2024-05-03");
        assert_eq!(batch.kpis.total, 4);
    }

    #[tokio::test]
    async fn test_uploaded_labels_replace_classifier() {
        let csv = "text,sentiment,urgence\n\
            Panne fibre depuis 3 jours,positive,low\n\
            Merci Free pour la fibre,,\n";
        let batch = pipeline().run(upload(csv)).await.unwrap();

        assert_eq!(batch.annotated_rows, 1);
        assert_eq!(batch.classifications[0].sentiment, Sentiment::Positif);
        assert_eq!(batch.classifications[0].urgency, crate::labels::Urgency::Faible);
        // topic still comes from the rules
        assert_eq!(batch.classifications[0].topic, crate::labels::Topic::Fibre);
        assert_eq!(batch.classifications[1].sentiment, Sentiment::Positif);
    }

    #[tokio::test]
    async fn test_export_can_be_uploaded_again() {
        let p = pipeline();
        let first = p.run(upload(SAMPLE)).await.unwrap();
        let exported = first.to_csv().unwrap();

        let second = p.run(upload(&exported)).await.unwrap();
        assert_eq!(second.annotated_rows, second.records.len());
        assert_eq!(second.to_csv().unwrap().lines().next(), exported.lines().next());
        let labels = |b: &Batch| -> Vec<_> { b.classifications.iter().map(|c| (c.sentiment, c.urgency)).collect() };
        assert_eq!(labels(&second), labels(&first));
    }

    #[tokio::test]
    async fn test_csv_export() {
        let batch = pipeline().run(upload(SAMPLE)).await.unwrap();
        let csv = batch.to_csv().unwrap();
        let mut lines = csv.lines();

        assert_eq!(
            lines.next().unwrap(),
            "row,text,cleaned,sentiment,is_claim,urgency,topic,incident,category,confidence,backend,id"
        );
        let first = lines.next().unwrap();
        assert!(first.starts_with("2,Panne de connexion depuis 3 jours !,"));
        assert!(first.contains(",oui,haute,"));
        assert!(first.ends_with(",rules,1"));
        assert_eq!(csv.lines().count(), 4);
    }

    #[tokio::test]
    async fn test_json_export_flattens() {
        let batch = pipeline().run(upload(SAMPLE)).await.unwrap();
        let json = serde_json::to_value(batch.export_rows()).unwrap();
        assert_eq!(json[0]["row"], 2);
        assert_eq!(json[0]["is_claim"], true);
        assert_eq!(json[0]["metadata"]["id"], "1");
    }

    #[tokio::test]
    async fn test_store_evicts_oldest() {
        let store = BatchStore::new(2);
        let p = pipeline();

        let first = store.insert(p.run(upload(SAMPLE)).await.unwrap()).await;
        let second = store.insert(p.run(upload(SAMPLE)).await.unwrap()).await;
        let third = store.insert(p.run(upload(SAMPLE)).await.unwrap()).await;

        assert_eq!(store.len().await, 2);
        assert!(store.get(first.id).await.is_none());
        assert_eq!(store.latest().await.unwrap().id, third.id);

        let ids: Vec<Uuid> = store.list().await.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![third.id, second.id]);
    }
}
