//! Field and book processing: detect, cast, then commit as one unit.
//!
//! Every run first claims its lock keys without waiting. A run that finds
//! its resource busy returns [`ProcessOutcome::Skipped`] and touches nothing.
//! Results are computed in full before anything is written back, so a failed
//! run leaves the previously committed result in place.

use std::{collections::HashSet, sync::Arc};

use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::{
    book::{Book, Field, FieldCache, FieldId, FieldResult, ProcessStatus, Sheet},
    cast::{HealthStats, cast_column},
    config::ProcessingConfig,
    decision::{RawDecision, TypeDecision},
    error::ConfigError,
    geo::GeoCatalog,
    geodata::{Geodata, extract_geodata},
    lock::{LockKey, ProcessingLocks},
    sampler::TypeSampler,
};

/// Result of a run that may have been skipped because of lock contention.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome<T> {
    Completed(T),
    Skipped,
}

impl<T> ProcessOutcome<T> {
    pub fn is_skipped(&self) -> bool {
        matches!(self, ProcessOutcome::Skipped)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            ProcessOutcome::Completed(value) => Some(value),
            ProcessOutcome::Skipped => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSummary {
    pub field_id: FieldId,
    pub title: String,
    pub decision: TypeDecision,
    pub health_stats: HealthStats,
}

impl FieldSummary {
    fn new(field: &Field, result: &FieldResult) -> Self {
        Self {
            field_id: field.id,
            title: field.title.clone(),
            decision: result.decision,
            health_stats: result.health_stats,
        }
    }
}

/// Downstream work triggered after results are committed (chart rendering,
/// cache warm-up).
pub trait ProcessingHook: Send + Sync {
    fn fields_processed(&self, _field_ids: &[FieldId]) {}
}

#[derive(Debug, Default)]
pub struct NoopHook;

impl ProcessingHook for NoopHook {}

pub struct FieldProcessor {
    catalog: Arc<GeoCatalog>,
    locks: Arc<ProcessingLocks>,
    sampler: TypeSampler,
    config: ProcessingConfig,
    hook: Arc<dyn ProcessingHook>,
}

impl FieldProcessor {
    pub fn new(catalog: Arc<GeoCatalog>, config: ProcessingConfig) -> Result<Self, ConfigError> {
        let sampler = TypeSampler::new(&config)?;
        Ok(Self {
            catalog,
            locks: Arc::new(ProcessingLocks::new()),
            sampler,
            config,
            hook: Arc::new(NoopHook),
        })
    }

    /// Shares a lock registry with other processors.
    pub fn with_locks(mut self, locks: Arc<ProcessingLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn ProcessingHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn locks(&self) -> &Arc<ProcessingLocks> {
        &self.locks
    }

    pub fn catalog(&self) -> &GeoCatalog {
        &self.catalog
    }

    /// Detects and casts one field without touching it.
    pub fn run_field(&self, field: &Field, data_row_index: usize) -> FieldResult {
        let values = field.data_values(data_row_index);
        let decision =
            self.sampler
                .detect(values, &self.catalog, self.config.field_seed(field.id));
        self.cast_field(field, data_row_index, decision)
    }

    fn cast_field(
        &self,
        field: &Field,
        data_row_index: usize,
        decision: TypeDecision,
    ) -> FieldResult {
        let (values, health_stats) =
            cast_column(field.data_values(data_row_index), &decision, &self.catalog);
        FieldResult {
            decision,
            values,
            health_stats,
        }
    }

    /// Re-detects and re-casts one field of `sheet`.
    pub fn process_field(
        &self,
        sheet: &mut Sheet,
        field_id: FieldId,
    ) -> Result<ProcessOutcome<FieldSummary>> {
        self.process_field_with(sheet, field_id, |processor, field, row| {
            Ok(processor.run_field(field, row))
        })
    }

    /// Casts one field under a caller-supplied decision. A decision that does
    /// not validate fails the run; the previous result stays committed.
    pub fn process_field_with_decision(
        &self,
        sheet: &mut Sheet,
        field_id: FieldId,
        decision: RawDecision,
    ) -> Result<ProcessOutcome<FieldSummary>> {
        self.process_field_with(sheet, field_id, move |processor, field, row| {
            let decision = TypeDecision::try_from(decision)
                .with_context(|| format!("Building decision for field {}", field.id))?;
            Ok(processor.cast_field(field, row, decision))
        })
    }

    fn process_field_with<F>(
        &self,
        sheet: &mut Sheet,
        field_id: FieldId,
        run: F,
    ) -> Result<ProcessOutcome<FieldSummary>>
    where
        F: FnOnce(&Self, &Field, usize) -> Result<FieldResult>,
    {
        let Some(_guard) = self.locks.try_acquire(LockKey::Field(field_id)) else {
            warn!("Field {field_id} is already being processed; skipping");
            return Ok(ProcessOutcome::Skipped);
        };
        let (sheet_id, data_row_index) = (sheet.id, sheet.data_row_index);
        let field = sheet
            .fields
            .iter_mut()
            .find(|field| field.id == field_id)
            .ok_or_else(|| anyhow!("Field {field_id} not found in sheet {sheet_id}"))?;

        match run(self, field, data_row_index) {
            Ok(result) => {
                let summary = FieldSummary::new(field, &result);
                commit(field, result);
                info!(
                    "Processed field {} ('{}') as {}",
                    field.id, field.title, summary.decision
                );
                self.hook.fields_processed(&[field_id]);
                Ok(ProcessOutcome::Completed(summary))
            }
            Err(err) => {
                warn!("Processing field {field_id} failed: {err:#}");
                field.status = ProcessStatus::Failed;
                field.error = Some(format!("{err:#}"));
                Err(err)
            }
        }
    }

    /// Processes every field of every sheet. Fields run in parallel and are
    /// committed together once all of them are done. A book whose fields
    /// cannot be told apart is marked failed and nothing is committed.
    pub fn process_book(&self, book: &mut Book) -> Result<ProcessOutcome<Vec<FieldSummary>>> {
        let mut keys = vec![LockKey::Book(book.id)];
        keys.extend(book.fields().map(|field| LockKey::Field(field.id)));
        let Some(_guard) = self.locks.try_acquire_all(&keys) else {
            warn!("Book {} is already being processed; skipping", book.id);
            return Ok(ProcessOutcome::Skipped);
        };

        let jobs: Vec<(usize, usize)> = book
            .sheets
            .iter()
            .enumerate()
            .flat_map(|(sheet_idx, sheet)| {
                (0..sheet.fields.len()).map(move |field_idx| (sheet_idx, field_idx))
            })
            .collect();
        debug!("Processing {} field(s) of book {}", jobs.len(), book.id);

        if let Err(err) = check_unique_field_ids(book) {
            warn!("Processing book {} failed: {err:#}", book.id);
            book.status = ProcessStatus::Failed;
            book.error = Some(format!("{err:#}"));
            return Err(err);
        }

        let results: Vec<FieldResult> = {
            let sheets = &book.sheets;
            jobs.par_iter()
                .map(|&(sheet_idx, field_idx)| {
                    let sheet = &sheets[sheet_idx];
                    self.run_field(&sheet.fields[field_idx], sheet.data_row_index)
                })
                .collect()
        };

        let mut summaries = Vec::with_capacity(results.len());
        for (&(sheet_idx, field_idx), result) in jobs.iter().zip(results) {
            let field = &mut book.sheets[sheet_idx].fields[field_idx];
            summaries.push(FieldSummary::new(field, &result));
            commit(field, result);
        }
        book.status = ProcessStatus::Success;
        book.error = None;
        info!(
            "Processed book {} ('{}'): {} field(s)",
            book.id,
            book.title,
            summaries.len()
        );

        let ids: Vec<FieldId> = summaries.iter().map(|summary| summary.field_id).collect();
        self.hook.fields_processed(&ids);
        Ok(ProcessOutcome::Completed(summaries))
    }

    /// Lists candidate areas per row of a geo-typed field.
    pub fn process_geodata(&self, sheet: &Sheet, field_id: FieldId) -> Result<ProcessOutcome<Geodata>> {
        let Some(_guard) = self.locks.try_acquire(LockKey::Geodata(field_id)) else {
            warn!("Geodata for field {field_id} is already being extracted; skipping");
            return Ok(ProcessOutcome::Skipped);
        };
        let field = sheet
            .fields
            .iter()
            .find(|field| field.id == field_id)
            .ok_or_else(|| anyhow!("Field {field_id} not found in sheet {}", sheet.id))?;
        let geodata = extract_geodata(field, sheet.data_row_index, &self.catalog)
            .with_context(|| format!("Extracting geodata for field {field_id}"))?;
        info!(
            "Extracted geodata for field {} ('{}'): {} row(s)",
            field.id,
            field.title,
            geodata.rows.len()
        );
        Ok(ProcessOutcome::Completed(geodata))
    }
}

fn check_unique_field_ids(book: &Book) -> Result<()> {
    let mut seen = HashSet::new();
    for field in book.fields() {
        if !seen.insert(field.id) {
            bail!("Field id {} appears more than once in book {}", field.id, book.id);
        }
    }
    Ok(())
}

fn commit(field: &mut Field, result: FieldResult) {
    field.result = Some(result);
    field.status = ProcessStatus::Success;
    field.error = None;
    field.cache = Some(FieldCache::pending(Utc::now()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        book::{FileType, RawValue},
        cast::CastValue,
        decision::{FieldType, NumberOptions},
        geo::GeoArea,
        number::Separator,
    };
    use serde_json::json;
    use std::sync::Mutex;

    fn raw(values: &[&str]) -> Vec<RawValue> {
        values.iter().map(|value| RawValue::from(*value)).collect()
    }

    fn catalog() -> Arc<GeoCatalog> {
        Arc::new(GeoCatalog::from_areas(vec![GeoArea {
            id: 3,
            title: "Kathmandu".to_string(),
            code: "NP-KTM".to_string(),
            admin_level: 2,
            admin_level_id: 12,
            region: 1,
            region_title: "Nepal".to_string(),
        }]))
    }

    fn processor() -> FieldProcessor {
        FieldProcessor::new(catalog(), ProcessingConfig::default()).expect("processor")
    }

    fn sheet() -> Sheet {
        Sheet {
            id: 1,
            title: "data".to_string(),
            data_row_index: 1,
            fields: vec![
                Field::new(1, "amount", 0, raw(&["amount", "10,000", "20,000", "30,000"])),
                Field::new(2, "district", 1, raw(&["district", "", "", "Kathmandu"])),
                Field::new(3, "notes", 2, raw(&["notes"])),
            ],
        }
    }

    fn book() -> Book {
        Book {
            id: 9,
            title: "survey.csv".to_string(),
            file_type: FileType::Csv,
            status: ProcessStatus::Pending,
            error: None,
            sheets: vec![sheet()],
        }
    }

    #[derive(Default)]
    struct RecordingHook {
        calls: Mutex<Vec<Vec<FieldId>>>,
    }

    impl ProcessingHook for RecordingHook {
        fn fields_processed(&self, field_ids: &[FieldId]) {
            self.calls.lock().unwrap().push(field_ids.to_vec());
        }
    }

    #[test]
    fn process_book_commits_every_field() {
        let hook = Arc::new(RecordingHook::default());
        let processor = processor().with_hook(hook.clone());
        let mut book = book();
        let summaries = processor
            .process_book(&mut book)
            .expect("process book")
            .completed()
            .expect("not skipped");
        assert_eq!(summaries.len(), 3);
        assert_eq!(book.status, ProcessStatus::Success);

        let amount = &book.sheets[0].fields[0];
        let result = amount.result.as_ref().expect("amount result");
        assert_eq!(
            result.decision,
            TypeDecision::Number(NumberOptions {
                separator: Separator::Comma
            })
        );
        assert_eq!(result.values.len(), 3);
        assert_eq!(result.values[0].value, Some(CastValue::Number(10000.0)));
        assert!(amount.cache.is_some());

        let district = &book.sheets[0].fields[1];
        let result = district.result.as_ref().expect("district result");
        assert_eq!(result.decision.field_type(), FieldType::Geo);
        assert_eq!(result.health_stats.null, 2);

        let notes = &book.sheets[0].fields[2];
        let result = notes.result.as_ref().expect("notes result");
        assert_eq!(result.decision, TypeDecision::String);
        assert_eq!(result.health_stats, HealthStats::default());

        assert_eq!(hook.calls.lock().unwrap().as_slice(), &[vec![1, 2, 3]]);
    }

    #[test]
    fn reprocessing_is_idempotent() {
        let processor = processor();
        let mut first = book();
        let mut second = book();
        processor.process_book(&mut first).expect("first run");
        processor.process_book(&mut second).expect("second run");
        processor.process_book(&mut second).expect("third run");
        for (left, right) in first.fields().zip(second.fields()) {
            assert_eq!(left.result, right.result);
        }
    }

    #[test]
    fn contended_book_is_skipped_without_side_effects() {
        let processor = processor();
        let mut book = book();
        let _held = processor
            .locks()
            .try_acquire(LockKey::Field(2))
            .expect("claim field");
        let outcome = processor.process_book(&mut book).expect("process book");
        assert!(outcome.is_skipped());
        assert_eq!(book.status, ProcessStatus::Pending);
        assert!(book.fields().all(|field| field.result.is_none()));
    }

    #[test]
    fn contended_field_is_skipped() {
        let processor = processor();
        let mut sheet = sheet();
        let _held = processor
            .locks()
            .try_acquire(LockKey::Field(1))
            .expect("claim field");
        let outcome = processor.process_field(&mut sheet, 1).expect("process field");
        assert!(outcome.is_skipped());
        assert_eq!(sheet.fields[0].status, ProcessStatus::Pending);
    }

    #[test]
    fn process_field_updates_only_that_field() {
        let processor = processor();
        let mut sheet = sheet();
        let summary = processor
            .process_field(&mut sheet, 2)
            .expect("process field")
            .completed()
            .expect("not skipped");
        assert_eq!(summary.title, "district");
        assert_eq!(sheet.fields[1].status, ProcessStatus::Success);
        assert_eq!(sheet.fields[0].status, ProcessStatus::Pending);
        assert!(!processor.locks().is_held(LockKey::Field(2)));
    }

    #[test]
    fn malformed_decision_fails_the_run_and_keeps_prior_result() {
        let processor = processor();
        let mut sheet = sheet();
        processor.process_field(&mut sheet, 1).expect("initial run");
        let prior = sheet.fields[0].result.clone();

        let bad: RawDecision =
            serde_json::from_value(json!({"type": "number", "options": {}})).unwrap();
        let err = processor
            .process_field_with_decision(&mut sheet, 1, bad)
            .unwrap_err();
        assert!(format!("{err:#}").contains("separator"));
        assert_eq!(sheet.fields[0].status, ProcessStatus::Failed);
        assert_eq!(sheet.fields[0].result, prior);

        let good: RawDecision =
            serde_json::from_value(json!({"type": "number", "options": {"separator": "none"}}))
                .unwrap();
        let summary = processor
            .process_field_with_decision(&mut sheet, 1, good)
            .expect("recast")
            .completed()
            .expect("not skipped");
        assert_eq!(summary.health_stats.invalid, 3);
        assert_eq!(sheet.fields[0].status, ProcessStatus::Success);
        assert_eq!(sheet.fields[0].error, None);
    }

    #[test]
    fn duplicate_field_ids_fail_the_whole_book() {
        let processor = processor();
        let mut book = book();
        book.sheets.push(Sheet {
            id: 2,
            title: "copy".to_string(),
            data_row_index: 0,
            fields: vec![Field::new(4, "x", 0, raw(&["1"])), Field::new(4, "y", 1, raw(&["2"]))],
        });
        assert!(processor.process_book(&mut book).is_err());
        assert_eq!(book.status, ProcessStatus::Failed);
        assert!(book.error.as_deref().unwrap_or_default().contains("more than once"));
        assert!(book.fields().all(|field| field.result.is_none()));
        assert!(!processor.locks().is_held(LockKey::Book(9)));
    }

    #[test]
    fn unknown_field_is_an_error() {
        let processor = processor();
        let mut sheet = sheet();
        assert!(processor.process_field(&mut sheet, 99).is_err());
        assert!(!processor.locks().is_held(LockKey::Field(99)));
    }

    #[test]
    fn geodata_runs_on_processed_geo_fields() {
        let processor = processor();
        let mut sheet = sheet();
        processor.process_field(&mut sheet, 2).expect("process district");
        let geodata = processor
            .process_geodata(&sheet, 2)
            .expect("geodata")
            .completed()
            .expect("not skipped");
        assert_eq!(geodata.rows.len(), 3);
        assert_eq!(geodata.rows[2].selected_id, Some(3));

        assert!(processor.process_geodata(&sheet, 1).is_err());
    }
}
