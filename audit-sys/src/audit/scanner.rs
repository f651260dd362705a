// SPDX-License-Identifier: GPL-3.0-only

use std::time::Instant;

use chrono::{DateTime, Datelike, TimeDelta, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use audit_contracts::ObjectLister;
use audit_types::{
    AggregateStore, NO_EXTENSION, ObjectPage, ObjectRecord, PageRequest, Partition,
    PartitionScope, ScanCursor, ScanReport, ScanStatus,
};

use super::checkpoint::{CHECKPOINT_VERSION, CheckpointFile, CheckpointSnapshot};
use super::classifier::{ObjectKind, classify, extension_of};
use super::error::ObjectError;
use super::partitioner::plan_partitions;
use super::progress::{ThroughputMeter, format_bytes, format_duration};
use super::types::{CountingMode, ScanConfig};

/// What the loop does after a page has been folded in.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PageFlow {
    Next(String),
    Exhausted,
    Stop(ScanStatus),
}

#[derive(Debug)]
enum PartitionOutcome {
    Exhausted,
    /// The token is the one the next request of this partition would carry.
    Aborted {
        status: ScanStatus,
        token: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FoldOutcome {
    Counted,
    Marker,
    Excluded,
    OutsideWindow,
}

/// Page-local staging area, merged into the run only once a page completes.
#[derive(Default)]
struct PageTally {
    aggregates: AggregateStore,
    ignored: u64,
    outside_window: u64,
}

struct RunState {
    run_id: Uuid,
    reference_time: DateTime<Utc>,
    window_start: DateTime<Utc>,
    partitions: Vec<Partition>,
    start: ScanCursor,
    resumed_from: Option<ScanCursor>,
    aggregates: AggregateStore,
    objects_ignored: u64,
    objects_outside_window: u64,
    pages_processed: u64,
    requests_made: u64,
    checkpoint_failures: u64,
    last_saved: Option<ScanCursor>,
    meter: ThroughputMeter,
}

/// Start of the recency window, saturating at the earliest representable time.
fn window_start(reference_time: DateTime<Utc>, window: TimeDelta) -> DateTime<Utc> {
    reference_time
        .checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl RunState {
    fn fresh(config: &ScanConfig, partitions: Vec<Partition>) -> Self {
        let reference_time = config.reference_time.unwrap_or_else(Utc::now);
        Self {
            run_id: Uuid::new_v4(),
            reference_time,
            window_start: window_start(reference_time, config.recent_window),
            partitions,
            start: ScanCursor::default(),
            resumed_from: None,
            aggregates: AggregateStore::new(),
            objects_ignored: 0,
            objects_outside_window: 0,
            pages_processed: 0,
            requests_made: 0,
            checkpoint_failures: 0,
            last_saved: None,
            meter: ThroughputMeter::start(),
        }
    }

    fn absorb(&mut self, tally: PageTally) {
        self.aggregates.absorb(tally.aggregates);
        self.objects_ignored += tally.ignored;
        self.objects_outside_window += tally.outside_window;
        self.pages_processed += 1;
    }
}

/// Drives one scan over a partitioned namespace.
///
/// The scanner is single-task: partitions and their pages are walked in
/// order, and the aggregate store is only written from this loop. Progress is
/// persisted to the configured checkpoint every `checkpoint_every_pages`
/// pages, at every partition boundary and on every abort, and the checkpoint
/// is removed once a run completes.
pub struct Scanner<L> {
    lister: L,
    config: ScanConfig,
    checkpoint: CheckpointFile,
    cancel: CancellationToken,
}

impl<L: ObjectLister> Scanner<L> {
    pub fn new(lister: L, config: ScanConfig) -> Self {
        let checkpoint = CheckpointFile::new(config.checkpoint_path.clone());
        Self {
            lister,
            config,
            checkpoint,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn checkpoint(&self) -> &CheckpointFile {
        &self.checkpoint
    }

    pub fn lister(&self) -> &L {
        &self.lister
    }

    /// Runs to a terminal status. Never panics on transport or checkpoint
    /// failures: those are reflected in the returned report.
    pub async fn run(&self) -> ScanReport {
        let started = Instant::now();
        let root = self.config.root_prefix.as_str();
        let excluded = self.config.excluded_prefix.as_deref();

        tracing::info!(
            root,
            excluded = excluded.unwrap_or("-"),
            mode = self.config.counting_mode.as_str(),
            checkpoint = %self.checkpoint.path().display(),
            "starting scan"
        );

        let plan = match plan_partitions(&self.lister, root, excluded).await {
            Ok(plan) => plan,
            Err(error) => {
                tracing::error!(%error, "partitioning failed, existing checkpoint left untouched");
                let mut state = RunState::fresh(&self.config, Vec::new());
                state.last_saved = self
                    .checkpoint
                    .load()
                    .filter(|record| record.matches(&self.config))
                    .map(|record| record.cursor);
                let status = ScanStatus::Failed {
                    message: format!("partitioning failed: {error}"),
                };
                return self.report(state, status, started);
            }
        };

        let mut state = self.restore(plan.partitions);
        let status = self.scan_partitions(&mut state).await;
        self.finish(&mut state, &status);
        self.report(state, status, started)
    }

    fn restore(&self, partitions: Vec<Partition>) -> RunState {
        let mut state = RunState::fresh(&self.config, partitions);

        let Some(record) = self.checkpoint.load() else {
            return state;
        };

        if !record.matches(&self.config) {
            tracing::warn!(
                checkpoint_root = %record.root_prefix,
                checkpoint_excluded = record.excluded_prefix.as_deref().unwrap_or("-"),
                checkpoint_mode = record.counting_mode.as_str(),
                checkpoint_window_secs = ?record.recent_window_secs,
                mode = self.config.counting_mode.as_str(),
                window_secs = self.config.recent_window.num_seconds(),
                "checkpoint belongs to a different scan, starting fresh"
            );
            return state;
        }

        let partitions = if record.partitions.is_empty() {
            state.partitions
        } else {
            if record.partitions != state.partitions {
                tracing::warn!(
                    stored = record.partitions.len(),
                    fresh = state.partitions.len(),
                    "namespace changed since checkpoint, keeping stored partition list"
                );
            }
            record.partitions
        };

        if record.cursor.partition_index > partitions.len() {
            tracing::warn!(
                cursor = %record.cursor,
                partitions = partitions.len(),
                "checkpoint cursor out of range, starting fresh"
            );
            state.partitions = partitions;
            return state;
        }

        let reference_time = self
            .config
            .reference_time
            .or(record.reference_time)
            .unwrap_or(state.reference_time);

        tracing::info!(
            cursor = %record.cursor,
            objects = record.aggregates.objects(),
            saved_at = ?record.saved_at,
            "resuming from checkpoint"
        );

        RunState {
            run_id: if record.run_id.is_nil() {
                state.run_id
            } else {
                record.run_id
            },
            reference_time,
            window_start: window_start(reference_time, self.config.recent_window),
            partitions,
            start: record.cursor.clone(),
            resumed_from: Some(record.cursor.clone()),
            aggregates: record.aggregates,
            objects_ignored: record.objects_ignored,
            objects_outside_window: record.objects_outside_window,
            pages_processed: record.pages_processed,
            last_saved: Some(record.cursor),
            ..state
        }
    }

    async fn scan_partitions(&self, state: &mut RunState) -> ScanStatus {
        let mut index = state.start.partition_index;
        let mut token = state.start.continuation_token.take();

        while let Some(partition) = state.partitions.get(index).cloned() {
            tracing::info!(
                index,
                total = state.partitions.len(),
                partition = %partition,
                resuming = token.is_some(),
                "scanning partition"
            );

            match self.scan_partition(state, index, &partition, token.take()).await {
                PartitionOutcome::Exhausted => {
                    index += 1;
                    self.persist(state, ScanCursor::start_of(index));
                }
                PartitionOutcome::Aborted { status, token } => {
                    tracing::warn!(%status, index, partition = %partition, "scan stopped");
                    self.persist(state, ScanCursor::within(index, token));
                    return status;
                }
            }
        }

        ScanStatus::Success
    }

    async fn scan_partition(
        &self,
        state: &mut RunState,
        index: usize,
        partition: &Partition,
        mut token: Option<String>,
    ) -> PartitionOutcome {
        let mut pages_since_save = 0;

        loop {
            if self.cancel.is_cancelled() {
                return PartitionOutcome::Aborted {
                    status: ScanStatus::Cancelled,
                    token,
                };
            }

            if self.config.limit_reached(state.requests_made) {
                return PartitionOutcome::Aborted {
                    status: ScanStatus::LimitReached {
                        limit: self.config.max_requests,
                    },
                    token,
                };
            }

            let request = match partition.scope {
                PartitionScope::Direct => PageRequest::direct(&partition.prefix),
                PartitionScope::Recursive => PageRequest::recursive(&partition.prefix),
            }
            .resume_from(token.as_deref());

            state.requests_made += 1;
            let page = match self.lister.list_objects_page(request).await {
                Ok(page) => page,
                Err(error) => {
                    tracing::error!(%error, partition = %partition, "page request failed");
                    return PartitionOutcome::Aborted {
                        status: ScanStatus::Failed {
                            message: error.to_string(),
                        },
                        token,
                    };
                }
            };

            match self.process_page(state, page) {
                PageFlow::Next(next) => {
                    token = Some(next);
                    pages_since_save += 1;
                    if pages_since_save >= self.config.checkpoint_every_pages {
                        self.persist(state, ScanCursor::within(index, token.clone()));
                        pages_since_save = 0;
                    }
                }
                PageFlow::Exhausted => return PartitionOutcome::Exhausted,
                PageFlow::Stop(status) => return PartitionOutcome::Aborted { status, token },
            }
        }
    }

    fn process_page(&self, state: &mut RunState, page: ObjectPage) -> PageFlow {
        let ObjectPage {
            objects,
            next_continuation_token,
        } = page;
        let mut tally = PageTally::default();

        for object in &objects {
            if self.cancel.is_cancelled() {
                tracing::info!(
                    discarded = tally.aggregates.objects(),
                    "cancelled mid-page, page will be re-read on resume"
                );
                return PageFlow::Stop(ScanStatus::Cancelled);
            }

            match self.fold_object(&mut tally.aggregates, state.window_start, object) {
                Ok(FoldOutcome::Counted | FoldOutcome::Marker) => {}
                Ok(FoldOutcome::Excluded) => tally.ignored += 1,
                Ok(FoldOutcome::OutsideWindow) => tally.outside_window += 1,
                Err(error) => {
                    tracing::warn!(%error, "skipping object");
                    tally.ignored += 1;
                }
            }
        }

        let counted = tally.aggregates.objects();
        state.absorb(tally);
        state.meter.record(counted);

        if self.config.progress_every_pages > 0
            && state.pages_processed % self.config.progress_every_pages == 0
        {
            tracing::info!(
                pages = state.pages_processed,
                objects = state.aggregates.objects(),
                ignored = state.objects_ignored,
                volume = %format_bytes(state.aggregates.bytes()),
                objects_per_sec = state.meter.objects_per_sec().round(),
                elapsed = %format_duration(Some(state.meter.elapsed())),
                "scan progress"
            );
        }

        match next_continuation_token {
            Some(token) => PageFlow::Next(token),
            None => PageFlow::Exhausted,
        }
    }

    fn fold_object(
        &self,
        tally: &mut AggregateStore,
        window_start: DateTime<Utc>,
        object: &ObjectRecord,
    ) -> Result<FoldOutcome, ObjectError> {
        if self.config.is_excluded(&object.key) {
            return Ok(FoldOutcome::Excluded);
        }

        let classified = classify(&object.key, object.last_modified)?;
        let ObjectKind::File { modified } = classified.kind else {
            classified
                .ancestors()
                .for_each(|ancestor| tally.mark_known_path(ancestor));
            tally.record_marker();
            return Ok(FoldOutcome::Marker);
        };

        let recent = modified >= window_start;
        if !recent && self.config.counting_mode == CountingMode::RecentOnly {
            return Ok(FoldOutcome::OutsideWindow);
        }

        classified
            .ancestors()
            .for_each(|ancestor| tally.mark_known_path(ancestor));

        let folder = classified.folder;
        tally.mark_folder_has_files(folder);
        tally.record_year(folder, modified.year());
        let extension = extension_of(&object.key);
        tally.record_extension(folder, extension.as_deref().unwrap_or(NO_EXTENSION));
        if recent {
            tally.record_recent(folder);
        }
        tally.record_object(object.size);

        Ok(FoldOutcome::Counted)
    }

    fn persist(&self, state: &mut RunState, cursor: ScanCursor) {
        let snapshot = CheckpointSnapshot {
            version: CHECKPOINT_VERSION,
            run_id: state.run_id,
            root_prefix: &self.config.root_prefix,
            excluded_prefix: self.config.excluded_prefix.as_deref(),
            reference_time: Some(state.reference_time),
            counting_mode: self.config.counting_mode,
            recent_window_secs: Some(self.config.recent_window.num_seconds()),
            partitions: &state.partitions,
            cursor: &cursor,
            aggregates: &state.aggregates,
            objects_ignored: state.objects_ignored,
            objects_outside_window: state.objects_outside_window,
            pages_processed: state.pages_processed,
            saved_at: Some(Utc::now()),
        };

        match self.checkpoint.save(&snapshot) {
            Ok(()) => {
                tracing::debug!(%cursor, objects = state.aggregates.objects(), "checkpoint saved");
                state.last_saved = Some(cursor);
            }
            Err(error) => {
                tracing::error!(%error, %cursor, "failed to save checkpoint");
                state.checkpoint_failures += 1;
            }
        }
    }

    fn finish(&self, state: &mut RunState, status: &ScanStatus) {
        if status.retains_checkpoint() {
            tracing::info!(
                %status,
                checkpoint = %self.checkpoint.path().display(),
                "checkpoint retained for resume"
            );
            return;
        }

        match self.checkpoint.clear() {
            Ok(()) => {
                tracing::info!("scan complete, checkpoint removed");
                state.last_saved = None;
            }
            Err(error) => {
                tracing::error!(%error, "scan complete but checkpoint could not be removed");
                state.checkpoint_failures += 1;
            }
        }
    }

    fn report(&self, state: RunState, status: ScanStatus, started: Instant) -> ScanReport {
        ScanReport {
            run_id: state.run_id,
            status,
            root_prefix: self.config.root_prefix.clone(),
            excluded_prefix: self.config.excluded_prefix.clone(),
            reference_time: state.reference_time,
            objects_processed: state.aggregates.objects(),
            aggregates: state.aggregates,
            objects_ignored: state.objects_ignored,
            objects_outside_window: state.objects_outside_window,
            requests_made: state.requests_made,
            pages_processed: state.pages_processed,
            checkpoint_failures: state.checkpoint_failures,
            partitions: state.partitions,
            resumed_from: state.resumed_from,
            checkpoint_cursor: state.last_saved,
            elapsed_ms: started.elapsed().as_millis(),
        }
    }
}
