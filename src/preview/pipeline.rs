//! Preview update pipeline
//!
//! Turns the records behind a selected leaf into preview rows: facets,
//! decoded image and status for each. Runs on a worker thread and reports
//! through a `PipelineSink`; the interactive side only ever sees finished
//! rows and progress values.

use super::row::{ItemError, PreviewRow, PreviewRowBuilder};
use crate::archive::ModArchive;
use crate::catalog::{CategoryTree, ModRecord, NodeId};
use crate::classify::ItemIdentity;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Batches larger than this prefetch an index of their data partition
pub const PREFETCH_THRESHOLD: usize = 10;

/// Shared cancel flag for one pipeline run
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub prefetch_threshold: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            prefetch_threshold: PREFETCH_THRESHOLD,
        }
    }
}

/// How texture data is located for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Per-record lookup
    Lazy,
    /// One index for the whole batch
    Prefetched,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self { completed: 0, total }
    }

    /// Integer percentage, 0 for an empty batch
    pub fn percent(&self) -> usize {
        if self.total == 0 {
            0
        } else {
            self.completed * 100 / self.total
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.completed, self.total)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Preview update cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub published: usize,
    pub skipped: usize,
    pub total: usize,
    pub strategy: Strategy,
}

/// Receiver of pipeline output
pub trait PipelineSink {
    fn on_row(&self, row: PreviewRow);
    fn on_progress(&self, progress: Progress);
    fn on_item_error(&self, error: ItemError);
}

#[derive(Debug)]
pub enum PipelineEvent {
    Row(PreviewRow),
    Progress(Progress),
    ItemError(ItemError),
    Finished(Result<RunSummary, PipelineError>),
}

/// Forwards pipeline output to the interactive thread, tagged with the
/// selection generation that started the run
#[derive(Clone)]
pub struct ChannelSink {
    generation: u64,
    tx: Sender<(u64, PipelineEvent)>,
}

impl ChannelSink {
    pub fn new(generation: u64, tx: Sender<(u64, PipelineEvent)>) -> Self {
        Self { generation, tx }
    }

    pub fn finish(&self, result: Result<RunSummary, PipelineError>) {
        self.send(PipelineEvent::Finished(result));
    }

    fn send(&self, event: PipelineEvent) {
        // Receiver gone means the view was dropped; nothing left to update
        self.tx.send((self.generation, event)).ok();
    }
}

impl PipelineSink for ChannelSink {
    fn on_row(&self, row: PreviewRow) {
        self.send(PipelineEvent::Row(row));
    }

    fn on_progress(&self, progress: Progress) {
        self.send(PipelineEvent::Progress(progress));
    }

    fn on_item_error(&self, error: ItemError) {
        self.send(PipelineEvent::ItemError(error));
    }
}

/// Every record behind a leaf: same name, same pack (no pack for
/// Standalone). Reads the full record list, not the filtered tree.
pub fn resolve_selection(tree: &CategoryTree, leaf: NodeId, records: &[ModRecord]) -> Vec<ModRecord> {
    let Some(item) = tree.node(leaf).and_then(|n| n.item.as_ref()) else {
        return Vec::new();
    };
    let pack = tree.pack_name_of(leaf);

    records
        .iter()
        .filter(|r| r.name == item.name && r.pack_name() == pack)
        .cloned()
        .collect()
}

pub struct UpdatePipeline<'a, A: ModArchive + ?Sized> {
    archive: &'a A,
    options: PipelineOptions,
}

impl<'a, A: ModArchive + ?Sized> UpdatePipeline<'a, A> {
    pub fn new(archive: &'a A, options: PipelineOptions) -> Self {
        Self { archive, options }
    }

    /// Process `records` in order, publishing one row per record that
    /// decodes. Returns `Cancelled` as soon as `cancel` is observed; the
    /// row in flight at that point is dropped.
    pub fn run<S: PipelineSink + ?Sized>(
        &self,
        records: &[ModRecord],
        identity: Option<&ItemIdentity>,
        cancel: &CancellationToken,
        sink: &S,
    ) -> Result<RunSummary, PipelineError> {
        let total = records.len();
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let mut strategy = if total > self.options.prefetch_threshold {
            Strategy::Prefetched
        } else {
            Strategy::Lazy
        };

        let index = match (strategy, records.first()) {
            (Strategy::Prefetched, Some(first)) => match self.archive.build_index_lookup(&first.data_file) {
                Ok(index) => Some(index),
                Err(e) => {
                    warn!("Index build for {} failed, decoding per record: {}", first.data_file, e);
                    strategy = Strategy::Lazy;
                    None
                }
            },
            _ => None,
        };

        debug!("Updating preview: {} records, {:?}", total, strategy);

        let builder = PreviewRowBuilder::new(self.archive);
        let progress = Mutex::new(Progress::new(total));
        let mut published = 0;
        let mut skipped = 0;

        for record in records {
            if cancel.is_cancelled() {
                debug!("Preview update cancelled after {} rows", published);
                return Err(PipelineError::Cancelled);
            }

            let row = match builder.build(record, identity, index.as_ref()) {
                Ok(row) => row,
                Err(e) => {
                    if cancel.is_cancelled() {
                        debug!("Preview update cancelled after {} rows", published);
                        return Err(PipelineError::Cancelled);
                    }
                    warn!("{}", e);
                    skipped += 1;
                    sink.on_item_error(e);
                    continue;
                }
            };

            if cancel.is_cancelled() {
                debug!("Preview update cancelled after {} rows", published);
                return Err(PipelineError::Cancelled);
            }

            {
                let mut current = progress.lock();
                current.completed += 1;
                sink.on_progress(*current);
            }
            sink.on_row(row);
            published += 1;
        }

        info!("Preview ready: {} rows, {} skipped", published, skipped);

        Ok(RunSummary {
            published,
            skipped,
            total,
            strategy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::mock::MockArchive;
    use crate::catalog::tree::tests::{record, sample_records};
    use crate::classify::MapKind;
    use crate::preview::row::PreviewImage;

    #[derive(Default)]
    struct RecordingSink {
        rows: Mutex<Vec<PreviewRow>>,
        progress: Mutex<Vec<Progress>>,
        errors: Mutex<Vec<String>>,
        cancel_after: Option<(usize, CancellationToken)>,
    }

    impl PipelineSink for RecordingSink {
        fn on_row(&self, row: PreviewRow) {
            let mut rows = self.rows.lock();
            rows.push(row);
            if let Some((after, token)) = &self.cancel_after {
                if rows.len() == *after {
                    token.cancel();
                }
            }
        }

        fn on_progress(&self, progress: Progress) {
            self.progress.lock().push(progress);
        }

        fn on_item_error(&self, error: ItemError) {
            self.errors.lock().push(error.path().to_string());
        }
    }

    fn textures(count: usize) -> Vec<ModRecord> {
        (0..count)
            .map(|i| {
                record(
                    "Cotton Shirt",
                    "Body",
                    &format!("chara/equipment/e0201/texture/v{:02}_c0101e0201_top_d.tex", i),
                    Some("Glam Pack"),
                )
            })
            .collect()
    }

    fn run(archive: &MockArchive, records: &[ModRecord], sink: &RecordingSink, token: &CancellationToken) -> Result<RunSummary, PipelineError> {
        UpdatePipeline::new(archive, PipelineOptions::default()).run(records, None, token, sink)
    }

    #[test]
    fn test_large_batch_prefetches_once() {
        let records = textures(15);
        let archive = MockArchive::new(records.clone());
        let sink = RecordingSink::default();

        let summary = run(&archive, &records, &sink, &CancellationToken::new()).unwrap();
        assert_eq!(summary.strategy, Strategy::Prefetched);
        assert_eq!(summary.published, 15);
        assert_eq!(MockArchive::count(&archive.index_builds), 1);
        assert_eq!(MockArchive::count(&archive.lazy_decodes), 0);
        assert_eq!(MockArchive::count(&archive.indexed_decodes), 15);
    }

    #[test]
    fn test_small_batch_decodes_lazily() {
        let records = textures(PREFETCH_THRESHOLD);
        let archive = MockArchive::new(records.clone());
        let sink = RecordingSink::default();

        let summary = run(&archive, &records, &sink, &CancellationToken::new()).unwrap();
        assert_eq!(summary.strategy, Strategy::Lazy);
        assert_eq!(MockArchive::count(&archive.index_builds), 0);
        assert_eq!(MockArchive::count(&archive.lazy_decodes), PREFETCH_THRESHOLD);
    }

    #[test]
    fn test_threshold_is_tunable() {
        let records = textures(3);
        let archive = MockArchive::new(records.clone());
        let options = PipelineOptions { prefetch_threshold: 2 };
        UpdatePipeline::new(&archive, options)
            .run(&records, None, &CancellationToken::new(), &RecordingSink::default())
            .unwrap();
        assert_eq!(MockArchive::count(&archive.index_builds), 1);
    }

    #[test]
    fn test_cancel_after_third_row() {
        let records = textures(10);
        let archive = MockArchive::new(records.clone());
        let token = CancellationToken::new();
        let sink = RecordingSink {
            cancel_after: Some((3, token.clone())),
            ..Default::default()
        };

        let result = run(&archive, &records, &sink, &token);
        assert!(matches!(result, Err(PipelineError::Cancelled)));
        assert_eq!(sink.rows.lock().len(), 3);
        assert_eq!(sink.progress.lock().last().copied(), Some(Progress { completed: 3, total: 10 }));
    }

    #[test]
    fn test_cancel_stops_failing_records() {
        let records = textures(4);
        let archive = MockArchive::new(records.clone())
            .failing_on(&records[1].full_path)
            .failing_on(&records[2].full_path)
            .failing_on(&records[3].full_path);
        let token = CancellationToken::new();
        let sink = RecordingSink {
            cancel_after: Some((1, token.clone())),
            ..Default::default()
        };

        let result = run(&archive, &records, &sink, &token);
        assert!(matches!(result, Err(PipelineError::Cancelled)));
        assert_eq!(sink.rows.lock().len(), 1);
        assert!(sink.errors.lock().is_empty());
        assert_eq!(MockArchive::count(&archive.lazy_decodes), 1);
    }

    #[test]
    fn test_cancelled_before_start_does_nothing() {
        let records = textures(15);
        let archive = MockArchive::new(records.clone());
        let token = CancellationToken::new();
        token.cancel();

        let sink = RecordingSink::default();
        assert!(matches!(run(&archive, &records, &sink, &token), Err(PipelineError::Cancelled)));
        assert_eq!(MockArchive::count(&archive.index_builds), 0);
        assert!(sink.rows.lock().is_empty());
    }

    #[test]
    fn test_progress_strictly_increasing() {
        let records = textures(7);
        let archive = MockArchive::new(records.clone());
        let sink = RecordingSink::default();
        run(&archive, &records, &sink, &CancellationToken::new()).unwrap();

        let progress = sink.progress.lock();
        assert_eq!(progress.len(), 7);
        for (i, p) in progress.iter().enumerate() {
            assert_eq!(*p, Progress { completed: i + 1, total: 7 });
        }
        assert_eq!(progress.last().unwrap().to_string(), "7 / 7");
        assert_eq!(progress.last().unwrap().percent(), 100);
    }

    #[test]
    fn test_decode_failure_skips_one_row() {
        let records = textures(4);
        let broken = records[1].full_path.clone();
        let archive = MockArchive::new(records.clone()).failing_on(&broken);
        let sink = RecordingSink::default();

        let summary = run(&archive, &records, &sink, &CancellationToken::new()).unwrap();
        assert_eq!(summary.published, 3);
        assert_eq!(summary.skipped, 1);
        assert_eq!(*sink.errors.lock(), vec![broken]);
        assert!(sink.rows.lock().iter().all(|r| r.record.full_path != records[1].full_path));
    }

    #[test]
    fn test_image_kind_by_record_type() {
        let records = vec![
            record("Cotton Shirt", "Body", "chara/equipment/e0201/material/v0001/mt_c0101e0201_top_a.mtrl", None),
            record("Cotton Shirt", "Body", "chara/equipment/e0201/model/c0101e0201_top.mdl", None),
            record("Cotton Shirt", "Body", "chara/equipment/e0201/texture/v01_c0101e0201_top_n.tex", None),
        ];
        let archive = MockArchive::new(records.clone());
        let sink = RecordingSink::default();
        run(&archive, &records, &sink, &CancellationToken::new()).unwrap();

        let rows = sink.rows.lock();
        assert!(matches!(rows[0].image, PreviewImage::ColorSet(_)));
        assert_eq!(rows[0].image.dimensions(), (4, 16));
        assert!(matches!(rows[1].image, PreviewImage::Placeholder(_)));
        assert_eq!(rows[1].map, MapKind::Model);
        assert!(matches!(rows[2].image, PreviewImage::Texture(_)));
        // Only the texture hit the decoder
        assert_eq!(MockArchive::count(&archive.lazy_decodes), 1);
    }

    #[test]
    fn test_resolve_selection_respects_pack() {
        let records = sample_records();
        let tree = CategoryTree::build(&records, &[]).tree;

        let glam = tree.find_path(Some("Glam Pack"), &["Body", "Cotton Shirt"]).unwrap();
        let selected = resolve_selection(&tree, glam, &records);
        assert_eq!(selected.len(), 2);
        assert!(selected.iter().all(|r| r.pack_name() == Some("Glam Pack")));

        let standalone = tree.find_path(None, &["Body", "Cotton Shirt"]).unwrap();
        let selected = resolve_selection(&tree, standalone, &records);
        assert_eq!(selected.len(), 1);
        assert!(selected[0].is_material());

        assert!(resolve_selection(&tree, tree.root(), &records).is_empty());
    }

    #[test]
    fn test_every_record_reachable_from_a_leaf() {
        let records = sample_records();
        let tree = CategoryTree::build(&records, &[]).tree;

        let leaves: Vec<NodeId> = tree.leaves().collect();
        let reachable: usize = leaves
            .iter()
            .map(|&leaf| resolve_selection(&tree, leaf, &records).len())
            .sum();
        assert_eq!(reachable, records.len());
        // Repeated names within a bucket share one leaf
        assert!(leaves.len() < records.len());
    }

    #[test]
    fn test_channel_sink_tags_generation() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let sink = ChannelSink::new(7, tx);
        sink.on_progress(Progress { completed: 1, total: 2 });
        sink.finish(Err(PipelineError::Cancelled));

        let (generation, event) = rx.recv().unwrap();
        assert_eq!(generation, 7);
        assert!(matches!(event, PipelineEvent::Progress(Progress { completed: 1, total: 2 })));
        assert!(matches!(rx.recv().unwrap().1, PipelineEvent::Finished(Err(PipelineError::Cancelled))));
    }
}
