//! Interactive catalog state
//!
//! `CatalogView` lives on the interactive thread. Tree rebuilds and preview
//! runs happen on spawned workers which hand results back over crossbeam
//! channels; `pump()` drains them. Every selection bumps a generation
//! counter and results tagged with an older generation are dropped, so a
//! slow run for a previous selection can never leak rows into the current
//! one.

use super::pipeline::{
    resolve_selection, CancellationToken, ChannelSink, PipelineEvent, PipelineOptions, Progress,
    UpdatePipeline,
};
use super::row::PreviewRow;
use crate::archive::{ArchiveError, ModArchive};
use crate::catalog::{
    tokenize_search, CategoryTree, ModList, NodeId, NodeKind, PackSummary, SearchDebouncer,
    TreeBuild, DEFAULT_DEBOUNCE, STANDALONE_NAME,
};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// User-facing message produced by background work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    /// Resource path the message is about, if any
    pub path: Option<String>,
    pub severity: Severity,
}

impl Notification {
    fn new(severity: Severity, title: &str, message: impl Into<String>, path: Option<&str>) -> Self {
        Self {
            title: title.to_string(),
            message: message.into(),
            path: path.map(str::to_string),
            severity,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ViewOptions {
    pub pipeline: PipelineOptions,
    pub search_debounce: Duration,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            pipeline: PipelineOptions::default(),
            search_debounce: DEFAULT_DEBOUNCE,
        }
    }
}

type RebuildOutcome = Result<(Arc<ModList>, TreeBuild), ArchiveError>;

/// Selected node and where to find it again after a rebuild
struct Selection {
    id: NodeId,
    /// Owning pack (None for Standalone) and the names below it; None for the root
    path: Option<(Option<String>, Vec<String>)>,
}

pub struct CatalogView<A: ModArchive + 'static> {
    archive: Arc<A>,
    options: ViewOptions,

    list: Arc<ModList>,
    terms: Vec<String>,
    tree: CategoryTree,
    rows: Vec<PreviewRow>,
    progress: Progress,
    summary: Option<PackSummary>,
    notifications: Vec<Notification>,

    selected: Option<Selection>,
    generation: u64,
    active: Option<CancellationToken>,
    running: bool,

    rebuild_generation: u64,
    rebuild_pending: bool,
    /// The outstanding rebuild also re-lists records from the archive
    relist_pending: bool,

    pipeline_tx: Sender<(u64, PipelineEvent)>,
    pipeline_rx: Receiver<(u64, PipelineEvent)>,
    rebuild_tx: Sender<(u64, RebuildOutcome)>,
    rebuild_rx: Receiver<(u64, RebuildOutcome)>,
    search_rx: Receiver<String>,
    debouncer: SearchDebouncer,
}

impl<A: ModArchive + 'static> CatalogView<A> {
    /// Create an empty view and start loading the record list
    pub fn new(archive: Arc<A>, options: ViewOptions) -> Self {
        let (pipeline_tx, pipeline_rx) = unbounded();
        let (rebuild_tx, rebuild_rx) = unbounded();
        let (search_tx, search_rx) = unbounded::<String>();
        let debouncer = SearchDebouncer::new(options.search_debounce, move |text| {
            search_tx.send(text).ok();
        });

        let mut view = Self {
            archive,
            options,
            list: Arc::new(ModList::default()),
            terms: Vec::new(),
            tree: CategoryTree::empty(),
            rows: Vec::new(),
            progress: Progress::default(),
            summary: None,
            notifications: Vec::new(),
            selected: None,
            generation: 0,
            active: None,
            running: false,
            rebuild_generation: 0,
            rebuild_pending: false,
            relist_pending: false,
            pipeline_tx,
            pipeline_rx,
            rebuild_tx,
            rebuild_rx,
            search_rx,
            debouncer,
        };
        view.rebuild();
        view
    }

    pub fn tree(&self) -> &CategoryTree {
        &self.tree
    }

    pub fn rows(&self) -> &[PreviewRow] {
        &self.rows
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    /// `"current / total"` with the integer percentage
    pub fn progress_text(&self) -> String {
        format!("{} ({}%)", self.progress, self.progress.percent())
    }

    pub fn pack_summary(&self) -> Option<&PackSummary> {
        self.summary.as_ref()
    }

    pub fn records(&self) -> &ModList {
        &self.list
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selected.as_ref().map(|s| s.id)
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// A preview run or tree rebuild is still outstanding
    pub fn is_busy(&self) -> bool {
        self.running || self.rebuild_pending
    }

    /// Re-list records from the archive and rebuild the tree in the background
    pub fn rebuild(&mut self) {
        let archive = Arc::clone(&self.archive);
        let terms = self.terms.clone();
        self.spawn_rebuild(move || {
            let list = Arc::new(archive.list_records()?);
            let build = CategoryTree::build(&list.mods, &terms);
            Ok((list, build))
        });
        self.relist_pending = true;
    }

    /// Rebuild from the already loaded records, e.g. after a search change
    fn refilter(&mut self) {
        let list = Arc::clone(&self.list);
        let terms = self.terms.clone();
        self.spawn_rebuild(move || {
            let build = CategoryTree::build(&list.mods, &terms);
            Ok((list, build))
        });
    }

    fn spawn_rebuild<F>(&mut self, job: F)
    where
        F: FnOnce() -> RebuildOutcome + Send + 'static,
    {
        self.rebuild_generation += 1;
        self.rebuild_pending = true;
        let generation = self.rebuild_generation;
        let tx = self.rebuild_tx.clone();
        std::thread::spawn(move || {
            tx.send((generation, job())).ok();
        });
    }

    /// Feed a search box edit; the tree is rebuilt once typing settles
    pub fn set_search(&self, text: &str) {
        self.debouncer.push(text);
    }

    /// Apply search text immediately
    pub fn apply_search(&mut self, text: &str) {
        let terms = tokenize_search(text);
        if terms == self.terms {
            return;
        }
        debug!("Search terms: {:?}", terms);
        self.terms = terms;
        // A refilter would supersede the pending load with the stale list
        if self.relist_pending {
            self.rebuild();
        } else {
            self.refilter();
        }
    }

    /// Change the selection. Cancels any preview still running for the
    /// previous one without waiting for it.
    pub fn select(&mut self, node: Option<NodeId>) {
        if let Some(token) = self.active.take() {
            token.cancel();
        }
        self.generation += 1;
        self.running = false;
        self.rows.clear();
        self.progress = Progress::default();
        self.summary = None;

        let Some(id) = node else {
            self.selected = None;
            return;
        };
        let Some(kind) = self.tree.kind(id) else {
            self.selected = None;
            return;
        };
        let path = self.tree.pack_path_of(id).map(|(pack, names)| {
            (pack.map(str::to_string), names.into_iter().map(str::to_string).collect())
        });
        self.selected = Some(Selection { id, path });

        match kind {
            NodeKind::Root | NodeKind::Category => {}
            NodeKind::Pack => self.refresh_summary(),
            NodeKind::Leaf => self.start_preview(id),
        }
    }

    fn start_preview(&mut self, leaf: NodeId) {
        let records = resolve_selection(&self.tree, leaf, &self.list.mods);
        let identity = self
            .tree
            .node(leaf)
            .and_then(|n| n.item.as_ref())
            .and_then(|item| item.identity);

        let token = CancellationToken::new();
        self.active = Some(token.clone());
        self.running = true;
        self.progress = Progress::new(records.len());

        let archive = Arc::clone(&self.archive);
        let options = self.options.pipeline;
        let sink = ChannelSink::new(self.generation, self.pipeline_tx.clone());
        std::thread::spawn(move || {
            let result = UpdatePipeline::new(archive.as_ref(), options).run(
                &records,
                identity.as_ref(),
                &token,
                &sink,
            );
            sink.finish(result);
        });
    }

    fn selected_pack_name(&self) -> Option<Option<String>> {
        let id = self.selected.as_ref()?.id;
        if self.tree.kind(id)? != NodeKind::Pack {
            return None;
        }
        Some(self.tree.pack_name_of(id).map(str::to_string))
    }

    fn refresh_summary(&mut self) {
        self.summary = self
            .selected_pack_name()
            .map(|pack| PackSummary::collect(&self.list, pack.as_deref()));
    }

    /// Drain background results into view state. Returns true when anything
    /// visible changed.
    pub fn pump(&mut self) -> bool {
        let mut changed = false;

        let mut search = None;
        while let Ok(text) = self.search_rx.try_recv() {
            search = Some(text);
        }
        if let Some(text) = search {
            self.apply_search(&text);
        }

        while let Ok((generation, outcome)) = self.rebuild_rx.try_recv() {
            if generation != self.rebuild_generation {
                debug!("Dropping stale tree rebuild {}", generation);
                continue;
            }
            self.rebuild_pending = false;
            self.relist_pending = false;
            self.install_rebuild(outcome);
            changed = true;
        }

        while let Ok((generation, event)) = self.pipeline_rx.try_recv() {
            if generation != self.generation {
                continue;
            }
            changed = true;
            match event {
                PipelineEvent::Row(row) => self.rows.push(row),
                PipelineEvent::Progress(progress) => self.progress = progress,
                PipelineEvent::ItemError(e) => {
                    let path = e.path().to_string();
                    self.notifications.push(Notification::new(
                        Severity::Warning,
                        "Preview",
                        e.to_string(),
                        Some(&path),
                    ));
                }
                PipelineEvent::Finished(result) => {
                    self.running = false;
                    self.active = None;
                    if let Ok(summary) = result {
                        debug!("Preview finished: {:?}", summary);
                    }
                }
            }
        }

        changed
    }

    fn install_rebuild(&mut self, outcome: RebuildOutcome) {
        let (list, build) = match outcome {
            Ok(result) => result,
            Err(e) => {
                error!("Failed to load mod list: {}", e);
                self.notifications.push(Notification::new(
                    Severity::Error,
                    "Mod list",
                    e.to_string(),
                    None,
                ));
                return;
            }
        };

        for e in &build.errors {
            self.notifications.push(Notification::new(
                Severity::Warning,
                "Classification",
                e.to_string(),
                Some(&e.path),
            ));
        }

        info!(
            "Catalog loaded: {} records, {} items",
            list.mods.len(),
            build.tree.leaves().count()
        );
        self.list = list;
        self.tree = build.tree;

        // Node ids do not survive a rebuild; find the selection again by name
        let Some(Selection { path, .. }) = self.selected.take() else {
            return;
        };
        let found = match &path {
            None => Some(self.tree.root()),
            Some((pack, names)) => {
                let names: Vec<&str> = names.iter().map(String::as_str).collect();
                self.tree.find_path(pack.as_deref(), &names)
            }
        };
        match found {
            Some(id) => {
                self.selected = Some(Selection { id, path });
                if self.summary.is_some() {
                    self.refresh_summary();
                }
            }
            None => self.select(None),
        }
    }

    /// Block until background work settles or `timeout` passes.
    /// Returns false on timeout.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump();
            if !self.is_busy() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn reload_list(&mut self) {
        match self.archive.list_records() {
            Ok(list) => self.list = Arc::new(list),
            Err(e) => self.notify_error("Mod list", &e, None),
        }
    }

    fn notify_error(&mut self, title: &str, e: &ArchiveError, path: Option<&str>) {
        warn!("{}: {}", title, e);
        self.notifications
            .push(Notification::new(Severity::Error, title, e.to_string(), path));
    }

    /// Flip the enabled state of the given rows through the archive
    pub fn toggle_rows(&mut self, indices: &[usize]) {
        let mut changed = false;
        for &i in indices {
            let Some(row) = self.rows.get(i) else { continue };
            let path = row.record.full_path.clone();
            let enabled = !row.record.enabled;
            match self.archive.set_record_enabled(&path, enabled) {
                Ok(()) => {
                    self.rows[i].set_enabled(enabled);
                    changed = true;
                }
                Err(e) => self.notify_error("Toggle", &e, Some(&path)),
            }
        }
        if changed {
            self.reload_list();
        }
    }

    /// Apply the summary's suggested action to every record of the selected pack
    pub fn toggle_pack(&mut self) {
        let (Some(pack), Some(summary)) = (self.selected_pack_name(), self.summary.as_ref()) else {
            return;
        };
        let enabled = summary.suggested_action().target_state();

        match pack {
            Some(name) => {
                if let Err(e) = self.archive.set_pack_enabled(&name, enabled) {
                    self.notify_error("Toggle pack", &e, None);
                }
            }
            None => {
                let paths: Vec<String> = self
                    .list
                    .mods
                    .iter()
                    .filter(|m| m.mod_pack.is_none() && m.enabled != enabled)
                    .map(|m| m.full_path.clone())
                    .collect();
                for path in paths {
                    if let Err(e) = self.archive.set_record_enabled(&path, enabled) {
                        self.notify_error("Toggle pack", &e, Some(&path));
                    }
                }
            }
        }

        self.reload_list();
        self.refresh_summary();
    }

    /// Delete the given rows' records. The tree is rebuilt once an item has
    /// no records left.
    pub fn delete_rows(&mut self, indices: &[usize]) {
        let mut indices = indices.to_vec();
        indices.sort_unstable();
        indices.dedup();

        let mut deleted = false;
        for &i in indices.iter().rev() {
            let Some(row) = self.rows.get(i) else { continue };
            let path = row.record.full_path.clone();
            match self.archive.delete_record(&path) {
                Ok(()) => {
                    self.rows.remove(i);
                    deleted = true;
                }
                Err(e) => self.notify_error("Delete", &e, Some(&path)),
            }
        }
        if !deleted {
            return;
        }

        self.reload_list();
        let leaf_left = match self.selected.as_ref() {
            Some(selection) => !resolve_selection(&self.tree, selection.id, &self.list.mods).is_empty(),
            None => false,
        };
        if !leaf_left {
            self.rebuild();
        }
    }

    /// Delete the selected pack and every record in it
    pub fn delete_pack(&mut self) {
        let Some(pack) = self.selected_pack_name() else {
            return;
        };

        match &pack {
            Some(name) => {
                if let Err(e) = self.archive.delete_pack(name) {
                    self.notify_error("Delete pack", &e, None);
                    return;
                }
            }
            None => {
                let paths: Vec<String> = self
                    .list
                    .mods
                    .iter()
                    .filter(|m| m.mod_pack.is_none())
                    .map(|m| m.full_path.clone())
                    .collect();
                for path in paths {
                    if let Err(e) = self.archive.delete_record(&path) {
                        self.notify_error("Delete pack", &e, Some(&path));
                    }
                }
            }
        }

        info!(
            "Deleted pack {}",
            pack.as_deref().unwrap_or(STANDALONE_NAME)
        );
        self.select(None);
        self.rebuild();
    }
}

impl<A: ModArchive + 'static> Drop for CatalogView<A> {
    fn drop(&mut self) {
        if let Some(token) = self.active.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::mock::MockArchive;
    use crate::catalog::tree::tests::{record, sample_records};
    use crate::catalog::ToggleAction;
    use crate::preview::row::RowStatus;

    const WAIT: Duration = Duration::from_secs(5);

    fn view_with(archive: MockArchive) -> CatalogView<MockArchive> {
        let options = ViewOptions {
            search_debounce: Duration::from_millis(20),
            ..Default::default()
        };
        let mut view = CatalogView::new(Arc::new(archive), options);
        assert!(view.wait_idle(WAIT));
        view
    }

    fn node(view: &CatalogView<MockArchive>, pack: Option<&str>, names: &[&str]) -> NodeId {
        view.tree().find_path(pack, names).unwrap()
    }

    #[test]
    fn test_initial_load_builds_tree() {
        let view = view_with(MockArchive::new(sample_records()));
        assert_eq!(view.tree().leaves().count(), 5);
        assert_eq!(view.records().mods.len(), 6);
    }

    #[test]
    fn test_list_failure_is_fatal_notification() {
        let archive = MockArchive {
            fail_listing: true,
            ..Default::default()
        };
        let mut view = view_with(archive);
        let notes = view.take_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].severity, Severity::Error);
        assert!(view.tree().is_empty());
        assert!(view.take_notifications().is_empty());
    }

    #[test]
    fn test_selecting_leaf_publishes_rows() {
        let mut view = view_with(MockArchive::new(sample_records()));
        view.select(Some(node(&view, Some("Glam Pack"), &["Body", "Cotton Shirt"])));
        assert!(view.is_busy());
        assert!(view.wait_idle(WAIT));

        assert_eq!(view.rows().len(), 2);
        assert_eq!(view.progress(), Progress { completed: 2, total: 2 });
        assert_eq!(view.progress_text(), "2 / 2 (100%)");
        assert!(view.pack_summary().is_none());
    }

    #[test]
    fn test_pack_selection_shows_summary_only() {
        let mut view = view_with(MockArchive::new(sample_records()));
        view.select(Some(node(&view, Some("Glam Pack"), &[])));
        assert!(!view.is_busy());
        assert!(view.rows().is_empty());

        let summary = view.pack_summary().unwrap();
        assert_eq!(summary.record_count, 3);
        assert_eq!(summary.suggested_action(), ToggleAction::Disable);

        view.select(Some(node(&view, Some("Glam Pack"), &["Body"])));
        assert!(view.pack_summary().is_none());
        view.select(None);
        assert!(view.selected().is_none());
    }

    #[test]
    fn test_stale_generation_is_dropped() {
        let mut view = view_with(MockArchive::new(sample_records()));
        view.select(Some(node(&view, Some("Glam Pack"), &["Body", "Cotton Shirt"])));
        assert!(view.wait_idle(WAIT));
        let stale_row = view.rows()[0].clone();

        view.select(Some(node(&view, Some("Hair Pack"), &["Character", "Hair"])));
        view.pipeline_tx
            .send((view.generation - 1, PipelineEvent::Row(stale_row)))
            .unwrap();
        assert!(view.wait_idle(WAIT));

        assert_eq!(view.rows().len(), 1);
        assert_eq!(view.rows()[0].record.name, "Hair");
    }

    #[test]
    fn test_toggle_rows_updates_archive_and_status() {
        let mut view = view_with(MockArchive::new(sample_records()));
        view.select(Some(node(&view, Some("Glam Pack"), &["Body", "Cotton Shirt"])));
        assert!(view.wait_idle(WAIT));

        view.toggle_rows(&[0]);
        assert_eq!(view.rows()[0].status, RowStatus::Disabled);
        let path = &view.rows()[0].record.full_path;
        let stored = view.records().mods.iter().find(|m| &m.full_path == path).unwrap();
        assert!(!stored.enabled);
    }

    #[test]
    fn test_toggle_pack_follows_suggestion() {
        let mut view = view_with(MockArchive::new(sample_records()));
        view.select(Some(node(&view, Some("Glam Pack"), &[])));
        view.toggle_pack();

        let summary = view.pack_summary().unwrap();
        assert_eq!(summary.enabled, 0);
        assert_eq!(summary.suggested_action(), ToggleAction::Enable);

        view.select(Some(node(&view, None, &[])));
        view.toggle_pack();
        assert_eq!(view.pack_summary().unwrap().disabled, 2);
    }

    #[test]
    fn test_deleting_last_record_rebuilds_tree() {
        let mut view = view_with(MockArchive::new(sample_records()));
        view.select(Some(node(&view, None, &["Actions", "Fire"])));
        assert!(view.wait_idle(WAIT));

        view.delete_rows(&[0]);
        assert!(view.rows().is_empty());
        assert!(view.wait_idle(WAIT));
        assert!(view.tree().find_path(None, &["Actions", "Fire"]).is_none());
        assert!(view.selected().is_none());
    }

    #[test]
    fn test_delete_pack() {
        let mut view = view_with(MockArchive::new(sample_records()));
        view.select(Some(node(&view, Some("Glam Pack"), &[])));
        view.delete_pack();
        assert!(view.wait_idle(WAIT));
        assert!(view.tree().find_path(Some("Glam Pack"), &[]).is_none());
        assert_eq!(view.records().mods.len(), 3);
    }

    #[test]
    fn test_search_rebuilds_and_keeps_selection() {
        let mut view = view_with(MockArchive::new(sample_records()));
        view.select(Some(node(&view, Some("Hair Pack"), &["Character", "Hair"])));
        assert!(view.wait_idle(WAIT));

        view.set_search("hair");
        let deadline = Instant::now() + WAIT;
        while view.tree().leaves().count() != 1 && Instant::now() < deadline {
            view.wait_idle(WAIT);
            std::thread::sleep(Duration::from_millis(10));
        }

        assert_eq!(view.tree().leaves().count(), 1);
        let hair = node(&view, Some("Hair Pack"), &["Character", "Hair"]);
        assert_eq!(view.selected(), Some(hair));
        assert_eq!(view.rows().len(), 1);
    }

    #[test]
    fn test_search_before_first_load_keeps_records() {
        let options = ViewOptions {
            search_debounce: Duration::from_millis(20),
            ..Default::default()
        };
        let mut view = CatalogView::new(Arc::new(MockArchive::new(sample_records())), options);
        view.apply_search("cotton");
        assert!(view.wait_idle(WAIT));

        assert_eq!(view.records().mods.len(), 6);
        assert_eq!(view.tree().leaves().count(), 2);
    }

    #[test]
    fn test_pack_named_like_standalone_keeps_its_selection() {
        let mut records = sample_records();
        records.push(record(
            "Lamp",
            "Housing",
            "bgcommon/hou/indoor/general/0042/texture/fun_b0_m0042_0a_d.tex",
            Some(STANDALONE_NAME),
        ));
        let mut view = view_with(MockArchive::new(records));
        let pack = node(&view, Some(STANDALONE_NAME), &[]);
        view.select(Some(pack));
        assert_eq!(view.pack_summary().unwrap().record_count, 1);

        view.apply_search("lamp");
        assert!(view.wait_idle(WAIT));
        let pack = view.selected().unwrap();
        assert_ne!(pack, view.tree().standalone());
        assert_eq!(view.tree().pack_name_of(pack), Some(STANDALONE_NAME));
        assert_eq!(view.pack_summary().unwrap().author, "author");
    }

    #[test]
    fn test_item_errors_become_notifications() {
        let records = vec![
            record("Boots", "Feet", "chara/equipment/e0105/texture/v01_c0201e0105_sho_d.tex", None),
            record("Boots", "Feet", "chara/equipment/e0105/texture/v01_c0201e0105_sho_n.tex", None),
        ];
        let broken = records[1].full_path.clone();
        let mut view = view_with(MockArchive::new(records).failing_on(&broken));
        view.select(Some(node(&view, None, &["Feet", "Boots"])));
        assert!(view.wait_idle(WAIT));

        assert_eq!(view.rows().len(), 1);
        let notes = view.take_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].path.as_deref(), Some(broken.as_str()));
    }
}
