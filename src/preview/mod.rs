//! Preview rows for the selected item and the interactive view that drives them

pub mod pipeline;
pub mod row;
pub mod view;

pub use pipeline::{
    resolve_selection, CancellationToken, ChannelSink, PipelineError, PipelineEvent,
    PipelineOptions, PipelineSink, Progress, RunSummary, Strategy, UpdatePipeline,
    PREFETCH_THRESHOLD,
};
pub use row::{model_placeholder, ItemError, PreviewImage, PreviewRow, PreviewRowBuilder, RowStatus};
pub use view::{CatalogView, Notification, Severity, ViewOptions};
