pub mod chunker;
pub mod duplicates;
pub mod inventory;
pub mod loader;
pub mod pipeline;
pub mod seed;

pub use chunker::Chunker;
pub use duplicates::{
    confirm_by_content, execute_cleanup, find_duplicates, plan_cleanup, CleanupLog, CleanupOptions, CleanupPlan,
    DuplicateGroup, DuplicateReport,
};
pub use inventory::{
    format_size, scan_directory, write_csv, write_csv_file, FileRecord, InventorySummary, ScanOptions,
};
pub use loader::{is_supported, load_text, SUPPORTED_EXTENSIONS};
pub use pipeline::{document_id, BatchOutcome, IngestOptions, IngestPipeline, IngestReport};
pub use seed::sample_project;
