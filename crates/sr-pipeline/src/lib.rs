//! Stage workers that consume the three pipeline topics (§4.3-4.5),
//! each run independently by the supervisor binary (C11).

pub mod ingest_worker;
pub mod metadata_worker;
pub mod ocr_worker;

pub use ingest_worker::run_ingest_worker;
pub use metadata_worker::run_metadata_worker;
pub use ocr_worker::run_ocr_worker;
