//! Receipt engine: HTTP client, session persistence, export and effect execution.
mod client;
mod controller;
mod export;
mod filename;
mod persist;
mod store;

pub use client::{
    ClientSettings, ExtractionClient, ReqwestExtractionClient, BASE_URL_ENV, CURRENCIES_PATH,
    DEFAULT_BASE_URL, EXTRACT_PATH, HEALTH_PATH, VALIDATE_PATH,
};
pub use controller::{ControllerSettings, ExtractionController};
pub use export::{
    export_receipt, format_amount, render_json, render_text, ExportError, ExportFormat,
    ExportOptions,
};
pub use filename::{export_filename, store_filename};
pub use persist::{
    clear_persisted, load_image_url, load_result, save_result, IMAGE_URL_KEY, RESULT_KEY,
};
pub use store::{ensure_dir, AtomicFileWriter, FileStore, MemoryStore, SessionStore, StoreError};
