pub mod aggregate;
pub mod error;
pub mod loader;
pub mod locale;
pub mod models;
pub mod render;
pub mod settings;

use std::path::Path;

pub use error::{ReportError, Result};
pub use models::AggregateReport;
pub use settings::Settings;

/// Load, aggregate and render in one go. Returns the aggregate and the page;
/// writing the page is left to the caller.
pub fn build_report(input: &Path, settings: &Settings) -> Result<(AggregateReport, String)> {
    let root = loader::load_document(input)?;
    let records = loader::extract_records(&root);
    let report = aggregate::build_threads(&records, &settings.aggregate_options())?;
    let html = render::render_html(&report.threads, &settings.render_options());
    Ok((report, html))
}
