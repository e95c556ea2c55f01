use std::{fs, io, path::Path};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static PROM_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder for this process.
///
/// Batch runs have nothing to scrape, so the exposition text is written to a
/// file at the end of the run instead (node-exporter textfile collector).
pub fn init() {
    if PROM_HANDLE.get().is_some() {
        return;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            // Ignore error if the handle was already set; this should only be called once.
            let _ = PROM_HANDLE.set(handle);
        }
        Err(e) => tracing::warn!(error = %e, "failed to install Prometheus metrics recorder"),
    }
}

/// Current exposition text, if a recorder is installed.
pub fn render() -> Option<String> {
    PROM_HANDLE.get().map(PrometheusHandle::render)
}

pub fn write_textfile(path: &Path) -> io::Result<()> {
    let Some(body) = render() else {
        tracing::warn!(path = %path.display(), "metrics recorder not initialized, skipping textfile");
        return Ok(());
    };

    fs::write(path, body)?;
    tracing::info!(path = %path.display(), "metrics textfile written");
    Ok(())
}
