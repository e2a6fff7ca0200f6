use super::error::PdfError;
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Directory containing the pdfium shared library, or the library file itself.
pub const PDFIUM_PATH_ENV: &str = "REQSCAN_PDFIUM_PATH";

/// Outcome of the first binding attempt.
enum InitializationState {
    Uninitialized,
    /// `None` means the system library
    Initialized { library: Option<PathBuf> },
    Failed(String),
}

/// Binding is attempted once per process; later calls reuse the resolved library or the
/// recorded failure.
static PDFIUM_STATE: Lazy<Mutex<InitializationState>> = Lazy::new(|| Mutex::new(InitializationState::Uninitialized));

fn library_at(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}

fn bind_to(library: Option<&Path>) -> std::result::Result<Box<dyn PdfiumLibraryBindings>, PdfiumError> {
    match library {
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_system_library(),
    }
}

fn bind_pdfium_impl() -> Result<(Option<PathBuf>, Box<dyn PdfiumLibraryBindings>), String> {
    let library = std::env::var_os(PDFIUM_PATH_ENV)
        .filter(|value| !value.is_empty())
        .map(|value| library_at(Path::new(&value)));

    let bindings = bind_to(library.as_deref()).map_err(|e| match &library {
        Some(path) => format!("Failed to load Pdfium from '{}': {}", path.display(), e),
        None => format!("Failed to load the system Pdfium library: {}", e),
    })?;

    tracing::debug!(
        library = %library.as_deref().map(|p| p.display().to_string()).unwrap_or_else(|| "system".to_string()),
        "Pdfium bound"
    );
    Ok((library, bindings))
}

/// Fresh pdfium bindings, initializing on the first call.
///
/// `map_err` picks the `PdfError` variant for failures; `context` is woven into the message.
pub(crate) fn bind_pdfium(
    map_err: fn(String) -> PdfError,
    context: &'static str,
) -> Result<Box<dyn PdfiumLibraryBindings>, PdfError> {
    let mut state = PDFIUM_STATE
        .lock()
        .map_err(|e| map_err(format!("Failed to acquire lock on Pdfium state ({}): {}", context, e)))?;

    match &*state {
        InitializationState::Uninitialized => match bind_pdfium_impl() {
            Ok((library, bindings)) => {
                *state = InitializationState::Initialized { library };
                Ok(bindings)
            }
            Err(err) => {
                let mapped = map_err(format!("Pdfium initialization failed ({}): {}", context, err));
                *state = InitializationState::Failed(err);
                Err(mapped)
            }
        },
        InitializationState::Failed(err) => Err(map_err(format!(
            "Pdfium initialization previously failed ({}): {}",
            context, err
        ))),
        InitializationState::Initialized { library } => bind_to(library.as_deref())
            .map_err(|e| map_err(format!("Failed to create Pdfium bindings ({}): {}", context, e))),
    }
}
