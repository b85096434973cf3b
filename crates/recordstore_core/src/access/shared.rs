//! Process-wide shared facade, configured exactly once.
//!
//! # Responsibility
//! - Hold one [`RecordAccess`] for hosts that want a composition-root
//!   singleton instead of threading the facade through call sites.
//!
//! # Invariants
//! - `configure` succeeds at most once per process.
//! - The shared instance lives until process exit; `close` it for
//!   deterministic release if needed.

use super::record_access::RecordAccess;
use crate::schema::{Schema, StoreConfig};
use crate::store::StoreInitError;
use log::info;
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};

static SHARED: OnceCell<RecordAccess> = OnceCell::new();

/// Lifecycle errors for the shared facade.
#[derive(Debug)]
pub enum SharedAccessError {
    /// An operation was requested before `configure`.
    NotConfigured,
    /// `configure` was called a second time.
    AlreadyConfigured,
    /// `configure` failed to open the store.
    Init(StoreInitError),
}

impl Display for SharedAccessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "shared record access is not configured"),
            Self::AlreadyConfigured => {
                write!(f, "shared record access is already configured")
            }
            Self::Init(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SharedAccessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Init(err) => Some(err),
            _ => None,
        }
    }
}

/// Installs the process-wide facade from `config`. Fails with
/// [`SharedAccessError::AlreadyConfigured`] on any second call,
/// including one racing the first.
pub fn configure(config: &StoreConfig) -> Result<(), SharedAccessError> {
    if SHARED.get().is_some() {
        return Err(SharedAccessError::AlreadyConfigured);
    }
    let access = RecordAccess::open(config).map_err(SharedAccessError::Init)?;
    install(access)
}

/// Installs the process-wide facade over an in-memory store.
pub fn configure_in_memory(schema: Schema) -> Result<(), SharedAccessError> {
    if SHARED.get().is_some() {
        return Err(SharedAccessError::AlreadyConfigured);
    }
    let access = RecordAccess::open_in_memory(schema).map_err(SharedAccessError::Init)?;
    install(access)
}

fn install(access: RecordAccess) -> Result<(), SharedAccessError> {
    SHARED
        .set(access)
        .map_err(|_| SharedAccessError::AlreadyConfigured)?;
    info!("event=shared_configure module=access status=ok");
    Ok(())
}

/// Returns the shared facade, or
/// [`SharedAccessError::NotConfigured`] before `configure`.
pub fn get() -> Result<&'static RecordAccess, SharedAccessError> {
    SHARED.get().ok_or(SharedAccessError::NotConfigured)
}
