//! Initialization marker.

use flagstore_storage::Connection;

use crate::error::CoreResult;
use crate::keyspace::Keyspace;

/// Whether a prefix has ever been bulk-loaded.
///
/// The only transition is `Uninitialized -> Initialized`, made by the last
/// command of a successful bulk initialization. Nothing in this crate moves a
/// prefix back; only an external wipe of its keys does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    /// No bulk initialization has completed for this prefix.
    Uninitialized,
    /// At least one bulk initialization has completed.
    Initialized,
}

impl InitState {
    /// Returns true for [`InitState::Initialized`].
    pub fn is_initialized(self) -> bool {
        self == InitState::Initialized
    }
}

/// Reads the marker through an open connection.
pub(crate) fn read_init_state(conn: &mut dyn Connection, keyspace: &Keyspace) -> CoreResult<InitState> {
    if conn.exists(&keyspace.initialized_key())? {
        Ok(InitState::Initialized)
    } else {
        Ok(InitState::Uninitialized)
    }
}
