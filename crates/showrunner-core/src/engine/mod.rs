pub mod confirm;
pub mod error;
pub mod event;
pub mod intent;
pub mod sequencer;
pub mod session;
pub mod state;
pub mod transfer;

pub use confirm::{likely_background, looks_like_teaser, ConfirmationPhase, ConfirmationState};
pub use error::ImportError;
pub use event::{EngineEvent, EventKind, EventRing};
pub use intent::{has_autoplay_marker, marker_category, IntentKind, NavigationIntent};
pub use sequencer::Engine;
pub use session::{Effect, PageSession, PlayerEvent};
pub use state::{CategoryCount, EngineStatus, PersistedState};
pub use transfer::{export_file_name, parse_import, ListsExport, EXPORT_FORMAT, EXPORT_VERSION};
