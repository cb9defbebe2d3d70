//! Paginated render pipeline

mod decoder;
#[cfg(feature = "pdf")]
mod engine;
mod request;
mod session;
mod state;
mod types;
mod worker;

pub use decoder::{
    CancelToken, DecodeError, DecodedDocument, DocumentDecoder, Rasterized, RenderError,
};
#[cfg(feature = "pdf")]
pub use engine::MupdfDecoder;
pub use request::{PageOutcome, RequestId, SessionEvent};
pub use session::{DECODE_TIMEOUT, RenderSession};
pub use state::{Command, DocumentPhase, Effect, PagePhase, SessionState};
pub use types::*;
