pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;

pub use adapters::{
    AgendaRepository, BlobStore, LocalBlobStore, MemoryStore, MinutesExporter, PostgresStore,
    SignedReference,
};
pub use config::AppConfig;
pub use domain::{Agenda, AgendaKind, AgendaStatus, AgendaSubmission, SessionDraft, SessionKey};
pub use error::{QuorumError, Result};
pub use services::{AgendaLifecycle, DocumentGateway, SessionComposer};
