pub mod composer;
pub mod gateway;
pub mod lifecycle;

pub use composer::{SaveReport, SessionComposer};
pub use gateway::{DocumentGateway, ScratchDocument, ScratchStats};
pub use lifecycle::AgendaLifecycle;
