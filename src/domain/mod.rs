pub mod agenda;
pub mod attachment;
pub mod completeness;
pub mod minutes;
pub mod session;
pub mod status;

pub use agenda::*;
pub use attachment::*;
pub use minutes::*;
pub use session::*;
pub use status::*;
