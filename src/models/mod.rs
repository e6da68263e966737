pub mod lenient;
mod session;
mod user;
mod chat;
mod form;
mod ingestion;
mod reference;
mod notice;

pub use session::*;
pub use user::*;
pub use chat::*;
pub use form::*;
pub use ingestion::*;
pub use reference::*;
pub use notice::*;
