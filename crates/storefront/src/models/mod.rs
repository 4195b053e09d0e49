//! Domain models shared by the session store, the pipeline and search.

pub mod product;
pub mod session;
pub mod user;

pub use product::ProductSummary;
pub use session::{Session, SessionStatus};
pub use user::{Address, AddressUpdate, ProfileUpdate, UserProfile};
