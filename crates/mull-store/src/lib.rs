pub mod agent;
pub mod error;
pub mod store;

pub use agent::{default_base_dir, sanitize_agent_id};
pub use error::{Result, StoreError};
pub use store::InquiryStore;
