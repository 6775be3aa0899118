pub mod credential;
pub mod credit_transaction;
pub mod indexing_log;
pub mod method;
pub mod project;
pub mod url;
pub mod user;

pub use credential::Credential;
pub use credit_transaction::{CreditTransaction, TransactionKind};
pub use indexing_log::{IndexingLog, LogStatus};
pub use method::Method;
pub use project::Project;
pub use url::{IndexedUrl, UrlStatus};
pub use user::User;
