pub mod credential_repository;
pub mod credit_transaction_repository;
pub mod indexing_log_repository;
pub mod project_repository;
pub mod url_repository;
pub mod user_repository;

pub use credential_repository::CredentialRepository;
pub use credit_transaction_repository::CreditTransactionRepository;
pub use indexing_log_repository::IndexingLogRepository;
pub use project_repository::ProjectRepository;
pub use url_repository::UrlRepository;
pub use user_repository::UserRepository;
