pub mod adapters;
pub mod credentials_pool;
pub mod credit_ledger;
pub mod dispatcher;
pub mod method_queue;
pub mod notifier;
pub mod probes;
pub mod queue_worker;
pub mod reconciliation;
pub mod refund_sweeper;
pub mod sitemap;
pub mod verification_scheduler;

pub use credentials_pool::CredentialsPool;
pub use credit_ledger::CreditLedger;
pub use dispatcher::Dispatcher;
pub use method_queue::{JobQueue, QueueJob, RedisJobQueue};
pub use notifier::Notifier;
pub use queue_worker::QueueWorker;
pub use reconciliation::ReconciliationService;
pub use refund_sweeper::RefundSweeper;
pub use verification_scheduler::VerificationScheduler;
