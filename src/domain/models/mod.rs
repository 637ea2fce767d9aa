pub mod alert;
pub mod config;
pub mod gatekeeper;
pub mod throttle;
pub mod worker;

pub use alert::{
    AlertLevel, AlertNotification, AlertRecord, Classification, ClassifiedLine, DecryptedLine,
};
pub use config::{
    CipherKind, Config, DatabaseConfig, DeepGuardConfig, FeedbackConfig, GatekeeperConfig,
    LoggingConfig, TailConfig,
};
pub use gatekeeper::{DecisionStatus, GatekeeperDecision, GatekeeperLogRecord};
pub use throttle::ThrottleDirective;
pub use worker::{StartupSequence, StartupStep, WorkerId, WorkerSpec, WorkerState};
