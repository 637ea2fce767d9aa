pub mod control_plane;
pub mod feedback_controller;
pub mod process_supervisor;
pub mod secure_log_tail;

pub use control_plane::{monitor_handshake, Ack, ControlError, ControlPlane, MonitorSettings};
pub use feedback_controller::{DirectiveSink, FeedbackController};
pub use process_supervisor::{gatekeeper_handshake, ProcessSupervisor, SupervisorError, SupervisorEvent};
pub use secure_log_tail::{
    complete_records, process_snapshot, split_records, LogCursor, SecureLogTail, TailError, TailEvent, TailSnapshot,
};
