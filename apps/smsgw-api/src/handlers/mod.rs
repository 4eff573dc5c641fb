//! HTTP handlers 汇总。

mod auth;
mod com_allocations;
mod devices;
mod hangups;
mod message_read;
mod metrics;
mod notes;
mod sms_messages;
mod users;

pub use auth::{health, login, refresh_token};
pub use com_allocations::{
    create_allocation, delete_allocation, get_allocation, list_allocations, update_allocation,
};
pub use devices::{
    agent_hub, client_hub, connected_devices, get_snapshot, scan_com_ports, send_sms,
    start_sms_receiver, stop_sms_receiver, upsert_snapshot,
};
pub use hangups::{
    hard_delete_hangup, list_hangups, list_hangups_admin, soft_delete_hangup,
};
pub use message_read::{mark_all_read, mark_read, unread_counts};
pub use metrics::get_metrics;
pub use notes::{create_note, delete_note, get_note, list_notes, update_note};
pub use sms_messages::{
    hard_delete_sms, list_sms_messages, list_sms_messages_admin, soft_delete_sms,
};
pub use users::{create_user, delete_user, get_user, list_users, update_user};
