//! BioGraph orchestrator - the asynchronous job subsystem
//!
//! Every network-biology algorithm the API fronts is wrapped in the same
//! pattern: a client request is normalized into a canonical, order-independent
//! form, deduplicated against previously submitted equivalent jobs under a
//! distributed lock, queued for background execution, and driven through the
//! `submitted -> running -> completed|failed` state machine by a runner that
//! invokes the external algorithm executable. Clients poll for status by UID.

pub mod application;
pub mod domain;
pub mod families;
pub mod infrastructure;
pub mod presentation;
