//! Provisioning services
//!
//! Each service owns one concern of a provisioning pass. Filesystem, process
//! and hardware access sit behind small traits so the pass can be exercised
//! against temporary directories and scripted commands.

pub mod actions;
pub mod fatal;
pub mod hardening;
pub mod interfaces;
pub mod medium;
pub mod provision;
pub mod report;
pub mod settings;
pub mod status;
