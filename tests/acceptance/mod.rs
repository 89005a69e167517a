//! Workspace-level acceptance scenarios.

mod common;
mod document_test;
mod motion_test;
mod session_test;
