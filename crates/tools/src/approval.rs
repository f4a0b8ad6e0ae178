//! Operator approval for side-effecting tools.
//!
//! Tools that require confirmation ask an [`Approver`] before acting.
//! The terminal prompt lives in the CLI; this crate only defines the seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What the operator is asked to approve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub tool_name: String,
    /// Human-readable detail, e.g. the command line about to run
    pub detail: String,
}

#[async_trait]
pub trait Approver: Send + Sync {
    /// Return `true` to let the tool proceed.
    async fn approve(&self, request: &ApprovalRequest) -> bool;
}

/// Approves everything. For unattended runs and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

#[async_trait]
impl Approver for AutoApprove {
    async fn approve(&self, _request: &ApprovalRequest) -> bool {
        true
    }
}

/// Denies everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAll;

#[async_trait]
impl Approver for DenyAll {
    async fn approve(&self, _request: &ApprovalRequest) -> bool {
        false
    }
}
