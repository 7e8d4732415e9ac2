//! # Tenant Context
//!
//! Who is calling. Every engine operation takes a [`TenantContext`] and
//! re-checks outlet ownership against it; nothing trusts an outlet id from
//! the request alone.

use serde::{Deserialize, Serialize};

use kasir_core::ActivityEntry;

/// Role of the acting user within their tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Owner,
    Manager,
    Cashier,
}

impl ActorRole {
    /// Owners and managers may delete transactions and ledger rows.
    pub fn is_privileged(&self) -> bool {
        matches!(self, ActorRole::Owner | ActorRole::Manager)
    }
}

/// The caller of an engine operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub tenant_id: String,
    pub user_id: String,
    pub role: ActorRole,
}

impl TenantContext {
    pub fn new(tenant_id: impl Into<String>, user_id: impl Into<String>, role: ActorRole) -> Self {
        TenantContext {
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
            role,
        }
    }

    pub fn cashier(tenant_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::new(tenant_id, user_id, ActorRole::Cashier)
    }

    /// Blank audit entry attributed to this caller.
    pub fn activity(&self, action: &str, entity_type: &str, entity_id: &str) -> ActivityEntry {
        ActivityEntry {
            tenant_id: self.tenant_id.clone(),
            user_id: self.user_id.clone(),
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            old_value: None,
            new_value: None,
            reason: None,
            outlet_id: None,
        }
    }
}
