//! Core domain logic for the QuestHub workspace platform
//!
//! Four components, each a service struct over a shared
//! [`sea_orm::DatabaseConnection`]:
//!
//! - [`authz::Authorizer`] resolves a principal's role per workspace and
//!   gates every workspace-scoped operation
//! - [`invites::InviteEngine`] handles atomic, idempotent invite-code
//!   redemption
//! - [`ledger::PointsLedger`] keeps earned/available points accounting
//! - [`rewards::RewardService`] drives the reward issuance lifecycle and
//!   webhook reconciliation against the external provider
//!
//! Every shared counter (`used_count`, `available_points`, issuance
//! status) is moved only by conditional updates whose filters encode the
//! expected prior state, so concurrent requests cannot lose updates.

pub mod audit;
pub mod authz;
pub mod config;
pub mod error;
pub mod invites;
pub mod ledger;
pub mod rewards;

pub use audit::{AuditEvent, AuditSink, TracingAuditSink};
pub use authz::{Authorizer, Principal, RoleResolution};
pub use config::CoreConfig;
pub use error::CoreError;
pub use invites::{InviteEngine, Redemption};
pub use ledger::PointsLedger;
pub use rewards::{
    CatalogItem, OrderReceipt, ProviderError, ProviderEvent, ProviderEventKind, RewardOrder,
    RewardProvider, RewardService, SweepReport, WebhookOutcome,
};

pub use questhub_db::entities::membership::WorkspaceRole;
pub use questhub_db::entities::reward_issuance::IssuanceStatus;
