//! Database entities

pub mod challenge;
pub mod enrollment;
pub mod invite_code;
pub mod membership;
pub mod points_balance;
pub mod reward_issuance;
pub mod user;
pub mod webhook_event;
pub mod workspace;

pub use challenge::Entity as Challenge;
pub use enrollment::Entity as Enrollment;
pub use invite_code::Entity as InviteCode;
pub use membership::Entity as Membership;
pub use points_balance::Entity as PointsBalance;
pub use reward_issuance::Entity as RewardIssuance;
pub use user::Entity as User;
pub use webhook_event::Entity as WebhookEvent;
pub use workspace::Entity as Workspace;

pub mod prelude {
    pub use super::challenge::Entity as Challenge;
    pub use super::enrollment::Entity as Enrollment;
    pub use super::invite_code::Entity as InviteCode;
    pub use super::membership::Entity as Membership;
    pub use super::points_balance::Entity as PointsBalance;
    pub use super::reward_issuance::Entity as RewardIssuance;
    pub use super::user::Entity as User;
    pub use super::webhook_event::Entity as WebhookEvent;
    pub use super::workspace::Entity as Workspace;
}
