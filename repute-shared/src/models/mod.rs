/// Database models for Repute
///
/// Each module owns one table (or a small family of tables) and exposes
/// async CRUD functions generic over [`sqlx::PgExecutor`], so callers can
/// pass either the pool or an open transaction.
///
/// # Models
///
/// - `tenant`, `user`, `membership`: tenancy and RBAC
/// - `profile`: the thirteen KYC profile fields
/// - `skill`, `education`, `certification`, `employment`, `client_project`:
///   soft-deletable professional records
/// - `question`, `verification_invite`: peer verification
/// - `reputation_weights`, `reputation_score`, `reputation_job`: scoring
/// - `validation`: custom rules for the `Validate` request bodies
///
/// # Example
///
/// ```no_run
/// use repute_shared::models::skill::{Skill, SkillInput};
/// use repute_shared::db::pool::{create_pool, DatabaseConfig};
/// # use uuid::Uuid;
///
/// # async fn example(tenant_id: Uuid, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let skill = Skill::create(&pool, tenant_id, user_id, SkillInput {
///     name: "Rust Async".to_string(),
///     years_of_experience: Some(4),
/// })
/// .await?;
/// assert_eq!(skill.tag, "rust-async");
/// # Ok(())
/// # }
/// ```

use chrono::NaiveDate;

pub mod certification;
pub mod client_project;
pub mod education;
pub mod employment;
pub mod membership;
pub mod profile;
pub mod question;
pub mod reputation_job;
pub mod reputation_score;
pub mod reputation_weights;
pub mod skill;
pub mod tenant;
pub mod user;
pub mod validation;
pub mod verification_invite;

/// True unless both dates are set and `end` precedes `start`
pub fn is_valid_date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    match (start, end) {
        (Some(start), Some(end)) => end >= start,
        _ => true,
    }
}
