/// Member profiles
///
/// One profile per user per tenant. The thirteen optional fields are what
/// the basic KYC sub-score counts.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE profiles (
///     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     first_name VARCHAR(100),
///     last_name VARCHAR(100),
///     headline VARCHAR(255),
///     bio TEXT,
///     phone VARCHAR(32),
///     country VARCHAR(100),
///     city VARCHAR(100),
///     timezone VARCHAR(64),
///     avatar_url VARCHAR(512),
///     date_of_birth DATE,
///     hourly_rate DOUBLE PRECISION,
///     linkedin_url VARCHAR(512),
///     website_url VARCHAR(512),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (tenant_id, user_id)
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use super::validation::not_in_future;

/// Number of profile fields counted by the basic KYC sub-score
pub const KYC_FIELD_COUNT: usize = 13;

const PROFILE_COLUMNS: &str = "tenant_id, user_id, first_name, last_name, headline, bio, phone, \
                               country, city, timezone, avatar_url, date_of_birth, hourly_rate, \
                               linkedin_url, website_url, created_at, updated_at";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub headline: Option<String>,
    pub bio: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub timezone: Option<String>,
    pub avatar_url: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub hourly_rate: Option<f64>,
    pub linkedin_url: Option<String>,
    pub website_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Counts the KYC fields that are populated
    ///
    /// Text fields count when non-blank after trimming, `date_of_birth` when
    /// present and `hourly_rate` when strictly positive.
    pub fn populated_fields(&self) -> usize {
        let text = [
            &self.first_name,
            &self.last_name,
            &self.headline,
            &self.bio,
            &self.phone,
            &self.country,
            &self.city,
            &self.timezone,
            &self.avatar_url,
            &self.linkedin_url,
            &self.website_url,
        ];

        let populated_text = text
            .iter()
            .filter(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()))
            .count();

        populated_text
            + usize::from(self.date_of_birth.is_some())
            + usize::from(self.hourly_rate.is_some_and(|rate| rate > 0.0))
    }

    /// Creates an empty profile unless one already exists
    pub async fn ensure<'e, E>(executor: E, tenant_id: Uuid, user_id: Uuid) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO profiles (tenant_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (tenant_id, user_id) DO NOTHING
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn find<'e, E>(
        executor: E,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE tenant_id = $1 AND user_id = $2"
        );

        sqlx::query_as::<_, Profile>(&query)
            .bind(tenant_id)
            .bind(user_id)
            .fetch_optional(executor)
            .await
    }

    /// Applies a partial update
    ///
    /// Absent fields are untouched, explicit nulls clear the column.
    /// Returns None when the profile does not exist.
    pub async fn update<'e, E>(
        executor: E,
        tenant_id: Uuid,
        user_id: Uuid,
        data: UpdateProfile,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE profiles SET updated_at = NOW()");

        push_assignment(&mut qb, "first_name", data.first_name);
        push_assignment(&mut qb, "last_name", data.last_name);
        push_assignment(&mut qb, "headline", data.headline);
        push_assignment(&mut qb, "bio", data.bio);
        push_assignment(&mut qb, "phone", data.phone);
        push_assignment(&mut qb, "country", data.country);
        push_assignment(&mut qb, "city", data.city);
        push_assignment(&mut qb, "timezone", data.timezone);
        push_assignment(&mut qb, "avatar_url", data.avatar_url);
        push_assignment(&mut qb, "date_of_birth", data.date_of_birth);
        push_assignment(&mut qb, "hourly_rate", data.hourly_rate);
        push_assignment(&mut qb, "linkedin_url", data.linkedin_url);
        push_assignment(&mut qb, "website_url", data.website_url);

        qb.push(" WHERE tenant_id = ")
            .push_bind(tenant_id)
            .push(" AND user_id = ")
            .push_bind(user_id)
            .push(" RETURNING ")
            .push(PROFILE_COLUMNS);

        qb.build_query_as::<Profile>().fetch_optional(executor).await
    }
}

fn push_assignment<'a, T>(qb: &mut QueryBuilder<'a, Postgres>, column: &str, value: Option<Option<T>>)
where
    T: 'a + Send + sqlx::Encode<'a, Postgres> + sqlx::Type<Postgres>,
{
    if let Some(value) = value {
        qb.push(", ").push(column).push(" = ").push_bind(value);
    }
}

/// Partial profile update
///
/// Each field is `None` when absent from the request body and
/// `Some(None)` when explicitly set to null.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProfile {
    #[serde(default, deserialize_with = "present")]
    #[validate(length(max = 100, message = "Must be at most 100 characters"))]
    pub first_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    #[validate(length(max = 100, message = "Must be at most 100 characters"))]
    pub last_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    #[validate(length(max = 255, message = "Must be at most 255 characters"))]
    pub headline: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    #[validate(length(max = 5000, message = "Must be at most 5000 characters"))]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    #[validate(length(max = 32, message = "Must be at most 32 characters"))]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    #[validate(length(max = 100, message = "Must be at most 100 characters"))]
    pub country: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    #[validate(length(max = 100, message = "Must be at most 100 characters"))]
    pub city: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    #[validate(length(max = 64, message = "Must be at most 64 characters"))]
    pub timezone: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    #[validate(
        length(max = 512, message = "Must be at most 512 characters"),
        url(message = "Must be an absolute URL")
    )]
    pub avatar_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    #[validate(custom(function = "not_in_future"))]
    pub date_of_birth: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "present")]
    #[validate(range(min = 0.0, message = "Must be a non-negative number"))]
    pub hourly_rate: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    #[validate(
        length(max = 512, message = "Must be at most 512 characters"),
        url(message = "Must be an absolute URL")
    )]
    pub linkedin_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    #[validate(
        length(max = 512, message = "Must be at most 512 characters"),
        url(message = "Must be an absolute URL")
    )]
    pub website_url: Option<Option<String>>,
}

impl UpdateProfile {
    /// True when the body carried no field at all
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.headline.is_none()
            && self.bio.is_none()
            && self.phone.is_none()
            && self.country.is_none()
            && self.city.is_none()
            && self.timezone.is_none()
            && self.avatar_url.is_none()
            && self.date_of_birth.is_none()
            && self.hourly_rate.is_none()
            && self.linkedin_url.is_none()
            && self.website_url.is_none()
    }
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn test_empty_profile_has_no_populated_fields() {
        assert_eq!(Profile::default().populated_fields(), 0);
    }

    #[test]
    fn test_full_profile_counts_all_fields() {
        let profile = Profile {
            first_name: some("Ada"),
            last_name: some("Lovelace"),
            headline: some("Analyst"),
            bio: some("Engines"),
            phone: some("+44 20 0000"),
            country: some("GB"),
            city: some("London"),
            timezone: some("Europe/London"),
            avatar_url: some("https://example.com/a.png"),
            date_of_birth: NaiveDate::from_ymd_opt(1815, 12, 10),
            hourly_rate: Some(120.0),
            linkedin_url: some("https://linkedin.com/in/ada"),
            website_url: some("https://ada.example.com"),
            ..Default::default()
        };

        assert_eq!(profile.populated_fields(), KYC_FIELD_COUNT);
    }

    #[test]
    fn test_blank_and_non_positive_fields_do_not_count() {
        let profile = Profile {
            first_name: some("   "),
            last_name: some(""),
            city: some(" Paris "),
            hourly_rate: Some(0.0),
            ..Default::default()
        };

        assert_eq!(profile.populated_fields(), 1);
    }

    #[test]
    fn test_update_distinguishes_null_from_absent() {
        let update: UpdateProfile = serde_json::from_value(serde_json::json!({
            "first_name": "Ada",
            "bio": null,
        }))
        .unwrap();

        assert_eq!(update.first_name, Some(some("Ada")));
        assert_eq!(update.bio, Some(None));
        assert_eq!(update.last_name, None);
        assert!(!update.is_empty());
    }

    #[test]
    fn test_empty_update() {
        let update: UpdateProfile = serde_json::from_str("{}").unwrap();
        assert!(update.is_empty());
    }
}
