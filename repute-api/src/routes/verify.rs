/// Public verification flow
///
/// The invite token in the path is the only credential.
///
/// - `GET  /v1/verify/:token`: subject summary and the tenant's active questions
/// - `POST /v1/verify/:token`: submit ratings or decline
///
/// Unknown tokens answer 404. Invites that are no longer pending answer 409;
/// a pending invite past its expiry is marked expired first.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
    jobs,
};
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use repute_shared::{
    auth::invite_token::{hash_invite_token, is_well_formed},
    models::{
        question::Question,
        reputation_job::JobReason,
        user::User,
        verification_invite::{
            find_subject, Answer, InviteStatus, SubjectKind, SubjectSummary, VerificationInvite,
        },
    },
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub const MAX_NPS_RATING: i16 = 10;

#[derive(Debug, Serialize, Deserialize)]
pub struct VerificationPrompt {
    pub invite_id: Uuid,
    pub subject_kind: SubjectKind,
    pub subject: SubjectSummary,
    pub requested_by: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub questions: Vec<PromptQuestion>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptQuestion {
    pub id: Uuid,
    pub prompt: String,
    pub max_rating: i16,
}

impl From<Question> for PromptQuestion {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            prompt: q.prompt,
            max_rating: q.max_rating,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitVerification {
    pub nps_rating: Option<i16>,

    #[serde(default)]
    pub answers: Vec<Answer>,

    #[serde(default)]
    pub decline: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub invite_id: Uuid,
    pub status: InviteStatus,
}

/// Resolves a token to a pending, unexpired invite
async fn load_pending(state: &AppState, token: &str) -> ApiResult<VerificationInvite> {
    let not_found = || ApiError::NotFound("Invite not found".to_string());
    if !is_well_formed(token) {
        return Err(not_found());
    }

    let invite = VerificationInvite::find_by_token_hash(&state.db, &hash_invite_token(token))
        .await?
        .ok_or_else(not_found)?;

    if invite.is_past_expiry(Utc::now()) {
        VerificationInvite::mark_expired(&state.db, invite.id).await?;
        tracing::info!(invite_id = %invite.id, "Verification invite expired");
        return Err(ApiError::Conflict("Invite has expired".to_string()));
    }

    if invite.status.is_terminal() {
        return Err(ApiError::Conflict(format!(
            "Invite is already {}",
            invite.status.as_str()
        )));
    }

    Ok(invite)
}

pub async fn show(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<VerificationPrompt>> {
    let invite = load_pending(&state, &token).await?;

    let subject = find_subject(
        &state.db,
        invite.subject_kind,
        invite.tenant_id,
        invite.user_id,
        invite.subject_id,
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("The record being verified no longer exists".to_string()))?;

    let requested_by = User::find_by_id(&state.db, invite.user_id)
        .await?
        .and_then(|u| u.name);
    let questions = Question::list_active(&state.db, invite.tenant_id).await?;

    Ok(Json(VerificationPrompt {
        invite_id: invite.id,
        subject_kind: invite.subject_kind,
        subject,
        requested_by,
        expires_at: invite.expires_at,
        questions: questions.into_iter().map(PromptQuestion::from).collect(),
    }))
}

pub async fn submit(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<SubmitVerification>,
) -> ApiResult<Json<VerificationOutcome>> {
    let invite = load_pending(&state, &token).await?;

    let (outcome, nps_rating, answers) = if req.decline {
        (InviteStatus::Declined, None, Vec::new())
    } else {
        let questions = Question::list_active(&state.db, invite.tenant_id).await?;
        check_submission(&questions, req.nps_rating, &req.answers)
            .map_err(ApiError::ValidationError)?;
        (InviteStatus::Verified, req.nps_rating, req.answers)
    };

    let mut tx = state.db.begin().await?;

    // Concurrent submissions serialize here; the loser sees no pending row
    VerificationInvite::lock_pending(&mut *tx, invite.id)
        .await?
        .ok_or_else(|| ApiError::Conflict("Invite is no longer pending".to_string()))?;

    let verifier_user_id = User::id_for_email(&mut *tx, &invite.verifier_email).await?;

    VerificationInvite::insert_answers(&mut *tx, invite.id, &answers).await?;
    let completed = VerificationInvite::complete(
        &mut *tx,
        invite.id,
        outcome,
        nps_rating,
        verifier_user_id,
    )
    .await?
    .ok_or_else(|| ApiError::Conflict("Invite is no longer pending".to_string()))?;

    tx.commit().await?;

    tracing::info!(
        tenant_id = %completed.tenant_id,
        user_id = %completed.user_id,
        invite_id = %completed.id,
        status = completed.status.as_str(),
        registered_verifier = verifier_user_id.is_some(),
        "Verification invite completed"
    );
    jobs::enqueue(
        &state.db,
        completed.tenant_id,
        completed.user_id,
        JobReason::InviteCompleted,
    );

    Ok(Json(VerificationOutcome {
        invite_id: completed.id,
        status: completed.status,
    }))
}

/// Every active question answered exactly once and in range
fn check_submission(
    questions: &[Question],
    nps_rating: Option<i16>,
    answers: &[Answer],
) -> Result<(), Vec<ValidationErrorDetail>> {
    let mut details = Vec::new();
    let mut fail = |field: String, message: String| {
        details.push(ValidationErrorDetail { field, message });
    };

    match nps_rating {
        None => fail("nps_rating".to_string(), "Required".to_string()),
        Some(r) if !(0..=MAX_NPS_RATING).contains(&r) => fail(
            "nps_rating".to_string(),
            format!("Must be between 0 and {}", MAX_NPS_RATING),
        ),
        Some(_) => {}
    }

    let max_by_id: HashMap<Uuid, i16> = questions.iter().map(|q| (q.id, q.max_rating)).collect();
    let mut seen: HashMap<Uuid, usize> = HashMap::new();

    for (i, answer) in answers.iter().enumerate() {
        let field = format!("answers[{}]", i);
        match max_by_id.get(&answer.question_id) {
            None => fail(field, "Unknown or inactive question".to_string()),
            Some(&max) => {
                if !(0..=max).contains(&answer.rating) {
                    fail(field.clone(), format!("Rating must be between 0 and {}", max));
                }
                let count = seen.entry(answer.question_id).or_default();
                *count += 1;
                if *count == 2 {
                    fail(field, "Question answered more than once".to_string());
                }
            }
        }
    }

    for question in questions {
        if !seen.contains_key(&question.id) {
            fail(
                "answers".to_string(),
                format!("Missing answer for question {}", question.id),
            );
        }
    }

    if details.is_empty() {
        Ok(())
    } else {
        Err(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(max_rating: i16) -> Question {
        Question {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            prompt: "Communication".to_string(),
            weight: 1.0,
            max_rating,
            position: 0,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn answer(q: &Question, rating: i16) -> Answer {
        Answer {
            question_id: q.id,
            rating,
        }
    }

    #[test]
    fn test_complete_submission_passes() {
        let qs = vec![question(5), question(10)];
        let answers = vec![answer(&qs[0], 5), answer(&qs[1], 0)];
        assert!(check_submission(&qs, Some(9), &answers).is_ok());
    }

    #[test]
    fn test_no_questions_needs_only_nps() {
        assert!(check_submission(&[], Some(0), &[]).is_ok());
        assert!(check_submission(&[], None, &[]).is_err());
    }

    #[test]
    fn test_nps_out_of_range() {
        let details = check_submission(&[], Some(11), &[]).unwrap_err();
        assert_eq!(details[0].field, "nps_rating");
    }

    #[test]
    fn test_missing_duplicate_and_unknown_answers() {
        let qs = vec![question(5), question(5)];
        let stranger = question(5);
        let answers = vec![
            answer(&qs[0], 3),
            answer(&qs[0], 4),
            answer(&stranger, 1),
        ];

        let details = check_submission(&qs, Some(8), &answers).unwrap_err();
        let fields: Vec<&str> = details.iter().map(|d| d.field.as_str()).collect();
        assert_eq!(fields, vec!["answers[1]", "answers[2]", "answers"]);
    }

    #[test]
    fn test_rating_above_question_max() {
        let qs = vec![question(3)];
        let details = check_submission(&qs, Some(7), &[answer(&qs[0], 4)]).unwrap_err();
        assert_eq!(details.len(), 1);
        assert!(details[0].message.contains("between 0 and 3"));
    }

    #[test]
    fn test_submission_body_defaults() {
        let body: SubmitVerification = serde_json::from_str(r#"{"decline": true}"#).unwrap();
        assert!(body.decline);
        assert!(body.answers.is_empty());
        assert!(body.nps_rating.is_none());
    }
}
