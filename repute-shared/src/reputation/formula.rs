//! Reputation scoring arithmetic.
//!
//! Everything here is pure: the service loads the inputs, these functions
//! turn them into sub-scores. Sub-scores live on 0..=100, the final score
//! on 0..=900.

use super::ReputationBreakdown;
use crate::models::profile::KYC_FIELD_COUNT;
use crate::models::reputation_weights::ReputationWeights;

/// Maximum final score
pub const MAX_SCORE: f64 = 900.0;

/// Share of the final score taken by KYC
pub const KYC_SHARE: f64 = 0.10;

/// Share of the final score taken by NPS
pub const NPS_SHARE: f64 = 0.30;

/// Share of the final score taken by peer rating
pub const PEER_SHARE: f64 = 0.50;

/// Share of the final score taken by revenue
pub const REVENUE_SHARE: f64 = 0.10;

/// Multiplier applied to a blend when the verifier shares no expertise
pub const UNRELATED_VERIFIER_FACTOR: f64 = 0.75;

/// Scale of a single peer-rating blend
pub const PEER_SCALE: f64 = 5.0;

/// Live record counts used by advance KYC
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordCounts {
    pub skills: i64,
    pub projects: i64,
    pub education: i64,
    pub certifications: i64,
    pub employments: i64,
}

/// Invite tallies for one live skill
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkillInviteStats {
    /// Every invite ever created for the skill, whatever its status
    pub sent: i64,
    pub verified: i64,
}

/// One answer joined with its question's weighting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedAnswer {
    pub weight: f64,
    pub rating: i16,
    pub max_rating: i16,
}

/// A verified invite that carries answers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatedInvite {
    pub answers: Vec<WeightedAnswer>,

    /// The verifier email belongs to a registered user
    pub verifier_registered: bool,

    /// The verifier has a live skill whose tag matches one of the rated user's
    pub shares_skill_tag: bool,
}

/// Everything the formulas need about one user
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReputationInputs {
    pub populated_profile_fields: usize,
    pub counts: RecordCounts,
    pub skill_invites: Vec<SkillInviteStats>,
    pub nps_ratings: Vec<i16>,
    pub rated_invites: Vec<RatedInvite>,
    pub total_revenue_cents: i64,
}

/// Profile completeness, scaled by the basic KYC weight
pub fn basic_kyc(populated: usize, weight: f64) -> f64 {
    let populated = populated.min(KYC_FIELD_COUNT) as f64;
    populated / KYC_FIELD_COUNT as f64 * 100.0 * weight
}

fn capped_ratio(count: i64, max: i32) -> f64 {
    if max <= 0 {
        return 0.0;
    }
    (count.max(0) as f64 / f64::from(max)).min(1.0)
}

/// Record depth, the mean of five capped ratios, scaled by the advance KYC weight
pub fn advance_kyc(counts: &RecordCounts, weights: &ReputationWeights) -> f64 {
    let ratios = [
        capped_ratio(counts.skills, weights.max_skills),
        capped_ratio(counts.projects, weights.max_projects),
        capped_ratio(counts.education, weights.max_education),
        capped_ratio(counts.certifications, weights.max_certifications),
        capped_ratio(counts.employments, weights.max_employments),
    ];

    let mean = ratios.iter().sum::<f64>() / ratios.len() as f64;
    mean * 100.0 * weights.advance_kyc_weight
}

/// Mean verification ratio across skills, scaled by the skill rating weight
///
/// A skill nobody was invited to verify contributes 0.
pub fn skill_rating(skills: &[SkillInviteStats], weight: f64) -> f64 {
    if skills.is_empty() {
        return 0.0;
    }

    let total: f64 = skills
        .iter()
        .map(|skill| {
            if skill.sent <= 0 {
                0.0
            } else {
                (skill.verified.max(0) as f64 / skill.sent as f64).min(1.0)
            }
        })
        .sum();

    total / skills.len() as f64 * 100.0 * weight
}

/// Net promoter score in -100..=100 and the number of responses it used
///
/// 0-6 are detractors, 7-8 passives, 9-10 promoters. Ratings outside
/// 0..=10 are ignored.
pub fn nps_raw(ratings: &[i16]) -> (f64, usize) {
    let valid: Vec<i16> = ratings
        .iter()
        .copied()
        .filter(|rating| (0..=10).contains(rating))
        .collect();

    if valid.is_empty() {
        return (0.0, 0);
    }

    let promoters = valid.iter().filter(|&&r| r >= 9).count() as f64;
    let detractors = valid.iter().filter(|&&r| r <= 6).count() as f64;
    let responses = valid.len();

    ((promoters - detractors) / responses as f64 * 100.0, responses)
}

/// Maps a raw NPS onto 0..=100; no responses reads as 0
pub fn nps_normalized(raw: f64, responses: usize) -> f64 {
    if responses == 0 {
        return 0.0;
    }
    ((raw + 100.0) / 2.0).clamp(0.0, 100.0)
}

/// Weighted blend of one invite's answers on 0..=5
///
/// Returns None for an invite without usable answers.
pub fn invite_blend(invite: &RatedInvite) -> Option<f64> {
    let mut weighted = 0.0;
    let mut total_weight = 0.0;

    for answer in &invite.answers {
        if answer.weight <= 0.0 || answer.max_rating <= 0 {
            continue;
        }
        let ratio = (f64::from(answer.rating.max(0)) / f64::from(answer.max_rating)).min(1.0);
        weighted += answer.weight * ratio;
        total_weight += answer.weight;
    }

    if total_weight <= 0.0 {
        return None;
    }

    let blend = weighted / total_weight * PEER_SCALE;
    if invite.verifier_registered && invite.shares_skill_tag {
        Some(blend)
    } else {
        Some(blend * UNRELATED_VERIFIER_FACTOR)
    }
}

/// Mean blend on 0..=5 and the number of invites it used
pub fn peer_rating_raw(invites: &[RatedInvite]) -> (f64, usize) {
    let blends: Vec<f64> = invites.iter().filter_map(invite_blend).collect();
    if blends.is_empty() {
        return (0.0, 0);
    }
    (blends.iter().sum::<f64>() / blends.len() as f64, blends.len())
}

/// Revenue progress toward the tenant target on 0..=100
pub fn revenue_score(total_cents: i64, target_cents: i64) -> f64 {
    if target_cents <= 0 {
        return 0.0;
    }
    (total_cents.max(0) as f64 / target_cents as f64).min(1.0) * 100.0
}

/// Rounds half away from zero to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Combines the four sub-scores into the final 0..=900 score
pub fn final_score(kyc: f64, nps: f64, peer: f64, revenue: f64) -> f64 {
    let blended = KYC_SHARE * kyc + NPS_SHARE * nps + PEER_SHARE * peer + REVENUE_SHARE * revenue;
    round2((MAX_SCORE * blended / 100.0).clamp(0.0, MAX_SCORE))
}

/// Runs every formula over one user's inputs
pub fn compute_breakdown(inputs: &ReputationInputs, weights: &ReputationWeights) -> ReputationBreakdown {
    let basic = basic_kyc(inputs.populated_profile_fields, weights.basic_kyc_weight);
    let advance = advance_kyc(&inputs.counts, weights);
    let skills = skill_rating(&inputs.skill_invites, weights.skill_rating_weight);
    let kyc = (basic + advance + skills).clamp(0.0, 100.0);

    let (nps_raw, nps_responses) = nps_raw(&inputs.nps_ratings);
    let nps = nps_normalized(nps_raw, nps_responses);

    let (peer_raw, rated_invites) = peer_rating_raw(&inputs.rated_invites);
    let peer = peer_raw / PEER_SCALE * 100.0;

    let revenue = revenue_score(inputs.total_revenue_cents, weights.revenue_target_cents);

    ReputationBreakdown {
        basic_kyc: basic,
        advance_kyc: advance,
        skill_rating: skills,
        kyc,
        nps_raw,
        nps,
        nps_responses,
        peer_rating_raw: peer_raw,
        peer_rating: peer,
        rated_invites,
        revenue,
        total_revenue_cents: inputs.total_revenue_cents,
        final_score: final_score(kyc, nps, peer, revenue),
    }
}
