use crate::infra::LogNotifier;
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tutor_pairing::config::AppConfig;
use tutor_pairing::error::AppError;
use tutor_pairing::workflows::pairing::{
    CourseId, Enrollment, EnrollmentStatus, InMemoryPairingStore, InterviewStatus, Pairing,
    PairingService, PairingStore, PairingTier, PaymentStatus, PerformanceMetrics, Reassignment,
    ResponseOutcome, Session, SessionId, SessionStatus, StudentId, Tutor, TutorCourse,
    TutorDecision, TutorId, TutorStatus, UserRole,
};
use tutor_pairing::workflows::performance::{
    PerformanceScore, ScoringEngine, SessionCsvImporter, TierOverrideRequest, TierPolicy,
    TutorPerformanceService,
};

const DEMO_COURSE: &str = "algebra-1";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Stop after the pairing portion of the demo.
    #[arg(long)]
    pub(crate) skip_performance: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Session history CSV export
    #[arg(long)]
    pub(crate) sessions: PathBuf,
    /// Tutor whose sessions should be scored
    #[arg(long)]
    pub(crate) tutor: String,
}

pub(crate) fn run_performance_score(args: ScoreArgs) -> Result<(), AppError> {
    let ScoreArgs { sessions, tutor } = args;
    let config = AppConfig::load()?;
    let tutor_id = TutorId::from(tutor.as_str());

    let history: Vec<Session> = SessionCsvImporter::from_path(&sessions)?
        .into_iter()
        .filter(|session| session.tutor_id == tutor_id)
        .collect();

    let policy = TierPolicy::new(config.scoring.thresholds);
    let score = ScoringEngine::new(config.scoring).score(&tutor_id, &history);

    println!(
        "Performance score for {} ({} sessions in {})",
        tutor_id,
        history.len(),
        sessions.display()
    );
    render_score(&score);
    if score.has_minimum_data {
        let tier = policy.tier_for_score(score.raw_score);
        println!(
            "Suggested {} ({} concurrent students)",
            tier,
            tier.max_concurrent_students()
        );
    } else {
        println!("Suggested tier: not enough scored history to move the current tier");
    }

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let now = Utc::now();
    let store = Arc::new(InMemoryPairingStore::new());
    seed_demo_store(&store, now)?;

    let notifier = Arc::new(LogNotifier);
    let pairing = PairingService::new(store.clone(), notifier.clone(), config.pairing.clone());
    let course = CourseId::from(DEMO_COURSE);

    println!("Tutor pairing demo ({DEMO_COURSE})");
    print_roster(store.as_ref())?;

    println!("\nFirst student requests a tutor");
    let first = pairing.request_pairing(&StudentId::from("stu-mia"), &course, now)?;
    print_offer(&first);

    println!("\n{} declines the offer", first.tutor_id);
    let outcome = pairing.respond(&first.id, &first.tutor_id, TutorDecision::Decline, now)?;
    let reassigned = match outcome {
        ResponseOutcome::Declined(decline) => match decline.reassignment {
            Reassignment::Reassigned { pairing } => {
                println!("  Reassigned automatically");
                print_offer(&pairing);
                Some(pairing)
            }
            Reassignment::Unassigned {
                reason,
                excluded_tutor_ids,
            } => {
                println!(
                    "  Left unassigned: {} (excluded {})",
                    reason,
                    join_ids(&excluded_tutor_ids)
                );
                None
            }
        },
        ResponseOutcome::Accepted(_) => None,
    };

    if let Some(offer) = reassigned {
        println!("\n{} accepts", offer.tutor_id);
        pairing.respond(&offer.id, &offer.tutor_id, TutorDecision::Accept, now)?;
        let active = pairing.activate(&offer.id)?;
        println!("  Pairing {} is {}", active.id, active.status);
    }

    println!("\nSecond student requests a tutor");
    let second = pairing.request_pairing(&StudentId::from("stu-noah"), &course, now)?;
    print_offer(&second);
    let sweep_at = now + config.pairing.response_window()? + Duration::hours(1);
    println!(
        "  No response before {}; running expiry sweep",
        second.expires_at.format("%Y-%m-%d %H:%M")
    );
    let sweep = pairing.expire_stale_pairings(sweep_at)?;
    for expired in &sweep.expired {
        match &expired.reassignment {
            Reassignment::Reassigned { pairing } => {
                println!("  {} expired, moved on", expired.declined.id);
                print_offer(pairing);
            }
            Reassignment::Unassigned { reason, .. } => {
                println!("  {} expired, left unassigned: {}", expired.declined.id, reason);
            }
        }
    }

    println!("\nCapacity after pairing");
    print_roster(store.as_ref())?;

    if args.skip_performance {
        return Ok(());
    }

    println!("\nPerformance recalculation");
    let performance = TutorPerformanceService::new(
        store.clone(),
        notifier,
        config.scoring.clone(),
        config.pairing.max_commit_attempts,
    );
    seed_demo_sessions(&store, now)?;

    let grace = TutorId::from("tut-grace");
    let update = performance.recalculate(&grace, now)?;
    render_score(&update.score);
    println!(
        "  {} -> {} ({:?}, {} students max)",
        update.previous_tier,
        update.decision.tier,
        update.decision.basis,
        update.decision.max_concurrent_students
    );

    println!("\nAdmin tries to drop a busy tier 3 tutor to tier 1");
    let alan = TutorId::from("tut-alan");
    let request = TierOverrideRequest {
        tier: PairingTier::One,
        admin_id: "adm-demo".to_string(),
        reason: "quality review".to_string(),
    };
    match performance.override_tier(&alan, request, now) {
        Ok(tutor) => println!("  Override applied: {}", tutor.pairing_tier),
        Err(err) => println!("  Refused: {err}"),
    }

    Ok(())
}

fn render_score(score: &PerformanceScore) {
    println!(
        "- Score {:.2} | {} completed sessions | {} graded assignments",
        score.score, score.metrics.completed_sessions, score.metrics.graded_assignments
    );
    for component in &score.components {
        println!(
            "  - {}: {:.2} x {:.2} ({} samples) {}",
            component.metric.label(),
            component.value,
            component.weight,
            component.samples,
            component.notes
        );
    }
}

fn print_offer(pairing: &Pairing) {
    println!(
        "  Offer {} -> {} (attempt {}, respond by {})",
        pairing.id,
        pairing.tutor_id,
        pairing.assignment_attempt,
        pairing.expires_at.format("%Y-%m-%d %H:%M")
    );
}

fn print_roster(store: &InMemoryPairingStore) -> Result<(), AppError> {
    let mut tutors = store.tutors()?;
    tutors.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    for tutor in tutors {
        println!(
            "  - {} {} | {}/{} students",
            tutor.id, tutor.pairing_tier, tutor.current_student_count, tutor.max_concurrent_students
        );
    }
    Ok(())
}

fn join_ids(ids: &[TutorId]) -> String {
    ids.iter()
        .map(TutorId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn demo_tutor(
    id: &str,
    name: &str,
    tier: PairingTier,
    current: u32,
    registered: DateTime<Utc>,
) -> Tutor {
    Tutor {
        id: TutorId::from(id),
        email: format!("{id}@tutors.example"),
        name: name.to_string(),
        role: UserRole::Tutor,
        tutor_status: TutorStatus::Active,
        onboarding_completed: true,
        pairing_tier: tier,
        max_concurrent_students: tier.max_concurrent_students(),
        current_student_count: current,
        total_students_paired: current,
        performance_score: 0.0,
        performance_metrics: PerformanceMetrics::default(),
        tier_override: None,
        created_at: registered,
        version: 0,
    }
}

fn seed_demo_store(store: &InMemoryPairingStore, now: DateTime<Utc>) -> Result<(), AppError> {
    let tutors = [
        demo_tutor("tut-ada", "Ada Lovelace", PairingTier::One, 0, now - Duration::days(90)),
        demo_tutor("tut-grace", "Grace Hopper", PairingTier::Two, 1, now - Duration::days(60)),
        demo_tutor("tut-alan", "Alan Turing", PairingTier::Three, 4, now - Duration::days(30)),
    ];
    for tutor in tutors {
        store.seed_tutor_course(TutorCourse {
            tutor_id: tutor.id.clone(),
            course_id: CourseId::from(DEMO_COURSE),
            interview_status: InterviewStatus::Passed,
            payment_status: PaymentStatus::Paid,
        })?;
        store.seed_tutor(tutor)?;
    }

    for student in ["stu-mia", "stu-noah"] {
        store.seed_enrollment(Enrollment {
            student_id: StudentId::from(student),
            course_id: CourseId::from(DEMO_COURSE),
            status: EnrollmentStatus::PendingPairing,
            tutor_id: None,
            current_pairing_id: None,
            progress: 0,
            version: 0,
        })?;
    }
    Ok(())
}

fn seed_demo_sessions(store: &InMemoryPairingStore, now: DateTime<Utc>) -> Result<(), AppError> {
    let tutor_id = TutorId::from("tut-grace");
    let student_id = StudentId::from("stu-mia");
    let pairing_id = store
        .pairings_for_enrollment(&student_id, &CourseId::from(DEMO_COURSE))?
        .into_iter()
        .find(|pairing| pairing.tutor_id == tutor_id)
        .map(|pairing| pairing.id);
    let Some(pairing_id) = pairing_id else {
        return Ok(());
    };

    let grades = [
        (true, 5, Some(92.0), None),
        (true, 4, None, Some(88.0)),
        (true, 5, Some(95.0), None),
        (true, 5, None, Some(90.0)),
    ];
    let weeks = grades.len() as i64;
    for (index, (attended, rating, assignment, exam)) in grades.into_iter().enumerate() {
        let days_ago = (weeks - index as i64) * 7;
        store.seed_session(Session {
            id: SessionId(format!("ses-demo-{index}")),
            pairing_id: pairing_id.clone(),
            tutor_id: tutor_id.clone(),
            student_id: student_id.clone(),
            course_id: CourseId::from(DEMO_COURSE),
            status: SessionStatus::Completed,
            scheduled_at: now - Duration::days(days_ago),
            student_attended: Some(attended),
            student_rating: Some(rating),
            assignment_score: assignment,
            exam_score: exam,
            version: 0,
        })?;
    }
    Ok(())
}
