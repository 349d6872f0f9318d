use services::{AppServices, StudentServiceError};
use tracker_core::model::{
    AdmitStatus, ExamKind, ExamProgress, InternationalAdmit, PortfolioProject, ProjectStatus,
    StudentDraft,
};
use tracker_core::progress::ProgressTriple;
use tracker_core::slug::compose;
use tracker_core::time::fixed_clock;

async fn sqlite_services(name: &str) -> AppServices {
    AppServices::new_sqlite(
        &format!("sqlite:file:{name}?mode=memory&cache=shared"),
        fixed_clock(),
    )
    .await
    .expect("sqlite services")
}

fn full_draft(name: &str, year: &str) -> StudentDraft {
    StudentDraft::new(name, year)
        .with_exam(ExamProgress::new(ExamKind::Ielts, ProgressTriple::new(5.0, 6.5, 7.5)).unwrap())
        .with_exam(
            ExamProgress::new(ExamKind::SatEnglish, ProgressTriple::new(500.0, 600.0, 700.0))
                .unwrap(),
        )
        .with_exam(
            ExamProgress::new(ExamKind::SatMath, ProgressTriple::new(550.0, 650.0, 750.0))
                .unwrap(),
        )
        .with_project(PortfolioProject::new("Robotics", "", ProjectStatus::Completed).unwrap())
        .with_project(PortfolioProject::new("Essay", "", ProjectStatus::Planned).unwrap())
        .with_admit(InternationalAdmit::new("BSc CS", "NL", AdmitStatus::Pending).unwrap())
}

#[tokio::test]
async fn sqlite_create_collide_and_view_profile() {
    let app = sqlite_services("memdb_flow_profile").await;
    let students = app.students();

    let base = compose("José Núñez", "2024/2025");
    assert_eq!(base, "jos-nez-20242025");

    students
        .create_student(full_draft("José Núñez", "2024/2025"))
        .await
        .unwrap();
    let second = students
        .create_student(full_draft("José  Núñez", "2024/2025"))
        .await
        .unwrap();
    let second = students.get_student(second).await.unwrap().unwrap();
    assert_eq!(second.slug(), format!("{base}-2"));

    let check = students
        .check_slug("José Núñez", "2024/2025", None)
        .await
        .unwrap();
    assert_eq!(check.slug, format!("{base}-3"));
    assert!(!check.is_available);

    let profile = students
        .profile_by_slug(second.slug())
        .await
        .unwrap()
        .expect("profile");
    let total = profile.sat_total.expect("sat total");
    assert!((total.current - 1250.0).abs() < 1e-9);
    assert!((total.progress - 50.0).abs() < 1e-9);
    assert!((profile.project_completion - 50.0).abs() < 1e-9);
    assert_eq!(profile.admits.len(), 1);
}

#[tokio::test]
async fn sqlite_manual_slug_conflict_and_update() {
    let app = sqlite_services("memdb_flow_manual").await;
    let students = app.students();

    let first = students
        .create_student(StudentDraft::new("Ann Lee", "2025").with_slug("ann"))
        .await
        .unwrap();
    let other = students
        .create_student(StudentDraft::new("Bob Ray", "2025"))
        .await
        .unwrap();

    let err = students
        .update_student(other, StudentDraft::new("Bob Ray", "2025").with_slug("ann"))
        .await
        .unwrap_err();
    assert!(matches!(err, StudentServiceError::SlugTaken(ref s) if s == "ann"));

    let moved = students
        .update_student(first, StudentDraft::new("Ann Lee", "2026"))
        .await
        .unwrap();
    assert_eq!(moved.slug(), "ann-lee-2026");

    let listed = students.list_students(10).await.unwrap();
    assert_eq!(listed.len(), 2);
}
