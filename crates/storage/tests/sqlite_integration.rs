use chrono::Duration;
use storage::repository::{NewStudentRecord, StorageError, StudentRepository};
use storage::sqlite::SqliteRepository;
use tracker_core::model::{
    AdmitStatus, ExamKind, ExamProgress, InternationalAdmit, PortfolioProject, ProjectStatus,
    Student, StudentDraft, StudentId,
};
use tracker_core::progress::ProgressTriple;
use tracker_core::time::fixed_now;

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn record(name: &str, year: &str, slug: &str) -> NewStudentRecord {
    let draft = StudentDraft::new(name, year)
        .with_exam(ExamProgress::new(ExamKind::Ielts, ProgressTriple::new(5.0, 6.5, 7.5)).unwrap())
        .with_exam(
            ExamProgress::new(ExamKind::SatMath, ProgressTriple::new(550.0, 640.0, 750.0))
                .unwrap(),
        )
        .with_project(PortfolioProject::new("Robotics", "FRC team", ProjectStatus::InProgress).unwrap())
        .with_project(PortfolioProject::new("Essay", "", ProjectStatus::Completed).unwrap())
        .with_admit(InternationalAdmit::new("BSc Physics", "UK", AdmitStatus::Offered).unwrap());
    let student = Student::from_draft(StudentId::new(1), draft, slug, fixed_now()).unwrap();
    NewStudentRecord::from_student(&student)
}

#[tokio::test]
async fn sqlite_roundtrip_persists_progress_and_milestones() {
    let repo = connect("memdb_students_roundtrip").await;

    let id = repo
        .insert_student(record("John Doe", "2024-2025", "john-doe-2024-2025"))
        .await
        .expect("insert");

    let fetched = repo.get_student(id).await.unwrap().expect("student");
    assert_eq!(fetched.full_name(), "John Doe");
    assert_eq!(fetched.slug(), "john-doe-2024-2025");
    assert_eq!(fetched.created_at(), fixed_now());

    let ielts = fetched.exam(ExamKind::Ielts).expect("ielts");
    assert_eq!(ielts.triple(), ProgressTriple::new(5.0, 6.5, 7.5));
    assert!((ielts.result().progress() - 60.0).abs() < 1e-9);
    assert!(fetched.exam(ExamKind::SatEnglish).is_none());

    let titles: Vec<&str> = fetched.projects().iter().map(PortfolioProject::title).collect();
    assert_eq!(titles, vec!["Robotics", "Essay"]);
    assert_eq!(fetched.admits()[0].status(), AdmitStatus::Offered);

    let by_slug = repo.find_by_slug("john-doe-2024-2025").await.unwrap();
    assert_eq!(by_slug.map(|s| s.id()), Some(id));
}

#[tokio::test]
async fn sqlite_unique_slug_maps_to_conflict() {
    let repo = connect("memdb_students_conflict").await;

    repo.insert_student(record("John Doe", "2024", "john-doe-2024"))
        .await
        .unwrap();
    let err = repo
        .insert_student(record("John Doe", "2024", "john-doe-2024"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
    assert_eq!(repo.list_slugs(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn sqlite_update_replaces_children_and_checks_slug() {
    let repo = connect("memdb_students_update").await;

    let john = repo
        .insert_student(record("John Doe", "2024", "john-doe-2024"))
        .await
        .unwrap();
    repo.insert_student(record("Jane Roe", "2024", "jane-roe-2024"))
        .await
        .unwrap();

    let stored = repo.get_student(john).await.unwrap().unwrap();
    let mut draft = stored.to_draft();
    draft.sat_math = None;
    draft.projects.truncate(1);
    draft.admits.clear();
    let later = fixed_now() + Duration::days(1);
    let updated = stored.apply_draft(draft, "john-doe-2024", later).unwrap();
    repo.update_student(&updated).await.unwrap();

    let refreshed = repo.get_student(john).await.unwrap().unwrap();
    assert!(refreshed.exam(ExamKind::SatMath).is_none());
    assert_eq!(refreshed.projects().len(), 1);
    assert!(refreshed.admits().is_empty());
    assert_eq!(refreshed.updated_at(), later);
    assert_eq!(refreshed.created_at(), fixed_now());

    let clash = stored
        .apply_draft(stored.to_draft(), "jane-roe-2024", later)
        .unwrap();
    assert!(matches!(
        repo.update_student(&clash).await.unwrap_err(),
        StorageError::Conflict
    ));
}

#[tokio::test]
async fn sqlite_list_slugs_and_delete() {
    let repo = connect("memdb_students_slugs").await;

    let a = repo.insert_student(record("A", "2024", "a-2024")).await.unwrap();
    repo.insert_student(record("B", "2024", "b-2024")).await.unwrap();

    let mut slugs = repo.list_slugs(None).await.unwrap();
    slugs.sort();
    assert_eq!(slugs, vec!["a-2024".to_string(), "b-2024".to_string()]);
    assert_eq!(
        repo.list_slugs(Some(a)).await.unwrap(),
        vec!["b-2024".to_string()]
    );

    assert_eq!(repo.list_students(10).await.unwrap().len(), 2);

    repo.delete_student(a).await.unwrap();
    assert!(repo.get_student(a).await.unwrap().is_none());
    assert!(matches!(
        repo.delete_student(a).await.unwrap_err(),
        StorageError::NotFound
    ));
    assert_eq!(repo.list_students(10).await.unwrap().len(), 1);
}
