use std::sync::{Arc, Mutex};

use appliance_calendar::model::Role;
use appliance_calendar::service::merge_member_ids;
use appliance_calendar::{
    Appliance, ApplianceId, BookingService, BookingStatus, CalendarError, CalendarEvent,
    EventId, EventRecord, MemoryEventSource, NewBooking, Notice, Notifier, Settings, Target,
    User, UserId,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

#[derive(Default)]
struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    fn take(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock().unwrap())
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 10, hour, minute, 0).unwrap()
}

fn ivan() -> User {
    User::new("ivan", "Ivan", Role::User)
}

fn petr() -> User {
    User::new("petr", "Petr", Role::User)
}

fn olga() -> User {
    User::new("olga", "Olga", Role::User)
}

fn admin() -> User {
    User::new("root", "Admin", Role::Admin)
}

fn scope() -> Appliance {
    let mut scope = Appliance::new("scope", "Oscilloscope", UserId::new("olga"));
    scope.superuser_ids = vec![UserId::new("sveta")];
    scope.user_ids = vec![UserId::new("ivan"), UserId::new("petr")];
    scope
}

fn stored(
    id: &str,
    user: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    status: BookingStatus,
) -> EventRecord {
    EventRecord {
        id: EventId::new(id),
        user_id: UserId::new(user),
        appliance_id: ApplianceId::new("scope"),
        time_start: start,
        time_end: end,
        date: start.date_naive(),
        status,
        commentary: None,
        manager_commentary: None,
        managed_by_id: None,
        managed_time: None,
    }
}

fn resolved(record: &EventRecord, author: User) -> CalendarEvent {
    CalendarEvent {
        id: record.id.clone(),
        appliance: scope(),
        user: author,
        time_start: record.time_start,
        time_end: record.time_end,
        status: record.status,
        commentary: record.commentary.clone(),
        manager_commentary: None,
        managed_by: None,
        managed_time: None,
    }
}

struct Fixture {
    source: Arc<MemoryEventSource>,
    notifier: Arc<RecordingNotifier>,
    service: BookingService,
}

fn fixture(records: Vec<EventRecord>) -> Fixture {
    let source = Arc::new(MemoryEventSource::with_records(records));
    let notifier = Arc::new(RecordingNotifier::default());
    let service =
        BookingService::new(source.clone(), notifier.clone(), &Settings::default()).unwrap();
    Fixture {
        source,
        notifier,
        service,
    }
}

impl Fixture {
    fn record(&self, id: &EventId) -> EventRecord {
        self.source
            .records()
            .into_iter()
            .find(|r| r.id == *id)
            .unwrap()
    }
}

fn booking(start: DateTime<Utc>, end: DateTime<Utc>) -> NewBooking {
    NewBooking {
        appliance: scope(),
        time_start: start,
        time_end: end,
        commentary: Some("spectrum check".to_string()),
    }
}

// --- create ---

#[tokio::test]
async fn create_stores_pending_booking() {
    let fx = fixture(vec![]);

    let id = fx.service.create_booking(&ivan(), booking(at(9, 0), at(10, 0))).await.unwrap();

    let record = fx.record(&id);
    assert_eq!(record.status, BookingStatus::Pending);
    assert_eq!(record.user_id, UserId::new("ivan"));
    assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 6, 10).unwrap());
    assert_eq!(record.commentary.as_deref(), Some("spectrum check"));
    assert_eq!(fx.notifier.take(), vec![Notice::BookingCreated(id)]);
}

#[tokio::test]
async fn create_rejects_overlap_with_approved_booking() {
    let fx = fixture(vec![stored("taken", "petr", at(9, 30), at(11, 0), BookingStatus::Approved)]);

    let result = fx.service.create_booking(&ivan(), booking(at(9, 0), at(10, 0))).await;

    assert!(matches!(
        result,
        Err(CalendarError::TimeConflict { ref conflicting }) if conflicting.as_str() == "taken"
    ));
    assert_eq!(fx.source.records().len(), 1);
    assert_eq!(
        fx.notifier.take(),
        vec![Notice::TimeNotFree { conflicting: EventId::new("taken") }]
    );
}

#[tokio::test]
async fn create_ignores_pending_and_adjacent_bookings() {
    let fx = fixture(vec![
        stored("pending", "petr", at(9, 0), at(10, 0), BookingStatus::Pending),
        stored("before", "petr", at(8, 0), at(9, 0), BookingStatus::Approved),
    ]);

    let result = fx.service.create_booking(&ivan(), booking(at(9, 0), at(10, 0))).await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn create_rejects_empty_range() {
    let fx = fixture(vec![]);

    let result = fx.service.create_booking(&ivan(), booking(at(10, 0), at(10, 0))).await;

    assert!(matches!(result, Err(CalendarError::InvalidRange { .. })));
    assert_eq!(fx.notifier.take(), vec![Notice::BookingCreateFailed]);
    assert!(fx.source.records().is_empty());
}

// --- status ---

#[tokio::test]
async fn owner_approves_with_commentary() {
    let record = stored("b1", "ivan", at(9, 0), at(10, 0), BookingStatus::Pending);
    let fx = fixture(vec![record.clone()]);
    let event = resolved(&record, ivan());

    fx.service.approve(&olga(), &event, Some("ok".to_string())).await.unwrap();

    let updated = fx.record(&event.id);
    assert_eq!(updated.status, BookingStatus::Approved);
    assert_eq!(updated.manager_commentary.as_deref(), Some("ok"));
    assert_eq!(updated.managed_by_id, Some(UserId::new("olga")));
    assert!(updated.managed_time.is_some());
    assert_eq!(
        fx.notifier.take(),
        vec![Notice::StatusChanged { event: event.id.clone(), status: BookingStatus::Approved }]
    );
}

#[tokio::test]
async fn superuser_and_admin_may_decline() {
    let record = stored("b1", "ivan", at(9, 0), at(10, 0), BookingStatus::Pending);
    let fx = fixture(vec![record.clone()]);
    let event = resolved(&record, ivan());
    let sveta = User::new("sveta", "Sveta", Role::User);

    fx.service.decline(&sveta, &event, None).await.unwrap();
    fx.service.decline(&admin(), &event, None).await.unwrap();

    assert_eq!(fx.record(&event.id).managed_by_id, Some(UserId::new("root")));
}

#[tokio::test]
async fn regular_user_cannot_change_status() {
    let record = stored("b1", "ivan", at(9, 0), at(10, 0), BookingStatus::Pending);
    let fx = fixture(vec![record.clone()]);
    let event = resolved(&record, ivan());

    let result = fx.service.approve(&ivan(), &event, None).await;

    assert!(matches!(result, Err(CalendarError::NotPermitted { .. })));
    assert_eq!(fx.record(&event.id).status, BookingStatus::Pending);
    assert_eq!(fx.notifier.take(), vec![Notice::NotPermitted(Target::Booking(event.id))]);
}

#[tokio::test]
async fn approving_into_an_approved_slot_conflicts() {
    let taken = stored("taken", "petr", at(9, 0), at(10, 0), BookingStatus::Approved);
    let pending = stored("b1", "ivan", at(9, 30), at(10, 30), BookingStatus::Pending);
    let fx = fixture(vec![taken, pending.clone()]);
    let event = resolved(&pending, ivan());

    let result = fx.service.approve(&olga(), &event, None).await;

    assert!(matches!(result, Err(CalendarError::TimeConflict { .. })));
    assert_eq!(fx.record(&event.id).status, BookingStatus::Pending);
}

#[tokio::test]
async fn author_withdraws_own_booking() {
    let record = stored("b1", "ivan", at(9, 0), at(10, 0), BookingStatus::Approved);
    let fx = fixture(vec![record.clone()]);
    let event = resolved(&record, ivan());

    assert!(fx.service.withdraw(&petr(), &event).await.is_err());
    fx.service.withdraw(&ivan(), &event).await.unwrap();

    assert_eq!(fx.record(&event.id).status, BookingStatus::Declined);
}

// --- commentary ---

#[tokio::test]
async fn commentary_edits_follow_roles() {
    let record = stored("b1", "ivan", at(9, 0), at(10, 0), BookingStatus::Pending);
    let fx = fixture(vec![record.clone()]);
    let event = resolved(&record, ivan());

    fx.service.update_commentary(&ivan(), &event, "new".into()).await.unwrap();
    assert!(fx.service.update_commentary(&olga(), &event, "nope".into()).await.is_err());
    fx.service.update_manager_commentary(&olga(), &event, "seen".into()).await.unwrap();
    assert!(fx.service.update_manager_commentary(&ivan(), &event, "nope".into()).await.is_err());

    let updated = fx.record(&event.id);
    assert_eq!(updated.commentary.as_deref(), Some("new"));
    assert_eq!(updated.manager_commentary.as_deref(), Some("seen"));
    assert_eq!(
        fx.notifier.take(),
        vec![
            Notice::CommentaryUpdated(event.id.clone()),
            Notice::NotPermitted(Target::Booking(event.id.clone())),
            Notice::CommentaryUpdated(event.id.clone()),
            Notice::NotPermitted(Target::Booking(event.id.clone())),
        ]
    );
}

// --- time ---

#[tokio::test]
async fn moving_a_booking_excludes_itself_from_the_check() {
    let record = stored("b1", "ivan", at(9, 0), at(10, 0), BookingStatus::Approved);
    let fx = fixture(vec![record.clone()]);
    let event = resolved(&record, ivan());

    fx.service.update_time(&ivan(), &event, at(9, 30), at(10, 30)).await.unwrap();

    let updated = fx.record(&event.id);
    assert_eq!((updated.time_start, updated.time_end), (at(9, 30), at(10, 30)));
    assert_eq!(fx.notifier.take(), vec![Notice::TimeUpdated(event.id)]);
}

#[tokio::test]
async fn moving_into_another_approved_booking_conflicts() {
    let mine = stored("b1", "ivan", at(9, 0), at(10, 0), BookingStatus::Pending);
    let other = stored("b2", "petr", at(11, 0), at(12, 0), BookingStatus::Approved);
    let fx = fixture(vec![mine.clone(), other]);
    let event = resolved(&mine, ivan());

    let result = fx.service.set_time_end(&ivan(), &event, at(11, 30)).await;

    assert!(matches!(result, Err(CalendarError::TimeConflict { .. })));
    assert_eq!(fx.record(&event.id).time_end, at(10, 0));
    assert_eq!(fx.notifier.take(), vec![Notice::TimeNotFree { conflicting: EventId::new("b2") }]);
}

#[tokio::test]
async fn moving_requires_author_or_manager() {
    let record = stored("b1", "ivan", at(9, 0), at(10, 0), BookingStatus::Pending);
    let fx = fixture(vec![record.clone()]);
    let event = resolved(&record, ivan());

    assert!(fx.service.update_time(&petr(), &event, at(11, 0), at(12, 0)).await.is_err());
    fx.service.update_time(&olga(), &event, at(11, 0), at(12, 0)).await.unwrap();
}

#[tokio::test]
async fn moving_to_reversed_range_is_rejected() {
    let record = stored("b1", "ivan", at(9, 0), at(10, 0), BookingStatus::Pending);
    let fx = fixture(vec![record.clone()]);
    let event = resolved(&record, ivan());

    let result = fx.service.set_time_end(&ivan(), &event, at(8, 0)).await;

    assert!(matches!(result, Err(CalendarError::InvalidRange { .. })));
}

// --- delete ---

#[tokio::test]
async fn delete_reports_each_outcome() {
    let record = stored("b1", "ivan", at(9, 0), at(10, 0), BookingStatus::Pending);
    let fx = fixture(vec![record.clone()]);
    let event = resolved(&record, ivan());

    assert!(fx.service.delete(&petr(), &event).await.is_err());
    fx.service.delete(&ivan(), &event).await.unwrap();
    assert!(matches!(fx.service.delete(&ivan(), &event).await, Err(CalendarError::NotFound(_))));

    assert_eq!(
        fx.notifier.take(),
        vec![
            Notice::NotPermitted(Target::Booking(event.id.clone())),
            Notice::EventDeleted(event.id.clone()),
            Notice::EventDeleteFailed(event.id.clone()),
        ]
    );
}

#[tokio::test]
async fn bulk_delete_is_for_managers() {
    let fx = fixture(vec![
        stored("b1", "ivan", at(9, 0), at(10, 0), BookingStatus::Pending),
        stored("b2", "petr", at(11, 0), at(12, 0), BookingStatus::Approved),
    ]);

    let refused = fx.service.delete_all_for_appliance(&ivan(), &scope()).await;
    assert!(matches!(
        refused,
        Err(CalendarError::NotPermitted { target: Target::Appliance(ref id), .. })
            if *id == ApplianceId::new("scope")
    ));
    assert!(fx.service.has_bookings(&scope()).await.unwrap());

    let removed = fx.service.delete_all_for_appliance(&olga(), &scope()).await.unwrap();

    assert_eq!(removed, 2);
    assert!(!fx.service.has_bookings(&scope()).await.unwrap());
    let deleted = Notice::ApplianceEventsDeleted {
        appliance: ApplianceId::new("scope"),
        count: 2,
    };
    assert_eq!(
        fx.notifier.take(),
        vec![
            Notice::NotPermitted(Target::Appliance(ApplianceId::new("scope"))),
            deleted,
        ]
    );
}

// --- free slots ---

#[tokio::test]
async fn free_slots_cover_the_local_day() {
    let fx = fixture(vec![
        stored("b1", "ivan", at(9, 0), at(10, 0), BookingStatus::Approved),
        stored("b2", "petr", at(12, 0), at(13, 0), BookingStatus::Declined),
    ]);
    let date = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();

    let slots = fx.service.free_slots(&scope(), date).await.unwrap();

    assert_eq!(slots.len(), 2);
    assert_eq!(slots[0].start, at(0, 0));
    assert_eq!(slots[0].end, at(9, 0));
    assert_eq!(slots[1].start, at(10, 0));
    assert_eq!(slots[1].end, Utc.with_ymd_and_hms(2024, 6, 11, 0, 0, 0).unwrap());
}

// --- members ---

#[test]
fn merging_members_puts_selection_first_without_duplicates() {
    let existing = [UserId::new("ivan"), UserId::new("petr")];
    let selected = [UserId::new("sveta"), UserId::new("ivan")];

    let merged = merge_member_ids(&existing, &selected).unwrap();

    assert_eq!(
        merged,
        vec![UserId::new("sveta"), UserId::new("ivan"), UserId::new("petr")]
    );
}

#[test]
fn empty_selection_is_rejected_and_reported() {
    let fx = fixture(vec![]);

    let result = fx.service.member_ids_with(&scope(), &[]);

    assert!(matches!(result, Err(CalendarError::Validation(_))));
    assert_eq!(fx.notifier.take(), vec![Notice::NoUsersChosen]);
}

#[test_log::test(tokio::test)]
async fn tracing_notifier_accepts_every_outcome() {
    let source = Arc::new(MemoryEventSource::new());
    let service = BookingService::new(
        source.clone(),
        Arc::new(appliance_calendar::notify::TracingNotifier),
        &Settings::default(),
    )
    .unwrap();

    let id = service.create_booking(&ivan(), booking(at(9, 0), at(10, 0))).await.unwrap();
    assert!(service.create_booking(&ivan(), booking(at(10, 0), at(9, 0))).await.is_err());

    assert_eq!(source.records()[0].id, id);
}
