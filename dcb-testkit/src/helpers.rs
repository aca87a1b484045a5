//! Event builders and id helpers

use dcb_core::{Event, Query};
use uuid::Uuid;

/// A course id no other test run has seen.
pub fn unique_course_id() -> String {
    format!("course-{}", Uuid::now_v7())
}

/// A student id no other test run has seen.
pub fn unique_student_id() -> String {
    format!("student-{}", Uuid::now_v7())
}

/// `CourseDefined` event with a JSON capacity payload.
pub fn course_defined(course_id: &str) -> Event {
    Event::new("CourseDefined")
        .with_tag("courseId", course_id)
        .with_data(
            serde_json::json!({ "capacity": 10 })
                .to_string()
                .into_bytes(),
        )
}

/// `CourseCapacityChanged` event.
pub fn course_capacity_changed(course_id: &str, capacity: u32) -> Event {
    Event::new("CourseCapacityChanged")
        .with_tag("courseId", course_id)
        .with_data(
            serde_json::json!({ "capacity": capacity })
                .to_string()
                .into_bytes(),
        )
}

/// `StudentSubscribed` event tagged with both entities it affects.
pub fn student_subscribed(course_id: &str, student_id: &str) -> Event {
    Event::new("StudentSubscribed")
        .with_tag("courseId", course_id)
        .with_tag("studentId", student_id)
}

/// The decision-model query for a single course: every event type that
/// feeds the course's state, scoped by its id.
pub fn course_query(course_id: &str) -> Query {
    Query::new()
        .with_types(["CourseDefined", "CourseCapacityChanged", "StudentSubscribed"])
        .with_tag("courseId", course_id)
}

/// Query for one student's subscriptions to one course.
pub fn subscription_query(course_id: &str, student_id: &str) -> Query {
    Query::new()
        .with_type("StudentSubscribed")
        .with_tag("courseId", course_id)
        .with_tag("studentId", student_id)
}
