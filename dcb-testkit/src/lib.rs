//! Test fixtures for DCB event store tests.
//!
//! Provides a small course-subscription event vocabulary (the canonical
//! DCB example domain) plus unique-id helpers so tests can run against a
//! shared database without interfering with each other.

mod helpers;

pub use helpers::{
    course_capacity_changed, course_defined, course_query, student_subscribed,
    subscription_query, unique_course_id, unique_student_id,
};
