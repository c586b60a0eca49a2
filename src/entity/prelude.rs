pub use super::courses::Entity as Courses;
pub use super::enrol_instances::Entity as EnrolInstances;
pub use super::enrolments::Entity as Enrolments;
pub use super::files::Entity as Files;
pub use super::notifications::Entity as Notifications;
pub use super::submissions::Entity as Submissions;
pub use super::users::Entity as Users;
