pub mod files;
pub mod instances;
pub mod submissions;

pub use files::FileService;
pub use instances::InstanceService;
pub use submissions::SubmissionService;
