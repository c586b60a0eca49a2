pub mod files;

pub mod instances;

pub mod submissions;

pub mod system;

pub use files::configure_file_routes;
pub use instances::configure_instance_routes;
pub use submissions::configure_submission_routes;
pub use system::configure_system_routes;
