mod control;
mod docker;
mod health;
mod system;

pub use control::{get_logs, reboot, shutdown, update};
pub use docker::{
    create_container, docker_stats, docker_system, get_container, list_containers, list_images,
    pull_image, remove_container, remove_image, start_container, stop_container,
};
pub use health::{handler_404, health};
pub use system::{get_info, run_performance};
