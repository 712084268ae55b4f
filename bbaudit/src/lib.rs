pub mod commands;
pub mod handlers;

pub use commands::{CLAP_STYLING, command_argument_builder};
pub use handlers::{
    RunContext, handle_force_completion, handle_hardlinks, handle_init, handle_library_movies,
    handle_path, init_workspace, load_config,
};
