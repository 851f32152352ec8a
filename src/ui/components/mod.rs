pub mod dashboard;
pub mod progress_bar;
pub mod question_panel;
pub mod session_sidebar;
