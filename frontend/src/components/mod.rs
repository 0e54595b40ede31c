pub mod content_panel;
pub mod header;
pub mod results;
pub mod sidebar;
pub mod upload_section;
pub mod utils;
