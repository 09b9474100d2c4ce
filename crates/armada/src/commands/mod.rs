pub mod apply;
pub mod data;
pub mod destroy;
pub mod import;
pub mod plan;
pub mod refresh;
pub mod show;
pub mod types;
