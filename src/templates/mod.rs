mod catalog;
mod matcher;

pub use catalog::{CATALOG, Category, SmartTemplate, TemplateProp, find};
pub use matcher::{DEFAULT_SUGGESTIONS, by_category, search, suggest, suggest_from};
