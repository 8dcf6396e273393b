pub mod cosmos;

use std::sync::Arc;

use connect_db::HttpSessionFactory;
use connect_kernel::settings::Settings;
use connect_kernel::{ModuleRegistry, SharedSource};

/// Register the core and project-specific modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, settings: &Settings, source: SharedSource) {
    registry.register_core(connect_db::create_module());
    registry.register_custom(cosmos::create_module(
        &settings.database,
        source,
        Arc::new(HttpSessionFactory::new()),
    ));
}
