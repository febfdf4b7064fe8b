//! Built-in module kinds.
//!
//! These are registered as prototypes by [`ModuleFactory::load`]. Their
//! processing is deliberately small; they exist to drive the kernel.
//!
//! [`ModuleFactory::load`]: crate::kernel::factory::ModuleFactory::load

pub mod data;
pub mod dataset_info;
pub mod fiber_creator;
pub mod fiber_display;
pub mod nav_slices;

pub use data::DataModule;
pub use dataset_info::DatasetInfo;
pub use fiber_creator::FiberCreator;
pub use fiber_display::FiberDisplay;
pub use nav_slices::NavSlices;

use crate::kernel::module::ModuleLogic;

/// One fresh logic instance per built-in kind.
pub fn builtin_prototypes() -> Vec<Box<dyn ModuleLogic>> {
    vec![
        Box::new(DataModule::new()),
        Box::new(NavSlices::new()),
        Box::new(FiberCreator::new()),
        Box::new(FiberDisplay::new()),
        Box::new(DatasetInfo::new()),
    ]
}
