pub mod benchmark;
pub mod headless;

pub use benchmark::{BenchmarkMode, BenchmarkReport};
pub use headless::HeadlessMode;

use std::cell::RefCell;
use std::ops::ControlFlow;
use std::rc::Rc;

use crate::game::World;
use crate::metrics::RunMetrics;
use crate::schedule::Scheduler;

/// Wire a world into the scheduler's update slot.
///
/// The run ends when every snake is gone or after `max_ticks` updates.
pub(crate) fn drive_world(
    scheduler: &mut Scheduler,
    world: Rc<RefCell<World>>,
    metrics: Rc<RefCell<RunMetrics>>,
    max_ticks: Option<u64>,
) {
    scheduler.set_update_callback(move |ctx| {
        let span = ctx.profiler.enter("world_step");
        let report = world.borrow_mut().step(ctx.profiler);
        ctx.profiler.exit(span);
        metrics.borrow_mut().record(&report);

        if report.extinct || max_ticks.is_some_and(|max| ctx.tick >= max) {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
}
