use winit::event_loop::{ControlFlow, EventLoop};

use driftfield::app::App;
use driftfield::error::SimulationError;

fn main() -> Result<(), SimulationError> {
    env_logger::init();

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new();
    event_loop.run_app(&mut app)?;
    Ok(())
}
