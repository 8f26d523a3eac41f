/*
 * GPU Flocking Simulation
 *
 * This application simulates the flocking behavior of birds based on three
 * main rules:
 * 1. Separation: Avoid crowding neighbors
 * 2. Alignment: Steer towards the average heading of neighbors
 * 3. Cohesion: Steer towards the average position of neighbors
 *
 * Unlike a CPU flock, every per-agent quantity lives in GPU textures and is
 * advanced by compute kernels; the host only bakes assets at startup and
 * schedules one velocity + position kernel pass per displayed frame. The
 * egui panel adjusts the flocking radii, bird size and visible count live.
 */

fn main() {
    env_logger::init();

    nannou::app(gpu_flock::app::model)
        .update(gpu_flock::app::update)
        .run();
}
